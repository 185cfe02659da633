//! # Window Navigation Module
//!
//! Owns the visible sub-range of the dataset and keeps it valid.
//!
//! ## Invariants
//! - `0 <= start <= end <= dataset_len`
//! - `end - start == window_size`, except when the dataset is shorter than the window
//! - the window is only empty when the dataset is empty
//!
//! Every operation takes the current dataset length and re-derives `start`
//! from it, so a window can never outlive the dataset it was computed for.

use crate::timeseries::{Dataset, Sample};

/// Largest window the size control offers
pub const MAX_WINDOW_SIZE: usize = 20_000;

/// Smallest continuous-scroll step in samples
pub const MIN_SCROLL_STEP: usize = 100;

/// Half-open sample range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibleWindow {
    pub start: usize,
    pub end: usize,
}

impl VisibleWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    pub fn midpoint(&self) -> usize {
        (self.start + self.end) / 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Forward,
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowNavigator {
    window: VisibleWindow,
    window_size: usize,
}

impl WindowNavigator {
    pub fn new(window_size: usize) -> Self {
        Self {
            window: VisibleWindow::default(),
            window_size: window_size.max(1),
        }
    }

    pub fn window(&self) -> VisibleWindow {
        self.window
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Samples currently in view
    pub fn visible<'a>(&self, dataset: &'a Dataset) -> &'a [Sample] {
        dataset.slice(self.window.start, self.window.end)
    }

    /// Upper bound for the start scrubber
    pub fn max_start(&self, dataset_len: usize) -> usize {
        dataset_len.saturating_sub(self.window_size)
    }

    /// Upper bound for the window-size control
    pub fn max_window_size(dataset_len: usize) -> usize {
        dataset_len.clamp(1, MAX_WINDOW_SIZE)
    }

    /// Step used by continuous scrolling
    pub fn scroll_step(&self) -> usize {
        (self.window_size / 10).max(MIN_SCROLL_STEP)
    }

    pub fn set_window_size(&mut self, new_size: usize, dataset_len: usize) -> VisibleWindow {
        self.window_size = new_size.max(1);
        self.reposition(index(self.window.start), dataset_len)
    }

    pub fn pan_by(&mut self, delta: i64, dataset_len: usize) -> VisibleWindow {
        self.reposition(index(self.window.start).saturating_add(delta), dataset_len)
    }

    pub fn next_page(&mut self, dataset_len: usize) -> VisibleWindow {
        self.pan_by(index(self.window_size), dataset_len)
    }

    pub fn prev_page(&mut self, dataset_len: usize) -> VisibleWindow {
        self.pan_by(-index(self.window_size), dataset_len)
    }

    pub fn scroll(&mut self, direction: ScrollDirection, dataset_len: usize) -> VisibleWindow {
        let step = index(self.scroll_step());
        match direction {
            ScrollDirection::Forward => self.pan_by(step, dataset_len),
            ScrollDirection::Backward => self.pan_by(-step, dataset_len),
        }
    }

    pub fn jump_to_start(&mut self, dataset_len: usize) -> VisibleWindow {
        self.reposition(0, dataset_len)
    }

    pub fn jump_to_end(&mut self, dataset_len: usize) -> VisibleWindow {
        self.reposition(index(self.max_start(dataset_len)), dataset_len)
    }

    pub fn set_start(&mut self, new_start: usize, dataset_len: usize) -> VisibleWindow {
        self.reposition(index(new_start), dataset_len)
    }

    pub fn on_dataset_length_changed(&mut self, dataset_len: usize) -> VisibleWindow {
        self.reposition(index(self.window.start), dataset_len)
    }

    fn reposition(&mut self, candidate_start: i64, dataset_len: usize) -> VisibleWindow {
        let max_start = index(self.max_start(dataset_len));
        let start = usize::try_from(candidate_start.clamp(0, max_start)).unwrap_or(0);
        let end = start.saturating_add(self.window_size).min(dataset_len);
        self.window = VisibleWindow { start, end };
        self.window
    }
}

// Sample positions past i64::MAX saturate
fn index(position: usize) -> i64 {
    i64::try_from(position).unwrap_or(i64::MAX)
}
