//! # Pointer Tracking Module
//!
//! Two operator-placed cursors over the full dataset and the delta between them.
//! Pointers are independent of the visible window and may sit outside of it.

use crate::payload::SAMPLE_INTERVAL_MS;
use crate::window::VisibleWindow;

/// Distance from the window midpoint used when resetting pointers
pub const RESET_HALF_SPAN: usize = 250;

const INITIAL_POINTERS: PointerPair = PointerPair { p1: 0, p2: 200 };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerPair {
    pub p1: usize,
    pub p2: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivePointer {
    #[default]
    First,
    Second,
}

/// Distance between the two pointers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub sample_delta: usize,
    pub time_delta_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerTracker {
    pointers: PointerPair,
    active: ActivePointer,
    interval_ms: u64,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new(SAMPLE_INTERVAL_MS as u64)
    }
}

impl PointerTracker {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            pointers: INITIAL_POINTERS,
            active: ActivePointer::First,
            interval_ms,
        }
    }

    pub fn pointers(&self) -> PointerPair {
        self.pointers
    }

    pub fn active(&self) -> ActivePointer {
        self.active
    }

    pub fn select_active(&mut self, which: ActivePointer) {
        self.active = which;
    }

    /// Move the active pointer, clamping `index` into `[0, dataset_len - 1]`
    pub fn move_active_to(&mut self, index: i64, dataset_len: usize) -> PointerPair {
        let index = clamp_index(index, dataset_len);
        match self.active {
            ActivePointer::First => self.pointers.p1 = index,
            ActivePointer::Second => self.pointers.p2 = index,
        }
        self.pointers
    }

    /// Bracket the middle of `window` with both pointers
    pub fn reset_around_window(&mut self, window: VisibleWindow) -> PointerPair {
        if window.is_empty() {
            self.pointers = PointerPair {
                p1: window.start,
                p2: window.start,
            };
            return self.pointers;
        }
        let middle = window.midpoint();
        self.pointers = PointerPair {
            p1: middle.saturating_sub(RESET_HALF_SPAN).max(window.start),
            p2: (middle + RESET_HALF_SPAN).min(window.end - 1),
        };
        self.pointers
    }

    /// Recomputed from the current pointers on every call
    pub fn measure(&self) -> Measurement {
        let sample_delta = self.pointers.p1.abs_diff(self.pointers.p2);
        Measurement {
            sample_delta,
            time_delta_ms: sample_delta as u64 * self.interval_ms,
        }
    }

    /// Pull both pointers back inside a new dataset without otherwise moving them
    pub fn on_dataset_changed(&mut self, dataset_len: usize) -> PointerPair {
        self.pointers = PointerPair {
            p1: clamp_index(self.pointers.p1 as i64, dataset_len),
            p2: clamp_index(self.pointers.p2 as i64, dataset_len),
        };
        self.pointers
    }
}

fn clamp_index(index: i64, dataset_len: usize) -> usize {
    let last = dataset_len.saturating_sub(1) as i64;
    index.clamp(0, last) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_active_clamps() {
        let mut tracker = PointerTracker::default();
        tracker.move_active_to(-5, 10);
        assert_eq!(tracker.pointers().p1, 0);
        tracker.select_active(ActivePointer::Second);
        tracker.move_active_to(99, 10);
        assert_eq!(tracker.pointers(), PointerPair { p1: 0, p2: 9 });
    }

    #[test]
    fn test_move_on_empty_dataset() {
        let mut tracker = PointerTracker::default();
        assert_eq!(tracker.move_active_to(42, 0), PointerPair { p1: 0, p2: 200 });
        assert_eq!(tracker.on_dataset_changed(0), PointerPair { p1: 0, p2: 0 });
    }

    #[test]
    fn test_measure_is_symmetric() {
        let mut tracker = PointerTracker::default();
        tracker.move_active_to(30, 100);
        tracker.select_active(ActivePointer::Second);
        tracker.move_active_to(10, 100);
        let forward = tracker.measure();

        tracker.move_active_to(30, 100);
        tracker.select_active(ActivePointer::First);
        tracker.move_active_to(10, 100);
        assert_eq!(tracker.measure(), forward);
        assert_eq!(forward, Measurement { sample_delta: 20, time_delta_ms: 40 });
    }

    #[test]
    fn test_measure_follows_pointer_moves() {
        let mut tracker = PointerTracker::new(2);
        assert_eq!(tracker.measure().sample_delta, 200);
        tracker.select_active(ActivePointer::Second);
        tracker.move_active_to(50, 1000);
        assert_eq!(tracker.measure().sample_delta, 50);
    }

    #[test]
    fn test_reset_around_wide_window() {
        let mut tracker = PointerTracker::default();
        let pair = tracker.reset_around_window(VisibleWindow { start: 1000, end: 3000 });
        assert_eq!(pair, PointerPair { p1: 1750, p2: 2250 });
    }

    #[test]
    fn test_reset_around_narrow_window() {
        let mut tracker = PointerTracker::default();
        let pair = tracker.reset_around_window(VisibleWindow { start: 10, end: 20 });
        assert_eq!(pair, PointerPair { p1: 10, p2: 19 });
        let pair = tracker.reset_around_window(VisibleWindow { start: 0, end: 0 });
        assert_eq!(pair, PointerPair { p1: 0, p2: 0 });
    }

    #[test]
    fn test_dataset_change_reclamps_without_reset() {
        let mut tracker = PointerTracker::default();
        tracker.move_active_to(40, 1000);
        assert_eq!(tracker.on_dataset_changed(500), PointerPair { p1: 40, p2: 200 });
        assert_eq!(tracker.on_dataset_changed(100), PointerPair { p1: 40, p2: 99 });
    }
}
