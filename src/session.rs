//! # Session Module
//!
//! Explicit state of one operator session and the single `update` entry point
//! through which every event (fetch result or operator command) flows.
//!
//! ## Data Flow
//! fetch result -> raw dataset -> smoothed dataset -> window + pointers
//!
//! Datasets are replaced wholesale. A failed refresh only records an error
//! message; the last good dataset, window and pointers stay as they were.

use crate::config::Config;
use crate::connection::FetchCommand;
use crate::error::{ConnectionError, ExportError};
use crate::export::export_csv;
use crate::ingest::FetchUpdate;
use crate::pointers::{ActivePointer, Measurement, PointerPair, PointerTracker};
use crate::smoothing::{smooth, FilterParams};
use crate::timeseries::{Dataset, Sample, SampleSliceExt};
use crate::window::{ScrollDirection, VisibleWindow, WindowNavigator, MAX_WINDOW_SIZE};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Live,
    Replay { date: Option<NaiveDate> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    FetchCompleted(FetchUpdate),
    EnterLive,
    EnterReplay,
    SelectDate(NaiveDate),
    SetWindowSize(usize),
    SetStart(usize),
    PanBy(i64),
    NextPage,
    PrevPage,
    Scroll(ScrollDirection),
    JumpToStart,
    JumpToEnd,
    SelectPointer(ActivePointer),
    ClickSample(i64),
    ResetPointers,
    SetFilter(FilterParams),
    ApplyFilter,
    Logout,
}

pub struct Session {
    mode: ViewMode,
    raw: Dataset,
    smoothed: Dataset,
    /// Date the held dataset was fetched for
    data_date: Option<NaiveDate>,
    filter: FilterParams,
    navigator: WindowNavigator,
    pointers: PointerTracker,
    error: Option<String>,
    export_dir: PathBuf,
    active: bool,
    commands: Sender<FetchCommand>,
}

impl Session {
    pub fn new(config: &Config, commands: Sender<FetchCommand>) -> Self {
        let filter = match config.filter.validate() {
            Ok(()) => config.filter,
            Err(e) => {
                log::warn!("Ignoring configured filter: {}", e);
                FilterParams::default()
            }
        };
        Self {
            mode: ViewMode::Replay { date: None },
            raw: Dataset::default(),
            smoothed: Dataset::default(),
            data_date: None,
            filter,
            navigator: WindowNavigator::new(config.window_size.min(MAX_WINDOW_SIZE)),
            pointers: PointerTracker::new(config.sample_spacing_ms().unsigned_abs()),
            error: None,
            export_dir: config.export_dir.clone(),
            active: true,
            commands,
        }
    }

    pub fn update(&mut self, message: Message) {
        if !self.active {
            log::debug!("Session ended, ignoring {:?}", message);
            return;
        }
        let len = self.smoothed.len();
        match message {
            Message::FetchCompleted(update) => self.apply_fetch(update),
            Message::EnterLive => {
                if self.mode != ViewMode::Live {
                    self.mode = ViewMode::Live;
                    self.send(FetchCommand::StartLive);
                }
            }
            Message::EnterReplay => {
                if self.mode == ViewMode::Live {
                    self.mode = ViewMode::Replay { date: None };
                    self.send(FetchCommand::StopLive);
                }
            }
            Message::SelectDate(date) => match self.mode {
                ViewMode::Replay { .. } => {
                    self.mode = ViewMode::Replay { date: Some(date) };
                    self.send(FetchCommand::Replay(date));
                }
                ViewMode::Live => {
                    log::warn!("Date selection ignored in live mode");
                }
            },
            Message::SetWindowSize(size) => {
                self.navigator.set_window_size(size.min(MAX_WINDOW_SIZE), len);
            }
            Message::SetStart(start) => {
                self.navigator.set_start(start, len);
            }
            Message::PanBy(delta) => {
                self.navigator.pan_by(delta, len);
            }
            Message::NextPage => {
                self.navigator.next_page(len);
            }
            Message::PrevPage => {
                self.navigator.prev_page(len);
            }
            Message::Scroll(direction) => {
                self.navigator.scroll(direction, len);
            }
            Message::JumpToStart => {
                self.navigator.jump_to_start(len);
            }
            Message::JumpToEnd => {
                self.navigator.jump_to_end(len);
            }
            Message::SelectPointer(which) => self.pointers.select_active(which),
            Message::ClickSample(index) => {
                self.pointers.move_active_to(index, len);
            }
            Message::ResetPointers => {
                self.pointers.reset_around_window(self.navigator.window());
            }
            Message::SetFilter(params) => match params.validate() {
                Ok(()) => self.filter = params,
                Err(e) => {
                    log::warn!("Rejected filter parameters: {}", e);
                    self.error = Some(e.to_string());
                }
            },
            Message::ApplyFilter => {
                self.smoothed = smooth(&self.raw, &self.filter);
            }
            Message::Logout => self.end(),
        }
    }

    fn apply_fetch(&mut self, update: FetchUpdate) {
        match update.result {
            Ok(dataset) => {
                log::debug!("Applying refresh #{} ({} samples)", update.seq, dataset.len());
                self.smoothed = smooth(&dataset, &self.filter);
                self.raw = dataset;
                self.data_date = Some(update.date);
                let len = self.smoothed.len();
                self.navigator.jump_to_end(len);
                self.pointers.on_dataset_changed(len);
                self.error = None;
            }
            Err(e) => {
                log::warn!("Keeping previous data after failed refresh #{}: {}", update.seq, e);
                self.error = Some(e.to_string());
            }
        }
    }

    fn send(&mut self, command: FetchCommand) {
        if self.commands.send(command).is_err() {
            let error = ConnectionError::Shutdown;
            log::error!("{}", error);
            self.error = Some(error.to_string());
        }
    }

    /// Stop polling and drop all session data
    fn end(&mut self) {
        if self.mode == ViewMode::Live {
            self.send(FetchCommand::StopLive);
        }
        log::info!("Session ended");
        self.raw = Dataset::default();
        self.smoothed = Dataset::default();
        self.data_date = None;
        self.navigator = WindowNavigator::new(self.navigator.window_size());
        self.pointers.on_dataset_changed(0);
        self.mode = ViewMode::Replay { date: None };
        self.error = None;
        self.active = false;
    }

    /// Write the raw dataset as CSV, named after the date it was fetched for
    pub fn export(&self) -> Result<PathBuf, ExportError> {
        match (self.mode, self.data_date) {
            (ViewMode::Replay { date: Some(_) }, Some(date)) => {
                export_csv(&self.raw, date, &self.export_dir)
            }
            (ViewMode::Replay { date: Some(_) }, None) => Err(ExportError::EmptyDataset),
            _ => Err(ExportError::NotReplayMode),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn raw(&self) -> &Dataset {
        &self.raw
    }

    pub fn smoothed(&self) -> &Dataset {
        &self.smoothed
    }

    pub fn filter(&self) -> FilterParams {
        self.filter
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn window(&self) -> VisibleWindow {
        self.navigator.window()
    }

    pub fn window_size(&self) -> usize {
        self.navigator.window_size()
    }

    /// Upper bound of the start scrubber for the current dataset
    pub fn max_start(&self) -> usize {
        self.navigator.max_start(self.smoothed.len())
    }

    pub fn visible(&self) -> &[Sample] {
        self.navigator.visible(&self.smoothed)
    }

    pub fn pointers(&self) -> PointerPair {
        self.pointers.pointers()
    }

    pub fn active_pointer(&self) -> ActivePointer {
        self.pointers.active()
    }

    pub fn measurement(&self) -> Measurement {
        self.pointers.measure()
    }

    /// Times of the first and last visible samples
    pub fn window_bounds_labels(&self) -> (Option<String>, Option<String>) {
        match self.visible().time_span() {
            Some((first, last)) => (Some(first.to_string()), Some(last.to_string())),
            None => (None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::ingest::FetchMode;
    use crate::timeseries::Timestamp;
    use std::sync::mpsc::{self, Receiver};

    fn session(window_size: usize) -> (Session, Receiver<FetchCommand>) {
        let (tx, rx) = mpsc::channel();
        let config = Config {
            window_size,
            ..Config::default()
        };
        (Session::new(&config, tx), rx)
    }

    fn dataset(len: usize) -> Dataset {
        (0..len)
            .map(|i| Sample::new(Timestamp::EpochMillis(i as i64 * 2), (i % 7) as f64))
            .collect()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 5).unwrap()
    }

    fn fetched(seq: u64, result: Result<Dataset, FetchError>) -> Message {
        Message::FetchCompleted(FetchUpdate {
            seq,
            mode: FetchMode::Replay(date()),
            date: date(),
            result,
        })
    }

    #[test]
    fn test_fetch_follows_tail_and_smooths() {
        let (mut s, _rx) = session(4);
        s.update(fetched(1, Ok(dataset(10))));
        assert_eq!(s.window(), VisibleWindow { start: 6, end: 10 });
        assert_eq!(s.visible().len(), 4);
        assert_eq!(s.smoothed(), &smooth(s.raw(), &FilterParams::default()));
        assert_eq!(s.pointers(), PointerPair { p1: 0, p2: 9 });
    }

    #[test]
    fn test_failed_fetch_keeps_state() {
        let (mut s, _rx) = session(4);
        s.update(fetched(1, Ok(dataset(10))));
        s.update(Message::PrevPage);
        let window = s.window();
        let pointers = s.pointers();

        s.update(fetched(2, Err(FetchError::NoDataForDate("2024-11-05".into()))));
        assert_eq!(s.raw().len(), 10);
        assert_eq!(s.window(), window);
        assert_eq!(s.pointers(), pointers);
        assert!(s.error().unwrap().contains("2024-11-05"));

        s.update(fetched(3, Ok(dataset(12))));
        assert!(s.error().is_none());
    }

    #[test]
    fn test_navigation_messages() {
        let (mut s, _rx) = session(4);
        s.update(fetched(1, Ok(dataset(10))));
        s.update(Message::PanBy(-4));
        assert_eq!(s.window(), VisibleWindow { start: 2, end: 6 });
        s.update(Message::JumpToStart);
        assert_eq!(s.window(), VisibleWindow { start: 0, end: 4 });
        s.update(Message::NextPage);
        assert_eq!(s.window(), VisibleWindow { start: 4, end: 8 });
        s.update(Message::SetStart(100));
        assert_eq!(s.window(), VisibleWindow { start: 6, end: 10 });
        s.update(Message::SetWindowSize(50));
        assert_eq!(s.window_size(), 50);
        assert_eq!(s.window(), VisibleWindow { start: 0, end: 10 });
        s.update(Message::SetWindowSize(1_000_000));
        assert_eq!(s.window_size(), MAX_WINDOW_SIZE);
    }

    #[test]
    fn test_pointer_messages() {
        let (mut s, _rx) = session(1000);
        s.update(fetched(1, Ok(dataset(2000))));
        s.update(Message::ResetPointers);
        assert_eq!(s.pointers(), PointerPair { p1: 1250, p2: 1750 });
        s.update(Message::SelectPointer(ActivePointer::Second));
        s.update(Message::ClickSample(5000));
        assert_eq!(s.pointers().p2, 1999);
        assert_eq!(s.measurement(), Measurement { sample_delta: 749, time_delta_ms: 1498 });
    }

    #[test]
    fn test_filter_rejected_at_boundary() {
        let (mut s, _rx) = session(4);
        s.update(Message::SetFilter(FilterParams { q: 1.0, r: -1.0, p0: 1.0, k0: 1.0 }));
        assert_eq!(s.filter(), FilterParams::default());
        assert!(s.error().is_some());
    }

    #[test]
    fn test_apply_filter_uses_raw_data() {
        let (mut s, _rx) = session(4);
        s.update(fetched(1, Ok(dataset(20))));
        let params = FilterParams { q: 0.01, r: 10.0, p0: 1.0, k0: 1.0 };
        s.update(Message::SetFilter(params));
        s.update(Message::ApplyFilter);
        let expected = smooth(&dataset(20), &params);
        assert_eq!(s.smoothed(), &expected);
        s.update(Message::ApplyFilter);
        assert_eq!(s.smoothed(), &expected);
    }

    #[test]
    fn test_mode_commands() {
        let (mut s, rx) = session(4);
        s.update(Message::EnterLive);
        s.update(Message::EnterLive);
        assert_eq!(rx.try_recv(), Ok(FetchCommand::StartLive));
        assert!(rx.try_recv().is_err());

        s.update(Message::SelectDate(date()));
        assert!(rx.try_recv().is_err());

        s.update(Message::EnterReplay);
        assert_eq!(rx.try_recv(), Ok(FetchCommand::StopLive));
        s.update(Message::SelectDate(date()));
        assert_eq!(rx.try_recv(), Ok(FetchCommand::Replay(date())));
        assert_eq!(s.mode(), ViewMode::Replay { date: Some(date()) });
    }

    #[test]
    fn test_logout_stops_polling() {
        let (mut s, rx) = session(4);
        s.update(Message::EnterLive);
        s.update(fetched(1, Ok(dataset(10))));
        s.update(Message::Logout);
        assert_eq!(rx.try_recv(), Ok(FetchCommand::StartLive));
        assert_eq!(rx.try_recv(), Ok(FetchCommand::StopLive));
        assert!(!s.is_active());
        assert!(s.raw().is_empty());

        s.update(fetched(2, Ok(dataset(10))));
        assert!(s.raw().is_empty());
    }

    #[test]
    fn test_export_only_in_replay_with_date() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel();
        let config = Config {
            export_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let mut s = Session::new(&config, tx);
        assert!(matches!(s.export(), Err(ExportError::NotReplayMode)));

        s.update(Message::SelectDate(date()));
        assert!(matches!(s.export(), Err(ExportError::EmptyDataset)));

        s.update(fetched(1, Ok(dataset(3))));
        let path = s.export().unwrap();
        assert!(path.ends_with("data_2024-11-05.csv"));
    }

    #[test]
    fn test_export_names_file_after_held_data() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel();
        let config = Config {
            export_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let mut s = Session::new(&config, tx);
        s.update(Message::SelectDate(date()));
        s.update(fetched(1, Ok(dataset(3))));

        let later = NaiveDate::from_ymd_opt(2024, 11, 6).unwrap();
        s.update(Message::SelectDate(later));
        s.update(Message::FetchCompleted(FetchUpdate {
            seq: 2,
            mode: FetchMode::Replay(later),
            date: later,
            result: Err(FetchError::NoDataForDate("2024-11-06".into())),
        }));

        let path = s.export().unwrap();
        assert!(path.ends_with("data_2024-11-05.csv"));
    }

    #[test]
    fn test_configured_window_size_is_capped() {
        let (s, _rx) = session(1_000_000);
        assert_eq!(s.window_size(), MAX_WINDOW_SIZE);
    }

    #[test]
    fn test_non_positive_sample_interval_uses_nominal_spacing() {
        let (tx, _rx) = mpsc::channel();
        let config = Config {
            sample_interval_ms: 0,
            ..Config::default()
        };
        let mut s = Session::new(&config, tx);
        s.update(fetched(1, Ok(dataset(500))));
        assert_eq!(s.measurement(), Measurement { sample_delta: 200, time_delta_ms: 400 });
    }

    #[test]
    fn test_window_bounds_labels() {
        let (mut s, _rx) = session(4);
        assert_eq!(s.window_bounds_labels(), (None, None));
        s.update(fetched(1, Ok(dataset(10))));
        assert_eq!(
            s.window_bounds_labels(),
            (Some("12".to_string()), Some("18".to_string()))
        );
    }

    #[test]
    fn test_closed_worker_is_reported() {
        let (mut s, rx) = session(4);
        drop(rx);
        s.update(Message::EnterLive);
        assert!(s.error().unwrap().contains("no longer running"));
    }
}
