//! # Fetch Worker Module
//!
//! Runs ingestion off the session thread. The worker owns a Tokio runtime on a
//! dedicated thread, takes `FetchCommand`s from the session and pushes
//! `FetchUpdate`s back, so issuing a fetch never blocks navigation.
//!
//! ## Key Components
//! - `FetchWorker`: command loop and runtime owner
//! - `FetchCommand`: commands sent from the session to the worker
//! - `LivePoller`: the cancellable live-mode timer
//!
//! ## Live Polling
//! At most one `LivePoller` exists. It fetches immediately when started and then
//! on every interval tick. Stopping live mode, starting a replay, or shutting the
//! worker down drops the poller, which aborts its task.

use crate::error::ConnectionError;
use crate::ingest::{FetchMode, FetchUpdate, IngestionController};
use crate::source::DataSource;
use chrono::NaiveDate;
use crossbeam_channel::Sender;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCommand {
    StartLive,
    StopLive,
    Replay(NaiveDate),
}

/// Handle to the repeating live refresh task. Dropping it cancels the timer.
pub struct LivePoller {
    handle: JoinHandle<()>,
}

impl LivePoller {
    fn spawn<S: DataSource>(
        runtime: &Runtime,
        controller: Arc<IngestionController<S>>,
        updates: Sender<FetchUpdate>,
        period: Duration,
    ) -> Self {
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // first tick completes immediately
                ticker.tick().await;
                log::debug!("Live poll tick");
                // in-flight fetches are not cancelled with the timer
                tokio::spawn(run_fetch(controller.clone(), updates.clone(), FetchMode::Live));
            }
        });
        Self { handle }
    }

    pub fn cancel(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for LivePoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run_fetch<S: DataSource>(
    controller: Arc<IngestionController<S>>,
    updates: Sender<FetchUpdate>,
    mode: FetchMode,
) {
    if let Some(update) = controller.refresh_tagged(mode).await {
        if let Err(e) = &update.result {
            log::warn!("Refresh #{} failed: {}", update.seq, e);
        }
        if updates.send(update).is_err() {
            log::debug!("Session gone, dropping fetch result");
        }
    }
}

/// Owns the runtime and the live poller.
pub struct FetchWorker<S> {
    controller: Arc<IngestionController<S>>,
    command_receiver: mpsc::Receiver<FetchCommand>,
    updates: Sender<FetchUpdate>,
    poll_interval: Duration,
}

impl<S: DataSource> FetchWorker<S> {
    /// Creates a new FetchWorker.
    ///
    /// Returns the worker and a sender for issuing commands from the session thread.
    pub fn new(
        controller: IngestionController<S>,
        updates: Sender<FetchUpdate>,
        poll_interval: Duration,
    ) -> (Self, mpsc::Sender<FetchCommand>) {
        let (command_sender, command_receiver) = mpsc::channel();

        let worker = FetchWorker {
            controller: Arc::new(controller),
            command_receiver,
            updates,
            poll_interval,
        };

        (worker, command_sender)
    }

    /// Runs the command loop until every command sender is dropped.
    ///
    /// Blocks the calling thread; spawn it on its own thread.
    pub fn run(self) -> Result<(), ConnectionError> {
        let rt = Runtime::new().map_err(|e| {
            let error = ConnectionError::RuntimeCreation(e.to_string());
            log::error!("{}", error);
            error
        })?;

        let mut poller: Option<LivePoller> = None;

        while let Ok(command) = self.command_receiver.recv() {
            match command {
                FetchCommand::StartLive => {
                    log::info!("Fetch worker: entering live mode every {:?}", self.poll_interval);
                    // replacing the handle cancels the previous timer
                    poller = Some(LivePoller::spawn(
                        &rt,
                        self.controller.clone(),
                        self.updates.clone(),
                        self.poll_interval,
                    ));
                }
                FetchCommand::StopLive => {
                    if let Some(active) = poller.take() {
                        log::info!("Fetch worker: live mode stopped");
                        active.cancel();
                    }
                }
                FetchCommand::Replay(date) => {
                    if let Some(active) = poller.take() {
                        active.cancel();
                    }
                    log::info!("Fetch worker: replaying {}", date);
                    rt.spawn(run_fetch(
                        self.controller.clone(),
                        self.updates.clone(),
                        FetchMode::Replay(date),
                    ));
                }
            }
        }

        drop(poller);
        log::info!("Fetch worker: command channel closed, shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::tests::ScriptedSource;
    use crate::ingest::StaleResponsePolicy;
    use crate::payload::SampleParser;
    use crossbeam_channel::{unbounded, Receiver};
    use std::thread;

    fn start(
        source: ScriptedSource,
        period: Duration,
    ) -> (mpsc::Sender<FetchCommand>, Receiver<FetchUpdate>, thread::JoinHandle<()>) {
        let (update_tx, update_rx) = unbounded();
        let controller = IngestionController::new(
            source,
            SampleParser::default(),
            StaleResponsePolicy::default(),
        );
        let (worker, commands) = FetchWorker::new(controller, update_tx, period);
        let handle = thread::spawn(move || {
            worker.run().expect("worker failed");
        });
        (commands, update_rx, handle)
    }

    #[test]
    fn test_replay_fetches_once() {
        let (commands, updates, handle) = start(ScriptedSource::repeating(&[1.0, 2.0, 3.0], 5), Duration::from_secs(3));
        let date = NaiveDate::from_ymd_opt(2024, 11, 5).unwrap();
        commands.send(FetchCommand::Replay(date)).unwrap();

        let update = updates.recv_timeout(Duration::from_secs(5)).expect("no update");
        assert_eq!(update.mode, FetchMode::Replay(date));
        assert_eq!(update.result.unwrap().len(), 3);
        assert!(updates.recv_timeout(Duration::from_millis(200)).is_err());

        drop(commands);
        handle.join().unwrap();
    }

    #[test]
    fn test_live_fetches_immediately_and_repeats() {
        let (commands, updates, handle) = start(ScriptedSource::repeating(&[1.0], 100), Duration::from_millis(30));
        commands.send(FetchCommand::StartLive).unwrap();

        let first = updates.recv_timeout(Duration::from_secs(5)).expect("no immediate fetch");
        assert_eq!(first.mode, FetchMode::Live);
        let second = updates.recv_timeout(Duration::from_secs(5)).expect("no repeat fetch");
        assert!(second.seq > first.seq);

        drop(commands);
        handle.join().unwrap();
    }

    #[test]
    fn test_stop_live_cancels_timer() {
        let (commands, updates, handle) = start(ScriptedSource::repeating(&[1.0], 100), Duration::from_millis(20));
        commands.send(FetchCommand::StartLive).unwrap();
        updates.recv_timeout(Duration::from_secs(5)).expect("no immediate fetch");

        commands.send(FetchCommand::StopLive).unwrap();
        thread::sleep(Duration::from_millis(100));
        while updates.try_recv().is_ok() {}

        thread::sleep(Duration::from_millis(150));
        assert!(updates.try_recv().is_err(), "timer still firing after stop");

        drop(commands);
        handle.join().unwrap();
    }

    #[test]
    fn test_dropping_poller_aborts_task() {
        let rt = Runtime::new().unwrap();
        let (update_tx, _update_rx) = unbounded();
        let controller = Arc::new(IngestionController::new(
            ScriptedSource::repeating(&[1.0], 10),
            SampleParser::default(),
            StaleResponsePolicy::default(),
        ));
        let poller = LivePoller::spawn(&rt, controller, update_tx, Duration::from_millis(10));
        assert!(!poller.is_finished());
        poller.cancel();
        rt.shutdown_timeout(Duration::from_secs(1));
    }
}
