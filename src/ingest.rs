//! # Ingestion Module
//!
//! Decides what to request, runs the request through a `DataSource`, and turns
//! the response into a `Dataset` with `SampleParser`.
//!
//! ## Modes
//! - **Live**: always asks for the current UTC date, computed at call time
//! - **Replay**: asks for an operator-chosen date
//!
//! ## Ordering
//! Every refresh gets a monotonically increasing sequence number. Whether an
//! answer to an older request may still be published when a newer one has been
//! issued is decided by `StaleResponsePolicy`.

use crate::error::FetchError;
use crate::payload::SampleParser;
use crate::source::{DataSource, FetchRequest};
use crate::timeseries::Dataset;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Live,
    Replay(NaiveDate),
}

impl FetchMode {
    /// Date sent with the request, resolved at call time
    pub fn request_date(&self) -> NaiveDate {
        match self {
            FetchMode::Live => Utc::now().date_naive(),
            FetchMode::Replay(date) => *date,
        }
    }
}

/// What happens to a response whose request is no longer the latest one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleResponsePolicy {
    /// Publish every response in arrival order, the last one to arrive wins
    #[default]
    KeepLatestResponse,
    /// Drop responses to requests that have been superseded
    KeepLatestRequest,
}

/// Result of one tagged refresh
#[derive(Debug, Clone, PartialEq)]
pub struct FetchUpdate {
    pub seq: u64,
    pub mode: FetchMode,
    pub date: NaiveDate,
    pub result: Result<Dataset, FetchError>,
}

pub struct IngestionController<S> {
    source: S,
    parser: SampleParser,
    policy: StaleResponsePolicy,
    latest_issued: AtomicU64,
}

impl<S: DataSource> IngestionController<S> {
    pub fn new(source: S, parser: SampleParser, policy: StaleResponsePolicy) -> Self {
        Self {
            source,
            parser,
            policy,
            latest_issued: AtomicU64::new(0),
        }
    }

    pub fn latest_issued(&self) -> u64 {
        self.latest_issued.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> StaleResponsePolicy {
        self.policy
    }

    /// One request, one parse. Failures leave nothing published.
    pub async fn refresh(&self, mode: FetchMode) -> Result<Dataset, FetchError> {
        self.fetch_date(mode.request_date()).await
    }

    /// Like `refresh`, but tagged with a sequence number.
    ///
    /// Returns `None` when the policy discards the response because a newer
    /// request was issued while this one was in flight.
    pub async fn refresh_tagged(&self, mode: FetchMode) -> Option<FetchUpdate> {
        let seq = self.latest_issued.fetch_add(1, Ordering::SeqCst) + 1;
        let date = mode.request_date();
        let result = self.fetch_date(date).await;

        if self.policy == StaleResponsePolicy::KeepLatestRequest && seq != self.latest_issued() {
            log::debug!(
                "Discarding response #{} for {}, #{} is newer",
                seq,
                date,
                self.latest_issued()
            );
            return None;
        }
        Some(FetchUpdate {
            seq,
            mode,
            date,
            result,
        })
    }

    async fn fetch_date(&self, date: NaiveDate) -> Result<Dataset, FetchError> {
        let response = self.source.fetch(FetchRequest::for_date(Some(date))).await?;
        let dataset = self.parser.parse(response, Some(date))?;
        log::info!("Fetched {} samples for {}", dataset.len(), date);
        Ok(dataset)
    }
}
