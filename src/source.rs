//! # Data Source Module
//!
//! The seam between ingestion and the network. `DataSource` is implemented by
//! `HttpSource` for the real endpoint and by in-memory doubles in tests.
//!
//! ## Request Format
//! `GET <source-url>[?date=YYYY-MM-DD]` with `x-api-key` and `x-uid` headers.
//! The api key never appears in logs.

use crate::error::FetchError;
use chrono::NaiveDate;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    /// `None` asks the server for its most recent data
    pub date: Option<NaiveDate>,
}

impl FetchRequest {
    pub fn for_date(date: Option<NaiveDate>) -> Self {
        Self { date }
    }

    pub fn date_param(&self) -> Option<String> {
        self.date.map(|d| d.format("%Y-%m-%d").to_string())
    }
}

/// Fetches one raw JSON response
pub trait DataSource: Send + Sync + 'static {
    fn fetch(&self, request: FetchRequest) -> impl Future<Output = Result<Value, FetchError>> + Send;
}

/// Credentials sent with every request
#[derive(Clone)]
pub struct Credentials {
    pub uid: String,
    pub api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("uid", &self.uid)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    credentials: Credentials,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, credentials: Credentials) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            credentials,
        })
    }

    async fn get(&self, request: FetchRequest) -> Result<Value, FetchError> {
        let mut builder = self
            .client
            .get(&self.url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.credentials.api_key)
            .header("x-uid", &self.credentials.uid);
        if let Some(date) = request.date_param() {
            builder = builder.query(&[("date", date)]);
        }

        log::info!(
            "Requesting {} (date: {})",
            self.url,
            request.date_param().as_deref().unwrap_or("latest")
        );

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport {
                status: Some(status.as_u16()),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                FetchError::UnexpectedResponseFormat(format!("body is not JSON: {}", e))
            } else {
                FetchError::from(e)
            }
        })
    }
}

impl DataSource for HttpSource {
    fn fetch(&self, request: FetchRequest) -> impl Future<Output = Result<Value, FetchError>> + Send {
        self.get(request)
    }
}
