//! # Payload Parsing Module
//!
//! Turns one raw server response into a uniform, monotonically timed `Dataset`.
//!
//! ## Response Shapes
//! The server answers in one of two layouts, decided once by `ResponseShape::classify`:
//! - **Envelope**: `{ "status": "success", "data": [ { "t": ..., "values": [...] }, ... ] }`
//! - **LegacyNested**: `{ <sourceId>: { <YYYY-MM-DD>: [ <chunk>, ... ] } }` where each chunk
//!   is either an object or a string holding the same object as JSON
//!
//! ## Timestamp Reconstruction
//! Chunk timestamps from the device are skewed, so only the first chunk's `t` is
//! trusted. Sample `i` of the flattened payload gets `t0 + i * interval`. Envelope
//! payloads keep that as epoch milliseconds, nested payloads are rendered as
//! `HH:MM:SS.mmm` wall-clock labels in a fixed reference timezone.

use crate::error::FetchError;
use crate::timeseries::{Dataset, Sample, Timestamp};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Nominal spacing between two samples in milliseconds
pub const SAMPLE_INTERVAL_MS: i64 = 2;

/// Offset of the reference timezone used for wall-clock labels (UTC+7)
pub const DEFAULT_WALL_CLOCK_OFFSET_HOURS: i32 = 7;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Base timestamp of a chunk, either epoch milliseconds or a date-time string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTime {
    Millis(f64),
    Text(String),
}

impl RawTime {
    fn to_epoch_millis(&self) -> Option<i64> {
        match self {
            RawTime::Millis(ms) if (i64::MIN as f64..i64::MAX as f64).contains(ms) => {
                Some(*ms as i64)
            }
            RawTime::Millis(_) => None,
            RawTime::Text(text) => parse_time_text(text.trim()),
        }
    }
}

fn parse_time_text(text: &str) -> Option<i64> {
    if let Ok(ms) = text.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    // Zone-less strings are read as UTC
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// One decoded chunk: an optional base timestamp and its raw values
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawChunk {
    #[serde(default)]
    pub t: Option<RawTime>,
    pub values: Vec<Option<f64>>,
}

impl RawChunk {
    fn decode(entry: Value) -> Result<Self, FetchError> {
        match entry {
            Value::String(encoded) => serde_json::from_str(&encoded)
                .map_err(|e| FetchError::MalformedPayload(format!("chunk string: {}", e))),
            Value::Object(_) => serde_json::from_value(entry)
                .map_err(|e| FetchError::MalformedPayload(format!("chunk object: {}", e))),
            other => Err(FetchError::MalformedPayload(format!(
                "expected chunk object or string, found {}",
                json_kind(&other)
            ))),
        }
    }
}

/// How absolute sample times are rendered
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimestampPolicy {
    /// `time = t0 + i * interval` as epoch milliseconds
    GlobalAnchor,
    /// Same arithmetic, rendered as `HH:MM:SS.mmm` in the given zone
    WallClock { offset: FixedOffset },
}

/// Server response, classified once at the parser boundary
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    Envelope { data: Vec<Value> },
    LegacyNested(BTreeMap<String, BTreeMap<String, Vec<Value>>>),
}

impl ResponseShape {
    pub fn classify(response: Value) -> Result<Self, FetchError> {
        let root = match response {
            Value::Object(root) => root,
            other => {
                return Err(FetchError::UnexpectedResponseFormat(format!(
                    "expected a JSON object, found {}",
                    json_kind(&other)
                )))
            }
        };

        if root.contains_key("status") {
            return Self::classify_envelope(root);
        }
        Self::classify_nested(root)
    }

    fn classify_envelope(mut root: Map<String, Value>) -> Result<Self, FetchError> {
        let status = root.get("status").and_then(Value::as_str).unwrap_or_default();
        if status != "success" {
            return Err(FetchError::UnexpectedResponseFormat(format!(
                "status is {:?}",
                root.get("status").cloned().unwrap_or(Value::Null)
            )));
        }
        match root.remove("data") {
            Some(Value::Array(data)) => Ok(ResponseShape::Envelope { data }),
            Some(other) => Err(FetchError::UnexpectedResponseFormat(format!(
                "data is {}, expected an array",
                json_kind(&other)
            ))),
            None => Err(FetchError::UnexpectedResponseFormat(
                "success response without data".to_string(),
            )),
        }
    }

    fn classify_nested(root: Map<String, Value>) -> Result<Self, FetchError> {
        let mut sources = BTreeMap::new();
        for (source_id, dates) in root {
            let Value::Object(dates) = dates else {
                return Err(FetchError::UnexpectedResponseFormat(format!(
                    "source {} is not an object",
                    source_id
                )));
            };
            let mut by_date = BTreeMap::new();
            for (date_key, chunks) in dates {
                let Value::Array(chunks) = chunks else {
                    return Err(FetchError::UnexpectedResponseFormat(format!(
                        "{}/{} is not a chunk list",
                        source_id, date_key
                    )));
                };
                by_date.insert(date_key, chunks);
            }
            sources.insert(source_id, by_date);
        }
        Ok(ResponseShape::LegacyNested(sources))
    }

    /// Timestamp policy implied by the shape
    pub fn default_policy(&self, wall_clock_offset: FixedOffset) -> TimestampPolicy {
        match self {
            ResponseShape::Envelope { .. } => TimestampPolicy::GlobalAnchor,
            ResponseShape::LegacyNested(_) => TimestampPolicy::WallClock {
                offset: wall_clock_offset,
            },
        }
    }

    /// Select and decode the chunk list for the requested source and date.
    ///
    /// Nested payloads without an explicit date resolve to the most recent date key.
    pub fn into_chunks(
        self,
        source_id: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<RawChunk>, FetchError> {
        let entries = match self {
            ResponseShape::Envelope { data } => data,
            ResponseShape::LegacyNested(mut sources) => {
                let by_date = match source_id {
                    Some(id) => sources.remove(id),
                    None => sources.into_values().next(),
                };
                let Some(mut by_date) = by_date else {
                    return Err(FetchError::NoDataForDate(describe_date(date)));
                };
                let chunks = match date {
                    Some(date) => by_date.remove(&date.format(DATE_KEY_FORMAT).to_string()),
                    None => by_date.pop_last().map(|(_, chunks)| chunks),
                };
                chunks.ok_or_else(|| FetchError::NoDataForDate(describe_date(date)))?
            }
        };
        entries.into_iter().map(RawChunk::decode).collect()
    }
}

fn describe_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_KEY_FORMAT).to_string())
        .unwrap_or_else(|| "the latest date".to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decodes responses into datasets
#[derive(Debug, Clone)]
pub struct SampleParser {
    interval_ms: i64,
    wall_clock_offset: FixedOffset,
    source_id: Option<String>,
}

impl Default for SampleParser {
    fn default() -> Self {
        Self::new(SAMPLE_INTERVAL_MS, DEFAULT_WALL_CLOCK_OFFSET_HOURS, None)
    }
}

impl SampleParser {
    /// Offsets outside +/-23 hours fall back to UTC, intervals below 1 ms to the nominal spacing.
    pub fn new(interval_ms: i64, wall_clock_offset_hours: i32, source_id: Option<String>) -> Self {
        let interval_ms = if interval_ms >= 1 {
            interval_ms
        } else {
            log::warn!(
                "Invalid sample interval {}ms, using {}ms",
                interval_ms,
                SAMPLE_INTERVAL_MS
            );
            SAMPLE_INTERVAL_MS
        };
        let wall_clock_offset = FixedOffset::east_opt(wall_clock_offset_hours * 3600)
            .unwrap_or_else(|| {
                log::warn!(
                    "Invalid wall clock offset {}h, using UTC",
                    wall_clock_offset_hours
                );
                Utc.fix()
            });
        Self {
            interval_ms,
            wall_clock_offset,
            source_id,
        }
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Parse a full response for the requested date (`None` = most recent)
    pub fn parse(&self, response: Value, date: Option<NaiveDate>) -> Result<Dataset, FetchError> {
        let shape = ResponseShape::classify(response)?;
        let policy = shape.default_policy(self.wall_clock_offset);
        let chunks = shape.into_chunks(self.source_id.as_deref(), date)?;
        let dataset = self.flatten(&chunks, policy)?;
        log::debug!(
            "Parsed {} chunks into {} samples ({:?})",
            chunks.len(),
            dataset.len(),
            policy
        );
        Ok(dataset)
    }

    pub fn parse_str(&self, body: &str, date: Option<NaiveDate>) -> Result<Dataset, FetchError> {
        let response: Value = serde_json::from_str(body)
            .map_err(|e| FetchError::UnexpectedResponseFormat(format!("invalid JSON: {}", e)))?;
        self.parse(response, date)
    }

    /// Flatten chunks in order, anchoring every sample on the first chunk's timestamp
    pub fn flatten(&self, chunks: &[RawChunk], policy: TimestampPolicy) -> Result<Dataset, FetchError> {
        let total: usize = chunks.iter().map(|c| c.values.len()).sum();
        if total == 0 {
            return Ok(Dataset::default());
        }

        let t0 = chunks
            .first()
            .and_then(|c| c.t.as_ref())
            .ok_or_else(|| FetchError::MalformedPayload("first chunk has no timestamp".to_string()))?;
        let t0 = t0.to_epoch_millis().ok_or_else(|| {
            FetchError::MalformedPayload(format!("unreadable chunk timestamp {:?}", t0))
        })?;

        let mut samples = Vec::with_capacity(total);
        let raw_values = chunks.iter().flat_map(|c| c.values.iter());
        for (i, raw) in raw_values.enumerate() {
            let absolute = i64::try_from(i)
                .ok()
                .and_then(|i| i.checked_mul(self.interval_ms))
                .and_then(|offset| t0.checked_add(offset))
                .ok_or_else(|| {
                    FetchError::MalformedPayload(format!("timestamp overflow at sample {}", i))
                })?;
            let value = (*raw).filter(|v| v.is_finite()).unwrap_or(0.0);
            samples.push(Sample::new(self.render_time(absolute, policy)?, value));
        }
        Ok(Dataset::new(samples))
    }

    fn render_time(&self, absolute_ms: i64, policy: TimestampPolicy) -> Result<Timestamp, FetchError> {
        match policy {
            TimestampPolicy::GlobalAnchor => Ok(Timestamp::EpochMillis(absolute_ms)),
            TimestampPolicy::WallClock { offset } => {
                let utc = DateTime::from_timestamp_millis(absolute_ms).ok_or_else(|| {
                    FetchError::MalformedPayload(format!("timestamp {} out of range", absolute_ms))
                })?;
                let label = utc.with_timezone(&offset).format("%H:%M:%S%.3f");
                Ok(Timestamp::WallClock(label.to_string()))
            }
        }
    }
}
