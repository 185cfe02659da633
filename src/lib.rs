//! Sensor time-series ingestion, Kalman smoothing and window/pointer navigation.
//!
//! ## Modules
//! - `payload`: decodes server responses into datasets
//! - `ingest`, `source`, `connection`: fetching, live polling and replay
//! - `smoothing`: scalar Kalman smoother
//! - `window`, `pointers`: navigation state over a dataset
//! - `session`: the explicit state every event is applied to
//! - `export`, `console`, `config`, `error`: supporting concerns

pub mod config;
pub mod connection;
pub mod console;
pub mod error;
pub mod export;
pub mod ingest;
pub mod payload;
pub mod pointers;
pub mod session;
pub mod smoothing;
pub mod source;
pub mod timeseries;
pub mod window;
