//! # Configuration Management Module
//!
//! Persistent settings stored in platform-appropriate locations.
//! Handles loading, saving, and providing defaults for configuration options.
//!
//! ## Settings
//! - `source_url`, `uid`, `api_key`: data source endpoint and the headers it expects
//! - `source_id`: key of the sensor inside nested responses (first one when unset)
//! - `live_poll_interval_secs`: live-mode refresh period, kept within 3..=20 s
//! - `sample_interval_ms`, `wall_clock_offset_hours`: timestamp reconstruction
//! - `window_size`, `filter`: initial navigation and smoothing state
//! - `stale_responses`: what to do when an older request answers last
//! - `export_dir`: where CSV exports land
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/signal-scope/config.toml
//! - Linux: ~/.config/signal-scope/config.toml
//! - Windows: %APPDATA%\signal-scope\config.toml

use crate::error::ConfigError;
use crate::ingest::StaleResponsePolicy;
use crate::payload::{DEFAULT_WALL_CLOCK_OFFSET_HOURS, SAMPLE_INTERVAL_MS};
use crate::smoothing::FilterParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MIN_POLL_SECS: u64 = 3;
const MAX_POLL_SECS: u64 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source_url: String,
    pub uid: String,
    pub api_key: String,
    pub source_id: Option<String>,
    pub live_poll_interval_secs: u64,
    pub sample_interval_ms: i64,
    pub wall_clock_offset_hours: i32,
    pub window_size: usize,
    pub stale_responses: StaleResponsePolicy,
    pub export_dir: PathBuf,
    pub filter: FilterParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: "https://database.tqduy.id.vn".to_string(),
            uid: String::new(),
            api_key: String::new(),
            source_id: None,
            live_poll_interval_secs: MAX_POLL_SECS,
            sample_interval_ms: SAMPLE_INTERVAL_MS,
            wall_clock_offset_hours: DEFAULT_WALL_CLOCK_OFFSET_HOURS,
            window_size: 1000,
            stale_responses: StaleResponsePolicy::default(),
            export_dir: PathBuf::from("."),
            filter: FilterParams::default(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("signal-scope").join("config.toml")
    }

    /// Load config from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, or write and return defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config = toml::from_str(&contents).map_err(ConfigError::ParseFailed)?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, writing defaults", path.display());
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        !self.uid.is_empty() && !self.api_key.is_empty()
    }

    /// Spacing between samples; values below 1 ms fall back to the nominal spacing
    pub fn sample_spacing_ms(&self) -> i64 {
        if self.sample_interval_ms >= 1 {
            self.sample_interval_ms
        } else {
            SAMPLE_INTERVAL_MS
        }
    }

    /// Live refresh period, clamped to the supported range
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.live_poll_interval_secs
                .clamp(MIN_POLL_SECS, MAX_POLL_SECS),
        )
    }
}
