//! # Error Types Module
//!
//! Centralized error handling for signal-scope.
//! Each concern gets its own error enum with proper context and error chaining.
//!
//! ## Error Types
//! - `FetchError`: Anything that can go wrong during one refresh cycle
//! - `FilterParamsError`: Smoothing parameters rejected at the boundary
//! - `ConfigError`: Configuration file I/O and parsing errors
//! - `ExportError`: CSV export preconditions and I/O
//! - `ConnectionError`: Fetch worker runtime failures
//!
//! ## Recoverability
//! Every `FetchError` is recoverable: the session surfaces it as a message and
//! keeps the last good dataset, window and pointers untouched.

use std::fmt;

/// Errors that can occur while refreshing the dataset
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Network failure or non-success HTTP status
    Transport { status: Option<u16>, reason: String },
    /// Response JSON does not match any known shape
    UnexpectedResponseFormat(String),
    /// Well-formed response without data for the requested date
    NoDataForDate(String),
    /// A chunk inside the payload could not be decoded
    MalformedPayload(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport { status: Some(code), reason } => {
                write!(f, "Error: {} {}", code, reason)
            }
            FetchError::Transport { status: None, reason } => {
                write!(f, "Request failed: {}", reason)
            }
            FetchError::UnexpectedResponseFormat(detail) => {
                write!(f, "Unexpected server response format: {}", detail)
            }
            FetchError::NoDataForDate(date) => {
                write!(f, "No data available for {}", date)
            }
            FetchError::MalformedPayload(detail) => {
                write!(f, "Malformed payload: {}", detail)
            }
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transport {
            status: e.status().map(|s| s.as_u16()),
            reason: e.to_string(),
        }
    }
}

/// Filter parameters that would make the smoother produce NaN or Infinity
#[derive(Debug, Clone, PartialEq)]
pub enum FilterParamsError {
    /// Named parameter is NaN or infinite
    NonFinite(&'static str),
    /// Measurement noise must be strictly positive (the gain divides by `p + r`)
    NonPositiveMeasurementNoise(f64),
    /// Variances (`q`, `p0`) cannot be negative
    NegativeVariance(&'static str),
}

impl fmt::Display for FilterParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterParamsError::NonFinite(field) => {
                write!(f, "Filter parameter {} must be finite", field)
            }
            FilterParamsError::NonPositiveMeasurementNoise(r) => {
                write!(f, "Measurement noise R must be greater than zero (got {})", r)
            }
            FilterParamsError::NegativeVariance(field) => {
                write!(f, "Filter parameter {} must not be negative", field)
            }
        }
    }
}

impl std::error::Error for FilterParamsError {}

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
        }
    }
}

/// Errors that can occur during CSV export
#[derive(Debug)]
pub enum ExportError {
    /// Export only makes sense for a chosen replay date
    NotReplayMode,
    /// Nothing to write
    EmptyDataset,
    /// Failed to write the file
    Io(std::io::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::NotReplayMode => {
                write!(f, "Export is only available in replay mode with a selected date")
            }
            ExportError::EmptyDataset => {
                write!(f, "No data to export")
            }
            ExportError::Io(e) => {
                write!(f, "Failed to write export file: {}", e)
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

/// Errors that can occur in the fetch worker
#[derive(Debug)]
pub enum ConnectionError {
    /// Failed to create Tokio runtime
    RuntimeCreation(String),
    /// Worker already shut down, command could not be delivered
    Shutdown,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::RuntimeCreation(msg) => {
                write!(f, "Failed to create async runtime: {}", msg)
            }
            ConnectionError::Shutdown => {
                write!(f, "Fetch worker is no longer running")
            }
        }
    }
}

impl std::error::Error for ConnectionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = FetchError::Transport {
            status: Some(403),
            reason: "Forbidden".to_string(),
        };
        assert_eq!(err.to_string(), "Error: 403 Forbidden");
    }

    #[test]
    fn test_filter_error_display() {
        let err = FilterParamsError::NonPositiveMeasurementNoise(0.0);
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_config_error_chain() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::ReadFailed(io_err);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_export_error_chain() {
        use std::error::Error;
        assert!(ExportError::EmptyDataset.source().is_none());
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(ExportError::from(io_err).source().is_some());
    }
}
