//! Error types for the spikefeat system.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the spikefeat system.
///
/// Only construction-time problems are errors. Numeric guards inside the
/// engines never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed bar (non-finite or negative fields, inconsistent OHLC).
    #[error("Invalid bar: {0}")]
    InvalidBar(String),

    /// Bar arrived with a timestamp older than the last accepted bar.
    #[error("Out-of-order bar: ts {ts_ms} is before last accepted ts {last_ts_ms}")]
    OutOfOrder { ts_ms: i64, last_ts_ms: i64 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an invalid bar error.
    pub fn invalid_bar(msg: impl Into<String>) -> Self {
        Error::InvalidBar(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::config("rsi_period must be >= 2").to_string(),
            "Configuration error: rsi_period must be >= 2"
        );
        let err = Error::OutOfOrder {
            ts_ms: 1_000,
            last_ts_ms: 2_000,
        };
        assert!(err.to_string().contains("before last accepted ts 2000"));
        assert!(matches!(Error::invalid_bar("nan close"), Error::InvalidBar(_)));
    }
}
