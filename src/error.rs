//! Error types for the timeline crate.

use thiserror::Error;

/// Errors raised by sensors, stores and the registry.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// A sensor or server option is missing or out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The sensor name cannot be used to build a scoped key pattern.
    #[error("invalid sensor name {name:?}: {reason}")]
    InvalidSensorName { name: String, reason: String },

    /// A query range whose start is not strictly before its end.
    #[error("invalid time range: from={from}, till={till}")]
    InvalidRange { from: i64, till: i64 },

    /// An event value that cannot be stored.
    #[error("invalid value: {0}")]
    InvalidValue(f64),

    /// The backing store failed; never retried here.
    #[error("store error: {0}")]
    Store(String),

    /// A stored value could not be decoded.
    #[error("corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("sensor '{0}' already registered")]
    SensorExists(String),

    #[error("sensor '{0}' not found")]
    SensorNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redis::RedisError> for TimelineError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(err.to_string())
    }
}

/// Result type for timeline operations.
pub type Result<T> = std::result::Result<T, TimelineError>;
