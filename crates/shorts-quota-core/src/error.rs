//! Core error types for shorts-quota-core.
//!
//! The taxonomy mirrors how each failure is treated by the contexts:
//! store failures are surfaced, delivery failures are swallowed by senders,
//! parse failures are skipped by whoever is iterating.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for shorts-quota-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistent store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Message delivery errors
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Day key / stored value parse errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a [`Store`](crate::storage::Store) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying medium cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the write
    #[error("Store quota exceeded")]
    QuotaExceeded,

    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Errors raised when a message cannot reach its recipient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// No listener registered for the tab
    #[error("No receiving end for tab {0}")]
    NoReceiver(u32),

    /// Background context is not listening
    #[error("Background context is not listening")]
    BackgroundUnavailable,

    /// The receiver does not handle this message kind
    #[error("Message '{0}' is not handled by this context")]
    Unhandled(&'static str),

    /// The receiver failed while handling the message
    #[error("Receiver failed: {0}")]
    Receiver(String),
}

/// Parse errors for day keys and stored values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Key does not carry the day-key prefix
    #[error("'{0}' is not a day key")]
    NotDayKey(String),

    /// Key has the prefix but not three numeric date parts
    #[error("Malformed day key '{0}'")]
    MalformedDayKey(String),

    /// Numeric parts do not form a calendar date
    #[error("Day key '{0}' does not name a calendar date")]
    InvalidDate(String),

    /// Stored value has the wrong shape
    #[error("Unexpected value under '{key}': {value}")]
    UnexpectedValue { key: String, value: String },

    /// Site match pattern is not `scheme://host/path`
    #[error("Invalid match pattern '{0}'")]
    InvalidPattern(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to locate or create the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => match inner.code {
                rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy => {
                    StoreError::Unavailable(err.to_string())
                }
                rusqlite::ErrorCode::DiskFull => StoreError::QuotaExceeded,
                _ => StoreError::QueryFailed(err.to_string()),
            },
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
