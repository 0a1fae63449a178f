//! Core error types for eyerest-core.
//!
//! Nothing in the break timer path is fatal: store errors surface to the
//! caller of a command, sync errors are logged and dropped by the
//! coordinator, and malformed persisted values fall back to defaults.

use std::path::PathBuf;
use thiserror::Error;

pub use crate::sync::SyncError;

/// Core error type for eyerest-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Preference store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote sync errors
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Device id errors
    #[error("Device id error: {0}")]
    DeviceId(#[from] crate::sync::DeviceIdError),
}

/// Preference store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the database file
    #[error("Failed to open preference store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked by another process
    #[error("Preference store is locked")]
    Locked,

    /// The in-process lock guarding the store was poisoned by a panic
    #[error("Preference store lock poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StoreError::Locked
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_errors_map_to_query_failed() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::QueryFailed(_)));
    }

    #[test]
    fn store_error_wraps_into_core_error() {
        let err: CoreError = StoreError::Poisoned.into();
        assert_eq!(err.to_string(), "Store error: Preference store lock poisoned");
    }
}
