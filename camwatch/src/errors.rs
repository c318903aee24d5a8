//! Error types for the camera monitor

use thiserror::Error;

/// Main error type for the camera monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {reason}")]
    ConfigError { field: String, reason: String },

    #[error("Device enumeration error: {0}")]
    EnumerationError(String),

    #[error("Event source unavailable: {0}")]
    EventSourceUnavailable(String),

    #[error("Event source error: {0}")]
    EventSourceError(String),

    #[error("Logging error: {0}")]
    LoggingError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MonitorError {
    /// Build a configuration error naming the offending field
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        MonitorError::ConfigError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Name of the offending configuration field, if this is a configuration error
    pub fn config_field(&self) -> Option<&str> {
        match self {
            MonitorError::ConfigError { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for MonitorError {
    fn from(err: anyhow::Error) -> Self {
        MonitorError::Internal(err.to_string())
    }
}
