//! Error types for agent slot registration.
//!
//! Most failures inside the registration protocol are recovered locally (a
//! corrupt record is skipped, a stale lock is cleared). The variants here
//! cover what is left: filesystem failures the protocol cannot route around,
//! worker registry failures, and caller mistakes.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the agent-slots library.
#[derive(Debug, Error)]
pub enum SlotError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Worker registry errors
    #[error("Worker registry error: {message}")]
    Registry {
        message: String,
        status_code: Option<u16>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },
}

/// Result type alias for agent-slots operations.
pub type Result<T> = std::result::Result<T, SlotError>;

impl From<std::io::Error> for SlotError {
    fn from(err: std::io::Error) -> Self {
        SlotError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for SlotError {
    fn from(err: serde_json::Error) -> Self {
        SlotError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for SlotError {
    fn from(err: reqwest::Error) -> Self {
        SlotError::Registry {
            message: err.to_string(),
            status_code: err.status().map(|s| s.as_u16()),
        }
    }
}

impl SlotError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        SlotError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }
}
