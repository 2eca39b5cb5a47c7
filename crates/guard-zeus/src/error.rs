//! Error types for guard-zeus.
//!
//! Only conditions the supervisor cannot reason about surface here. Stale
//! sockets, already-reaped children and missing files during cleanup are
//! handled where they occur and never become a `ZeusError`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the guard-zeus library.
#[derive(Debug, Error)]
pub enum ZeusError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Invalid boot plan {path}: {message}")]
    BootPlan { path: PathBuf, message: String },

    // Process errors
    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to send {signal} to process {pid}: {message}")]
    Signal {
        pid: u32,
        signal: &'static str,
        message: String,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for guard-zeus operations.
pub type Result<T> = std::result::Result<T, ZeusError>;

impl From<std::io::Error> for ZeusError {
    fn from(err: std::io::Error) -> Self {
        ZeusError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ZeusError {
    fn from(err: serde_json::Error) -> Self {
        ZeusError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ZeusError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ZeusError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }
}
