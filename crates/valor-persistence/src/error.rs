//! Error types for persistence operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Failed to create a directory.
    #[error("failed to create directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read a file.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON encode/decode failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
