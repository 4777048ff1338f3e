//! Error types for the worker.

use thiserror::Error;

/// Errors that can occur in the worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Worktree provisioning or teardown failed.
    #[error(transparent)]
    Worktree(#[from] valor_worktree::WorktreeError),

    /// The agent command could not be run.
    #[error(transparent)]
    Exec(#[from] valor_core::ExecError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;
