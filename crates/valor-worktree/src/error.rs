//! Error types for worktree management.

use thiserror::Error;

/// Errors that can occur managing worktrees.
#[derive(Debug, Error)]
pub enum WorktreeError {
    /// git is not available in PATH.
    #[error("git not found in PATH")]
    GitNotFound,

    /// A git command failed; carries git's own stderr verbatim.
    #[error("git command failed: {0}")]
    CommandFailed(String),

    /// A git command could not be run at all (spawn failure, timeout).
    #[error(transparent)]
    Exec(#[from] valor_core::ExecError),

    /// Slug unusable as a directory/branch name component.
    #[error("invalid slug: {0:?}")]
    InvalidSlug(String),

    /// Filesystem failure outside of git.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for worktree operations.
pub type Result<T> = std::result::Result<T, WorktreeError>;
