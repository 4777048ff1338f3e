//! Error types for branch completion.

use thiserror::Error;

/// Errors that can occur completing a branch.
#[derive(Debug, Error)]
pub enum GitOpsError {
    /// A git or host-CLI command failed; carries the tool's own
    /// stderr verbatim.
    #[error("command failed: {0}")]
    CommandFailed(String),

    /// A command could not be run at all (spawn failure, timeout).
    #[error(transparent)]
    Exec(#[from] valor_core::ExecError),
}

/// Result type for branch-completion operations.
pub type Result<T> = std::result::Result<T, GitOpsError>;
