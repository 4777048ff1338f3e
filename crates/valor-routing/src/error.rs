//! Error types for routing operations.

use thiserror::Error;

/// Errors that can occur in the routing core.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Human-input reason was empty or whitespace-only.
    #[error("human input reason must not be empty")]
    EmptyReason,

    /// The dedup backend could not be read or written.
    #[error("dedup backend error: {0}")]
    DedupBackend(String),

    /// A chat history fetch failed.
    #[error("history fetch failed for '{chat}': {reason}")]
    HistoryFetch { chat: String, reason: String },

    /// A job could not be enqueued.
    #[error("enqueue failed: {0}")]
    Enqueue(String),
}

/// Result type for routing operations.
pub type Result<T> = std::result::Result<T, RoutingError>;
