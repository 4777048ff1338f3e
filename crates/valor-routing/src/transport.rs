//! Traits for external collaborators.
//!
//! The routing core consumes chat history and a job queue but owns
//! neither: the transport is whatever can read a chat's recent
//! messages, and the queue is whatever executes agent work. Both are
//! kept behind traits so the scanner and router stay testable with
//! in-memory fakes.

use std::future::Future;

use valor_models::{InboundMessage, WorkItem};

use crate::error::Result;

/// Read access to a chat's recent history, newest first.
///
/// Implementations must return messages in reverse chronological
/// order; the catch-up scanner's early-stop depends on it. If an
/// implementation cannot guarantee that, correctness degrades to
/// "scanned the wrong window".
pub trait ChatHistory {
    /// Fetches up to `limit` most recent messages for a chat.
    fn fetch_recent(
        &self,
        chat_title: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<InboundMessage>>> + Send;
}

/// Destination for accepted work items.
///
/// Implemented outside the routing core (file spool, HTTP queue, ...).
/// Enqueueing must be cheap; the heavy lifting happens in whatever
/// consumes the queue.
pub trait JobQueue: Send + Sync {
    /// Enqueues one work item.
    fn enqueue(&self, item: &WorkItem) -> Result<()>;
}
