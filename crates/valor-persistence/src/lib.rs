//! Persistence layer for Valor.
//!
//! Crash-safe JSON file writes, the session snapshot logger that
//! records lifecycle transitions under `logs/sessions/`, and the reply
//! outbox shared between the worker and the bot.

pub mod atomic;
pub mod error;
pub mod outbox;
pub mod snapshot;

pub use atomic::{atomic_write, atomic_write_json, read_json, read_json_optional};
pub use error::{PersistenceError, Result};
pub use outbox::{Outbox, OutboundReply};
pub use snapshot::{SnapshotContext, SnapshotLogger};
