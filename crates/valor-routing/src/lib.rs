//! Message routing for Valor.
//!
//! This crate is the decision core of the agent session bridge: given
//! an inbound chat message it decides, exactly once, whether the
//! message deserves a response, and builds the work payload when it
//! does. It holds:
//!
//! - the project resolver (chat title -> project config)
//! - the message router (respond decision + trigger stripping)
//! - the dedup store (per-chat bounded sets of handled message ids)
//! - the catch-up scanner (startup reconciliation of missed messages)
//! - the escape hatch (explicit human-input requests)
//!
//! The chat transport and the job queue are external collaborators,
//! consumed through the traits in [`transport`].

pub mod catchup;
pub mod dedup;
pub mod error;
pub mod escalation;
pub mod resolver;
pub mod router;
pub mod transport;

pub use catchup::{CatchUpScanner, REPLY_SCAN_WINDOW};
pub use dedup::{ChatDedupSet, DedupBackend, DedupStore, FileBackend, MemoryBackend};
pub use error::{Result, RoutingError};
pub use escalation::{
    is_human_input_required, HumanInputSlot, PendingHumanInputRequest, HUMAN_INPUT_MARKER,
};
pub use resolver::ProjectResolver;
pub use router::{route, Decision, DEFAULT_GREETING};
pub use transport::{ChatHistory, JobQueue};
