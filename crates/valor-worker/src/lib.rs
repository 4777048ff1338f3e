//! The Valor worker: consumes spooled work items and runs each one as
//! an agent session inside an isolated git worktree.
//!
//! The worker owns the session lifecycle between enqueue and reply:
//! claim a spool file, provision the worktree, run the agent command,
//! close out the branch per project policy, snapshot every transition,
//! and leave the reply in the outbox for the bot to deliver.

pub mod error;
pub mod session;
pub mod spool;

pub use error::{Result, WorkerError};
pub use session::{AgentCommand, SessionOutcome, SessionRunner};
pub use spool::SpoolConsumer;
