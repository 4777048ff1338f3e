//! Shared process-wide concerns for Valor.
//!
//! Two things live here: the state-directory layout every crate
//! agrees on, and the timeout-bounded runner used for every external
//! process invocation (git, the source-control host CLI). Nothing in
//! this crate knows about chats, projects, or sessions.

pub mod config;
pub mod exec;

pub use exec::{run_with_timeout, CommandOutput, ExecError};
