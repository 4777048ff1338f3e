//! Telegram bot interface for Valor.
//!
//! The binary wires the routing core to a live transport: a teloxide
//! dispatcher feeds inbound messages through resolve/route/dedup, a
//! file spool receives accepted work items, and an HTTP client against
//! the history sidecar powers the startup catch-up scan.

pub mod bot;
pub mod error;
pub mod history;
pub mod queue;
pub mod state;

pub use bot::ValorBot;
pub use error::{Result, TelegramError};
pub use history::HttpHistoryClient;
pub use queue::SpoolQueue;
pub use state::{AppState, HandleOutcome};
