//! Core data models for Valor.
//!
//! This crate provides the fundamental data types used throughout the
//! Valor system: project configuration, inbound chat messages, work
//! items, and session lifecycle types.

pub mod message;
pub mod project;
pub mod session;
pub mod work;

// Re-export main types
pub use message::InboundMessage;
pub use project::{ProjectConfig, ProjectsConfig, ResponsePolicy, SourceControl};
pub use session::{SessionEvent, SessionSnapshot, SessionState};
pub use work::{session_id_for, slug_for, WorkItem, WorkPriority};
