//! Session lifecycle types and snapshot schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// State of a work session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Work item created, worktree not yet provisioned.
    #[default]
    Created,
    /// Worktree exists and the external agent is running.
    Running,
    /// Waiting on human input.
    Paused,
    /// Finished successfully; worktree torn down.
    Complete,
    /// Failed or timed out; worktree torn down.
    Error,
}

impl SessionState {
    /// Terminal states trigger worktree teardown and a final snapshot.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// Lifecycle transition labels recorded by the snapshot logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    Create,
    Resume,
    Pause,
    Complete,
    Error,
}

impl SessionEvent {
    /// The state the session lands in after this transition.
    pub fn state(self) -> SessionState {
        match self {
            Self::Create => SessionState::Created,
            Self::Resume => SessionState::Running,
            Self::Pause => SessionState::Paused,
            Self::Complete => SessionState::Complete,
            Self::Error => SessionState::Error,
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Resume => "resume",
            Self::Pause => "pause",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One structured snapshot of a session at a lifecycle transition.
///
/// Append-only: one file per (session, event, timestamp), never
/// mutated after write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub event: SessionEvent,
    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,

    /// Bounded tail of recent conversation messages.
    #[serde(default)]
    pub messages: Vec<String>,

    /// Free-text summary of the task at snapshot time.
    #[serde(default)]
    pub task_summary: String,

    /// Best-effort `git status`/`git log` excerpt.
    #[serde(default)]
    pub git_status: String,

    /// Arbitrary extra context supplied by the caller.
    #[serde(default)]
    pub extra_context: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        assert_eq!(SessionState::default(), SessionState::Created);
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Complete.is_terminal());
        assert!(SessionState::Error.is_terminal());
        assert!(!SessionState::Running.is_terminal());
        assert!(!SessionState::Paused.is_terminal());
        assert!(!SessionState::Created.is_terminal());
    }

    #[test]
    fn test_event_display_matches_serde() {
        for event in [
            SessionEvent::Create,
            SessionEvent::Resume,
            SessionEvent::Pause,
            SessionEvent::Complete,
            SessionEvent::Error,
        ] {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event));
        }
    }

    #[test]
    fn test_event_state_mapping() {
        assert_eq!(SessionEvent::Create.state(), SessionState::Created);
        assert_eq!(SessionEvent::Resume.state(), SessionState::Running);
        assert_eq!(SessionEvent::Pause.state(), SessionState::Paused);
        // Exactly the terminal events map to terminal states.
        assert!(SessionEvent::Complete.state().is_terminal());
        assert!(SessionEvent::Error.state().is_terminal());
        assert!(!SessionEvent::Pause.state().is_terminal());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut extra = HashMap::new();
        extra.insert("pr_url".to_string(), serde_json::json!("https://example.test/pr/1"));

        let snapshot = SessionSnapshot {
            session_id: "tg-1-2".to_string(),
            event: SessionEvent::Complete,
            timestamp: Utc::now(),
            project_key: Some("alpha".to_string()),
            branch_name: Some("session/1-2".to_string()),
            messages: vec!["please build X".to_string()],
            task_summary: "built X".to_string(),
            git_status: "clean".to_string(),
            extra_context: extra,
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: SessionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.session_id, "tg-1-2");
        assert_eq!(parsed.event, SessionEvent::Complete);
        assert_eq!(parsed.branch_name.as_deref(), Some("session/1-2"));
        assert_eq!(parsed.messages.len(), 1);
    }
}
