//! Work items: the unit of agent work created from an accepted message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority of a work item.
///
/// Live messages enqueue at `Normal`; catch-up replays enqueue at
/// `Low` so a startup backlog never starves live traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkPriority {
    Low,
    Normal,
}

impl Default for WorkPriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Derives the work slug for a chat/message pair.
///
/// Negative chat ids (Telegram group chats) are normalized so the slug
/// stays usable as a directory and branch name component.
pub fn slug_for(chat_id: i64, message_id: i64) -> String {
    format!("{}-{}", chat_id.unsigned_abs(), message_id)
}

/// Derives the deterministic session id for a chat/message pair.
///
/// Determinism is load-bearing: a catch-up replay and a live retry of
/// the same message produce the same session id and therefore collide
/// in the dedup store instead of spawning duplicate sessions.
pub fn session_id_for(chat_id: i64, message_id: i64) -> String {
    format!("tg-{}", slug_for(chat_id, message_id))
}

/// A unit of work handed to the external agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Slug correlating worktree directory and branch name.
    pub slug: String,

    /// Deterministic session id correlating worktree, branch, and logs.
    pub session_id: String,

    /// Key of the resolved project.
    pub project_key: String,

    /// Working directory of the resolved project.
    pub working_dir: String,

    /// Message text after trigger stripping.
    pub text: String,

    /// Display name of the requesting sender.
    pub sender_name: String,

    /// Sender identifier.
    pub sender_id: i64,

    /// Originating chat id.
    pub chat_id: i64,

    /// Originating message id.
    pub message_id: i64,

    /// Originating chat title, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_title: Option<String>,

    /// Queue priority.
    #[serde(default)]
    pub priority: WorkPriority,

    /// When the item was created.
    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    /// Creates a work item for a message, deriving slug and session id.
    pub fn for_message(
        project_key: impl Into<String>,
        working_dir: impl Into<String>,
        chat_id: i64,
        message_id: i64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug_for(chat_id, message_id),
            session_id: session_id_for(chat_id, message_id),
            project_key: project_key.into(),
            working_dir: working_dir.into(),
            text: text.into(),
            sender_name: String::new(),
            sender_id: 0,
            chat_id,
            message_id,
            chat_title: None,
            priority: WorkPriority::Normal,
            created_at: Utc::now(),
        }
    }

    /// Sets the sender identity.
    pub fn from_sender(mut self, sender_id: i64, sender_name: impl Into<String>) -> Self {
        self.sender_id = sender_id;
        self.sender_name = sender_name.into();
        self
    }

    /// Sets the originating chat title.
    pub fn in_chat(mut self, title: impl Into<String>) -> Self {
        self.chat_title = Some(title.into());
        self
    }

    /// Sets the queue priority.
    pub fn with_priority(mut self, priority: WorkPriority) -> Self {
        self.priority = priority;
        self
    }
}
