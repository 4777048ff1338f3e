//! File-based reply outbox.
//!
//! The worker cannot talk to Telegram itself, so finished sessions
//! leave their reply as a JSON file in the outbox directory. The bot
//! polls the directory and sends whatever it finds. One file per
//! reply, written atomically, removed after a successful send.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::atomic::atomic_write_json;
use crate::error::Result;

static SEQ: AtomicU64 = AtomicU64::new(0);

/// A reply waiting to be delivered to a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundReply {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OutboundReply {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            session_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn for_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Writes and drains reply files in a shared directory.
pub struct Outbox {
    dir: PathBuf,
}

impl Outbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Queues one reply for delivery.
    ///
    /// File names embed a millisecond timestamp plus a process-local
    /// sequence number, so drains see replies in write order.
    pub fn push(&self, reply: &OutboundReply) -> Result<PathBuf> {
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{:013}_{:06}_{}.json",
            reply.created_at.timestamp_millis(),
            seq,
            reply.chat_id.unsigned_abs()
        );
        let path = self.dir.join(name);
        atomic_write_json(&path, reply)?;
        Ok(path)
    }

    /// Removes and returns all queued replies, oldest first.
    ///
    /// An unreadable file is logged and deleted rather than replayed
    /// forever.
    pub fn drain(&self) -> Vec<OutboundReply> {
        let mut paths: Vec<PathBuf> = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect(),
            Err(_) => return Vec::new(),
        };
        paths.sort();

        let mut replies = Vec::with_capacity(paths.len());
        for path in paths {
            match read_reply(&path) {
                Some(reply) => replies.push(reply),
                None => warn!(path = %path.display(), "Dropping unreadable outbox file"),
            }
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove outbox file");
            }
        }
        replies
    }
}

fn read_reply(path: &Path) -> Option<OutboundReply> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}
