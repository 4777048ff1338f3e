//! Per-chat deduplication of handled message ids.
//!
//! The dedup store is the single shared mutable resource touched by
//! both the live message path and the catch-up scanner, and the only
//! serialization point between them. Writing the same id twice is
//! harmless, so `record` only needs to be at-least-once.
//!
//! Failure posture: the store fails OPEN. If the backend is
//! unreachable, `is_duplicate` answers `false` and processing
//! continues — missing a response is worse than the occasional
//! duplicate during an outage.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use valor_persistence::{atomic_write_json, read_json_optional};

use crate::error::{Result, RoutingError};

/// Sliding TTL: a chat's set expires this long after its last write.
pub const DEDUP_TTL_SECS: i64 = 2 * 60 * 60;

/// Default per-chat cap on retained message ids.
pub const DEFAULT_CAP: usize = 200;

/// One chat's set of handled message ids with its expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDedupSet {
    /// Handled message ids, ordered numerically (oldest first).
    pub ids: BTreeSet<i64>,
    /// When this set expires; extended on every write.
    pub expires_at: DateTime<Utc>,
}

impl ChatDedupSet {
    fn empty(ttl: Duration) -> Self {
        Self {
            ids: BTreeSet::new(),
            expires_at: Utc::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Storage backend for dedup sets.
///
/// Implementations may fail (an unreachable shared store); the
/// [`DedupStore`] wrapping them converts failures into fail-open
/// behavior rather than propagating.
pub trait DedupBackend: Send + Sync {
    /// Loads one chat's set, `None` if the chat has no record.
    fn load(&self, chat_id: i64) -> Result<Option<ChatDedupSet>>;

    /// Stores one chat's set.
    fn store(&self, chat_id: i64, set: &ChatDedupSet) -> Result<()>;
}

/// In-process backend. Infallible; state is lost on restart, which the
/// catch-up scanner compensates for.
#[derive(Default)]
pub struct MemoryBackend {
    sets: Mutex<HashMap<i64, ChatDedupSet>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DedupBackend for MemoryBackend {
    fn load(&self, chat_id: i64) -> Result<Option<ChatDedupSet>> {
        let sets = self
            .sets
            .lock()
            .map_err(|e| RoutingError::DedupBackend(e.to_string()))?;
        Ok(sets.get(&chat_id).cloned())
    }

    fn store(&self, chat_id: i64, set: &ChatDedupSet) -> Result<()> {
        let mut sets = self
            .sets
            .lock()
            .map_err(|e| RoutingError::DedupBackend(e.to_string()))?;
        sets.insert(chat_id, set.clone());
        Ok(())
    }
}

/// JSON-file backend: the full map is held in memory and flushed
/// atomically on every store, so dedup state survives restarts.
pub struct FileBackend {
    path: PathBuf,
    sets: Mutex<HashMap<i64, ChatDedupSet>>,
}

impl FileBackend {
    /// Opens the backend, loading any existing state. A malformed or
    /// unreadable file is logged and treated as empty rather than
    /// blocking startup.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sets = match read_json_optional::<HashMap<i64, ChatDedupSet>>(&path) {
            Ok(Some(sets)) => {
                debug!(chats = sets.len(), path = %path.display(), "Loaded dedup state");
                sets
            }
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to load dedup state, starting empty");
                HashMap::new()
            }
        };

        Self {
            path,
            sets: Mutex::new(sets),
        }
    }
}

impl DedupBackend for FileBackend {
    fn load(&self, chat_id: i64) -> Result<Option<ChatDedupSet>> {
        let sets = self
            .sets
            .lock()
            .map_err(|e| RoutingError::DedupBackend(e.to_string()))?;
        Ok(sets.get(&chat_id).cloned())
    }

    fn store(&self, chat_id: i64, set: &ChatDedupSet) -> Result<()> {
        let mut sets = self
            .sets
            .lock()
            .map_err(|e| RoutingError::DedupBackend(e.to_string()))?;
        sets.insert(chat_id, set.clone());
        atomic_write_json(&self.path, &*sets)
            .map_err(|e| RoutingError::DedupBackend(e.to_string()))
    }
}

/// Bounded, time-bounded per-chat dedup store.
pub struct DedupStore {
    backend: Box<dyn DedupBackend>,
    cap: usize,
    ttl: Duration,
}

impl DedupStore {
    /// Creates a store with the default cap and TTL.
    pub fn new(backend: Box<dyn DedupBackend>) -> Self {
        Self::with_cap(backend, DEFAULT_CAP)
    }

    /// Creates a store with a custom per-chat cap.
    pub fn with_cap(backend: Box<dyn DedupBackend>, cap: usize) -> Self {
        Self {
            backend,
            cap: cap.max(1),
            ttl: Duration::seconds(DEDUP_TTL_SECS),
        }
    }

    #[cfg(test)]
    fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Whether this chat+message pair was already handled.
    ///
    /// Backend failures fail open: the answer is `false` and the
    /// pipeline keeps moving.
    pub fn is_duplicate(&self, chat_id: i64, message_id: i64) -> bool {
        match self.backend.load(chat_id) {
            Ok(Some(set)) if !set.is_expired() => set.ids.contains(&message_id),
            Ok(_) => false,
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Dedup load failed, failing open");
                false
            }
        }
    }

    /// Records a handled message id, sliding the chat's expiry forward
    /// and trimming oversized sets.
    ///
    /// Best-effort: backend failures are logged, never propagated.
    pub fn record(&self, chat_id: i64, message_id: i64) {
        let mut set = match self.backend.load(chat_id) {
            Ok(Some(set)) if !set.is_expired() => set,
            Ok(_) => ChatDedupSet::empty(self.ttl),
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Dedup load failed, starting fresh set");
                ChatDedupSet::empty(self.ttl)
            }
        };

        set.ids.insert(message_id);
        set.expires_at = Utc::now() + self.ttl;

        // Bound growth for very chatty chats: past twice the cap, drop
        // the oldest ids and keep only the newest `cap`.
        if set.ids.len() > self.cap * 2 {
            let excess = set.ids.len() - self.cap;
            let cutoff: Vec<i64> = set.ids.iter().take(excess).copied().collect();
            for id in cutoff {
                set.ids.remove(&id);
            }
            debug!(chat_id = %chat_id, kept = set.ids.len(), "Trimmed dedup set");
        }

        if let Err(e) = self.backend.store(chat_id, &set) {
            warn!(chat_id = %chat_id, error = %e, "Dedup store failed, continuing");
        }
    }
}
