//! Session snapshot logger.
//!
//! Records structured JSON snapshots at session lifecycle transitions
//! (resume, pause, complete, error). Snapshotting is strictly
//! best-effort: a failure to write a snapshot must never abort the
//! session it is describing, so [`SnapshotLogger::save`] logs a
//! warning and returns `None` instead of propagating errors.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tracing::{debug, warn};

use valor_core::exec::run_with_timeout;
use valor_models::{SessionEvent, SessionSnapshot};

use crate::atomic::atomic_write_json;

/// Timeout for the best-effort git excerpt capture.
const GIT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Placeholder recorded when git state cannot be captured.
const GIT_UNAVAILABLE: &str = "(git status unavailable)";

/// How many recent conversation messages a snapshot retains.
const MESSAGE_TAIL: usize = 20;

/// Caller-supplied context for one snapshot.
#[derive(Debug, Default)]
pub struct SnapshotContext {
    pub project_key: Option<String>,
    pub branch_name: Option<String>,
    /// Recent conversation messages; only the tail is kept.
    pub messages: Vec<String>,
    pub task_summary: String,
    pub extra_context: HashMap<String, serde_json::Value>,
    /// Directory to capture the git excerpt from, if any.
    pub working_dir: Option<PathBuf>,
}

/// Writes append-only session snapshots under a base directory.
///
/// Layout: `{base}/{session_id}/{unix_ts}_{event}.json`, one file per
/// snapshot, never overwritten after write.
pub struct SnapshotLogger {
    base: PathBuf,
}

impl SnapshotLogger {
    /// Creates a logger rooted at the given sessions directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Records one snapshot, returning its path on success.
    ///
    /// Never raises: any failure is logged as a warning and `None`
    /// is returned.
    pub async fn save(
        &self,
        session_id: &str,
        event: SessionEvent,
        mut ctx: SnapshotContext,
    ) -> Option<PathBuf> {
        let timestamp = Utc::now();

        let git_status = match ctx.working_dir.as_deref() {
            Some(dir) => capture_git_excerpt(dir).await,
            None => GIT_UNAVAILABLE.to_string(),
        };

        let tail_start = ctx.messages.len().saturating_sub(MESSAGE_TAIL);
        let snapshot = SessionSnapshot {
            session_id: session_id.to_string(),
            event,
            timestamp,
            project_key: ctx.project_key.take(),
            branch_name: ctx.branch_name.take(),
            messages: ctx.messages.split_off(tail_start),
            task_summary: ctx.task_summary,
            git_status,
            extra_context: ctx.extra_context,
        };

        let path = self.unique_path(session_id, event, timestamp.timestamp());
        match atomic_write_json(&path, &snapshot) {
            Ok(()) => {
                debug!(session_id = %session_id, event = %event, path = %path.display(), "Snapshot saved");
                Some(path)
            }
            Err(e) => {
                warn!(session_id = %session_id, event = %event, error = %e, "Failed to save snapshot");
                None
            }
        }
    }

    /// Picks a filename that does not clobber an existing snapshot.
    /// Two snapshots of the same event within one second get a suffix.
    fn unique_path(&self, session_id: &str, event: SessionEvent, unix_ts: i64) -> PathBuf {
        let dir = self.base.join(session_id);
        let base_name = format!("{}_{}", unix_ts, event);
        let mut path = dir.join(format!("{}.json", base_name));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{}_{}.json", base_name, n));
            n += 1;
        }
        path
    }

    /// Deletes session directories whose newest file is older than
    /// `max_age`. An empty directory is treated as maximally old.
    ///
    /// Returns the number of directories removed. Individual failures
    /// are logged and skipped.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let entries = match std::fs::read_dir(&self.base) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let now = SystemTime::now();
        let mut removed = 0;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let expired = match newest_mtime(&path) {
                Some(mtime) => now
                    .duration_since(mtime)
                    .map(|age| age > max_age)
                    .unwrap_or(false),
                // Empty or unreadable: nothing worth keeping.
                None => true,
            };

            if expired {
                match std::fs::remove_dir_all(&path) {
                    Ok(()) => {
                        debug!(path = %path.display(), "Removed expired session snapshots");
                        removed += 1;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to remove session snapshots");
                    }
                }
            }
        }

        removed
    }
}

/// Captures a short `git status` + `git log` excerpt from a directory.
///
/// Resilient to git being missing or the directory not being a repo:
/// any failure yields the unavailable placeholder.
async fn capture_git_excerpt(dir: &Path) -> String {
    let status = run_with_timeout(
        "git",
        &["status", "--short", "--branch"],
        Some(dir),
        GIT_CAPTURE_TIMEOUT,
    )
    .await;

    let status_text = match status {
        Ok(out) if out.success() => out.stdout,
        _ => return GIT_UNAVAILABLE.to_string(),
    };

    let log = run_with_timeout(
        "git",
        &["log", "--oneline", "-5"],
        Some(dir),
        GIT_CAPTURE_TIMEOUT,
    )
    .await;

    match log {
        Ok(out) if out.success() => format!("{}\n{}", status_text.trim_end(), out.stdout.trim_end()),
        _ => status_text.trim_end().to_string(),
    }
}

/// Finds the newest mtime among a directory's direct children.
fn newest_mtime(dir: &Path) -> Option<SystemTime> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .filter_map(|e| e.metadata().ok())
        .filter_map(|m| m.modified().ok())
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn context_with_summary(summary: &str) -> SnapshotContext {
        SnapshotContext {
            task_summary: summary.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_writes_snapshot_file() {
        let dir = tempdir().unwrap();
        let logger = SnapshotLogger::new(dir.path());

        let path = logger
            .save("tg-1-2", SessionEvent::Resume, context_with_summary("resumed"))
            .await
            .unwrap();

        assert!(path.exists());
        assert!(path.to_string_lossy().contains("tg-1-2"));
        assert!(path.file_name().unwrap().to_string_lossy().contains("resume"));

        let snapshot: SessionSnapshot = crate::atomic::read_json(&path).unwrap();
        assert_eq!(snapshot.session_id, "tg-1-2");
        assert_eq!(snapshot.task_summary, "resumed");
        // No working dir supplied: placeholder, not an error.
        assert_eq!(snapshot.git_status, GIT_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_save_never_overwrites() {
        let dir = tempdir().unwrap();
        let logger = SnapshotLogger::new(dir.path());

        let first = logger
            .save("s", SessionEvent::Pause, SnapshotContext::default())
            .await
            .unwrap();
        let second = logger
            .save("s", SessionEvent::Pause, SnapshotContext::default())
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }

    #[tokio::test]
    async fn test_save_keeps_message_tail_only() {
        let dir = tempdir().unwrap();
        let logger = SnapshotLogger::new(dir.path());

        let ctx = SnapshotContext {
            messages: (0..50).map(|i| format!("msg {}", i)).collect(),
            ..Default::default()
        };
        let path = logger.save("s", SessionEvent::Complete, ctx).await.unwrap();

        let snapshot: SessionSnapshot = crate::atomic::read_json(&path).unwrap();
        assert_eq!(snapshot.messages.len(), MESSAGE_TAIL);
        assert_eq!(snapshot.messages.first().unwrap(), "msg 30");
        assert_eq!(snapshot.messages.last().unwrap(), "msg 49");
    }

    #[tokio::test]
    async fn test_save_to_unwritable_base_returns_none() {
        // A file where the base directory should be makes every write fail.
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("base");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let logger = SnapshotLogger::new(&blocker);
        let result = logger
            .save("s", SessionEvent::Error, SnapshotContext::default())
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_git_excerpt_from_non_repo_is_placeholder() {
        let dir = tempdir().unwrap();
        let logger = SnapshotLogger::new(dir.path().join("logs"));

        let ctx = SnapshotContext {
            working_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let path = logger.save("s", SessionEvent::Resume, ctx).await.unwrap();
        let snapshot: SessionSnapshot = crate::atomic::read_json(&path).unwrap();
        assert_eq!(snapshot.git_status, GIT_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_cleanup_removes_empty_session_dir() {
        let dir = tempdir().unwrap();
        let logger = SnapshotLogger::new(dir.path());
        std::fs::create_dir_all(dir.path().join("stale-session")).unwrap();

        let removed = logger.cleanup(Duration::from_secs(3600));
        assert_eq!(removed, 1);
        assert!(!dir.path().join("stale-session").exists());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_fresh_sessions() {
        let dir = tempdir().unwrap();
        let logger = SnapshotLogger::new(dir.path());

        logger
            .save("fresh", SessionEvent::Resume, SnapshotContext::default())
            .await
            .unwrap();

        let removed = logger.cleanup(Duration::from_secs(3600));
        assert_eq!(removed, 0);
        assert!(dir.path().join("fresh").exists());
    }

    #[test]
    fn test_cleanup_on_missing_base_is_noop() {
        let logger = SnapshotLogger::new("/nonexistent/valor-test-base");
        assert_eq!(logger.cleanup(Duration::from_secs(1)), 0);
    }
}
