//! File-spool job queue.
//!
//! Accepted work items land as JSON files under
//! `{spool}/{priority}/{session_id}.json`. An external worker consumes
//! the spool; this side only writes, atomically, so a half-written
//! payload can never be picked up.

use std::path::PathBuf;

use tracing::debug;

use valor_models::{WorkItem, WorkPriority};
use valor_persistence::atomic_write_json;
use valor_routing::{JobQueue, Result, RoutingError};

/// Job queue backed by a priority-partitioned spool directory.
pub struct SpoolQueue {
    root: PathBuf,
}

impl SpoolQueue {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The spool file an item is written to.
    pub fn path_for(&self, item: &WorkItem) -> PathBuf {
        self.root
            .join(priority_dir(item.priority))
            .join(format!("{}.json", item.session_id))
    }
}

fn priority_dir(priority: WorkPriority) -> &'static str {
    match priority {
        WorkPriority::Low => "low",
        WorkPriority::Normal => "normal",
    }
}

impl JobQueue for SpoolQueue {
    fn enqueue(&self, item: &WorkItem) -> Result<()> {
        let path = self.path_for(item);
        atomic_write_json(&path, item).map_err(|e| RoutingError::Enqueue(e.to_string()))?;
        debug!(session_id = %item.session_id, path = %path.display(), "Work item spooled");
        Ok(())
    }
}
