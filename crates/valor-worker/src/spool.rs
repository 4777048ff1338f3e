//! Spool consumption: claiming work items from the file queue.
//!
//! The bot writes `{spool}/{priority}/{session_id}.json`; the worker
//! claims a file by renaming it into `{spool}/active/`. The rename is
//! the claim: it either succeeds for exactly one worker or fails
//! because someone else got there first.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use valor_models::WorkItem;

use crate::error::Result;

/// Priority directories in consumption order.
const PRIORITY_DIRS: &[&str] = &["normal", "low"];

const ACTIVE_SUBDIR: &str = "active";
const FAILED_SUBDIR: &str = "failed";

/// Claims and retires work items from a spool directory.
pub struct SpoolConsumer {
    root: PathBuf,
}

impl SpoolConsumer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Claims the next work item: normal priority before low, oldest
    /// file first within a priority.
    ///
    /// Returns the claimed file (now under `active/`) and the parsed
    /// item. A file that cannot be parsed is moved to `failed/` and
    /// the scan continues.
    pub fn claim_next(&self) -> Result<Option<(PathBuf, WorkItem)>> {
        for dir in PRIORITY_DIRS {
            let mut candidates = list_spool_files(&self.root.join(dir));
            candidates.sort_by_key(|(mtime, _)| *mtime);

            for (_, path) in candidates {
                let Some(claimed) = self.claim(&path)? else {
                    continue;
                };

                match parse_item(&claimed) {
                    Some(item) => {
                        debug!(session_id = %item.session_id, "Work item claimed");
                        return Ok(Some((claimed, item)));
                    }
                    None => {
                        warn!(path = %claimed.display(), "Unparsable spool file, quarantining");
                        self.quarantine(&claimed)?;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Retires a finished item's claim file.
    pub fn finish(&self, claimed: &Path) {
        if let Err(e) = std::fs::remove_file(claimed) {
            warn!(path = %claimed.display(), error = %e, "Failed to remove claimed file");
        }
    }

    /// Moves a claim file into `failed/` for later inspection.
    pub fn quarantine(&self, claimed: &Path) -> Result<()> {
        let failed = self.root.join(FAILED_SUBDIR);
        std::fs::create_dir_all(&failed)?;
        let name = claimed.file_name().unwrap_or_default();
        std::fs::rename(claimed, failed.join(name))?;
        Ok(())
    }

    /// Atomically claims one spool file by renaming it into `active/`.
    /// Returns `None` when another worker claimed it first.
    fn claim(&self, path: &Path) -> Result<Option<PathBuf>> {
        let active = self.root.join(ACTIVE_SUBDIR);
        std::fs::create_dir_all(&active)?;

        let name = path.file_name().unwrap_or_default();
        let target = active.join(name);
        match std::fs::rename(path, &target) {
            Ok(()) => Ok(Some(target)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn list_spool_files(dir: &Path) -> Vec<(SystemTime, PathBuf)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .map(|p| {
            let mtime = p
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (mtime, p)
        })
        .collect()
}

fn parse_item(path: &Path) -> Option<WorkItem> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}
