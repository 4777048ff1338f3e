//! The worktree manager.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use valor_core::exec::{run_with_timeout, CommandOutput};

use crate::error::{Result, WorktreeError};

/// Timeout for individual git invocations.
const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Branch prefix for session branches.
const BRANCH_PREFIX: &str = "session/";

/// Gitignored files copied from the main tree into each new worktree
/// so the sandboxed agent sees equivalent local configuration.
const LOCAL_SETTINGS: &[&str] = &[".claude/settings.local.json"];

/// The branch name for a slug: always `session/{slug}`.
pub fn branch_for(slug: &str) -> String {
    format!("{}{}", BRANCH_PREFIX, slug)
}

/// One known worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub slug: String,
    pub path: PathBuf,
    pub branch: String,
}

/// Manages the lifecycle of session worktrees under a root directory.
///
/// Creation is idempotent and serialized per slug: two concurrent
/// creates for the same slug take turns (the second returns the
/// existing tree), while distinct slugs proceed fully in parallel.
pub struct WorktreeManager {
    worktrees_root: PathBuf,
    /// Per-slug creation locks.
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl WorktreeManager {
    /// Creates a manager rooted at the given worktrees directory.
    ///
    /// # Errors
    ///
    /// Returns [`WorktreeError::GitNotFound`] if git is unavailable.
    pub async fn new(worktrees_root: impl Into<PathBuf>) -> Result<Self> {
        let probe = run_with_timeout("git", &["--version"], None, GIT_TIMEOUT).await;
        match probe {
            Ok(out) if out.success() => {}
            _ => return Err(WorktreeError::GitNotFound),
        }

        Ok(Self {
            worktrees_root: worktrees_root.into(),
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// The directory a slug's worktree lives in.
    pub fn path_for(&self, slug: &str) -> PathBuf {
        self.worktrees_root.join(slug)
    }

    fn lock_for(&self, slug: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(slug.to_string()).or_default())
    }

    /// Creates the worktree for a slug, branching from `base_branch`.
    ///
    /// Idempotent: if the target directory already exists the existing
    /// path is returned and no new branch is created.
    pub async fn create(&self, repo: &Path, slug: &str, base_branch: &str) -> Result<PathBuf> {
        validate_slug(slug)?;
        let lock = self.lock_for(slug);
        let _guard = lock.lock().await;

        let path = self.path_for(slug);
        if path.exists() {
            debug!(slug = %slug, path = %path.display(), "Worktree already exists");
            return Ok(path);
        }

        std::fs::create_dir_all(&self.worktrees_root)?;

        let branch = branch_for(slug);
        let path_str = path.to_string_lossy().into_owned();
        self.git(
            repo,
            &["worktree", "add", "-b", &branch, &path_str, base_branch],
        )
        .await?;

        self.copy_local_settings(repo, &path);

        info!(slug = %slug, branch = %branch, path = %path.display(), "Worktree created");
        Ok(path)
    }

    /// Copies gitignored local settings into a fresh worktree.
    /// Best-effort: a missing source file is simply skipped.
    fn copy_local_settings(&self, repo: &Path, worktree: &Path) {
        for rel in LOCAL_SETTINGS {
            let src = repo.join(rel);
            if !src.is_file() {
                continue;
            }
            let dst = worktree.join(rel);
            if let Some(parent) = dst.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!(path = %dst.display(), error = %e, "Failed to prepare settings dir");
                    continue;
                }
            }
            match std::fs::copy(&src, &dst) {
                Ok(_) => debug!(file = rel, "Copied local settings into worktree"),
                Err(e) => warn!(file = rel, error = %e, "Failed to copy local settings"),
            }
        }
    }

    /// Removes a slug's worktree, forcefully discarding uncommitted
    /// changes, and optionally deletes its branch.
    ///
    /// Returns true when the tree (and, if requested, the branch) is
    /// gone afterwards. Failures are logged rather than propagated:
    /// teardown runs at the end of a session and must not mask the
    /// session's own outcome.
    pub async fn remove(&self, repo: &Path, slug: &str, delete_branch: bool) -> bool {
        let lock = self.lock_for(slug);
        let _guard = lock.lock().await;

        let path = self.path_for(slug);
        let path_str = path.to_string_lossy().into_owned();

        let mut ok = true;
        if path.exists() {
            match self
                .git(repo, &["worktree", "remove", "--force", &path_str])
                .await
            {
                Ok(_) => debug!(slug = %slug, "Worktree removed"),
                Err(e) => {
                    warn!(slug = %slug, error = %e, "git worktree remove failed");
                    ok = false;
                }
            }
        }

        if delete_branch {
            let branch = branch_for(slug);
            match self.git(repo, &["branch", "-D", &branch]).await {
                Ok(_) => debug!(branch = %branch, "Branch deleted"),
                Err(e) => {
                    warn!(branch = %branch, error = %e, "Branch delete failed");
                    ok = false;
                }
            }
        }

        ok
    }

    /// Lists session worktrees known to the repository.
    pub async fn list(&self, repo: &Path) -> Result<Vec<WorktreeInfo>> {
        let out = self.git(repo, &["worktree", "list", "--porcelain"]).await?;
        Ok(parse_worktree_list(&out.stdout))
    }

    /// Drops stale worktree references after external directory
    /// deletion.
    pub async fn prune(&self, repo: &Path) -> Result<()> {
        self.git(repo, &["worktree", "prune"]).await?;
        Ok(())
    }

    /// Runs git in `repo`, mapping non-zero exits to
    /// [`WorktreeError::CommandFailed`] with stderr preserved.
    async fn git(&self, repo: &Path, args: &[&str]) -> Result<CommandOutput> {
        let out = run_with_timeout("git", args, Some(repo), GIT_TIMEOUT).await?;
        if out.success() {
            Ok(out)
        } else {
            Err(WorktreeError::CommandFailed(
                out.failure_text().trim().to_string(),
            ))
        }
    }
}

fn validate_slug(slug: &str) -> Result<()> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(WorktreeError::InvalidSlug(slug.to_string()))
    }
}

/// Parses `git worktree list --porcelain` output into session entries.
/// Non-session worktrees (including the main tree) are filtered out.
fn parse_worktree_list(stdout: &str) -> Vec<WorktreeInfo> {
    let mut entries = Vec::new();
    let mut path: Option<PathBuf> = None;
    let mut branch: Option<String> = None;

    for line in stdout.lines().chain(std::iter::once("")) {
        if line.is_empty() {
            if let (Some(p), Some(b)) = (path.take(), branch.take()) {
                if let Some(slug) = b.strip_prefix(BRANCH_PREFIX) {
                    entries.push(WorktreeInfo {
                        slug: slug.to_string(),
                        path: p,
                        branch: b,
                    });
                }
            }
            path = None;
            branch = None;
        } else if let Some(p) = line.strip_prefix("worktree ") {
            path = Some(PathBuf::from(p));
        } else if let Some(r) = line.strip_prefix("branch ") {
            branch = Some(r.strip_prefix("refs/heads/").unwrap_or(r).to_string());
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn git_in(repo: &Path, args: &[&str]) {
        let out = run_with_timeout("git", args, Some(repo), GIT_TIMEOUT)
            .await
            .unwrap();
        assert!(out.success(), "git {:?} failed: {}", args, out.failure_text());
    }

    /// Initializes a repo with one commit on `main`.
    async fn init_repo(repo: &Path) {
        git_in(repo, &["init", "-b", "main"]).await;
        git_in(repo, &["config", "user.email", "test@example.com"]).await;
        git_in(repo, &["config", "user.name", "Test"]).await;
        std::fs::write(repo.join("README.md"), "# test\n").unwrap();
        git_in(repo, &["add", "."]).await;
        git_in(repo, &["commit", "-m", "initial"]).await;
    }

    #[test]
    fn test_branch_for() {
        assert_eq!(branch_for("100-5"), "session/100-5");
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("100-5").is_ok());
        assert!(validate_slug("abc_def-1").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("../escape").is_err());
        assert!(validate_slug("a b").is_err());
    }

    #[test]
    fn test_parse_worktree_list() {
        let porcelain = "\
worktree /repo
HEAD 1111111111111111111111111111111111111111
branch refs/heads/main

worktree /trees/100-5
HEAD 2222222222222222222222222222222222222222
branch refs/heads/session/100-5

worktree /trees/detached
HEAD 3333333333333333333333333333333333333333
detached
";
        let entries = parse_worktree_list(porcelain);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].slug, "100-5");
        assert_eq!(entries[0].branch, "session/100-5");
        assert_eq!(entries[0].path, PathBuf::from("/trees/100-5"));
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        init_repo(&repo).await;

        let manager = WorktreeManager::new(dir.path().join("trees")).await.unwrap();

        let first = manager.create(&repo, "100-5", "main").await.unwrap();
        assert!(first.join("README.md").exists());

        let second = manager.create(&repo, "100-5", "main").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_create_checks_out_session_branch() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        init_repo(&repo).await;

        let manager = WorktreeManager::new(dir.path().join("trees")).await.unwrap();
        let path = manager.create(&repo, "7-1", "main").await.unwrap();

        let out = run_with_timeout(
            "git",
            &["rev-parse", "--abbrev-ref", "HEAD"],
            Some(&path),
            GIT_TIMEOUT,
        )
        .await
        .unwrap();
        assert_eq!(out.stdout.trim(), "session/7-1");
    }

    #[tokio::test]
    async fn test_create_copies_local_settings() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        init_repo(&repo).await;

        std::fs::create_dir_all(repo.join(".claude")).unwrap();
        std::fs::write(repo.join(".claude/settings.local.json"), "{}").unwrap();

        let manager = WorktreeManager::new(dir.path().join("trees")).await.unwrap();
        let path = manager.create(&repo, "9-2", "main").await.unwrap();

        assert!(path.join(".claude/settings.local.json").exists());
    }

    #[tokio::test]
    async fn test_remove_deletes_tree_and_branch() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        init_repo(&repo).await;

        let manager = WorktreeManager::new(dir.path().join("trees")).await.unwrap();
        let path = manager.create(&repo, "3-3", "main").await.unwrap();
        // Uncommitted changes must not block removal.
        std::fs::write(path.join("scratch.txt"), "wip").unwrap();

        assert!(manager.remove(&repo, "3-3", true).await);
        assert!(!path.exists());

        let branches = run_with_timeout("git", &["branch", "--list"], Some(&repo), GIT_TIMEOUT)
            .await
            .unwrap();
        assert!(!branches.stdout.contains("session/3-3"));
    }

    #[tokio::test]
    async fn test_list_and_prune() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        init_repo(&repo).await;

        let manager = WorktreeManager::new(dir.path().join("trees")).await.unwrap();
        let path = manager.create(&repo, "4-4", "main").await.unwrap();

        let listed = manager.list(&repo).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].slug, "4-4");

        // External deletion, then prune drops the stale reference.
        std::fs::remove_dir_all(&path).unwrap();
        manager.prune(&repo).await.unwrap();

        let listed = manager.list(&repo).await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_creates_for_same_slug() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        init_repo(&repo).await;

        let manager = Arc::new(WorktreeManager::new(dir.path().join("trees")).await.unwrap());

        let a = {
            let m = Arc::clone(&manager);
            let repo = repo.clone();
            tokio::spawn(async move { m.create(&repo, "5-5", "main").await })
        };
        let b = {
            let m = Arc::clone(&manager);
            let repo = repo.clone();
            tokio::spawn(async move { m.create(&repo, "5-5", "main").await })
        };

        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
        assert_eq!(a, b);
    }
}
