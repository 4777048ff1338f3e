//! The PR manager: pushes session branches and opens pull requests.

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use valor_core::exec::run_with_timeout;
use valor_models::ProjectConfig;

use crate::error::{GitOpsError, Result};
use crate::plan::build_pr_body;

/// Timeout for push and PR creation. Network-bound, so generous.
const HOST_TIMEOUT: Duration = Duration::from_secs(120);

const BRANCH_PREFIX: &str = "session/";

/// Whether this project's completed branches go through a PR instead
/// of staying as a plain pushed branch.
pub fn is_pr_required(project: &ProjectConfig) -> bool {
    project.source_control.prefer_pr
}

/// Derives a human-readable PR title from a branch name: strips the
/// session prefix, replaces separators with spaces, and title-cases
/// each word.
pub fn title_from_branch(branch: &str) -> String {
    let stem = branch.strip_prefix(BRANCH_PREFIX).unwrap_or(branch);
    stem.split(['-', '_', '/'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Outcome of completing a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Branch pushed; project policy did not call for a PR.
    Pushed { branch: String },
    /// Branch pushed and a PR opened.
    PullRequest { url: String },
    /// Completion failed; carries the failing tool's output verbatim.
    /// When `pushed` is true the branch exists on the remote but PR
    /// creation failed, which the caller must still report as failed.
    Failed { pushed: bool, error: String },
}

impl Completion {
    pub fn success(&self) -> bool {
        !matches!(self, Completion::Failed { .. })
    }
}

/// Closes out finished session branches per project policy.
pub struct PrManager;

impl PrManager {
    pub fn new() -> Self {
        Self
    }

    /// Pushes `branch` from the project's working directory and, when
    /// the project prefers PRs, opens one via the host CLI.
    ///
    /// Push and create are separate steps. A create failure after a
    /// successful push is reported as [`Completion::Failed`] with
    /// `pushed: true`; nothing is retried here.
    pub async fn complete_work(
        &self,
        project: &ProjectConfig,
        branch: &str,
        plan_file: Option<&Path>,
    ) -> Completion {
        let repo = Path::new(&project.working_dir);

        if let Err(e) = self.push(repo, branch).await {
            warn!(branch = %branch, error = %e, "Branch push failed");
            return Completion::Failed {
                pushed: false,
                error: e.to_string(),
            };
        }
        info!(branch = %branch, project = %project.key, "Branch pushed");

        if !is_pr_required(project) {
            return Completion::Pushed {
                branch: branch.to_string(),
            };
        }

        let title = title_from_branch(branch);
        let body = build_pr_body(plan_file);
        match self.create_pr(repo, branch, &title, &body).await {
            Ok(url) => {
                info!(branch = %branch, url = %url, "Pull request opened");
                Completion::PullRequest { url }
            }
            Err(e) => {
                warn!(branch = %branch, error = %e, "PR creation failed after push");
                Completion::Failed {
                    pushed: true,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Closes an issue on the host with a comment.
    pub async fn close_issue(&self, repo: &Path, number: u64, comment: &str) -> Result<()> {
        let number = number.to_string();
        self.host(
            repo,
            &["issue", "close", &number, "--comment", comment],
        )
        .await?;
        info!(issue = %number, "Issue closed");
        Ok(())
    }

    async fn push(&self, repo: &Path, branch: &str) -> Result<()> {
        self.checked(repo, "git", &["push", "-u", "origin", branch])
            .await?;
        Ok(())
    }

    /// Runs `gh pr create` and returns the PR URL it prints.
    async fn create_pr(&self, repo: &Path, branch: &str, title: &str, body: &str) -> Result<String> {
        let stdout = self
            .host(
                repo,
                &[
                    "pr", "create", "--head", branch, "--title", title, "--body", body,
                ],
            )
            .await?;
        Ok(stdout.trim().to_string())
    }

    async fn host(&self, repo: &Path, args: &[&str]) -> Result<String> {
        self.checked(repo, "gh", args).await
    }

    /// Runs a command, mapping non-zero exits to
    /// [`GitOpsError::CommandFailed`] with the tool's output preserved.
    async fn checked(&self, repo: &Path, program: &str, args: &[&str]) -> Result<String> {
        let out = run_with_timeout(program, args, Some(repo), HOST_TIMEOUT).await?;
        if out.success() {
            Ok(out.stdout)
        } else {
            Err(GitOpsError::CommandFailed(
                out.failure_text().trim().to_string(),
            ))
        }
    }
}

impl Default for PrManager {
    fn default() -> Self {
        Self::new()
    }
}
