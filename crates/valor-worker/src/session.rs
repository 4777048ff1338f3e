//! The session runner: one work item, start to finish.
//!
//! Lifecycle per item: provision worktree, snapshot `resume`, run the
//! agent command inside the tree, commit what it changed, close out
//! the branch per project policy, snapshot the terminal event, and
//! leave the reply in the outbox. An agent that asks for human input
//! pauses the session instead of completing it; its worktree stays in
//! place for the follow-up.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use valor_core::exec::run_with_timeout;
use valor_gitops::{branch_plan_file, Completion, PrManager};
use valor_models::{ProjectConfig, SessionEvent, WorkItem};
use valor_persistence::{Outbox, OutboundReply, SnapshotContext, SnapshotLogger};
use valor_routing::{is_human_input_required, HumanInputSlot};
use valor_worktree::{branch_for, WorktreeManager};

/// Branch sessions fork from.
const DEFAULT_BASE_BRANCH: &str = "main";

/// Timeout for git commit plumbing inside the worktree.
const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Telegram caps messages at 4096 chars; leave headroom for framing.
const REPLY_TAIL_CHARS: usize = 3500;

/// Environment variable naming the agent command.
pub const AGENT_CMD_ENV: &str = "VALOR_AGENT_CMD";

/// Environment variable overriding the agent timeout, in seconds.
pub const AGENT_TIMEOUT_ENV: &str = "VALOR_AGENT_TIMEOUT_SECS";

const DEFAULT_AGENT_CMD: &str = "claude";
const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 1800;

/// The opaque agent: text in, text out, files touched in the cwd.
pub struct AgentCommand {
    program: String,
    timeout: Duration,
}

impl AgentCommand {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Builds the command from the environment, with defaults.
    pub fn from_env() -> Self {
        let program =
            std::env::var(AGENT_CMD_ENV).unwrap_or_else(|_| DEFAULT_AGENT_CMD.to_string());
        let timeout = std::env::var(AGENT_TIMEOUT_ENV)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_AGENT_TIMEOUT_SECS);
        Self::new(program, Duration::from_secs(timeout))
    }

    /// Runs the agent in `cwd` with the task text as its prompt.
    /// Returns the agent's stdout, or the failure text on error.
    async fn run(&self, cwd: &Path, prompt: &str) -> Result<String, String> {
        let out = run_with_timeout(&self.program, &["-p", prompt], Some(cwd), self.timeout)
            .await
            .map_err(|e| e.to_string())?;
        if out.success() {
            Ok(out.stdout)
        } else {
            Err(out.failure_text().trim().to_string())
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Complete,
    /// Waiting on human input; worktree kept.
    Paused,
    Failed,
}

/// Drives one work item through its full lifecycle.
pub struct SessionRunner {
    worktrees: WorktreeManager,
    pr: PrManager,
    snapshots: SnapshotLogger,
    outbox: Outbox,
    agent: AgentCommand,
    /// Outstanding human-input request, if any. One slot: a newer
    /// request overwrites an older one.
    escalations: HumanInputSlot,
}

impl SessionRunner {
    pub fn new(
        worktrees: WorktreeManager,
        snapshots: SnapshotLogger,
        outbox: Outbox,
        agent: AgentCommand,
    ) -> Self {
        Self {
            worktrees,
            pr: PrManager::new(),
            snapshots,
            outbox,
            agent,
            escalations: HumanInputSlot::new(),
        }
    }

    /// The pending human-input request, if any.
    pub fn pending_escalation(&self) -> Option<valor_routing::PendingHumanInputRequest> {
        self.escalations.pending()
    }

    /// Runs one session. Every exit path replies to the chat and
    /// snapshots a terminal (or pause) event.
    pub async fn run(&self, project: Option<&ProjectConfig>, item: &WorkItem) -> SessionOutcome {
        let Some(project) = project else {
            warn!(session_id = %item.session_id, key = %item.project_key, "Unknown project");
            self.reply(
                item,
                "No project is configured for this chat, so I can't start work.",
            );
            self.snapshot(item, SessionEvent::Error, None, "unknown project", None)
                .await;
            return SessionOutcome::Failed;
        };

        let repo = Path::new(&project.working_dir);
        let branch = branch_for(&item.slug);

        let worktree = match self
            .worktrees
            .create(repo, &item.slug, DEFAULT_BASE_BRANCH)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!(session_id = %item.session_id, error = %e, "Worktree creation failed");
                self.reply(item, format!("Couldn't prepare a workspace: {e}"));
                self.snapshot(item, SessionEvent::Error, Some(&branch), &e.to_string(), None)
                    .await;
                return SessionOutcome::Failed;
            }
        };

        self.snapshot(item, SessionEvent::Resume, Some(&branch), &item.text, Some(&worktree))
            .await;
        info!(session_id = %item.session_id, branch = %branch, "Agent session started");

        let output = match self.agent.run(&worktree, &item.text).await {
            Ok(output) => output,
            Err(error) => {
                self.reply(item, format!("Agent run failed: {error}"));
                self.snapshot(item, SessionEvent::Error, Some(&branch), &error, Some(&worktree))
                    .await;
                self.teardown(repo, item, SessionEvent::Error, true).await;
                return SessionOutcome::Failed;
            }
        };

        if is_human_input_required(&output) {
            // The agent wants a decision; keep the tree for follow-up.
            self.reply(item, tail(&output));
            self.snapshot(item, SessionEvent::Pause, Some(&branch), &output, Some(&worktree))
                .await;
            info!(session_id = %item.session_id, "Session paused for human input");
            return SessionOutcome::Paused;
        }

        let committed = match self.commit_changes(&worktree, item).await {
            Ok(committed) => committed,
            Err(error) => {
                self.reply(item, format!("Couldn't commit the changes: {error}"));
                self.snapshot(item, SessionEvent::Error, Some(&branch), &error, Some(&worktree))
                    .await;
                self.teardown(repo, item, SessionEvent::Error, true).await;
                return SessionOutcome::Failed;
            }
        };

        if !committed {
            // Nothing to push; just relay what the agent said.
            self.reply(item, tail(&output));
            self.snapshot(item, SessionEvent::Complete, Some(&branch), &output, Some(&worktree))
                .await;
            self.teardown(repo, item, SessionEvent::Complete, true).await;
            return SessionOutcome::Complete;
        }

        let plan = branch_plan_file(&worktree);
        let completion = self
            .pr
            .complete_work(project, &branch, plan.as_deref())
            .await;

        match &completion {
            Completion::Pushed { branch } => {
                self.reply(
                    item,
                    format!("{}\n\nPushed branch `{}`.", tail(&output), branch),
                );
            }
            Completion::PullRequest { url } => {
                self.reply(item, format!("{}\n\nOpened PR: {}", tail(&output), url));
            }
            Completion::Failed { pushed, error } => {
                // Completion needs a human now; mark the reply so any
                // auto-continue logic backs off.
                let reason = if *pushed {
                    format!(
                        "PR creation for branch `{}` failed after push:\n{}",
                        branch, error
                    )
                } else {
                    format!("Push of branch `{}` failed:\n{}", branch, error)
                };
                match self.escalations.request(&reason, &[]) {
                    Ok(marked) => self.reply(item, marked),
                    Err(_) => self.reply(item, reason),
                }
                self.snapshot(item, SessionEvent::Error, Some(&branch), error, Some(&worktree))
                    .await;
                // The commit lives on the session branch, which stays
                // for inspection; the tree itself has no further use.
                self.teardown(repo, item, SessionEvent::Error, false).await;
                return SessionOutcome::Failed;
            }
        }

        self.snapshot(item, SessionEvent::Complete, Some(&branch), &output, Some(&worktree))
            .await;
        self.teardown(repo, item, SessionEvent::Complete, false).await;
        info!(session_id = %item.session_id, "Session complete");
        SessionOutcome::Complete
    }

    /// Tears the worktree down once the session reaches a terminal
    /// state. Non-terminal transitions (a pause) keep the tree in
    /// place for the follow-up.
    async fn teardown(&self, repo: &Path, item: &WorkItem, event: SessionEvent, delete_branch: bool) {
        if event.state().is_terminal() {
            self.worktrees.remove(repo, &item.slug, delete_branch).await;
        }
    }

    /// Stages and commits everything the agent changed.
    ///
    /// Returns false when the tree was left clean (nothing to commit).
    async fn commit_changes(&self, worktree: &Path, item: &WorkItem) -> Result<bool, String> {
        let status = self.git(worktree, &["status", "--porcelain"]).await?;
        if status.trim().is_empty() {
            return Ok(false);
        }

        self.git(worktree, &["add", "-A"]).await?;
        let subject = format!("Session {}: {}", item.session_id, summary_line(&item.text));
        self.git(worktree, &["commit", "-m", &subject]).await?;
        Ok(true)
    }

    async fn git(&self, cwd: &Path, args: &[&str]) -> Result<String, String> {
        let out = run_with_timeout("git", args, Some(cwd), GIT_TIMEOUT)
            .await
            .map_err(|e| e.to_string())?;
        if out.success() {
            Ok(out.stdout)
        } else {
            Err(out.failure_text().trim().to_string())
        }
    }

    fn reply(&self, item: &WorkItem, text: impl Into<String>) {
        let reply = OutboundReply::new(item.chat_id, text).for_session(&item.session_id);
        if let Err(e) = self.outbox.push(&reply) {
            warn!(session_id = %item.session_id, error = %e, "Failed to queue reply");
        }
    }

    async fn snapshot(
        &self,
        item: &WorkItem,
        event: SessionEvent,
        branch: Option<&str>,
        summary: &str,
        worktree: Option<&Path>,
    ) {
        self.snapshots
            .save(
                &item.session_id,
                event,
                SnapshotContext {
                    project_key: Some(item.project_key.clone()),
                    branch_name: branch.map(str::to_string),
                    messages: vec![item.text.clone()],
                    task_summary: summary_line(summary).to_string(),
                    working_dir: worktree.map(Path::to_path_buf),
                    ..Default::default()
                },
            )
            .await;
    }
}

/// First line of a text, for commit subjects and task summaries.
fn summary_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}

/// The last chunk of agent output that fits in one chat message.
fn tail(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return "Done.".to_string();
    }
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= REPLY_TAIL_CHARS {
        trimmed.to_string()
    } else {
        chars[chars.len() - REPLY_TAIL_CHARS..].iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        assert_eq!(summary_line("fix the bug\nwith details"), "fix the bug");
        assert_eq!(summary_line(""), "");
    }

    #[test]
    fn test_tail_keeps_short_output() {
        assert_eq!(tail("all done"), "all done");
        assert_eq!(tail("   "), "Done.");
    }

    #[test]
    fn test_tail_truncates_to_last_chunk() {
        let long = "x".repeat(REPLY_TAIL_CHARS + 100) + "END";
        let tailed = tail(&long);
        assert_eq!(tailed.chars().count(), REPLY_TAIL_CHARS);
        assert!(tailed.ends_with("END"));
    }

    #[test]
    fn test_agent_command_defaults() {
        let agent = AgentCommand::new("echo", Duration::from_secs(5));
        assert_eq!(agent.program, "echo");
    }

    #[tokio::test]
    async fn test_agent_run_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let agent = AgentCommand::new("echo", Duration::from_secs(5));
        let out = agent.run(dir.path(), "hello").await.unwrap();
        assert_eq!(out.trim(), "-p hello");
    }

    async fn git_in(repo: &Path, args: &[&str]) {
        let out = run_with_timeout("git", args, Some(repo), GIT_TIMEOUT)
            .await
            .unwrap();
        assert!(out.success(), "git {:?} failed: {}", args, out.failure_text());
    }

    async fn init_repo(repo: &Path) {
        git_in(repo, &["init", "-b", "main"]).await;
        git_in(repo, &["config", "user.email", "test@example.com"]).await;
        git_in(repo, &["config", "user.name", "Test"]).await;
        std::fs::write(repo.join("README.md"), "# test\n").unwrap();
        git_in(repo, &["add", "."]).await;
        git_in(repo, &["commit", "-m", "initial"]).await;
    }

    /// Writes an executable stand-in agent that edits a file in its
    /// cwd and prints a line.
    fn fake_agent(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("agent.sh");
        std::fs::write(&script, "#!/bin/sh\necho changed > agent_output.txt\necho done\n")
            .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[tokio::test]
    async fn test_completion_failure_tears_down_tree_but_keeps_branch() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        init_repo(&repo).await;

        let trees = dir.path().join("trees");
        let runner = SessionRunner::new(
            WorktreeManager::new(&trees).await.unwrap(),
            SnapshotLogger::new(dir.path().join("snapshots")),
            Outbox::new(dir.path().join("outbox")),
            AgentCommand::new(
                fake_agent(dir.path()).to_string_lossy(),
                Duration::from_secs(30),
            ),
        );

        let mut project = ProjectConfig::new("alpha", repo.to_string_lossy());
        project.source_control.prefer_pr = false;
        let item = WorkItem::for_message("alpha", &project.working_dir, 1, 9, "make a change");

        // The repo has no `origin` remote, so the push fails after the
        // agent's commit lands on the session branch.
        let outcome = runner.run(Some(&project), &item).await;
        assert_eq!(outcome, SessionOutcome::Failed);

        // Terminal state: the tree is gone, the branch survives for
        // inspection, and the failure is on record as an escalation.
        assert!(!trees.join("1-9").exists());
        let branches = run_with_timeout("git", &["branch", "--list"], Some(&repo), GIT_TIMEOUT)
            .await
            .unwrap();
        assert!(branches.stdout.contains("session/1-9"));
        assert!(runner.pending_escalation().is_some());
    }
}
