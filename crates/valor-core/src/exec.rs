//! Timeout-bounded external command execution.
//!
//! Every subprocess Valor touches (git, the source-control host CLI)
//! goes through [`run_with_timeout`]: spawn with a working directory,
//! capture both streams, and treat a timeout as failure rather than
//! blocking the caller. Stderr is preserved verbatim so a human can
//! diagnose tool failures from the surfaced error alone.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{trace, warn};

/// Errors from external command execution.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The binary could not be spawned at all.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The command did not finish within the allotted time.
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// I/O failure while collecting output.
    #[error("failed to collect output from {program}: {source}")]
    Output {
        program: String,
        source: std::io::Error,
    },
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// True when the process exited with code zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stderr if non-empty, otherwise stdout. Tools are inconsistent
    /// about which stream carries the failure text.
    pub fn failure_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Runs an external command with an explicit timeout.
///
/// On timeout the child is killed and [`ExecError::Timeout`] returned;
/// retries, if any, are the caller's responsibility.
///
/// # Errors
///
/// Returns an error if the process cannot be spawned, times out, or
/// its output cannot be collected. A non-zero exit code is NOT an
/// error here; callers inspect [`CommandOutput::success`].
pub async fn run_with_timeout(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, ExecError> {
    trace!(program = %program, args = ?args, cwd = ?cwd, "running external command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ExecError::Output {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            warn!(program = %program, timeout = ?timeout, "external command timed out");
            return Err(ExecError::Timeout {
                program: program.to_string(),
                timeout,
            });
        }
    };

    let result = CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    trace!(
        program = %program,
        code = ?result.code,
        stdout_len = result.stdout.len(),
        stderr_len = result.stderr.len(),
        "external command completed"
    );

    Ok(result)
}
