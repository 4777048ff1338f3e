//! Shared configuration paths for Valor.
//!
//! All application data lives under `~/.valor/`:
//!
//! ```text
//! ~/.valor/
//! ├── config/        # projects.json, .env.local
//! ├── logs/
//! │   └── sessions/  # one directory per session, snapshot files inside
//! ├── spool/         # job spool, one subdirectory per priority
//! ├── outbox/        # replies from the worker, polled by the bot
//! └── worktrees/     # one git worktree per active session
//! ```
//!
//! # Environment Variables
//!
//! - `VALOR_STATE_DIR`: Override the base state directory
//! - `VALOR_WORKTREES_DIR`: Override the worktrees root

use std::path::PathBuf;
use std::sync::OnceLock;

/// Environment variable for custom state directory.
pub const STATE_DIR_ENV: &str = "VALOR_STATE_DIR";

/// Environment variable for custom worktrees root.
pub const WORKTREES_DIR_ENV: &str = "VALOR_WORKTREES_DIR";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".valor";

const CONFIG_SUBDIR: &str = "config";
const LOGS_SUBDIR: &str = "logs";
const SPOOL_SUBDIR: &str = "spool";
const OUTBOX_SUBDIR: &str = "outbox";
const WORKTREES_SUBDIR: &str = "worktrees";

static STATE_DIR_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Get the Valor state directory.
///
/// Resolution order:
/// 1. `VALOR_STATE_DIR` environment variable if set
/// 2. `~/.valor` if home directory is available
/// 3. `.valor` in current directory as fallback
pub fn state_dir() -> PathBuf {
    STATE_DIR_CACHE
        .get_or_init(|| {
            std::env::var(STATE_DIR_ENV)
                .map(|raw| PathBuf::from(shellexpand::tilde(&raw).into_owned()))
                .unwrap_or_else(|_| {
                    dirs::home_dir()
                        .map(|h| h.join(DEFAULT_STATE_DIR))
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
                })
        })
        .clone()
}

/// Get the user config directory.
pub fn config_dir() -> PathBuf {
    state_dir().join(CONFIG_SUBDIR)
}

/// Get the projects configuration file path.
pub fn projects_file() -> PathBuf {
    config_dir().join("projects.json")
}

/// Get the .env.local file path (secrets: bot token, history URL).
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Get the logs directory.
pub fn logs_dir() -> PathBuf {
    state_dir().join(LOGS_SUBDIR)
}

/// Get the session snapshots directory (`logs/sessions`).
pub fn sessions_log_dir() -> PathBuf {
    logs_dir().join("sessions")
}

/// Get the job spool directory.
pub fn spool_dir() -> PathBuf {
    state_dir().join(SPOOL_SUBDIR)
}

/// Get the reply outbox directory.
pub fn outbox_dir() -> PathBuf {
    state_dir().join(OUTBOX_SUBDIR)
}

/// Get the dedup store file path.
pub fn dedup_file() -> PathBuf {
    state_dir().join("dedup.json")
}

/// Get the worktrees root directory.
///
/// Defaults to `~/.valor/worktrees/` or `VALOR_WORKTREES_DIR` env var.
pub fn worktrees_dir() -> PathBuf {
    std::env::var(WORKTREES_DIR_ENV)
        .map(|raw| PathBuf::from(shellexpand::tilde(&raw).into_owned()))
        .unwrap_or_else(|_| state_dir().join(WORKTREES_SUBDIR))
}

/// Ensure the full state directory structure exists.
///
/// # Errors
/// Returns an error if any directory cannot be created.
pub fn ensure_all_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(config_dir())?;
    std::fs::create_dir_all(sessions_log_dir())?;
    std::fs::create_dir_all(spool_dir())?;
    std::fs::create_dir_all(outbox_dir())?;
    std::fs::create_dir_all(worktrees_dir())?;
    Ok(())
}
