//! Valor worker binary.
//!
//! Run alongside the bot:
//! ```bash
//! cargo run -p valor-worker
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use valor_core::config;
use valor_models::{ProjectConfig, ProjectsConfig};
use valor_persistence::{read_json_optional, Outbox, SnapshotLogger};
use valor_worker::{AgentCommand, SessionRunner, SpoolConsumer};
use valor_worktree::WorktreeManager;

/// Valor Worker - run spooled agent sessions in isolated worktrees
#[derive(Parser, Debug)]
#[command(name = "valor-worker")]
#[command(about = "Spool worker for Valor - executes queued agent sessions")]
struct Args {
    /// Drain the spool once and exit instead of polling forever
    #[arg(long)]
    once: bool,

    /// Spool poll interval in milliseconds
    #[arg(long, default_value = "2000")]
    poll_ms: u64,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let env_path = config::env_file();
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }
    let _ = dotenvy::dotenv();

    let filter = match args.verbose {
        0 => "valor_worker=info,valor_worktree=info,valor_gitops=info",
        1 => "valor_worker=debug,valor_worktree=debug,valor_gitops=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = config::ensure_all_dirs() {
        tracing::warn!(error = %e, "Failed to create all directories");
    }

    let projects: HashMap<String, Arc<ProjectConfig>> =
        read_json_optional::<ProjectsConfig>(&config::projects_file())?
            .unwrap_or_default()
            .projects
            .into_iter()
            .map(|p| (p.key.clone(), Arc::new(p)))
            .collect();
    tracing::info!(projects = projects.len(), "Projects config loaded");

    let worktrees = WorktreeManager::new(config::worktrees_dir()).await?;
    let runner = SessionRunner::new(
        worktrees,
        SnapshotLogger::new(config::sessions_log_dir()),
        Outbox::new(config::outbox_dir()),
        AgentCommand::from_env(),
    );
    let consumer = SpoolConsumer::new(config::spool_dir());

    tracing::info!(once = args.once, "Worker started");

    let mut poll = tokio::time::interval(Duration::from_millis(args.poll_ms.max(100)));
    loop {
        // Drain everything currently spooled, then wait for more.
        loop {
            match consumer.claim_next() {
                Ok(Some((claimed, item))) => {
                    let project = projects.get(&item.project_key).cloned();
                    runner.run(project.as_deref(), &item).await;
                    consumer.finish(&claimed);
                }
                Ok(None) => break,
                Err(e) => {
                    // A transient spool error shouldn't kill the
                    // worker; retry on the next tick.
                    tracing::warn!(error = %e, "Spool claim failed");
                    break;
                }
            }
        }

        if args.once {
            break;
        }
        poll.tick().await;
    }

    Ok(())
}
