//! Valor Telegram bot binary.
//!
//! Start the bot with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx cargo run -p valor-telegram
//! ```

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use valor_core::config;
use valor_persistence::SnapshotLogger;
use valor_telegram::{AppState, ValorBot};

/// How long session snapshot directories are retained.
const SNAPSHOT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Valor Telegram Bot - drive coding-agent sessions from Telegram
#[derive(Parser, Debug)]
#[command(name = "valor-telegram")]
#[command(about = "Telegram bot for Valor - route chat messages into agent sessions")]
struct Args {
    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load environment variables from the config directory first
    let env_path = config::env_file();
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }
    let _ = dotenvy::dotenv();

    let filter = match args.verbose {
        0 => "valor_telegram=info,valor_routing=info,teloxide=warn",
        1 => "valor_telegram=debug,valor_routing=debug,teloxide=info",
        2 => "valor_telegram=trace,valor_routing=trace,teloxide=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = config::ensure_all_dirs() {
        tracing::warn!(error = %e, "Failed to create all directories");
    }

    // Expire old session snapshots before new ones start arriving.
    let removed = SnapshotLogger::new(config::sessions_log_dir()).cleanup(SNAPSHOT_RETENTION);
    if removed > 0 {
        tracing::info!(removed, "Expired session snapshots removed");
    }

    let state = AppState::load()?;
    let bot = ValorBot::new(state)?;

    match bot.get_me().await {
        Ok(username) => {
            tracing::info!(username = %username, "Bot initialized successfully");
            println!("\nValor Telegram Bot");
            println!("   Bot: @{}", username);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get bot info");
            return Err(e.into());
        }
    }

    println!("\nOpen Telegram and message the bot to begin");
    println!("   Press Ctrl+C to stop\n");

    bot.start_polling().await?;

    Ok(())
}
