//! The teloxide dispatcher and the startup catch-up task.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tracing::{debug, info, warn};

use valor_core::config;
use valor_models::InboundMessage;
use valor_persistence::Outbox;
use valor_routing::CatchUpScanner;

use crate::error::{Result, TelegramError};
use crate::history::HttpHistoryClient;
use crate::state::{AppState, HandleOutcome};

/// How far back the startup catch-up scan looks, in minutes.
const CATCHUP_LOOKBACK_MIN: i64 = 60;

/// Most recent messages fetched per chat during catch-up.
const CATCHUP_PER_CHAT_LIMIT: usize = 100;

/// How often the worker outbox is polled for replies to deliver.
const OUTBOX_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(2);

/// The Telegram bot for Valor.
pub struct ValorBot {
    bot: Bot,
    state: Arc<AppState>,
}

impl ValorBot {
    /// Creates the bot.
    ///
    /// Requires `TELEGRAM_BOT_TOKEN` environment variable to be set.
    pub fn new(state: Arc<AppState>) -> Result<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").map_err(|_| TelegramError::NoToken)?;
        Ok(Self {
            bot: Bot::new(token),
            state,
        })
    }

    /// The bot's username, used as a startup liveness check.
    pub async fn get_me(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| TelegramError::BotStartFailed(e.to_string()))?;
        Ok(me.username().to_string())
    }

    /// Starts the bot in polling mode.
    ///
    /// The catch-up scan is spawned first and runs concurrently with
    /// live handling; the shared dedup store keeps the two paths from
    /// double-enqueueing.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram bot in polling mode");

        self.spawn_catchup();
        self.spawn_outbox_delivery();

        let bot = self.bot.clone();
        let state = Arc::clone(&self.state);

        let handler = dptree::entry().branch(Update::filter_message().endpoint(
            move |bot: Bot, msg: Message| {
                let state = Arc::clone(&state);
                async move { handle_message(bot, msg, state).await }
            },
        ));

        Dispatcher::builder(bot, handler)
            .default_handler(|upd| async move {
                debug!("Unhandled update: {:?}", upd);
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }

    /// Spawns the one-shot startup catch-up scan, if a history sidecar
    /// is configured.
    fn spawn_catchup(&self) {
        let Some(history) = HttpHistoryClient::from_env() else {
            info!("No history sidecar configured; skipping catch-up scan");
            return;
        };

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let chats = state.resolver.monitored_groups();
            let scanner =
                CatchUpScanner::new(&state.resolver, &state.dedup, state.config.respond_to_dms);
            let enqueued = scanner
                .scan(
                    &history,
                    &state.queue,
                    &chats,
                    chrono::Duration::minutes(CATCHUP_LOOKBACK_MIN),
                    CATCHUP_PER_CHAT_LIMIT,
                )
                .await;
            info!(enqueued, chats = chats.len(), "Catch-up scan finished");
        });
    }

    /// Spawns the loop that delivers worker replies from the outbox.
    fn spawn_outbox_delivery(&self) {
        let bot = self.bot.clone();
        let outbox = Outbox::new(config::outbox_dir());

        tokio::spawn(async move {
            let mut poll = tokio::time::interval(OUTBOX_POLL_INTERVAL);
            loop {
                poll.tick().await;
                for reply in outbox.drain() {
                    match bot.send_message(ChatId(reply.chat_id), &reply.text).await {
                        Ok(_) => debug!(
                            chat_id = %reply.chat_id,
                            session = ?reply.session_id,
                            "Worker reply delivered"
                        ),
                        Err(e) => warn!(
                            chat_id = %reply.chat_id,
                            error = %e,
                            "Failed to deliver worker reply"
                        ),
                    }
                }
            }
        });
    }
}

/// Handles one live inbound message.
async fn handle_message(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
) -> std::result::Result<(), teloxide::RequestError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let inbound = to_inbound(&msg, text);
    let chat_title = msg.chat.title().map(str::to_string);

    match state.handle_inbound(&inbound, chat_title.as_deref()).await {
        HandleOutcome::Ignored | HandleOutcome::Duplicate => {}
        HandleOutcome::Greeting(greeting) => {
            bot.send_message(msg.chat.id, greeting).await?;
        }
        HandleOutcome::Enqueued(item) => {
            // Typing indicator while the work is picked up downstream.
            if let Err(e) = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await {
                warn!(chat_id = %msg.chat.id, error = %e, "Typing indicator failed");
            }
            bot.send_message(
                msg.chat.id,
                format!("On it. Session {} queued.", item.session_id),
            )
            .await?;
        }
    }

    Ok(())
}

/// Normalizes a teloxide message into the transport-neutral form.
fn to_inbound(msg: &Message, text: &str) -> InboundMessage {
    let mut inbound = if msg.chat.is_private() {
        InboundMessage::dm(msg.chat.id.0, msg.id.0 as i64, text)
    } else {
        InboundMessage::group(msg.chat.id.0, msg.id.0 as i64, text)
    };

    if let Some(from) = &msg.from {
        inbound = inbound.from_sender(
            from.id.0 as i64,
            from.username.clone().unwrap_or_else(|| from.first_name.clone()),
        );
    }
    if let Some(reply) = msg.reply_to_message() {
        inbound = inbound.replying_to(reply.id.0 as i64);
    }
    inbound.at(msg.date)
}
