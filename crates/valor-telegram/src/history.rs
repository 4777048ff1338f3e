//! HTTP client for the chat-history sidecar.
//!
//! The Bot API cannot read a chat's past messages, so catch-up talks
//! to a small local sidecar that can. The sidecar returns messages
//! newest first, which the scanner's early-stop depends on.

use std::time::Duration;

use tracing::debug;

use valor_models::InboundMessage;
use valor_routing::{ChatHistory, Result, RoutingError};

/// Environment variable naming the sidecar base URL. When unset, the
/// startup catch-up scan is skipped entirely.
pub const HISTORY_URL_ENV: &str = "VALOR_HISTORY_URL";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Chat history over HTTP: `GET {base}/messages?chat={title}&limit={n}`.
pub struct HttpHistoryClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpHistoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Builds a client from [`HISTORY_URL_ENV`], if set.
    pub fn from_env() -> Option<Self> {
        std::env::var(HISTORY_URL_ENV).ok().map(Self::new)
    }
}

impl ChatHistory for HttpHistoryClient {
    async fn fetch_recent(&self, chat_title: &str, limit: usize) -> Result<Vec<InboundMessage>> {
        let fetch_err = |reason: String| RoutingError::HistoryFetch {
            chat: chat_title.to_string(),
            reason,
        };

        let url = format!("{}/messages", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("chat", chat_title), ("limit", &limit.to_string())])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?
            .error_for_status()
            .map_err(|e| fetch_err(e.to_string()))?;

        let messages: Vec<InboundMessage> = response
            .json()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        debug!(chat = %chat_title, count = messages.len(), "History fetched");
        Ok(messages)
    }
}
