//! Telegram Bot API notifier using raw reqwest (no framework).
//!
//! Sends plain-text messages via `sendMessage`. Long texts are split into
//! chunks below Telegram's limit; the message only counts as delivered when
//! every chunk was accepted.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Notifier, OutboundMessage};
use crate::error::{Error, Result};

/// Maximum message length for Telegram (we chunk below this).
const MAX_MESSAGE_LEN: usize = 4000;

/// Telegram Bot API notifier.
pub struct TelegramNotifier {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TgResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramNotifier {
    /// `api_base` is normally `https://api.telegram.org`.
    pub fn new(
        bot_token: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build Telegram client: {e}")))?;

        Ok(Self {
            bot_token: bot_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    async fn send_chunk(&self, chat_id: &str, chunk: &str) -> Result<()> {
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": chunk,
        });

        // Errors are stripped of their URL: it carries the bot token.
        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                Error::notifier(format!("Telegram request failed: {}", e.without_url()))
            })?;

        let status = resp.status();
        let body: TgResponse = match resp.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(Error::notifier(format!("Telegram returned HTTP {status}")));
            }
            Err(e) => {
                return Err(Error::notifier(format!(
                    "unreadable Telegram response: {}",
                    e.without_url()
                )));
            }
        };

        if !body.ok || !status.is_success() {
            let desc = body.description.unwrap_or_default();
            warn!(%status, description = %desc, "sendMessage rejected");
            return Err(Error::notifier(format!("Telegram API error: {desc}")));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<()> {
        let chunks = chunk_message(&msg.text);
        debug!(chat_id = %msg.chat_id, chunks = chunks.len(), "sending Telegram message");
        for chunk in chunks {
            self.send_chunk(&msg.chat_id, chunk).await?;
        }
        Ok(())
    }
}

/// Split a message into chunks that fit within Telegram's limit.
fn chunk_message(text: &str) -> Vec<&str> {
    if text.len() <= MAX_MESSAGE_LEN {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= MAX_MESSAGE_LEN {
            chunks.push(remaining);
            break;
        }

        let mut limit = MAX_MESSAGE_LEN;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }

        // Try to split at a newline within the limit.
        let split_at = match remaining[..limit].rfind('\n') {
            Some(0) | None => limit,
            Some(idx) => idx,
        };

        let (chunk, rest) = remaining.split_at(split_at);
        chunks.push(chunk);
        // Skip the newline we split on.
        remaining = rest.strip_prefix('\n').unwrap_or(rest);
    }

    chunks
}
