//! Telegram client using teloxide.

use std::future::Future;

use teloxide::prelude::*;
use tracing::warn;

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Where dialogue replies go.
pub trait ReplySink: Send + Sync + 'static {
    fn send_text(&self, chat_id: ChatId, text: &str) -> impl Future<Output = Result<(), String>> + Send;
}

/// Telegram API client.
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send a plain-text message. Returns the new message id.
    pub async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<i64, String> {
        self.bot
            .send_message(chat_id, text)
            .await
            .map(|msg| msg.id.0 as i64)
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }
}

impl ReplySink for TelegramClient {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), String> {
        self.send_message(chat_id, text).await.map(|_| ())
    }
}

/// Cut `text` to fit in one Telegram message, marking the cut.
pub fn fit_message(text: &str) -> String {
    const MARKER: &str = "\n… (output truncated)";

    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }

    let keep = MAX_MESSAGE_CHARS - MARKER.chars().count();
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(MARKER);
    truncated
}
