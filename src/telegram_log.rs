//! Tracing layer that mirrors bot logs into an admin Telegram chat.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::telegram::fit_message;

const FLUSH_INTERVAL: Duration = Duration::from_secs(10);
const MAX_BATCH: usize = 30;

/// Log message with priority.
#[derive(Debug, PartialEq, Eq)]
enum LogMessage {
    /// WARN/ERROR, sent immediately
    Urgent(String),
    /// INFO, batched
    Info(String),
}

/// INFO lines waiting to be sent as one message.
#[derive(Default)]
struct LogBatch {
    lines: Vec<String>,
}

impl LogBatch {
    /// Add a line; returns the joined batch once it is full.
    fn push(&mut self, line: String) -> Option<String> {
        self.lines.push(line);
        if self.lines.len() >= MAX_BATCH { self.take() } else { None }
    }

    fn take(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        let combined = self.lines.join("\n");
        self.lines.clear();
        Some(combined)
    }
}

pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<LogMessage>,
}

impl TelegramLogLayer {
    /// Must be called from inside a tokio runtime.
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogMessage>();

        tokio::spawn(async move {
            let mut batch = LogBatch::default();
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    msg = rx.recv() => match msg {
                        Some(LogMessage::Urgent(text)) => send_log(&bot, chat_id, &text).await,
                        Some(LogMessage::Info(text)) => {
                            if let Some(combined) = batch.push(text) {
                                send_log(&bot, chat_id, &combined).await;
                            }
                        }
                        None => break,
                    },
                    _ = interval.tick() => {
                        if let Some(combined) = batch.take() {
                            send_log(&bot, chat_id, &combined).await;
                        }
                    }
                }
            }
        });

        Self { tx }
    }
}

async fn send_log(bot: &Bot, chat_id: ChatId, text: &str) {
    // Not routed through tracing, that would feed back into this layer.
    if let Err(e) = bot.send_message(chat_id, fit_message(text)).await {
        eprintln!("Failed to send log to Telegram: {e}");
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message
                .push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

fn classify(level: Level, message: String) -> Option<LogMessage> {
    match level {
        Level::ERROR => Some(LogMessage::Urgent(format!("❌ {message}"))),
        Level::WARN => Some(LogMessage::Urgent(format!("⚠️ {message}"))),
        Level::INFO => Some(LogMessage::Info(message)),
        _ => None,
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // Skip teloxide's own request logging
        if event.metadata().target().starts_with("teloxide") {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let Some(msg) = classify(*event.metadata().level(), visitor.message) else {
            return;
        };

        if self.tx.send(msg).is_err() {
            eprintln!("Log channel closed, message dropped");
        }
    }
}
