//! Telegram bot that collects code line by line and runs it on Piston.

pub mod collector;
pub mod commands;
pub mod config;
pub mod dialogue;
pub mod languages;
pub mod piston;
pub mod telegram;
pub mod telegram_log;
pub mod window;

pub use collector::{DrainedSession, SessionError, SessionRegistry, SessionTicket};
pub use commands::Command;
pub use config::Config;
pub use dialogue::CodeDialogue;
pub use languages::Language;
pub use piston::{CodeRunner, ExecuteError, ExecuteResponse, PistonClient};
pub use telegram::{ReplySink, TelegramClient};
