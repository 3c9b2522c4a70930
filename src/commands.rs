//! Slash commands, one per supported language.

use std::time::Duration;

use teloxide::utils::command::BotCommands;

use crate::collector::SessionError;
use crate::languages::{self, Language};

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Send one of these, then your code line by line:")]
pub enum Command {
    #[command(description = "run Python code")]
    Python,
    #[command(description = "run Dart code")]
    Dart,
    #[command(description = "run JavaScript code")]
    Javascript,
    #[command(description = "run C# code")]
    Csharp,
    #[command(description = "run Java code")]
    Java,
    #[command(description = "run Kotlin code")]
    Kotlin,
    #[command(description = "run Lua code")]
    Lua,
    #[command(description = "run PHP code")]
    Php,
    #[command(description = "run Perl code")]
    Perl,
    #[command(description = "run Ruby code")]
    Ruby,
    #[command(description = "run Rust code")]
    Rust,
    #[command(description = "run Swift code")]
    Swift,
    #[command(description = "run SQLite statements")]
    Sqlite3,
}

impl Command {
    pub fn language(&self) -> Language {
        match self {
            Self::Python => languages::PYTHON,
            Self::Dart => languages::DART,
            Self::Javascript => languages::JAVASCRIPT,
            Self::Csharp => languages::CSHARP,
            Self::Java => languages::JAVA,
            Self::Kotlin => languages::KOTLIN,
            Self::Lua => languages::LUA,
            Self::Php => languages::PHP,
            Self::Perl => languages::PERL,
            Self::Ruby => languages::RUBY,
            Self::Rust => languages::RUST,
            Self::Swift => languages::SWIFT,
            Self::Sqlite3 => languages::SQLITE3,
        }
    }
}

/// Reply sent when a collection window opens.
pub fn prompt_text(language: Language, window: Duration) -> String {
    format!(
        "Send your {} code now, one or more messages. I'll run everything you send in the next {} seconds.",
        language,
        window.as_secs()
    )
}

/// Reply sent when the chat is already in a collection window.
pub fn busy_text(err: &SessionError) -> String {
    match err {
        SessionError::AlreadyCollecting { language, remaining, .. } => format!(
            "Still collecting your {} code. It runs in {}s; send a new command after that.",
            language.display,
            remaining.as_secs().max(1)
        ),
    }
}
