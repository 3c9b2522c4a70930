//! Per-chat line collector.
//!
//! Holds one buffer per chat that is currently sending code. Lines are
//! appended in the order messages arrive; the collection window drains the
//! buffer exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::languages::Language;

/// One in-flight "send me your code" dialogue.
#[derive(Debug)]
struct CollectionSession {
    id: u64,
    language: Language,
    buffer: String,
    lines: usize,
    opened_at: DateTime<Utc>,
    deadline: Instant,
}

/// Proof that a session was opened; the window uses it to drain its own session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    pub id: u64,
    pub chat_id: ChatId,
    pub language: Language,
    pub deadline: Instant,
}

/// What is left of a session once its window closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainedSession {
    pub language: Language,
    pub source: String,
    pub lines: usize,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The chat already has a live session.
    AlreadyCollecting {
        language: Language,
        opened_at: DateTime<Utc>,
        remaining: Duration,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyCollecting { language, remaining, .. } => write!(
                f,
                "already collecting {} code, {}s left",
                language.display,
                remaining.as_secs()
            ),
        }
    }
}

impl std::error::Error for SessionError {}

/// Registry of live collection sessions, keyed by chat.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<ChatId, CollectionSession>>>,
    next_id: Arc<AtomicU64>,
    window: Duration,
}

impl SessionRegistry {
    pub fn new(window: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            window,
        }
    }

    /// Length of the collection window for new sessions.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Open a session for `chat_id`. Fails if one is already live.
    pub async fn begin_session(
        &self,
        chat_id: ChatId,
        language: Language,
    ) -> Result<SessionTicket, SessionError> {
        let mut sessions = self.sessions.lock().await;

        if let Some(live) = sessions.get(&chat_id) {
            return Err(SessionError::AlreadyCollecting {
                language: live.language,
                opened_at: live.opened_at,
                remaining: live.deadline.saturating_duration_since(Instant::now()),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + self.window;
        sessions.insert(
            chat_id,
            CollectionSession {
                id,
                language,
                buffer: String::new(),
                lines: 0,
                opened_at: Utc::now(),
                deadline,
            },
        );

        Ok(SessionTicket { id, chat_id, language, deadline })
    }

    /// Append one line to the chat's session. Returns false if nothing was recorded.
    pub async fn append_line(&self, chat_id: ChatId, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }

        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(&chat_id) else {
            return false;
        };

        session.buffer.push_str(text);
        session.buffer.push('\n');
        session.lines += 1;
        debug!("Chat {} buffered line {}", chat_id, session.lines);
        true
    }

    /// Remove the chat's session, whichever it is, and return its trimmed source.
    pub async fn drain_and_close(&self, chat_id: ChatId) -> Option<DrainedSession> {
        let session = self.sessions.lock().await.remove(&chat_id)?;
        Some(drained(session))
    }

    /// Remove the session the ticket was issued for. A newer session is left alone.
    pub async fn drain_session(&self, ticket: &SessionTicket) -> Option<DrainedSession> {
        let mut sessions = self.sessions.lock().await;
        if sessions.get(&ticket.chat_id).is_none_or(|s| s.id != ticket.id) {
            return None;
        }
        sessions.remove(&ticket.chat_id).map(drained)
    }

    pub async fn is_collecting(&self, chat_id: ChatId) -> bool {
        self.sessions.lock().await.contains_key(&chat_id)
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

fn drained(session: CollectionSession) -> DrainedSession {
    DrainedSession {
        language: session.language,
        source: session.buffer.trim().to_string(),
        lines: session.lines,
        opened_at: session.opened_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::{JAVA, PYTHON, RUST};

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_lines_drain_in_order() {
        let registry = registry();
        let chat = ChatId(42);
        let before = Utc::now();
        registry.begin_session(chat, PYTHON).await.unwrap();

        for line in ["import math", "x = 2", "print(math.sqrt(x))"] {
            assert!(registry.append_line(chat, line).await);
        }

        let drained = registry.drain_and_close(chat).await.unwrap();
        assert_eq!(drained.source, "import math\nx = 2\nprint(math.sqrt(x))");
        assert_eq!(drained.lines, 3);
        assert_eq!(drained.language, PYTHON);
        assert!(drained.opened_at >= before && drained.opened_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_empty_line_is_ignored() {
        let registry = registry();
        let chat = ChatId(42);
        registry.begin_session(chat, PYTHON).await.unwrap();

        registry.append_line(chat, "a = 1").await;
        assert!(!registry.append_line(chat, "").await);

        let drained = registry.drain_and_close(chat).await.unwrap();
        assert_eq!(drained.source, "a = 1");
        assert_eq!(drained.lines, 1);
    }

    #[tokio::test]
    async fn test_whitespace_is_trimmed_only_at_edges() {
        let registry = registry();
        let chat = ChatId(3);
        registry.begin_session(chat, PYTHON).await.unwrap();

        registry.append_line(chat, "  ").await;
        registry.append_line(chat, "if True:").await;
        registry.append_line(chat, "    print(1)").await;

        let drained = registry.drain_and_close(chat).await.unwrap();
        assert_eq!(drained.source, "if True:\n    print(1)");
    }

    #[tokio::test]
    async fn test_chats_do_not_mix() {
        let registry = registry();
        let (one, two) = (ChatId(1), ChatId(2));
        registry.begin_session(one, JAVA).await.unwrap();
        registry.begin_session(two, JAVA).await.unwrap();

        registry.append_line(one, "class A {}").await;
        registry.append_line(two, "class B {}").await;
        registry.append_line(one, "// one").await;

        assert_eq!(registry.drain_and_close(two).await.unwrap().source, "class B {}");
        assert_eq!(registry.drain_and_close(one).await.unwrap().source, "class A {}\n// one");
    }

    #[tokio::test]
    async fn test_text_without_session_is_dropped() {
        let registry = registry();
        assert!(!registry.append_line(ChatId(9), "hello").await);
        assert_eq!(registry.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_second_drain_returns_nothing() {
        let registry = registry();
        let chat = ChatId(5);
        registry.begin_session(chat, RUST).await.unwrap();
        registry.append_line(chat, "fn main() {}").await;

        assert!(registry.drain_and_close(chat).await.is_some());
        assert!(registry.drain_and_close(chat).await.is_none());
        assert!(!registry.is_collecting(chat).await);
    }

    #[tokio::test]
    async fn test_second_command_is_rejected() {
        let registry = registry();
        let chat = ChatId(8);
        registry.begin_session(chat, PYTHON).await.unwrap();
        registry.append_line(chat, "print(1)").await;

        let err = registry.begin_session(chat, RUST).await.unwrap_err();
        let SessionError::AlreadyCollecting { language, remaining, .. } = err;
        assert_eq!(language, PYTHON);
        assert!(remaining <= Duration::from_secs(60));

        // Original session keeps its language and buffer.
        let drained = registry.drain_and_close(chat).await.unwrap();
        assert_eq!(drained.language, PYTHON);
        assert_eq!(drained.source, "print(1)");
    }

    #[tokio::test]
    async fn test_stale_ticket_does_not_drain_new_session() {
        let registry = registry();
        let chat = ChatId(11);
        let old = registry.begin_session(chat, PYTHON).await.unwrap();
        registry.drain_session(&old).await.unwrap();

        let new = registry.begin_session(chat, RUST).await.unwrap();
        assert_ne!(old.id, new.id);
        assert!(registry.drain_session(&old).await.is_none());
        assert!(registry.is_collecting(chat).await);
        assert_eq!(registry.drain_session(&new).await.unwrap().language, RUST);
    }

    #[tokio::test]
    async fn test_deadline_follows_window() {
        let registry = SessionRegistry::new(Duration::from_millis(250));
        let before = Instant::now();
        let ticket = registry.begin_session(ChatId(1), PYTHON).await.unwrap();
        assert!(ticket.deadline >= before + Duration::from_millis(250));
    }
}
