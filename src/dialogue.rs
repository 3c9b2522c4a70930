//! Code-collection dialogue: ties the collector, the window and the runner together.

use std::sync::Arc;

use teloxide::types::ChatId;
use tokio::task::JoinHandle;
use tracing::info;

use crate::collector::{SessionError, SessionRegistry, SessionTicket};
use crate::languages::Language;
use crate::piston::CodeRunner;
use crate::telegram::ReplySink;
use crate::window;

pub struct CodeDialogue<R, S> {
    registry: SessionRegistry,
    runner: Arc<R>,
    sink: Arc<S>,
}

impl<R, S> Clone for CodeDialogue<R, S> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            runner: self.runner.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<R: CodeRunner, S: ReplySink> CodeDialogue<R, S> {
    pub fn new(registry: SessionRegistry, runner: Arc<R>, sink: Arc<S>) -> Self {
        Self { registry, runner, sink }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Open a session for the chat and start its window.
    pub async fn start(
        &self,
        chat_id: ChatId,
        language: Language,
    ) -> Result<(SessionTicket, JoinHandle<()>), SessionError> {
        let ticket = self.registry.begin_session(chat_id, language).await?;
        info!(
            "📝 Collecting {} code in chat {} for {}s",
            language,
            chat_id,
            self.registry.window().as_secs()
        );

        let handle = window::spawn(
            ticket,
            self.registry.clone(),
            self.runner.clone(),
            self.sink.clone(),
        );
        Ok((ticket, handle))
    }

    /// Feed one plain-text message. Returns whether it was collected.
    pub async fn receive_text(&self, chat_id: ChatId, text: &str) -> bool {
        self.registry.append_line(chat_id, text).await
    }
}
