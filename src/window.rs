//! Collection window: a one-shot timer that closes a session and runs its code.

use std::sync::Arc;

use chrono::Utc;

use tokio::task::JoinHandle;
use tokio::time::sleep_until;
use tracing::{error, info, warn};

use crate::collector::{SessionRegistry, SessionTicket};
use crate::piston::{CodeRunner, ExecuteError, ExecuteResponse};
use crate::telegram::{ReplySink, fit_message};

/// Sent when the result itself could not be delivered.
pub const DELIVERY_APOLOGY: &str = "Sorry, something went wrong while sending your result. Please try again.";

const NO_OUTPUT: &str = "(no output)";

/// Start the window for `ticket`.
///
/// The returned handle completes once the result (or an error) has been
/// sent. There is no way to cancel or extend the window.
pub fn spawn<R, S>(
    ticket: SessionTicket,
    registry: SessionRegistry,
    runner: Arc<R>,
    sink: Arc<S>,
) -> JoinHandle<()>
where
    R: CodeRunner,
    S: ReplySink,
{
    tokio::spawn(async move {
        sleep_until(ticket.deadline).await;

        let Some(session) = registry.drain_session(&ticket).await else {
            warn!("Window {} for chat {} found no session", ticket.id, ticket.chat_id);
            return;
        };

        let age = Utc::now() - session.opened_at;
        info!(
            "⏰ Window closed for chat {} after {}ms: {} line(s) of {}",
            ticket.chat_id,
            age.num_milliseconds(),
            session.lines,
            session.language
        );

        let result = runner.execute(&session.source, session.language).await;
        if let Err(ref e) = result {
            warn!("Execution failed for chat {}: {e}", ticket.chat_id);
        }
        let reply = render_reply(&result);

        if let Err(e) = sink.send_text(ticket.chat_id, &reply).await {
            error!("Failed to deliver result to chat {}: {e}", ticket.chat_id);
            if let Err(e) = sink.send_text(ticket.chat_id, DELIVERY_APOLOGY).await {
                error!("Failed to deliver apology to chat {}: {e}", ticket.chat_id);
            }
        }
    })
}

/// Turn an execution result into the message the user sees.
pub fn render_reply(result: &Result<ExecuteResponse, ExecuteError>) -> String {
    match result {
        Ok(response) => {
            let output = response.output_text();
            if output.trim().is_empty() {
                NO_OUTPUT.to_string()
            } else {
                fit_message(output)
            }
        }
        Err(e) => fit_message(&format!("Error: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::{Language, PYTHON};
    use crate::piston::RunStage;
    use std::sync::Mutex;
    use std::time::Duration;
    use teloxide::types::ChatId;
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<(String, Language, Instant)>>,
    }

    impl CodeRunner for RecordingRunner {
        async fn execute(&self, source: &str, language: Language) -> Result<ExecuteResponse, ExecuteError> {
            self.calls.lock().unwrap().push((source.to_string(), language, Instant::now()));
            Ok(ExecuteResponse {
                run: RunStage { output: format!("ran {source}"), ..RunStage::default() },
                ..ExecuteResponse::default()
            })
        }
    }

    /// Fails the first `failures` sends.
    #[derive(Default)]
    struct FlakySink {
        failures: Mutex<usize>,
        sent: Mutex<Vec<String>>,
    }

    impl ReplySink for FlakySink {
        async fn send_text(&self, _chat_id: ChatId, text: &str) -> Result<(), String> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err("Failed to send: network down".to_string());
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fires_once_after_window() {
        let registry = SessionRegistry::new(Duration::from_millis(50));
        let runner = Arc::new(RecordingRunner::default());
        let sink = Arc::new(FlakySink::default());

        let opened = Instant::now();
        let ticket = registry.begin_session(ChatId(1), PYTHON).await.unwrap();
        registry.append_line(ChatId(1), "print(1)").await;
        spawn(ticket, registry.clone(), runner.clone(), sink.clone()).await.unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "print(1)");
        assert!(calls[0].2 >= opened + Duration::from_millis(50));
        assert_eq!(*sink.sent.lock().unwrap(), vec!["ran print(1)".to_string()]);
        assert!(!registry.is_collecting(ChatId(1)).await);
    }

    #[tokio::test]
    async fn test_delivery_failure_sends_apology() {
        let registry = SessionRegistry::new(Duration::from_millis(10));
        let runner = Arc::new(RecordingRunner::default());
        let sink = Arc::new(FlakySink { failures: Mutex::new(1), ..FlakySink::default() });

        let ticket = registry.begin_session(ChatId(2), PYTHON).await.unwrap();
        spawn(ticket, registry, runner, sink.clone()).await.unwrap();

        assert_eq!(*sink.sent.lock().unwrap(), vec![DELIVERY_APOLOGY.to_string()]);
    }

    #[tokio::test]
    async fn test_total_delivery_failure_does_not_panic() {
        let registry = SessionRegistry::new(Duration::from_millis(10));
        let runner = Arc::new(RecordingRunner::default());
        let sink = Arc::new(FlakySink { failures: Mutex::new(2), ..FlakySink::default() });

        let ticket = registry.begin_session(ChatId(3), PYTHON).await.unwrap();
        let outcome = spawn(ticket, registry, runner, sink.clone()).await;

        assert!(outcome.is_ok());
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_already_drained_session_runs_nothing() {
        let registry = SessionRegistry::new(Duration::from_millis(10));
        let runner = Arc::new(RecordingRunner::default());
        let sink = Arc::new(FlakySink::default());

        let ticket = registry.begin_session(ChatId(4), PYTHON).await.unwrap();
        registry.drain_and_close(ChatId(4)).await;
        spawn(ticket, registry, runner.clone(), sink.clone()).await.unwrap();

        assert!(runner.calls.lock().unwrap().is_empty());
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_render_error() {
        let result = Err(ExecuteError::Status(500));
        assert_eq!(render_reply(&result), "Error: execution service returned 500");
    }

    #[test]
    fn test_render_empty_output() {
        let result = Ok(ExecuteResponse::default());
        assert_eq!(render_reply(&result), NO_OUTPUT);
    }
}
