//! Piston API client for remote code execution.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::languages::Language;

pub const PISTON_EXECUTE_URL: &str = "https://emkc.org/api/v2/piston/execute";

/// Something that can run a piece of source code remotely.
pub trait CodeRunner: Send + Sync + 'static {
    fn execute(
        &self,
        source: &str,
        language: Language,
    ) -> impl Future<Output = Result<ExecuteResponse, ExecuteError>> + Send;
}

pub struct PistonClient {
    url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<SourceFile<'a>>,
    args: Vec<String>,
    stdin: &'a str,
    log: u8,
}

#[derive(Serialize)]
struct SourceFile<'a> {
    content: &'a str,
}

/// Piston rejects bad requests with `{"message": "..."}`.
#[derive(Deserialize, Debug)]
struct Rejection {
    message: String,
}

impl Rejection {
    const MAX_CHARS: usize = 200;

    /// Collapse the message to one short line.
    fn into_error(self) -> ExecuteError {
        let line = self.message.split_whitespace().collect::<Vec<_>>().join(" ");
        ExecuteError::Rejected(line.chars().take(Self::MAX_CHARS).collect())
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub version: String,
    pub run: RunStage,
    pub compile: Option<RunStage>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStage {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub output: String,
    pub code: Option<i32>,
    pub signal: Option<String>,
}

impl ExecuteResponse {
    /// The text a user should see: compiler output when compilation failed,
    /// the program's combined output otherwise.
    pub fn output_text(&self) -> &str {
        match &self.compile {
            Some(compile) if compile.code.is_some_and(|c| c != 0) => &compile.output,
            _ => &self.run.output,
        }
    }
}

/// Why an execution request failed. `Display` is a single line safe to show users;
/// response bodies and transport details are only logged.
#[derive(Debug, PartialEq, Eq)]
pub enum ExecuteError {
    Unreachable,
    Status(u16),
    Rejected(String),
    Parse,
}

impl std::fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecuteError::Unreachable => write!(f, "could not reach the execution service"),
            ExecuteError::Status(status) => write!(f, "execution service returned {status}"),
            ExecuteError::Rejected(message) => write!(f, "{message}"),
            ExecuteError::Parse => write!(f, "unexpected response from the execution service"),
        }
    }
}

impl std::error::Error for ExecuteError {}

impl PistonClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { url: url.into(), client })
    }
}

impl CodeRunner for PistonClient {
    async fn execute(&self, source: &str, language: Language) -> Result<ExecuteResponse, ExecuteError> {
        info!("▶️ Executing {} lines of {}", source.lines().count(), language);

        let request = ExecuteRequest {
            language: language.name,
            version: language.version,
            files: vec![SourceFile { content: source }],
            args: Vec::new(),
            stdin: "",
            log: 0,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Piston request failed: {e}");
                ExecuteError::Unreachable
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| {
                warn!("Failed to read Piston response: {e}");
                ExecuteError::Unreachable
            })?;

        debug!("Piston response status: {status}");

        if !status.is_success() {
            if let Ok(rejection) = serde_json::from_str::<Rejection>(&body) {
                return Err(rejection.into_error());
            }
            warn!("Piston returned {status}: {body}");
            return Err(ExecuteError::Status(status.as_u16()));
        }

        match serde_json::from_str::<ExecuteResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) => match serde_json::from_str::<Rejection>(&body) {
                Ok(rejection) => Err(rejection.into_error()),
                Err(_) => {
                    warn!("Unparseable Piston response ({e}): {body}");
                    Err(ExecuteError::Parse)
                }
            },
        }
    }
}
