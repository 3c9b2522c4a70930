use regex::Regex;
use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use teloxide::types::ChatId;

use crate::piston::PISTON_EXECUTE_URL;

pub const DEFAULT_CONFIG_PATH: &str = "codebot.json";
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const WEBHOOK_URL_ENV: &str = "WEBHOOK_URL";

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// No bot token in the environment or the config file.
    MissingToken,
    /// A URL setting does not parse.
    InvalidUrl { key: &'static str, value: String },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::MissingToken => write!(
                f,
                "{TOKEN_ENV} is not set (export it or add telegram_bot_token to the config file)"
            ),
            Self::InvalidUrl { key, value } => write!(f, "invalid URL for {key}: '{value}'"),
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    telegram_bot_token: Option<String>,
    /// Piston-compatible execute endpoint.
    execute_url: Option<String>,
    collect_window_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    /// Public URL Telegram should POST updates to. Polling is used when unset.
    webhook_url: Option<String>,
    /// Local address the webhook server binds to.
    webhook_addr: Option<SocketAddr>,
    /// Directory for logs. Defaults to current directory.
    data_dir: Option<String>,
    log_chat_id: Option<i64>,
}

/// Values taken from the process environment.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub telegram_bot_token: Option<String>,
    pub webhook_url: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            telegram_bot_token: var(TOKEN_ENV),
            webhook_url: var(WEBHOOK_URL_ENV),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: Url,
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub execute_url: String,
    pub collect_window: Duration,
    pub request_timeout: Duration,
    /// Set when updates arrive via webhook instead of long polling.
    pub webhook: Option<WebhookConfig>,
    pub data_dir: PathBuf,
    pub log_chat_id: Option<ChatId>,
}

impl Config {
    /// Load from `path` (or the default file, if present) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_sources(Some(path), EnvOverrides::from_env()),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                let path = default.exists().then_some(default);
                Self::from_sources(path, EnvOverrides::from_env())
            }
        }
    }

    pub fn from_sources(path: Option<&Path>, env: EnvOverrides) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::ReadFile { path: path.to_path_buf(), source: e })?;
                serde_json::from_str(&content)
                    .map_err(|e| ConfigError::ParseJson { path: path.to_path_buf(), source: e })?
            }
            None => ConfigFile::default(),
        };

        let telegram_bot_token = env
            .telegram_bot_token
            .or(file.telegram_bot_token)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_format = Regex::new(r"^\d+:[A-Za-z0-9_-]+$")
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        if !token_format.is_match(&telegram_bot_token) {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }

        let execute_url = file.execute_url.unwrap_or_else(|| PISTON_EXECUTE_URL.to_string());
        if Url::parse(&execute_url).is_err() {
            return Err(ConfigError::InvalidUrl { key: "execute_url", value: execute_url });
        }

        let collect_window_secs = file.collect_window_secs.unwrap_or(60);
        if collect_window_secs == 0 {
            return Err(ConfigError::Validation("collect_window_secs must be greater than 0".into()));
        }
        let request_timeout_secs = file.request_timeout_secs.unwrap_or(30);
        if request_timeout_secs == 0 {
            return Err(ConfigError::Validation("request_timeout_secs must be greater than 0".into()));
        }

        let webhook = match env.webhook_url.or(file.webhook_url) {
            Some(raw) => {
                let url = Url::parse(&raw)
                    .map_err(|_| ConfigError::InvalidUrl { key: "webhook_url", value: raw.clone() })?;
                let addr = file
                    .webhook_addr
                    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8443)));
                Some(WebhookConfig { url, addr })
            }
            None => None,
        };

        Ok(Self {
            telegram_bot_token,
            execute_url,
            collect_window: Duration::from_secs(collect_window_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            webhook,
            data_dir: file.data_dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            log_chat_id: file.log_chat_id.map(ChatId),
        })
    }
}
