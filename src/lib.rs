//! Messej - daily digest companion
//!
//! A once-per-invocation pipeline that:
//! - Fetches unread inbox replies matching a subject marker
//! - Generates conversational content via a language-model API
//! - Pulls the day's top headlines from a news feed
//! - Sends a single HTML + plain-text digest email
//! - Persists what it learned about the user to a memory file

pub mod digest;
pub mod llm;
pub mod mail;
pub mod memory;
pub mod news;
pub mod pipeline;
pub mod prompts;

pub use digest::DigestContent;
pub use llm::ChatClient;
pub use memory::{ChatLog, MemoryRecord};
pub use news::{Headline, NewsClient};
pub use pipeline::Pipeline;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default subject-line marker identifying mail addressed to the bot.
pub const DEFAULT_SUBJECT_MARKER: &str = "ChatBot";

/// Default chat-completions model.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default chat-completions endpoint.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for a Messej run.
///
/// Credentials come from the environment (missing ones abort startup before
/// any network activity); everything else has a default that an optional
/// `config.toml` in the state directory can override.
#[derive(Debug, Clone)]
pub struct MessejConfig {
    /// Language-model API key
    pub llm_api_key: String,

    /// Mail account address (sender, and the default digest recipient)
    pub email_address: String,

    /// Mail account password or app password
    pub email_password: String,

    /// News-feed API key
    pub news_api_key: String,

    /// Inbound mail host
    pub imap_host: String,

    /// Outbound mail host
    pub smtp_host: String,

    /// Digest recipient
    pub recipient: String,

    /// Subject marker for inbound replies
    pub subject_marker: String,

    /// Chat-completions model
    pub model: String,

    /// Chat-completions base URL
    pub base_url: String,

    /// News country filter
    pub news_country: String,

    /// Max headlines per digest
    pub news_page_size: usize,

    /// Path to the memory file
    pub memory_file: PathBuf,

    /// Path to the chat log file
    pub chat_log_file: PathBuf,
}

/// Partial `config.toml` in the state directory. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct ConfigToml {
    model: Option<String>,
    base_url: Option<String>,
    recipient: Option<String>,
    subject_marker: Option<String>,
    news_country: Option<String>,
    news_page_size: Option<usize>,
}

impl MessejConfig {
    /// Load configuration: required credentials from the environment, then
    /// overlay the optional `config.toml` from the state directory.
    pub async fn load(state_dir: &Path) -> Result<Self> {
        let llm_api_key = require_env("OPENAI_API_KEY")?;
        let email_address = require_env("EMAIL_ADDRESS")?;
        let email_password = require_env("EMAIL_PASSWORD")?;
        let news_api_key = require_env("NEWS_API_KEY")?;

        let imap_host =
            std::env::var("IMAP_HOST").unwrap_or_else(|_| "imap.gmail.com".to_string());
        let smtp_host =
            std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string());

        let mut config = Self {
            recipient: email_address.clone(),
            llm_api_key,
            email_address,
            email_password,
            news_api_key,
            imap_host,
            smtp_host,
            subject_marker: DEFAULT_SUBJECT_MARKER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            news_country: "us".to_string(),
            news_page_size: 5,
            memory_file: state_dir.join("memory.json"),
            chat_log_file: state_dir.join("chat_log.jsonl"),
        };

        let config_file = state_dir.join("config.toml");
        if config_file.exists() {
            if let Ok(content) = tokio::fs::read_to_string(&config_file).await {
                match toml::from_str::<ConfigToml>(&content) {
                    Ok(overrides) => config.apply_toml(overrides),
                    Err(e) => tracing::warn!("Ignoring unparseable config.toml: {}", e),
                }
            }
        }

        Ok(config)
    }

    fn apply_toml(&mut self, overrides: ConfigToml) {
        if let Some(model) = overrides.model {
            self.model = model;
        }
        if let Some(base_url) = overrides.base_url {
            self.base_url = base_url;
        }
        if let Some(recipient) = overrides.recipient {
            self.recipient = recipient;
        }
        if let Some(marker) = overrides.subject_marker {
            self.subject_marker = marker;
        }
        if let Some(country) = overrides.news_country {
            self.news_country = country;
        }
        if let Some(page_size) = overrides.news_page_size {
            self.news_page_size = page_size.clamp(1, 10);
        }
    }

    pub fn with_memory_file(mut self, path: PathBuf) -> Self {
        self.memory_file = path;
        self
    }

    pub fn with_chat_log_file(mut self, path: PathBuf) -> Self {
        self.chat_log_file = path;
        self
    }
}

fn require_env(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(MessejError::MissingEnv(name)),
    }
}

/// Result type for Messej operations
pub type Result<T> = std::result::Result<T, MessejError>;

/// Errors that can occur in Messej
#[derive(Debug, thiserror::Error)]
pub enum MessejError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("LLM request error: {0}")]
    Llm(String),

    #[error("News feed error: {0}")]
    News(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
