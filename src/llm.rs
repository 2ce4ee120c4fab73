//! Chat-completions client.
//!
//! Plain request/response (no streaming): POST the prompt, return the first
//! choice's message content. Transient failures (timeouts, connection
//! errors, 5xx, 429) are retried with exponential backoff and deterministic
//! jitter. Every call site passes a [`Prompt`] carrying a stable identifier
//! so failures are logged with endpoint + prompt id.

use crate::{MessejError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const MAX_RETRY_ATTEMPTS: u32 = 4;
const RETRY_BASE_DELAY_MS: u64 = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// One prompt submitted to the completion endpoint.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Stable identifier used in logs ("reply", "fact", "story", ...)
    pub id: &'static str,
    pub text: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Prompt {
    pub fn new(id: &'static str, text: String) -> Self {
        Self {
            id,
            text,
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

// ── Client ──────────────────────────────────────────────────────────

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ChatClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("messej/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }

    /// Submit a prompt and return the generated text.
    pub async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(&url, prompt).await {
                Ok(content) => {
                    debug!("LLM call '{}' succeeded on attempt {}", prompt.id, attempt);
                    return Ok(content);
                }
                Err(e) if attempt < MAX_RETRY_ATTEMPTS && is_retryable(&e) => {
                    let delay = retry_backoff(attempt);
                    warn!(
                        "LLM call '{}' to {} failed (attempt {}): {}; retrying in {:?}",
                        prompt.id, url, attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!("LLM call '{}' to {} failed: {}", prompt.id, url, e);
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(&self, url: &str, prompt: &Prompt) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.text.clone(),
            }],
            max_tokens: prompt.max_tokens,
            temperature: prompt.temperature,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MessejError::Llm(format!("error sending request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let marker = if status.is_server_error() || status.as_u16() == 429 {
                "retryable "
            } else {
                ""
            };
            return Err(MessejError::Llm(format!(
                "{}HTTP {}: {}",
                marker,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| MessejError::Llm(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| MessejError::Llm("empty choices in response".to_string()))
    }
}

/// Exponential backoff with deterministic jitter.
fn retry_backoff(attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base_ms = RETRY_BASE_DELAY_MS.saturating_mul(exp);
    let jitter = 1.0 + ((attempt as f64 * 0.37).sin() * 0.1);
    Duration::from_millis((base_ms as f64 * jitter) as u64)
}

/// Transient conditions worth another attempt.
fn is_retryable(err: &MessejError) -> bool {
    let msg = err.to_string();
    msg.contains("retryable")
        || msg.contains("timeout")
        || msg.contains("connection")
        || msg.contains("error sending request")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_attempts() {
        let first = retry_backoff(1);
        let second = retry_backoff(2);
        let third = retry_backoff(3);
        assert!(first < second);
        assert!(second < third);
    }

    #[test]
    fn retryable_classification() {
        assert!(is_retryable(&MessejError::Llm(
            "retryable HTTP 503: overloaded".into()
        )));
        assert!(is_retryable(&MessejError::Llm(
            "error sending request: dns failure".into()
        )));
        assert!(!is_retryable(&MessejError::Llm(
            "HTTP 401 Unauthorized: bad key".into()
        )));
    }

    #[test]
    fn prompt_defaults() {
        let prompt = Prompt::new("reply", "hello".into());
        assert_eq!(prompt.id, "reply");
        assert!((prompt.temperature - 0.7).abs() < f32::EPSILON);

        let hot = prompt.with_temperature(0.9);
        assert!((hot.temperature - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn parses_chat_response() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "hi there"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content, "hi there");
    }
}
