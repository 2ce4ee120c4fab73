//! Cue extraction: inbound text → partial memory update.
//!
//! Extraction sits behind the [`CueExtractor`] trait so the strategy can be
//! swapped without touching the pipeline. Two implementations:
//!
//! - [`KeywordExtractor`]: deterministic regex cues, always run.
//! - [`LlmExtractor`]: a follow-up completion returning structured JSON,
//!   parsed JSON-first with a brace-scanning fallback; its failure is
//!   logged by the caller and never aborts the run.

use crate::llm::{ChatClient, Prompt};
use crate::memory::MemoryDelta;
use crate::prompts;
use crate::{MessejError, Result};
use async_trait::async_trait;
use regex::Regex;

/// Extracts a partial record update from inbound text.
#[async_trait]
pub trait CueExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<MemoryDelta>;
}

// ── Keyword extractor ───────────────────────────────────────────────

/// Regex-based cue matching. Cheap, offline, and deliberately loose: a
/// phrase like "I love hiking" yields the interest "hiking".
pub struct KeywordExtractor {
    interest: Regex,
    work: Regex,
    learning: Regex,
    location: Regex,
    name: Regex,
    news: Regex,
    schedule: Regex,
}

impl KeywordExtractor {
    pub fn new() -> Self {
        Self {
            interest: Regex::new(
                r"(?i)\bi (?:love|enjoy|really like|like|am into|'m into) ([a-zA-Z][a-zA-Z0-9' -]{1,40})",
            )
            .unwrap(),
            work: Regex::new(r"(?i)\bi work (?:as|at|in|on) ([a-zA-Z][a-zA-Z0-9' -]{1,60})")
                .unwrap(),
            learning: Regex::new(
                r"(?i)\b(?:i am|i'm|i've been) learning ([a-zA-Z][a-zA-Z0-9' -]{1,40})",
            )
            .unwrap(),
            location: Regex::new(
                r"(?i)\bi (?:live|am based|'m based) in ([a-zA-Z][a-zA-Z0-9' ,-]{1,40})",
            )
            .unwrap(),
            name: Regex::new(r"(?i)\b(?:my name is|call me) ([A-Z][a-zA-Z'-]{1,30})").unwrap(),
            news: Regex::new(
                r"(?i)\binterested in ([a-zA-Z][a-zA-Z0-9' -]{1,40}) news",
            )
            .unwrap(),
            schedule: Regex::new(r"(?i)\b(early bird|night owl|morning person|evening person)\b")
                .unwrap(),
        }
    }

    /// Cut a captured phrase at the first clause boundary and cap its length.
    fn clean_phrase(raw: &str) -> String {
        let mut phrase = raw.trim();
        for sep in [" and ", " but ", " because ", " so ", " when ", " which "] {
            if let Some(pos) = phrase.find(sep) {
                phrase = &phrase[..pos];
            }
        }
        let words: Vec<&str> = phrase.split_whitespace().take(4).collect();
        words
            .join(" ")
            .trim_end_matches(['.', ',', '!', '?'])
            .to_string()
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CueExtractor for KeywordExtractor {
    async fn extract(&self, text: &str) -> Result<MemoryDelta> {
        let mut delta = MemoryDelta::default();

        for caps in self.interest.captures_iter(text) {
            let phrase = Self::clean_phrase(&caps[1]);
            if !phrase.is_empty() {
                delta.interests.push(phrase.clone());
                delta.topics.push(phrase);
            }
        }
        if let Some(caps) = self.work.captures(text) {
            let phrase = Self::clean_phrase(&caps[1]);
            if !phrase.is_empty() {
                delta.work_notes = Some(phrase);
            }
        }
        for caps in self.learning.captures_iter(text) {
            let phrase = Self::clean_phrase(&caps[1]);
            if !phrase.is_empty() {
                delta.learning_goals.push(phrase);
            }
        }
        if let Some(caps) = self.location.captures(text) {
            let phrase = Self::clean_phrase(&caps[1]);
            if !phrase.is_empty() {
                delta.location = Some(phrase);
            }
        }
        if let Some(caps) = self.name.captures(text) {
            delta.name = Some(caps[1].trim().to_string());
        }
        for caps in self.news.captures_iter(text) {
            let phrase = Self::clean_phrase(&caps[1]);
            if !phrase.is_empty() {
                delta.news_topics.push(phrase);
            }
        }
        if let Some(caps) = self.schedule.captures(text) {
            delta.schedule_preference = Some(caps[1].to_lowercase());
        }

        Ok(delta)
    }
}

// ── LLM extractor ───────────────────────────────────────────────────

/// Structured extraction via a follow-up completion.
pub struct LlmExtractor {
    client: ChatClient,
}

impl LlmExtractor {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    /// Parse the completion into a delta: full JSON first, then the first
    /// balanced `{…}` substring.
    fn parse_delta(response: &str) -> Result<MemoryDelta> {
        let text = response.trim();

        if let Ok(delta) = serde_json::from_str::<MemoryDelta>(text) {
            return Ok(delta);
        }
        if let Some(json_str) = extract_json_object(text) {
            if let Ok(delta) = serde_json::from_str::<MemoryDelta>(json_str) {
                return Ok(delta);
            }
        }

        Err(MessejError::Llm(format!(
            "extraction response was not valid JSON: {}",
            text.chars().take(120).collect::<String>()
        )))
    }
}

#[async_trait]
impl CueExtractor for LlmExtractor {
    async fn extract(&self, text: &str) -> Result<MemoryDelta> {
        let prompt = Prompt::new("extract", prompts::extraction(text));
        let response = self.client.complete(&prompt).await?;
        Self::parse_delta(&response)
    }
}

/// Extract the first `{…}` JSON object from a text blob.
/// Handles nested braces and strings properly.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return text.get(start..start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn love_hiking_yields_interest() {
        let extractor = KeywordExtractor::new();
        let delta = extractor.extract("I love hiking").await.unwrap();
        assert_eq!(delta.interests, vec!["hiking".to_string()]);
        assert_eq!(delta.topics, vec!["hiking".to_string()]);
    }

    #[tokio::test]
    async fn clause_boundaries_are_trimmed() {
        let extractor = KeywordExtractor::new();
        let delta = extractor
            .extract("I enjoy rock climbing and I work as a teacher in Denver.")
            .await
            .unwrap();
        assert_eq!(delta.interests, vec!["rock climbing".to_string()]);
        assert!(delta.work_notes.is_some());
    }

    #[tokio::test]
    async fn schedule_and_name_cues() {
        let extractor = KeywordExtractor::new();
        let delta = extractor
            .extract("Call me Sam, I'm a night owl these days.")
            .await
            .unwrap();
        assert_eq!(delta.name.as_deref(), Some("Sam"));
        assert_eq!(delta.schedule_preference.as_deref(), Some("night owl"));
    }

    #[tokio::test]
    async fn no_cues_is_empty() {
        let extractor = KeywordExtractor::new();
        let delta = extractor.extract("Thanks for the update!").await.unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn parse_delta_full_json() {
        let delta = LlmExtractor::parse_delta(
            r#"{"interests": ["astronomy"], "location": "Lisbon"}"#,
        )
        .unwrap();
        assert_eq!(delta.interests, vec!["astronomy".to_string()]);
        assert_eq!(delta.location.as_deref(), Some("Lisbon"));
    }

    #[test]
    fn parse_delta_embedded_json() {
        let delta = LlmExtractor::parse_delta(
            r#"Here is what I found: {"news_topics": ["science"]} hope that helps"#,
        )
        .unwrap();
        assert_eq!(delta.news_topics, vec!["science".to_string()]);
    }

    #[test]
    fn parse_delta_garbage_is_error() {
        assert!(LlmExtractor::parse_delta("no json here").is_err());
    }

    #[test]
    fn extract_json_nested() {
        let text = r#"prefix {"a": {"b": 1}, "c": 2} suffix"#;
        assert_eq!(extract_json_object(text), Some(r#"{"a": {"b": 1}, "c": 2}"#));
    }
}
