//! Persisted user-memory record.
//!
//! One JSON file, loaded once at the start of a run and written back once at
//! the end via a whole-file replace (temp file + rename). A corrupt or
//! missing file is treated as "no memory yet", never a fatal error.

use crate::{MessejError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Conversation history entries kept in the record.
const HISTORY_CAP: usize = 200;

/// One exchange in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    pub text: String,
}

/// Everything Messej remembers about the user.
///
/// Every field defaults so that records written by older versions (or an
/// empty file) still deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// User display name
    #[serde(default)]
    pub name: Option<String>,

    /// Known interests, in the order they were learned
    #[serde(default)]
    pub interests: Vec<String>,

    /// Work-context notes
    #[serde(default)]
    pub work_notes: String,

    /// Learning goals
    #[serde(default)]
    pub learning_goals: Vec<String>,

    /// Preferred interaction schedule (early bird / night owl / ...)
    #[serde(default)]
    pub schedule_preference: String,

    /// Preferred news topics
    #[serde(default)]
    pub news_topics: Vec<String>,

    /// City / area the user lives in
    #[serde(default)]
    pub location: Option<String>,

    /// IANA timezone name, used for the recipient-local greeting
    #[serde(default)]
    pub timezone: Option<String>,

    /// Conversation history, oldest first
    #[serde(default)]
    pub conversation_history: Vec<ConversationEntry>,

    /// Topics already discussed
    #[serde(default)]
    pub topics_discussed: BTreeSet<String>,

    /// Profiling questions already asked
    #[serde(default)]
    pub questions_asked: BTreeSet<String>,

    /// Question sent in the last digest, awaiting an answer
    #[serde(default)]
    pub pending_question: Option<String>,

    /// Last interaction timestamp
    #[serde(default)]
    pub last_interaction: Option<DateTime<Utc>>,
}

/// Partial record update produced by a cue extractor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryDelta {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub interests: Vec<String>,

    #[serde(default)]
    pub work_notes: Option<String>,

    #[serde(default)]
    pub learning_goals: Vec<String>,

    #[serde(default)]
    pub schedule_preference: Option<String>,

    #[serde(default)]
    pub news_topics: Vec<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub timezone: Option<String>,

    #[serde(default)]
    pub topics: Vec<String>,
}

impl MemoryDelta {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.interests.is_empty()
            && self.work_notes.is_none()
            && self.learning_goals.is_empty()
            && self.schedule_preference.is_none()
            && self.news_topics.is_empty()
            && self.location.is_none()
            && self.timezone.is_none()
            && self.topics.is_empty()
    }
}

impl MemoryRecord {
    /// Load the record, or a fresh one when the file is absent or corrupt.
    pub async fn load(path: &Path) -> Self {
        match fs::read_to_string(path).await {
            Ok(content) => match serde_json::from_str::<Self>(&content) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Memory file {} is corrupt ({}), starting fresh", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist the full record with a whole-file replace: write a temp file
    /// next to the target, then rename over it. Retried once on failure.
    pub async fn save(&self, path: &Path) -> Result<()> {
        match self.save_once(path).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!("Memory save failed ({}), retrying once", first);
                self.save_once(path).await
            }
        }
    }

    async fn save_once(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        fs::rename(&tmp_path, path)
            .await
            .map_err(|e| MessejError::Persistence(format!("replace {}: {}", path.display(), e)))
    }

    /// Merge a partial update into the record.
    pub fn apply(&mut self, delta: MemoryDelta) {
        if let Some(name) = delta.name {
            self.name = Some(name);
        }
        if let Some(notes) = delta.work_notes {
            self.work_notes = notes;
        }
        if let Some(schedule) = delta.schedule_preference {
            self.schedule_preference = schedule;
        }
        if let Some(location) = delta.location {
            self.location = Some(location);
        }
        if let Some(timezone) = delta.timezone {
            self.timezone = Some(timezone);
        }
        for interest in delta.interests {
            push_unique(&mut self.interests, interest);
        }
        for goal in delta.learning_goals {
            push_unique(&mut self.learning_goals, goal);
        }
        for topic in delta.news_topics {
            push_unique(&mut self.news_topics, topic);
        }
        for topic in delta.topics {
            self.topics_discussed.insert(topic);
        }
    }

    /// Append a conversation entry and refresh the interaction timestamp.
    pub fn push_history(&mut self, sender: &str, text: &str) {
        self.conversation_history.push(ConversationEntry {
            timestamp: Utc::now(),
            sender: sender.to_string(),
            text: text.to_string(),
        });
        if self.conversation_history.len() > HISTORY_CAP {
            self.conversation_history.remove(0);
        }
        self.last_interaction = Some(Utc::now());
    }

    /// Record a profiling question as asked and pending.
    pub fn note_question_asked(&mut self, question: &str) {
        self.questions_asked.insert(question.to_string());
        self.pending_question = Some(question.to_string());
    }

    /// Short profile summary injected into generation prompts.
    pub fn profile_summary(&self) -> String {
        let mut parts = Vec::new();

        if let Some(name) = &self.name {
            parts.push(format!("Name: {}", name));
        }
        if !self.interests.is_empty() {
            parts.push(format!("Interests: {}", self.interests.join(", ")));
        }
        if !self.work_notes.is_empty() {
            parts.push(format!("Work: {}", self.work_notes));
        }
        if !self.learning_goals.is_empty() {
            parts.push(format!("Learning: {}", self.learning_goals.join(", ")));
        }
        if !self.schedule_preference.is_empty() {
            parts.push(format!("Schedule: {}", self.schedule_preference));
        }
        if !self.news_topics.is_empty() {
            parts.push(format!("News topics: {}", self.news_topics.join(", ")));
        }
        if let Some(location) = &self.location {
            parts.push(format!("Location: {}", location));
        }
        parts.push(format!(
            "Previous exchanges: {}",
            self.conversation_history.len()
        ));

        parts.join("\n")
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    let value = value.trim().to_string();
    if value.is_empty() {
        return;
    }
    if !list.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
        list.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn round_trip_empty_record() {
        let record = MemoryRecord::default();
        let json = serde_json::to_string_pretty(&record).unwrap();
        let back: MemoryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn round_trip_populated_record() {
        let mut record = MemoryRecord::default();
        record.name = Some("Sam".into());
        record.apply(MemoryDelta {
            interests: vec!["hiking".into(), "chess".into()],
            work_notes: Some("teaches math".into()),
            topics: vec!["weather".into()],
            ..Default::default()
        });
        record.push_history("user", "hello");
        record.note_question_asked("What name should I use?");

        let json = serde_json::to_string_pretty(&record).unwrap();
        let back: MemoryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn missing_keys_default() {
        let record: MemoryRecord = serde_json::from_str(r#"{"name": "Sam"}"#).unwrap();
        assert_eq!(record.name.as_deref(), Some("Sam"));
        assert!(record.interests.is_empty());
        assert!(record.conversation_history.is_empty());
        assert!(record.last_interaction.is_none());
    }

    #[test]
    fn apply_dedupes_case_insensitively() {
        let mut record = MemoryRecord::default();
        record.apply(MemoryDelta {
            interests: vec!["Hiking".into()],
            ..Default::default()
        });
        record.apply(MemoryDelta {
            interests: vec!["hiking".into(), " ".into()],
            ..Default::default()
        });
        assert_eq!(record.interests, vec!["Hiking".to_string()]);
    }

    #[tokio::test]
    async fn load_missing_file_is_fresh() {
        let dir = TempDir::new().unwrap();
        let record = MemoryRecord::load(&dir.path().join("memory.json")).await;
        assert_eq!(record, MemoryRecord::default());
    }

    #[tokio::test]
    async fn load_corrupt_file_is_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memory.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let record = MemoryRecord::load(&path).await;
        assert_eq!(record, MemoryRecord::default());
    }

    #[tokio::test]
    async fn save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memory.json");

        let mut record = MemoryRecord::default();
        record.name = Some("Sam".into());
        record.push_history("user", "I love hiking");
        record.save(&path).await.unwrap();

        let back = MemoryRecord::load(&path).await;
        assert_eq!(back, record);
        // no stray temp file after the rename
        assert!(!path.with_extension("json.tmp").exists());
    }
}
