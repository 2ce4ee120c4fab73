//! Append-only chat log.
//!
//! One JSON object per line. Written for auditing, never read back by the
//! program itself.

use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Message direction for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Serialize)]
struct ChatLogEntry<'a> {
    timestamp: DateTime<Utc>,
    direction: Direction,
    subject: &'a str,
    content: &'a str,
}

/// Appends audit entries to a JSONL file.
#[derive(Debug, Clone)]
pub struct ChatLog {
    file_path: PathBuf,
}

impl ChatLog {
    pub fn new(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    /// Append one entry. Retried once on failure.
    pub async fn append(&self, direction: Direction, subject: &str, content: &str) -> Result<()> {
        let entry = ChatLogEntry {
            timestamp: Utc::now(),
            direction,
            subject,
            content,
        };
        let line = serde_json::to_string(&entry)?;

        match self.append_line(&line).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!("Chat log append failed ({}), retrying once", first);
                self.append_line(&line).await
            }
        }
    }

    async fn append_line(&self, line: &str) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .await?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        Ok(())
    }
}
