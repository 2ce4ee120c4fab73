//! The digest pipeline: one linear run per invocation.
//!
//! Load memory → fetch mail → process each message → generate content →
//! update and persist memory → compose → send → mark messages seen. The
//! memory record is an explicit value threaded through the run; the file is
//! read once at the start and replaced once before delivery. There is no
//! resumable checkpoint: a failed run is simply retried from current
//! mail/memory state by the next invocation.
//!
//! Memory is persisted before the send, so a delivery failure never rolls
//! back what was learned; the next run may resend similar content
//! (at-least-once delivery, an accepted limitation).

use crate::digest::{self, DigestContent};
use crate::llm::{ChatClient, Prompt};
use crate::mail::{InboundMessage, Mailbox, Outbox};
use crate::memory::{
    profiler, ChatLog, CueExtractor, Direction, KeywordExtractor, LlmExtractor, MemoryRecord,
};
use crate::news::NewsClient;
use crate::prompts;
use crate::{MessejConfig, Result};
use tracing::{error, info, warn};

/// Outcome summary of one run.
#[derive(Debug)]
pub struct RunReport {
    pub inbound: usize,
    pub headlines: usize,
    pub subject: String,
    pub sent: bool,
}

/// Owns the external clients and drives one run end to end.
pub struct Pipeline {
    config: MessejConfig,
    mailbox: Mailbox,
    outbox: Outbox,
    chat: ChatClient,
    news: NewsClient,
    chat_log: ChatLog,
    keyword_extractor: KeywordExtractor,
    llm_extractor: LlmExtractor,
}

impl Pipeline {
    pub fn new(config: MessejConfig) -> Self {
        let mailbox = Mailbox::new(
            config.imap_host.clone(),
            config.email_address.clone(),
            config.email_password.clone(),
        );
        let outbox = Outbox::new(
            config.smtp_host.clone(),
            config.email_address.clone(),
            config.email_password.clone(),
        );
        let chat = ChatClient::new(
            config.llm_api_key.clone(),
            config.base_url.clone(),
            config.model.clone(),
        );
        let news = NewsClient::new(
            config.news_api_key.clone(),
            config.news_country.clone(),
            config.news_page_size,
        );
        let chat_log = ChatLog::new(config.chat_log_file.clone());
        let llm_extractor = LlmExtractor::new(chat.clone());

        Self {
            config,
            mailbox,
            outbox,
            chat,
            news,
            chat_log,
            keyword_extractor: KeywordExtractor::new(),
            llm_extractor,
        }
    }

    /// Run the whole pipeline once. With `dry_run` the digest is composed
    /// but nothing is written, sent, or marked read.
    pub async fn run(&self, dry_run: bool) -> Result<RunReport> {
        let mut memory = MemoryRecord::load(&self.config.memory_file).await;
        info!(
            "Memory loaded: {} history entries, {} interests",
            memory.conversation_history.len(),
            memory.interests.len()
        );

        // Mail fetch failures are fatal for this invocation; the next
        // scheduled run retries.
        let messages = self
            .mailbox
            .fetch_unread(&self.config.subject_marker)
            .await?;
        info!("Fetched {} unread replies", messages.len());

        let summaries = self
            .process_inbound(&messages, &mut memory, dry_run)
            .await?;

        let content = self.generate_content(&summaries, &mut memory).await;
        let headline_count = content.headlines.len();

        let hour = digest::local_hour(memory.timezone.as_deref());
        let email = digest::compose(&content, memory.name.as_deref(), hour);

        memory.push_history("messej", &email.text_body);

        if dry_run {
            info!("Dry run: skipping persist, send, and mark-seen");
            println!("{}", email.text_body);
            return Ok(RunReport {
                inbound: messages.len(),
                headlines: headline_count,
                subject: email.subject,
                sent: false,
            });
        }

        // Persist before delivery: a send failure must not lose what the
        // run learned.
        memory.save(&self.config.memory_file).await?;

        self.outbox.send(&self.config.recipient, &email).await?;
        self.chat_log
            .append(Direction::Outbound, &email.subject, &email.text_body)
            .await?;

        // The digest is out; a failure here only means the same replies are
        // picked up again next run.
        let uids: Vec<u32> = messages.iter().map(|m| m.uid).collect();
        if let Err(e) = self.mailbox.mark_seen(uids).await {
            error!("Failed to mark messages as read: {}", e);
        }

        info!("Run complete: digest '{}' delivered", email.subject);
        Ok(RunReport {
            inbound: messages.len(),
            headlines: headline_count,
            subject: email.subject,
            sent: true,
        })
    }

    /// Summarize each inbound message, harvest profile cues, and record the
    /// exchange in memory and the chat log.
    async fn process_inbound(
        &self,
        messages: &[InboundMessage],
        memory: &mut MemoryRecord,
        dry_run: bool,
    ) -> Result<Vec<String>> {
        let mut summaries = Vec::new();

        for message in messages {
            info!("Processing reply from {}: {}", message.sender, message.subject);

            let summary = match self
                .chat
                .complete(&Prompt::new("summary", prompts::summary(&message.body)))
                .await
            {
                Ok(summary) => summary,
                Err(e) => {
                    warn!("Summary generation failed ({}), using raw excerpt", e);
                    excerpt(&message.body, 280)
                }
            };

            // Keyword cues always run; the structured LLM pass is additive
            // and its failure is non-fatal.
            match self.keyword_extractor.extract(&message.body).await {
                Ok(delta) if !delta.is_empty() => memory.apply(delta),
                Ok(_) => {}
                Err(e) => warn!("Keyword extraction failed: {}", e),
            }
            match self.llm_extractor.extract(&message.body).await {
                Ok(delta) if !delta.is_empty() => memory.apply(delta),
                Ok(_) => {}
                Err(e) => warn!("LLM extraction failed: {}", e),
            }

            memory.push_history(&message.sender, &message.body);
            memory.pending_question = None;

            if !dry_run {
                self.chat_log
                    .append(Direction::Inbound, &message.subject, &message.body)
                    .await?;
            }

            summaries.push(summary);
        }

        Ok(summaries)
    }

    /// Generate the digest fragments. Every section degrades independently:
    /// a failed call is logged and that section is omitted.
    async fn generate_content(
        &self,
        summaries: &[String],
        memory: &mut MemoryRecord,
    ) -> DigestContent {
        let profile = memory.profile_summary();
        let mut content = DigestContent::default();

        if !summaries.is_empty() {
            content.reply = self
                .generate_section(Prompt::new("reply", prompts::reply(summaries, &profile)))
                .await;
        }

        content.headlines = match self.news.top_headlines().await {
            Ok(headlines) => headlines,
            Err(e) => {
                warn!("News fetch failed, digest goes out without headlines: {}", e);
                Vec::new()
            }
        };

        if !content.headlines.is_empty() {
            content.fact = self
                .generate_section(
                    Prompt::new("fact", prompts::fact(&content.headlines)).with_temperature(0.9),
                )
                .await;
            content.story = self
                .generate_section(
                    Prompt::new("story", prompts::story(&content.headlines, &profile))
                        .with_temperature(0.9),
                )
                .await;
        }

        if let Some(question) = profiler::next_question(memory) {
            memory.note_question_asked(question);
            content.question = Some(question.to_string());
        }

        content
    }

    async fn generate_section(&self, prompt: Prompt) -> Option<String> {
        match self.chat.complete(&prompt).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!("Section '{}' omitted from digest: {}", prompt.id, e);
                None
            }
        }
    }
}

fn excerpt(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let end = text
        .char_indices()
        .nth(max)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    format!("{}...", &text[..end])
}
