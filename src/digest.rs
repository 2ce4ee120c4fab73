//! Digest assembly.
//!
//! Deterministic local rendering: the generated fragments are woven into
//! one plain-text body and one HTML body. Sections with no content are
//! omitted entirely, so a run with no headlines or a failed generation
//! still produces a well-formed email.

use crate::mail::OutboundEmail;
use crate::news::Headline;
use chrono::{Local, Timelike, Utc};
use chrono_tz::Tz;
use tracing::debug;

/// The content fragments a digest is assembled from.
#[derive(Debug, Clone, Default)]
pub struct DigestContent {
    /// Conversational reply to the day's inbound mail
    pub reply: Option<String>,

    /// Headline-related fact
    pub fact: Option<String>,

    /// First-person story tied to a headline
    pub story: Option<String>,

    /// Today's headlines
    pub headlines: Vec<Headline>,

    /// Profiling question, at most one per digest
    pub question: Option<String>,
}

/// Coarse time of day for the greeting and subject line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            4..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            _ => Self::Evening,
        }
    }

    fn greeting(self) -> &'static str {
        match self {
            Self::Morning => "Good morning",
            Self::Afternoon => "Good afternoon",
            Self::Evening => "Good evening",
        }
    }

    pub fn subject(self) -> &'static str {
        match self {
            Self::Morning => "Morning chat and updates",
            Self::Afternoon => "Afternoon updates and stories",
            Self::Evening => "Evening chat and news",
        }
    }
}

/// The recipient's current hour: their IANA timezone when the memory
/// record knows it, the server's local clock otherwise.
pub fn local_hour(timezone: Option<&str>) -> u32 {
    if let Some(tz) = timezone.and_then(|name| name.parse::<Tz>().ok()) {
        return Utc::now().with_timezone(&tz).hour();
    }
    Local::now().hour()
}

/// Assemble the digest email for the given hour of day.
pub fn compose(content: &DigestContent, name: Option<&str>, hour: u32) -> OutboundEmail {
    let time = TimeOfDay::from_hour(hour);
    let greeting = match name {
        Some(name) => format!("{}, {}!", time.greeting(), name),
        None => format!("{}!", time.greeting()),
    };

    debug!(
        "Composing digest: reply={}, fact={}, story={}, headlines={}, question={}",
        content.reply.is_some(),
        content.fact.is_some(),
        content.story.is_some(),
        content.headlines.len(),
        content.question.is_some()
    );

    OutboundEmail {
        subject: time.subject().to_string(),
        text_body: render_text(content, &greeting),
        html_body: render_html(content, &greeting),
    }
}

fn render_text(content: &DigestContent, greeting: &str) -> String {
    let mut body = String::new();
    body.push_str(greeting);
    body.push_str("\n\n");

    if let Some(reply) = &content.reply {
        body.push_str(reply);
        body.push_str("\n\n");
    }

    if !content.headlines.is_empty() {
        body.push_str("Today's headlines:\n");
        for headline in &content.headlines {
            body.push_str(&format!("- {} ({})\n", headline.title, headline.source));
            if !headline.url.is_empty() {
                body.push_str(&format!("  {}\n", headline.url));
            }
        }
        body.push('\n');
    }

    if let Some(fact) = &content.fact {
        body.push_str("Did you know? ");
        body.push_str(fact);
        body.push_str("\n\n");
    }

    if let Some(story) = &content.story {
        body.push_str(story);
        body.push_str("\n\n");
    }

    if let Some(question) = &content.question {
        body.push_str(question);
        body.push_str("\n\n");
    }

    body.push_str("Talk soon,\nMessej\n");
    body
}

fn render_html(content: &DigestContent, greeting: &str) -> String {
    let mut body = String::from("<html><body>\n");
    body.push_str(&format!("<p>{}</p>\n", escape(greeting)));

    if let Some(reply) = &content.reply {
        body.push_str(&format!("<p>{}</p>\n", escape(reply)));
    }

    if !content.headlines.is_empty() {
        body.push_str("<h3>Today's headlines</h3>\n<ul>\n");
        for headline in &content.headlines {
            if headline.url.is_empty() {
                body.push_str(&format!(
                    "<li>{} <em>({})</em></li>\n",
                    escape(&headline.title),
                    escape(&headline.source)
                ));
            } else {
                body.push_str(&format!(
                    "<li><a href=\"{}\">{}</a> <em>({})</em></li>\n",
                    escape(&headline.url),
                    escape(&headline.title),
                    escape(&headline.source)
                ));
            }
        }
        body.push_str("</ul>\n");
    }

    if let Some(fact) = &content.fact {
        body.push_str(&format!(
            "<p><strong>Did you know?</strong> {}</p>\n",
            escape(fact)
        ));
    }

    if let Some(story) = &content.story {
        body.push_str(&format!("<p>{}</p>\n", escape(story)));
    }

    if let Some(question) = &content.question {
        body.push_str(&format!("<p>{}</p>\n", escape(question)));
    }

    body.push_str("<p>Talk soon,<br>Messej</p>\n</body></html>\n");
    body
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
