//! Inbound mail retrieval over IMAP.
//!
//! Searches INBOX for unread messages whose subject contains the marker
//! token and decodes each body, preferring the `text/plain` part and
//! falling back to stripped HTML. Fetches use `BODY.PEEK[]` so the unread
//! flag stays untouched until the run has succeeded and [`Mailbox::mark_seen`]
//! stores `\Seen` explicitly.
//!
//! Reply detection rests entirely on the unread flag plus the marker; an
//! external mail client toggling that flag causes skips or repeats.
//!
//! The IMAP client is synchronous, so every session runs inside
//! `spawn_blocking`.

use crate::{MessejError, Result};
use mailparse::{MailHeaderMap, ParsedMail};
use tracing::{debug, info, warn};

const IMAP_PORT: u16 = 993;

/// One decoded inbound message. Lives for the duration of a single run.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub uid: u32,
    pub sender: String,
    pub subject: String,
    pub body: String,
}

/// IMAP mailbox access for one account.
#[derive(Debug, Clone)]
pub struct Mailbox {
    host: String,
    address: String,
    password: String,
}

impl Mailbox {
    pub fn new(host: String, address: String, password: String) -> Self {
        Self {
            host,
            address,
            password,
        }
    }

    /// Fetch unread messages whose subject contains `marker`.
    ///
    /// Connection and authentication failures are fatal for the run;
    /// messages that fail to parse are logged and skipped.
    pub async fn fetch_unread(&self, marker: &str) -> Result<Vec<InboundMessage>> {
        let mailbox = self.clone();
        let marker = marker.to_string();
        tokio::task::spawn_blocking(move || mailbox.fetch_unread_blocking(&marker))
            .await
            .map_err(|e| MessejError::Mail(format!("fetch task failed: {}", e)))?
    }

    /// Mark previously fetched UIDs as read in a second short session.
    pub async fn mark_seen(&self, uids: Vec<u32>) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }
        let mailbox = self.clone();
        tokio::task::spawn_blocking(move || mailbox.mark_seen_blocking(&uids))
            .await
            .map_err(|e| MessejError::Mail(format!("mark-seen task failed: {}", e)))?
    }

    fn open_session(&self) -> Result<imap::Session<native_tls::TlsStream<std::net::TcpStream>>> {
        let tls = native_tls::TlsConnector::builder()
            .build()
            .map_err(|e| MessejError::Mail(format!("tls setup: {}", e)))?;

        let client = imap::connect((self.host.as_str(), IMAP_PORT), self.host.as_str(), &tls)
            .map_err(|e| MessejError::Mail(format!("connect {}: {}", self.host, e)))?;

        let mut session = client
            .login(&self.address, &self.password)
            .map_err(|(e, _)| MessejError::Mail(format!("login: {}", e)))?;

        session
            .select("INBOX")
            .map_err(|e| MessejError::Mail(format!("select INBOX: {}", e)))?;

        Ok(session)
    }

    fn fetch_unread_blocking(&self, marker: &str) -> Result<Vec<InboundMessage>> {
        info!("Connecting to IMAP server at {}", self.host);
        let mut session = self.open_session()?;

        let query = format!("UNSEEN SUBJECT \"{}\"", marker);
        let uids = session
            .uid_search(&query)
            .map_err(|e| MessejError::Mail(format!("search: {}", e)))?;
        info!("Found {} unread matching messages", uids.len());

        let mut messages = Vec::new();
        for uid in uids {
            let fetches = match session.uid_fetch(uid.to_string(), "(BODY.PEEK[])") {
                Ok(fetches) => fetches,
                Err(e) => {
                    warn!("Fetch of uid {} failed, skipping: {}", uid, e);
                    continue;
                }
            };
            for fetch in fetches.iter() {
                let Some(raw) = fetch.body() else {
                    warn!("uid {} returned no body, skipping", uid);
                    continue;
                };
                match parse_message(uid, raw) {
                    Ok(message) => {
                        debug!("Decoded message from {}: {}", message.sender, message.subject);
                        messages.push(message);
                    }
                    Err(e) => warn!("uid {} failed to decode, skipping: {}", uid, e),
                }
            }
        }

        session.logout().ok();
        Ok(messages)
    }

    fn mark_seen_blocking(&self, uids: &[u32]) -> Result<()> {
        let mut session = self.open_session()?;

        let uid_set = uids
            .iter()
            .map(|uid| uid.to_string())
            .collect::<Vec<_>>()
            .join(",");
        session
            .uid_store(&uid_set, "+FLAGS (\\Seen)")
            .map_err(|e| MessejError::Mail(format!("store \\Seen: {}", e)))?;
        info!("Marked {} messages as read", uids.len());

        session.logout().ok();
        Ok(())
    }
}

/// Parse raw RFC 822 bytes into an [`InboundMessage`].
fn parse_message(uid: u32, raw: &[u8]) -> Result<InboundMessage> {
    let parsed =
        mailparse::parse_mail(raw).map_err(|e| MessejError::Mail(format!("parse: {}", e)))?;

    let sender = parsed
        .headers
        .get_first_value("From")
        .unwrap_or_default();
    let subject = parsed
        .headers
        .get_first_value("Subject")
        .unwrap_or_default();

    let body = extract_body(&parsed)
        .ok_or_else(|| MessejError::Mail("no decodable text part".to_string()))?;

    Ok(InboundMessage {
        uid,
        sender,
        subject,
        body: normalize_whitespace(&body),
    })
}

/// Decode the human-readable body: `text/plain` preferred, stripped HTML
/// as the fallback.
fn extract_body(mail: &ParsedMail) -> Option<String> {
    if let Some(text) = find_part(mail, "text/plain") {
        if !text.trim().is_empty() {
            return Some(text);
        }
    }
    if let Some(html) = find_part(mail, "text/html") {
        if let Ok(text) = html2text::from_read(html.as_bytes(), 120) {
            if !text.trim().is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Depth-first search for the first part of the given mime type.
fn find_part(mail: &ParsedMail, mimetype: &str) -> Option<String> {
    if mail.ctype.mimetype.eq_ignore_ascii_case(mimetype) {
        return mail.get_body().ok();
    }
    mail.subparts
        .iter()
        .find_map(|part| find_part(part, mimetype))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_text_message() {
        let raw = b"From: Sam <sam@example.com>\r\n\
                    Subject: Re: ChatBot daily update\r\n\
                    Content-Type: text/plain; charset=utf-8\r\n\
                    \r\n\
                    I love hiking\r\nand long walks.\r\n";
        let message = parse_message(7, raw).unwrap();
        assert_eq!(message.uid, 7);
        assert!(message.sender.contains("sam@example.com"));
        assert_eq!(message.subject, "Re: ChatBot daily update");
        assert_eq!(message.body, "I love hiking and long walks.");
    }

    #[test]
    fn html_only_body_decodes_to_text() {
        let raw = b"From: sam@example.com\r\n\
                    Subject: Re: ChatBot daily update\r\n\
                    MIME-Version: 1.0\r\n\
                    Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
                    \r\n\
                    --b1\r\n\
                    Content-Type: text/html; charset=utf-8\r\n\
                    \r\n\
                    <html><body><p>I love <b>hiking</b></p></body></html>\r\n\
                    --b1--\r\n";
        let message = parse_message(1, raw).unwrap();
        assert!(!message.body.is_empty());
        assert!(message.body.contains("hiking"));
        assert!(!message.body.contains("<b>"));
    }

    #[test]
    fn plain_part_preferred_over_html() {
        let raw = b"From: sam@example.com\r\n\
                    Subject: Re: ChatBot daily update\r\n\
                    MIME-Version: 1.0\r\n\
                    Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
                    \r\n\
                    --b1\r\n\
                    Content-Type: text/plain; charset=utf-8\r\n\
                    \r\n\
                    plain wins\r\n\
                    --b1\r\n\
                    Content-Type: text/html; charset=utf-8\r\n\
                    \r\n\
                    <p>html loses</p>\r\n\
                    --b1--\r\n";
        let message = parse_message(1, raw).unwrap();
        assert_eq!(message.body, "plain wins");
    }

    #[test]
    fn empty_message_is_skippable_error() {
        let raw = b"From: sam@example.com\r\n\
                    Subject: Re: ChatBot daily update\r\n\
                    Content-Type: text/plain\r\n\
                    \r\n\
                    \r\n";
        assert!(parse_message(1, raw).is_err());
    }
}
