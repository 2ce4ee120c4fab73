//! Outbound digest delivery over SMTP.

use crate::{MessejError, Result};
use lettre::message::{Mailbox as Address, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

/// A composed digest ready for delivery.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Authenticated SMTP submission for one account.
#[derive(Debug, Clone)]
pub struct Outbox {
    host: String,
    address: String,
    password: String,
}

impl Outbox {
    pub fn new(host: String, address: String, password: String) -> Self {
        Self {
            host,
            address,
            password,
        }
    }

    /// Deliver one multipart (plain + HTML) email to `recipient`.
    pub async fn send(&self, recipient: &str, email: &OutboundEmail) -> Result<()> {
        let message = build_message(&self.address, recipient, email)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
            .map_err(|e| MessejError::Mail(format!("smtp relay {}: {}", self.host, e)))?
            .credentials(Credentials::new(
                self.address.clone(),
                self.password.clone(),
            ))
            .build();

        transport
            .send(message)
            .await
            .map_err(|e| MessejError::Mail(format!("smtp send: {}", e)))?;

        info!("Digest sent to {}", recipient);
        Ok(())
    }
}

fn build_message(from: &str, recipient: &str, email: &OutboundEmail) -> Result<Message> {
    let from: Address = format!("Messej <{}>", from)
        .parse()
        .map_err(|e| MessejError::Mail(format!("from address: {}", e)))?;
    let to: Address = recipient
        .parse()
        .map_err(|e| MessejError::Mail(format!("recipient address: {}", e)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(&email.subject)
        .multipart(MultiPart::alternative_plain_html(
            email.text_body.clone(),
            email.html_body.clone(),
        ))
        .map_err(|e| MessejError::Mail(format!("build message: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_email() -> OutboundEmail {
        OutboundEmail {
            subject: "Morning chat and updates".into(),
            text_body: "Good morning!".into(),
            html_body: "<html><body><p>Good morning!</p></body></html>".into(),
        }
    }

    #[test]
    fn builds_multipart_message() {
        let message = build_message("bot@example.com", "sam@example.com", &sample_email()).unwrap();
        let rendered = String::from_utf8(message.formatted()).unwrap();
        assert!(rendered.contains("Subject: Morning chat and updates"));
        assert!(rendered.contains("multipart/alternative"));
        assert!(rendered.contains("Good morning!"));
    }

    #[test]
    fn bad_recipient_is_error() {
        assert!(build_message("bot@example.com", "not an address", &sample_email()).is_err());
    }
}
