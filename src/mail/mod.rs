//! Mail I/O: IMAP retrieval of unread replies and SMTP digest delivery.

mod inbound;
mod outbound;

pub use inbound::{InboundMessage, Mailbox};
pub use outbound::{Outbox, OutboundEmail};
