//! Mailbox collaborators. Pure I/O, no triage logic.
//!
//! A [`MailSource`] hands over one finite batch of messages per fetch and
//! sends the replies the orchestrator composes. Fetching never mutates the
//! mailbox.

pub mod graph;
pub mod imap;
pub mod text;

use async_trait::async_trait;

use crate::error::MailError;
use crate::pipeline::types::RawMessage;

pub use graph::{GraphConfig, GraphMailbox};
pub use imap::{EmailConfig, ImapMailbox};

/// Trait for mail sources.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Source name for logging (e.g. "graph", "imap").
    fn name(&self) -> &str;

    /// Fetch the current batch of messages, in mailbox order.
    async fn fetch_messages(&self) -> Result<Vec<RawMessage>, MailError>;

    /// Send a plain-text reply.
    async fn send_reply(&self, recipient: &str, subject: &str, body: &str)
    -> Result<(), MailError>;
}
