//! Email delivery of converted documents.

mod dispatch;
mod queue;
mod recipients;
mod report;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use dispatch::{DispatchOutcome, DispatchProgress, EmailDispatcher, MessageTemplate};
pub use queue::{EmailQueue, QueuedRecipient};
pub use recipients::parse_recipients;
pub use report::{DeliveryReport, ReportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport not configured: {0}")]
    NotConfigured(String),
    #[error("mail transport unsupported on this platform: {0}")]
    Unsupported(String),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("send rejected: {0}")]
    Rejected(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sends one message to one recipient.
#[async_trait]
pub trait Mailer: Send + Sync {
    fn transport(&self) -> &str;

    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Stand-in used when no transport was configured; every send fails.
#[derive(Debug, Clone)]
pub struct UnconfiguredMailer {
    reason: String,
}

impl UnconfiguredMailer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Mailer for UnconfiguredMailer {
    fn transport(&self) -> &str {
        "unconfigured"
    }

    async fn send(&self, _mail: &OutgoingMail) -> Result<(), MailError> {
        Err(MailError::NotConfigured(self.reason.clone()))
    }
}
