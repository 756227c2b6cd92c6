use std::{sync::Arc, time::Instant};

use metrics::counter;
use tracing::{info, warn};

use crate::domain::types::DeliveryStatus;
use docbatch_api_types::RecipientReport;

use super::{Mailer, OutgoingMail, queue::EmailQueue};

const METRIC_EMAILS_SENT: &str = "docbatch_emails_sent_total";
const METRIC_EMAILS_FAILED: &str = "docbatch_emails_failed_total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchProgress {
    pub processed: usize,
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub sent: usize,
    pub failed: usize,
    pub results: Vec<RecipientReport>,
}

/// Sends a queue one recipient at a time. A failure is recorded for that
/// recipient only; the rest of the queue still goes out.
#[derive(Clone)]
pub struct EmailDispatcher {
    mailer: Arc<dyn Mailer>,
    message: MessageTemplate,
}

impl EmailDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, message: MessageTemplate) -> Self {
        Self { mailer, message }
    }

    pub fn transport(&self) -> &str {
        self.mailer.transport()
    }

    pub async fn dispatch<F>(&self, queue: EmailQueue, mut progress: F) -> DispatchOutcome
    where
        F: FnMut(DispatchProgress) + Send,
    {
        let started_at = Instant::now();
        let total = queue.len();
        let mut outcome = DispatchOutcome::default();
        progress(DispatchProgress {
            total,
            ..DispatchProgress::default()
        });

        for (processed, entry) in queue.into_entries().into_iter().enumerate() {
            let filenames = entry.filenames();
            let mail = OutgoingMail {
                recipient: entry.recipient,
                subject: self.message.subject.clone(),
                body: self.message.body.clone(),
                attachments: entry.attachments,
            };

            let report = match self.mailer.send(&mail).await {
                Ok(()) => {
                    outcome.sent += 1;
                    counter!(METRIC_EMAILS_SENT).increment(1);
                    RecipientReport {
                        recipient: mail.recipient,
                        filenames,
                        status: DeliveryStatus::Sent,
                        error: None,
                    }
                }
                Err(err) => {
                    outcome.failed += 1;
                    counter!(METRIC_EMAILS_FAILED).increment(1);
                    warn!(
                        target = "application::mail::dispatch",
                        transport = self.mailer.transport(),
                        recipient = %mail.recipient,
                        attachments = filenames.len(),
                        error = %err,
                        "email delivery failed"
                    );
                    RecipientReport {
                        recipient: mail.recipient,
                        filenames,
                        status: DeliveryStatus::Failed,
                        error: Some(err.to_string()),
                    }
                }
            };
            outcome.results.push(report);

            progress(DispatchProgress {
                processed: processed + 1,
                total,
                sent: outcome.sent,
                failed: outcome.failed,
            });
        }

        info!(
            target = "application::mail::dispatch",
            transport = self.mailer.transport(),
            total,
            sent = outcome.sent,
            failed = outcome.failed,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "email dispatch finished"
        );
        outcome
    }
}
