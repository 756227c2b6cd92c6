//! Job records and result payloads.

use std::sync::Arc;

use bytes::Bytes;
use time::OffsetDateTime;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    application::{mail::DeliveryReport, template::SubstitutionStats},
    domain::types::{JobKind, JobStatus},
};
use docbatch_api_types::JobStatusView;

use super::pause::PauseSignal;

/// One generated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// 1-based dataset row.
    pub row: usize,
    pub document: String,
    pub converted: Option<String>,
    pub substitutions: SubstitutionStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSummary {
    pub sent: usize,
    pub failed: usize,
    pub report: DeliveryReport,
}

#[derive(Debug, Clone)]
pub struct GenerateOutput {
    pub documents: Bytes,
    pub converted: Option<Bytes>,
    pub any_converted: bool,
    pub files: Vec<GeneratedFile>,
    pub email: Option<EmailSummary>,
}

#[derive(Debug, Clone)]
pub struct SendOutput {
    pub sent: usize,
    pub failed: usize,
    pub report: DeliveryReport,
    pub report_csv: Bytes,
}

#[derive(Debug, Clone)]
pub enum JobOutput {
    Generate(GenerateOutput),
    Send(SendOutput),
}

/// In-memory state of one job. Only its runner and the registry mutate it.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub total: usize,
    pub current: usize,
    pub message: String,
    pub error: Option<String>,
    pub email_total: usize,
    pub email_sent: usize,
    pub email_failed: usize,
    pub result: Option<Arc<JobOutput>>,
    pub warnings: Vec<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    /// Monotonic activity stamp used for idle eviction.
    pub last_activity: Instant,
    pub pause: PauseSignal,
}

impl JobRecord {
    pub fn new(id: Uuid, kind: JobKind, total: usize) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            kind,
            status: JobStatus::Running,
            total,
            current: 0,
            message: "queued".to_string(),
            error: None,
            email_total: 0,
            email_sent: 0,
            email_failed: 0,
            result: None,
            warnings: Vec::new(),
            created_at: now,
            updated_at: now,
            last_activity: Instant::now(),
            pause: PauseSignal::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
        self.last_activity = Instant::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    // Mutators return whether the record changed; only real changes count
    // as activity for idle eviction.

    /// Moves `current` forward, never past `total` and never backwards.
    pub fn advance(&mut self, current: usize, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        let current = self.current.max(current.min(self.total));
        let moved = current != self.current;
        self.current = current;
        self.set_message(message) || moved
    }

    pub fn set_message(&mut self, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        let message = message.into();
        if message == self.message {
            return false;
        }
        self.message = message;
        true
    }

    pub fn mark_paused(&mut self) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.status = JobStatus::Paused;
        self.message = "paused".to_string();
        true
    }

    pub fn mark_resumed(&mut self) -> bool {
        if self.status != JobStatus::Paused {
            return false;
        }
        self.status = JobStatus::Running;
        self.message = "resumed".to_string();
        true
    }

    pub fn set_email_progress(&mut self, total: usize, sent: usize, failed: usize) -> bool {
        if self.is_terminal() {
            return false;
        }
        let progress = (total, sent, failed);
        if progress == (self.email_total, self.email_sent, self.email_failed) {
            return false;
        }
        (self.email_total, self.email_sent, self.email_failed) = progress;
        true
    }

    pub fn push_warning(&mut self, note: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.warnings.push(note.into());
        true
    }

    /// Completes the job. Allowed from `running` or `paused`.
    pub fn finish(&mut self, output: JobOutput, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Done;
        self.current = self.total;
        self.message = message.into();
        self.result = Some(Arc::new(output));
        true
    }

    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Error;
        self.message = "failed".to_string();
        self.error = Some(error.into());
        self.result = None;
        true
    }

    pub fn view(&self) -> JobStatusView {
        JobStatusView {
            id: self.id,
            kind: self.kind,
            status: self.status,
            total: self.total,
            current: self.current,
            message: self.message.clone(),
            error: self.error.clone(),
            email_total: self.email_total,
            email_sent: self.email_sent,
            email_failed: self.email_failed,
            result_ready: self.status == JobStatus::Done && self.result.is_some(),
            warnings: self.warnings.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output() -> JobOutput {
        JobOutput::Send(SendOutput {
            sent: 0,
            failed: 0,
            report: DeliveryReport::default(),
            report_csv: Bytes::new(),
        })
    }

    #[test]
    fn progress_is_clamped_and_monotonic() {
        let mut record = JobRecord::new(Uuid::new_v4(), JobKind::Generate, 3);
        record.advance(2, "row 2");
        record.advance(1, "stale");
        assert_eq!(record.current, 2);
        record.advance(9, "overflow");
        assert_eq!(record.current, 3);
    }

    #[test]
    fn terminal_state_is_final() {
        let mut record = JobRecord::new(Uuid::new_v4(), JobKind::Send, 2);
        assert!(record.fail("boom"));
        assert!(!record.finish(output(), "done"));
        assert!(!record.mark_paused());
        assert!(!record.advance(2, "late"));
        assert!(!record.fail("again"));
        assert_eq!(record.status, JobStatus::Error);
        assert_eq!(record.error.as_deref(), Some("boom"));
        assert_eq!(record.current, 0);
        assert!(!record.view().result_ready);
    }

    #[test]
    fn repeated_transitions_report_no_change() {
        let mut record = JobRecord::new(Uuid::new_v4(), JobKind::Generate, 2);
        assert!(!record.mark_resumed());
        assert!(record.mark_paused());
        assert!(!record.mark_paused());
        assert!(record.set_email_progress(2, 1, 0));
        assert!(!record.set_email_progress(2, 1, 0));
        assert!(record.set_message("row 1"));
        assert!(!record.set_message("row 1"));
    }

    #[test]
    fn finish_from_paused_is_allowed() {
        let mut record = JobRecord::new(Uuid::new_v4(), JobKind::Send, 2);
        record.mark_paused();
        assert_eq!(record.status, JobStatus::Paused);
        record.finish(output(), "done");
        let view = record.view();
        assert_eq!(view.status, JobStatus::Done);
        assert_eq!(view.current, 2);
        assert!(view.result_ready);
    }
}
