//! Wire types shared between the job core and whatever transport fronts it.
//!
//! Field names follow the camelCase contract expected by existing clients.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Generate,
    Send,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Generate => "generate",
            JobKind::Send => "send",
        }
    }
}

impl TryFrom<&str> for JobKind {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "generate" => Ok(JobKind::Generate),
            "send" => Ok(JobKind::Send),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Paused,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    /// `done` and `error` are final; nothing moves a job out of them.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

/// Returned when a job is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreated {
    pub job_id: Uuid,
    pub total: usize,
}

/// Point-in-time view of a job, safe to hand to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
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
    pub result_ready: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// One row of the delivery report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientReport {
    pub recipient: String,
    pub filenames: Vec<String>,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_view_uses_camel_case_fields() {
        let view = JobStatusView {
            id: Uuid::nil(),
            kind: JobKind::Send,
            status: JobStatus::Paused,
            total: 3,
            current: 1,
            message: "paused".to_string(),
            error: None,
            email_total: 2,
            email_sent: 1,
            email_failed: 0,
            result_ready: false,
            warnings: Vec::new(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };

        let json = serde_json::to_value(&view).expect("serialize");
        assert_eq!(json["kind"], "send");
        assert_eq!(json["status"], "paused");
        assert_eq!(json["emailTotal"], 2);
        assert_eq!(json["resultReady"], false);
        assert!(json.get("warnings").is_none());
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());
    }

    #[test]
    fn job_kind_round_trips_through_str() {
        for kind in [JobKind::Generate, JobKind::Send] {
            assert_eq!(JobKind::try_from(kind.as_str()), Ok(kind));
        }
        assert!(JobKind::try_from("unknown").is_err());
    }
}
