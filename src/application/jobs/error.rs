use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::types::JobStatus;

use super::{inflight::InFlightError, repository::JobRepoError};

/// Stable machine-readable reasons a job request is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    MissingTemplate,
    InvalidTemplate,
    MissingDataset,
    EmptyDataset,
    MissingMapping,
    UnknownColumn,
    MissingEmailColumn,
    ConversionUnavailable,
    InvalidNameTemplate,
}

impl ValidationCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationCode::MissingTemplate => "missing_template",
            ValidationCode::InvalidTemplate => "invalid_template",
            ValidationCode::MissingDataset => "missing_dataset",
            ValidationCode::EmptyDataset => "empty_dataset",
            ValidationCode::MissingMapping => "missing_mapping",
            ValidationCode::UnknownColumn => "unknown_column",
            ValidationCode::MissingEmailColumn => "missing_email_column",
            ValidationCode::ConversionUnavailable => "conversion_unavailable",
            ValidationCode::InvalidNameTemplate => "invalid_name_template",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: ValidationCode,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("job {id} not found")]
    NotFound { id: Uuid },
    #[error("job {id} has no result while {}", .status.as_str())]
    NotReady { id: Uuid, status: JobStatus },
    #[error(transparent)]
    InFlight(#[from] InFlightError),
    #[error(transparent)]
    Repository(#[from] JobRepoError),
}
