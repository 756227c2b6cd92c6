use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{
        jobs::{JobError, ValidationError},
        mail::ReportError,
        template::TemplateError,
    },
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Error chain flattened for logs and CLI output.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn render(&self) -> String {
        self.messages.join(": ")
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("job {0} not found")]
    NotFound(String),
    #[error("result not ready: {0}")]
    NotReady(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit status for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Validation(_) | AppError::Domain(DomainError::Validation { .. }) => 2,
            AppError::NotFound(_) => 3,
            AppError::NotReady(_) => 4,
            AppError::Infra(_) | AppError::Unexpected(_) => 1,
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        AppError::Validation(error.to_string())
    }
}

impl From<JobError> for AppError {
    fn from(error: JobError) -> Self {
        match error {
            JobError::Validation(err) => err.into(),
            JobError::NotFound { id } => AppError::NotFound(id.to_string()),
            err @ JobError::NotReady { .. } => AppError::NotReady(err.to_string()),
            err @ (JobError::InFlight(_) | JobError::Repository(_)) => {
                AppError::Unexpected(err.to_string())
            }
        }
    }
}

impl From<TemplateError> for AppError {
    fn from(error: TemplateError) -> Self {
        AppError::Validation(format!("invalid_template: {error}"))
    }
}

impl From<ReportError> for AppError {
    fn from(error: ReportError) -> Self {
        AppError::Unexpected(error.to_string())
    }
}
