//! Job submission and up-front validation.

use bytes::Bytes;

use crate::{
    application::template::TemplatePackage,
    domain::{
        dataset::Dataset,
        mapping::{MappingEntry, retain_complete},
        naming::NameTemplate,
        types::JobKind,
    },
};

use super::error::{ValidationCode, ValidationError};

/// Per-job switches; unset fields fall back to configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOptions {
    /// Produce fixed-layout copies. Always on for `send` jobs.
    pub convert: bool,
    /// Email converted copies to the addresses in `email_column`.
    pub send_email: bool,
    pub email_column: Option<String>,
    /// Column feeding `{primary}`; defaults to the first mapped column.
    pub primary_column: Option<String>,
    pub name_template: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JobRequest {
    pub kind: JobKind,
    pub template: Bytes,
    pub dataset: Dataset,
    pub mapping: Vec<MappingEntry>,
    pub options: JobOptions,
}

/// A request that passed validation, with its template parsed.
#[derive(Debug, Clone)]
pub(crate) struct ValidatedJob {
    pub kind: JobKind,
    pub template: TemplatePackage,
    pub dataset: Dataset,
    pub mapping: Vec<MappingEntry>,
    pub name_template: NameTemplate,
    pub primary_column: String,
    pub convert: bool,
    pub email_column: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

pub(crate) fn validate(
    request: JobRequest,
    default_name_template: &NameTemplate,
    conversion_available: bool,
) -> Result<ValidatedJob, ValidationError> {
    let JobRequest {
        kind,
        template,
        dataset,
        mapping,
        options,
    } = request;

    if template.is_empty() {
        return Err(ValidationError::new(
            ValidationCode::MissingTemplate,
            "no template was supplied",
        ));
    }
    let template = TemplatePackage::load(&template)
        .map_err(|err| ValidationError::new(ValidationCode::InvalidTemplate, err.to_string()))?;

    if dataset.columns().is_empty() {
        return Err(ValidationError::new(
            ValidationCode::MissingDataset,
            "dataset has no header row",
        ));
    }
    if dataset.is_empty() {
        return Err(ValidationError::new(
            ValidationCode::EmptyDataset,
            "dataset has no data rows",
        ));
    }

    let mapping = retain_complete(mapping);
    let Some(first) = mapping.first() else {
        return Err(ValidationError::new(
            ValidationCode::MissingMapping,
            "mapping has no complete placeholder/column entry",
        ));
    };
    let default_primary = first.column.trim().to_string();
    for entry in &mapping {
        require_column(&dataset, &entry.column)?;
    }

    let primary_column = match options.primary_column.as_deref().map(str::trim) {
        Some(column) if !column.is_empty() => {
            require_column(&dataset, column)?;
            column.to_string()
        }
        _ => default_primary,
    };

    let sends_email = kind == JobKind::Send || options.send_email;
    let email_column = if sends_email {
        let column = options
            .email_column
            .as_deref()
            .map(str::trim)
            .filter(|column| !column.is_empty())
            .ok_or_else(|| {
                ValidationError::new(
                    ValidationCode::MissingEmailColumn,
                    "sending email requires an email column",
                )
            })?;
        require_column(&dataset, column)?;
        Some(column.to_string())
    } else {
        None
    };

    let convert = kind == JobKind::Send || options.convert || sends_email;
    if convert && !conversion_available {
        return Err(ValidationError::new(
            ValidationCode::ConversionUnavailable,
            "no conversion backend is configured",
        ));
    }

    let name_template = match options.name_template.as_deref() {
        Some(raw) if !raw.trim().is_empty() => NameTemplate::parse(raw.trim()).map_err(|err| {
            ValidationError::new(ValidationCode::InvalidNameTemplate, err.to_string())
        })?,
        _ => default_name_template.clone(),
    };

    Ok(ValidatedJob {
        kind,
        template,
        dataset,
        mapping,
        name_template,
        primary_column,
        convert,
        email_column,
        subject: options.subject,
        body: options.body,
    })
}

fn require_column(dataset: &Dataset, column: &str) -> Result<(), ValidationError> {
    if dataset.columns().contains(column) {
        Ok(())
    } else {
        Err(ValidationError::new(
            ValidationCode::UnknownColumn,
            format!("column `{}` is not in the dataset", column.trim()),
        ))
    }
}
