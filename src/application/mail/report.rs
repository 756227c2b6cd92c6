use bytes::Bytes;
use thiserror::Error;

use docbatch_api_types::RecipientReport;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report row: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush report: {0}")]
    Io(#[from] std::io::Error),
}

/// Tabular delivery report, one row per recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    rows: Vec<RecipientReport>,
}

impl DeliveryReport {
    pub fn new(rows: Vec<RecipientReport>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[RecipientReport] {
        &self.rows
    }

    /// `recipient,filenames,status,error` with filenames joined by `;`.
    pub fn to_csv(&self) -> Result<Bytes, ReportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["recipient", "filenames", "status", "error"])?;
        for row in &self.rows {
            writer.write_record([
                row.recipient.as_str(),
                row.filenames.join(";").as_str(),
                row.status.as_str(),
                row.error.as_deref().unwrap_or(""),
            ])?;
        }
        let data = writer
            .into_inner()
            .map_err(|err| ReportError::Io(err.into_error()))?;
        Ok(Bytes::from(data))
    }
}
