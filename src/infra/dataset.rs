//! CSV and spreadsheet datasets, and TOML mapping files.

use std::{io::Cursor, path::Path};

use calamine::{Reader, open_workbook_auto_from_rs};
use serde::Deserialize;

use crate::domain::{dataset::Dataset, mapping::MappingEntry};

use super::error::InfraError;

const BOM: char = '\u{feff}';

/// Parses a CSV export with a header row. The delimiter (`,` `;` or tab) is
/// taken from whichever occurs most often in the header line.
pub fn parse_csv(content: &[u8]) -> Result<Dataset, InfraError> {
    let text = std::str::from_utf8(content)
        .map_err(|err| InfraError::dataset(format!("dataset is not valid UTF-8: {err}")))?;
    let text = text.strip_prefix(BOM).unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(text))
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| InfraError::dataset(err.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|err| InfraError::dataset(err.to_string()))?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    if headers.iter().all(|header| header.trim().is_empty()) {
        return Ok(Dataset::new(Vec::<String>::new(), Vec::new()));
    }
    Ok(Dataset::new(headers, records))
}

/// Reads the first worksheet of an `.xlsx`, `.xls` or `.ods` workbook; its
/// first row holds the headers.
pub fn parse_spreadsheet(content: &[u8]) -> Result<Dataset, InfraError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(content))
        .map_err(|err| InfraError::dataset(format!("workbook could not be opened: {err}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| InfraError::dataset("workbook has no worksheet"))?
        .map_err(|err| InfraError::dataset(err.to_string()))?;

    let mut rows = range
        .rows()
        .map(|cells| cells.iter().map(ToString::to_string).collect::<Vec<String>>());
    let Some(headers) = rows.next() else {
        return Ok(Dataset::new(Vec::<String>::new(), Vec::new()));
    };
    Ok(Dataset::new(headers, rows))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Spreadsheet,
}

impl DatasetFormat {
    /// Delimited text for `.csv`, `.tsv` and `.txt`; anything else is read as
    /// a workbook.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv" | "tsv" | "txt") => Self::Csv,
            _ => Self::Spreadsheet,
        }
    }
}

pub async fn load_dataset(path: &Path) -> Result<Dataset, InfraError> {
    let content = tokio::fs::read(path).await?;
    match DatasetFormat::from_path(path) {
        DatasetFormat::Csv => parse_csv(&content),
        DatasetFormat::Spreadsheet => parse_spreadsheet(&content),
    }
}

fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|delimiter| header.bytes().filter(|byte| byte == delimiter).count())
        .filter(|delimiter| header.as_bytes().contains(delimiter))
        .unwrap_or(b',')
}

#[derive(Debug, Deserialize)]
struct MappingFile {
    #[serde(default)]
    mapping: Vec<MappingEntry>,
}

/// Reads `[[mapping]]` tables (`placeholder`, `column`, optional `prefix`
/// and `group`).
pub fn parse_mapping(content: &str) -> Result<Vec<MappingEntry>, InfraError> {
    let file: MappingFile =
        toml::from_str(content).map_err(|err| InfraError::mapping(err.to_string()))?;
    Ok(file.mapping)
}

pub async fn load_mapping(path: &Path) -> Result<Vec<MappingEntry>, InfraError> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_mapping(&content)
}
