//! Tabular input: one [`Row`] per output document.
//!
//! Header names drift between spreadsheet exports (case, stray spaces), so
//! column lookups go through a case-insensitive index built once per load.

use std::{collections::HashMap, sync::Arc};

/// Ordered column names plus a folded lookup index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .collect();
        let mut index = HashMap::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            // First header wins when an export repeats a column name.
            index.entry(fold_key(name)).or_insert(position);
        }
        Self { names, index }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(&fold_key(column)).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }
}

/// One dataset record; values are aligned with the shared [`Columns`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    columns: Arc<Columns>,
    values: Vec<String>,
}

impl Row {
    /// Case-insensitive, trim-tolerant cell lookup.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .position(column)
            .and_then(|position| self.values.get(position))
            .map(String::as_str)
    }

    /// Like [`Row::get`] but yields an empty string for unknown columns.
    pub fn value(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|value| value.trim().is_empty())
    }
}

/// Rows in input order sharing one column index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    columns: Arc<Columns>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Build from a header row and raw records. Records are padded or cut to
    /// the header width and fully blank records are dropped.
    pub fn new<H, R>(headers: H, records: R) -> Self
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        R: IntoIterator<Item = Vec<String>>,
    {
        let columns = Arc::new(Columns::new(headers));
        let width = columns.len();
        let rows = records
            .into_iter()
            .map(|mut values| {
                values.resize(width, String::new());
                Row {
                    columns: Arc::clone(&columns),
                    values,
                }
            })
            .filter(|row| !row.is_blank())
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn fold_key(name: &str) -> String {
    name.trim().to_lowercase()
}
