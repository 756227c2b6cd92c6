//! Output filename templates and collision handling.

use std::collections::HashSet;

use super::{dataset::Row, error::DomainError};

pub const DOCUMENT_EXTENSION: &str = "docx";
pub const CONVERTED_EXTENSION: &str = "pdf";
const MAX_FILENAME_CHARS: usize = 140;
const EMPTY_FILENAME: &str = "arquivo";
const FORBIDDEN_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Token { name: String, width: Option<usize> },
}

/// Parsed filename template such as `{index:03}_{primary}.docx`.
///
/// Tokens: `index` (1-based row number), `primary` (designated column value)
/// and any dataset column. A render that hits an unknown token falls back to
/// `{index}_{primary}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    segments: Vec<Segment>,
}

impl NameTemplate {
    pub fn parse(template: &str) -> Result<Self, DomainError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(ch) = chars.next() {
            match ch {
                '{' => {
                    let mut token = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        if inner == '{' {
                            return Err(DomainError::validation(format!(
                                "nested `{{` in name template `{template}`"
                            )));
                        }
                        token.push(inner);
                    }
                    if !closed {
                        return Err(DomainError::validation(format!(
                            "unterminated token in name template `{template}`"
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_token(&token, template)?);
                }
                '}' => {
                    return Err(DomainError::validation(format!(
                        "unbalanced `}}` in name template `{template}`"
                    )));
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Render the raw (unsanitized) name for `row`, where `index` is 0-based.
    fn render_raw(&self, row: &Row, index: usize, primary: &str) -> Option<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token { name, width } => {
                    let value = match name.as_str() {
                        "index" => (index + 1).to_string(),
                        "primary" => primary.to_string(),
                        column => row.get(column)?.trim().to_string(),
                    };
                    out.push_str(&pad(value, *width));
                }
            }
        }
        Some(out)
    }
}

fn parse_token(token: &str, template: &str) -> Result<Segment, DomainError> {
    let (name, spec) = match token.split_once(':') {
        Some((name, spec)) => (name.trim(), Some(spec.trim())),
        None => (token.trim(), None),
    };
    if name.is_empty() {
        return Err(DomainError::validation(format!(
            "empty token in name template `{template}`"
        )));
    }

    let width = match spec {
        None | Some("") => None,
        Some(spec) => {
            let digits = spec.trim_end_matches('d');
            Some(digits.parse::<usize>().map_err(|_| {
                DomainError::validation(format!(
                    "invalid format spec `{spec}` in name template `{template}`"
                ))
            })?)
        }
    };

    Ok(Segment::Token {
        name: name.to_string(),
        width,
    })
}

fn pad(value: String, width: Option<usize>) -> String {
    match width {
        Some(width) if !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit()) => {
            format!("{value:0>width$}")
        }
        _ => value,
    }
}

/// Inputs needed to name one row's output.
#[derive(Debug, Clone)]
pub struct NamingContext<'a> {
    pub template: &'a NameTemplate,
    pub primary_column: &'a str,
    pub fallback_primary: &'a str,
}

impl NamingContext<'_> {
    /// Sanitized `.docx` filename for the row; not yet deduplicated.
    pub fn document_name(&self, row: &Row, index: usize) -> String {
        let primary = match row.value(self.primary_column).trim() {
            "" => self.fallback_primary.to_string(),
            value => value.to_string(),
        };

        let raw = self
            .template
            .render_raw(row, index, &primary)
            .unwrap_or_else(|| format!("{}_{primary}", index + 1));

        let stem = strip_extension(&raw, DOCUMENT_EXTENSION);
        let stem = sanitize_filename(stem, MAX_FILENAME_CHARS - DOCUMENT_EXTENSION.len() - 1);
        format!("{stem}.{DOCUMENT_EXTENSION}")
    }
}

/// Replace path-hostile characters and spaces, cap the length.
pub fn sanitize_filename(name: &str, max_chars: usize) -> String {
    let trimmed = name.trim();
    let base = if trimmed.is_empty() {
        EMPTY_FILENAME
    } else {
        trimmed
    };

    base.chars()
        .map(|ch| {
            if FORBIDDEN_CHARS.contains(&ch) || ch.is_whitespace() {
                '_'
            } else {
                ch
            }
        })
        .take(max_chars)
        .collect()
}

fn strip_extension<'a>(name: &'a str, extension: &str) -> &'a str {
    let suffix_len = extension.len() + 1;
    if name.len() > suffix_len {
        let split = name.len() - suffix_len;
        if name.is_char_boundary(split) {
            let (stem, suffix) = name.split_at(split);
            if suffix.eq_ignore_ascii_case(&format!(".{extension}")) {
                return stem;
            }
        }
    }
    name
}

/// Swap the extension of a generated name, e.g. `001_ana.docx` → `001_ana.pdf`.
pub fn with_extension(name: &str, extension: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.{extension}"),
        _ => format!("{name}.{extension}"),
    }
}

/// Hands out names that are unique (case-insensitively) within one scope by
/// appending `_2`, `_3`, … before the extension.
#[derive(Debug, Default, Clone)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_lowercase()) {
            return name.to_string();
        }

        let (stem, extension) = match name.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
            _ => (name, None),
        };

        let mut counter = 2usize;
        loop {
            let candidate = match extension {
                Some(extension) => format!("{stem}_{counter}.{extension}"),
                None => format!("{stem}_{counter}"),
            };
            if self.taken.insert(candidate.to_lowercase()) {
                return candidate;
            }
            counter += 1;
        }
    }
}
