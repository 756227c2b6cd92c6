//! Row → placeholder value resolution.
//!
//! Values are sanitized, grouped entries are deduplicated case-insensitively
//! (first occurrence wins), and the survivors of a group are joined into a
//! natural-language list by rewriting their prefixes: `p1A, p2B e p3C`.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::domain::{dataset::Row, mapping::MappingEntry};

/// List formatting and value limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    pub max_value_chars: Option<usize>,
    pub list_separator: String,
    pub list_conjunction: String,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_value_chars: None,
            list_separator: ", ".to_string(),
            list_conjunction: "e".to_string(),
        }
    }
}

/// Resolution of one mapping entry for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub placeholder: String,
    pub raw: String,
    pub sanitized: String,
    pub non_empty: bool,
    /// Set when an earlier entry of the same group already carried this value.
    pub suppressed: bool,
    pub prefix: String,
    pub value: String,
}

impl ResolvedValue {
    pub fn is_present(&self) -> bool {
        self.non_empty && !self.suppressed
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedRow {
    pub entries: Vec<ResolvedValue>,
    /// Every known placeholder, absent ones mapped to `""`.
    pub values: BTreeMap<String, String>,
}

impl ResolvedRow {
    pub fn suppressed(&self) -> impl Iterator<Item = &ResolvedValue> {
        self.entries.iter().filter(|entry| entry.suppressed)
    }
}

#[derive(Debug, Clone)]
pub struct RowResolver {
    entries: Vec<MappingEntry>,
    known: Vec<String>,
    options: ResolveOptions,
}

impl RowResolver {
    /// `known` lists the template's placeholders; mapped placeholders are
    /// added to it.
    pub fn new<I>(entries: Vec<MappingEntry>, known: I, options: ResolveOptions) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut known: Vec<String> = known.into_iter().collect();
        let mut seen: HashSet<String> = known.iter().cloned().collect();
        for entry in &entries {
            let name = entry.placeholder_name();
            if seen.insert(name.clone()) {
                known.push(name);
            }
        }
        Self {
            entries,
            known,
            options,
        }
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn resolve(&self, row: &Row) -> ResolvedRow {
        let mut resolved: Vec<ResolvedValue> = self
            .entries
            .iter()
            .map(|entry| {
                let raw = row.value(&entry.column).to_string();
                let sanitized = sanitize_value(&raw, self.options.max_value_chars);
                ResolvedValue {
                    placeholder: entry.placeholder_name(),
                    non_empty: !sanitized.is_empty(),
                    raw,
                    sanitized,
                    suppressed: false,
                    prefix: entry.prefix.clone(),
                    value: String::new(),
                }
            })
            .collect();

        let mut groups: Vec<&str> = Vec::new();
        let mut seen_values: HashMap<&str, HashSet<String>> = HashMap::new();
        for (entry, value) in self.entries.iter().zip(resolved.iter_mut()) {
            let Some(group) = entry.group_tag() else {
                continue;
            };
            if !seen_values.contains_key(group) {
                groups.push(group);
            }
            let seen = seen_values.entry(group).or_default();
            if value.non_empty && !seen.insert(value.sanitized.to_lowercase()) {
                value.suppressed = true;
                debug!(
                    target = "application::resolve",
                    placeholder = %value.placeholder,
                    group,
                    "duplicate group value suppressed"
                );
            }
        }

        for group in groups {
            let members: Vec<usize> = self
                .entries
                .iter()
                .enumerate()
                .filter(|(index, entry)| {
                    entry.group_tag() == Some(group) && resolved[*index].is_present()
                })
                .map(|(index, _)| index)
                .collect();
            let count = members.len();
            for (position, index) in members.into_iter().enumerate() {
                let prefix = &self.entries[index].prefix;
                resolved[index].prefix = self.list_prefix(prefix, position, count);
            }
        }

        for value in &mut resolved {
            if value.is_present() {
                value.value = format!("{}{}", value.prefix, value.sanitized);
            }
        }

        let mut values: BTreeMap<String, String> = self
            .known
            .iter()
            .map(|name| (name.clone(), String::new()))
            .collect();
        for value in &resolved {
            // First non-empty value wins when a placeholder is mapped twice.
            let slot = values.entry(value.placeholder.clone()).or_default();
            if slot.is_empty() {
                slot.clone_from(&value.value);
            }
        }

        ResolvedRow {
            entries: resolved,
            values,
        }
    }

    fn list_prefix(&self, prefix: &str, position: usize, count: usize) -> String {
        if position == 0 {
            return prefix.to_string();
        }
        if position + 1 < count {
            return format!("{}{prefix}", self.options.list_separator);
        }

        let conjunction = self.options.list_conjunction.trim();
        if conjunction.is_empty() {
            return format!("{}{prefix}", self.options.list_separator);
        }
        if prefix.starts_with(char::is_whitespace) {
            format!(" {conjunction}{prefix}")
        } else {
            format!(" {conjunction} {prefix}")
        }
    }
}

/// NFC-normalize, drop control characters other than newline and tab,
/// unify line endings, trim and optionally truncate.
pub fn sanitize_value(raw: &str, max_chars: Option<usize>) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let cleaned: String = unified
        .nfc()
        .filter(|ch| !ch.is_control() || *ch == '\n' || *ch == '\t')
        .collect();
    let trimmed = cleaned.trim();
    match max_chars {
        Some(max) if trimmed.chars().count() > max => {
            trimmed.chars().take(max).collect::<String>().trim_end().to_string()
        }
        _ => trimmed.to_string(),
    }
}
