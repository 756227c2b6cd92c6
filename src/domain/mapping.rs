//! Placeholder → column mapping supplied once per job.

use serde::{Deserialize, Serialize};

/// Links one template placeholder to a dataset column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub placeholder: String,
    pub column: String,
    /// Literal text emitted before the value, only when the value is present.
    #[serde(default)]
    pub prefix: String,
    /// Entries sharing a group are deduplicated and joined as a list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl MappingEntry {
    pub fn new(placeholder: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            column: column.into(),
            prefix: String::new(),
            group: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Placeholder name with any `{{ }}` delimiters and padding removed.
    pub fn placeholder_name(&self) -> String {
        normalize_placeholder(&self.placeholder)
    }

    /// Trimmed group tag, `None` when blank.
    pub fn group_tag(&self) -> Option<&str> {
        self.group
            .as_deref()
            .map(str::trim)
            .filter(|group| !group.is_empty())
    }
}

/// Accepts `name`, `{{name}}` or `{{ name }}` and yields `name`.
pub fn normalize_placeholder(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .unwrap_or(trimmed);
    inner.trim().to_string()
}

/// Drops entries without a placeholder or column, matching how blank editor
/// rows are ignored.
pub fn retain_complete(entries: Vec<MappingEntry>) -> Vec<MappingEntry> {
    entries
        .into_iter()
        .filter(|entry| !entry.placeholder_name().is_empty() && !entry.column.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_accepts_delimited_and_bare_forms() {
        assert_eq!(normalize_placeholder("nome"), "nome");
        assert_eq!(normalize_placeholder("{{nome}}"), "nome");
        assert_eq!(normalize_placeholder("  {{ nome }} "), "nome");
    }

    #[test]
    fn blank_group_is_no_group() {
        let entry = MappingEntry::new("a", "A").with_group("   ");
        assert_eq!(entry.group_tag(), None);
        let entry = MappingEntry::new("a", "A").with_group(" autores ");
        assert_eq!(entry.group_tag(), Some("autores"));
    }

    #[test]
    fn incomplete_entries_are_dropped() {
        let kept = retain_complete(vec![
            MappingEntry::new("", "A"),
            MappingEntry::new("b", " "),
            MappingEntry::new("c", "C"),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].placeholder, "c");
    }
}
