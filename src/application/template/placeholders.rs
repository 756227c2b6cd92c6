//! Placeholder discovery over sanitized markup.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::sanitize::strip_markup;

pub(crate) static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[ \t]*([^{}\n]+?)[ \t]*\}\}").expect("token pattern"));

/// Distinct placeholder names in first-seen order.
pub fn extract_placeholders(xml: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut seen = HashSet::new();
    collect_placeholders(xml, &mut names, &mut seen);
    names
}

/// Appends names not yet in `seen`, so several parts share one ordering.
pub(crate) fn collect_placeholders(
    xml: &str,
    names: &mut Vec<String>,
    seen: &mut HashSet<String>,
) {
    // Paragraph ends become newlines so text from adjacent paragraphs never fuses.
    let text = xml.replace("</w:p>", "\n");
    let text = strip_markup(&text);
    for caps in TOKEN.captures_iter(&text) {
        let name = caps[1].trim();
        if !name.is_empty() && seen.insert(name.to_string()) {
            names.push(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::template::sanitize::sanitize_markup;

    #[test]
    fn repeated_names_are_listed_once_in_order() {
        let xml = "<w:p><w:r><w:t>{{b}} {{a}} {{b}}</w:t></w:r></w:p>\
                   <w:p><w:r><w:t>{{ a }}{{c}}</w:t></w:r></w:p>";
        assert_eq!(extract_placeholders(xml), ["b", "a", "c"]);
    }

    #[test]
    fn split_tokens_are_found_after_sanitizing() {
        let xml = "<w:p><w:r><w:t>{{no</w:t></w:r><w:r><w:t>me}} {{nome}}</w:t></w:r></w:p>";
        assert_eq!(extract_placeholders(&sanitize_markup(xml)), ["nome"]);
    }

    #[test]
    fn tokens_never_span_paragraphs() {
        let xml = "<w:p><w:r><w:t>{{a</w:t></w:r></w:p><w:p><w:r><w:t>b}}</w:t></w:r></w:p>";
        assert!(extract_placeholders(xml).is_empty());
    }
}
