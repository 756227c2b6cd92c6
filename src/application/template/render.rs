//! Value substitution into sanitized document markup.

use std::{
    borrow::Cow,
    collections::{BTreeMap, HashSet},
};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static MARKUP_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[ \t]*([^{}<>\n]+?)[ \t]*\}\}").expect("markup token pattern"));
static TEXT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<w:t(\s[^>]*)?>([^<]*)</w:t>").expect("text run pattern"));

const LINE_BREAK: &str = r#"</w:t><w:br/><w:t xml:space="preserve">"#;
const TAB: &str = r#"</w:t><w:tab/><w:t xml:space="preserve">"#;

/// Per-placeholder count of replaced tokens.
pub type SubstitutionStats = BTreeMap<String, usize>;

/// Replace tokens in one XML part.
///
/// Resolved names receive their escaped value; names in `known` without a
/// value are cleared; anything else is left as written.
pub fn substitute(
    xml: &str,
    values: &BTreeMap<String, String>,
    known: &HashSet<String>,
    stats: &mut SubstitutionStats,
) -> String {
    let replaced = MARKUP_TOKEN.replace_all(xml, |caps: &Captures<'_>| {
        let name = caps[1].trim();
        let replacement = match values.get(name) {
            Some(value) => escape_value(value),
            None if known.contains(name) => String::new(),
            None => return caps[0].to_string(),
        };
        *stats.entry(name.to_string()).or_default() += 1;
        replacement
    });
    preserve_edge_whitespace(&replaced).into_owned()
}

/// Escape markup-significant characters and turn line breaks and tabs into
/// their run-level elements.
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str(LINE_BREAK),
            '\t' => out.push_str(TAB),
            other => out.push(other),
        }
    }
    out
}

/// Mark text runs with leading or trailing whitespace as space-preserving.
pub fn preserve_edge_whitespace(xml: &str) -> Cow<'_, str> {
    TEXT_RUN.replace_all(xml, |caps: &Captures<'_>| {
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        let text = &caps[2];
        let padded = text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace);
        if padded && !attrs.contains("xml:space") {
            format!(r#"<w:t xml:space="preserve"{attrs}>{text}</w:t>"#)
        } else {
            caps[0].to_string()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn known(names: &[&str]) -> HashSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn resolved_values_are_escaped() {
        let mut stats = SubstitutionStats::new();
        let out = substitute(
            "<w:t>Para {{ nome }}:</w:t>",
            &values(&[("nome", "Ana & \"Bia\" <3")]),
            &known(&["nome"]),
            &mut stats,
        );
        insta::assert_snapshot!(out, @"<w:t>Para Ana &amp; &quot;Bia&quot; &lt;3:</w:t>");
        assert_eq!(stats.get("nome"), Some(&1));
    }

    #[test]
    fn known_but_unresolved_tokens_are_cleared_and_unknown_kept() {
        let mut stats = SubstitutionStats::new();
        let out = substitute(
            "<w:t>{{a}}|{{b}}|{{zz}}</w:t>",
            &values(&[("a", "1")]),
            &known(&["a", "b"]),
            &mut stats,
        );
        assert_eq!(out, "<w:t>1||{{zz}}</w:t>");
        assert_eq!(stats.len(), 2);
    }

    #[test]
    fn edge_whitespace_gets_preserved() {
        let mut stats = SubstitutionStats::new();
        let out = substitute(
            "<w:r><w:t>{{a}}</w:t></w:r><w:r><w:t>x</w:t></w:r>",
            &values(&[("a", " e Bruno")]),
            &known(&["a"]),
            &mut stats,
        );
        insta::assert_snapshot!(
            out,
            @r#"<w:r><w:t xml:space="preserve"> e Bruno</w:t></w:r><w:r><w:t>x</w:t></w:r>"#
        );
    }

    #[test]
    fn line_breaks_become_break_elements() {
        let mut stats = SubstitutionStats::new();
        let out = substitute(
            "<w:t>{{end}}</w:t>",
            &values(&[("end", "Rua A\nCentro")]),
            &known(&["end"]),
            &mut stats,
        );
        insta::assert_snapshot!(
            out,
            @r#"<w:t>Rua A</w:t><w:br/><w:t xml:space="preserve">Centro</w:t>"#
        );
    }

    #[test]
    fn existing_space_attribute_is_not_duplicated() {
        let xml = r#"<w:t xml:space="preserve"> x </w:t><w:tab/>"#;
        assert_eq!(preserve_edge_whitespace(xml), xml);
    }
}
