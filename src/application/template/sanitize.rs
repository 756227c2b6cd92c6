//! Reassembles `{{name}}` tokens that a word processor split across runs.
//!
//! Editors routinely wrap part of a placeholder in its own formatting run
//! (`{{</w:t></w:r><w:r><w:t>nome}}`), so substitution against the raw XML
//! would miss it. Repair happens in two passes:
//!
//! 1. delimiter characters separated only by whitespace or markup are
//!    collapsed, and runs of three or more delimiters shrink to two;
//! 2. each `{{ … }}` span is stripped of embedded markup, trimmed and
//!    re-emitted as a single clean token.
//!
//! Markup between two characters of the same paragraph is always a balanced
//! sequence (close run, complete elements, open run), so dropping it keeps
//! the document well-formed. Spans that cross a paragraph are left alone.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const PARAGRAPH_END: &str = "</w:p>";
const MAX_COLLAPSE_PASSES: usize = 16;

static SPLIT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(?:\s|<[^>]*>)+\{").expect("split-open pattern"));
static SPLIT_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\}(?:\s|<[^>]*>)+\}").expect("split-close pattern"));
static OPEN_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{{3,}").expect("open-run pattern"));
static CLOSE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}{3,}").expect("close-run pattern"));
static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("markup pattern"));

/// Repair placeholder tokens in one XML part. Idempotent.
pub fn sanitize_markup(xml: &str) -> String {
    let collapsed = collapse_delimiters(xml);
    rebuild_tokens(&collapsed)
}

/// Remove every tag, leaving character data only.
pub fn strip_markup(xml: &str) -> Cow<'_, str> {
    MARKUP.replace_all(xml, "")
}

fn collapse_delimiters(xml: &str) -> String {
    let mut current = xml.to_string();
    for _ in 0..MAX_COLLAPSE_PASSES {
        let open = collapse_gap(&SPLIT_OPEN, &current, "{{");
        let next = collapse_gap(&SPLIT_CLOSE, &open, "}}").into_owned();
        if next == current {
            break;
        }
        current = next;
    }

    let current = OPEN_RUN.replace_all(&current, "{{");
    CLOSE_RUN.replace_all(&current, "}}").into_owned()
}

fn collapse_gap<'a>(pattern: &Regex, xml: &'a str, joined: &'static str) -> Cow<'a, str> {
    pattern.replace_all(xml, |caps: &Captures<'_>| {
        let gap = &caps[0];
        if gap.contains(PARAGRAPH_END) {
            gap.to_string()
        } else {
            joined.to_string()
        }
    })
}

fn rebuild_tokens(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;

    while let Some(open) = rest.find("{{") {
        let body = &rest[open + 2..];
        let Some(close) = body.find("}}") else {
            break;
        };
        let span = &body[..close];

        // A later `{{` inside the span means this opening was stray text.
        if span.contains("{{") || span.contains(PARAGRAPH_END) {
            out.push_str(&rest[..open + 2]);
            rest = body;
            continue;
        }

        let text = strip_markup(span);
        let name = text.trim();
        out.push_str(&rest[..open]);
        if name.is_empty() || name.contains(['{', '}']) {
            out.push_str(&rest[open..open + 2 + close + 2]);
        } else {
            out.push_str("{{");
            out.push_str(name);
            out.push_str("}}");
        }
        rest = &body[close + 2..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN_BREAK: &str = "</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>";

    fn paragraph(inner: &str) -> String {
        format!("<w:p><w:r><w:t>{inner}</w:t></w:r></w:p>")
    }

    #[test]
    fn clean_tokens_are_untouched() {
        let xml = paragraph("Dear {{nome}}, welcome");
        assert_eq!(sanitize_markup(&xml), xml);
    }

    #[test]
    fn token_split_inside_name_is_reassembled() {
        let xml = paragraph(&format!("Dear {{{{no{RUN_BREAK}me}}}}!"));
        assert_eq!(sanitize_markup(&xml), paragraph("Dear {{nome}}!"));
    }

    #[test]
    fn split_delimiters_collapse() {
        let xml = paragraph(&format!("{{{RUN_BREAK}{{ nome }}{RUN_BREAK}}}"));
        assert_eq!(sanitize_markup(&xml), paragraph("{{nome}}"));
    }

    #[test]
    fn delimiter_runs_normalize_to_two_and_padding_is_trimmed() {
        let xml = paragraph("{{{  titulo }}}} and {{ autor}}");
        assert_eq!(
            sanitize_markup(&xml),
            paragraph("{{titulo}} and {{autor}}")
        );
    }

    #[test]
    fn split_and_unsplit_forms_agree_and_resanitizing_is_stable() {
        let split = paragraph(&format!("{{{{ cidade{RUN_BREAK} }}}}"));
        let once = sanitize_markup(&split);
        assert_eq!(once, paragraph("{{cidade}}"));
        assert_eq!(sanitize_markup(&once), once);
    }

    #[test]
    fn spans_crossing_paragraphs_are_left_alone() {
        let xml = format!("{}{}", paragraph("a {{broken"), paragraph("rest}} b"));
        assert_eq!(sanitize_markup(&xml), xml);
    }

    #[test]
    fn stray_opening_defers_to_the_nearest_pair() {
        let xml = paragraph("{{ oops {{nome}}");
        assert_eq!(sanitize_markup(&xml), paragraph("{{ oops {{nome}}"));
    }

    #[test]
    fn empty_token_is_preserved_verbatim() {
        let xml = paragraph("{{   }}");
        assert_eq!(sanitize_markup(&xml), xml);
    }
}
