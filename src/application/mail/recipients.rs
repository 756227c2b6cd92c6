use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

static ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("address pattern")
});

/// Addresses found anywhere in a free-text cell, first spelling kept,
/// duplicates dropped case-insensitively.
pub fn parse_recipients(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ADDRESS
        .find_iter(text)
        .map(|found| found.as_str().to_string())
        .filter(|address| seen.insert(address.to_lowercase()))
        .collect()
}
