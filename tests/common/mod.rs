//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use cite_footnotes::{scan, CitationKey, SeededEntropy, Session, Settings};
use regex::Regex;

/// Seed used wherever a test needs reproducible identifiers.
pub const SEED: u64 = 0x5eed;

/// Session with default settings and deterministic identifiers.
pub fn seeded_session() -> Session<SeededEntropy> {
    session_with(Settings::default())
}

pub fn session_with(settings: Settings) -> Session<SeededEntropy> {
    Session::with_entropy(settings, SeededEntropy::new(SEED))
}

/// Footnote tokens of `text` in order of first appearance.
pub fn footnote_tokens(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    scan(text)
        .into_iter()
        .filter_map(|o| match o.key {
            CitationKey::Footnote(token) => Some(token),
            CitationKey::Numeric(_) => None,
        })
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

/// Replaces footnote identifiers that do not occur in `input` with `<1>`,
/// `<2>`, ... in order of first appearance in `output`.
///
/// Tokens already present in `input` are left as they are, so fixtures can
/// assert that existing footnotes survive untouched.
pub fn normalize_ids(input: &str, output: &str) -> String {
    let marker = Regex::new(r"\[\^([a-z0-9]+)\]").unwrap();
    let existing: HashSet<String> = marker
        .captures_iter(input)
        .map(|caps| caps[1].to_string())
        .collect();

    let mut names: HashMap<String, String> = HashMap::new();
    marker
        .replace_all(output, |caps: &regex::Captures| {
            let token = &caps[1];
            if existing.contains(token) {
                return caps[0].to_string();
            }
            let next = names.len() + 1;
            let name = names
                .entry(token.to_string())
                .or_insert_with(|| format!("<{}>", next));
            format!("[^{}]", name)
        })
        .into_owned()
}
