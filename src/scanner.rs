//! Citation marker scanner.
//!
//! Finds numeric markers (`[1]`), footnote markers (`[^a1b2]`) and the
//! reference-definition lines that pair with them (`[1] Some Source`,
//! `[^a1b2]: Some Source`).
//!
//! Definition lines and in-text markers are mutually exclusive: once a line is
//! recognized as a definition, it is never scanned for in-text markers.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Numeric reference definition: `[1] body`, `[1]: body`.
static NUMERIC_DEFINITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[([0-9]+)\]\s*:?\s*(.*)$").expect("numeric definition pattern is valid")
});

/// Footnote reference definition: `[^a1b2]: body`.
static FOOTNOTE_DEFINITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[\^([a-z0-9]+)\]\s*:?\s*(.*)$").expect("footnote definition pattern is valid")
});

/// In-text markers. The `regex` crate has no lookahead, so the "not followed
/// by `:`" rule is checked by the caller.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?:([0-9]+)|\^([a-z0-9]+))\]").expect("marker pattern is valid")
});

/// Identity of a citation before it is assigned a footnote identifier.
///
/// Numeric and footnote keys live in separate namespaces: `[1]` and `[^1]`
/// are different citations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum CitationKey {
    Numeric(String),
    Footnote(String),
}

impl CitationKey {
    /// Parses the namespaced form: `"2"` is numeric, `"^2"` is a footnote.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(token) = text.strip_prefix('^') {
            let valid = !token.is_empty()
                && token
                    .bytes()
                    .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase());
            return valid.then(|| CitationKey::Footnote(token.to_string()));
        }
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            return Some(CitationKey::Numeric(text.to_string()));
        }
        None
    }

    /// The bare number or token, without namespace.
    pub fn token(&self) -> &str {
        match self {
            CitationKey::Numeric(token) | CitationKey::Footnote(token) => token,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CitationKey::Numeric(_))
    }

    /// `"1"` for numeric keys, `"^1"` for footnote keys.
    pub fn namespaced(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CitationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitationKey::Numeric(n) => write!(f, "{}", n),
            CitationKey::Footnote(token) => write!(f, "^{}", token),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    /// An in-text marker.
    Citation,
    /// A line defining the reference text for a key.
    ReferenceDefinition,
}

/// One appearance of a marker in a document snapshot.
///
/// `byte_offset` is only meaningful against the exact text that was scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationOccurrence {
    pub key: CitationKey,
    /// The matched text: the marker itself, or for definitions the line from
    /// its first non-newline character through the end of the body.
    pub raw_text: String,
    pub byte_offset: usize,
    /// 1-based.
    pub line_number: usize,
    /// Byte offset of `raw_text` within `line_text`.
    pub column: usize,
    pub line_text: String,
    pub role: Role,
}

impl CitationOccurrence {
    pub fn end(&self) -> usize {
        self.byte_offset + self.raw_text.len()
    }

    /// Offset of the start of this occurrence's line.
    pub fn line_start(&self) -> usize {
        self.byte_offset - self.column
    }

    /// Offset just past the line text, before any line terminator.
    pub fn line_end(&self) -> usize {
        self.line_start() + self.line_text.len()
    }

    /// For definitions, the body text after the label. `None` for in-text
    /// markers.
    pub fn definition_body(&self) -> Option<&str> {
        if self.role != Role::ReferenceDefinition {
            return None;
        }
        let label = definition_label_len(&self.raw_text)?;
        Some(&self.raw_text[label..])
    }
}

/// Length of a definition line's label: leading whitespace, the bracketed
/// key, optional colon and the whitespace before the body.
pub(crate) fn definition_label_len(line: &str) -> Option<usize> {
    NUMERIC_DEFINITION_RE
        .captures(line)
        .or_else(|| FOOTNOTE_DEFINITION_RE.captures(line))
        .and_then(|caps| caps.get(2))
        .map(|body| body.start())
}

/// Recognizes a reference-definition line, returning its key.
pub(crate) fn match_definition(line: &str) -> Option<CitationKey> {
    if let Some(caps) = NUMERIC_DEFINITION_RE.captures(line) {
        return Some(CitationKey::Numeric(caps[1].to_string()));
    }
    FOOTNOTE_DEFINITION_RE
        .captures(line)
        .map(|caps| CitationKey::Footnote(caps[1].to_string()))
}

/// A line of the document with its absolute start offset. The text excludes
/// the line terminator (`\n` or `\r\n`).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    pub number: usize,
    pub start: usize,
    pub text: &'a str,
}

pub(crate) fn lines(document: &str) -> impl Iterator<Item = Line<'_>> {
    let mut start = 0;
    document.split('\n').enumerate().map(move |(index, raw)| {
        let line = Line {
            number: index + 1,
            start,
            text: raw.strip_suffix('\r').unwrap_or(raw),
        };
        start += raw.len() + 1;
        line
    })
}

/// Scans a document for citation markers and reference definitions.
///
/// # Returns
///
/// Every occurrence in document order.
///
/// # Examples
///
/// ```
/// use cite_footnotes::{scan, CitationKey, Role};
///
/// let occurrences = scan("Text [1].\n\n[1] Some Source");
/// assert_eq!(occurrences.len(), 2);
/// assert_eq!(occurrences[0].key, CitationKey::Numeric("1".to_string()));
/// assert_eq!(occurrences[0].role, Role::Citation);
/// assert_eq!(occurrences[1].role, Role::ReferenceDefinition);
/// ```
pub fn scan(document: &str) -> Vec<CitationOccurrence> {
    let mut occurrences = Vec::new();

    for line in lines(document) {
        if let Some(key) = match_definition(line.text) {
            let leading = line.text.len() - line.text.trim_start().len();
            let raw = &line.text[leading..];
            occurrences.push(CitationOccurrence {
                key,
                raw_text: raw.to_string(),
                byte_offset: line.start + leading,
                line_number: line.number,
                column: leading,
                line_text: line.text.to_string(),
                role: Role::ReferenceDefinition,
            });
            continue;
        }

        for caps in MARKER_RE.captures_iter(line.text) {
            let Some(marker) = caps.get(0) else {
                continue;
            };
            if line.text[marker.end()..].starts_with(':') {
                continue;
            }
            let key = match (caps.get(1), caps.get(2)) {
                (Some(number), _) => CitationKey::Numeric(number.as_str().to_string()),
                (None, Some(token)) => CitationKey::Footnote(token.as_str().to_string()),
                (None, None) => continue,
            };
            occurrences.push(CitationOccurrence {
                key,
                raw_text: marker.as_str().to_string(),
                byte_offset: line.start + marker.start(),
                line_number: line.number,
                column: marker.start(),
                line_text: line.text.to_string(),
                role: Role::Citation,
            });
        }
    }

    tracing::debug!(count = occurrences.len(), "scanned citation occurrences");
    occurrences
}

/// Re-resolves occurrences taken from an older snapshot against `current`.
///
/// Each occurrence is looked up by searching for its raw text, starting at its
/// old offset if it still matches there, otherwise from the end of the
/// previously resolved occurrence. Offsets are never adjusted arithmetically.
/// Occurrences that can no longer be found are dropped.
pub fn rebase(occurrences: &[CitationOccurrence], current: &str) -> Vec<CitationOccurrence> {
    let mut rebased = Vec::with_capacity(occurrences.len());
    let mut lower_bound = 0;

    for occurrence in occurrences {
        let still_there = occurrence.byte_offset >= lower_bound
            && current
                .get(occurrence.byte_offset..)
                .is_some_and(|rest| rest.starts_with(&occurrence.raw_text));
        let offset = if still_there {
            Some(occurrence.byte_offset)
        } else {
            current
                .get(lower_bound..)
                .and_then(|rest| rest.find(&occurrence.raw_text))
                .map(|found| lower_bound + found)
        };

        let Some(offset) = offset else {
            tracing::debug!(key = %occurrence.key, "occurrence no longer present");
            continue;
        };

        let line_start = current[..offset].rfind('\n').map_or(0, |i| i + 1);
        let line_end = current[offset..]
            .find('\n')
            .map_or(current.len(), |i| offset + i);
        let line_text = &current[line_start..line_end];

        rebased.push(CitationOccurrence {
            byte_offset: offset,
            line_number: current[..offset].matches('\n').count() + 1,
            column: offset - line_start,
            line_text: line_text.strip_suffix('\r').unwrap_or(line_text).to_string(),
            ..occurrence.clone()
        });
        lower_bound = offset + occurrence.raw_text.len();
    }

    rebased
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numeric(n: &str) -> CitationKey {
        CitationKey::Numeric(n.to_string())
    }

    fn footnote(token: &str) -> CitationKey {
        CitationKey::Footnote(token.to_string())
    }

    #[test]
    fn test_empty_document() {
        assert!(scan("").is_empty());
    }

    #[test]
    fn test_no_citations() {
        assert!(scan("Plain text with [a link](https://example.com).").is_empty());
    }

    #[test]
    fn test_numeric_citation_offsets() {
        // Given: a document with a marker on the second line
        let document = "Intro line\nSee [12] here.";

        // When: we scan it
        let occurrences = scan(document);

        // Then: the absolute offset points at the marker
        assert_eq!(occurrences.len(), 1);
        let occurrence = &occurrences[0];
        assert_eq!(occurrence.key, numeric("12"));
        assert_eq!(occurrence.raw_text, "[12]");
        assert_eq!(&document[occurrence.byte_offset..occurrence.end()], "[12]");
        assert_eq!(occurrence.line_number, 2);
        assert_eq!(occurrence.line_text, "See [12] here.");
        assert_eq!(occurrence.role, Role::Citation);
    }

    #[test]
    fn test_footnote_citation() {
        let occurrences = scan("Claim[^a1b2] holds.");
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].key, footnote("a1b2"));
        assert_eq!(occurrences[0].raw_text, "[^a1b2]");
        assert_eq!(occurrences[0].byte_offset, 5);
    }

    #[test]
    fn test_marker_followed_by_colon_is_not_a_citation() {
        let occurrences = scan("Note [1]: not a citation, but [2] is.");
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].key, numeric("2"));
    }

    #[test]
    fn test_numeric_definition_line() {
        // Given: a numeric reference definition
        let document = "Text[1].\n\n[1] Some Source https://example.com";

        // When: we scan it
        let occurrences = scan(document);

        // Then: we get one citation and one definition spanning the line
        assert_eq!(occurrences.len(), 2);
        let definition = &occurrences[1];
        assert_eq!(definition.role, Role::ReferenceDefinition);
        assert_eq!(definition.key, numeric("1"));
        assert_eq!(definition.raw_text, "[1] Some Source https://example.com");
        assert_eq!(definition.byte_offset, 10);
        assert_eq!(definition.line_number, 3);
        assert_eq!(
            definition.definition_body(),
            Some("Some Source https://example.com")
        );
    }

    #[test]
    fn test_definition_with_colon_and_indent() {
        let document = "  [3]:   Indented source";
        let occurrences = scan(document);
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].byte_offset, 2);
        assert_eq!(occurrences[0].raw_text, "[3]:   Indented source");
        assert_eq!(occurrences[0].definition_body(), Some("Indented source"));
    }

    #[test]
    fn test_footnote_definition_line() {
        let occurrences = scan("[^3fa9c1]: A footnote body");
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].key, footnote("3fa9c1"));
        assert_eq!(occurrences[0].role, Role::ReferenceDefinition);
        assert_eq!(occurrences[0].definition_body(), Some("A footnote body"));
    }

    #[test]
    fn test_definition_line_is_not_scanned_for_markers() {
        // Given: a definition line that mentions another marker
        let document = "[1] Source, see also [2]";

        // When: we scan it
        let occurrences = scan(document);

        // Then: only the definition is recorded
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].role, Role::ReferenceDefinition);
    }

    #[test]
    fn test_numeric_and_footnote_namespaces() {
        let occurrences = scan("One [1] and [^1].");
        assert_eq!(occurrences.len(), 2);
        assert_eq!(occurrences[0].key, numeric("1"));
        assert_eq!(occurrences[1].key, footnote("1"));
        assert_ne!(occurrences[0].key, occurrences[1].key);
        assert_eq!(occurrences[1].key.namespaced(), "^1");
    }

    #[test]
    fn test_adjacent_markers() {
        let occurrences = scan("a[1][2],b");
        let keys: Vec<String> = occurrences.iter().map(|o| o.key.namespaced()).collect();
        assert_eq!(keys, vec!["1", "2"]);
        assert_eq!(occurrences[1].byte_offset, 4);
    }

    #[test]
    fn test_crlf_lines() {
        let document = "See [1].\r\n[1] Source\r\n";
        let occurrences = scan(document);
        assert_eq!(occurrences.len(), 2);
        assert_eq!(occurrences[0].line_text, "See [1].");
        assert_eq!(occurrences[1].raw_text, "[1] Source");
        assert_eq!(occurrences[1].byte_offset, 10);
    }

    #[test]
    fn test_uppercase_footnote_token_is_ignored() {
        assert!(scan("See [^ABC].").is_empty());
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(CitationKey::parse("2"), Some(numeric("2")));
        assert_eq!(CitationKey::parse("^a1"), Some(footnote("a1")));
        assert_eq!(CitationKey::parse("^"), None);
        assert_eq!(CitationKey::parse("x"), None);
        assert_eq!(CitationKey::parse("^A1"), None);
    }

    #[test]
    fn test_non_ascii_digits_are_not_numbers() {
        // Given: Arabic-Indic digits in marker and definition position
        let document = "See [٣] here.\n[٣] Source";

        // Then: neither is a citation, matching what CitationKey::parse accepts
        assert!(scan(document).is_empty());
        assert_eq!(CitationKey::parse("٣"), None);
    }

    #[test]
    fn test_rebase_after_earlier_edit() {
        // Given: occurrences scanned from a snapshot
        let before = "A [1] b [2] c [1]";
        let occurrences: Vec<_> = scan(before)
            .into_iter()
            .filter(|o| o.key == numeric("1"))
            .collect();

        // When: text is inserted before them and we rebase
        let after = "Intro\nA longer [1] b [2] c [1]";
        let rebased = rebase(&occurrences, after);

        // Then: the offsets follow the text, not the old arithmetic
        assert_eq!(rebased.len(), 2);
        for occurrence in &rebased {
            assert_eq!(&after[occurrence.byte_offset..occurrence.end()], "[1]");
            assert_eq!(occurrence.line_number, 2);
        }
        assert!(rebased[0].byte_offset < rebased[1].byte_offset);
    }

    #[test]
    fn test_rebase_drops_missing_occurrences() {
        let occurrences = scan("See [7].");
        let rebased = rebase(&occurrences, "See nothing.");
        assert!(rebased.is_empty());
    }

    #[test]
    fn test_rebase_unchanged_document() {
        let document = "x [1] y\n[1] Source";
        let occurrences = scan(document);
        assert_eq!(rebase(&occurrences, document), occurrences);
    }
}
