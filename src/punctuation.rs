//! Marker placement relative to punctuation and to each other.
//!
//! Independent of the rest of the engine: both passes work on raw text and
//! can run before or after conversion.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::scanner::match_definition;

/// One marker, numeric or footnote.
static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?:[0-9]+|\^[a-z0-9]+)\]").expect("marker pattern is valid"));

/// A run of markers (optionally space separated) directly followed by `.` or `,`.
static MARKERS_BEFORE_PUNCTUATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((?:\[(?:[0-9]+|\^[a-z0-9]+)\][ \t]*)*\[(?:[0-9]+|\^[a-z0-9]+)\])([.,])")
        .expect("marker run pattern is valid")
});

/// Heading that opens a references section.
static REFERENCES_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s{0,3}(?:#{1,6}\s+)?(?:\*\*|__)?(?:references|sources|footnotes)(?:\*\*|__)?:?\s*$",
    )
    .expect("references heading pattern is valid")
});

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}#{1,6}(?:\s|$)").expect("heading pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    InBody,
    InReferencesSection,
}

impl Section {
    fn next(self, line: &str) -> Self {
        if REFERENCES_HEADING_RE.is_match(line) {
            Section::InReferencesSection
        } else if HEADING_RE.is_match(line) {
            Section::InBody
        } else {
            self
        }
    }
}

/// Moves sentence punctuation in front of the markers it follows.
///
/// `a[1][2],b` becomes `a,[1] [2]b`. Lines inside a References, Sources or
/// Footnotes section, and reference-definition lines, are left alone.
///
/// # Examples
///
/// ```
/// use cite_footnotes::move_markers_behind_punctuation;
///
/// assert_eq!(move_markers_behind_punctuation("a[1][2],b"), "a,[1] [2]b");
/// ```
pub fn move_markers_behind_punctuation(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut section = Section::InBody;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        let terminator = &line[content.len()..];

        section = section.next(content);
        if section == Section::InReferencesSection || match_definition(content).is_some() {
            result.push_str(line);
            continue;
        }

        let moved = MARKERS_BEFORE_PUNCTUATION_RE.replace_all(content, |caps: &Captures| {
            let markers: Vec<&str> = MARKER_RE
                .find_iter(&caps[1])
                .map(|m| m.as_str())
                .collect();
            format!("{}{}", &caps[2], markers.join(" "))
        });
        result.push_str(&moved);
        result.push_str(terminator);
    }

    result
}

/// Inserts a single space wherever `]` is directly followed by `[`.
///
/// Idempotent: no `][` remains after one pass.
pub fn assure_spacing_between_adjacent_markers(text: &str) -> String {
    text.replace("][", "] [")
}

/// Both passes, punctuation first.
pub fn normalize(text: &str) -> String {
    assure_spacing_between_adjacent_markers(&move_markers_behind_punctuation(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_move_single_marker() {
        assert_eq!(move_markers_behind_punctuation("Text[1]."), "Text.[1]");
    }

    #[test]
    fn test_move_marker_group() {
        assert_eq!(move_markers_behind_punctuation("a[1][2],b"), "a,[1] [2]b");
    }

    #[test]
    fn test_move_spaced_marker_group() {
        assert_eq!(
            move_markers_behind_punctuation("Claim [1]  [^ab12]. Next"),
            "Claim .[1] [^ab12] Next"
        );
    }

    #[test]
    fn test_markers_without_punctuation_untouched() {
        let text = "See [1] and [2] here";
        assert_eq!(move_markers_behind_punctuation(text), text);
    }

    #[test]
    fn test_links_are_not_markers() {
        let text = "See [the docs]. And [1]x.";
        assert_eq!(move_markers_behind_punctuation(text), text);
    }

    #[test]
    fn test_references_section_skipped() {
        // Given: body prose followed by a references section
        let text = "Body[1].\n\n## References\n\nSee list[1].\n[1] Source.\n";

        // When: we move markers
        let moved = move_markers_behind_punctuation(text);

        // Then: only the body line changes
        assert_eq!(
            moved,
            "Body.[1]\n\n## References\n\nSee list[1].\n[1] Source.\n"
        );
    }

    #[test]
    fn test_new_heading_returns_to_body() {
        let text = "**Sources**\nIn list[1].\n# Appendix\nAfter[2].";
        assert_eq!(
            move_markers_behind_punctuation(text),
            "**Sources**\nIn list[1].\n# Appendix\nAfter.[2]"
        );
    }

    #[test]
    fn test_definition_lines_skipped() {
        let text = "[1][2]. leading markers";
        assert_eq!(move_markers_behind_punctuation(text), text);
    }

    #[test]
    fn test_crlf_preserved() {
        assert_eq!(
            move_markers_behind_punctuation("A[1].\r\nB[2],\r\n"),
            "A.[1]\r\nB,[2]\r\n"
        );
    }

    #[test]
    fn test_move_is_stable() {
        let once = move_markers_behind_punctuation("a[1][2],b and c[3].");
        assert_eq!(move_markers_behind_punctuation(&once), once);
    }

    #[test]
    fn test_spacing() {
        assert_eq!(
            assure_spacing_between_adjacent_markers("a[1][2][^x1]"),
            "a[1] [2] [^x1]"
        );
    }

    #[test]
    fn test_spacing_idempotent() {
        let once = assure_spacing_between_adjacent_markers("[1][2] [3][4]");
        assert_eq!(assure_spacing_between_adjacent_markers(&once), once);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("x[1][2]. y[3][4]"), "x.[1] [2] y[3] [4]");
    }

    #[test]
    fn test_non_ascii_digits_do_not_move() {
        let text = "Value[٣]. Next";
        assert_eq!(move_markers_behind_punctuation(text), text);
    }
}
