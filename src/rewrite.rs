//! Rewriting markers and reference definitions into footnote syntax.
//!
//! A rewrite is planned as a list of non-overlapping edits against one
//! immutable snapshot and then applied from the end of the text towards the
//! beginning, so no edit invalidates the offsets of the edits still pending.
//!
//! Reference text is handled in exactly one of two ways per mode: either the
//! definition's label is rewritten where it stands and its body is left alone,
//! or (synthesis mode) the reference is removed from the body and re-emitted in
//! a generated section. Never both.

use std::collections::HashMap;
use std::ops::Range;

use crate::grouping::CitationGroup;
use crate::scanner::{definition_label_len, CitationKey, Role};

/// Which groups are rewritten, and how their references are treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteMode {
    /// Every numeric group, definitions rewritten in place.
    ConvertAll,
    /// A single group (numeric or footnote), definitions rewritten in place.
    ConvertOne(CitationKey),
    /// Every numeric group; references are moved into a generated section
    /// appended to the document.
    SynthesizeReferenceSection,
}

impl RewriteMode {
    fn includes(&self, key: &CitationKey) -> bool {
        match self {
            RewriteMode::ConvertAll | RewriteMode::SynthesizeReferenceSection => key.is_numeric(),
            RewriteMode::ConvertOne(target) => target == key,
        }
    }
}

/// Replace `range` of the snapshot with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range<usize>,
    pub replacement: String,
}

/// Everything a rewrite will do, computed before any text changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewritePlan {
    pub identifiers: HashMap<CitationKey, String>,
    pub edits: Vec<TextEdit>,
    /// Generated reference lines, appended in synthesis mode.
    pub appendix: Vec<String>,
}

/// Result of a rewrite. `changed_count == 0` means the document came back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub document: String,
    pub changed_count: usize,
}

impl RewriteOutcome {
    pub fn unchanged(document: &str) -> Self {
        Self {
            document: document.to_string(),
            changed_count: 0,
        }
    }

    pub fn changed(&self) -> bool {
        self.changed_count > 0
    }
}

/// In-text footnote marker. A colon directly attached to the original
/// marker is carried over.
pub fn footnote_marker(id: &str, trailing_colon: bool) -> String {
    if trailing_colon {
        format!("[^{}]:", id)
    } else {
        format!("[^{}]", id)
    }
}

/// Line of the generated reference section.
pub fn synthesized_reference_line(id: &str, text: &str) -> String {
    let body = text.trim();
    let body = body.strip_suffix('.').unwrap_or(body);
    format!("[^{}]: {}.", id, body)
}

/// Rewrites `document` according to `mode`.
///
/// # Arguments
///
/// * `document` - The snapshot the groups were built from
/// * `groups` - Citation groups of that snapshot
/// * `identifiers` - New identifier per key; groups without one are skipped
/// * `mode` - Which groups to rewrite and how references are treated
///
/// # Returns
///
/// The new document text and the number of edits applied.
pub fn rewrite(
    document: &str,
    groups: &[CitationGroup],
    identifiers: &HashMap<CitationKey, String>,
    mode: &RewriteMode,
) -> RewriteOutcome {
    let plan = plan(document, groups, identifiers, mode);
    apply(document, &plan)
}

/// Computes the edits for a rewrite without applying them.
pub fn plan(
    document: &str,
    groups: &[CitationGroup],
    identifiers: &HashMap<CitationKey, String>,
    mode: &RewriteMode,
) -> RewritePlan {
    let mut plan = RewritePlan::default();

    for group in groups.iter().filter(|g| mode.includes(&g.key)) {
        let Some(id) = identifiers.get(&group.key) else {
            tracing::debug!(key = %group.key, "no identifier assigned, skipping group");
            continue;
        };
        plan.identifiers.insert(group.key.clone(), id.clone());

        match mode {
            RewriteMode::ConvertAll | RewriteMode::ConvertOne(_) => {
                plan_in_place(group, id, &mut plan.edits);
            }
            RewriteMode::SynthesizeReferenceSection => {
                plan_synthesized(document, group, id, &mut plan);
            }
        }
    }

    plan.edits.retain(|edit| document.get(edit.range.clone()) != Some(edit.replacement.as_str()));
    plan
}

fn plan_in_place(group: &CitationGroup, id: &str, edits: &mut Vec<TextEdit>) {
    for occurrence in &group.occurrences {
        match occurrence.role {
            Role::Citation => edits.push(TextEdit {
                range: occurrence.byte_offset..occurrence.end(),
                replacement: footnote_marker(id, occurrence.raw_text.ends_with(':')),
            }),
            Role::ReferenceDefinition => {
                let Some(label) = definition_label_len(&occurrence.raw_text) else {
                    continue;
                };
                let has_body = label < occurrence.raw_text.len();
                let replacement = if has_body {
                    format!("[^{}]: ", id)
                } else {
                    format!("[^{}]:", id)
                };
                edits.push(TextEdit {
                    range: occurrence.byte_offset..occurrence.byte_offset + label,
                    replacement,
                });
            }
        }
    }
}

fn plan_synthesized(document: &str, group: &CitationGroup, id: &str, plan: &mut RewritePlan) {
    for occurrence in group.citations() {
        plan.edits.push(TextEdit {
            range: occurrence.byte_offset..occurrence.end(),
            replacement: footnote_marker(id, occurrence.raw_text.ends_with(':')),
        });
    }

    for (index, definition) in group.occurrences.iter().enumerate() {
        if definition.role != Role::ReferenceDefinition {
            continue;
        }
        if Some(index) != group.reference_index {
            tracing::warn!(
                key = %group.key,
                line = definition.line_number,
                "dropping superseded reference definition"
            );
        }
        let end = definition.line_end();
        let terminator = if document[end..].starts_with("\r\n") {
            2
        } else if document[end..].starts_with('\n') {
            1
        } else {
            0
        };
        plan.edits.push(TextEdit {
            range: definition.line_start()..end + terminator,
            replacement: String::new(),
        });
    }

    if group.has_fallback_reference() {
        if let (Some(reference), Some(span)) =
            (group.reference_occurrence(), group.reference_span.as_ref())
        {
            let before = &document[reference.line_start()..reference.byte_offset];
            let start = reference.byte_offset
                - (before.len() - before.trim_end_matches([' ', '\t']).len());
            plan.edits.push(TextEdit {
                range: start..span.end,
                replacement: String::new(),
            });
        }
    }

    if let Some(text) = &group.reference_text {
        plan.appendix.push(synthesized_reference_line(id, text));
    }
}

/// Applies a plan to the snapshot it was computed from.
///
/// Edits are applied in descending offset order. An edit that would overlap
/// one already applied is skipped.
pub fn apply(document: &str, plan: &RewritePlan) -> RewriteOutcome {
    let mut edits: Vec<&TextEdit> = plan.edits.iter().collect();
    edits.sort_by(|a, b| b.range.start.cmp(&a.range.start));

    let mut result = document.to_string();
    let mut changed_count = 0;
    let mut floor = document.len();

    for edit in edits {
        if edit.range.end > floor || edit.range.start > edit.range.end {
            tracing::warn!(
                start = edit.range.start,
                end = edit.range.end,
                "skipping overlapping edit"
            );
            continue;
        }
        result.replace_range(edit.range.clone(), &edit.replacement);
        floor = edit.range.start;
        changed_count += 1;
    }

    if !plan.appendix.is_empty() {
        result.truncate(result.trim_end().len());
        if !result.is_empty() {
            result.push_str("\n\n");
        }
        result.push_str(&plan.appendix.join("\n"));
        result.push('\n');
    }

    tracing::debug!(
        edits = changed_count,
        appended = plan.appendix.len(),
        "rewrite applied"
    );

    RewriteOutcome {
        document: result,
        changed_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::{group, ReferencePolicy};
    use crate::scanner::scan;
    use pretty_assertions::assert_eq;

    fn ids(pairs: &[(&str, &str)]) -> HashMap<CitationKey, String> {
        pairs
            .iter()
            .map(|(key, id)| (CitationKey::parse(key).unwrap(), id.to_string()))
            .collect()
    }

    fn run(document: &str, pairs: &[(&str, &str)], mode: RewriteMode) -> RewriteOutcome {
        let groups = group(&scan(document), ReferencePolicy::DefinitionLines);
        rewrite(document, &groups, &ids(pairs), &mode)
    }

    #[test]
    fn test_convert_all_scenario() {
        // Given: a marker before punctuation and its definition line
        let document = "Text[1].\n\n[1] Some Source https://example.com";

        // When: we convert all citations
        let outcome = run(document, &[("1", "a1b2c3")], RewriteMode::ConvertAll);

        // Then: both the marker and the label carry the new identifier
        assert_eq!(
            outcome.document,
            "Text[^a1b2c3].\n\n[^a1b2c3]: Some Source https://example.com"
        );
        assert_eq!(outcome.changed_count, 2);
        assert!(outcome.changed());
    }

    #[test]
    fn test_definition_with_colon_keeps_body_verbatim() {
        let document = "See [2].\n[2]:Body text  ";
        let outcome = run(document, &[("2", "f00d12")], RewriteMode::ConvertAll);
        assert_eq!(outcome.document, "See [^f00d12].\n[^f00d12]: Body text  ");
    }

    #[test]
    fn test_definition_without_body() {
        let outcome = run("[3]", &[("3", "abc123")], RewriteMode::ConvertAll);
        assert_eq!(outcome.document, "[^abc123]:");
    }

    #[test]
    fn test_convert_all_leaves_footnotes_alone() {
        let document = "Old[^1a2b3c] new[1]\n\n[^1a2b3c]: Old\n[1] New";
        let outcome = run(
            document,
            &[("1", "9f9f9f"), ("^1a2b3c", "000aaa")],
            RewriteMode::ConvertAll,
        );
        assert_eq!(
            outcome.document,
            "Old[^1a2b3c] new[^9f9f9f]\n\n[^1a2b3c]: Old\n[^9f9f9f]: New"
        );
    }

    #[test]
    fn test_convert_all_on_footnote_document_is_noop() {
        let document = "Claim[^a1b2c3].\n\n[^a1b2c3]: Source";
        let groups = group(&scan(document), ReferencePolicy::DefinitionLines);
        let outcome = rewrite(document, &groups, &HashMap::new(), &RewriteMode::ConvertAll);
        assert_eq!(outcome, RewriteOutcome::unchanged(document));
        assert!(!outcome.changed());
    }

    #[test]
    fn test_convert_one_scoped_to_group() {
        // Given: two markers for key 2, one for key 1, and a definition for 2
        let document = "A [2] b [1]\nC [2]\n\n[2] Source Two\n[1] Source One";

        // When: we convert only key 2
        let outcome = run(
            document,
            &[("2", "beef01"), ("1", "cafe02")],
            RewriteMode::ConvertOne(CitationKey::parse("2").unwrap()),
        );

        // Then: all three occurrences of 2 change, nothing else does
        assert_eq!(
            outcome.document,
            "A [^beef01] b [1]\nC [^beef01]\n\n[^beef01]: Source Two\n[1] Source One"
        );
        assert_eq!(outcome.changed_count, 3);
    }

    #[test]
    fn test_convert_one_footnote_key() {
        let document = "X[^old1].\n\n[^old1]: Body";
        let outcome = run(
            document,
            &[("^old1", "new2ab")],
            RewriteMode::ConvertOne(CitationKey::parse("^old1").unwrap()),
        );
        assert_eq!(outcome.document, "X[^new2ab].\n\n[^new2ab]: Body");
    }

    #[test]
    fn test_missing_identifier_skips_group() {
        let outcome = run("A [1] B [2]", &[("2", "dd22ee")], RewriteMode::ConvertAll);
        assert_eq!(outcome.document, "A [1] B [^dd22ee]");
        assert_eq!(outcome.changed_count, 1);
    }

    #[test]
    fn test_trailing_colon_marker() {
        assert_eq!(footnote_marker("ab12", true), "[^ab12]:");
        assert_eq!(footnote_marker("ab12", false), "[^ab12]");
    }

    #[test]
    fn test_synthesize_moves_definitions() {
        // Given: markers with definitions in a sources block
        let document = "One[1] two[2].\n\n[1] Book A\n[2] Book B.\n";

        // When: we synthesize a reference section
        let outcome = run(
            document,
            &[("1", "aa11bb"), ("2", "cc22dd")],
            RewriteMode::SynthesizeReferenceSection,
        );

        // Then: definitions are removed and re-emitted exactly once
        assert_eq!(
            outcome.document,
            "One[^aa11bb] two[^cc22dd].\n\n[^aa11bb]: Book A.\n[^cc22dd]: Book B.\n"
        );
        assert_eq!(outcome.document.matches("Book A").count(), 1);
        assert_eq!(outcome.document.matches("Book B").count(), 1);
    }

    #[test]
    fn test_synthesize_drops_superseded_definition() {
        let document = "See [1].\n[1] Draft\n[1] Final\n";
        let outcome = run(document, &[("1", "ab12cd")], RewriteMode::SynthesizeReferenceSection);
        assert_eq!(outcome.document, "See [^ab12cd].\n\n[^ab12cd]: Final.\n");
    }

    #[test]
    fn test_synthesize_with_fallback_reference() {
        // Given: a legacy document with no definition lines
        let document = "Claim [1] here.\nSources: see [1] Book A\n";
        let groups = group(&scan(document), ReferencePolicy::LastOccurrence);

        // When: we synthesize
        let outcome = rewrite(
            document,
            &groups,
            &ids(&[("1", "0a0b0c")]),
            &RewriteMode::SynthesizeReferenceSection,
        );

        // Then: the trailing reference is moved, not copied
        assert_eq!(
            outcome.document,
            "Claim [^0a0b0c] here.\nSources: see\n\n[^0a0b0c]: Book A.\n"
        );
        assert_eq!(outcome.document.matches("Book A").count(), 1);
    }

    #[test]
    fn test_fallback_reference_in_place_only_changes_marker() {
        let document = "Claim [1] here.\nSources: see [1] Book A";
        let groups = group(&scan(document), ReferencePolicy::LastOccurrence);
        let outcome = rewrite(document, &groups, &ids(&[("1", "0a0b0c")]), &RewriteMode::ConvertAll);
        assert_eq!(
            outcome.document,
            "Claim [^0a0b0c] here.\nSources: see [^0a0b0c] Book A"
        );
    }

    #[test]
    fn test_synthesize_crlf() {
        let document = "See [1].\r\n[1] Source\r\nAfter\r\n";
        let outcome = run(document, &[("1", "ab12cd")], RewriteMode::SynthesizeReferenceSection);
        assert_eq!(outcome.document, "See [^ab12cd].\r\nAfter\n\n[^ab12cd]: Source.\n");
    }

    #[test]
    fn test_overlapping_edit_is_skipped() {
        let plan = RewritePlan {
            identifiers: HashMap::new(),
            edits: vec![
                TextEdit {
                    range: 0..4,
                    replacement: "X".to_string(),
                },
                TextEdit {
                    range: 2..6,
                    replacement: "Y".to_string(),
                },
            ],
            appendix: Vec::new(),
        };
        let outcome = apply("abcdefgh", &plan);
        assert_eq!(outcome.document, "abYgh");
        assert_eq!(outcome.changed_count, 1);
    }

    #[test]
    fn test_synthesized_reference_line() {
        assert_eq!(synthesized_reference_line("ab12", "Book A"), "[^ab12]: Book A.");
        assert_eq!(synthesized_reference_line("ab12", " Book A. "), "[^ab12]: Book A.");
    }
}
