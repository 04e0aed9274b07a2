//! Groups citation occurrences by key and resolves their reference text.

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::scanner::{CitationKey, CitationOccurrence, Role};

/// How a group without a definition line gets its reference text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferencePolicy {
    /// Only explicit definition lines provide reference text.
    #[default]
    DefinitionLines,
    /// Legacy numeric documents: when a key has no definition line, its last
    /// occurrence is the reference and the rest of that line is its text.
    LastOccurrence,
}

/// All occurrences of one key, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationGroup {
    pub key: CitationKey,
    pub occurrences: Vec<CitationOccurrence>,
    /// Index into `occurrences` of the occurrence the reference text comes from.
    pub reference_index: Option<usize>,
    pub reference_text: Option<String>,
    /// Byte range of `reference_text` in the scanned snapshot.
    pub reference_span: Option<Range<usize>>,
}

impl CitationGroup {
    pub fn reference_occurrence(&self) -> Option<&CitationOccurrence> {
        self.reference_index.map(|i| &self.occurrences[i])
    }

    /// True if the reference comes from the last-occurrence fallback rather
    /// than a definition line.
    pub fn has_fallback_reference(&self) -> bool {
        self.reference_occurrence()
            .is_some_and(|o| o.role == Role::Citation)
    }

    /// In-text markers, excluding a fallback reference occurrence.
    pub fn citations(&self) -> impl Iterator<Item = &CitationOccurrence> {
        self.occurrences
            .iter()
            .enumerate()
            .filter(move |(i, o)| o.role == Role::Citation && Some(*i) != self.reference_index)
            .map(|(_, o)| o)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &CitationOccurrence> {
        self.occurrences
            .iter()
            .filter(|o| o.role == Role::ReferenceDefinition)
    }
}

/// Partitions occurrences by key.
///
/// Groups come back in order of first appearance. When a key has several
/// definition lines, the last one in document order provides the reference
/// text.
///
/// # Examples
///
/// ```
/// use cite_footnotes::{group, scan, ReferencePolicy};
///
/// let groups = group(&scan("A [1] b [2] c [1]\n\n[1] Source"), ReferencePolicy::DefinitionLines);
/// assert_eq!(groups.len(), 2);
/// assert_eq!(groups[0].occurrences.len(), 3);
/// assert_eq!(groups[0].reference_text.as_deref(), Some("Source"));
/// assert_eq!(groups[1].reference_text, None);
/// ```
pub fn group(occurrences: &[CitationOccurrence], policy: ReferencePolicy) -> Vec<CitationGroup> {
    let mut order: Vec<CitationKey> = Vec::new();
    let mut by_key: HashMap<CitationKey, Vec<CitationOccurrence>> = HashMap::new();

    for occurrence in occurrences {
        by_key
            .entry(occurrence.key.clone())
            .or_insert_with(|| {
                order.push(occurrence.key.clone());
                Vec::new()
            })
            .push(occurrence.clone());
    }

    order
        .into_iter()
        .filter_map(|key| {
            let mut members = by_key.remove(&key)?;
            members.sort_by_key(|o| o.byte_offset);
            Some(resolve_reference(key, members, occurrences, policy))
        })
        .collect()
}

fn resolve_reference(
    key: CitationKey,
    occurrences: Vec<CitationOccurrence>,
    all: &[CitationOccurrence],
    policy: ReferencePolicy,
) -> CitationGroup {
    let mut group = CitationGroup {
        key,
        occurrences,
        reference_index: None,
        reference_text: None,
        reference_span: None,
    };

    let definition = group
        .occurrences
        .iter()
        .rposition(|o| o.role == Role::ReferenceDefinition);

    if let Some(index) = definition {
        let occurrence = &group.occurrences[index];
        let superseded = group.definitions().count() - 1;
        if superseded > 0 {
            tracing::warn!(
                key = %group.key,
                superseded,
                line = occurrence.line_number,
                "multiple definitions for one key; the last one wins"
            );
        }
        let body = occurrence.definition_body().unwrap_or_default();
        let start = occurrence.end() - body.len();
        group.reference_span = Some(start..occurrence.end());
        group.reference_text = (!body.is_empty()).then(|| body.to_string());
        group.reference_index = Some(index);
        return group;
    }

    if policy == ReferencePolicy::LastOccurrence && group.occurrences.len() >= 2 {
        let index = group.occurrences.len() - 1;
        let occurrence = &group.occurrences[index];
        let span = trailing_text_span(occurrence, all);
        let line_start = occurrence.line_start();
        let raw = &occurrence.line_text[span.start - line_start..span.end - line_start];
        let text = raw.trim();
        if !text.is_empty() {
            let start = span.start + (raw.len() - raw.trim_start().len());
            group.reference_span = Some(start..start + text.len());
            group.reference_text = Some(text.to_string());
            group.reference_index = Some(index);
        }
    }

    group
}

/// Span from the end of a marker to the next marker on the same line, or the
/// end of the line.
fn trailing_text_span(occurrence: &CitationOccurrence, all: &[CitationOccurrence]) -> Range<usize> {
    let stop = all
        .iter()
        .filter(|o| o.line_number == occurrence.line_number && o.byte_offset >= occurrence.end())
        .map(|o| o.byte_offset)
        .min()
        .unwrap_or_else(|| occurrence.line_end());
    occurrence.end()..stop
}
