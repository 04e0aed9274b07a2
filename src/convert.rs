//! End-to-end conversion: scan, group, issue identifiers, rewrite.

use std::collections::HashMap;

use crate::config::{ReferenceMode, Settings};
use crate::error::Result;
use crate::grouping::{group, CitationGroup, ReferencePolicy};
use crate::identifier::{EntropySource, IdentifierGenerator, IdentifierPool};
use crate::rewrite::{rewrite, RewriteMode, RewriteOutcome};
use crate::scanner::{scan, CitationKey, CitationOccurrence};

/// Options shared by the conversion entry points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    pub mode: ReferenceMode,
    pub policy: ReferencePolicy,
}

impl From<&Settings> for ConvertOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            mode: settings.references.mode,
            policy: settings.references.fallback,
        }
    }
}

/// Converts every numeric citation in `document` to footnote syntax.
///
/// Each distinct citation number receives one new identifier, shared by all
/// of its markers and its definition.
///
/// # Errors
///
/// Returns [`crate::CiteError::ExhaustedIdentifierSpace`] if identifiers run
/// out. No text is produced in that case.
///
/// # Examples
///
/// ```
/// use cite_footnotes::{convert_all, ConvertOptions, IdentifierGenerator, IdentifierPool};
/// use cite_footnotes::config::IdentifierSettings;
///
/// let mut generator = IdentifierGenerator::new(&IdentifierSettings::default());
/// let mut pool = IdentifierPool::new();
/// let outcome = convert_all(
///     "Text[1].\n\n[1] Some Source",
///     &mut generator,
///     &mut pool,
///     &ConvertOptions::default(),
/// )
/// .unwrap();
/// assert_eq!(outcome.changed_count, 2);
/// assert!(!outcome.document.contains("[1]"));
/// ```
pub fn convert_all<E: EntropySource>(
    document: &str,
    generator: &mut IdentifierGenerator<E>,
    pool: &mut IdentifierPool,
    options: &ConvertOptions,
) -> Result<RewriteOutcome> {
    let occurrences = scan(document);
    reserve_existing(&occurrences, pool);
    let groups = group(&occurrences, options.policy);

    let mode = match options.mode {
        ReferenceMode::InPlace => RewriteMode::ConvertAll,
        ReferenceMode::Synthesize => RewriteMode::SynthesizeReferenceSection,
    };
    convert_groups(document, &groups, &mode, generator, pool)
}

/// Converts the single group identified by `key`, in place.
///
/// A key that does not occur in the document yields an unchanged outcome.
pub fn convert_one<E: EntropySource>(
    document: &str,
    key: &CitationKey,
    generator: &mut IdentifierGenerator<E>,
    pool: &mut IdentifierPool,
    options: &ConvertOptions,
) -> Result<RewriteOutcome> {
    let occurrences = scan(document);
    reserve_existing(&occurrences, pool);
    let groups = group(&occurrences, options.policy);
    convert_groups(
        document,
        &groups,
        &RewriteMode::ConvertOne(key.clone()),
        generator,
        pool,
    )
}

/// Issues identifiers for the groups `mode` selects, then rewrites.
///
/// All identifiers are issued before any edit is computed. They are drawn
/// against a copy of `pool`, which is only updated once every group has one.
pub fn convert_groups<E: EntropySource>(
    document: &str,
    groups: &[CitationGroup],
    mode: &RewriteMode,
    generator: &mut IdentifierGenerator<E>,
    pool: &mut IdentifierPool,
) -> Result<RewriteOutcome> {
    let mut identifiers = HashMap::new();
    let mut scratch = pool.clone();
    for g in groups {
        let selected = match mode {
            RewriteMode::ConvertAll | RewriteMode::SynthesizeReferenceSection => g.key.is_numeric(),
            RewriteMode::ConvertOne(key) => &g.key == key,
        };
        if selected {
            identifiers.insert(g.key.clone(), generator.issue(&mut scratch)?);
        }
    }
    *pool = scratch;

    if identifiers.is_empty() {
        tracing::debug!("no citations to convert");
        return Ok(RewriteOutcome::unchanged(document));
    }

    let outcome = rewrite(document, groups, &identifiers, mode);
    tracing::info!(
        groups = identifiers.len(),
        edits = outcome.changed_count,
        "converted citations"
    );
    Ok(outcome)
}

/// Registers footnote tokens already in the document so new identifiers
/// never collide with them.
pub(crate) fn reserve_existing(occurrences: &[CitationOccurrence], pool: &mut IdentifierPool) {
    pool.reserve(
        occurrences
            .iter()
            .filter(|o| !o.key.is_numeric())
            .map(|o| o.key.token().to_string()),
    );
}
