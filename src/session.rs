//! User commands over a host document.
//!
//! Every command computes its result fully in memory and only then touches
//! the document, so a failure (exhausted identifiers, an unreachable
//! metadata service) leaves the document exactly as it was.

use crate::config::Settings;
use crate::convert::{convert_groups, convert_one, reserve_existing, ConvertOptions};
use crate::error::{CiteError, Result};
use crate::grouping::{group, CitationGroup};
use crate::host::{offset_of, position_of, DocumentAccess, Notifier};
use crate::identifier::{EntropySource, IdentifierGenerator, IdentifierPool, UuidEntropy};
use crate::metadata::{format_reference_body, validate_url, MetadataExtractor};
use crate::punctuation;
use crate::rewrite::{RewriteMode, RewriteOutcome};
use crate::scanner::{rebase, scan, CitationKey, CitationOccurrence, Role};

/// What a command did. `changed_count == 0` means the document was not touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub changed_count: usize,
}

impl CommandOutcome {
    pub fn changed(&self) -> bool {
        self.changed_count > 0
    }
}

/// One editing session: settings plus the identifiers issued so far.
#[derive(Debug)]
pub struct Session<E = UuidEntropy> {
    settings: Settings,
    generator: IdentifierGenerator<E>,
    pool: IdentifierPool,
}

impl Session<UuidEntropy> {
    pub fn new(settings: Settings) -> Self {
        Self::with_entropy(settings, UuidEntropy)
    }
}

impl<E: EntropySource> Session<E> {
    pub fn with_entropy(settings: Settings, entropy: E) -> Self {
        let generator = IdentifierGenerator::with_entropy(&settings.identifier, entropy);
        Self {
            settings,
            generator,
            pool: IdentifierPool::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn pool(&self) -> &IdentifierPool {
        &self.pool
    }

    fn options(&self) -> ConvertOptions {
        ConvertOptions::from(&self.settings)
    }

    /// Citation groups of the current document, for a listing view.
    pub fn browse(&self, doc: &dyn DocumentAccess) -> Vec<CitationGroup> {
        group(&scan(&doc.text()), self.options().policy)
    }

    /// Converts every numeric citation in the document.
    pub fn convert_all(
        &mut self,
        doc: &mut dyn DocumentAccess,
        notifier: &dyn Notifier,
    ) -> Result<CommandOutcome> {
        let text = doc.text();
        let options = self.options();
        let outcome = report(
            notifier,
            crate::convert::convert_all(&text, &mut self.generator, &mut self.pool, &options),
        )?;
        Ok(commit(doc, notifier, outcome))
    }

    /// Converts every occurrence of one key.
    pub fn convert_one(
        &mut self,
        doc: &mut dyn DocumentAccess,
        key: &CitationKey,
        notifier: &dyn Notifier,
    ) -> Result<CommandOutcome> {
        let text = doc.text();
        let options = self.options();
        let outcome = report(
            notifier,
            convert_one(&text, key, &mut self.generator, &mut self.pool, &options),
        )?;
        Ok(commit(doc, notifier, outcome))
    }

    /// Converts the citation whose marker or definition is under the cursor.
    pub fn convert_at_cursor(
        &mut self,
        doc: &mut dyn DocumentAccess,
        notifier: &dyn Notifier,
    ) -> Result<CommandOutcome> {
        let text = doc.text();
        let cursor = offset_of(&text, doc.cursor());
        let key = scan(&text)
            .into_iter()
            .find(|o| o.byte_offset <= cursor && cursor <= o.end())
            .map(|o| o.key);

        match key {
            Some(key) => self.convert_one(doc, &key, notifier),
            None => {
                notifier.notify("No citation under the cursor");
                Ok(CommandOutcome::default())
            }
        }
    }

    /// Converts a group obtained from an earlier [`Session::browse`].
    ///
    /// The document may have been edited since. The group's markers are
    /// located again in the current text and kept only where the current scan
    /// finds the same key in the same role; definition lines are always taken
    /// from the current text.
    pub fn convert_group(
        &mut self,
        doc: &mut dyn DocumentAccess,
        stale: &CitationGroup,
        notifier: &dyn Notifier,
    ) -> Result<CommandOutcome> {
        let text = doc.text();
        let current = scan(&text);
        let occurrences = current_occurrences(stale, &current, &text);
        if occurrences.is_empty() {
            notifier.notify(&format!("Citation [{}] is no longer in the document", stale.key));
            return Ok(CommandOutcome::default());
        }

        reserve_existing(&current, &mut self.pool);
        let groups = group(&occurrences, self.options().policy);
        let outcome = report(
            notifier,
            convert_groups(
                &text,
                &groups,
                &RewriteMode::ConvertOne(stale.key.clone()),
                &mut self.generator,
                &mut self.pool,
            ),
        )?;
        Ok(commit(doc, notifier, outcome))
    }

    /// Moves punctuation in front of markers and spaces adjacent markers.
    pub fn normalize_punctuation(
        &self,
        doc: &mut dyn DocumentAccess,
        notifier: &dyn Notifier,
    ) -> CommandOutcome {
        let text = doc.text();
        let normalized = punctuation::normalize(&text);
        if normalized == text {
            notifier.notify("Citation punctuation is already normalized");
            return CommandOutcome::default();
        }

        let cursor = doc.cursor();
        doc.set_text(&normalized);
        doc.set_cursor(cursor);
        notifier.notify("Normalized citation punctuation");
        CommandOutcome { changed_count: 1 }
    }

    /// Replaces the selected URL with a new footnote marker and appends a
    /// reference line built from the URL's metadata.
    ///
    /// The metadata is fetched and the new text is built before the document
    /// is written, in a single `set_text`.
    pub fn cite_url(
        &mut self,
        doc: &mut dyn DocumentAccess,
        extractor: &dyn MetadataExtractor,
        notifier: &dyn Notifier,
    ) -> Result<CommandOutcome> {
        let selection = doc.selection();
        let text = doc.text();
        let (id, body) = report(notifier, self.prepare_citation(&selection, &text, extractor))?;

        let (from, to) = doc.selection_bounds();
        let start = offset_of(&text, from);
        let end = offset_of(&text, to).max(start);
        let marker = format!("[^{}]", id);

        let mut updated = format!("{}{}{}", &text[..start], marker, &text[end..]);
        let separator = if updated.ends_with("\n\n") {
            ""
        } else if updated.ends_with('\n') {
            "\n"
        } else {
            "\n\n"
        };
        updated.push_str(&format!("{}[^{}]: {}\n", separator, id, body));

        doc.set_text(&updated);
        doc.set_cursor(position_of(&updated, start + marker.len()));

        notifier.notify(&format!("Added citation [^{}]", id));
        Ok(CommandOutcome { changed_count: 2 })
    }

    fn prepare_citation(
        &mut self,
        selection: &str,
        text: &str,
        extractor: &dyn MetadataExtractor,
    ) -> Result<(String, String)> {
        if selection.trim().is_empty() {
            return Err(CiteError::InvalidUrl {
                url: String::new(),
                reason: "nothing selected".to_string(),
            });
        }
        let url = validate_url(selection)?;
        let metadata = extractor.extract(&url)?;

        reserve_existing(&scan(text), &mut self.pool);
        let id = self.generator.issue(&mut self.pool)?;
        Ok((id, format_reference_body(&metadata)))
    }
}

/// Occurrences of a browsed group that still exist in `text`.
///
/// Only markers are rebased, and each must coincide with a current in-text
/// marker of the same key; a match landing on a definition label is
/// discarded. The key's definition lines come from the current scan, so an
/// edited body is still found.
fn current_occurrences(
    stale: &CitationGroup,
    current: &[CitationOccurrence],
    text: &str,
) -> Vec<CitationOccurrence> {
    let markers: Vec<CitationOccurrence> = stale
        .occurrences
        .iter()
        .filter(|o| o.role == Role::Citation)
        .cloned()
        .collect();
    let mut occurrences: Vec<CitationOccurrence> = rebase(&markers, text)
        .into_iter()
        .filter_map(|o| {
            current
                .iter()
                .find(|c| c.byte_offset == o.byte_offset && c.role == o.role && c.key == o.key)
                .cloned()
        })
        .collect();

    occurrences.extend(
        current
            .iter()
            .filter(|c| c.key == stale.key && c.role == Role::ReferenceDefinition)
            .cloned(),
    );
    occurrences.sort_by_key(|o| o.byte_offset);
    occurrences.dedup_by_key(|o| o.byte_offset);
    occurrences
}

/// Surfaces an error to the user before handing it back.
fn report<T>(notifier: &dyn Notifier, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        tracing::warn!(error = %e, "command failed");
        notifier.notify(&format!("Error: {}", e));
    }
    result
}

/// Writes a rewrite back to the document in one call.
fn commit(doc: &mut dyn DocumentAccess, notifier: &dyn Notifier, outcome: RewriteOutcome) -> CommandOutcome {
    if !outcome.changed() {
        notifier.notify("No citations to convert");
        return CommandOutcome::default();
    }

    let cursor = doc.cursor();
    doc.set_text(&outcome.document);
    doc.set_cursor(cursor);
    notifier.notify(&format!(
        "Converted {} citation occurrence(s)",
        outcome.changed_count
    ));
    CommandOutcome {
        changed_count: outcome.changed_count,
    }
}
