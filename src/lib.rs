//! cite-footnotes: convert numbered citations in Markdown documents into footnotes.
//!
//! This library provides functionality to:
//! - Scan a document for citation markers (`[1]`, `[^a1b2]`) and their reference definitions
//! - Group occurrences by citation and resolve each citation's reference text
//! - Issue short, unique footnote identifiers
//! - Rewrite markers and definitions into footnote syntax (`[^id]`, `[^id]: text`)
//! - Normalize marker placement around punctuation
//! - Format reference text from URL metadata

pub mod config;
pub mod convert;
pub mod error;
pub mod grouping;
pub mod host;
pub mod identifier;
pub mod metadata;
pub mod punctuation;
pub mod rewrite;
pub mod scanner;
pub mod session;

pub use config::{ReferenceMode, Settings};
pub use convert::{convert_all, convert_groups, convert_one, ConvertOptions};
pub use error::{CiteError, ConfigError, Result};
pub use grouping::{group, CitationGroup, ReferencePolicy};
pub use host::{BufferDocument, DocumentAccess, Notifier, Position, RecordingNotifier, TracingNotifier};
pub use identifier::{
    is_valid_identifier, Alphabet, EntropySource, IdentifierGenerator, IdentifierPool,
    SeededEntropy, UuidEntropy,
};
pub use metadata::{
    format_reference_body, validate_url, CitationMetadata, HttpMetadataExtractor,
    MetadataExtractor,
};
pub use punctuation::{
    assure_spacing_between_adjacent_markers, move_markers_behind_punctuation, normalize,
};
pub use rewrite::{rewrite, RewriteMode, RewriteOutcome, RewritePlan, TextEdit};
pub use scanner::{rebase, scan, CitationKey, CitationOccurrence, Role};
pub use session::{CommandOutcome, Session};
