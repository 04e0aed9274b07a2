//! Error types for cite-footnotes.

use thiserror::Error;

/// Result type alias for this library.
pub type Result<T> = std::result::Result<T, CiteError>;

/// Errors that can occur while converting citations.
///
/// "Nothing to do" is not an error: operations report that through
/// `changed_count` on their outcome instead.
#[derive(Error, Debug)]
pub enum CiteError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Metadata extraction failed: {0}")]
    MetadataFetchFailed(String),

    #[error("Could not issue a unique identifier after {attempts} attempts")]
    ExhaustedIdentifierSpace { attempts: usize },

    #[error("Invalid identifier settings: {0}")]
    InvalidIdentifierConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that can occur when loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    TomlError(#[from] toml::de::Error),
}
