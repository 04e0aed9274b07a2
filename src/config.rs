//! Settings loading.
//!
//! Settings live in a TOML file. Every field has a default, so an empty file
//! (or no file at all) yields a working configuration.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{CiteError, ConfigError, Result};
use crate::grouping::ReferencePolicy;
use crate::identifier::Alphabet;

/// Shortest identifier that can hold one letter and one digit.
pub const MIN_IDENTIFIER_LENGTH: usize = 2;
/// Longest identifier accepted from configuration.
pub const MAX_IDENTIFIER_LENGTH: usize = 32;

/// All user-adjustable settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub identifier: IdentifierSettings,
    pub references: ReferenceSettings,
    pub metadata: MetadataSettings,
}

/// How new footnote identifiers are drawn.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentifierSettings {
    pub length: usize,
    pub alphabet: Alphabet,
    /// Draws allowed per identifier before giving up.
    pub max_attempts: usize,
}

impl Default for IdentifierSettings {
    fn default() -> Self {
        Self {
            length: 6,
            alphabet: Alphabet::Hex,
            max_attempts: 10_000,
        }
    }
}

/// Where reference text ends up after conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceMode {
    /// Rewrite each definition line's label where it stands.
    #[default]
    InPlace,
    /// Move reference text into a generated section at the end of the document.
    Synthesize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReferenceSettings {
    pub mode: ReferenceMode,
    pub fallback: ReferencePolicy,
}

/// Connection details for the metadata extraction service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataSettings {
    /// Empty until configured; extraction fails without it.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// carries an identifier length outside the supported range.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::from)?;
        Self::from_toml_str(&content)
    }

    /// Parses settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content).map_err(ConfigError::from)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let length = self.identifier.length;
        if !(MIN_IDENTIFIER_LENGTH..=MAX_IDENTIFIER_LENGTH).contains(&length) {
            return Err(CiteError::InvalidIdentifierConfig(format!(
                "length must be between {} and {}, got {}",
                MIN_IDENTIFIER_LENGTH, MAX_IDENTIFIER_LENGTH, length
            )));
        }
        if self.identifier.max_attempts == 0 {
            return Err(CiteError::InvalidIdentifierConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
