//! Footnote identifier generation.
//!
//! Identifiers are short lowercase tokens such as `3fa9c1`. Each one contains
//! at least one letter and at least one digit so it can never be mistaken for
//! a plain citation number or an ordinary word.

use std::collections::HashSet;

use serde::Deserialize;
use uuid::Uuid;

use crate::config::IdentifierSettings;
use crate::error::{CiteError, Result};

/// Character set identifiers are drawn from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alphabet {
    /// `0-9a-f`
    #[default]
    Hex,
    /// `0-9a-z`
    Base36,
}

impl Alphabet {
    pub fn symbols(self) -> &'static [u8] {
        match self {
            Alphabet::Hex => b"0123456789abcdef",
            Alphabet::Base36 => b"0123456789abcdefghijklmnopqrstuvwxyz",
        }
    }
}

/// Returns true if `candidate` holds at least one ASCII letter and one ASCII digit.
pub fn is_valid_identifier(candidate: &str) -> bool {
    candidate.bytes().any(|b| b.is_ascii_digit())
        && candidate.bytes().any(|b| b.is_ascii_alphabetic())
}

/// Source of randomness for identifier draws.
pub trait EntropySource {
    fn next_u64(&mut self) -> u64;
}

/// Draws randomness from version 4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidEntropy;

impl EntropySource for UuidEntropy {
    fn next_u64(&mut self) -> u64 {
        let bits = Uuid::new_v4().as_u128();
        (bits >> 64) as u64 ^ bits as u64
    }
}

/// Deterministic xorshift source, for reproducible sessions.
#[derive(Debug, Clone)]
pub struct SeededEntropy {
    state: u64,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        // xorshift never leaves the all-zero state
        let state = if seed == 0 { 0x9e37_79b9_7f4a_7c15 } else { seed };
        Self { state }
    }
}

impl EntropySource for SeededEntropy {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }
}

/// Identifiers issued during one editing session.
///
/// The pool only grows. It is not persisted, so uniqueness holds within a
/// session; identifiers already present in a document can be registered with
/// [`IdentifierPool::reserve`] before issuing new ones.
#[derive(Debug, Clone, Default)]
pub struct IdentifierPool {
    issued: HashSet<String>,
}

impl IdentifierPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.issued.contains(id)
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }

    /// Registers an identifier. Returns false if it was already present.
    pub fn register(&mut self, id: impl Into<String>) -> bool {
        self.issued.insert(id.into())
    }

    /// Registers every identifier in `ids`.
    pub fn reserve<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.issued.extend(ids.into_iter().map(Into::into));
    }
}

/// Issues validated, collision-free identifiers.
#[derive(Debug, Clone)]
pub struct IdentifierGenerator<E = UuidEntropy> {
    alphabet: Alphabet,
    length: usize,
    max_attempts: usize,
    entropy: E,
}

impl IdentifierGenerator<UuidEntropy> {
    pub fn new(settings: &IdentifierSettings) -> Self {
        Self::with_entropy(settings, UuidEntropy)
    }
}

impl<E: EntropySource> IdentifierGenerator<E> {
    pub fn with_entropy(settings: &IdentifierSettings, entropy: E) -> Self {
        Self {
            alphabet: settings.alphabet,
            length: settings.length,
            max_attempts: settings.max_attempts,
            entropy,
        }
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Draws a new identifier and registers it in `pool`.
    ///
    /// Candidates that collide with the pool or fail [`is_valid_identifier`]
    /// are redrawn.
    ///
    /// # Errors
    ///
    /// Returns [`CiteError::ExhaustedIdentifierSpace`] once the configured
    /// number of draws is used up without finding a free identifier.
    pub fn issue(&mut self, pool: &mut IdentifierPool) -> Result<String> {
        for _ in 0..self.max_attempts {
            let candidate = self.draw();
            if is_valid_identifier(&candidate) && pool.register(candidate.clone()) {
                tracing::debug!(id = %candidate, "issued identifier");
                return Ok(candidate);
            }
        }

        tracing::warn!(
            attempts = self.max_attempts,
            pool_size = pool.len(),
            "identifier space exhausted"
        );
        Err(CiteError::ExhaustedIdentifierSpace {
            attempts: self.max_attempts,
        })
    }

    fn draw(&mut self) -> String {
        let symbols = self.alphabet.symbols();
        (0..self.length)
            .map(|_| {
                let index = (self.entropy.next_u64() % symbols.len() as u64) as usize;
                symbols[index] as char
            })
            .collect()
    }
}
