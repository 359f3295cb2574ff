// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bidirectional text/identifier dictionaries.

use std::borrow::Cow;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::{hash_text, IdentError, Identifier};

/// Default number of candidates tried by [`Interner::generate_unique`].
pub const DEFAULT_RANDOM_ATTEMPTS: u32 = 100;

/// A bidirectional text/identifier table.
///
/// When two texts hash to the same identifier, the reverse mapping keeps the
/// text that was inserted first.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    by_text: FxHashMap<String, Identifier>,
    by_id: FxHashMap<Identifier, String>,
}

impl Dictionary {
    /// Creates an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dictionary by hashing every text in `texts`.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dict = Self::new();
        for text in texts {
            let text = text.as_ref();
            dict.insert(text, hash_text(text));
        }
        dict
    }

    /// Records `text <-> id`.
    pub fn insert(&mut self, text: &str, id: Identifier) {
        self.by_text.insert(text.to_owned(), id);
        match self.by_id.get(&id) {
            Some(existing) if existing != text => {
                warn!(%id, existing = %existing, new = %text, "identifier collision, keeping first text");
            }
            Some(_) => {}
            None => {
                self.by_id.insert(id, text.to_owned());
            }
        }
    }

    /// Looks up the identifier recorded for `text`.
    pub fn id_of(&self, text: &str) -> Option<Identifier> {
        self.by_text.get(text).copied()
    }

    /// Looks up the text recorded for `id`.
    pub fn text_of(&self, id: Identifier) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Returns `true` if some text maps to `id`.
    pub fn contains_id(&self, id: Identifier) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Number of distinct texts.
    pub fn len(&self) -> usize {
        self.by_text.len()
    }

    /// Returns `true` when the dictionary holds no entries.
    pub fn is_empty(&self) -> bool {
        self.by_text.is_empty()
    }

    /// Iterates `(text, id)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Identifier)> {
        self.by_text.iter().map(|(t, id)| (t.as_str(), *id))
    }

    /// Decodes a dictionary blob.
    ///
    /// Layout: `count:u32`, then `count` entries of
    /// `(id:[u8;4], len:u32, utf8 bytes)`. Identifiers are taken from the
    /// blob as-is rather than recomputed.
    ///
    /// # Errors
    ///
    /// Returns [`IdentError::TruncatedDictionary`] if the blob ends early and
    /// [`IdentError::InvalidUtf8`] for non-UTF-8 entry text.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentError> {
        let mut offset = 0usize;
        let count = read_u32(bytes, &mut offset)?;
        let mut dict = Self::new();
        for index in 0..count as usize {
            let raw = take(bytes, &mut offset, 4)?;
            let id = Identifier([raw[0], raw[1], raw[2], raw[3]]);
            let len = read_u32(bytes, &mut offset)? as usize;
            let text = take(bytes, &mut offset, len)?;
            let text = std::str::from_utf8(text).map_err(|_| IdentError::InvalidUtf8 { index })?;
            dict.insert(text, id);
        }
        debug!(entries = dict.len(), "decoded identifier dictionary");
        Ok(dict)
    }

    /// Encodes the dictionary in the layout read by [`Dictionary::from_bytes`].
    ///
    /// Entries are sorted by text so equal dictionaries encode identically.
    #[allow(clippy::cast_possible_truncation)] // dictionary sizes are far below u32::MAX
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut entries: Vec<(&str, Identifier)> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        let mut out = Vec::new();
        out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for (text, id) in entries {
            out.extend_from_slice(id.as_bytes());
            out.extend_from_slice(&(text.len() as u32).to_le_bytes());
            out.extend_from_slice(text.as_bytes());
        }
        out
    }
}

fn take<'a>(bytes: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8], IdentError> {
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= bytes.len())
        .ok_or(IdentError::TruncatedDictionary { offset: *offset })?;
    let out = &bytes[*offset..end];
    *offset = end;
    Ok(out)
}

fn read_u32(bytes: &[u8], offset: &mut usize) -> Result<u32, IdentError> {
    let raw = take(bytes, offset, 4)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Session-scoped identifier interner.
///
/// Holds a read-only vanilla dictionary plus a mutable custom cache. Lookups
/// check the custom cache before the vanilla one, so a custom entry shadows a
/// colliding vanilla entry. The interner is an explicit value threaded
/// through load, save and resolution calls; it is not shared global state.
#[derive(Debug, Clone)]
pub struct Interner {
    vanilla: Dictionary,
    custom: Dictionary,
    max_attempts: u32,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    /// Creates an interner with empty dictionaries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_vanilla(Dictionary::new())
    }

    /// Creates an interner backed by a precomputed vanilla dictionary.
    #[must_use]
    pub fn with_vanilla(vanilla: Dictionary) -> Self {
        Self {
            vanilla,
            custom: Dictionary::new(),
            max_attempts: DEFAULT_RANDOM_ATTEMPTS,
        }
    }

    /// Sets the number of candidates [`Interner::generate_unique`] tries.
    pub fn set_max_attempts(&mut self, attempts: u32) {
        self.max_attempts = attempts.max(1);
    }

    /// The vanilla (read-only) dictionary.
    pub fn vanilla(&self) -> &Dictionary {
        &self.vanilla
    }

    /// The custom cache of identifiers generated during this session.
    pub fn custom(&self) -> &Dictionary {
        &self.custom
    }

    /// Returns the identifier for `text`, computing and caching it on first
    /// use.
    pub fn generate(&mut self, text: &str) -> Identifier {
        if let Some(id) = self.lookup(text) {
            return id;
        }
        let id = hash_text(text);
        self.custom.insert(text, id);
        id
    }

    /// Returns the identifier for `text` if it has already been seen.
    pub fn lookup(&self, text: &str) -> Option<Identifier> {
        self.custom
            .id_of(text)
            .or_else(|| self.vanilla.id_of(text))
    }

    /// Returns the text for `id`, if known.
    pub fn find_text_opt(&self, id: Identifier) -> Option<&str> {
        self.custom
            .text_of(id)
            .or_else(|| self.vanilla.text_of(id))
    }

    /// Returns the text for `id`, falling back to its `AA-BB-CC-DD` form.
    pub fn find_text(&self, id: Identifier) -> Cow<'_, str> {
        self.find_text_opt(id)
            .map_or_else(|| Cow::Owned(id.to_string()), Cow::Borrowed)
    }

    /// Returns `true` if `id` is present in either dictionary.
    pub fn is_known(&self, id: Identifier) -> bool {
        self.custom.contains_id(id) || self.vanilla.contains_id(id)
    }

    /// Returns `true` if `text` has an identifier in either dictionary.
    pub fn contains(&self, text: &str) -> bool {
        self.lookup(text).is_some()
    }

    /// Total entries across both dictionaries (shadowed entries count twice).
    pub fn len(&self) -> usize {
        self.custom.len() + self.vanilla.len()
    }

    /// Returns `true` when neither dictionary holds an entry.
    pub fn is_empty(&self) -> bool {
        self.custom.is_empty() && self.vanilla.is_empty()
    }

    /// Generates an identifier that is not already known, starting from
    /// `base` and appending `_1`, `_2`, ... on collision.
    ///
    /// # Errors
    ///
    /// Returns [`IdentError::GenerationExhausted`] once the attempt budget is
    /// spent without finding an unused identifier.
    pub fn generate_unique(&mut self, base: &str) -> Result<Identifier, IdentError> {
        for attempt in 0..self.max_attempts {
            let candidate = if attempt == 0 {
                Cow::Borrowed(base)
            } else {
                Cow::Owned(format!("{base}_{attempt}"))
            };
            let id = hash_text(&candidate);
            if id.is_invalid() || self.is_known(id) {
                continue;
            }
            self.custom.insert(&candidate, id);
            return Ok(id);
        }
        Err(IdentError::GenerationExhausted {
            base: base.to_owned(),
            attempts: self.max_attempts,
        })
    }

    /// Generates a fresh identifier from a random base text.
    ///
    /// # Errors
    ///
    /// See [`Interner::generate_unique`].
    pub fn generate_random(&mut self) -> Result<Identifier, IdentError> {
        let base = format!("{:016x}", rand::random::<u64>());
        self.generate_unique(&base)
    }
}
