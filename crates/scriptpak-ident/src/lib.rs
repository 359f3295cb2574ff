// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Content-addressed identifiers for script containers.
//!
//! Every named thing inside a script container (composites, entities,
//! parameters, pins, function types, data-type tags) is keyed by a 4-byte
//! [`Identifier`]. Identifiers are derived from text by a fixed two-pass
//! SHA-1 construction (see [`hash_text`]) and are not reversible; the
//! [`Interner`] keeps the text side of the mapping.
//!
//! # Hash construction
//!
//! 1. `d1 = SHA1(utf8(text))`
//! 2. `mid = d1[0..16]` with every 4-byte group byte-reversed
//! 3. `d2 = SHA1(upper_hex(mid))`
//! 4. identifier = `d2[0..4]`
//!
//! The construction is part of the container format. Changing any step
//! produces identifiers the engine will not recognise.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::module_name_repetitions
)]

mod interner;

pub use interner::{Dictionary, Interner, DEFAULT_RANDOM_ATTEMPTS};

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use bytemuck::{Pod, Zeroable};
use sha1::{Digest, Sha1};
use thiserror::Error;

/// Opaque 4-byte handle naming an item in a script container.
///
/// Equality is by value. Ordering follows the little-endian `u32` reading of
/// the bytes, which is the order the container writer sorts by.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Identifier(pub [u8; 4]);

impl Identifier {
    /// The reserved all-zero identifier denoting absence.
    ///
    /// Hierarchy paths are terminated by this value.
    pub const INVALID: Self = Self([0; 4]);

    /// Wraps raw identifier bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Returns the raw identifier bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Interprets the identifier as a little-endian `u32`.
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Builds an identifier from its little-endian `u32` value.
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_le_bytes())
    }

    /// Returns `true` for the reserved all-zero sentinel.
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.to_u32() == 0
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_u32().cmp(&other.to_u32())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a:02X}-{b:02X}-{c:02X}-{d:02X}")
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({self})")
    }
}

impl FromStr for Identifier {
    type Err = IdentError;

    /// Parses the `AA-BB-CC-DD` display form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || IdentError::Malformed(s.to_owned());
        let mut bytes = [0u8; 4];
        let mut parts = s.split('-');
        for slot in &mut bytes {
            let part = parts.next().ok_or_else(malformed)?;
            if part.len() != 2 {
                return Err(malformed());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| malformed())?;
        }
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(Self(bytes))
    }
}

/// Errors produced by identifier generation and dictionary decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentError {
    /// Every suffixed candidate collided with an already-known identifier.
    #[error("identifier generation exhausted after {attempts} attempts from base {base:?}")]
    GenerationExhausted {
        /// Base text the candidates were derived from.
        base: String,
        /// Number of candidates tried.
        attempts: u32,
    },
    /// Text did not match the `AA-BB-CC-DD` form.
    #[error("malformed identifier text {0:?}")]
    Malformed(String),
    /// Dictionary blob ended in the middle of an entry.
    #[error("dictionary blob truncated at byte {offset}")]
    TruncatedDictionary {
        /// Byte offset where more data was expected.
        offset: usize,
    },
    /// Dictionary entry text was not UTF-8.
    #[error("dictionary entry {index} is not valid UTF-8")]
    InvalidUtf8 {
        /// Entry index within the blob.
        index: usize,
    },
}

/// Computes the identifier for `text` with the container's double hash.
///
/// This is a pure function; use [`Interner::generate`] to also remember the
/// text for reverse lookup.
pub fn hash_text(text: &str) -> Identifier {
    let first = Sha1::digest(text.as_bytes());
    let mut swapped = [0u8; 16];
    for (dst, src) in swapped.chunks_exact_mut(4).zip(first[..16].chunks_exact(4)) {
        for (d, s) in dst.iter_mut().zip(src.iter().rev()) {
            *d = *s;
        }
    }
    let second = Sha1::digest(hex::encode_upper(swapped).as_bytes());
    Identifier([second[0], second[1], second[2], second[3]])
}
