// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Codec configuration and lookup-table loading.

use std::path::{Path, PathBuf};

use scriptpak_ident::{Dictionary, IdentError, Interner, DEFAULT_RANDOM_ATTEMPTS};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::functions::{FunctionTypeTable, TableError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading the config or a table blob.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Config JSON did not deserialize.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The string dictionary blob is malformed.
    #[error("dictionary: {0}")]
    Dictionary(#[from] IdentError),
    /// The function-type blob is malformed.
    #[error("function table: {0}")]
    FunctionTable(#[from] TableError),
}

/// Whether save reports entities missing a resource they should own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceWarnings {
    /// Record a warning.
    #[default]
    Warn,
    /// Stay silent.
    Ignore,
}

/// Codec settings, usually read from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Vanilla string dictionary blob.
    pub dictionary: Option<PathBuf>,
    /// Function-type metadata blob.
    pub function_table: Option<PathBuf>,
    /// Candidates tried when generating a unique identifier.
    pub random_id_attempts: u32,
    /// Save-time handling of missing expected resources.
    pub resource_policy: ResourceWarnings,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            dictionary: None,
            function_table: None,
            random_id_attempts: DEFAULT_RANDOM_ATTEMPTS,
            resource_policy: ResourceWarnings::default(),
        }
    }
}

impl CodecConfig {
    /// Parses a config from JSON bytes. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serde`] for invalid JSON.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Reads and parses a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Serde`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_slice(&std::fs::read(path)?)
    }

    /// Builds the interner and function-type table the config points at.
    ///
    /// Unset paths yield empty tables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a blob cannot be read or decoded.
    pub fn load_tables(&self) -> Result<(Interner, FunctionTypeTable), ConfigError> {
        let vanilla = match &self.dictionary {
            Some(path) => Dictionary::from_bytes(&std::fs::read(path)?)?,
            None => Dictionary::new(),
        };
        let table = match &self.function_table {
            Some(path) => FunctionTypeTable::from_bytes(&std::fs::read(path)?)?,
            None => FunctionTypeTable::new(),
        };
        debug!(
            vanilla = vanilla.len(),
            function_types = table.len(),
            "loaded lookup tables"
        );
        let mut interner = Interner::with_vanilla(vanilla);
        interner.set_max_attempts(self.random_id_attempts);
        Ok((interner, table))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_takes_defaults() {
        let config = CodecConfig::from_json_slice(b"{}").unwrap();
        assert_eq!(config, CodecConfig::default());
        assert_eq!(config.random_id_attempts, DEFAULT_RANDOM_ATTEMPTS);
    }

    #[test]
    fn policy_parses_snake_case() {
        let config =
            CodecConfig::from_json_slice(br#"{"resource_policy":"ignore","random_id_attempts":5}"#)
                .unwrap();
        assert_eq!(config.resource_policy, ResourceWarnings::Ignore);
        assert_eq!(config.random_id_attempts, 5);
    }

    #[test]
    fn unset_paths_yield_empty_tables() {
        let (interner, table) = CodecConfig::default().load_tables().unwrap();
        assert!(interner.is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn bad_json_is_a_serde_error() {
        assert!(matches!(
            CodecConfig::from_json_slice(b"{"),
            Err(ConfigError::Serde(_))
        ));
    }
}
