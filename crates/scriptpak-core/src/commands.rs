// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The container root: composites plus the three entry points.

use std::path::Path;

use scriptpak_ident::{Identifier, Interner};
use tracing::instrument;

use crate::composite::Composite;
use crate::config::ResourceWarnings;
use crate::pak::{read_commands, write_commands, ParseError, SaveError};
use crate::report::Report;

/// The three composites the engine starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    /// Level root.
    Root,
    /// Global singleton composite.
    Global,
    /// Pause-menu composite.
    PauseMenu,
}

impl EntryPoint {
    /// All entry points in header order.
    pub const ALL: [Self; 3] = [Self::Root, Self::Global, Self::PauseMenu];

    /// Header slot of this entry point.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A decoded script container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Commands {
    entry_points: [Identifier; 3],
    composites: Vec<Composite>,
}

impl Commands {
    /// An empty container with unset entry points.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembles a container from decoded parts.
    #[must_use]
    pub const fn from_parts(entry_points: [Identifier; 3], composites: Vec<Composite>) -> Self {
        Self {
            entry_points,
            composites,
        }
    }

    /// Composites in container order.
    #[must_use]
    pub fn composites(&self) -> &[Composite] {
        &self.composites
    }

    /// Mutable composites in container order.
    pub fn composites_mut(&mut self) -> &mut [Composite] {
        &mut self.composites
    }

    /// Composite with identifier `id`.
    #[must_use]
    pub fn composite(&self, id: Identifier) -> Option<&Composite> {
        self.composites.iter().find(|c| c.id == id)
    }

    /// Mutable composite with identifier `id`.
    pub fn composite_mut(&mut self, id: Identifier) -> Option<&mut Composite> {
        self.composites.iter_mut().find(|c| c.id == id)
    }

    /// Composite named `name`.
    #[must_use]
    pub fn composite_by_name(&self, name: &str) -> Option<&Composite> {
        self.composites.iter().find(|c| c.name == name)
    }

    /// Adds a composite, replacing any composite with the same identifier.
    pub fn add_composite(&mut self, composite: Composite) -> &mut Composite {
        let index = match self.composites.iter().position(|c| c.id == composite.id) {
            Some(index) => {
                self.composites[index] = composite;
                index
            }
            None => {
                self.composites.push(composite);
                self.composites.len() - 1
            }
        };
        &mut self.composites[index]
    }

    /// Raw entry-point identifiers in header order.
    #[must_use]
    pub const fn entry_points(&self) -> [Identifier; 3] {
        self.entry_points
    }

    /// Sets an entry point to the composite `id`.
    pub fn set_entry_point(&mut self, which: EntryPoint, id: Identifier) {
        self.entry_points[which.index()] = id;
    }

    /// Composite an entry point names, if it exists.
    #[must_use]
    pub fn entry_point(&self, which: EntryPoint) -> Option<&Composite> {
        self.composite(self.entry_points[which.index()])
    }

    /// Decodes a container held in memory.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] for structurally corrupt input.
    pub fn from_bytes(bytes: &[u8], interner: &mut Interner) -> Result<(Self, Report), ParseError> {
        read_commands(bytes, interner)
    }

    /// Reads and decodes a container file.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Io`] if the file cannot be read, otherwise as
    /// [`Commands::from_bytes`].
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(
        path: impl AsRef<Path>,
        interner: &mut Interner,
    ) -> Result<(Self, Report), ParseError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes, interner)
    }

    /// Applies save-time resource fixups and encodes the container.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError::MissingEntryPoints`] if an entry point is unset
    /// and [`SaveError::InvalidString`] for text the format cannot hold,
    /// both before touching the model, and
    /// [`SaveError::ResourceConfiguration`] for fatal resource setups.
    pub fn to_bytes(
        &mut self,
        interner: &mut Interner,
        warnings: ResourceWarnings,
    ) -> Result<(Vec<u8>, Report), SaveError> {
        write_commands(self, interner, warnings)
    }

    /// Encodes the container and writes it to `path`.
    ///
    /// Nothing is written unless encoding succeeds.
    ///
    /// # Errors
    ///
    /// As [`Commands::to_bytes`], plus [`SaveError::Io`].
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(
        &mut self,
        path: impl AsRef<Path>,
        interner: &mut Interner,
        warnings: ResourceWarnings,
    ) -> Result<Report, SaveError> {
        let (bytes, report) = self.to_bytes(interner, warnings)?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(report)
    }
}
