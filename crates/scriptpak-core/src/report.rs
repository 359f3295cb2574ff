// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recoverable data-quality findings.
//!
//! Every finding is logged through `tracing` when recorded and kept in a
//! [`Report`] so callers can act on it without installing a subscriber.

use std::fmt;

use scriptpak_ident::Identifier;
use tracing::warn;

use crate::resource::ResourceKind;

/// A recoverable finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Resources no entity or parameter claimed after reconciliation.
    TrailingResources {
        /// Composite the resources belong to.
        composite: Identifier,
        /// Number of unclaimed resources.
        count: usize,
    },
    /// A function type that should own a resource of `kind` does not.
    MissingResource {
        /// Owning composite.
        composite: Identifier,
        /// Entity lacking the resource.
        entity: Identifier,
        /// Expected resource kind.
        kind: ResourceKind,
    },
    /// A proxy or alias path does not resolve.
    DanglingPath {
        /// Owning composite.
        composite: Identifier,
        /// Proxy or alias entity.
        entity: Identifier,
    },
    /// Extra data addressed to a proxy was skipped.
    SkippedProxyExtraData {
        /// Owning composite.
        composite: Identifier,
        /// Proxy entity.
        entity: Identifier,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrailingResources { composite, count } => {
                write!(f, "composite {composite}: {count} resource reference(s) left unclaimed")
            }
            Self::MissingResource {
                composite,
                entity,
                kind,
            } => write!(
                f,
                "composite {composite}: entity {entity} has no {} resource",
                kind.tag_name()
            ),
            Self::DanglingPath { composite, entity } => {
                write!(f, "composite {composite}: path of entity {entity} does not resolve")
            }
            Self::SkippedProxyExtraData { composite, entity } => {
                write!(f, "composite {composite}: skipped extra data on proxy {entity}")
            }
        }
    }
}

/// Findings collected by one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Findings in the order they were recorded.
    pub warnings: Vec<Warning>,
}

impl Report {
    /// An empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs and records a finding.
    pub fn push(&mut self, warning: Warning) {
        warn!(%warning, "recoverable data issue");
        self.warnings.push(warning);
    }

    /// Records a finding without logging it.
    ///
    /// For expected conditions the caller already traces at a lower level.
    pub fn record(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Appends another report's findings without logging them again.
    pub fn merge(&mut self, other: Self) {
        self.warnings.extend(other.warnings);
    }

    /// Returns `true` when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Number of findings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.warnings.len()
    }
}
