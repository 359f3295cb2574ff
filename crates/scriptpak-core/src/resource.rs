// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Resource references binding engine assets to entities.

use once_cell::sync::Lazy;
use scriptpak_ident::{hash_text, Identifier};

use crate::param::Vec3;
use crate::pak::types::{f32_from_le, f32_le, ResourceRow};

/// Filler for kind-specific words a resource kind does not use.
const UNUSED_WORD: u32 = 0xFFFF_FFFF;

/// Kind of asset a [`ResourceReference`] binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    /// Renderable model instance range.
    RenderableInstance,
    /// Collision mapping.
    CollisionMapping,
    /// Animated model.
    AnimatedModel,
    /// Dynamic physics system.
    DynamicPhysicsSystem,
    /// Exclusive-master state.
    ExclusiveMasterState,
    /// Navigation-mesh barrier.
    NavMeshBarrier,
    /// Traversal segment.
    TraversalSegment,
}

static KIND_TAGS: Lazy<[(ResourceKind, Identifier); 7]> = Lazy::new(|| {
    ResourceKind::ALL.map(|kind| (kind, hash_text(kind.tag_name())))
});

impl ResourceKind {
    /// Every kind.
    pub const ALL: [Self; 7] = [
        Self::RenderableInstance,
        Self::CollisionMapping,
        Self::AnimatedModel,
        Self::DynamicPhysicsSystem,
        Self::ExclusiveMasterState,
        Self::NavMeshBarrier,
        Self::TraversalSegment,
    ];

    /// Text whose identifier tags this kind on disk.
    #[must_use]
    pub const fn tag_name(self) -> &'static str {
        match self {
            Self::RenderableInstance => "RENDERABLE_INSTANCE",
            Self::CollisionMapping => "COLLISION_MAPPING",
            Self::AnimatedModel => "ANIMATED_MODEL",
            Self::DynamicPhysicsSystem => "DYNAMIC_PHYSICS_SYSTEM",
            Self::ExclusiveMasterState => "EXCLUSIVE_MASTER_STATE_RESOURCE",
            Self::NavMeshBarrier => "NAV_MESH_BARRIER_RESOURCE",
            Self::TraversalSegment => "TRAVERSAL_SEGMENT",
        }
    }

    /// On-disk tag identifier.
    pub fn tag(self) -> Identifier {
        KIND_TAGS[self as usize].1
    }

    /// Looks a kind up by its on-disk tag.
    pub fn from_tag(tag: Identifier) -> Option<Self> {
        KIND_TAGS
            .iter()
            .find(|(_, id)| *id == tag)
            .map(|(kind, _)| *kind)
    }
}

/// Kind plus the kind-specific trailing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceData {
    /// Index and count into the renderable instance table.
    RenderableInstance {
        /// First instance.
        index: i32,
        /// Number of instances.
        count: i32,
    },
    /// Index into the collision map plus the collision entity.
    CollisionMapping {
        /// Collision map index.
        index: i32,
        /// Entity the mapping belongs to.
        entity: Identifier,
    },
    /// Index into the animated model table.
    AnimatedModel {
        /// Model index.
        index: i32,
    },
    /// Index into the physics system table.
    DynamicPhysicsSystem {
        /// System index.
        index: i32,
    },
    /// No trailing data.
    ExclusiveMasterState,
    /// No trailing data.
    NavMeshBarrier,
    /// No trailing data.
    TraversalSegment,
}

impl ResourceData {
    /// The kind this data belongs to.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::RenderableInstance { .. } => ResourceKind::RenderableInstance,
            Self::CollisionMapping { .. } => ResourceKind::CollisionMapping,
            Self::AnimatedModel { .. } => ResourceKind::AnimatedModel,
            Self::DynamicPhysicsSystem { .. } => ResourceKind::DynamicPhysicsSystem,
            Self::ExclusiveMasterState => ResourceKind::ExclusiveMasterState,
            Self::NavMeshBarrier => ResourceKind::NavMeshBarrier,
            Self::TraversalSegment => ResourceKind::TraversalSegment,
        }
    }

    /// Default trailing data for a newly created resource of `kind`.
    ///
    /// Collision mappings are bound to `owner`.
    #[must_use]
    pub const fn default_for(kind: ResourceKind, owner: Identifier) -> Self {
        match kind {
            ResourceKind::RenderableInstance => Self::RenderableInstance { index: 0, count: 1 },
            ResourceKind::CollisionMapping => Self::CollisionMapping {
                index: 0,
                entity: owner,
            },
            ResourceKind::AnimatedModel => Self::AnimatedModel { index: 0 },
            ResourceKind::DynamicPhysicsSystem => Self::DynamicPhysicsSystem { index: 0 },
            ResourceKind::ExclusiveMasterState => Self::ExclusiveMasterState,
            ResourceKind::NavMeshBarrier => Self::NavMeshBarrier,
            ResourceKind::TraversalSegment => Self::TraversalSegment,
        }
    }

    #[allow(clippy::cast_sign_loss)] // indices are stored as raw words
    const fn words(&self) -> (u32, u32) {
        match *self {
            Self::RenderableInstance { index, count } => (index as u32, count as u32),
            Self::CollisionMapping { index, entity } => (index as u32, entity.to_u32()),
            Self::AnimatedModel { index } | Self::DynamicPhysicsSystem { index } => {
                (index as u32, UNUSED_WORD)
            }
            Self::ExclusiveMasterState | Self::NavMeshBarrier | Self::TraversalSegment => {
                (UNUSED_WORD, UNUSED_WORD)
            }
        }
    }

    #[allow(clippy::cast_possible_wrap)] // indices are stored as raw words
    const fn from_words(kind: ResourceKind, a: u32, b: u32) -> Self {
        match kind {
            ResourceKind::RenderableInstance => Self::RenderableInstance {
                index: a as i32,
                count: b as i32,
            },
            ResourceKind::CollisionMapping => Self::CollisionMapping {
                index: a as i32,
                entity: Identifier::from_u32(b),
            },
            ResourceKind::AnimatedModel => Self::AnimatedModel { index: a as i32 },
            ResourceKind::DynamicPhysicsSystem => Self::DynamicPhysicsSystem { index: a as i32 },
            ResourceKind::ExclusiveMasterState => Self::ExclusiveMasterState,
            ResourceKind::NavMeshBarrier => Self::NavMeshBarrier,
            ResourceKind::TraversalSegment => Self::TraversalSegment,
        }
    }
}

/// A resource binding: placement, owner and kind-specific data.
///
/// `owner` is either the owning entity's identifier or the identifier held by
/// a RESOURCE parameter; reconciliation matches on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceReference {
    /// Placement position.
    pub position: Vec3,
    /// Placement rotation.
    pub rotation: Vec3,
    /// Owning entity or resource parameter identifier.
    pub owner: Identifier,
    /// Kind and trailing fields.
    pub data: ResourceData,
}

impl ResourceReference {
    /// Creates a reference of `kind` at the origin with default trailing
    /// fields.
    #[must_use]
    pub const fn new(owner: Identifier, kind: ResourceKind) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            owner,
            data: ResourceData::default_for(kind, owner),
        }
    }

    /// Kind of this reference.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.data.kind()
    }

    /// Decodes a row, returning `None` for an unknown kind tag.
    pub(crate) fn from_row(row: &ResourceRow) -> Option<Self> {
        let kind = ResourceKind::from_tag(row.kind)?;
        Some(Self {
            position: Vec3::from_le_words(row.position_le),
            rotation: Vec3::from_le_words(row.rotation_le),
            owner: row.owner,
            data: ResourceData::from_words(
                kind,
                u32::from_le(row.word_a_le),
                u32::from_le(row.word_b_le),
            ),
        })
    }

    /// Encodes the on-disk row.
    pub(crate) fn to_row(&self) -> ResourceRow {
        let (a, b) = self.data.words();
        ResourceRow {
            position_le: self.position.to_le_words(),
            rotation_le: self.rotation.to_le_words(),
            owner: self.owner,
            kind: self.kind().tag(),
            word_a_le: a.to_le(),
            word_b_le: b.to_le(),
        }
    }
}

impl Vec3 {
    const fn from_le_words(raw: [u32; 3]) -> Self {
        Self::new(f32_from_le(raw[0]), f32_from_le(raw[1]), f32_from_le(raw[2]))
    }

    const fn to_le_words(self) -> [u32; 3] {
        [f32_le(self.x), f32_le(self.y), f32_le(self.z)]
    }
}
