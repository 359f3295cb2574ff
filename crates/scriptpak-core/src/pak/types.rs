// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixed-size rows of the script container.
//!
//! Every row is `#[repr(C)]`, built from 4-byte fields only, and derives
//! `bytemuck::Pod` so it can be copied out of (and into) the container
//! buffer without hand-written field shuffling. Integer fields are stored
//! little-endian; the `_le` suffix marks fields that must go through the
//! accessors.

use bytemuck::{Pod, Zeroable};
use scriptpak_ident::Identifier;

/// Number of per-composite data blocks.
pub const BLOCK_COUNT: usize = 13;

/// The per-composite data blocks, in on-disk order.
///
/// Slot names follow the engine's own naming. Two of them do not describe
/// their content: [`DataBlock::TriggerSequenceData`] holds animation tracks
/// and [`DataBlock::CageAnimationData`] holds trigger sequences. The swap is
/// part of the format and is kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataBlock {
    /// Composite identifier and reserved word, preceded by the name.
    CompositeHeader,
    /// Outgoing links per entity.
    EntityConnections,
    /// Parameter references per entity.
    EntityParameters,
    /// Alias hierarchy paths.
    EntityOverrides,
    /// Alias checksums.
    EntityOverridesChecksum,
    /// Composite-level variables.
    CompositeExposedParameters,
    /// Proxy hierarchy paths.
    EntityProxies,
    /// Function entity identifiers and types.
    EntityFunctions,
    /// Resource references.
    ResourceReferences,
    /// Animation track data (slot name is swapped).
    TriggerSequenceData,
    /// Trigger-sequence data (slot name is swapped).
    CageAnimationData,
    /// Always empty.
    Unused,
    /// Opaque pair kept for round-trips.
    UnknownCounts,
}

impl DataBlock {
    /// All blocks in on-disk order.
    pub const ALL: [Self; BLOCK_COUNT] = [
        Self::CompositeHeader,
        Self::EntityConnections,
        Self::EntityParameters,
        Self::EntityOverrides,
        Self::EntityOverridesChecksum,
        Self::CompositeExposedParameters,
        Self::EntityProxies,
        Self::EntityFunctions,
        Self::ResourceReferences,
        Self::TriggerSequenceData,
        Self::CageAnimationData,
        Self::Unused,
        Self::UnknownCounts,
    ];

    /// Position of this block within a composite record.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Diagnostic name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CompositeHeader => "COMPOSITE_HEADER",
            Self::EntityConnections => "ENTITY_CONNECTIONS",
            Self::EntityParameters => "ENTITY_PARAMETERS",
            Self::EntityOverrides => "ENTITY_OVERRIDES",
            Self::EntityOverridesChecksum => "ENTITY_OVERRIDES_CHECKSUM",
            Self::CompositeExposedParameters => "COMPOSITE_EXPOSED_PARAMETERS",
            Self::EntityProxies => "ENTITY_PROXIES",
            Self::EntityFunctions => "ENTITY_FUNCTIONS",
            Self::ResourceReferences => "RESOURCE_REFERENCES",
            Self::TriggerSequenceData => "TRIGGERSEQUENCE_DATA",
            Self::CageAnimationData => "CAGEANIMATION_DATA",
            Self::Unused => "UNUSED",
            Self::UnknownCounts => "UNKNOWN_COUNTS",
        }
    }
}

/// Slice descriptor: word offset of the first element and element count.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct OffsetPair {
    /// Offset in 4-byte words from the start of the container.
    pub offset_words_le: u32,
    /// Number of elements.
    pub count_le: u32,
}

const _: () = assert!(std::mem::size_of::<OffsetPair>() == 8);

impl OffsetPair {
    /// Builds a pair from a word offset and a count.
    #[must_use]
    pub const fn new(offset_words: u32, count: u32) -> Self {
        Self {
            offset_words_le: offset_words.to_le(),
            count_le: count.to_le(),
        }
    }

    /// Word offset (converting from little-endian).
    #[must_use]
    pub const fn offset_words(&self) -> u32 {
        u32::from_le(self.offset_words_le)
    }

    /// Byte offset of the first element.
    #[must_use]
    pub const fn byte_offset(&self) -> usize {
        self.offset_words() as usize * 4
    }

    /// Element count (converting from little-endian).
    #[must_use]
    pub const fn count(&self) -> u32 {
        u32::from_le(self.count_le)
    }
}

/// Container header (28 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct FileHeader {
    /// Root, global and pause-menu composite identifiers.
    pub entry_points: [Identifier; 3],
    /// Word offset of the parameter offset table.
    pub parameter_table_le: u32,
    /// Number of parameters.
    pub parameter_count_le: u32,
    /// Word offset of the composite offset table.
    pub composite_table_le: u32,
    /// Number of composites.
    pub composite_count_le: u32,
}

const _: () = assert!(std::mem::size_of::<FileHeader>() == 28);

impl FileHeader {
    /// Parameter table location.
    #[must_use]
    pub const fn parameters(&self) -> OffsetPair {
        OffsetPair {
            offset_words_le: self.parameter_table_le,
            count_le: self.parameter_count_le,
        }
    }

    /// Composite table location.
    #[must_use]
    pub const fn composites(&self) -> OffsetPair {
        OffsetPair {
            offset_words_le: self.composite_table_le,
            count_le: self.composite_count_le,
        }
    }
}

/// Trailing per-composite record (112 bytes): reserved word, the 13 block
/// descriptors, then the composite identifier.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct CompositeRecord {
    /// Always zero.
    pub reserved_le: u32,
    /// Block descriptors in [`DataBlock::ALL`] order.
    pub blocks: [OffsetPair; BLOCK_COUNT],
    /// Composite identifier.
    pub id: Identifier,
}

const _: () = assert!(std::mem::size_of::<CompositeRecord>() == 112);

impl CompositeRecord {
    /// Descriptor for `block`.
    #[must_use]
    pub const fn block(&self, block: DataBlock) -> OffsetPair {
        self.blocks[block.index()]
    }
}

/// Uniform directory row: owner plus a slice of a payload stored elsewhere.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DirectoryRow {
    /// Owning entity.
    pub owner: Identifier,
    /// Word offset of the payload.
    pub offset_words_le: u32,
    /// Payload element count.
    pub count_le: u32,
}

const _: () = assert!(std::mem::size_of::<DirectoryRow>() == 12);

impl DirectoryRow {
    /// Builds a row.
    #[must_use]
    pub const fn new(owner: Identifier, offset_words: u32, count: u32) -> Self {
        Self {
            owner,
            offset_words_le: offset_words.to_le(),
            count_le: count.to_le(),
        }
    }

    /// Payload slice.
    #[must_use]
    pub const fn payload(&self) -> OffsetPair {
        OffsetPair {
            offset_words_le: self.offset_words_le,
            count_le: self.count_le,
        }
    }
}

/// One link (16 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct LinkRow {
    /// Link identifier.
    pub link_id: Identifier,
    /// Pin on the owning entity.
    pub source_pin: Identifier,
    /// Pin on the target entity.
    pub target_pin: Identifier,
    /// Target entity.
    pub target: Identifier,
}

const _: () = assert!(std::mem::size_of::<LinkRow>() == 16);

/// Parameter reference (8 bytes): name plus word offset of the shared value.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ParameterRefRow {
    /// Parameter name.
    pub name: Identifier,
    /// Word offset of the value in the parameter region.
    pub offset_words_le: u32,
}

const _: () = assert!(std::mem::size_of::<ParameterRefRow>() == 8);

impl ParameterRefRow {
    /// Word offset (converting from little-endian).
    #[must_use]
    pub const fn offset_words(&self) -> u32 {
        u32::from_le(self.offset_words_le)
    }
}

/// Alias checksum (8 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ChecksumRow {
    /// Alias entity.
    pub alias: Identifier,
    /// Path checksum.
    pub checksum: Identifier,
}

const _: () = assert!(std::mem::size_of::<ChecksumRow>() == 8);

/// Composite variable (12 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct VariableRow {
    /// Entity identifier.
    pub id: Identifier,
    /// Variable name.
    pub name: Identifier,
    /// Data-type tag.
    pub data_type: Identifier,
}

const _: () = assert!(std::mem::size_of::<VariableRow>() == 12);

/// Proxy (20 bytes). The identifier is stored twice; a mismatch means the
/// block is corrupt.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ProxyRow {
    /// Entity identifier.
    pub id: Identifier,
    /// Word offset of the hierarchy path.
    pub path_offset_le: u32,
    /// Hierarchy path length.
    pub path_count_le: u32,
    /// Repeat of `id`.
    pub id_check: Identifier,
    /// Disambiguator for repeated proxying.
    pub extra: Identifier,
}

const _: () = assert!(std::mem::size_of::<ProxyRow>() == 20);

impl ProxyRow {
    /// Hierarchy path slice.
    #[must_use]
    pub const fn path(&self) -> OffsetPair {
        OffsetPair {
            offset_words_le: self.path_offset_le,
            count_le: self.path_count_le,
        }
    }
}

/// Function entity (8 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct FunctionRow {
    /// Entity identifier.
    pub id: Identifier,
    /// Built-in function type or instanced composite.
    pub function: Identifier,
}

const _: () = assert!(std::mem::size_of::<FunctionRow>() == 8);

/// Resource reference (40 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ResourceRow {
    /// Position as little-endian `f32` bits.
    pub position_le: [u32; 3],
    /// Rotation as little-endian `f32` bits.
    pub rotation_le: [u32; 3],
    /// Owning entity or resource parameter identifier.
    pub owner: Identifier,
    /// Resource-kind tag.
    pub kind: Identifier,
    /// First kind-specific word.
    pub word_a_le: u32,
    /// Second kind-specific word.
    pub word_b_le: u32,
}

const _: () = assert!(std::mem::size_of::<ResourceRow>() == 40);

/// Shared row for both extra-data blocks (20 bytes): owning entity plus two
/// payload slices (tracks/events or triggers/events).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ExtraDataRow {
    /// Owning entity.
    pub entity: Identifier,
    /// First payload slice.
    pub first: OffsetPair,
    /// Event-marker slice.
    pub events: OffsetPair,
}

const _: () = assert!(std::mem::size_of::<ExtraDataRow>() == 20);

/// Animation track (16 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TrackRow {
    /// Track identifier.
    pub id: Identifier,
    /// Animated parameter.
    pub parameter: Identifier,
    /// Keyframe slice.
    pub keys: OffsetPair,
}

const _: () = assert!(std::mem::size_of::<TrackRow>() == 16);

/// Keyframe (8 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct KeyRow {
    /// Time as little-endian `f32` bits.
    pub time_le: u32,
    /// Value as little-endian `f32` bits.
    pub value_le: u32,
}

const _: () = assert!(std::mem::size_of::<KeyRow>() == 8);

/// Event marker (8 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct EventRow {
    /// Time as little-endian `f32` bits.
    pub time_le: u32,
    /// Event name.
    pub name: Identifier,
}

const _: () = assert!(std::mem::size_of::<EventRow>() == 8);

/// Trigger (12 bytes): time plus the triggered entity's hierarchy path.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TriggerRow {
    /// Time as little-endian `f32` bits.
    pub time_le: u32,
    /// Hierarchy path slice.
    pub path: OffsetPair,
}

const _: () = assert!(std::mem::size_of::<TriggerRow>() == 12);

/// Packs an `f32` into a little-endian row field.
#[must_use]
pub const fn f32_le(value: f32) -> u32 {
    value.to_bits().to_le()
}

/// Unpacks an `f32` from a little-endian row field.
#[must_use]
pub const fn f32_from_le(raw: u32) -> f32 {
    f32::from_bits(u32::from_le(raw))
}
