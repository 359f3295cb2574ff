// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Function-type metadata: parameter descriptors per variant and the base
//! type chain.
//!
//! # Blob layout
//!
//! ```text
//! count:u32
//! count × { type:Identifier, base:Identifier (zero = none), offsets:[u32; 7] }
//! descriptor stream
//! ```
//!
//! Each offset is a byte offset into the descriptor stream (`0xFFFF_FFFF`
//! when the variant has no descriptors). At an offset the stream holds
//! `count:u32` followed by `count × { name, data type tag, enum type }`.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use scriptpak_ident::Identifier;
use thiserror::Error;

use crate::param::DataType;

const NO_DESCRIPTORS: u32 = 0xFFFF_FFFF;

/// Pin classification of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParameterVariant {
    /// Input pin.
    InputPin,
    /// Output pin.
    OutputPin,
    /// Plain state parameter.
    StateParameter,
    /// Callable method pin.
    MethodPin,
    /// Target pin.
    TargetPin,
    /// Reference pin.
    ReferencePin,
    /// Relay.
    Relay,
}

impl ParameterVariant {
    /// Every variant in blob order.
    pub const ALL: [Self; 7] = [
        Self::InputPin,
        Self::OutputPin,
        Self::StateParameter,
        Self::MethodPin,
        Self::TargetPin,
        Self::ReferencePin,
        Self::Relay,
    ];

    /// Single-bit mask for this variant.
    #[must_use]
    pub const fn mask(self) -> ParameterVariants {
        ParameterVariants(1 << self as u8)
    }
}

/// Set of [`ParameterVariant`]s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParameterVariants(u8);

impl ParameterVariants {
    /// No variants.
    pub const NONE: Self = Self(0);
    /// Every variant.
    pub const ALL: Self = Self(0x7F);
    /// Input pins.
    pub const INPUT_PIN: Self = ParameterVariant::InputPin.mask();
    /// Output pins.
    pub const OUTPUT_PIN: Self = ParameterVariant::OutputPin.mask();
    /// State parameters.
    pub const STATE_PARAMETER: Self = ParameterVariant::StateParameter.mask();
    /// Method pins.
    pub const METHOD_PIN: Self = ParameterVariant::MethodPin.mask();
    /// Target pins.
    pub const TARGET_PIN: Self = ParameterVariant::TargetPin.mask();
    /// Reference pins.
    pub const REFERENCE_PIN: Self = ParameterVariant::ReferencePin.mask();
    /// Relays.
    pub const RELAY: Self = ParameterVariant::Relay.mask();

    /// Union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if `variant` is in the set.
    #[must_use]
    pub const fn contains(self, variant: ParameterVariant) -> bool {
        self.0 & variant.mask().0 != 0
    }

    /// Returns `true` for the empty set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Variants in the set, in blob order.
    pub fn iter(self) -> impl Iterator<Item = ParameterVariant> {
        ParameterVariant::ALL
            .into_iter()
            .filter(move |v| self.contains(*v))
    }
}

impl std::ops::BitOr for ParameterVariants {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for ParameterVariants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// One parameter a function type declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// Parameter name.
    pub name: Identifier,
    /// Value type.
    pub data_type: DataType,
    /// Enum type for [`DataType::Enum`] parameters, zero otherwise.
    pub enum_type: Identifier,
}

impl ParameterDescriptor {
    /// Descriptor for a non-enum parameter.
    #[must_use]
    pub const fn new(name: Identifier, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            enum_type: Identifier::INVALID,
        }
    }

    /// Descriptor for an enum parameter.
    #[must_use]
    pub const fn with_enum(name: Identifier, enum_type: Identifier) -> Self {
        Self {
            name,
            data_type: DataType::Enum,
            enum_type,
        }
    }
}

/// Errors decoding or assembling a function-type table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// Blob ended before a record or descriptor was complete.
    #[error("function table truncated at byte {offset}")]
    Truncated {
        /// Byte offset where more data was expected.
        offset: usize,
    },
    /// A descriptor carried an unrecognised data-type tag.
    #[error("function table descriptor at byte {offset} has unknown data type {tag}")]
    UnknownDataType {
        /// Unrecognised tag.
        tag: Identifier,
        /// Byte offset of the descriptor.
        offset: usize,
    },
    /// A type names a base that is not in the table.
    #[error("function type {ty} has unknown base {base}")]
    DanglingBase {
        /// Derived type.
        ty: Identifier,
        /// Missing base.
        base: Identifier,
    },
    /// Following base links from a type returns to it.
    #[error("function type {ty} inherits from itself")]
    Cycle {
        /// Type on the cycle.
        ty: Identifier,
    },
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct TypeRecord {
    ty: Identifier,
    base: Identifier,
    offsets_le: [u32; 7],
}

const _: () = assert!(std::mem::size_of::<TypeRecord>() == 36);

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DescriptorRow {
    name: Identifier,
    data_type: Identifier,
    enum_type: Identifier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FunctionType {
    base: Option<Identifier>,
    descriptors: [Vec<ParameterDescriptor>; 7],
}

/// Read-only table of built-in function types.
#[derive(Debug, Clone, Default)]
pub struct FunctionTypeTable {
    types: FxHashMap<Identifier, FunctionType>,
    ancestors: FxHashMap<Identifier, Vec<Identifier>>,
}

impl FunctionTypeTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a metadata blob.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] for truncated blobs, unknown data types and
    /// broken inheritance.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TableError> {
        let count = read_u32(bytes, 0)? as usize;
        let record_size = std::mem::size_of::<TypeRecord>();
        let stream_start = count
            .checked_mul(record_size)
            .and_then(|n| n.checked_add(4))
            .filter(|end| *end <= bytes.len())
            .ok_or(TableError::Truncated { offset: 4 })?;
        let stream = &bytes[stream_start..];

        let mut builder = FunctionTypeTableBuilder::new();
        for chunk in bytes[4..stream_start].chunks_exact(record_size) {
            let record: TypeRecord = bytemuck::pod_read_unaligned(chunk);
            let base = (!record.base.is_invalid()).then_some(record.base);
            builder.add_type(record.ty, base);
            for (variant, raw) in ParameterVariant::ALL.into_iter().zip(record.offsets_le) {
                let offset = u32::from_le(raw);
                if offset == NO_DESCRIPTORS {
                    continue;
                }
                for descriptor in read_descriptors(stream, offset as usize, stream_start)? {
                    builder.add_descriptor(record.ty, variant, descriptor);
                }
            }
        }
        builder.build()
    }

    /// Encodes the table, types sorted by identifier value.
    #[allow(clippy::cast_possible_truncation)] // tables are far below 4 GiB
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ids: Vec<Identifier> = self.types.keys().copied().collect();
        ids.sort_unstable();

        let mut records = Vec::with_capacity(ids.len());
        let mut stream = Vec::new();
        for id in &ids {
            let ty = &self.types[id];
            let mut offsets_le = [NO_DESCRIPTORS.to_le(); 7];
            for (slot, descriptors) in offsets_le.iter_mut().zip(&ty.descriptors) {
                if descriptors.is_empty() {
                    continue;
                }
                *slot = (stream.len() as u32).to_le();
                stream.extend_from_slice(&(descriptors.len() as u32).to_le_bytes());
                for d in descriptors {
                    let row = DescriptorRow {
                        name: d.name,
                        data_type: d.data_type.tag(),
                        enum_type: d.enum_type,
                    };
                    stream.extend_from_slice(bytemuck::bytes_of(&row));
                }
            }
            records.push(TypeRecord {
                ty: *id,
                base: ty.base.unwrap_or(Identifier::INVALID),
                offsets_le,
            });
        }

        let mut out = Vec::with_capacity(4 + records.len() * 36 + stream.len());
        out.extend_from_slice(&(records.len() as u32).to_le_bytes());
        out.extend_from_slice(bytemuck::cast_slice(&records));
        out.extend_from_slice(&stream);
        out
    }

    /// Number of function types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` for an empty table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Returns `true` if `ty` is a known function type.
    #[must_use]
    pub fn contains(&self, ty: Identifier) -> bool {
        self.types.contains_key(&ty)
    }

    /// Direct base of `ty`.
    #[must_use]
    pub fn base(&self, ty: Identifier) -> Option<Identifier> {
        self.types.get(&ty).and_then(|t| t.base)
    }

    /// Descriptors `ty` itself declares for `variant` (not inherited).
    #[must_use]
    pub fn descriptors(&self, ty: Identifier, variant: ParameterVariant) -> &[ParameterDescriptor] {
        self.types
            .get(&ty)
            .map(|t| t.descriptors[variant as usize].as_slice())
            .unwrap_or_default()
    }

    /// `ty` followed by each base up the chain. Empty for unknown types.
    #[must_use]
    pub fn ancestors(&self, ty: Identifier) -> &[Identifier] {
        self.ancestors
            .get(&ty)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, TableError> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(TableError::Truncated { offset })
}

fn read_descriptors(
    stream: &[u8],
    offset: usize,
    stream_start: usize,
) -> Result<Vec<ParameterDescriptor>, TableError> {
    let count = read_u32(stream, offset).map_err(|_| TableError::Truncated {
        offset: stream_start + offset,
    })? as usize;
    let size = std::mem::size_of::<DescriptorRow>();
    let start = offset + 4;
    let raw = count
        .checked_mul(size)
        .and_then(|len| stream.get(start..start + len))
        .ok_or(TableError::Truncated {
            offset: stream_start + start,
        })?;
    raw.chunks_exact(size)
        .enumerate()
        .map(|(i, chunk)| {
            let row: DescriptorRow = bytemuck::pod_read_unaligned(chunk);
            let data_type =
                DataType::from_tag(row.data_type).ok_or(TableError::UnknownDataType {
                    tag: row.data_type,
                    offset: stream_start + start + i * size,
                })?;
            Ok(ParameterDescriptor {
                name: row.name,
                data_type,
                enum_type: row.enum_type,
            })
        })
        .collect()
}

/// Programmatic construction of a [`FunctionTypeTable`].
#[derive(Debug, Default)]
pub struct FunctionTypeTableBuilder {
    types: FxHashMap<Identifier, FunctionType>,
}

impl FunctionTypeTableBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `ty` with an optional base, keeping descriptors already added.
    pub fn add_type(&mut self, ty: Identifier, base: Option<Identifier>) -> &mut Self {
        self.types.entry(ty).or_default().base = base;
        self
    }

    /// Appends a descriptor to `ty`, declaring the type if needed.
    pub fn add_descriptor(
        &mut self,
        ty: Identifier,
        variant: ParameterVariant,
        descriptor: ParameterDescriptor,
    ) -> &mut Self {
        self.types.entry(ty).or_default().descriptors[variant as usize].push(descriptor);
        self
    }

    /// Validates base links and computes every ancestor chain.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::DanglingBase`] or [`TableError::Cycle`].
    pub fn build(self) -> Result<FunctionTypeTable, TableError> {
        let mut ancestors = FxHashMap::default();
        for &ty in self.types.keys() {
            let mut chain = vec![ty];
            let mut current = ty;
            while let Some(base) = self.types.get(&current).and_then(|t| t.base) {
                if !self.types.contains_key(&base) {
                    return Err(TableError::DanglingBase { ty: current, base });
                }
                if chain.contains(&base) {
                    return Err(TableError::Cycle { ty: base });
                }
                chain.push(base);
                current = base;
            }
            ancestors.insert(ty, chain);
        }
        Ok(FunctionTypeTable {
            types: self.types,
            ancestors,
        })
    }
}
