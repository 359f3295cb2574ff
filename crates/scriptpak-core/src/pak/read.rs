// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Container decoding and its error type.
//!
//! Decoding runs in two passes per composite: entities are created from the
//! variable, function, proxy and override blocks first, then links,
//! parameters, checksums, extra data and resources are attached to them by
//! identifier.

use std::io;

use rustc_hash::FxHashMap;
use scriptpak_ident::{hash_text, Identifier, Interner};
use thiserror::Error;
use tracing::{debug, instrument};

use super::cursor::Cursor;
use super::types::{
    ChecksumRow, CompositeRecord, DataBlock, DirectoryRow, EventRow, ExtraDataRow, FileHeader,
    FunctionRow, KeyRow, LinkRow, OffsetPair, ParameterRefRow, ProxyRow, ResourceRow, TrackRow,
    TriggerRow, VariableRow, f32_from_le,
};
use crate::commands::Commands;
use crate::composite::Composite;
use crate::entity::{
    AnimationData, Entity, EntityKind, EntityPath, EventMarker, FunctionData, FunctionEntity,
    Keyframe, Link, Track, Trigger, TriggerSequenceData,
};
use crate::param::{DataType, Parameter, ParameterValue};
use crate::reconcile;
use crate::report::{Report, Warning};
use crate::resource::ResourceReference;

/// Structural corruption found while decoding a container.
#[derive(Debug, Error)]
pub enum ParseError {
    /// IO error while reading the file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A read extended past the end of the buffer.
    #[error("read of {length} bytes at offset {offset} exceeds buffer of {size} bytes")]
    OutOfBounds {
        /// Byte offset of the read.
        offset: usize,
        /// Requested length.
        length: usize,
        /// Buffer size.
        size: usize,
    },

    /// The buffer is too small to hold the header.
    #[error("container of {size} bytes is smaller than its header")]
    TruncatedHeader {
        /// Buffer size.
        size: usize,
    },

    /// A parameter value carried an unrecognised data-type tag.
    #[error("unknown data type {tag} at offset {offset}")]
    UnknownDataType {
        /// Unrecognised tag.
        tag: Identifier,
        /// Byte offset of the tag.
        offset: usize,
    },

    /// A resource row carried an unrecognised kind tag.
    #[error("composite {composite}: unknown resource kind {tag}")]
    UnknownResourceKind {
        /// Owning composite.
        composite: Identifier,
        /// Unrecognised tag.
        tag: Identifier,
    },

    /// A string had no NUL terminator.
    #[error("unterminated string at offset {offset}")]
    UnterminatedString {
        /// Byte offset of the string.
        offset: usize,
    },

    /// A string was not valid UTF-8.
    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 {
        /// Byte offset of the string.
        offset: usize,
    },

    /// A proxy row's repeated identifier differs from its first.
    #[error("composite {composite}: proxy {id} repeats as {check}")]
    ProxyIdMismatch {
        /// Owning composite.
        composite: Identifier,
        /// First identifier.
        id: Identifier,
        /// Repeated identifier.
        check: Identifier,
    },

    /// The identifier inside the composite header block differs from the
    /// record's.
    #[error("composite record {record} has header identifier {header}")]
    CompositeIdMismatch {
        /// Identifier in the trailing record.
        record: Identifier,
        /// Identifier in the header block.
        header: Identifier,
    },

    /// A composite's name pointer reaches before the start of the file.
    #[error("composite {composite}: name pointer reaches {back} words before the start")]
    BadNamePointer {
        /// Owning composite.
        composite: Identifier,
        /// Stored distance back, in words.
        back: u32,
    },

    /// A composite name's stored identifier is not the hash of its text.
    #[error("composite {composite}: name identifier {stored} should be {expected}")]
    NameIdMismatch {
        /// Owning composite.
        composite: Identifier,
        /// Identifier stored before the name.
        stored: Identifier,
        /// Hash of the stored text.
        expected: Identifier,
    },

    /// A STRING value's header word lacks its sentinel byte.
    #[error("string header at offset {offset} has sentinel {sentinel:#04x}")]
    BadStringHeader {
        /// Byte offset of the header word.
        offset: usize,
        /// Top byte found instead of the sentinel.
        sentinel: u8,
    },

    /// An override has no checksum row.
    #[error("composite {composite}: override {alias} has no checksum")]
    MissingChecksum {
        /// Owning composite.
        composite: Identifier,
        /// Override entity.
        alias: Identifier,
    },

    /// A parameter reference points at no decoded parameter.
    #[error("composite {composite}: parameter reference to word {offset} matches no parameter")]
    UnknownParameterOffset {
        /// Owning composite.
        composite: Identifier,
        /// Word offset referenced.
        offset: u32,
    },

    /// A block row names an entity the composite does not contain.
    #[error("composite {composite}: {block} names unknown entity {entity}")]
    UnknownEntity {
        /// Owning composite.
        composite: Identifier,
        /// Block the row came from.
        block: &'static str,
        /// Missing entity.
        entity: Identifier,
    },

    /// Extra data names an entity the composite does not contain.
    #[error("composite {composite}: extra data for unknown entity {entity}")]
    UnresolvedExtraData {
        /// Owning composite.
        composite: Identifier,
        /// Missing entity.
        entity: Identifier,
    },

    /// Extra data is attached to an entity of the wrong type.
    #[error("composite {composite}: {block} data on entity {entity} of another type")]
    ExtraDataTypeMismatch {
        /// Owning composite.
        composite: Identifier,
        /// Block the row came from.
        block: &'static str,
        /// Receiving entity.
        entity: Identifier,
    },
}

/// Decodes a whole container.
///
/// Composite names are registered with `interner`.
///
/// # Errors
///
/// Returns [`ParseError`] for structural corruption; recoverable issues are
/// reported instead.
#[instrument(skip_all, fields(size = bytes.len()))]
pub fn read_commands(
    bytes: &[u8],
    interner: &mut Interner,
) -> Result<(Commands, Report), ParseError> {
    if bytes.len() < std::mem::size_of::<FileHeader>() {
        return Err(ParseError::TruncatedHeader { size: bytes.len() });
    }
    let mut cursor = Cursor::new(bytes);
    let header: FileHeader = cursor.read_row()?;

    let parameter_offsets: Vec<u32> = cursor.read_slice(header.parameters())?;
    let mut parameters = FxHashMap::default();
    for raw in parameter_offsets {
        let words = u32::from_le(raw);
        cursor.seek_words(words)?;
        parameters.insert(words, ParameterValue::decode(&mut cursor)?);
    }

    let composite_offsets: Vec<u32> = cursor.read_slice(header.composites())?;
    let mut report = Report::new();
    let mut composites = Vec::with_capacity(composite_offsets.len());
    for raw in composite_offsets {
        cursor.seek_words(u32::from_le(raw))?;
        let record: CompositeRecord = cursor.read_row()?;
        let composite = read_composite(&mut cursor, &record, &parameters, &mut report)?;
        interner.generate(&composite.name);
        debug!(
            composite = %composite.id,
            name = %composite.name,
            entities = composite.entities.len(),
            "decoded composite"
        );
        composites.push(composite);
    }

    Ok((Commands::from_parts(header.entry_points, composites), report))
}

fn read_name(cursor: &mut Cursor<'_>, record: &CompositeRecord) -> Result<String, ParseError> {
    let header_at = record.block(DataBlock::CompositeHeader).offset_words();
    let bad_pointer = |back| ParseError::BadNamePointer {
        composite: record.id,
        back,
    };

    // the word before the header counts back to the name
    let pointer_at = header_at.checked_sub(1).ok_or_else(|| bad_pointer(0))?;
    cursor.seek_words(pointer_at)?;
    let back = cursor.read_u32()?;
    let name_at = pointer_at.checked_sub(back).ok_or_else(|| bad_pointer(back))?;
    cursor.seek_words(name_at)?;
    let stored = cursor.read_id()?;
    let name = cursor.read_cstr()?.to_owned();
    let expected = hash_text(&name);
    if stored != expected {
        return Err(ParseError::NameIdMismatch {
            composite: record.id,
            stored,
            expected,
        });
    }

    cursor.seek_words(header_at)?;
    let header = cursor.read_id()?;
    if header != record.id {
        return Err(ParseError::CompositeIdMismatch {
            record: record.id,
            header,
        });
    }
    Ok(name)
}

fn read_path(cursor: &mut Cursor<'_>, pair: OffsetPair) -> Result<EntityPath, ParseError> {
    Ok(EntityPath::from_raw(cursor.read_slice(pair)?))
}

fn read_events(cursor: &mut Cursor<'_>, pair: OffsetPair) -> Result<Vec<EventMarker>, ParseError> {
    Ok(cursor
        .read_slice::<EventRow>(pair)?
        .into_iter()
        .map(|row| EventMarker {
            time: f32_from_le(row.time_le),
            name: row.name,
        })
        .collect())
}

fn read_animation(
    cursor: &mut Cursor<'_>,
    row: &ExtraDataRow,
) -> Result<AnimationData, ParseError> {
    let mut tracks = Vec::new();
    for track in cursor.read_slice::<TrackRow>(row.first)? {
        let keys = cursor
            .read_slice::<KeyRow>(track.keys)?
            .into_iter()
            .map(|k| Keyframe {
                time: f32_from_le(k.time_le),
                value: f32_from_le(k.value_le),
            })
            .collect();
        tracks.push(Track {
            id: track.id,
            parameter: track.parameter,
            keys,
        });
    }
    Ok(AnimationData {
        tracks,
        events: read_events(cursor, row.events)?,
    })
}

fn read_trigger_sequence(
    cursor: &mut Cursor<'_>,
    row: &ExtraDataRow,
) -> Result<TriggerSequenceData, ParseError> {
    let mut triggers = Vec::new();
    for trigger in cursor.read_slice::<TriggerRow>(row.first)? {
        triggers.push(Trigger {
            time: f32_from_le(trigger.time_le),
            path: read_path(cursor, trigger.path)?,
        });
    }
    Ok(TriggerSequenceData {
        triggers,
        events: read_events(cursor, row.events)?,
    })
}

fn entity_mut<'c>(
    composite: &'c mut Composite,
    id: Identifier,
    block: DataBlock,
) -> Result<&'c mut Entity, ParseError> {
    let composite_id = composite.id;
    composite
        .entity_mut(id)
        .ok_or(ParseError::UnknownEntity {
            composite: composite_id,
            block: block.name(),
            entity: id,
        })
}

fn read_composite(
    cursor: &mut Cursor<'_>,
    record: &CompositeRecord,
    parameters: &FxHashMap<u32, ParameterValue>,
    report: &mut Report,
) -> Result<Composite, ParseError> {
    let name = read_name(cursor, record)?;
    let mut composite = Composite::with_id(record.id, &name);
    composite.unknown = record.block(DataBlock::UnknownCounts);
    let id = composite.id;

    // Pass 1: entities.
    for row in cursor.read_slice::<FunctionRow>(record.block(DataBlock::EntityFunctions))? {
        composite.entities.push(Entity::new(
            row.id,
            EntityKind::Function(FunctionEntity::new(row.function)),
        ));
    }
    for row in
        cursor.read_slice::<VariableRow>(record.block(DataBlock::CompositeExposedParameters))?
    {
        let data_type = DataType::from_tag(row.data_type).ok_or(ParseError::UnknownDataType {
            tag: row.data_type,
            offset: record.block(DataBlock::CompositeExposedParameters).byte_offset(),
        })?;
        composite.entities.push(Entity::new(
            row.id,
            EntityKind::Variable {
                name: row.name,
                data_type,
            },
        ));
    }
    for row in cursor.read_slice::<ProxyRow>(record.block(DataBlock::EntityProxies))? {
        if row.id != row.id_check {
            return Err(ParseError::ProxyIdMismatch {
                composite: id,
                id: row.id,
                check: row.id_check,
            });
        }
        let path = read_path(cursor, row.path())?;
        composite.entities.push(Entity::new(
            row.id,
            EntityKind::Proxy {
                path,
                extra: row.extra,
            },
        ));
    }
    let checksums: FxHashMap<Identifier, Identifier> = cursor
        .read_slice::<ChecksumRow>(record.block(DataBlock::EntityOverridesChecksum))?
        .into_iter()
        .map(|row| (row.alias, row.checksum))
        .collect();
    for row in cursor.read_slice::<DirectoryRow>(record.block(DataBlock::EntityOverrides))? {
        let path = read_path(cursor, row.payload())?;
        let checksum = *checksums
            .get(&row.owner)
            .ok_or(ParseError::MissingChecksum {
                composite: id,
                alias: row.owner,
            })?;
        composite
            .entities
            .push(Entity::new(row.owner, EntityKind::Alias { path, checksum }));
    }

    // Pass 2: attachments.
    for row in cursor.read_slice::<DirectoryRow>(record.block(DataBlock::EntityConnections))? {
        let links: Vec<LinkRow> = cursor.read_slice(row.payload())?;
        let entity = entity_mut(&mut composite, row.owner, DataBlock::EntityConnections)?;
        entity.links.extend(links.into_iter().map(|l| Link {
            id: l.link_id,
            source_pin: l.source_pin,
            target_pin: l.target_pin,
            target: l.target,
        }));
    }
    for row in cursor.read_slice::<DirectoryRow>(record.block(DataBlock::EntityParameters))? {
        let refs: Vec<ParameterRefRow> = cursor.read_slice(row.payload())?;
        let entity = entity_mut(&mut composite, row.owner, DataBlock::EntityParameters)?;
        for r in refs {
            let value = parameters.get(&r.offset_words()).ok_or(
                ParseError::UnknownParameterOffset {
                    composite: id,
                    offset: r.offset_words(),
                },
            )?;
            entity.parameters.push(Parameter::new(r.name, value.clone()));
        }
    }

    let animation_slot = DataBlock::TriggerSequenceData;
    for row in cursor.read_slice::<ExtraDataRow>(record.block(animation_slot))? {
        let data = read_animation(cursor, &row)?;
        attach_extra(
            &mut composite,
            row.entity,
            animation_slot,
            FunctionData::Animation(data),
            report,
        )?;
    }
    let trigger_slot = DataBlock::CageAnimationData;
    for row in cursor.read_slice::<ExtraDataRow>(record.block(trigger_slot))? {
        let data = read_trigger_sequence(cursor, &row)?;
        attach_extra(
            &mut composite,
            row.entity,
            trigger_slot,
            FunctionData::TriggerSequence(data),
            report,
        )?;
    }

    let pool = cursor
        .read_slice::<ResourceRow>(record.block(DataBlock::ResourceReferences))?
        .iter()
        .map(|row| {
            ResourceReference::from_row(row).ok_or(ParseError::UnknownResourceKind {
                composite: id,
                tag: row.kind,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    reconcile::distribute(&mut composite, pool, report);

    Ok(composite)
}

fn attach_extra(
    composite: &mut Composite,
    owner: Identifier,
    block: DataBlock,
    data: FunctionData,
    report: &mut Report,
) -> Result<(), ParseError> {
    let id = composite.id;
    let entity = composite
        .entity_mut(owner)
        .ok_or(ParseError::UnresolvedExtraData {
            composite: id,
            entity: owner,
        })?;
    match &mut entity.kind {
        EntityKind::Proxy { .. } => {
            debug!(
                composite = %id,
                entity = %owner,
                block = block.name(),
                "skipping extra data on proxy"
            );
            report.record(Warning::SkippedProxyExtraData {
                composite: id,
                entity: owner,
            });
            Ok(())
        }
        EntityKind::Function(f)
            if std::mem::discriminant(&f.extra) == std::mem::discriminant(&data) =>
        {
            f.extra = data;
            Ok(())
        }
        _ => Err(ParseError::ExtraDataTypeMismatch {
            composite: id,
            block: block.name(),
            entity: owner,
        }),
    }
}
