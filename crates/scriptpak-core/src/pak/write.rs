// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Container encoding.
//!
//! Layout, in write order:
//!
//! 1. 28-byte header (table offsets patched last)
//! 2. deduplicated parameter values
//! 3. per composite: name region, the 13 blocks, trailing record
//! 4. parameter offset table
//! 5. composite offset table

use std::io;

use rustc_hash::FxHashMap;
use scriptpak_ident::{Identifier, Interner};
use thiserror::Error;
use tracing::{debug, instrument};

use super::cursor::Writer;
use super::types::{
    f32_le, ChecksumRow, CompositeRecord, DataBlock, DirectoryRow, EventRow, ExtraDataRow,
    FileHeader, FunctionRow, KeyRow, LinkRow, OffsetPair, ParameterRefRow, ProxyRow, TrackRow,
    TriggerRow, VariableRow, BLOCK_COUNT,
};
use crate::builtin::{resource_requirement, ResourceRequirement, RESOURCE_PARAMETER};
use crate::commands::{Commands, EntryPoint};
use crate::composite::Composite;
use crate::config::ResourceWarnings;
use crate::entity::{Entity, EntityKind, EntityPath, EventMarker, FunctionData};
use crate::param::{ParameterValue, ResourceParameter};
use crate::reconcile;
use crate::report::{Report, Warning};
use crate::resource::{ResourceKind, ResourceReference};

/// Errors that abort a save.
#[derive(Debug, Error)]
pub enum SaveError {
    /// IO error while writing the file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// One or more entry points are unset.
    #[error("entry points not set: {missing:?}")]
    MissingEntryPoints {
        /// Entry points that failed the check.
        missing: Vec<EntryPoint>,
    },

    /// A STRING parameter contains a NUL, which would end it early on disk.
    #[error("composite {composite}: parameter {parameter} of entity {entity} contains a NUL")]
    InvalidString {
        /// Owning composite.
        composite: Identifier,
        /// Owning entity.
        entity: Identifier,
        /// Offending parameter.
        parameter: Identifier,
    },

    /// A visual-only entity has a `resource` parameter but no renderable
    /// instance.
    #[error(
        "composite {composite}: entity {entity} has a resource parameter without a renderable instance"
    )]
    ResourceConfiguration {
        /// Owning composite.
        composite: Identifier,
        /// Offending entity.
        entity: Identifier,
    },
}

#[allow(clippy::cast_possible_truncation)] // counts are far below u32::MAX
const fn count(n: usize) -> u32 {
    n as u32
}

/// Encodes the container after applying save-time resource fixups.
///
/// # Errors
///
/// See [`SaveError`]. The entry-point and string checks run before
/// anything is modified.
#[instrument(skip_all, fields(composites = commands.composites().len()))]
pub fn write_commands(
    commands: &mut Commands,
    interner: &mut Interner,
    warnings: ResourceWarnings,
) -> Result<(Vec<u8>, Report), SaveError> {
    let entry_points = commands.entry_points();
    let missing: Vec<EntryPoint> = EntryPoint::ALL
        .into_iter()
        .filter(|which| entry_points[which.index()].is_invalid())
        .collect();
    if !missing.is_empty() {
        return Err(SaveError::MissingEntryPoints { missing });
    }
    check_strings(commands)?;

    let mut report = Report::new();
    for composite in commands.composites_mut() {
        apply_resource_requirements(composite, warnings, &mut report)?;
    }

    let mut w = Writer::new();
    w.write_row(&FileHeader {
        entry_points: commands.entry_points(),
        parameter_table_le: 0,
        parameter_count_le: 0,
        composite_table_le: 0,
        composite_count_le: 0,
    });

    // Parameters, shared by storage key.
    let mut slots: FxHashMap<Vec<u8>, u32> = FxHashMap::default();
    let mut parameter_table = Vec::new();
    let mut parameter_offsets: Vec<Vec<Vec<u32>>> = Vec::new();
    for composite in commands.composites() {
        let mut per_entity = Vec::with_capacity(composite.entities.len());
        for entity in &composite.entities {
            let mut offsets = Vec::with_capacity(entity.parameters.len());
            for parameter in &entity.parameters {
                let key = parameter.value.storage_key(interner);
                let offset = if let Some(offset) = slots.get(&key) {
                    *offset
                } else {
                    let offset = w.position_words();
                    parameter.value.encode(&mut w, interner);
                    parameter_table.push(offset);
                    slots.insert(key, offset);
                    offset
                };
                offsets.push(offset);
            }
            per_entity.push(offsets);
        }
        parameter_offsets.push(per_entity);
    }
    debug!(unique = parameter_table.len(), "wrote parameter values");

    let mut composite_table = Vec::with_capacity(commands.composites().len());
    for (composite, offsets) in commands.composites().iter().zip(&parameter_offsets) {
        composite_table.push(write_composite(&mut w, composite, offsets, interner));
    }

    let parameter_table_at = w.position_words();
    for offset in &parameter_table {
        w.write_u32(*offset);
    }
    let composite_table_at = w.position_words();
    for offset in &composite_table {
        w.write_u32(*offset);
    }
    w.patch_u32(12, parameter_table_at);
    w.patch_u32(16, count(parameter_table.len()));
    w.patch_u32(20, composite_table_at);
    w.patch_u32(24, count(composite_table.len()));

    Ok((w.into_vec(), report))
}

/// Rejects STRING values with an interior NUL.
fn check_strings(commands: &Commands) -> Result<(), SaveError> {
    for composite in commands.composites() {
        for entity in &composite.entities {
            for parameter in &entity.parameters {
                if matches!(&parameter.value, ParameterValue::String(text) if text.contains('\0'))
                {
                    return Err(SaveError::InvalidString {
                        composite: composite.id,
                        entity: entity.id,
                        parameter: parameter.name,
                    });
                }
            }
        }
    }
    Ok(())
}

fn has_resource(entity: &Entity, kind: ResourceKind) -> bool {
    entity.resources().any(|r| r.kind() == kind)
}

/// Injects required resources, reports expected ones and rejects invalid
/// visual-only setups.
///
/// # Errors
///
/// Returns [`SaveError::ResourceConfiguration`] for a visual-only entity
/// whose `resource` parameter has no renderable instance.
pub fn apply_resource_requirements(
    composite: &mut Composite,
    warnings: ResourceWarnings,
    report: &mut Report,
) -> Result<(), SaveError> {
    let composite_id = composite.id;
    for entity in &mut composite.entities {
        let Some(requirement) = entity.as_function().and_then(|f| resource_requirement(f.function))
        else {
            continue;
        };
        match requirement {
            ResourceRequirement::Inject(kind) => {
                if !has_resource(entity, kind) {
                    inject(entity, kind);
                    debug!(
                        composite = %composite_id,
                        entity = %entity.id,
                        kind = kind.tag_name(),
                        "injected resource"
                    );
                }
            }
            ResourceRequirement::Expect(kind) => {
                if !has_resource(entity, kind) && warnings == ResourceWarnings::Warn {
                    report.push(Warning::MissingResource {
                        composite: composite_id,
                        entity: entity.id,
                        kind,
                    });
                }
            }
            ResourceRequirement::RenderableOnly => {
                if entity.parameter(*RESOURCE_PARAMETER).is_some()
                    && !has_resource(entity, ResourceKind::RenderableInstance)
                {
                    return Err(SaveError::ResourceConfiguration {
                        composite: composite_id,
                        entity: entity.id,
                    });
                }
            }
        }
    }
    Ok(())
}

fn inject(entity: &mut Entity, kind: ResourceKind) {
    let entity_id = entity.id;
    match entity.parameter_mut(*RESOURCE_PARAMETER) {
        Some(parameter) => {
            if let ParameterValue::Resource(r) = &mut parameter.value {
                r.references.push(ResourceReference::new(r.id, kind));
            } else if let Some(f) = entity.as_function_mut() {
                f.resources.push(ResourceReference::new(entity_id, kind));
            }
        }
        None => {
            let mut binding = ResourceParameter::new(entity_id);
            binding
                .references
                .push(ResourceReference::new(entity_id, kind));
            entity.set_parameter(*RESOURCE_PARAMETER, ParameterValue::Resource(binding));
        }
    }
}

/// Writes rows and returns their slice descriptor.
fn write_rows<T: bytemuck::Pod>(w: &mut Writer, rows: &[T]) -> OffsetPair {
    let at = w.position_words();
    for row in rows {
        w.write_row(row);
    }
    OffsetPair::new(at, count(rows.len()))
}

fn write_path(w: &mut Writer, path: &EntityPath) -> OffsetPair {
    write_rows(w, path.as_raw())
}

fn write_events(w: &mut Writer, events: &[EventMarker]) -> OffsetPair {
    let rows: Vec<EventRow> = events
        .iter()
        .map(|e| EventRow {
            time_le: f32_le(e.time),
            name: e.name,
        })
        .collect();
    write_rows(w, &rows)
}

fn sorted_by_id<'c>(entities: impl Iterator<Item = &'c Entity>) -> Vec<&'c Entity> {
    let mut out: Vec<&Entity> = entities.collect();
    out.sort_by_key(|e| e.id);
    out
}

/// Writes one composite and returns the word offset of its record.
fn write_composite(
    w: &mut Writer,
    composite: &Composite,
    parameter_offsets: &[Vec<u32>],
    interner: &mut Interner,
) -> u32 {
    let mut blocks = [OffsetPair::default(); BLOCK_COUNT];

    // Name region, its back pointer, then the header block proper.
    let name_at = w.position_words();
    w.write_id(interner.generate(&composite.name));
    w.write_cstr(&composite.name);
    w.align();
    // self-relative: words back from this word to the name
    let pointer_at = w.position_words();
    w.write_u32(pointer_at - name_at);
    let header_at = w.position_words();
    w.write_id(composite.id);
    w.write_u32(0);
    blocks[DataBlock::CompositeHeader.index()] = OffsetPair::new(header_at, 2);

    // Links.
    let mut directory = Vec::new();
    for entity in sorted_by_id(composite.entities.iter().filter(|e| !e.links.is_empty())) {
        let rows: Vec<LinkRow> = entity
            .links
            .iter()
            .map(|l| LinkRow {
                link_id: l.id,
                source_pin: l.source_pin,
                target_pin: l.target_pin,
                target: l.target,
            })
            .collect();
        let payload = write_rows(w, &rows);
        directory.push(DirectoryRow::new(entity.id, payload.offset_words(), payload.count()));
    }
    blocks[DataBlock::EntityConnections.index()] = write_rows(w, &directory);

    // Parameter references.
    let offsets_by_id: FxHashMap<Identifier, &Vec<u32>> = composite
        .entities
        .iter()
        .zip(parameter_offsets)
        .map(|(e, offsets)| (e.id, offsets))
        .collect();
    directory.clear();
    for entity in sorted_by_id(composite.entities.iter().filter(|e| !e.parameters.is_empty())) {
        let offsets = offsets_by_id.get(&entity.id).map_or(&[][..], |o| o.as_slice());
        let rows: Vec<ParameterRefRow> = entity
            .parameters
            .iter()
            .zip(offsets)
            .map(|(p, offset)| ParameterRefRow {
                name: p.name,
                offset_words_le: offset.to_le(),
            })
            .collect();
        let payload = write_rows(w, &rows);
        directory.push(DirectoryRow::new(entity.id, payload.offset_words(), payload.count()));
    }
    blocks[DataBlock::EntityParameters.index()] = write_rows(w, &directory);

    // Overrides and their checksums.
    directory.clear();
    let mut checksums = Vec::new();
    for alias in composite.aliases() {
        if let EntityKind::Alias { path, checksum } = &alias.kind {
            let payload = write_path(w, path);
            directory.push(DirectoryRow::new(alias.id, payload.offset_words(), payload.count()));
            checksums.push(ChecksumRow {
                alias: alias.id,
                checksum: *checksum,
            });
        }
    }
    blocks[DataBlock::EntityOverrides.index()] = write_rows(w, &directory);
    checksums.sort_by_key(|row| row.checksum);
    blocks[DataBlock::EntityOverridesChecksum.index()] = write_rows(w, &checksums);

    // Exposed variables.
    let variables: Vec<VariableRow> = composite
        .variables()
        .filter_map(|e| match &e.kind {
            EntityKind::Variable { name, data_type } => Some(VariableRow {
                id: e.id,
                name: *name,
                data_type: data_type.tag(),
            }),
            _ => None,
        })
        .collect();
    blocks[DataBlock::CompositeExposedParameters.index()] = write_rows(w, &variables);

    // Proxies: paths first, then rows.
    let mut proxies = Vec::new();
    for proxy in composite.proxies() {
        if let EntityKind::Proxy { path, extra } = &proxy.kind {
            let payload = write_path(w, path);
            proxies.push(ProxyRow {
                id: proxy.id,
                path_offset_le: payload.offset_words_le,
                path_count_le: payload.count_le,
                id_check: proxy.id,
                extra: *extra,
            });
        }
    }
    blocks[DataBlock::EntityProxies.index()] = write_rows(w, &proxies);

    // Functions.
    let functions: Vec<FunctionRow> = composite
        .functions()
        .filter_map(|e| {
            e.as_function().map(|f| FunctionRow {
                id: e.id,
                function: f.function,
            })
        })
        .collect();
    blocks[DataBlock::EntityFunctions.index()] = write_rows(w, &functions);

    // Resources.
    let resources: Vec<_> = reconcile::collect(composite)
        .iter()
        .map(ResourceReference::to_row)
        .collect();
    blocks[DataBlock::ResourceReferences.index()] = write_rows(w, &resources);

    blocks[DataBlock::TriggerSequenceData.index()] = write_animation(w, composite);
    blocks[DataBlock::CageAnimationData.index()] = write_trigger_sequences(w, composite);
    blocks[DataBlock::Unused.index()] = OffsetPair::new(w.position_words(), 0);
    blocks[DataBlock::UnknownCounts.index()] = composite.unknown;

    let record_at = w.position_words();
    w.write_row(&CompositeRecord {
        reserved_le: 0,
        blocks,
        id: composite.id,
    });
    record_at
}

/// Animation tracks and events, stored in the TRIGGERSEQUENCE_DATA slot.
fn write_animation(w: &mut Writer, composite: &Composite) -> OffsetPair {
    let mut rows = Vec::new();
    for entity in composite.functions() {
        let Some(FunctionData::Animation(data)) = entity.as_function().map(|f| &f.extra) else {
            continue;
        };
        let mut tracks = Vec::with_capacity(data.tracks.len());
        for track in &data.tracks {
            let keys: Vec<KeyRow> = track
                .keys
                .iter()
                .map(|k| KeyRow {
                    time_le: f32_le(k.time),
                    value_le: f32_le(k.value),
                })
                .collect();
            tracks.push(TrackRow {
                id: track.id,
                parameter: track.parameter,
                keys: write_rows(w, &keys),
            });
        }
        rows.push(ExtraDataRow {
            entity: entity.id,
            first: write_rows(w, &tracks),
            events: write_events(w, &data.events),
        });
    }
    write_rows(w, &rows)
}

/// Triggers and events, stored in the CAGEANIMATION_DATA slot.
fn write_trigger_sequences(w: &mut Writer, composite: &Composite) -> OffsetPair {
    let mut rows = Vec::new();
    for entity in composite.functions() {
        let Some(FunctionData::TriggerSequence(data)) = entity.as_function().map(|f| &f.extra)
        else {
            continue;
        };
        let mut triggers = Vec::with_capacity(data.triggers.len());
        for trigger in &data.triggers {
            triggers.push(TriggerRow {
                time_le: f32_le(trigger.time),
                path: write_path(w, &trigger.path),
            });
        }
        rows.push(ExtraDataRow {
            entity: entity.id,
            first: write_rows(w, &triggers),
            events: write_events(w, &data.events),
        });
    }
    write_rows(w, &rows)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::composite::Composite;
    use scriptpak_ident::hash_text;

    #[test]
    fn unset_entry_points_fail_before_mutation() {
        let mut interner = Interner::new();
        let mut commands = Commands::new();
        let id = commands
            .add_composite(Composite::new("LEVEL", &mut interner))
            .id;
        commands
            .composite_mut(id)
            .unwrap()
            .add_function(hash_text("barrier"), hash_text("CollisionBarrier"));
        commands.set_entry_point(EntryPoint::Root, id);
        let before = commands.clone();

        let err = write_commands(&mut commands, &mut interner, ResourceWarnings::Warn).unwrap_err();
        assert!(matches!(
            err,
            SaveError::MissingEntryPoints { ref missing }
                if *missing == [EntryPoint::Global, EntryPoint::PauseMenu]
        ));
        assert_eq!(commands, before);
    }

    #[test]
    fn dangling_entry_points_still_save() {
        let mut interner = Interner::new();
        let mut commands = Commands::new();
        let id = commands
            .add_composite(Composite::new("LEVEL", &mut interner))
            .id;
        commands.set_entry_point(EntryPoint::Root, id);
        commands.set_entry_point(EntryPoint::Global, hash_text("GLOBAL"));
        commands.set_entry_point(EntryPoint::PauseMenu, hash_text("PAUSEMENU"));

        let (bytes, _) = write_commands(&mut commands, &mut interner, ResourceWarnings::Warn).unwrap();
        assert_eq!(&bytes[4..8], hash_text("GLOBAL").as_bytes());
    }

    #[test]
    fn nul_in_string_fails_before_mutation() {
        let mut interner = Interner::new();
        let mut commands = Commands::new();
        let id = commands
            .add_composite(Composite::new("LEVEL", &mut interner))
            .id;
        for which in EntryPoint::ALL {
            commands.set_entry_point(which, id);
        }
        let composite = commands.composite_mut(id).unwrap();
        composite.add_function(hash_text("barrier"), hash_text("CollisionBarrier"));
        composite
            .add_function(hash_text("door"), hash_text("Door"))
            .set_parameter(hash_text("name"), ParameterValue::String("door\0_01".into()));
        let before = commands.clone();

        let err = write_commands(&mut commands, &mut interner, ResourceWarnings::Warn).unwrap_err();
        assert!(matches!(
            err,
            SaveError::InvalidString { composite, entity, parameter }
                if composite == id
                    && entity == hash_text("door")
                    && parameter == hash_text("name")
        ));
        // the barrier's mapping was not injected
        assert_eq!(commands, before);
    }

    #[test]
    fn header_slot_points_at_composite_identifier() {
        let mut interner = Interner::new();
        let mut commands = Commands::new();
        let id = commands
            .add_composite(Composite::new("LEVEL\\room", &mut interner))
            .id;
        for which in EntryPoint::ALL {
            commands.set_entry_point(which, id);
        }
        let (bytes, _) = write_commands(&mut commands, &mut interner, ResourceWarnings::Warn).unwrap();
        let word = |at: usize| u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());

        let table = word(20) as usize * 4;
        let record_at = word(table) as usize * 4;
        let record: CompositeRecord = bytemuck::pod_read_unaligned(
            &bytes[record_at..record_at + std::mem::size_of::<CompositeRecord>()],
        );
        let slot = record.block(DataBlock::CompositeHeader);
        assert_eq!(slot.count(), 2);

        let header = slot.byte_offset();
        assert_eq!(&bytes[header..header + 4], id.as_bytes());
        assert_eq!(word(header + 4), 0);

        let pointer = header - 4;
        let name = pointer - word(pointer) as usize * 4;
        assert_eq!(&bytes[name..name + 4], hash_text("LEVEL\\room").as_bytes());
        assert_eq!(&bytes[name + 4..name + 15], b"LEVEL\\room\0");
    }

    #[test]
    fn inject_binds_through_new_resource_parameter() {
        let mut c = Composite::with_id(hash_text("c"), "c");
        c.add_function(hash_text("barrier"), hash_text("CollisionBarrier"));
        let mut report = Report::new();
        apply_resource_requirements(&mut c, ResourceWarnings::Warn, &mut report).unwrap();
        let entity = c.entity(hash_text("barrier")).unwrap();
        let resources: Vec<_> = entity.resources().collect();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].kind(), ResourceKind::CollisionMapping);
        assert_eq!(resources[0].owner, entity.id);
        assert!(report.is_empty());

        // already satisfied: nothing more is injected
        apply_resource_requirements(&mut c, ResourceWarnings::Warn, &mut report).unwrap();
        assert_eq!(c.entity(hash_text("barrier")).unwrap().resources().count(), 1);
    }

    #[test]
    fn expected_resources_warn_unless_ignored() {
        let mut c = Composite::with_id(hash_text("c"), "c");
        c.add_function(hash_text("model"), hash_text("ModelReference"));
        let mut report = Report::new();
        apply_resource_requirements(&mut c, ResourceWarnings::Ignore, &mut report).unwrap();
        assert!(report.is_empty());
        apply_resource_requirements(&mut c, ResourceWarnings::Warn, &mut report).unwrap();
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn visual_only_without_renderable_is_fatal() {
        let mut c = Composite::with_id(hash_text("c"), "c");
        c.add_function(hash_text("light"), hash_text("LightReference"))
            .set_parameter(
                *RESOURCE_PARAMETER,
                ParameterValue::Resource(ResourceParameter::new(hash_text("light"))),
            );
        let mut report = Report::new();
        assert!(matches!(
            apply_resource_requirements(&mut c, ResourceWarnings::Warn, &mut report),
            Err(SaveError::ResourceConfiguration { .. })
        ));
    }
}
