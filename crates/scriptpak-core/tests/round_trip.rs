// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use scriptpak_core::{
    hash_text, Commands, EntityKind, EntryPoint, FunctionData, Interner, ParameterValue,
    ResourceWarnings, SaveError,
};

#[test]
fn load_save_load_is_stable_on_disk() {
    common::init_tracing();
    let mut interner = Interner::new();
    let mut original = common::level(&mut interner);

    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.pak");
    let second = dir.path().join("second.pak");
    original
        .save(&first, &mut interner, ResourceWarnings::Warn)
        .unwrap();

    let (mut loaded, report) = Commands::load(&first, &mut interner).unwrap();
    assert!(report.is_empty(), "{report:?}");
    loaded
        .save(&second, &mut interner, ResourceWarnings::Warn)
        .unwrap();
    let (reloaded, _) = Commands::load(&second, &mut interner).unwrap();

    assert_eq!(loaded, reloaded);
    assert_eq!(
        std::fs::read(&first).unwrap(),
        std::fs::read(&second).unwrap()
    );
}

#[test]
fn decoded_model_keeps_every_entity_kind() {
    let mut interner = Interner::new();
    let mut original = common::level(&mut interner);
    let bytes = common::encode(&mut original, &mut interner);
    let (loaded, _) = Commands::from_bytes(&bytes, &mut interner).unwrap();

    assert_eq!(loaded.entry_points(), original.entry_points());
    let room = loaded.composite_by_name(common::ROOM).unwrap();
    assert_eq!(room.functions().count(), 4);
    assert_eq!(room.variables().count(), 1);

    let door = room.entity(hash_text("door_01")).unwrap();
    assert_eq!(
        door.parameter(hash_text("name")).unwrap().value,
        ParameterValue::String("door_01".to_owned())
    );

    let anim = room.entity(hash_text("door_anim")).unwrap();
    let Some(FunctionData::Animation(data)) = anim.as_function().map(|f| &f.extra) else {
        unreachable!("animation data lost");
    };
    assert_eq!(data.tracks[0].keys.len(), 2);
    assert_eq!(data.events.len(), 1);

    let sequence = room.entity(hash_text("door_sequence")).unwrap();
    assert_eq!(sequence.links.len(), 1);
    assert_eq!(sequence.links[0].target, hash_text("door_01"));

    let root = loaded.entry_point(EntryPoint::Root).unwrap();
    assert_eq!(root.proxies().count(), 1);
    assert_eq!(root.aliases().count(), 1);
    let alias = root.entity(hash_text("door_alias")).unwrap();
    let EntityKind::Alias { path, checksum } = &alias.kind else {
        unreachable!("alias decoded as another kind");
    };
    assert_eq!(*checksum, path.checksum());
}

#[test]
fn string_value_is_stored_inline() {
    let mut interner = Interner::new();
    let mut commands = common::level(&mut interner);
    let bytes = common::encode(&mut commands, &mut interner);
    assert!(bytes.windows(8).any(|w| w == b"door_01\0"));
}

#[test]
fn equal_values_share_one_slot() {
    let mut interner = Interner::new();
    let mut commands = common::minimal(&mut interner);
    let root = commands.entry_point(EntryPoint::Root).unwrap().id;
    let composite = commands.composite_mut(root).unwrap();
    for name in ["a", "b", "c"] {
        composite
            .add_function(hash_text(name), hash_text("Zone"))
            .set_parameter(hash_text("enabled"), ParameterValue::Bool(true));
    }
    let bytes = common::encode(&mut commands, &mut interner);
    // header word 4 is the parameter count
    let count = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
    assert_eq!(count, 1);
}

#[test]
fn missing_entry_points_fail_without_output() {
    let mut interner = Interner::new();
    let mut commands = Commands::new();
    commands.add_composite(common::empty(common::ROOT, &mut interner));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.pak");
    let err = commands
        .save(&path, &mut interner, ResourceWarnings::Warn)
        .unwrap_err();
    assert!(matches!(
        err,
        SaveError::MissingEntryPoints { ref missing } if missing.len() == 3
    ));
    assert!(!path.exists());
}

#[test]
fn composite_names_are_learned_on_load() {
    let mut writer_side = Interner::new();
    let mut commands = common::level(&mut writer_side);
    let bytes = common::encode(&mut commands, &mut writer_side);

    let mut reader_side = Interner::new();
    Commands::from_bytes(&bytes, &mut reader_side).unwrap();
    assert_eq!(
        reader_side.find_text_opt(hash_text(common::ROOM)),
        Some(common::ROOM)
    );
}

#[test]
fn string_with_nul_fails_without_output() {
    let mut interner = Interner::new();
    let mut commands = common::minimal(&mut interner);
    let root = commands.entry_point(EntryPoint::Root).unwrap().id;
    commands
        .composite_mut(root)
        .unwrap()
        .add_function(hash_text("sign"), hash_text("Text"))
        .set_parameter(hash_text("text"), ParameterValue::String("EXIT\0".to_owned()));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.pak");
    let err = commands
        .save(&path, &mut interner, ResourceWarnings::Warn)
        .unwrap_err();
    assert!(matches!(
        err,
        SaveError::InvalidString { entity, .. } if entity == hash_text("sign")
    ));
    assert!(!path.exists());
}
