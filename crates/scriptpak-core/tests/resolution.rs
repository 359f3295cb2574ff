// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use scriptpak_core::{
    apply_defaults, builtin, hash_text, Commands, DataType, DefaultOptions, EntityPath,
    EntryPoint, FunctionTypeTable, FunctionTypeTableBuilder, Identifier, Interner,
    InvariantViolation, ParameterDescriptor, ParameterValue, ParameterVariant, Resolver,
};

const DEPTH: usize = 6;

/// `LEVEL` instances `LEVEL\0`, which instances `LEVEL\1`, and so on; the
/// innermost composite holds `target`. Returns the instance path.
fn nested(interner: &mut Interner) -> (Commands, Vec<Identifier>) {
    let mut commands = common::minimal(interner);
    let mut path = Vec::new();
    let mut parent = commands.entry_point(EntryPoint::Root).unwrap().id;
    for depth in 0..DEPTH {
        let child = commands
            .add_composite(common::empty(&format!("LEVEL\\{depth}"), interner))
            .id;
        let instance = interner.generate(&format!("instance_{depth}"));
        commands
            .composite_mut(parent)
            .unwrap()
            .add_function(instance, child);
        path.push(instance);
        parent = child;
    }
    let target = interner.generate("target");
    commands
        .composite_mut(parent)
        .unwrap()
        .add_function(target, hash_text("Door"));
    path.push(target);
    (commands, path)
}

#[test]
fn resolves_through_every_nesting_level() {
    let mut interner = Interner::new();
    let (commands, path) = nested(&mut interner);
    let root = commands.entry_point(EntryPoint::Root).unwrap().id;
    let resolver = Resolver::new(&commands, &interner);

    let resolved = resolver
        .resolve_path(root, &EntityPath::new(path.clone()))
        .unwrap();
    assert_eq!(resolved.entity.id, hash_text("target"));
    assert_eq!(resolved.composite.name, format!("LEVEL\\{}", DEPTH - 1));

    let (_, crumb) = resolver.breadcrumb(root, &path, false).unwrap();
    assert_eq!(crumb.split(" -> ").count(), DEPTH + 1);
    assert!(crumb.ends_with("instance_5 -> target"));
}

#[test]
fn broken_instance_link_yields_none() {
    let mut interner = Interner::new();
    let (mut commands, path) = nested(&mut interner);
    let root = commands.entry_point(EntryPoint::Root).unwrap().id;
    // re-point the middle instance at a composite that does not exist
    let middle = hash_text("LEVEL\\2");
    let instance = hash_text("instance_3");
    commands
        .composite_mut(middle)
        .unwrap()
        .add_function(instance, hash_text("LEVEL\\gone"));

    let resolver = Resolver::new(&commands, &interner);
    assert!(resolver.resolve(root, &path).is_none());
    assert!(resolver.resolve(root, &path[..3]).is_some());
}

#[test]
fn proxy_target_survives_round_trip() {
    let mut interner = Interner::new();
    let mut commands = common::level(&mut interner);
    let bytes = common::encode(&mut commands, &mut interner);
    let (loaded, _) = Commands::from_bytes(&bytes, &mut interner).unwrap();
    let root = loaded.entry_point(EntryPoint::Root).unwrap();
    let proxy = root.entity(hash_text("door_proxy")).unwrap();

    let resolver = Resolver::new(&loaded, &interner);
    let resolved = resolver
        .resolve_path(root.id, proxy.path().unwrap())
        .unwrap();
    assert_eq!(resolved.entity.id, hash_text("door_01"));
    assert_eq!(resolved.composite.name, common::ROOM);
}

fn door_table() -> FunctionTypeTable {
    let mut b = FunctionTypeTableBuilder::new();
    b.add_type(hash_text("Entity"), None)
        .add_type(hash_text("Interactive"), Some(hash_text("Entity")))
        .add_type(hash_text("Door"), Some(hash_text("Interactive")))
        .add_type(*builtin::PROXY_INTERFACE, None)
        .add_descriptor(
            hash_text("Entity"),
            ParameterVariant::StateParameter,
            ParameterDescriptor::new(hash_text("name"), DataType::String),
        )
        .add_descriptor(
            hash_text("Interactive"),
            ParameterVariant::StateParameter,
            ParameterDescriptor::new(hash_text("resource"), DataType::Resource),
        )
        .add_descriptor(
            hash_text("Door"),
            ParameterVariant::InputPin,
            ParameterDescriptor::new(hash_text("open"), DataType::Bool),
        );
    b.build().unwrap()
}

#[test]
fn defaults_keep_existing_values_unless_overwriting() {
    let mut interner = Interner::new();
    let mut commands = common::level(&mut interner);
    let table = door_table();
    let room = hash_text(common::ROOM);
    let door = hash_text("door_01");

    apply_defaults(
        &mut commands,
        &interner,
        &table,
        room,
        door,
        DefaultOptions::default(),
    )
    .unwrap();
    let entity = commands.composite(room).unwrap().entity(door).unwrap();
    // `name` comes from the deepest base type and was already set
    assert_eq!(
        entity.parameter(hash_text("name")).unwrap().value,
        ParameterValue::String("door_01".to_owned())
    );
    assert_eq!(
        entity.parameter(hash_text("open")).unwrap().value,
        ParameterValue::Bool(false)
    );
    assert!(matches!(
        entity.parameter(hash_text("resource")).map(|p| &p.value),
        Some(ParameterValue::Resource(r)) if r.id == door && r.references.is_empty()
    ));

    let overwrite = DefaultOptions {
        overwrite: true,
        ..DefaultOptions::default()
    };
    apply_defaults(&mut commands, &interner, &table, room, door, overwrite).unwrap();
    let entity = commands.composite(room).unwrap().entity(door).unwrap();
    assert_eq!(
        entity.parameter(hash_text("name")).unwrap().value,
        ParameterValue::String(String::new())
    );
}

#[test]
fn chained_proxies_are_rejected() {
    let mut interner = Interner::new();
    let mut commands = common::level(&mut interner);
    let root = commands.entry_point(EntryPoint::Root).unwrap().id;
    let chained = hash_text("proxy_of_proxy");
    commands
        .composite_mut(root)
        .unwrap()
        .add_proxy(chained, EntityPath::new([hash_text("door_proxy")]));

    let err = apply_defaults(
        &mut commands,
        &interner,
        &door_table(),
        root,
        chained,
        DefaultOptions::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        InvariantViolation::ChainedIndirection {
            composite: root,
            entity: chained,
            target: hash_text("door_proxy"),
        }
    );
}
