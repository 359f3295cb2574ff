// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code, clippy::expect_used)]

use scriptpak_core::entity::{AnimationData, EventMarker, Keyframe, Track, Trigger, TriggerSequenceData};
use scriptpak_core::{
    builtin, Commands, Composite, DataType, EntityPath, EntryPoint, FunctionData, Interner,
    ParameterValue, ResourceKind, ResourceParameter, ResourceReference, ResourceWarnings,
    Transform, Vec3,
};

/// Names every fixture entity is generated from.
pub const ROOT: &str = "LEVEL";
pub const ROOM: &str = "LEVEL\\room";
pub const GLOBAL: &str = "GLOBAL";
pub const PAUSE: &str = "PAUSEMENU";

/// A composite with only its name set.
pub fn empty(name: &str, interner: &mut Interner) -> Composite {
    Composite::new(name, interner)
}

/// A container with all three entry points set and nothing else.
pub fn minimal(interner: &mut Interner) -> Commands {
    let mut commands = Commands::new();
    for (which, name) in [
        (EntryPoint::Root, ROOT),
        (EntryPoint::Global, GLOBAL),
        (EntryPoint::PauseMenu, PAUSE),
    ] {
        let id = commands.add_composite(empty(name, interner)).id;
        commands.set_entry_point(which, id);
    }
    commands
}

/// A small level: a room instanced from the root, with animation, trigger
/// sequence, variable, proxy and alias entities, links and resources.
pub fn level(interner: &mut Interner) -> Commands {
    let mut commands = minimal(interner);

    let mut room = empty(ROOM, interner);
    let door = interner.generate("door_01");
    let name = interner.generate("name");
    let position = interner.generate("position");
    let entity = room.add_function(door, interner.generate("Door"));
    entity.set_parameter(name, ParameterValue::String("door_01".to_owned()));
    entity.set_parameter(
        position,
        ParameterValue::Transform(Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, 90.0, 0.0),
        )),
    );

    let model = interner.generate("door_model");
    let model_type = interner.generate("ModelReference");
    let resource = room.add_function(model, model_type);
    resource.set_parameter(
        *builtin::RESOURCE_PARAMETER,
        ParameterValue::Resource(ResourceParameter {
            id: model,
            references: vec![ResourceReference::new(model, ResourceKind::RenderableInstance)],
        }),
    );

    let anim = interner.generate("door_anim");
    let frame = interner.generate("frame");
    let open = interner.generate("open");
    let track = interner.generate("track_0");
    if let Some(f) = room.add_function(anim, *builtin::CAGE_ANIMATION).as_function_mut() {
        f.extra = FunctionData::Animation(AnimationData {
            tracks: vec![Track {
                id: track,
                parameter: frame,
                keys: vec![
                    Keyframe { time: 0.0, value: 0.0 },
                    Keyframe { time: 1.5, value: 1.0 },
                ],
            }],
            events: vec![EventMarker { time: 1.5, name: open }],
        });
    }

    let sequence = interner.generate("door_sequence");
    let trigger = interner.generate("trigger");
    let on_finished = interner.generate("on_finished");
    let link = interner.generate("link_0");
    let entity = room.add_function(sequence, *builtin::TRIGGER_SEQUENCE);
    entity.add_link(link, on_finished, door, trigger);
    if let Some(f) = entity.as_function_mut() {
        f.extra = FunctionData::TriggerSequence(TriggerSequenceData {
            triggers: vec![Trigger {
                time: 0.25,
                path: EntityPath::new([door]),
            }],
            events: vec![],
        });
    }

    let locked = interner.generate("locked");
    room.add_variable(locked, locked, DataType::Bool);
    let room_id = commands.add_composite(room).id;

    let root_id = commands.entry_point(EntryPoint::Root).expect("root").id;
    let instance = interner.generate("room_instance");
    let barrier = interner.generate("barrier");
    let barrier_type = interner.generate("CollisionBarrier");
    let proxy = interner.generate("door_proxy");
    let alias = interner.generate("door_alias");
    let root = commands.composite_mut(root_id).expect("root");
    root.add_function(instance, room_id);
    root.add_function(barrier, barrier_type);
    root.add_proxy(proxy, EntityPath::new([instance, door]));
    root.add_alias(alias, EntityPath::new([instance, door]));
    commands
}

/// Encodes, reporting warnings with the default policy.
pub fn encode(commands: &mut Commands, interner: &mut Interner) -> Vec<u8> {
    commands
        .to_bytes(interner, ResourceWarnings::Warn)
        .expect("encode")
        .0
}

/// Routes `tracing` output through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
