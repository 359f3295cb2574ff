// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use scriptpak_core::pak::cursor::{Cursor, Writer};
use scriptpak_core::{
    EnumValue, Identifier, Interner, ParameterValue, ResourceParameter, Transform, Vec3,
};

fn finite() -> impl Strategy<Value = f32> {
    -1.0e6f32..1.0e6f32
}

fn vec3() -> impl Strategy<Value = Vec3> {
    (finite(), finite(), finite()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn transform() -> impl Strategy<Value = Transform> {
    (vec3(), vec3()).prop_map(|(p, r)| Transform::new(p, r))
}

fn identifier() -> impl Strategy<Value = Identifier> {
    any::<[u8; 4]>().prop_map(Identifier::from_bytes)
}

fn value() -> impl Strategy<Value = ParameterValue> {
    prop_oneof![
        transform().prop_map(ParameterValue::Transform),
        any::<i32>().prop_map(ParameterValue::Integer),
        "[A-Za-z0-9_ ]{0,40}".prop_map(ParameterValue::String),
        any::<bool>().prop_map(ParameterValue::Bool),
        finite().prop_map(ParameterValue::Float),
        identifier().prop_map(|id| ParameterValue::Resource(ResourceParameter::new(id))),
        vec3().prop_map(ParameterValue::Vector),
        (identifier(), any::<i32>()).prop_map(|(enum_type, index)| {
            ParameterValue::Enum(EnumValue { enum_type, index })
        }),
        prop::collection::vec(transform(), 0..5).prop_map(ParameterValue::Spline),
    ]
}

proptest! {
    #[test]
    fn decode_inverts_encode(values in prop::collection::vec(value(), 1..8)) {
        let mut interner = Interner::new();
        let mut writer = Writer::new();
        let mut starts = Vec::new();
        for value in &values {
            starts.push(writer.position());
            value.encode(&mut writer, &mut interner);
        }
        let bytes = writer.into_vec();
        prop_assert_eq!(bytes.len() % 4, 0);

        let mut cursor = Cursor::new(&bytes);
        for (value, start) in values.iter().zip(starts) {
            prop_assert_eq!(cursor.position(), start);
            let decoded = ParameterValue::decode(&mut cursor).unwrap();
            prop_assert_eq!(&decoded, value);
        }
        prop_assert!(cursor.position() == bytes.len());
    }

    #[test]
    fn placement_only_moves_relative_headers(value in value(), padding in 0usize..4) {
        let mut interner = Interner::new();
        let key = value.storage_key(&mut interner);
        let mut writer = Writer::new();
        for _ in 0..padding {
            writer.write_u32(0);
        }
        value.encode(&mut writer, &mut interner);
        let placed_equal = &writer.as_slice()[padding * 4..] == key.as_slice();
        // only STRING and SPLINE carry self-relative header words
        let relative = matches!(value, ParameterValue::String(_) | ParameterValue::Spline(_));
        prop_assert_eq!(placed_equal, !relative || padding == 0);
    }
}
