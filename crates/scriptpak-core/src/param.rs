// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tagged parameter values and their binary codec.
//!
//! On disk every value is a 4-byte data-type tag followed by a payload:
//!
//! | Type | Payload |
//! |---|---|
//! | `Transform` | position xyz, rotation stored as y, x, z |
//! | `Integer` | `i32` |
//! | `String` | self-relative header (`0x80` top byte), identifier of the text, UTF-8, NUL, pad to 4 |
//! | `Bool` | `i32`, 1 = true |
//! | `Float` | `f32` |
//! | `Resource` | identifier |
//! | `Vector` | xyz |
//! | `Enum` | enum type identifier, `i32` index |
//! | `Spline` | self-relative header, point count, points as `Transform` |

use once_cell::sync::Lazy;
use scriptpak_ident::{hash_text, Identifier, Interner};

use crate::pak::cursor::{
    decode_string_header, encode_spline_header, encode_string_header, Cursor, Writer,
    STRING_SENTINEL,
};
use crate::pak::read::ParseError;
use crate::resource::ResourceReference;

/// Three-component float vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl Vec3 {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Builds a vector.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, ParseError> {
        Ok(Self::new(
            cursor.read_f32()?,
            cursor.read_f32()?,
            cursor.read_f32()?,
        ))
    }

    fn encode(self, writer: &mut Writer) {
        writer.write_f32(self.x);
        writer.write_f32(self.y);
        writer.write_f32(self.z);
    }
}

/// Position plus Euler rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    /// Position.
    pub position: Vec3,
    /// Rotation in degrees.
    pub rotation: Vec3,
}

impl Transform {
    /// Builds a transform.
    #[must_use]
    pub const fn new(position: Vec3, rotation: Vec3) -> Self {
        Self { position, rotation }
    }

    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, ParseError> {
        let position = Vec3::decode(cursor)?;
        // rotation is stored y, x, z
        let y = cursor.read_f32()?;
        let x = cursor.read_f32()?;
        let z = cursor.read_f32()?;
        Ok(Self::new(position, Vec3::new(x, y, z)))
    }

    fn encode(self, writer: &mut Writer) {
        self.position.encode(writer);
        writer.write_f32(self.rotation.y);
        writer.write_f32(self.rotation.x);
        writer.write_f32(self.rotation.z);
    }
}

/// Value type of a parameter or variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataType {
    /// [`Transform`].
    Transform,
    /// `i32`.
    Integer,
    /// UTF-8 text.
    String,
    /// Boolean.
    Bool,
    /// `f32`.
    Float,
    /// Resource binding.
    Resource,
    /// [`Vec3`].
    Vector,
    /// Enum type plus index.
    Enum,
    /// Sequence of transforms.
    Spline,
}

static TYPE_TAGS: Lazy<[(DataType, Identifier); 9]> =
    Lazy::new(|| DataType::ALL.map(|ty| (ty, hash_text(ty.tag_name()))));

impl DataType {
    /// Every data type.
    pub const ALL: [Self; 9] = [
        Self::Transform,
        Self::Integer,
        Self::String,
        Self::Bool,
        Self::Float,
        Self::Resource,
        Self::Vector,
        Self::Enum,
        Self::Spline,
    ];

    /// Text whose identifier tags this type on disk.
    #[must_use]
    pub const fn tag_name(self) -> &'static str {
        match self {
            Self::Transform => "Position",
            Self::Integer => "int",
            Self::String => "String",
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Resource => "ShortGuid",
            Self::Vector => "Direction",
            Self::Enum => "Enum",
            Self::Spline => "SplineData",
        }
    }

    /// On-disk tag identifier.
    pub fn tag(self) -> Identifier {
        TYPE_TAGS[self as usize].1
    }

    /// Looks a type up by its on-disk tag.
    pub fn from_tag(tag: Identifier) -> Option<Self> {
        TYPE_TAGS
            .iter()
            .find(|(_, id)| *id == tag)
            .map(|(ty, _)| *ty)
    }

    /// Type-correct default value.
    ///
    /// Resources default to a binding named after `owner` with no
    /// references; enums default to index 0 of `enum_type`.
    #[must_use]
    pub fn default_value(self, owner: Identifier, enum_type: Identifier) -> ParameterValue {
        match self {
            Self::Transform => ParameterValue::Transform(Transform::default()),
            Self::Integer => ParameterValue::Integer(0),
            Self::String => ParameterValue::String(String::new()),
            Self::Bool => ParameterValue::Bool(false),
            Self::Float => ParameterValue::Float(0.0),
            Self::Resource => ParameterValue::Resource(ResourceParameter::new(owner)),
            Self::Vector => ParameterValue::Vector(Vec3::ZERO),
            Self::Enum => ParameterValue::Enum(EnumValue {
                enum_type,
                index: 0,
            }),
            Self::Spline => ParameterValue::Spline(Vec::new()),
        }
    }
}

/// RESOURCE value: the identifier resources are matched against, plus the
/// references matched onto it at load time (not stored with the value).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceParameter {
    /// Identifier stored on disk.
    pub id: Identifier,
    /// References whose owner equals `id`.
    pub references: Vec<ResourceReference>,
}

impl ResourceParameter {
    /// A binding with no references.
    #[must_use]
    pub const fn new(id: Identifier) -> Self {
        Self {
            id,
            references: Vec::new(),
        }
    }
}

/// ENUM value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValue {
    /// Enum type.
    pub enum_type: Identifier,
    /// Selected index.
    pub index: i32,
}

/// A decoded parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// Position plus rotation.
    Transform(Transform),
    /// Integer.
    Integer(i32),
    /// Text.
    String(String),
    /// Boolean.
    Bool(bool),
    /// Float.
    Float(f32),
    /// Resource binding.
    Resource(ResourceParameter),
    /// Direction vector.
    Vector(Vec3),
    /// Enum selection.
    Enum(EnumValue),
    /// Spline points.
    Spline(Vec<Transform>),
}

impl ParameterValue {
    /// Data type of this value.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::Transform(_) => DataType::Transform,
            Self::Integer(_) => DataType::Integer,
            Self::String(_) => DataType::String,
            Self::Bool(_) => DataType::Bool,
            Self::Float(_) => DataType::Float,
            Self::Resource(_) => DataType::Resource,
            Self::Vector(_) => DataType::Vector,
            Self::Enum(_) => DataType::Enum,
            Self::Spline(_) => DataType::Spline,
        }
    }

    /// Decodes a tag and payload at the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnknownDataType`] for an unrecognised tag and
    /// any cursor error for truncated payloads.
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, ParseError> {
        let offset = cursor.position();
        let tag = cursor.read_id()?;
        let ty = DataType::from_tag(tag).ok_or(ParseError::UnknownDataType { tag, offset })?;
        Self::decode_payload(ty, cursor)
    }

    /// Decodes the payload of a value whose tag has already been read.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::BadStringHeader`] when a STRING header lacks its
    /// sentinel byte, and any cursor error for truncated payloads.
    pub fn decode_payload(ty: DataType, cursor: &mut Cursor<'_>) -> Result<Self, ParseError> {
        Ok(match ty {
            DataType::Transform => Self::Transform(Transform::decode(cursor)?),
            DataType::Integer => Self::Integer(cursor.read_i32()?),
            DataType::String => {
                let offset = cursor.position();
                let (_, sentinel) = decode_string_header(cursor.read_u32()?);
                if sentinel != STRING_SENTINEL {
                    return Err(ParseError::BadStringHeader { offset, sentinel });
                }
                // identifier of the text
                cursor.skip(4)?;
                let text = cursor.read_cstr()?.to_owned();
                cursor.align()?;
                Self::String(text)
            }
            DataType::Bool => Self::Bool(cursor.read_i32()? == 1),
            DataType::Float => Self::Float(cursor.read_f32()?),
            DataType::Resource => Self::Resource(ResourceParameter::new(cursor.read_id()?)),
            DataType::Vector => Self::Vector(Vec3::decode(cursor)?),
            DataType::Enum => Self::Enum(EnumValue {
                enum_type: cursor.read_id()?,
                index: cursor.read_i32()?,
            }),
            DataType::Spline => {
                cursor.skip(4)?;
                let count = cursor.read_u32()?;
                let mut points = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    points.push(Transform::decode(cursor)?);
                }
                Self::Spline(points)
            }
        })
    }

    /// Encodes the tag and payload at the writer's position.
    ///
    /// STRING values register their text with `interner`.
    #[allow(clippy::cast_possible_truncation)] // spline lengths are far below u32::MAX
    pub fn encode(&self, writer: &mut Writer, interner: &mut Interner) {
        writer.write_id(self.data_type().tag());
        match self {
            Self::Transform(t) => t.encode(writer),
            Self::Integer(v) => writer.write_i32(*v),
            Self::String(text) => {
                writer.write_u32(encode_string_header(writer.position()));
                writer.write_id(interner.generate(text));
                writer.write_cstr(text);
                writer.align();
            }
            Self::Bool(v) => writer.write_i32(i32::from(*v)),
            Self::Float(v) => writer.write_f32(*v),
            Self::Resource(r) => writer.write_id(r.id),
            Self::Vector(v) => v.encode(writer),
            Self::Enum(e) => {
                writer.write_id(e.enum_type);
                writer.write_i32(e.index);
            }
            Self::Spline(points) => {
                writer.write_u32(encode_spline_header(writer.position()));
                writer.write_u32(points.len() as u32);
                for point in points {
                    point.encode(writer);
                }
            }
        }
    }

    /// Position-independent bytes identifying the stored form of this value.
    ///
    /// Two values with equal keys may share one on-disk slot. Resource
    /// references are not part of the stored form and do not affect the key.
    pub fn storage_key(&self, interner: &mut Interner) -> Vec<u8> {
        let mut writer = Writer::new();
        self.encode(&mut writer, interner);
        writer.into_vec()
    }
}

/// A named value attached to an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name.
    pub name: Identifier,
    /// Value.
    pub value: ParameterValue,
}

impl Parameter {
    /// Builds a parameter.
    #[must_use]
    pub const fn new(name: Identifier, value: ParameterValue) -> Self {
        Self { name, value }
    }
}
