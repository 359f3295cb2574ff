// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Entities, links and the per-variant payloads.

use std::fmt;

use scriptpak_ident::{hash_text, Identifier};

use crate::builtin::{CAGE_ANIMATION, TRIGGER_SEQUENCE};
use crate::param::{DataType, Parameter, ParameterValue};
use crate::resource::ResourceReference;

/// Outgoing connection from a pin on one entity to a pin on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Link identifier.
    pub id: Identifier,
    /// Pin on the owning entity.
    pub source_pin: Identifier,
    /// Pin on the target entity.
    pub target_pin: Identifier,
    /// Target entity.
    pub target: Identifier,
}

/// Hierarchy path: entity identifiers through nested composite instances,
/// terminated by a zero sentinel.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct EntityPath(Vec<Identifier>);

impl EntityPath {
    /// Builds a path from its steps, appending the sentinel.
    pub fn new(steps: impl IntoIterator<Item = Identifier>) -> Self {
        let mut raw: Vec<Identifier> = steps.into_iter().collect();
        raw.push(Identifier::INVALID);
        Self(raw)
    }

    /// Wraps identifiers exactly as stored, sentinel included.
    #[must_use]
    pub const fn from_raw(raw: Vec<Identifier>) -> Self {
        Self(raw)
    }

    /// Identifiers exactly as stored.
    #[must_use]
    pub fn as_raw(&self) -> &[Identifier] {
        &self.0
    }

    /// Steps without the trailing sentinel.
    #[must_use]
    pub fn steps(&self) -> &[Identifier] {
        match self.0.split_last() {
            Some((last, rest)) if last.is_invalid() => rest,
            _ => &self.0,
        }
    }

    /// Checksum stored alongside an alias holding this path.
    ///
    /// Hash of the steps' `AA-BB-CC-DD` forms joined by `/`.
    #[must_use]
    pub fn checksum(&self) -> Identifier {
        let text = self
            .steps()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("/");
        hash_text(&text)
    }
}

impl fmt::Debug for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.steps()).finish()
    }
}

/// Float keyframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    /// Time in seconds.
    pub time: f32,
    /// Value at `time`.
    pub value: f32,
}

/// Named event marker on a timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventMarker {
    /// Time in seconds.
    pub time: f32,
    /// Event name.
    pub name: Identifier,
}

/// Keyframed float track driving one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Track identifier.
    pub id: Identifier,
    /// Animated parameter.
    pub parameter: Identifier,
    /// Keyframes in time order.
    pub keys: Vec<Keyframe>,
}

/// Extra data of an animation entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimationData {
    /// Float tracks.
    pub tracks: Vec<Track>,
    /// Event markers.
    pub events: Vec<EventMarker>,
}

/// Timed trigger firing the entity at `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    /// Time in seconds.
    pub time: f32,
    /// Triggered entity.
    pub path: EntityPath,
}

/// Extra data of a trigger-sequence entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriggerSequenceData {
    /// Triggers in time order.
    pub triggers: Vec<Trigger>,
    /// Event markers.
    pub events: Vec<EventMarker>,
}

/// Structured data some built-in function types carry.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FunctionData {
    /// Plain function.
    #[default]
    None,
    /// Tracks and events.
    Animation(AnimationData),
    /// Triggers and events.
    TriggerSequence(TriggerSequenceData),
}

impl FunctionData {
    /// Empty extra data appropriate for `function`.
    pub fn for_function(function: Identifier) -> Self {
        if function == *CAGE_ANIMATION {
            Self::Animation(AnimationData::default())
        } else if function == *TRIGGER_SEQUENCE {
            Self::TriggerSequence(TriggerSequenceData::default())
        } else {
            Self::None
        }
    }
}

/// Payload of a function entity.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionEntity {
    /// Built-in function type, or the identifier of an instanced composite.
    pub function: Identifier,
    /// Resources bound directly to the entity.
    pub resources: Vec<ResourceReference>,
    /// Type-specific extra data.
    pub extra: FunctionData,
}

impl FunctionEntity {
    /// A function entity with no resources and empty extra data.
    pub fn new(function: Identifier) -> Self {
        Self {
            function,
            resources: Vec::new(),
            extra: FunctionData::for_function(function),
        }
    }
}

/// The four entity variants.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    /// Built-in function call or composite instance.
    Function(FunctionEntity),
    /// Composite-level exposed pin.
    Variable {
        /// Pin name.
        name: Identifier,
        /// Declared value type.
        data_type: DataType,
    },
    /// Indirection to an entity in another scope.
    Proxy {
        /// Target path.
        path: EntityPath,
        /// Disambiguator for repeated proxying.
        extra: Identifier,
    },
    /// Indirection within the owning composite's instance tree.
    Alias {
        /// Target path.
        path: EntityPath,
        /// Path checksum.
        checksum: Identifier,
    },
}

/// A node in a composite.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Entity identifier, unique within its composite.
    pub id: Identifier,
    /// Outgoing links.
    pub links: Vec<Link>,
    /// Parameters; names are unique.
    pub parameters: Vec<Parameter>,
    /// Variant payload.
    pub kind: EntityKind,
}

impl Entity {
    /// An entity without links or parameters.
    #[must_use]
    pub const fn new(id: Identifier, kind: EntityKind) -> Self {
        Self {
            id,
            links: Vec::new(),
            parameters: Vec::new(),
            kind,
        }
    }

    /// Function payload, if this is a function entity.
    #[must_use]
    pub const fn as_function(&self) -> Option<&FunctionEntity> {
        match &self.kind {
            EntityKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Mutable function payload, if this is a function entity.
    pub fn as_function_mut(&mut self) -> Option<&mut FunctionEntity> {
        match &mut self.kind {
            EntityKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Target path of a proxy or alias.
    #[must_use]
    pub const fn path(&self) -> Option<&EntityPath> {
        match &self.kind {
            EntityKind::Proxy { path, .. } | EntityKind::Alias { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Appends a link from `source_pin` to `target_pin` on `target`.
    pub fn add_link(
        &mut self,
        id: Identifier,
        source_pin: Identifier,
        target: Identifier,
        target_pin: Identifier,
    ) {
        self.links.push(Link {
            id,
            source_pin,
            target_pin,
            target,
        });
    }

    /// Parameter named `name`.
    #[must_use]
    pub fn parameter(&self, name: Identifier) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Mutable parameter named `name`.
    pub fn parameter_mut(&mut self, name: Identifier) -> Option<&mut Parameter> {
        self.parameters.iter_mut().find(|p| p.name == name)
    }

    /// Sets `name` to `value`, returning the value it replaced.
    pub fn set_parameter(
        &mut self,
        name: Identifier,
        value: ParameterValue,
    ) -> Option<ParameterValue> {
        if let Some(existing) = self.parameter_mut(name) {
            return Some(std::mem::replace(&mut existing.value, value));
        }
        self.parameters.push(Parameter::new(name, value));
        None
    }

    /// Removes and returns the parameter named `name`.
    pub fn remove_parameter(&mut self, name: Identifier) -> Option<Parameter> {
        let index = self.parameters.iter().position(|p| p.name == name)?;
        Some(self.parameters.remove(index))
    }

    /// Every resource reference the entity holds, directly or through its
    /// RESOURCE parameters.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceReference> {
        let direct = self.as_function().map(|f| f.resources.as_slice());
        self.parameters
            .iter()
            .filter_map(|p| match &p.value {
                ParameterValue::Resource(r) => Some(r.references.as_slice()),
                _ => None,
            })
            .chain(direct)
            .flatten()
    }
}
