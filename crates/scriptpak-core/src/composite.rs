// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Composites: named sub-graphs of entities.

use std::collections::BTreeMap;

use scriptpak_ident::{Identifier, Interner};

use crate::entity::{Entity, EntityKind, EntityPath, FunctionEntity};
use crate::functions::ParameterVariant;
use crate::pak::types::OffsetPair;
use crate::param::DataType;

/// A named sub-graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    /// Composite identifier.
    pub id: Identifier,
    /// Composite name, usually a `\`-separated path.
    pub name: String,
    /// Entities in model order.
    pub entities: Vec<Entity>,
    /// Opaque UNKNOWN_COUNTS pair, written back as read.
    pub unknown: OffsetPair,
    /// Pin classification of variables, used when applying defaults.
    /// Not stored in the container.
    pub pin_variants: BTreeMap<Identifier, ParameterVariant>,
}

impl Composite {
    /// Creates an empty composite whose identifier is the hash of `name`.
    pub fn new(name: &str, interner: &mut Interner) -> Self {
        Self::with_id(interner.generate(name), name)
    }

    /// Creates an empty composite with an explicit identifier.
    pub fn with_id(id: Identifier, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            entities: Vec::new(),
            unknown: OffsetPair::default(),
            pin_variants: BTreeMap::new(),
        }
    }

    /// Entity with identifier `id`.
    #[must_use]
    pub fn entity(&self, id: Identifier) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Mutable entity with identifier `id`.
    pub fn entity_mut(&mut self, id: Identifier) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    /// Adds an entity, replacing any entity with the same identifier.
    pub fn add_entity(&mut self, entity: Entity) -> &mut Entity {
        let index = match self.entities.iter().position(|e| e.id == entity.id) {
            Some(index) => {
                self.entities[index] = entity;
                index
            }
            None => {
                self.entities.push(entity);
                self.entities.len() - 1
            }
        };
        &mut self.entities[index]
    }

    /// Adds a function entity calling `function` (a built-in type or a
    /// composite identifier).
    pub fn add_function(&mut self, id: Identifier, function: Identifier) -> &mut Entity {
        self.add_entity(Entity::new(
            id,
            EntityKind::Function(FunctionEntity::new(function)),
        ))
    }

    /// Adds an exposed variable holding a default value of `data_type`.
    pub fn add_variable(
        &mut self,
        id: Identifier,
        name: Identifier,
        data_type: DataType,
    ) -> &mut Entity {
        let mut entity = Entity::new(id, EntityKind::Variable { name, data_type });
        entity.set_parameter(name, data_type.default_value(id, Identifier::INVALID));
        self.add_entity(entity)
    }

    /// Adds a proxy to the entity at `path`.
    pub fn add_proxy(&mut self, id: Identifier, path: EntityPath) -> &mut Entity {
        self.add_entity(Entity::new(
            id,
            EntityKind::Proxy {
                path,
                extra: Identifier::INVALID,
            },
        ))
    }

    /// Adds an alias of the entity at `path`, computing its checksum.
    pub fn add_alias(&mut self, id: Identifier, path: EntityPath) -> &mut Entity {
        let checksum = path.checksum();
        self.add_entity(Entity::new(id, EntityKind::Alias { path, checksum }))
    }

    /// Removes an entity and every link in this composite that targets it.
    pub fn remove_entity(&mut self, id: Identifier) -> Option<Entity> {
        let index = self.entities.iter().position(|e| e.id == id)?;
        let removed = self.entities.remove(index);
        for entity in &mut self.entities {
            entity.links.retain(|l| l.target != id);
        }
        self.pin_variants.remove(&id);
        Some(removed)
    }

    /// Function entities.
    pub fn functions(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::Function(_)))
    }

    /// Exposed variables.
    pub fn variables(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::Variable { .. }))
    }

    /// Proxies.
    pub fn proxies(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::Proxy { .. }))
    }

    /// Aliases (the overrides of the container).
    pub fn aliases(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::Alias { .. }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::param::ParameterValue;
    use scriptpak_ident::hash_text;

    #[test]
    fn remove_entity_drops_incoming_links() {
        let mut interner = Interner::new();
        let mut c = Composite::new("LEVEL\\door", &mut interner);
        let a = hash_text("a");
        let b = hash_text("b");
        c.add_function(a, hash_text("Zone"))
            .add_link(hash_text("l"), hash_text("out"), b, hash_text("in"));
        c.add_function(b, hash_text("Zone"));
        assert!(c.remove_entity(b).is_some());
        assert!(c.entity(a).unwrap().links.is_empty());
        assert!(c.remove_entity(b).is_none());
    }

    #[test]
    fn variant_views_partition_entities() {
        let mut c = Composite::with_id(hash_text("c"), "c");
        c.add_function(hash_text("f"), hash_text("Zone"));
        c.add_variable(hash_text("v"), hash_text("open"), DataType::Bool);
        c.add_proxy(hash_text("p"), EntityPath::new([hash_text("x")]));
        c.add_alias(hash_text("al"), EntityPath::new([hash_text("f")]));
        assert_eq!(c.functions().count(), 1);
        assert_eq!(c.variables().count(), 1);
        assert_eq!(c.proxies().count(), 1);
        assert_eq!(c.aliases().count(), 1);
        assert_eq!(
            c.entity(hash_text("v"))
                .unwrap()
                .parameter(hash_text("open"))
                .unwrap()
                .value,
            ParameterValue::Bool(false)
        );
    }

    #[test]
    fn add_entity_replaces_same_id() {
        let mut c = Composite::with_id(hash_text("c"), "c");
        c.add_function(hash_text("f"), hash_text("Zone"));
        c.add_function(hash_text("f"), hash_text("Door"));
        assert_eq!(c.entities.len(), 1);
        assert_eq!(
            c.entities[0].as_function().unwrap().function,
            hash_text("Door")
        );
    }
}
