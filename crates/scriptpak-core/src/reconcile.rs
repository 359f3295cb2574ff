// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Matching a composite's flat resource list onto its owners.
//!
//! On disk a composite stores one resource list. In memory each reference
//! lives with its owner: a RESOURCE parameter whose identifier equals the
//! reference's owner, otherwise the function entity with that identifier.

use rustc_hash::FxHashMap;
use scriptpak_ident::Identifier;
use tracing::debug;

use crate::builtin::PHYSICS_SYSTEM;
use crate::composite::Composite;
use crate::entity::EntityKind;
use crate::param::ParameterValue;
use crate::report::{Report, Warning};
use crate::resource::{ResourceKind, ResourceReference};

/// Where a resource lands: entity index plus parameter index, or `None` for
/// the entity's own list.
type Slot = (usize, Option<usize>);
type SlotMap = FxHashMap<Identifier, Slot>;

fn owner_slots(composite: &Composite) -> (SlotMap, SlotMap) {
    let mut by_parameter = FxHashMap::default();
    let mut by_entity = FxHashMap::default();
    for (ei, entity) in composite.entities.iter().enumerate() {
        for (pi, parameter) in entity.parameters.iter().enumerate() {
            if let ParameterValue::Resource(r) = &parameter.value {
                by_parameter.entry(r.id).or_insert((ei, Some(pi)));
            }
        }
        if matches!(entity.kind, EntityKind::Function(_)) {
            by_entity.entry(entity.id).or_insert((ei, None));
        }
    }
    (by_parameter, by_entity)
}

fn place(composite: &mut Composite, (ei, pi): Slot, resource: ResourceReference) {
    let entity = &mut composite.entities[ei];
    match pi {
        Some(pi) => {
            if let ParameterValue::Resource(r) = &mut entity.parameters[pi].value {
                r.references.push(resource);
            }
        }
        None => {
            if let Some(f) = entity.as_function_mut() {
                f.resources.push(resource);
            }
        }
    }
}

/// Distributes `pool` onto the composite's owners.
///
/// References go to a RESOURCE parameter with a matching identifier first,
/// then to the function entity with that identifier. A single leftover
/// dynamic-physics reference is attached to the first `PhysicsSystem`
/// entity. Whatever remains is reported and returned.
pub fn distribute(
    composite: &mut Composite,
    pool: Vec<ResourceReference>,
    report: &mut Report,
) -> Vec<ResourceReference> {
    let (by_parameter, by_entity) = owner_slots(composite);
    let mut leftovers = Vec::new();
    for resource in pool {
        match by_parameter
            .get(&resource.owner)
            .or_else(|| by_entity.get(&resource.owner))
        {
            Some(slot) => place(composite, *slot, resource),
            None => leftovers.push(resource),
        }
    }

    let physics: Vec<usize> = leftovers
        .iter()
        .enumerate()
        .filter(|(_, r)| r.kind() == ResourceKind::DynamicPhysicsSystem)
        .map(|(i, _)| i)
        .collect();
    if let [only] = physics.as_slice() {
        let system = composite.entities.iter().position(|e| {
            e.as_function()
                .is_some_and(|f| f.function == *PHYSICS_SYSTEM)
        });
        if let Some(ei) = system {
            let resource = leftovers.remove(*only);
            debug!(
                composite = %composite.id,
                entity = %composite.entities[ei].id,
                "attached leftover physics resource"
            );
            place(composite, (ei, None), resource);
        }
    }

    if !leftovers.is_empty() {
        report.push(Warning::TrailingResources {
            composite: composite.id,
            count: leftovers.len(),
        });
    }
    leftovers
}

/// Copies every resource reference out of the composite in model order:
/// per entity, parameter-held references first, then direct ones.
pub fn collect(composite: &Composite) -> Vec<ResourceReference> {
    composite
        .entities
        .iter()
        .flat_map(|e| e.resources().copied())
        .collect()
}

/// Moves every resource reference out of the composite.
pub fn take(composite: &mut Composite) -> Vec<ResourceReference> {
    let mut pool = Vec::new();
    for entity in &mut composite.entities {
        for parameter in &mut entity.parameters {
            if let ParameterValue::Resource(r) = &mut parameter.value {
                pool.append(&mut r.references);
            }
        }
        if let Some(f) = entity.as_function_mut() {
            pool.append(&mut f.resources);
        }
    }
    pool
}

/// Re-runs distribution over the composite's own references.
///
/// Returns the references no owner claimed; a consistent composite yields
/// none and an empty report.
pub fn reconcile(composite: &mut Composite) -> (Vec<ResourceReference>, Report) {
    let pool = take(composite);
    let mut report = Report::new();
    let leftovers = distribute(composite, pool, &mut report);
    (leftovers, report)
}
