// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Materialising missing parameters from function-type metadata.

use scriptpak_ident::{Identifier, Interner};
use thiserror::Error;

use crate::builtin::{COMPOSITE_INTERFACE, PROXY_INTERFACE};
use crate::commands::Commands;
use crate::composite::Composite;
use crate::entity::{Entity, EntityKind, FunctionEntity};
use crate::functions::{FunctionTypeTable, ParameterVariant, ParameterVariants};
use crate::param::{DataType, Parameter};
use crate::report::{Report, Warning};
use crate::resolve::Resolver;

/// A combination the data model cannot legitimately produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A proxy or alias resolves to another proxy or alias.
    #[error("composite {composite}: indirection {entity} targets indirection {target}")]
    ChainedIndirection {
        /// Owning composite.
        composite: Identifier,
        /// Proxy or alias entity.
        entity: Identifier,
        /// Proxy or alias it resolved to.
        target: Identifier,
    },
    /// The requested composite does not exist.
    #[error("unknown composite {0}")]
    UnknownComposite(Identifier),
    /// The requested entity does not exist in its composite.
    #[error("composite {composite}: unknown entity {entity}")]
    UnknownEntity {
        /// Composite searched.
        composite: Identifier,
        /// Missing entity.
        entity: Identifier,
    },
}

/// Which defaults to apply and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultOptions {
    /// Parameter variants to materialise.
    pub variants: ParameterVariants,
    /// Replace existing values.
    pub overwrite: bool,
    /// Walk base types, not just the concrete type.
    pub include_inherited: bool,
}

impl Default for DefaultOptions {
    fn default() -> Self {
        Self {
            variants: ParameterVariants::ALL,
            overwrite: false,
            include_inherited: true,
        }
    }
}

/// Computes default parameters without modifying the container.
#[derive(Debug, Clone, Copy)]
pub struct DefaultEngine<'a> {
    commands: &'a Commands,
    interner: &'a Interner,
    table: &'a FunctionTypeTable,
    options: DefaultOptions,
}

impl<'a> DefaultEngine<'a> {
    /// An engine over one container.
    #[must_use]
    pub const fn new(
        commands: &'a Commands,
        interner: &'a Interner,
        table: &'a FunctionTypeTable,
        options: DefaultOptions,
    ) -> Self {
        Self {
            commands,
            interner,
            table,
            options,
        }
    }

    /// Defaults for `entity` in `composite`, one per name, most derived
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::ChainedIndirection`] when a proxy or
    /// alias resolves to another proxy or alias.
    pub fn defaults_for(
        &self,
        composite: &Composite,
        entity: &Entity,
        report: &mut Report,
    ) -> Result<Vec<Parameter>, InvariantViolation> {
        let mut out = Vec::new();
        self.collect(composite, entity, entity.id, &mut out, report)?;
        Ok(out)
    }

    fn collect(
        &self,
        composite: &Composite,
        entity: &Entity,
        owner: Identifier,
        out: &mut Vec<Parameter>,
        report: &mut Report,
    ) -> Result<(), InvariantViolation> {
        match &entity.kind {
            EntityKind::Function(f) => self.collect_function(f, owner, out),
            EntityKind::Variable { name, data_type } => {
                let variant = composite
                    .pin_variants
                    .get(&entity.id)
                    .copied()
                    .unwrap_or(ParameterVariant::StateParameter);
                if self.options.variants.contains(variant) {
                    push(out, *name, *data_type, owner, Identifier::INVALID);
                }
            }
            EntityKind::Proxy { path, .. } | EntityKind::Alias { path, .. } => {
                let resolver = Resolver::new(self.commands, self.interner);
                match resolver.resolve_path(composite.id, path) {
                    Some(target) => {
                        if matches!(
                            target.entity.kind,
                            EntityKind::Proxy { .. } | EntityKind::Alias { .. }
                        ) {
                            return Err(InvariantViolation::ChainedIndirection {
                                composite: composite.id,
                                entity: entity.id,
                                target: target.entity.id,
                            });
                        }
                        self.collect(target.composite, target.entity, owner, out, report)?;
                    }
                    None => report.push(Warning::DanglingPath {
                        composite: composite.id,
                        entity: entity.id,
                    }),
                }
                self.collect_type(*PROXY_INTERFACE, owner, out);
            }
        }
        Ok(())
    }

    fn collect_function(&self, f: &FunctionEntity, owner: Identifier, out: &mut Vec<Parameter>) {
        let Some(instanced) = self.commands.composite(f.function) else {
            self.collect_type(f.function, owner, out);
            return;
        };
        self.collect_type(*COMPOSITE_INTERFACE, owner, out);
        for variable in instanced.variables() {
            let EntityKind::Variable { name, data_type } = &variable.kind else {
                continue;
            };
            let variant = instanced
                .pin_variants
                .get(&variable.id)
                .copied()
                .unwrap_or(ParameterVariant::StateParameter);
            if !self.options.variants.contains(variant) || out.iter().any(|p| p.name == *name) {
                continue;
            }
            let value = match variable.parameter(*name) {
                Some(p) if *data_type != DataType::Resource => p.value.clone(),
                _ => data_type.default_value(owner, Identifier::INVALID),
            };
            out.push(Parameter::new(*name, value));
        }
    }

    fn collect_type(&self, ty: Identifier, owner: Identifier, out: &mut Vec<Parameter>) {
        let ancestors = self.table.ancestors(ty);
        let chain = if self.options.include_inherited {
            ancestors
        } else {
            &ancestors[..ancestors.len().min(1)]
        };
        for &ty in chain {
            for variant in self.options.variants.iter() {
                for d in self.table.descriptors(ty, variant) {
                    push(out, d.name, d.data_type, owner, d.enum_type);
                }
            }
        }
    }
}

fn push(
    out: &mut Vec<Parameter>,
    name: Identifier,
    data_type: DataType,
    owner: Identifier,
    enum_type: Identifier,
) {
    if out.iter().all(|p| p.name != name) {
        out.push(Parameter::new(name, data_type.default_value(owner, enum_type)));
    }
}

fn apply(entity: &mut Entity, defaults: Vec<Parameter>, overwrite: bool) {
    for p in defaults {
        if overwrite || entity.parameter(p.name).is_none() {
            entity.set_parameter(p.name, p.value);
        }
    }
}

/// Applies defaults to one entity.
///
/// Existing values are kept unless `options.overwrite` is set.
///
/// # Errors
///
/// Returns [`InvariantViolation`] for unknown targets and chained
/// indirection.
pub fn apply_defaults(
    commands: &mut Commands,
    interner: &Interner,
    table: &FunctionTypeTable,
    composite: Identifier,
    entity: Identifier,
    options: DefaultOptions,
) -> Result<Report, InvariantViolation> {
    let mut report = Report::new();
    let defaults = {
        let engine = DefaultEngine::new(commands, interner, table, options);
        let c = commands
            .composite(composite)
            .ok_or(InvariantViolation::UnknownComposite(composite))?;
        let e = c
            .entity(entity)
            .ok_or(InvariantViolation::UnknownEntity { composite, entity })?;
        engine.defaults_for(c, e, &mut report)?
    };
    if let Some(target) = commands
        .composite_mut(composite)
        .and_then(|c| c.entity_mut(entity))
    {
        apply(target, defaults, options.overwrite);
    }
    Ok(report)
}

/// Applies defaults to every entity of a composite.
///
/// # Errors
///
/// As [`apply_defaults`].
pub fn apply_defaults_to_composite(
    commands: &mut Commands,
    interner: &Interner,
    table: &FunctionTypeTable,
    composite: Identifier,
    options: DefaultOptions,
) -> Result<Report, InvariantViolation> {
    let mut report = Report::new();
    let ids: Vec<Identifier> = commands
        .composite(composite)
        .ok_or(InvariantViolation::UnknownComposite(composite))?
        .entities
        .iter()
        .map(|e| e.id)
        .collect();
    for id in ids {
        report.merge(apply_defaults(
            commands, interner, table, composite, id, options,
        )?);
    }
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::EntryPoint;
    use crate::entity::EntityPath;
    use crate::functions::{FunctionTypeTableBuilder, ParameterDescriptor};
    use crate::param::ParameterValue;
    use scriptpak_ident::hash_text;

    fn table() -> FunctionTypeTable {
        let mut b = FunctionTypeTableBuilder::new();
        b.add_type(hash_text("Entity"), None)
            .add_type(hash_text("Door"), Some(hash_text("Entity")))
            .add_type(*PROXY_INTERFACE, None)
            .add_type(*COMPOSITE_INTERFACE, None)
            .add_descriptor(
                hash_text("Entity"),
                ParameterVariant::StateParameter,
                ParameterDescriptor::new(hash_text("name"), DataType::String),
            )
            .add_descriptor(
                hash_text("Door"),
                ParameterVariant::InputPin,
                ParameterDescriptor::new(hash_text("open"), DataType::Bool),
            )
            .add_descriptor(
                *PROXY_INTERFACE,
                ParameterVariant::MethodPin,
                ParameterDescriptor::new(hash_text("proxy_enable"), DataType::Bool),
            )
            .add_descriptor(
                *COMPOSITE_INTERFACE,
                ParameterVariant::MethodPin,
                ParameterDescriptor::new(hash_text("show_on_reset"), DataType::Bool),
            );
        b.build().unwrap()
    }

    fn fixture(interner: &mut Interner) -> (Commands, Identifier) {
        let mut c = Composite::new("LEVEL", interner);
        c.add_function(hash_text("door"), hash_text("Door"));
        let mut commands = Commands::new();
        let id = commands.add_composite(c).id;
        commands.set_entry_point(EntryPoint::Root, id);
        (commands, id)
    }

    #[test]
    fn inherited_defaults_fill_missing_parameters() {
        let mut interner = Interner::new();
        let (mut commands, root) = fixture(&mut interner);
        let table = table();
        let report = apply_defaults(
            &mut commands,
            &interner,
            &table,
            root,
            hash_text("door"),
            DefaultOptions::default(),
        )
        .unwrap();
        assert!(report.is_empty());
        let door = commands.composite(root).unwrap().entity(hash_text("door")).unwrap();
        assert_eq!(
            door.parameter(hash_text("open")).unwrap().value,
            ParameterValue::Bool(false)
        );
        assert!(door.parameter(hash_text("name")).is_some());
    }

    #[test]
    fn concrete_type_only_without_inheritance() {
        let mut interner = Interner::new();
        let (mut commands, root) = fixture(&mut interner);
        let table = table();
        let options = DefaultOptions {
            include_inherited: false,
            ..DefaultOptions::default()
        };
        apply_defaults(&mut commands, &interner, &table, root, hash_text("door"), options)
            .unwrap();
        let door = commands.composite(root).unwrap().entity(hash_text("door")).unwrap();
        assert!(door.parameter(hash_text("open")).is_some());
        assert!(door.parameter(hash_text("name")).is_none());
    }

    #[test]
    fn variant_mask_filters_descriptors() {
        let mut interner = Interner::new();
        let (mut commands, root) = fixture(&mut interner);
        let table = table();
        let options = DefaultOptions {
            variants: ParameterVariants::STATE_PARAMETER,
            ..DefaultOptions::default()
        };
        apply_defaults(&mut commands, &interner, &table, root, hash_text("door"), options)
            .unwrap();
        let door = commands.composite(root).unwrap().entity(hash_text("door")).unwrap();
        assert!(door.parameter(hash_text("open")).is_none());
        assert!(door.parameter(hash_text("name")).is_some());
    }

    #[test]
    fn proxy_to_proxy_is_an_invariant_violation() {
        let mut interner = Interner::new();
        let (mut commands, root) = fixture(&mut interner);
        let c = commands.composite_mut(root).unwrap();
        c.add_proxy(hash_text("p1"), EntityPath::new([hash_text("p2")]));
        c.add_proxy(hash_text("p2"), EntityPath::new([hash_text("door")]));
        let table = table();
        let err = apply_defaults(
            &mut commands,
            &interner,
            &table,
            root,
            hash_text("p1"),
            DefaultOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, InvariantViolation::ChainedIndirection { .. }));
    }

    #[test]
    fn proxy_inherits_target_and_interface_defaults() {
        let mut interner = Interner::new();
        let (mut commands, root) = fixture(&mut interner);
        commands
            .composite_mut(root)
            .unwrap()
            .add_proxy(hash_text("p"), EntityPath::new([hash_text("door")]));
        let table = table();
        apply_defaults(
            &mut commands,
            &interner,
            &table,
            root,
            hash_text("p"),
            DefaultOptions::default(),
        )
        .unwrap();
        let p = commands.composite(root).unwrap().entity(hash_text("p")).unwrap();
        assert!(p.parameter(hash_text("open")).is_some());
        assert!(p.parameter(hash_text("proxy_enable")).is_some());
    }

    #[test]
    fn dangling_alias_is_reported() {
        let mut interner = Interner::new();
        let (mut commands, root) = fixture(&mut interner);
        commands
            .composite_mut(root)
            .unwrap()
            .add_alias(hash_text("a"), EntityPath::new([hash_text("missing")]));
        let table = table();
        let report = apply_defaults(
            &mut commands,
            &interner,
            &table,
            root,
            hash_text("a"),
            DefaultOptions::default(),
        )
        .unwrap();
        assert_eq!(report.len(), 1);
    }
}
