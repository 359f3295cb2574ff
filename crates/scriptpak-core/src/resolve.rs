// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hierarchy path resolution through nested composite instances.

use std::borrow::Cow;

use scriptpak_ident::{Identifier, Interner};

use crate::commands::{Commands, EntryPoint};
use crate::composite::Composite;
use crate::entity::{Entity, EntityKind, EntityPath};

/// Result of a successful resolution.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    /// The entity the path names.
    pub entity: &'a Entity,
    /// Composite containing `entity`.
    pub composite: &'a Composite,
}

/// Resolves paths against one container.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    commands: &'a Commands,
    interner: &'a Interner,
}

impl<'a> Resolver<'a> {
    /// A resolver over `commands`, naming things through `interner`.
    #[must_use]
    pub const fn new(commands: &'a Commands, interner: &'a Interner) -> Self {
        Self { commands, interner }
    }

    /// Picks the composite the first step is looked up in, consuming the
    /// step when it names a composite rather than an entity.
    fn scope(&self, start: Identifier, first: Identifier) -> Option<(&'a Composite, bool)> {
        let has_first = |c: &&Composite| c.entity(first).is_some();
        if let Some(c) = self.commands.composite(start).filter(has_first) {
            return Some((c, false));
        }
        if let Some(c) = self.commands.entry_point(EntryPoint::Root).filter(has_first) {
            return Some((c, false));
        }
        self.commands.composite(first).map(|c| (c, true))
    }

    /// Walks `path` from `start`.
    ///
    /// When the first step is not an entity of `start`, the root entry
    /// point is tried, then a composite with that identifier (consuming the
    /// step). Every step but the last must be a function entity instancing
    /// an existing composite; any other step yields `None`.
    #[must_use]
    pub fn resolve(&self, start: Identifier, path: &[Identifier]) -> Option<Resolved<'a>> {
        self.walk(start, path, |_| {})
    }

    /// Like [`Resolver::resolve`] for a stored path.
    #[must_use]
    pub fn resolve_path(&self, start: Identifier, path: &EntityPath) -> Option<Resolved<'a>> {
        self.resolve(start, path.steps())
    }

    /// Resolves `path` and renders the entities along it joined by ` -> `,
    /// each prefixed with `[AA-BB-CC-DD] ` when `with_ids` is set.
    #[must_use]
    pub fn breadcrumb(
        &self,
        start: Identifier,
        path: &[Identifier],
        with_ids: bool,
    ) -> Option<(Resolved<'a>, String)> {
        let mut parts = Vec::new();
        let resolved = self.walk(start, path, |entity| {
            let name = self.display_name(entity);
            parts.push(if with_ids {
                format!("[{}] {name}", entity.id)
            } else {
                name.into_owned()
            });
        })?;
        Some((resolved, parts.join(" -> ")))
    }

    fn walk(
        &self,
        start: Identifier,
        path: &[Identifier],
        mut visit: impl FnMut(&'a Entity),
    ) -> Option<Resolved<'a>> {
        let steps = match path.split_last() {
            Some((last, rest)) if last.is_invalid() => rest,
            _ => path,
        };
        let (&first, _) = steps.split_first()?;
        let (mut composite, consumed) = self.scope(start, first)?;
        let steps = if consumed { &steps[1..] } else { steps };

        let (&last, inner) = steps.split_last()?;
        for &step in inner {
            let entity = composite.entity(step)?;
            visit(entity);
            composite = self.instanced(entity)?;
        }
        let entity = composite.entity(last)?;
        visit(entity);
        Some(Resolved { entity, composite })
    }

    /// Composite a function entity instances, if any.
    #[must_use]
    pub fn instanced(&self, entity: &Entity) -> Option<&'a Composite> {
        entity
            .as_function()
            .and_then(|f| self.commands.composite(f.function))
    }

    /// Human-readable name of an entity.
    ///
    /// Known entity names win; otherwise function entities use the
    /// instanced composite's name or their type's text, variables their
    /// name, and proxies and aliases their target step's text.
    pub fn display_name(&self, entity: &Entity) -> Cow<'a, str> {
        if let Some(text) = self.interner.find_text_opt(entity.id) {
            return Cow::Borrowed(text);
        }
        let named = match &entity.kind {
            EntityKind::Function(f) => match self.commands.composite(f.function) {
                Some(c) => return Cow::Borrowed(c.name.as_str()),
                None => f.function,
            },
            EntityKind::Variable { name, .. } => *name,
            EntityKind::Proxy { path, .. } | EntityKind::Alias { path, .. } => {
                path.steps().last().copied().unwrap_or(entity.id)
            }
        };
        self.interner.find_text(named)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use scriptpak_ident::hash_text;

    fn nested() -> (Commands, Interner) {
        let mut interner = Interner::new();
        let mut commands = Commands::new();
        let mut leaf = Composite::new("LEVEL\\leaf", &mut interner);
        leaf.add_function(interner.generate("door"), hash_text("Door"));
        let leaf_id = commands.add_composite(leaf).id;
        let mut root = Composite::new("LEVEL", &mut interner);
        root.add_function(interner.generate("leaf_instance"), leaf_id);
        root.add_function(interner.generate("zone"), hash_text("Zone"));
        let root_id = commands.add_composite(root).id;
        commands.set_entry_point(EntryPoint::Root, root_id);
        (commands, interner)
    }

    #[test]
    fn resolves_through_an_instance() {
        let (commands, interner) = nested();
        let resolver = Resolver::new(&commands, &interner);
        let root = commands.entry_point(EntryPoint::Root).unwrap().id;
        let path = EntityPath::new([hash_text("leaf_instance"), hash_text("door")]);
        let resolved = resolver.resolve_path(root, &path).unwrap();
        assert_eq!(resolved.entity.id, hash_text("door"));
        assert_eq!(resolved.composite.name, "LEVEL\\leaf");

        let (_, crumb) = resolver.breadcrumb(root, path.as_raw(), false).unwrap();
        assert_eq!(crumb, "leaf_instance -> door");
        let (_, crumb) = resolver.breadcrumb(root, path.as_raw(), true).unwrap();
        assert!(crumb.starts_with(&format!("[{}] leaf_instance", hash_text("leaf_instance"))));
    }

    #[test]
    fn non_instance_intermediate_yields_none() {
        let (commands, interner) = nested();
        let resolver = Resolver::new(&commands, &interner);
        let root = commands.entry_point(EntryPoint::Root).unwrap().id;
        assert!(resolver
            .resolve(root, &[hash_text("zone"), hash_text("door"), Identifier::INVALID])
            .is_none());
    }

    #[test]
    fn falls_back_to_root_then_composite_id() {
        let (commands, interner) = nested();
        let resolver = Resolver::new(&commands, &interner);
        let leaf = commands.composite_by_name("LEVEL\\leaf").unwrap().id;
        // first step is not in `leaf`, so the root is used
        let resolved = resolver
            .resolve(leaf, &[hash_text("zone"), Identifier::INVALID])
            .unwrap();
        assert_eq!(resolved.entity.id, hash_text("zone"));
        // first step names a composite and is consumed
        let resolved = resolver
            .resolve(hash_text("nowhere"), &[leaf, hash_text("door")])
            .unwrap();
        assert_eq!(resolved.entity.id, hash_text("door"));
        assert!(resolver.resolve(leaf, &[Identifier::INVALID]).is_none());
    }
}
