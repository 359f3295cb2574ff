// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Built-in function types the codec itself needs to recognise.

use once_cell::sync::Lazy;
use scriptpak_ident::{hash_text, Identifier};

use crate::resource::ResourceKind;

macro_rules! builtin_ids {
    ($($(#[$doc:meta])* $name:ident => $text:literal;)*) => {
        $(
            $(#[$doc])*
            pub static $name: Lazy<Identifier> = Lazy::new(|| hash_text($text));
        )*
    };
}

builtin_ids! {
    /// Animation entity carrying float tracks and event markers.
    CAGE_ANIMATION => "CAGEAnimation";
    /// Entity carrying timed triggers and event markers.
    TRIGGER_SEQUENCE => "TriggerSequence";
    /// Receives a lone leftover dynamic-physics resource on load.
    PHYSICS_SYSTEM => "PhysicsSystem";
    /// Root parameter set of every composite instance.
    COMPOSITE_INTERFACE => "CompositeInterface";
    /// Parameter set every proxy and alias exposes.
    PROXY_INTERFACE => "ProxyInterface";
    /// Name of the RESOURCE parameter resources are bound through.
    RESOURCE_PARAMETER => "resource";
}

/// What a function type expects to own at save time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRequirement {
    /// A missing resource of this kind is injected.
    Inject(ResourceKind),
    /// A missing resource of this kind is reported.
    Expect(ResourceKind),
    /// A `resource` parameter without a renderable instance is fatal.
    RenderableOnly,
}

static REQUIREMENTS: Lazy<Vec<(Identifier, ResourceRequirement)>> = Lazy::new(|| {
    use ResourceKind as K;
    use ResourceRequirement as R;
    [
        ("CollisionBarrier", R::Inject(K::CollisionMapping)),
        ("NavMeshBarrier", R::Inject(K::NavMeshBarrier)),
        ("ExclusiveMaster", R::Inject(K::ExclusiveMasterState)),
        ("TRAV_1ShotSpline", R::Inject(K::TraversalSegment)),
        ("TRAV_LoopedSpline", R::Inject(K::TraversalSegment)),
        ("PhysicsSystem", R::Inject(K::DynamicPhysicsSystem)),
        ("ModelReference", R::Expect(K::RenderableInstance)),
        ("EnvironmentModelReference", R::Expect(K::CollisionMapping)),
        ("ParticleEmitterReference", R::RenderableOnly),
        ("RibbonEmitterReference", R::RenderableOnly),
        ("LightReference", R::RenderableOnly),
        ("SurfaceEffectBox", R::RenderableOnly),
    ]
    .into_iter()
    .map(|(name, req)| (hash_text(name), req))
    .collect()
});

/// Save-time resource requirement of a function type, if it has one.
pub fn resource_requirement(function: Identifier) -> Option<ResourceRequirement> {
    REQUIREMENTS
        .iter()
        .find(|(id, _)| *id == function)
        .map(|(_, req)| *req)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirements_are_keyed_by_type_name() {
        assert_eq!(
            resource_requirement(hash_text("CollisionBarrier")),
            Some(ResourceRequirement::Inject(ResourceKind::CollisionMapping))
        );
        assert_eq!(
            resource_requirement(hash_text("LightReference")),
            Some(ResourceRequirement::RenderableOnly)
        );
        assert_eq!(resource_requirement(*CAGE_ANIMATION), None);
    }
}
