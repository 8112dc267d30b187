//! Pointer pushes.

use glam::Vec3;

use crate::bodies::BodyRegistry;
use crate::physics::PhysicsWorld;
use crate::picking::{PickTarget, Ray};

/// Newtons per unit of ray direction.
pub const FORCE_MAGNITUDE: f32 = 200.0;

/// Push the picked body along the pick ray.
///
/// The force acts at the body's current position for the next physics step
/// only. Returns the applied force, or `None` when the target is empty,
/// static, or a body that does not respond to forces (the logo).
pub fn apply_pointer_force(
    target: PickTarget,
    ray: &Ray,
    registry: &BodyRegistry,
    physics: &mut PhysicsWorld,
) -> Option<Vec3> {
    let PickTarget::Body(entity) = target else {
        return None;
    };
    let body = registry.record(entity)?.body;
    let point = physics.position(body)?;
    let force = ray.direction * FORCE_MAGNITUDE;

    if physics.add_force_at_point(body, force, point) {
        log::debug!("pushed {:?} with {}", entity, force);
        Some(force)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::cube_bundle;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn scene() -> (PhysicsWorld, BodyRegistry) {
        let mut physics = PhysicsWorld::new();
        let mut registry = BodyRegistry::new();
        registry
            .spawn_scene_bodies(&mut physics, &cube_bundle(), &mut StdRng::seed_from_u64(5))
            .unwrap();
        (physics, registry)
    }

    #[test]
    fn pushes_dynamic_bodies_along_the_ray() {
        let (mut physics, registry) = scene();
        let c = registry.find("c").unwrap();
        let body = registry.record(c).unwrap().body;
        let ray = Ray::new(Vec3::new(0.0, 20.0, 40.0), Vec3::new(0.0, -1.0, -1.0));

        let force = apply_pointer_force(PickTarget::Body(c), &ray, &registry, &mut physics);
        assert_eq!(force, Some(ray.direction * 200.0));
        assert!(physics.pending_force(body).unwrap().abs_diff_eq(ray.direction * 200.0, 1e-4));

        // consumed by one step
        physics.step();
        assert_eq!(physics.pending_force(body), Some(Vec3::ZERO));
    }

    #[test]
    fn logo_static_and_misses_are_no_ops() {
        let (mut physics, registry) = scene();
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let logo = registry.logo().unwrap();

        assert_eq!(apply_pointer_force(PickTarget::Body(logo), &ray, &registry, &mut physics), None);
        assert_eq!(apply_pointer_force(PickTarget::Static, &ray, &registry, &mut physics), None);
        assert_eq!(apply_pointer_force(PickTarget::Nothing, &ray, &registry, &mut physics), None);

        for &entity in registry.entities() {
            let body = registry.record(entity).unwrap().body;
            assert_eq!(physics.pending_force(body), Some(Vec3::ZERO));
        }
    }

    #[test]
    fn each_event_applies_once() {
        let (mut physics, registry) = scene();
        let r = registry.find("r").unwrap();
        let body = registry.record(r).unwrap().body;
        let ray = Ray::new(Vec3::ZERO, Vec3::X);

        apply_pointer_force(PickTarget::Body(r), &ray, &registry, &mut physics);
        apply_pointer_force(PickTarget::Body(r), &ray, &registry, &mut physics);
        assert!(physics.pending_force(body).unwrap().abs_diff_eq(Vec3::X * 400.0, 1e-4));
    }
}
