//! Kill volume and letter recycling.
//!
//! Letters that fall far enough are teleported back above the scene instead of
//! being removed, so the animation never runs out of bodies:
//!
//! ```text
//! Falling --(enters kill volume)--> Reset --(next evaluation)--> Falling
//! ```

use glam::Vec3;
use rand::Rng;

use crate::bodies::{BodyRecord, BodyRegistry, BodyRole};
use crate::physics::PhysicsWorld;

/// Centre of the kill volume.
pub const KILL_CENTER: Vec3 = Vec3::new(0.0, -80.0, 0.0);
/// Half extents of the 1000 x 0.5 x 1000 kill volume.
pub const KILL_HALF_EXTENTS: Vec3 = Vec3::new(500.0, 0.25, 500.0);

/// Height and depth of the reset pose.
pub const RESET_Y: f32 = 15.0;
pub const RESET_Z: f32 = 3.0;

/// Where a letter is in its fall/recycle loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Falling,
    /// Recycled during the latest evaluation.
    Reset,
}

/// The invisible sensor box below the scene.
#[derive(Clone, Copy, Debug)]
pub struct KillVolume {
    collider: rapier3d::prelude::ColliderHandle,
    center: Vec3,
    half_extents: Vec3,
}

impl KillVolume {
    /// Insert the sensor into `physics`.
    pub fn create(physics: &mut PhysicsWorld) -> Self {
        let collider = physics.insert_sensor(KILL_CENTER, KILL_HALF_EXTENTS);
        Self {
            collider,
            center: KILL_CENTER,
            half_extents: KILL_HALF_EXTENTS,
        }
    }

    pub fn collider(&self) -> rapier3d::prelude::ColliderHandle {
        self.collider
    }

    /// Top face of the box.
    pub fn top(&self) -> f32 {
        self.center.y + self.half_extents.y
    }

    /// Whether `point` is inside the box or anywhere below it.
    ///
    /// The sensor is thin; a body moving fast enough can cross it between two
    /// steps without rapier ever reporting an overlap.
    pub fn swallows(&self, point: Vec3) -> bool {
        (point.x - self.center.x).abs() <= self.half_extents.x
            && (point.z - self.center.z).abs() <= self.half_extents.z
            && point.y <= self.top()
    }

    /// Whether the body behind `record` has entered the volume.
    pub fn contains(&self, physics: &PhysicsWorld, record: &BodyRecord) -> bool {
        physics.intersecting(record.collider, self.collider)
            || physics.position(record.body).is_some_and(|p| self.swallows(p))
    }
}

/// A fresh spawn point: whole-number x in [-15, 0), y = 15, z = 3.
pub fn reset_position<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    Vec3::new(rng.gen_range(-15..0) as f32, RESET_Y, RESET_Z)
}

/// Check every letter against the kill volume and recycle the ones inside.
///
/// The logo is exempt. Returns how many letters were recycled.
pub fn evaluate_triggers<R: Rng + ?Sized>(
    registry: &mut BodyRegistry,
    physics: &mut PhysicsWorld,
    kill_volume: &KillVolume,
    rng: &mut R,
) -> usize {
    let mut recycled = 0;

    for entity in registry.letters() {
        let Some(mut record) = registry.record_mut(entity) else {
            continue;
        };
        if record.role != BodyRole::Letter {
            continue;
        }

        if kill_volume.contains(physics, &record) {
            let position = reset_position(rng);
            physics.reset_body(record.body, position);
            record.state = LifecycleState::Reset;
            record.recycled += 1;
            recycled += 1;
            log::debug!("recycled {} to {}", record.name, position);
        } else {
            record.state = LifecycleState::Falling;
        }
    }

    recycled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::cube_bundle;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn scene() -> (PhysicsWorld, BodyRegistry, KillVolume, StdRng) {
        let mut physics = PhysicsWorld::new();
        let mut registry = BodyRegistry::new();
        let mut rng = StdRng::seed_from_u64(3);
        registry
            .spawn_scene_bodies(&mut physics, &cube_bundle(), &mut rng)
            .unwrap();
        let kill = KillVolume::create(&mut physics);
        (physics, registry, kill, rng)
    }

    fn assert_reset_pose(p: Vec3) {
        assert_eq!((p.y, p.z), (RESET_Y, RESET_Z));
        assert!((-15.0..0.0).contains(&p.x), "x {}", p.x);
        assert_eq!(p.x.fract(), 0.0);
    }

    #[test]
    fn column_test_covers_tunnelling_bodies() {
        let mut physics = PhysicsWorld::new();
        let kill = KillVolume::create(&mut physics);
        assert_eq!(kill.top(), -79.75);
        assert!(kill.swallows(Vec3::new(0.0, -80.0, 0.0)));
        assert!(kill.swallows(Vec3::new(10.0, -500.0, -3.0)));
        assert!(!kill.swallows(Vec3::new(0.0, -79.0, 0.0)));
        assert!(!kill.swallows(Vec3::new(600.0, -90.0, 0.0)));
    }

    #[test]
    fn letters_below_the_box_are_recycled() {
        let (mut physics, mut registry, kill, mut rng) = scene();
        let f = registry.find("f").unwrap();
        let body = registry.record(f).unwrap().body;

        physics.set_translation(body, Vec3::new(3.0, -81.0, 2.0));
        physics.set_velocity(body, Vec3::new(0.0, -40.0, 0.0), Vec3::ONE);

        assert_eq!(evaluate_triggers(&mut registry, &mut physics, &kill, &mut rng), 1);
        assert_reset_pose(physics.position(body).unwrap());
        assert_eq!(physics.linear_velocity(body), Some(Vec3::ZERO));
        assert_eq!(physics.angular_velocity(body), Some(Vec3::ZERO));
        assert_eq!(registry.record(f).unwrap().state, LifecycleState::Reset);

        // back to falling on the next pass
        assert_eq!(evaluate_triggers(&mut registry, &mut physics, &kill, &mut rng), 0);
        assert_eq!(registry.record(f).unwrap().state, LifecycleState::Falling);
    }

    #[test]
    fn recycling_repeats() {
        let (mut physics, mut registry, kill, mut rng) = scene();
        let d = registry.find("d").unwrap();
        let body = registry.record(d).unwrap().body;

        for round in 1..=3 {
            physics.set_translation(body, Vec3::new(0.0, -200.0, 0.0));
            evaluate_triggers(&mut registry, &mut physics, &kill, &mut rng);
            assert_reset_pose(physics.position(body).unwrap());
            assert_eq!(registry.record(d).unwrap().recycled, round);
        }
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn logo_is_exempt() {
        let (mut physics, mut registry, kill, mut rng) = scene();
        let logo = registry.logo().unwrap();
        let body = registry.record(logo).unwrap().body;

        physics.set_translation(body, Vec3::new(0.0, -100.0, 0.0));
        assert_eq!(evaluate_triggers(&mut registry, &mut physics, &kill, &mut rng), 0);
        assert_eq!(physics.position(body).unwrap().y, -100.0);
    }

    #[test]
    fn bodies_above_are_untouched() {
        let (mut physics, mut registry, kill, mut rng) = scene();
        let before: Vec<Vec3> = registry
            .letters()
            .iter()
            .map(|&e| physics.position(registry.record(e).unwrap().body).unwrap())
            .collect();
        assert_eq!(evaluate_triggers(&mut registry, &mut physics, &kill, &mut rng), 0);
        let after: Vec<Vec3> = registry
            .letters()
            .iter()
            .map(|&e| physics.position(registry.record(e).unwrap().body).unwrap())
            .collect();
        assert_eq!(before, after);
    }
}
