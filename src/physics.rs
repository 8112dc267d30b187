//! Rigid-body simulation backed by rapier3d.
//!
//! [`PhysicsWorld`] owns every rapier set plus the pipeline and steps at a
//! fixed 1/60 s. It knows nothing about letters or logos; the
//! [`BodyRegistry`](crate::BodyRegistry) decides what gets spawned and the
//! lifecycle pass decides when bodies are recycled.

use glam::{Quat, Vec3};
use rapier3d::na::{Quaternion, UnitQuaternion};
use rapier3d::prelude::*;

/// World gravity.
pub const GRAVITY: Vec3 = Vec3::new(0.0, -10.0, 0.0);

/// Fixed simulation timestep in seconds.
pub const TIMESTEP: f32 = 1.0 / 60.0;

/// Side length of the invisible ground collider.
pub const GROUND_SIZE: f32 = 80.0;

const GROUND_HALF_HEIGHT: f32 = 0.01;

/// Friction and restitution of colliders that do not set their own.
pub const DEFAULT_FRICTION: f32 = 0.2;
pub const DEFAULT_RESTITUTION: f32 = 0.2;

const GROUND_FRICTION: f32 = 1.0;

/// Contact coefficients are the product of both colliders' values.
fn with_material(builder: ColliderBuilder, friction: f32, restitution: f32) -> ColliderBuilder {
    builder
        .friction(friction)
        .friction_combine_rule(CoefficientCombineRule::Multiply)
        .restitution(restitution)
        .restitution_combine_rule(CoefficientCombineRule::Multiply)
}

pub(crate) fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

pub(crate) fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

pub(crate) fn to_rotation(q: Quat) -> Rotation<Real> {
    let q = q.normalize();
    UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
}

pub(crate) fn from_rotation(r: &Rotation<Real>) -> Quat {
    let c = r.coords;
    Quat::from_xyzw(c.x, c.y, c.z, c.w)
}

pub(crate) fn to_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    Isometry::from_parts(Translation::from(to_vector(position)), to_rotation(rotation))
}

/// How a body responds to the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Motion {
    /// Falls, collides and accepts forces.
    Dynamic,
    /// Ignores gravity and forces; moved only by explicit pose targets.
    Kinematic,
}

/// Material and mass of one box collider.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColliderProps {
    pub mass: Option<f32>,
    pub friction: Option<f32>,
    pub restitution: f32,
}

/// The rapier world.
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    pub(crate) bodies: RigidBodySet,
    pub(crate) colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    ground: ColliderHandle,
    steps: u64,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// An empty world with gravity and the ground collider.
    pub fn new() -> Self {
        let integration_parameters = IntegrationParameters {
            dt: TIMESTEP,
            ..Default::default()
        };

        let mut colliders = ColliderSet::new();
        let ground = colliders.insert(
            with_material(
                ColliderBuilder::cuboid(GROUND_SIZE * 0.5, GROUND_HALF_HEIGHT, GROUND_SIZE * 0.5)
                    .translation(vector![0.0, -GROUND_HALF_HEIGHT, 0.0]),
                GROUND_FRICTION,
                DEFAULT_RESTITUTION,
            )
            .build(),
        );

        Self {
            gravity: to_vector(GRAVITY),
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders,
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            ground,
            steps: 0,
        }
    }

    /// Handle of the ground collider.
    pub fn ground(&self) -> ColliderHandle {
        self.ground
    }

    /// Number of completed steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Insert a body with one box collider centred on it.
    pub fn insert_box(
        &mut self,
        motion: Motion,
        position: Vec3,
        rotation: Quat,
        half_extents: Vec3,
        props: ColliderProps,
    ) -> (RigidBodyHandle, ColliderHandle) {
        let builder = match motion {
            Motion::Dynamic => RigidBodyBuilder::dynamic(),
            Motion::Kinematic => RigidBodyBuilder::kinematic_position_based(),
        };
        let body = builder.position(to_isometry(position, rotation)).build();
        let body_handle = self.bodies.insert(body);

        let mut collider = with_material(
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z),
            props.friction.unwrap_or(DEFAULT_FRICTION),
            props.restitution,
        );
        if let Some(mass) = props.mass {
            collider = collider.mass(mass);
        }
        let collider_handle =
            self.colliders
                .insert_with_parent(collider.build(), body_handle, &mut self.bodies);

        (body_handle, collider_handle)
    }

    /// Insert a free-standing sensor box that reports intersections only.
    pub fn insert_sensor(&mut self, center: Vec3, half_extents: Vec3) -> ColliderHandle {
        self.colliders.insert(
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
                .translation(to_vector(center))
                .sensor(true)
                .build(),
        )
    }

    /// Advance the simulation by one fixed step.
    ///
    /// Forces added since the previous step act for this step only.
    pub fn step(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );

        // rapier keeps user forces until they are cleared
        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);
        }
        self.steps += 1;
    }

    /// Whether rapier currently reports the two colliders as overlapping.
    pub fn intersecting(&self, a: ColliderHandle, b: ColliderHandle) -> bool {
        self.narrow_phase.intersection_pair(a, b) == Some(true)
    }

    pub fn position(&self, body: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(body).map(|b| from_vector(b.translation()))
    }

    pub fn rotation(&self, body: RigidBodyHandle) -> Option<Quat> {
        self.bodies.get(body).map(|b| from_rotation(b.rotation()))
    }

    pub fn linear_velocity(&self, body: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(body).map(|b| from_vector(b.linvel()))
    }

    pub fn angular_velocity(&self, body: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(body).map(|b| from_vector(b.angvel()))
    }

    /// Force accumulated for the next step.
    pub fn pending_force(&self, body: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(body).map(|b| from_vector(&b.user_force()))
    }

    pub fn is_dynamic(&self, body: RigidBodyHandle) -> bool {
        self.bodies.get(body).is_some_and(|b| b.is_dynamic())
    }

    /// Teleport a body and stop it dead.
    pub fn reset_body(&mut self, body: RigidBodyHandle, position: Vec3) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.set_translation(to_vector(position), true);
            b.set_linvel(Vector::zeros(), true);
            b.set_angvel(Vector::zeros(), true);
            b.reset_forces(true);
            b.reset_torques(true);
        }
    }

    /// Set a body's velocity directly.
    pub fn set_velocity(&mut self, body: RigidBodyHandle, linear: Vec3, angular: Vec3) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.set_linvel(to_vector(linear), true);
            b.set_angvel(to_vector(angular), true);
        }
    }

    /// Move a body without touching its velocity.
    pub fn set_translation(&mut self, body: RigidBodyHandle, position: Vec3) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.set_translation(to_vector(position), true);
        }
    }

    /// Pose target for a kinematic body, reached during the next step.
    pub fn set_kinematic_rotation(&mut self, body: RigidBodyHandle, rotation: Quat) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.set_next_kinematic_rotation(to_rotation(rotation));
        }
    }

    /// Add a force at a world-space point for the next step.
    ///
    /// Returns `false` if the body is missing or does not respond to forces.
    pub fn add_force_at_point(&mut self, body: RigidBodyHandle, force: Vec3, point: Vec3) -> bool {
        match self.bodies.get_mut(body) {
            Some(b) if b.is_dynamic() => {
                b.add_force_at_point(to_vector(force), point![point.x, point.y, point.z], true);
                true
            }
            _ => false,
        }
    }

    /// Closest collider hit by a ray, with its distance along the ray.
    pub fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<(ColliderHandle, f32)> {
        let ray = rapier3d::geometry::Ray::new(
            point![origin.x, origin.y, origin.z],
            to_vector(direction),
        );
        self.query_pipeline.cast_ray(
            &self.bodies,
            &self.colliders,
            &ray,
            max_distance,
            true,
            QueryFilter::default(),
        )
    }

    /// Refresh the query structures after bodies were moved outside a step.
    ///
    /// rapier only carries body poses over to attached colliders while
    /// stepping, so teleported bodies are copied over here first.
    pub fn refresh_queries(&mut self) {
        for (_, body) in self.bodies.iter() {
            let pose = *body.position();
            for &handle in body.colliders() {
                if let Some(collider) = self.colliders.get_mut(handle) {
                    let local = collider
                        .position_wrt_parent()
                        .copied()
                        .unwrap_or_else(Isometry::identity);
                    collider.set_position(pose * local);
                }
            }
        }
        self.query_pipeline.update(&self.colliders);
    }

    /// Drop every body and collider except the ground.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drop_box(world: &mut PhysicsWorld, y: f32) -> RigidBodyHandle {
        world
            .insert_box(
                Motion::Dynamic,
                Vec3::new(0.0, y, 0.0),
                Quat::IDENTITY,
                Vec3::splat(0.5),
                ColliderProps {
                    mass: Some(1.0),
                    friction: Some(0.2),
                    restitution: 0.0,
                },
            )
            .0
    }

    #[test]
    fn gravity_pulls_dynamic_bodies_down() {
        let mut world = PhysicsWorld::new();
        let body = drop_box(&mut world, 10.0);
        for _ in 0..10 {
            world.step();
        }
        assert!(world.position(body).unwrap().y < 10.0);
        assert!(world.linear_velocity(body).unwrap().y < 0.0);
    }

    #[test]
    fn ground_stops_falling_bodies() {
        let mut world = PhysicsWorld::new();
        let body = drop_box(&mut world, 2.0);
        for _ in 0..240 {
            world.step();
        }
        let y = world.position(body).unwrap().y;
        assert!(y > 0.3 && y < 0.7, "resting height {}", y);
    }

    #[test]
    fn coefficients_multiply_at_contacts() {
        let mut world = PhysicsWorld::new();
        let (_, collider) = world.insert_box(
            Motion::Kinematic,
            Vec3::ZERO,
            Quat::IDENTITY,
            Vec3::ONE,
            ColliderProps {
                mass: None,
                friction: None,
                restitution: 1.5,
            },
        );
        let logo = &world.colliders[collider];
        assert_eq!(logo.friction(), DEFAULT_FRICTION);
        assert_eq!(logo.friction_combine_rule(), CoefficientCombineRule::Multiply);
        assert_eq!(logo.restitution_combine_rule(), CoefficientCombineRule::Multiply);

        let ground = &world.colliders[world.ground()];
        assert_eq!(ground.friction(), 1.0);
        assert_eq!(ground.restitution(), DEFAULT_RESTITUTION);
        assert_eq!(ground.restitution_combine_rule(), CoefficientCombineRule::Multiply);
    }

    #[test]
    fn bouncy_box_loses_most_height_on_the_ground() {
        let mut world = PhysicsWorld::new();
        let (body, _) = world.insert_box(
            Motion::Dynamic,
            Vec3::new(0.0, 10.5, 0.0),
            Quat::IDENTITY,
            Vec3::splat(0.5),
            ColliderProps {
                mass: Some(1.0),
                friction: Some(0.2),
                restitution: 1.5,
            },
        );

        // 1.5 × 0.2 = 0.3, so a 10 unit drop comes back up about 0.9
        let mut bounced = false;
        let mut apex = 0.0_f32;
        for _ in 0..300 {
            world.step();
            let y = world.position(body).unwrap().y;
            let vy = world.linear_velocity(body).unwrap().y;
            if vy > 0.0 {
                bounced = true;
                apex = apex.max(y);
            } else if bounced {
                break;
            }
        }
        assert!(bounced);
        let rebound = apex - 0.5;
        assert!(rebound > 0.2 && rebound < 2.5, "rebound {}", rebound);
    }

    #[test]
    fn kinematic_bodies_ignore_gravity_and_forces() {
        let mut world = PhysicsWorld::new();
        let (body, _) = world.insert_box(
            Motion::Kinematic,
            Vec3::new(4.0, 2.5, 0.0),
            Quat::IDENTITY,
            Vec3::ONE,
            ColliderProps {
                mass: None,
                friction: None,
                restitution: 1.5,
            },
        );
        assert!(!world.add_force_at_point(body, Vec3::X * 200.0, Vec3::ZERO));
        for _ in 0..30 {
            world.step();
        }
        assert_eq!(world.position(body).unwrap(), Vec3::new(4.0, 2.5, 0.0));
    }

    #[test]
    fn forces_last_one_step() {
        let mut world = PhysicsWorld::new();
        let body = drop_box(&mut world, 20.0);
        assert!(world.add_force_at_point(body, Vec3::X * 200.0, world.position(body).unwrap()));
        assert_eq!(world.pending_force(body), Some(Vec3::X * 200.0));

        world.step();
        assert_eq!(world.pending_force(body), Some(Vec3::ZERO));
        let vx = world.linear_velocity(body).unwrap().x;
        assert!((vx - 200.0 * TIMESTEP).abs() < 1e-3, "vx {}", vx);

        world.step();
        let vx_after = world.linear_velocity(body).unwrap().x;
        assert!((vx_after - vx).abs() < 1e-3);
    }

    #[test]
    fn reset_zeroes_motion() {
        let mut world = PhysicsWorld::new();
        let body = drop_box(&mut world, 20.0);
        world.set_velocity(body, Vec3::new(1.0, -5.0, 2.0), Vec3::ONE);
        world.reset_body(body, Vec3::new(-3.0, 15.0, 3.0));
        assert_eq!(world.position(body).unwrap(), Vec3::new(-3.0, 15.0, 3.0));
        assert_eq!(world.linear_velocity(body).unwrap(), Vec3::ZERO);
        assert_eq!(world.angular_velocity(body).unwrap(), Vec3::ZERO);
    }

    #[test]
    fn rotation_round_trips() {
        let q = Quat::from_rotation_y(0.7) * Quat::from_rotation_x(0.2);
        let back = from_rotation(&to_rotation(q));
        assert!(back.abs_diff_eq(q, 1e-6) || back.abs_diff_eq(-q, 1e-6));
    }
}
