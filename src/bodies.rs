//! The body registry: which meshes get physical proxies, and how.
//!
//! Each animated mesh is paired with a box-shaped rigid body. The pairing lives
//! in a `hecs` world so the renderer can query transforms and meshes while the
//! physics and lifecycle passes work on [`BodyRecord`]s.

use glam::{Quat, Vec3};
use hecs::Entity;
use rand::Rng;
use rapier3d::prelude::{ColliderHandle, RigidBodyHandle};

use crate::assets::{self, AssetBundle, NamedMesh, LETTER_MESHES, LOGO_MESH};
use crate::ecs::{RenderMesh, ShadowCaster};
use crate::error::SceneError;
use crate::lifecycle::LifecycleState;
use crate::mesh::Transform;
use crate::physics::{ColliderProps, Motion, PhysicsWorld};

/// Horizontal spawn offset of each letter, in [`LETTER_MESHES`] order.
pub const LETTER_OFFSETS: [f32; 8] = [0.0, -2.0, -4.0, -7.0, -9.0, -11.0, -13.6, -16.0];

/// Where the logo hangs.
pub const LOGO_POSITION: Vec3 = Vec3::new(4.0, 2.5, 0.0);
pub const LOGO_SCALE: f32 = 0.3;
pub const LETTER_SCALE: f32 = 4.0;
pub const LETTER_MASS: f32 = 1.0;
pub const LETTER_FRICTION: f32 = 0.2;
/// Shared by logo and letters. Letter pairs bounce at 1.5², the ground damps it to 0.3.
pub const RESTITUTION: f32 = 1.5;

/// What a body is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyRole {
    /// Spins in place; never recycled, never pushed.
    Logo,
    /// Falls, bounces and gets recycled by the kill volume.
    Letter,
}

/// Shape of the physical proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ShapeHint {
    /// Axis-aligned (in mesh space) box around the visual bounds.
    #[default]
    Box,
}

/// Mass of the physical proxy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MassHint {
    /// Mass 0: immovable under gravity and contact, posed explicitly.
    Static,
    Dynamic(f32),
}

impl MassHint {
    pub fn mass(self) -> f32 {
        match self {
            MassHint::Static => 0.0,
            MassHint::Dynamic(m) => m,
        }
    }
}

/// Placement and surface parameters for [`BodyRegistry::spawn`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyDesc {
    pub role: BodyRole,
    pub position: Vec3,
    pub scale: f32,
    /// `None` keeps the physics engine's default.
    pub friction: Option<f32>,
    pub restitution: f32,
}

/// Everything the scene knows about one rigid body.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyRecord {
    pub name: String,
    pub role: BodyRole,
    pub body: RigidBodyHandle,
    pub collider: ColliderHandle,
    pub shape: ShapeHint,
    /// Declared mass. 0 for static bodies.
    pub mass: f32,
    pub friction: Option<f32>,
    pub restitution: f32,
    pub half_extents: Vec3,
    pub scale: f32,
    /// Rotation the mesh had in the imported hierarchy.
    pub base_rotation: Quat,
    pub state: LifecycleState,
    /// Times the kill volume has recycled this body.
    pub recycled: u32,
}

/// Registry of every rigid body in the scene.
pub struct BodyRegistry {
    world: hecs::World,
    // spawn order; hecs iteration order is unspecified
    order: Vec<Entity>,
    logo: Option<Entity>,
}

impl Default for BodyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyRegistry {
    pub fn new() -> Self {
        Self {
            world: hecs::World::new(),
            order: Vec::new(),
            logo: None,
        }
    }

    /// Attach a physical proxy to `mesh` and register the pair.
    ///
    /// Animated bodies are registered as shadow casters.
    pub fn spawn(
        &mut self,
        physics: &mut PhysicsWorld,
        mesh: &NamedMesh,
        shape: ShapeHint,
        mass: MassHint,
        desc: BodyDesc,
    ) -> Entity {
        let half_extents = match shape {
            ShapeHint::Box => assets::proxy_half_extents(mesh, desc.scale),
        };
        let motion = match mass {
            MassHint::Static => Motion::Kinematic,
            MassHint::Dynamic(_) => Motion::Dynamic,
        };
        let (body, collider) = physics.insert_box(
            motion,
            desc.position,
            mesh.rotation,
            half_extents,
            ColliderProps {
                mass: match mass {
                    MassHint::Static => None,
                    MassHint::Dynamic(m) => Some(m),
                },
                friction: desc.friction,
                restitution: desc.restitution,
            },
        );

        let record = BodyRecord {
            name: mesh.name.clone(),
            role: desc.role,
            body,
            collider,
            shape,
            mass: mass.mass(),
            friction: desc.friction,
            restitution: desc.restitution,
            half_extents,
            scale: desc.scale,
            base_rotation: mesh.rotation,
            state: LifecycleState::Falling,
            recycled: 0,
        };
        let transform = Transform::new()
            .position(desc.position)
            .rotation(mesh.rotation)
            .uniform_scale(desc.scale);

        let entity = self.world.spawn((
            record,
            transform,
            RenderMesh::new(mesh.id),
            ShadowCaster,
        ));
        self.order.push(entity);
        if desc.role == BodyRole::Logo {
            self.logo = Some(entity);
        }

        log::debug!("spawned {} ({:?}, mass {})", mesh.name, desc.role, mass.mass());
        entity
    }

    /// Spawn the logo and the eight letters.
    ///
    /// Letter heights are whole numbers in [10, 20).
    pub fn spawn_scene_bodies<R: Rng + ?Sized>(
        &mut self,
        physics: &mut PhysicsWorld,
        assets: &AssetBundle,
        rng: &mut R,
    ) -> Result<(), SceneError> {
        self.spawn(
            physics,
            assets.mesh(LOGO_MESH)?,
            ShapeHint::Box,
            MassHint::Static,
            BodyDesc {
                role: BodyRole::Logo,
                position: LOGO_POSITION,
                scale: LOGO_SCALE,
                friction: None,
                restitution: RESTITUTION,
            },
        );

        for (name, offset) in LETTER_MESHES.iter().zip(LETTER_OFFSETS) {
            let height = rng.gen_range(10..20) as f32;
            self.spawn(
                physics,
                assets.mesh(name)?,
                ShapeHint::Box,
                MassHint::Dynamic(LETTER_MASS),
                BodyDesc {
                    role: BodyRole::Letter,
                    position: Vec3::new(offset, height, 0.0),
                    scale: LETTER_SCALE,
                    friction: Some(LETTER_FRICTION),
                    restitution: RESTITUTION,
                },
            );
        }

        log::info!("spawned {} bodies", self.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entities in spawn order.
    pub fn entities(&self) -> &[Entity] {
        &self.order
    }

    pub fn logo(&self) -> Option<Entity> {
        self.logo
    }

    /// Letter entities in spawn order.
    pub fn letters(&self) -> Vec<Entity> {
        self.order
            .iter()
            .copied()
            .filter(|&e| self.record(e).is_some_and(|r| r.role == BodyRole::Letter))
            .collect()
    }

    pub fn record(&self, entity: Entity) -> Option<hecs::Ref<'_, BodyRecord>> {
        self.world.get::<&BodyRecord>(entity).ok()
    }

    pub fn record_mut(&mut self, entity: Entity) -> Option<hecs::RefMut<'_, BodyRecord>> {
        self.world.get::<&mut BodyRecord>(entity).ok()
    }

    pub fn transform(&self, entity: Entity) -> Option<Transform> {
        self.world.get::<&Transform>(entity).ok().map(|t| *t)
    }

    /// Look up an entity by name.
    pub fn find(&self, name: &str) -> Option<Entity> {
        self.order
            .iter()
            .copied()
            .find(|&e| self.record(e).is_some_and(|r| r.name == name))
    }

    /// The entity owning `collider`, if any.
    pub fn entity_for_collider(&self, collider: ColliderHandle) -> Option<Entity> {
        self.world
            .query::<&BodyRecord>()
            .iter()
            .find(|(_, record)| record.collider == collider)
            .map(|(entity, _)| entity)
    }

    /// Overwrite a body's visual rotation without waiting for physics.
    pub fn set_rotation(&mut self, entity: Entity, rotation: Quat) {
        if let Ok(mut transform) = self.world.get::<&mut Transform>(entity) {
            transform.rotation = rotation;
        }
    }

    /// Copy dynamic body poses from physics into their transforms.
    ///
    /// Kinematic bodies are posed explicitly through [`set_rotation`](Self::set_rotation).
    pub fn sync_transforms(&mut self, physics: &PhysicsWorld) {
        for (_, (record, transform)) in self.world.query_mut::<(&BodyRecord, &mut Transform)>() {
            if !physics.is_dynamic(record.body) {
                continue;
            }
            if let Some(position) = physics.position(record.body) {
                transform.position = position;
            }
            if let Some(rotation) = physics.rotation(record.body) {
                transform.rotation = rotation;
            }
        }
    }

    /// The ECS world, for render-side queries.
    pub fn world(&self) -> &hecs::World {
        &self.world
    }

    /// Forget every body. Physics handles are not released here.
    pub fn clear(&mut self) {
        self.world.clear();
        self.order.clear();
        self.logo = None;
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
        let mut rng = StdRng::seed_from_u64(7);
        registry
            .spawn_scene_bodies(&mut physics, &cube_bundle(), &mut rng)
            .unwrap();
        (physics, registry)
    }

    #[test]
    fn nine_bodies_with_policy_values() {
        let (physics, registry) = scene();
        assert_eq!(registry.len(), 9);
        assert_eq!(physics.body_count(), 9);

        let logo = registry.record(registry.logo().unwrap()).unwrap();
        assert_eq!(logo.name, LOGO_MESH);
        assert_eq!(logo.mass, 0.0);
        assert_eq!(logo.restitution, 1.5);
        assert_eq!(logo.friction, None);
        assert_eq!(logo.scale, 0.3);
        assert!(!physics.is_dynamic(logo.body));
        assert_eq!(physics.position(logo.body), Some(LOGO_POSITION));

        let letters = registry.letters();
        assert_eq!(letters.len(), 8);
        for (i, &entity) in letters.iter().enumerate() {
            let r = registry.record(entity).unwrap();
            assert_eq!(r.name, LETTER_MESHES[i]);
            assert_eq!((r.mass, r.friction, r.restitution), (1.0, Some(0.2), 1.5));
            assert_eq!(r.scale, 4.0);
            assert!(physics.is_dynamic(r.body));

            let p = physics.position(r.body).unwrap();
            assert_eq!(p.x, LETTER_OFFSETS[i]);
            assert_eq!(p.z, 0.0);
            assert!((10.0..20.0).contains(&p.y));
            assert_eq!(p.y.fract(), 0.0);
        }
    }

    #[test]
    fn every_body_casts_shadows() {
        let (_, registry) = scene();
        let casters = registry.world().query::<&ShadowCaster>().iter().count();
        assert_eq!(casters, 9);
    }

    #[test]
    fn collider_lookup_and_names() {
        let (_, registry) = scene();
        let o = registry.find("o").unwrap();
        let collider = registry.record(o).unwrap().collider;
        assert_eq!(registry.entity_for_collider(collider), Some(o));
        assert!(registry.find("x").is_none());
    }

    #[test]
    fn transforms_follow_physics() {
        let (mut physics, mut registry) = scene();
        let f = registry.find("f").unwrap();
        let before = registry.transform(f).unwrap().position;
        for _ in 0..5 {
            physics.step();
        }
        registry.sync_transforms(&physics);
        let after = registry.transform(f).unwrap().position;
        assert!(after.y < before.y);
        assert_eq!(registry.transform(f).unwrap().scale, Vec3::splat(4.0));
    }
}
