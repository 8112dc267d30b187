//! Pointer picking against the physics colliders.
//!
//! A click becomes a [`Ray`] through the cursor, which is cast against every
//! collider in the [`PhysicsWorld`]: the nine body proxies, the ground and the
//! kill volume. The closest hit is resolved to a [`PickTarget`].

use glam::{Mat4, Vec2, Vec3};
use hecs::Entity;

use crate::bodies::BodyRegistry;
use crate::camera::Camera;
use crate::physics::PhysicsWorld;

/// Farthest distance a pick ray reaches.
pub const PICK_DISTANCE: f32 = 1000.0;

/// A ray in 3D space, used for picking.
///
/// # Example
///
/// ```
/// use letterfall::{Ray, Vec3};
///
/// let ray = Ray::new(Vec3::new(0.0, 1.0, 5.0), Vec3::new(0.0, 0.0, -2.0));
/// assert_eq!(ray.direction, Vec3::NEG_Z);
/// assert_eq!(ray.point_at(10.0), Vec3::new(0.0, 1.0, -5.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    /// The direction is normalized.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Unproject a screen position through the camera matrices.
    ///
    /// `screen_x`/`screen_y` are in the same units as the screen size, origin
    /// top-left.
    pub fn from_screen(
        screen_x: f32,
        screen_y: f32,
        screen_width: f32,
        screen_height: f32,
        view_matrix: Mat4,
        projection_matrix: Mat4,
    ) -> Self {
        let ndc_x = (2.0 * screen_x / screen_width) - 1.0;
        let ndc_y = 1.0 - (2.0 * screen_y / screen_height); // Y is flipped

        let near_clip = glam::Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
        let far_clip = glam::Vec4::new(ndc_x, ndc_y, 1.0, 1.0);

        let inv_view_proj = (projection_matrix * view_matrix).inverse();

        let near_world = inv_view_proj * near_clip;
        let far_world = inv_view_proj * far_clip;

        // Perspective divide
        let near_point = near_world.truncate() / near_world.w;
        let far_point = far_world.truncate() / far_world.w;

        Self::new(near_point, far_point - near_point)
    }

    /// Ray through `cursor` for a viewport of `size`.
    pub fn from_camera(cursor: Vec2, size: Vec2, camera: &Camera) -> Self {
        let aspect = if size.y > 0.0 { size.x / size.y } else { 1.0 };
        Self::from_screen(
            cursor.x,
            cursor.y,
            size.x.max(1.0),
            size.y.max(1.0),
            camera.view_matrix(),
            camera.projection_matrix(aspect),
        )
    }

    #[inline]
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// What a pick ray resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickTarget {
    /// One of the registered bodies.
    Body(Entity),
    /// A collider with no body record: the ground or the kill volume.
    Static,
    Nothing,
}

/// The closest collider along a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub target: PickTarget,
    pub distance: f32,
    pub point: Vec3,
}

/// Cast `ray` against every collider and return the closest hit, if any.
pub fn raycast(physics: &PhysicsWorld, registry: &BodyRegistry, ray: &Ray) -> Option<RayHit> {
    let (collider, distance) = physics.cast_ray(ray.origin, ray.direction, PICK_DISTANCE)?;
    let target = match registry.entity_for_collider(collider) {
        Some(entity) => PickTarget::Body(entity),
        None => PickTarget::Static,
    };
    Some(RayHit {
        target,
        distance,
        point: ray.point_at(distance),
    })
}

/// Resolve a pick ray to its target.
pub fn pick(physics: &PhysicsWorld, registry: &BodyRegistry, ray: &Ray) -> PickTarget {
    raycast(physics, registry, ray).map_or(PickTarget::Nothing, |hit| hit.target)
}
