//! # letterfall
//!
//! **A physics vignette: a spinning logo, eight falling letters and a particle fountain.**
//!
//! The letters `f r e e c o d e` drop under gravity, bounce off the ground and
//! each other, get pushed around by clicks and quietly reappear above the
//! scene whenever they fall off the edge of the world.
//!
//! ## Quick Start
//!
//! ```no_run
//! use letterfall::*;
//!
//! fn main() {
//!     run(SceneConfig::new().title("letterfall").assets_dir("assets").seed(7)).unwrap();
//! }
//! ```
//!
//! ## Headless
//!
//! [`SceneHandle`] is generic over its [`Renderer`], and the renderer is
//! optional, so the whole simulation runs without a GPU:
//!
//! ```no_run
//! use letterfall::*;
//!
//! let config = SceneConfig::new().seed(1);
//! let assets = AssetBundle::load(&config.assets).unwrap();
//! let mut scene: SceneHandle<GpuRenderer> = SceneHandle::new(&assets, None, &config).unwrap();
//! for _ in 0..600 {
//!     scene.tick();
//! }
//! ```

mod app;
mod assets;
mod bodies;
mod camera;
mod config;
mod ecs;
mod error;
mod geometry;
mod gpu;
mod interaction;
mod lifecycle;
mod material;
mod mesh;
mod mesh_pass;
mod orbit_camera;
mod particle_pass;
mod particles;
mod physics;
mod picking;
mod renderer;
mod scene;
mod shadow_pass;
mod texture;

pub use app::run;
pub use assets::{
    AssetBundle, LETTER_MESHES, LOGO_MESH, NamedMesh, REQUIRED_MESHES, proxy_half_extents,
};
pub use bodies::{
    BodyDesc, BodyRecord, BodyRegistry, BodyRole, LETTER_FRICTION, LETTER_MASS, LETTER_OFFSETS,
    LETTER_SCALE, LOGO_POSITION, LOGO_SCALE, MassHint, RESTITUTION, ShapeHint,
};
pub use camera::Camera;
pub use config::{AssetPaths, SceneConfig};
pub use error::{GpuError, SceneError};
pub use geometry::RawGeometry;
pub use gpu::GpuContext;
pub use interaction::{FORCE_MAGNITUDE, apply_pointer_force};
pub use lifecycle::{
    KILL_CENTER, KILL_HALF_EXTENTS, KillVolume, LifecycleState, RESET_Y, RESET_Z,
    evaluate_triggers, reset_position,
};
pub use material::{DirectionalLight, Lighting, PbrMaterial, SceneAmbience, ShadowSettings};
pub use mesh::{Mesh, Transform, Vertex3d};
pub use mesh_pass::MeshPass;
pub use orbit_camera::{FocusPreset, OrbitCamera};
pub use particle_pass::ParticlePass;
pub use particles::{EmitterConfig, Particle, ParticleInstance, ParticleSystem};
pub use physics::{
    ColliderProps, DEFAULT_FRICTION, DEFAULT_RESTITUTION, GRAVITY, GROUND_SIZE, Motion,
    PhysicsWorld, TIMESTEP,
};
pub use picking::{PICK_DISTANCE, PickTarget, Ray, RayHit, pick, raycast};
pub use renderer::{
    DrawItem, FrameView, GpuRenderer, RenderError, Renderer, collect_draw_items,
};
pub use scene::{LOGO_SPIN, SceneEvent, SceneHandle, TickOutcome};
pub use shadow_pass::ShadowPass;
pub use texture::Texture;

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

// ECS support and type-safe handles
pub use ecs::{MaterialKind, MeshId, RenderMesh, ShadowCaster};
pub use hecs::Entity;
