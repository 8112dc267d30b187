//! The render seam between the scene and the GPU.
//!
//! [`SceneHandle`](crate::SceneHandle) never touches wgpu directly. Each tick
//! it builds a [`FrameView`] and hands it to a [`Renderer`]. The real backend
//! is [`GpuRenderer`]; tests plug in a recording fake.

use std::fmt;

use glam::{Vec2, Vec3};
use hecs::Entity;

use crate::assets::AssetBundle;
use crate::bodies::{BodyRecord, BodyRegistry};
use crate::camera::Camera;
use crate::ecs::{MaterialKind, MeshId, RenderMesh, ShadowCaster};
use crate::geometry::RawGeometry;
use crate::gpu::GpuContext;
use crate::material::Lighting;
use crate::mesh::{Mesh, Transform};
use crate::mesh_pass::{DrawCall, MeshPass, SceneUniforms};
use crate::particle_pass::{ParticlePass, ParticleUniforms};
use crate::particles::ParticleInstance;
use crate::shadow_pass::{ShadowCall, ShadowPass};
use crate::texture::Texture;

/// Per-frame render failures. Logged by the scene, never fatal.
#[derive(Debug)]
pub enum RenderError {
    /// The surface was lost or outdated and has been reconfigured; the frame
    /// was skipped.
    SurfaceLost,
    Surface(wgpu::SurfaceError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::SurfaceLost => write!(f, "surface lost, frame skipped"),
            RenderError::Surface(e) => write!(f, "failed to acquire surface texture: {}", e),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Surface(e) => Some(e),
            RenderError::SurfaceLost => None,
        }
    }
}

impl From<wgpu::SurfaceError> for RenderError {
    fn from(e: wgpu::SurfaceError) -> Self {
        RenderError::Surface(e)
    }
}

/// One mesh to draw this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawItem {
    pub entity: Entity,
    pub mesh: MeshId,
    pub transform: Transform,
    pub material: MaterialKind,
    /// Bounding radius when the item casts a shadow.
    pub shadow_radius: Option<f32>,
}

/// Everything a renderer needs for one frame.
pub struct FrameView<'a> {
    pub camera: Camera,
    pub lighting: &'a Lighting,
    pub items: &'a [DrawItem],
    pub particles: &'a [ParticleInstance],
    pub particle_pivot: Vec2,
    /// Seconds since the scene was created.
    pub time: f32,
}

/// A render backend.
pub trait Renderer {
    /// The drawable area changed, in physical pixels.
    fn resize(&mut self, width: u32, height: u32);

    /// Draw one frame.
    fn render(&mut self, frame: &FrameView<'_>) -> Result<(), RenderError>;
}

/// Draw items for every registered body, in spawn order.
pub fn collect_draw_items(registry: &BodyRegistry) -> Vec<DrawItem> {
    let world = registry.world();
    registry
        .entities()
        .iter()
        .filter_map(|&entity| {
            let mut query = world
                .query_one::<(&Transform, &RenderMesh, &BodyRecord, Option<&ShadowCaster>)>(entity)
                .ok()?;
            let (transform, render_mesh, record, caster) = query.get()?;
            Some(DrawItem {
                entity,
                mesh: render_mesh.mesh,
                transform: *transform,
                material: render_mesh.material,
                shadow_radius: caster.map(|_| record.half_extents.length()),
            })
        })
        .collect()
}

/// The wgpu backend: shadow map, lit meshes, then particles.
pub struct GpuRenderer {
    gpu: GpuContext,
    meshes: Vec<Mesh>,
    ground: Mesh,
    skybox: Mesh,
    depth: Texture,
    shadow_pass: ShadowPass,
    mesh_pass: MeshPass,
    particle_pass: ParticlePass,
    clear_color: wgpu::Color,
}

impl GpuRenderer {
    /// Upload every asset and build the passes.
    ///
    /// Meshes are uploaded in bundle order so [`MeshId`]s index them directly.
    pub fn new(gpu: GpuContext, assets: &AssetBundle, lighting: &Lighting, particle_capacity: usize) -> Self {
        let meshes: Vec<Mesh> = assets
            .meshes()
            .iter()
            .map(|m| m.geometry.upload(&gpu))
            .collect();
        let ambience = &lighting.ambience;
        let ground = Mesh::plane(&gpu, ambience.ground_size);
        let skybox = RawGeometry::cuboid(Vec3::splat(ambience.skybox_size)).upload(&gpu);

        let environment = Texture::from_image(&gpu, &assets.environment, "Environment");
        let sprite = Texture::from_image(&gpu, &assets.sprite, "Particle Sprite");

        let shadow_pass = ShadowPass::new(&gpu, &lighting.shadows, meshes.len());
        let mesh_pass = MeshPass::new(&gpu, &environment, shadow_pass.map(), meshes.len() + 2);
        let particle_pass = ParticlePass::new(&gpu, &sprite, particle_capacity);
        let depth = Texture::depth_buffer(&gpu);

        let [r, g, b, a] = ambience.clear_color;
        log::info!("renderer ready: {} meshes", meshes.len());

        Self {
            gpu,
            meshes,
            ground,
            skybox,
            depth,
            shadow_pass,
            mesh_pass,
            particle_pass,
            clear_color: wgpu::Color { r, g, b, a },
        }
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }
}

impl Renderer for GpuRenderer {
    fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
        if (self.depth.width, self.depth.height) != (self.gpu.width(), self.gpu.height()) {
            self.depth = Texture::depth_buffer(&self.gpu);
        }
    }

    fn render(&mut self, frame: &FrameView<'_>) -> Result<(), RenderError> {
        let output = match self.gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.gpu.reconfigure();
                return Err(RenderError::SurfaceLost);
            }
            Err(e) => return Err(e.into()),
        };
        let screen_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        // Shadow casters
        let casters: Vec<ShadowCall> = frame
            .items
            .iter()
            .filter_map(|item| {
                Some(ShadowCall {
                    mesh: self.meshes.get(item.mesh.index())?,
                    transform: item.transform,
                    radius: item.shadow_radius?,
                })
            })
            .collect();
        self.shadow_pass
            .render(&self.gpu, &mut encoder, &frame.lighting.light, &casters);

        // Backdrop first, then bodies
        let mut draw_calls = vec![
            DrawCall {
                mesh: &self.skybox,
                transform: Transform::new(),
                material: MaterialKind::Skybox,
            },
            DrawCall {
                mesh: &self.ground,
                transform: Transform::new(),
                material: MaterialKind::ShadowCatcher,
            },
        ];
        draw_calls.extend(frame.items.iter().filter_map(|item| {
            Some(DrawCall {
                mesh: self.meshes.get(item.mesh.index())?,
                transform: item.transform,
                material: item.material,
            })
        }));

        let aspect = self.gpu.aspect();
        let scene_uniforms = SceneUniforms::new(
            &frame.camera,
            aspect,
            self.shadow_pass.view_proj(),
            frame.lighting,
            frame.time,
        );
        self.mesh_pass.prepare(&self.gpu, &scene_uniforms, &draw_calls);
        self.particle_pass.prepare(
            &self.gpu,
            &ParticleUniforms::new(&frame.camera, aspect, frame.particle_pivot, frame.time),
            frame.particles,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &screen_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.mesh_pass.render(&mut render_pass, &draw_calls);
            self.particle_pass.render(&mut render_pass);
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::cube_bundle;
    use crate::physics::PhysicsWorld;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn draw_items_follow_spawn_order_and_cast_shadows() {
        let mut physics = PhysicsWorld::new();
        let mut registry = BodyRegistry::new();
        registry
            .spawn_scene_bodies(&mut physics, &cube_bundle(), &mut StdRng::seed_from_u64(9))
            .unwrap();

        let items = collect_draw_items(&registry);
        assert_eq!(items.len(), 9);
        assert_eq!(items[0].entity, registry.logo().unwrap());
        assert!(items.iter().all(|i| i.shadow_radius.is_some()));
        assert!(items.iter().all(|i| i.material == MaterialKind::Plastic));

        // letter f: unit-ish cube scaled by 4
        let f = items[1];
        let expected = Vec3::new(2.0, 2.0, 0.5).length();
        assert!((f.shadow_radius.unwrap() - expected).abs() < 1e-5);
    }

    #[test]
    fn surface_lost_is_displayable() {
        assert_eq!(RenderError::SurfaceLost.to_string(), "surface lost, frame skipped");
    }
}
