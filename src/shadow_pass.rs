//! Depth-only pass rendering shadow casters from the directional light.
//!
//! The light frustum is an orthographic box fitted around the casters every
//! frame, so letters high above the logo still cast onto the ground.

use glam::{Mat4, Vec3};

use crate::gpu::GpuContext;
use crate::material::{DirectionalLight, ShadowSettings};
use crate::mesh::{Mesh, Transform, Vertex3d};
use crate::mesh_pass::{ModelUniforms, ModelUniformBuffer};
use crate::texture::{DEPTH_FORMAT, Texture};

/// A shadow caster for one frame: its mesh and where it is.
pub struct ShadowCall<'a> {
    pub mesh: &'a Mesh,
    pub transform: Transform,
    /// Radius of a sphere around the caster's origin containing the mesh.
    pub radius: f32,
}

/// Extra depth behind the casters, so the ground below still receives shadows.
const RECEIVER_DEPTH: f32 = 100.0;

/// Orthographic light view-projection containing every caster sphere.
///
/// With no casters the frustum covers a unit sphere at the origin.
pub fn light_view_proj(light: &DirectionalLight, casters: &[(Vec3, f32)]) -> Mat4 {
    let direction = light.direction.normalize_or(Vec3::NEG_Y);

    let (min, max) = casters.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), &(center, radius)| (min.min(center - radius), max.max(center + radius)),
    );
    let (center, radius) = if casters.is_empty() {
        (Vec3::ZERO, 1.0)
    } else {
        ((min + max) * 0.5, ((max - min) * 0.5).length().max(1.0))
    };

    let up = if direction.abs().abs_diff_eq(Vec3::Y, 1e-3) {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let eye = center - direction * (radius + 1.0);
    let view = Mat4::look_to_rh(eye, direction, up);
    let proj = Mat4::orthographic_rh(-radius, radius, -radius, radius, 0.0, 2.0 * radius + 2.0 + RECEIVER_DEPTH);
    proj * view
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct LightUniforms {
    view_proj: [[f32; 4]; 4],
}

/// Renders the shadow map.
pub struct ShadowPass {
    pipeline: wgpu::RenderPipeline,
    light_buffer: wgpu::Buffer,
    light_bind_group: wgpu::BindGroup,
    models: ModelUniformBuffer,
    map: Texture,
    view_proj: Mat4,
}

impl ShadowPass {
    pub fn new(gpu: &GpuContext, settings: &ShadowSettings, max_casters: usize) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shadow.wgsl").into()),
        });

        let light_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light Uniforms"),
            size: std::mem::size_of::<LightUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let light_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Light Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Light Bind Group"),
            layout: &light_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            }],
        });

        let models = ModelUniformBuffer::new(gpu, "Shadow Model Uniforms", max_casters);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&light_bind_group_layout, models.layout()],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[Vertex3d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            light_buffer,
            light_bind_group,
            models,
            map: Texture::shadow_map(gpu, settings.map_size),
            view_proj: Mat4::IDENTITY,
        }
    }

    /// The shadow map, sampled by the mesh pass.
    pub fn map(&self) -> &Texture {
        &self.map
    }

    /// Light view-projection used for the latest render.
    pub fn view_proj(&self) -> Mat4 {
        self.view_proj
    }

    /// Fit the light frustum and draw every caster into the shadow map.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        light: &DirectionalLight,
        casters: &[ShadowCall],
    ) {
        let spheres: Vec<(Vec3, f32)> = casters
            .iter()
            .map(|c| (c.transform.position, c.radius))
            .collect();
        self.view_proj = light_view_proj(light, &spheres);

        gpu.queue.write_buffer(
            &self.light_buffer,
            0,
            bytemuck::cast_slice(&[LightUniforms {
                view_proj: self.view_proj.to_cols_array_2d(),
            }]),
        );

        let uniforms: Vec<ModelUniforms> = casters
            .iter()
            .map(|c| ModelUniforms::new(&c.transform, 0))
            .collect();
        self.models.write(gpu, &uniforms);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.map.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.light_bind_group, &[]);
        for (i, caster) in casters.iter().enumerate() {
            pass.set_bind_group(1, self.models.bind_group(), &[self.models.offset(i)]);
            pass.set_vertex_buffer(0, caster.mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(caster.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..caster.mesh.index_count, 0, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(m: Mat4, p: Vec3) -> Vec3 {
        let clip = m * p.extend(1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn frustum_contains_every_caster() {
        let light = DirectionalLight::scene_default();
        let casters = [
            (Vec3::new(4.0, 2.5, 0.0), 1.0),
            (Vec3::new(-16.0, 19.0, 0.0), 3.0),
            (Vec3::new(-7.0, 0.5, 3.0), 3.0),
        ];
        let m = light_view_proj(&light, &casters);

        for (center, radius) in casters {
            for corner in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
                let p = project(m, center + corner * radius);
                assert!(p.x.abs() <= 1.0 + 1e-4 && p.y.abs() <= 1.0 + 1e-4, "{:?}", p);
                assert!((-1e-4..=1.0 + 1e-4).contains(&p.z), "{:?}", p);
            }
        }
    }

    #[test]
    fn higher_casters_are_closer_to_a_downward_light() {
        let light = DirectionalLight::scene_default();
        let m = light_view_proj(&light, &[(Vec3::ZERO, 5.0)]);
        let high = project(m, Vec3::new(0.0, 4.0, 0.0));
        let low = project(m, Vec3::new(0.0, -4.0, 0.0));
        assert!(high.z < low.z);
    }

    #[test]
    fn ground_below_falling_casters_still_receives() {
        let light = DirectionalLight::scene_default();
        let m = light_view_proj(&light, &[(Vec3::new(0.0, 15.0, 0.0), 2.0)]);
        let ground = project(m, Vec3::ZERO);
        assert!(ground.z > 0.0 && ground.z < 1.0);
    }

    #[test]
    fn no_casters_is_still_a_valid_frustum() {
        let m = light_view_proj(&DirectionalLight::scene_default(), &[]);
        assert!(m.is_finite());
    }
}
