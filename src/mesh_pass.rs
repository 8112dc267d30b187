//! Lit mesh rendering with environment reflections and soft shadows.
//!
//! # Architecture
//!
//! The mesh pass uses three bind groups:
//! - **Group 0**: Scene uniforms (camera, light, shared material, tone controls)
//! - **Group 1**: Model uniforms, one slot per draw call behind a dynamic offset
//! - **Group 2**: Environment texture and the shadow map
//!
//! Every draw call picks a shading path through its [`MaterialKind`]: the
//! shared plastic, the shadow-catching backdrop ground or the flat backdrop
//! box. Back faces are never culled.

use glam::Mat4;

use crate::camera::Camera;
use crate::ecs::MaterialKind;
use crate::gpu::GpuContext;
use crate::material::Lighting;
use crate::mesh::{Mesh, Transform, Vertex3d};
use crate::texture::{DEPTH_FORMAT, Texture};

/// Scene-wide uniforms, uploaded once per frame.
///
/// Scalars ride in the `w` lanes to keep the layout free of padding.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    /// xyz camera position, w elapsed seconds.
    pub camera_pos: [f32; 4],
    /// xyz light direction, w exposure.
    pub light_dir: [f32; 4],
    /// rgb albedo, w roughness.
    pub albedo: [f32; 4],
    /// rgb emissive, w metallic.
    pub emissive: [f32; 4],
    /// rgb ambient, w contrast.
    pub ambient: [f32; 4],
    /// rgb reflectivity, w shadow normal bias.
    pub reflectivity: [f32; 4],
    /// rgb backdrop colour, w ground shadow level.
    pub backdrop: [f32; 4],
    /// x map size, y Poisson radius in uv, z unused, w 1 for Poisson sampling.
    pub shadow: [f32; 4],
}

impl SceneUniforms {
    pub fn new(camera: &Camera, aspect: f32, light_view_proj: Mat4, lighting: &Lighting, time: f32) -> Self {
        let m = &lighting.material;
        let a = &lighting.ambience;
        let s = &lighting.shadows;
        Self {
            view_proj: camera.view_projection(aspect).to_cols_array_2d(),
            light_view_proj: light_view_proj.to_cols_array_2d(),
            camera_pos: camera.position.extend(time).to_array(),
            light_dir: lighting.light.direction.normalize_or_zero().extend(a.exposure).to_array(),
            albedo: m.albedo.extend(m.roughness).to_array(),
            emissive: m.emissive.extend(m.metallic).to_array(),
            ambient: m.ambient.extend(a.contrast).to_array(),
            reflectivity: m.reflectivity.extend(s.normal_bias).to_array(),
            backdrop: a.backdrop_color.extend(a.ground_shadow_level).to_array(),
            shadow: [
                s.map_size as f32,
                s.poisson_radius(),
                0.0,
                if s.poisson { 1.0 } else { 0.0 },
            ],
        }
    }
}

/// Per-draw model uniforms.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniforms {
    /// Model matrix (object to world space transformation).
    pub model: [[f32; 4]; 4],
    /// Inverse transpose of the model matrix, for normals.
    pub normal_matrix: [[f32; 4]; 4],
    /// x selects the shading path.
    pub params: [u32; 4],
}

impl ModelUniforms {
    pub fn new(transform: &Transform, material: u32) -> Self {
        let model = transform.matrix();
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            params: [material, 0, 0, 0],
        }
    }
}

/// A uniform buffer holding one [`ModelUniforms`] per draw call.
///
/// Each slot sits at a dynamic offset, so all draws of a pass can be written
/// with one `write_buffer` before the pass is recorded.
pub struct ModelUniformBuffer {
    label: &'static str,
    buffer: wgpu::Buffer,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    stride: u64,
    capacity: usize,
}

impl ModelUniformBuffer {
    pub fn new(gpu: &GpuContext, label: &'static str, capacity: usize) -> Self {
        let device = &gpu.device;
        let align = device.limits().min_uniform_buffer_offset_alignment as u64;
        let size = std::mem::size_of::<ModelUniforms>() as u64;
        let stride = size.div_ceil(align) * align;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(size),
                },
                count: None,
            }],
        });

        let (buffer, bind_group) = Self::allocate(gpu, label, &layout, stride, capacity.max(1));
        Self {
            label,
            buffer,
            layout,
            bind_group,
            stride,
            capacity: capacity.max(1),
        }
    }

    fn allocate(
        gpu: &GpuContext,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ModelUniforms>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Dynamic offset of slot `index`.
    pub fn offset(&self, index: usize) -> u32 {
        (self.stride * index as u64) as u32
    }

    /// Upload `uniforms` into slots `0..uniforms.len()`, growing if needed.
    pub fn write(&mut self, gpu: &GpuContext, uniforms: &[ModelUniforms]) {
        if uniforms.len() > self.capacity {
            let capacity = uniforms.len().next_power_of_two();
            let (buffer, bind_group) =
                Self::allocate(gpu, self.label, &self.layout, self.stride, capacity);
            self.buffer = buffer;
            self.bind_group = bind_group;
            self.capacity = capacity;
        }

        let stride = self.stride as usize;
        let mut bytes = vec![0u8; stride * uniforms.len()];
        for (i, u) in uniforms.iter().enumerate() {
            let src = bytemuck::bytes_of(u);
            bytes[i * stride..i * stride + src.len()].copy_from_slice(src);
        }
        if !bytes.is_empty() {
            gpu.queue.write_buffer(&self.buffer, 0, &bytes);
        }
    }
}

/// A draw call queued for rendering.
pub struct DrawCall<'a> {
    pub mesh: &'a Mesh,
    pub transform: Transform,
    pub material: MaterialKind,
}

/// Handles lit 3D mesh rendering with depth testing.
pub struct MeshPass {
    pipeline: wgpu::RenderPipeline,
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    models: ModelUniformBuffer,
    texture_bind_group: wgpu::BindGroup,
}

impl MeshPass {
    /// Build the pipeline and bind the environment and shadow map.
    pub fn new(gpu: &GpuContext, environment: &Texture, shadow_map: &Texture, max_draws: usize) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });

        // Scene uniform buffer (group 0)
        let scene_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let scene_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Scene Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &scene_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });

        // Model uniforms (group 1)
        let models = ModelUniformBuffer::new(gpu, "Mesh Model Uniforms", max_draws);

        // Environment + shadow map (group 2)
        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Mesh Texture Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Depth,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                        count: None,
                    },
                ],
            });

        let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh Texture Bind Group"),
            layout: &texture_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&environment.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&environment.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&shadow_map.sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[
                &scene_bind_group_layout,
                models.layout(),
                &texture_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[Vertex3d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // double-sided material
                cull_mode: None,
                front_face: wgpu::FrontFace::Ccw,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            scene_buffer,
            scene_bind_group,
            models,
            texture_bind_group,
        }
    }

    /// Upload the frame's uniforms. Must run before the render pass is recorded.
    pub fn prepare(&mut self, gpu: &GpuContext, scene: &SceneUniforms, draw_calls: &[DrawCall]) {
        gpu.queue
            .write_buffer(&self.scene_buffer, 0, bytemuck::cast_slice(&[*scene]));

        let uniforms: Vec<ModelUniforms> = draw_calls
            .iter()
            .map(|call| ModelUniforms::new(&call.transform, call.material.shader_id()))
            .collect();
        self.models.write(gpu, &uniforms);
    }

    /// Record the draw calls passed to the latest [`prepare`](Self::prepare).
    pub fn render(&self, render_pass: &mut wgpu::RenderPass, draw_calls: &[DrawCall]) {
        if draw_calls.is_empty() {
            return;
        }

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.scene_bind_group, &[]);
        render_pass.set_bind_group(2, &self.texture_bind_group, &[]);

        for (i, call) in draw_calls.iter().enumerate() {
            render_pass.set_bind_group(1, self.models.bind_group(), &[self.models.offset(i)]);
            render_pass.set_vertex_buffer(0, call.mesh.vertex_buffer.slice(..));
            render_pass
                .set_index_buffer(call.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..call.mesh.index_count, 0, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn uniform_layouts_have_no_padding() {
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 256);
        assert_eq!(std::mem::size_of::<ModelUniforms>(), 144);
    }

    #[test]
    fn scene_uniforms_pack_lighting() {
        let lighting = Lighting::scene_default();
        let camera = Camera::default();
        let u = SceneUniforms::new(&camera, 1.5, Mat4::IDENTITY, &lighting, 2.0);
        assert_eq!(u.camera_pos[3], 2.0);
        assert_eq!(u.light_dir, [0.0, -1.0, 0.0, 0.6]);
        assert_eq!(u.ambient[3], 1.6);
        assert_eq!(u.shadow, [512.0, 24.0 / 512.0, 0.0, 1.0]);
        assert_eq!(u.backdrop[3], 0.2);
    }

    #[test]
    fn model_uniforms_carry_material() {
        let t = Transform::new().position(Vec3::new(1.0, 2.0, 3.0)).uniform_scale(4.0);
        let u = ModelUniforms::new(&t, MaterialKind::ShadowCatcher.shader_id());
        assert_eq!(u.params[0], 1);
        assert_eq!(u.model[3], [1.0, 2.0, 3.0, 1.0]);
    }
}
