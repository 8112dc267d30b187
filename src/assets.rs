//! Asset and environment loading.
//!
//! The scene needs three opaque assets:
//!
//! - a glTF binary bundle with exactly the nine meshes in [`REQUIRED_MESHES`],
//!   looked up by node name;
//! - an equirectangular environment image, the reflection source of the shared
//!   material;
//! - a particle sprite image.
//!
//! Loading is all-or-nothing. A missing file, a bundle that does not parse or
//! a missing name yields a [`SceneError`] and the scene is never built.

use std::path::Path;

use glam::{Quat, Vec3};
use image::RgbaImage;

use crate::config::AssetPaths;
use crate::ecs::MeshId;
use crate::error::SceneError;
use crate::geometry::RawGeometry;
use crate::mesh::Vertex3d;

/// Node name of the logo mesh.
pub const LOGO_MESH: &str = "freeCodeLogo";

/// Node names of the eight letters, left to right.
pub const LETTER_MESHES: [&str; 8] = ["f", "r", "e1", "e2", "c", "o", "d", "e3"];

/// Every name the bundle must provide.
pub const REQUIRED_MESHES: [&str; 9] = [
    LOGO_MESH, "f", "r", "e1", "e2", "c", "o", "d", "e3",
];

/// One named mesh, de-parented from the imported hierarchy.
#[derive(Clone, Debug)]
pub struct NamedMesh {
    pub name: String,
    pub id: MeshId,
    /// Geometry recentred on its bounding-box centre.
    pub geometry: RawGeometry,
    /// World rotation the node had in the imported hierarchy.
    pub rotation: Quat,
}

/// Everything the scene loads before the loop starts.
#[derive(Clone, Debug)]
pub struct AssetBundle {
    meshes: Vec<NamedMesh>,
    pub environment: RgbaImage,
    pub sprite: RgbaImage,
}

impl AssetBundle {
    /// Load the bundle, the environment and the sprite from disk.
    pub fn load(paths: &AssetPaths) -> Result<Self, SceneError> {
        log::info!("loading asset bundle {}", paths.bundle.display());
        let bytes = std::fs::read(&paths.bundle)?;
        let meshes = parse_bundle(&bytes)?;

        let environment = load_image(&paths.environment)?;
        let sprite = load_image(&paths.sprite)?;

        Self::from_meshes(meshes, environment, sprite)
    }

    /// Build a bundle from in-memory geometry.
    ///
    /// Meshes are given ids in order. Geometry is recentred and every
    /// required name must be present.
    pub fn from_meshes(
        meshes: Vec<(String, RawGeometry, Quat)>,
        environment: RgbaImage,
        sprite: RgbaImage,
    ) -> Result<Self, SceneError> {
        let mut named = Vec::with_capacity(meshes.len());
        for (i, (name, mut geometry, rotation)) in meshes.into_iter().enumerate() {
            if geometry.is_empty() {
                return Err(SceneError::EmptyMesh(name));
            }
            geometry.recenter();
            named.push(NamedMesh {
                name,
                id: MeshId(i),
                geometry,
                rotation,
            });
        }

        for required in REQUIRED_MESHES {
            if !named.iter().any(|m| m.name == required) {
                return Err(SceneError::MissingMesh(required.to_string()));
            }
        }

        log::info!("asset bundle ready: {} meshes", named.len());
        Ok(Self {
            meshes: named,
            environment,
            sprite,
        })
    }

    /// Exact-name lookup.
    pub fn mesh(&self, name: &str) -> Result<&NamedMesh, SceneError> {
        self.meshes
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| SceneError::MissingMesh(name.to_string()))
    }

    /// All meshes in id order.
    pub fn meshes(&self) -> &[NamedMesh] {
        &self.meshes
    }
}

fn load_image(path: &Path) -> Result<RgbaImage, SceneError> {
    let bytes = std::fs::read(path)?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

/// Extract the required named meshes from glTF (binary or JSON) bytes.
///
/// Nodes that are not required are ignored. The first node with a given name
/// wins.
fn parse_bundle(bytes: &[u8]) -> Result<Vec<(String, RawGeometry, Quat)>, SceneError> {
    let (document, buffers, _images) = gltf::import_slice(bytes)?;

    let mut found: Vec<(String, RawGeometry, Quat)> = Vec::new();
    let roots: Vec<gltf::Node> = match document.default_scene().or_else(|| document.scenes().next())
    {
        Some(scene) => scene.nodes().collect(),
        None => document.nodes().collect(),
    };

    let mut stack: Vec<(gltf::Node, Quat)> = roots.into_iter().map(|n| (n, Quat::IDENTITY)).collect();
    while let Some((node, parent_rotation)) = stack.pop() {
        let (_, local_rotation, _) = node.transform().decomposed();
        let rotation = parent_rotation * Quat::from_array(local_rotation);

        if let (Some(name), Some(mesh)) = (node.name(), node.mesh()) {
            let wanted = REQUIRED_MESHES.contains(&name);
            if wanted && !found.iter().any(|(n, _, _)| n == name) {
                let geometry = read_mesh(&mesh, &buffers);
                found.push((name.to_string(), geometry, rotation));
            }
        }

        for child in node.children() {
            stack.push((child, rotation));
        }
    }

    // Keep bundle order stable regardless of traversal order.
    found.sort_by_key(|(name, _, _)| {
        REQUIRED_MESHES
            .iter()
            .position(|r| r == name)
            .unwrap_or(usize::MAX)
    });
    Ok(found)
}

fn read_mesh(mesh: &gltf::Mesh, buffers: &[gltf::buffer::Data]) -> RawGeometry {
    let mut geometry = RawGeometry::new(Vec::new(), Vec::new());
    let mut needs_normals = false;

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            continue;
        }
        let reader = primitive.reader(|buffer| Some(buffers[buffer.index()].0.as_slice()));

        let positions: Vec<[f32; 3]> = match reader.read_positions() {
            Some(iter) => iter.collect(),
            None => continue,
        };
        let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
        let uvs: Option<Vec<[f32; 2]>> = reader.read_tex_coords(0).map(|t| t.into_f32().collect());
        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        needs_normals |= normals.is_none();
        let vertices = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| {
                let normal = normals
                    .as_ref()
                    .and_then(|n| n.get(i).copied())
                    .unwrap_or([0.0, 0.0, 0.0]);
                let uv = uvs
                    .as_ref()
                    .and_then(|t| t.get(i).copied())
                    .unwrap_or([0.0, 0.0]);
                Vertex3d::new(position, normal, uv)
            })
            .collect();

        geometry.append(RawGeometry::new(vertices, indices));
    }

    if needs_normals {
        geometry.recalculate_normals();
    }
    geometry
}

/// Size of the box proxy for a mesh drawn at `scale`.
pub fn proxy_half_extents(mesh: &NamedMesh, scale: f32) -> Vec3 {
    (mesh.geometry.half_extents() * scale).max(Vec3::splat(0.01))
}
