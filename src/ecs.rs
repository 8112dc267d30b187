//! ECS components and type-safe handles.
//!
//! Every rigid body in the scene is a `hecs` entity carrying a
//! [`Transform`](crate::Transform), a [`RenderMesh`] and a
//! [`BodyRecord`](crate::BodyRecord). Animated bodies also carry a
//! [`ShadowCaster`] marker. The renderer only looks at the first two plus the
//! marker; physics and lifecycle code only look at the record.

/// Type-safe handle to a mesh uploaded by the renderer.
///
/// Ids are assigned by the asset loader in bundle order and the renderer
/// uploads meshes in that same order, so an id is valid on both sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) usize);

impl MeshId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Which shading path a mesh goes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MaterialKind {
    /// The shared reflective plastic material.
    #[default]
    Plastic,
    /// The backdrop ground: only shows shadows over the backdrop colour.
    ShadowCatcher,
    /// The backdrop box around the whole scene, flat backdrop colour.
    Skybox,
}

impl MaterialKind {
    /// Value of the shader's material selector.
    pub fn shader_id(self) -> u32 {
        match self {
            MaterialKind::Plastic => 0,
            MaterialKind::ShadowCatcher => 1,
            MaterialKind::Skybox => 2,
        }
    }
}

/// Component for rendering a mesh on an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderMesh {
    /// Handle to the mesh geometry.
    pub mesh: MeshId,
    pub material: MaterialKind,
}

impl RenderMesh {
    pub fn new(mesh: MeshId) -> Self {
        Self {
            mesh,
            material: MaterialKind::Plastic,
        }
    }
}

/// Marker: the entity is drawn into the shadow map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowCaster;
