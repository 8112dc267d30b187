//! Error types for scene setup.
//!
//! Everything that can go wrong before the first tick funnels into
//! [`SceneError`]. A `SceneError` is fatal to the vignette only: the host logs
//! it and leaves the mount point empty.

use std::fmt;

/// Errors raised while acquiring the GPU.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for the window.
    Surface(wgpu::CreateSurfaceError),
    /// No compatible adapter was found.
    NoAdapter(wgpu::RequestAdapterError),
    /// The adapter refused to hand out a device.
    Device(wgpu::RequestDeviceError),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::Surface(e) => write!(f, "failed to create GPU surface: {}", e),
            GpuError::NoAdapter(e) => write!(f, "no compatible GPU adapter: {}", e),
            GpuError::Device(e) => write!(f, "failed to create GPU device: {}", e),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::Surface(e) => Some(e),
            GpuError::NoAdapter(e) => Some(e),
            GpuError::Device(e) => Some(e),
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::Surface(e)
    }
}

impl From<wgpu::RequestAdapterError> for GpuError {
    fn from(e: wgpu::RequestAdapterError) -> Self {
        GpuError::NoAdapter(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::Device(e)
    }
}

/// Errors that abort scene setup.
#[derive(Debug)]
pub enum SceneError {
    /// An asset or config file could not be read.
    Io(std::io::Error),
    /// The glTF bundle could not be parsed.
    Bundle(gltf::Error),
    /// An image asset could not be decoded.
    Image(image::ImageError),
    /// A required named mesh is absent from the bundle.
    MissingMesh(String),
    /// A named mesh exists but carries no triangles.
    EmptyMesh(String),
    /// The rendering backend is unavailable.
    Gpu(GpuError),
    /// The configuration file is malformed.
    Config(String),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::Io(e) => write!(f, "IO error: {}", e),
            SceneError::Bundle(e) => write!(f, "asset bundle error: {}", e),
            SceneError::Image(e) => write!(f, "image error: {}", e),
            SceneError::MissingMesh(name) => {
                write!(f, "asset bundle has no mesh named '{}'", name)
            }
            SceneError::EmptyMesh(name) => write!(f, "mesh '{}' has no triangles", name),
            SceneError::Gpu(e) => write!(f, "{}", e),
            SceneError::Config(msg) => write!(f, "config error: {}", msg),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneError::Io(e) => Some(e),
            SceneError::Bundle(e) => Some(e),
            SceneError::Image(e) => Some(e),
            SceneError::Gpu(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SceneError {
    fn from(e: std::io::Error) -> Self {
        SceneError::Io(e)
    }
}

impl From<gltf::Error> for SceneError {
    fn from(e: gltf::Error) -> Self {
        SceneError::Bundle(e)
    }
}

impl From<image::ImageError> for SceneError {
    fn from(e: image::ImageError) -> Self {
        SceneError::Image(e)
    }
}

impl From<GpuError> for SceneError {
    fn from(e: GpuError) -> Self {
        SceneError::Gpu(e)
    }
}

impl From<toml::de::Error> for SceneError {
    fn from(e: toml::de::Error) -> Self {
        SceneError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_mesh_names_the_mesh() {
        let err = SceneError::MissingMesh("e3".to_string());
        assert_eq!(err.to_string(), "asset bundle has no mesh named 'e3'");
    }

    #[test]
    fn io_error_keeps_source() {
        let err: SceneError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "bundle.glb").into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
