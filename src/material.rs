//! Lighting, the shared material and shadow settings.
//!
//! These are plain parameter blocks. The render passes turn them into uniform
//! buffers at mount time; the scene keeps them so they can be inspected.

use glam::Vec3;

/// The single directional light.
///
/// Its position only places the shadow camera; illumination uses the
/// direction alone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub position: Vec3,
}

impl DirectionalLight {
    pub fn scene_default() -> Self {
        Self {
            direction: Vec3::NEG_Y,
            position: Vec3::new(0.0, 10.0, 0.0),
        }
    }
}

/// Physically-based material shared by the logo and every letter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PbrMaterial {
    pub albedo: Vec3,
    pub roughness: f32,
    pub metallic: f32,
    pub reflectivity: Vec3,
    pub emissive: Vec3,
    pub ambient: Vec3,
    /// Back faces are drawn too.
    pub double_sided: bool,
}

impl PbrMaterial {
    /// Glossy pale plastic with a faint purple glow.
    pub fn plastic() -> Self {
        Self {
            albedo: Vec3::splat(0.9),
            roughness: 0.0,
            metallic: 0.0,
            reflectivity: Vec3::splat(0.003),
            emissive: Vec3::new(73.0, 24.0, 70.0) / 255.0,
            ambient: Vec3::new(147.0, 70.0, 141.0) / 255.0,
            double_sided: true,
        }
    }
}

/// Shadow map configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowSettings {
    pub map_size: u32,
    /// Soft edges via Poisson disk sampling.
    pub poisson: bool,
    pub blur_box_offset: f32,
    pub blur_scale: f32,
    pub normal_bias: f32,
}

impl ShadowSettings {
    pub fn scene_default() -> Self {
        Self {
            map_size: 512,
            poisson: true,
            blur_box_offset: 3.0,
            blur_scale: 8.0,
            normal_bias: 0.3,
        }
    }

    /// Poisson disk radius in shadow-map uv.
    ///
    /// The blur box offset counts texels of a map shrunk by `blur_scale`.
    pub fn poisson_radius(&self) -> f32 {
        self.blur_box_offset * self.blur_scale / self.map_size.max(1) as f32
    }
}

/// Clear colour, tone controls and the backdrop behind the bodies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneAmbience {
    pub clear_color: [f64; 4],
    pub exposure: f32,
    pub contrast: f32,
    pub backdrop_color: Vec3,
    /// Side length of the backdrop ground plane at y = 0.
    pub ground_size: f32,
    /// How dark a full shadow on the backdrop ground gets.
    pub ground_shadow_level: f32,
    /// Side length of the backdrop box.
    pub skybox_size: f32,
}

impl SceneAmbience {
    pub fn scene_default() -> Self {
        Self {
            clear_color: [1.0, 1.0, 1.0, 1.0],
            exposure: 0.6,
            contrast: 1.6,
            backdrop_color: Vec3::new(0.47, 0.11, 0.68),
            ground_size: 80.0,
            ground_shadow_level: 0.2,
            skybox_size: 500.0,
        }
    }
}

/// Everything the mesh and shadow passes need to shade the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lighting {
    pub light: DirectionalLight,
    pub material: PbrMaterial,
    pub shadows: ShadowSettings,
    pub ambience: SceneAmbience,
}

impl Lighting {
    pub fn scene_default() -> Self {
        Self {
            light: DirectionalLight::scene_default(),
            material: PbrMaterial::plastic(),
            shadows: ShadowSettings::scene_default(),
            ambience: SceneAmbience::scene_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plastic_is_mirror_smooth_dielectric() {
        let m = PbrMaterial::plastic();
        assert_eq!(m.roughness, 0.0);
        assert_eq!(m.metallic, 0.0);
        assert!(m.double_sided);
        assert!(m.reflectivity.max_element() < 0.01);
    }

    #[test]
    fn light_points_straight_down() {
        let light = DirectionalLight::scene_default();
        assert_eq!(light.direction, Vec3::NEG_Y);
        assert_eq!(light.position.y, 10.0);
    }

    #[test]
    fn shadow_defaults() {
        let s = ShadowSettings::scene_default();
        assert_eq!(s.map_size, 512);
        assert!(s.poisson);
        assert_eq!((s.blur_box_offset, s.blur_scale), (3.0, 8.0));
    }

    #[test]
    fn blur_scale_widens_the_poisson_disk() {
        let mut s = ShadowSettings::scene_default();
        assert_eq!(s.poisson_radius(), 24.0 / 512.0);
        s.blur_scale = 4.0;
        assert_eq!(s.poisson_radius(), 12.0 / 512.0);
    }
}
