use glam::Vec3;

use crate::camera::Camera;

/// Viewport widths at or below this many logical pixels use the narrow preset.
pub const NARROW_BREAKPOINT: f32 = 640.0;

/// Zoom distance limits.
pub const MIN_DISTANCE: f32 = 16.0;
pub const MAX_DISTANCE: f32 = 40.0;

/// One of the two focus presets, chosen by viewport width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusPreset {
    /// Phones and other narrow viewports: look higher and closer.
    Narrow,
    Wide,
}

impl FocusPreset {
    /// The threshold is inclusive: 640 is still narrow.
    pub fn for_width(viewport_width: f32) -> Self {
        if viewport_width <= NARROW_BREAKPOINT {
            FocusPreset::Narrow
        } else {
            FocusPreset::Wide
        }
    }

    /// `(y, z)` of the focus target.
    pub fn target_yz(self) -> (f32, f32) {
        match self {
            FocusPreset::Narrow => (2.0, -5.0),
            FocusPreset::Wide => (-2.0, -18.0),
        }
    }
}

/// A fixed-pose orbit camera around a focus target.
///
/// Angles follow the usual orbit convention: `alpha` is the longitudinal
/// angle in the XZ plane measured from +X, `beta` the tilt measured from the
/// vertical axis. Everything except the target's y/z is frozen at creation.
///
/// # Example
/// ```
/// use letterfall::OrbitCamera;
///
/// let mut orbit = OrbitCamera::create();
/// orbit.update_focus(320.0);
/// assert_eq!(orbit.target().y, 2.0);
/// assert_eq!(orbit.distance(), 40.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitCamera {
    target: Vec3,
    distance: f32,
    alpha: f32,
    beta: f32,
    fov: f32,
}

impl OrbitCamera {
    /// Longitudinal angle of the vignette's camera.
    pub const ALPHA: f32 = std::f32::consts::FRAC_PI_2;
    /// Tilt from vertical of the vignette's camera.
    pub const BETA: f32 = std::f32::consts::PI / 2.3;
    /// Tilt may not exceed the horizon.
    pub const MAX_BETA: f32 = std::f32::consts::FRAC_PI_2;
    /// Distance requested at creation, before clamping to the zoom limits.
    pub const REQUESTED_DISTANCE: f32 = 200.0;

    /// Configure the scene camera.
    ///
    /// The requested distance of 200 is clamped into [16, 40].
    pub fn create() -> Self {
        Self {
            target: Vec3::new(-5.0, -2.0, -18.0),
            distance: Self::REQUESTED_DISTANCE.clamp(MIN_DISTANCE, MAX_DISTANCE),
            alpha: Self::ALPHA,
            beta: Self::BETA.min(Self::MAX_BETA),
            fov: 0.8,
        }
    }

    /// Move the focus target to the preset for `viewport_width`.
    ///
    /// Pure in its argument: x is left alone and repeated calls with the same
    /// width change nothing.
    pub fn update_focus(&mut self, viewport_width: f32) -> FocusPreset {
        let preset = FocusPreset::for_width(viewport_width);
        let (y, z) = preset.target_yz();
        self.target.y = y;
        self.target.z = z;
        preset
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn beta(&self) -> f32 {
        self.beta
    }

    /// Get the current camera state.
    pub fn camera(&self) -> Camera {
        // Spherical to Cartesian, beta from the +Y axis
        let offset = Vec3::new(
            self.distance * self.alpha.cos() * self.beta.sin(),
            self.distance * self.beta.cos(),
            self.distance * self.alpha.sin() * self.beta.sin(),
        );

        let position = self.target + offset;

        Camera {
            position,
            forward: (self.target - position).normalize_or(Vec3::NEG_Z),
            up: Vec3::Y,
            fov: self.fov,
            near: 0.1,
            far: 2000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_clamped_to_zoom_limits() {
        let orbit = OrbitCamera::create();
        assert_eq!(orbit.distance(), MAX_DISTANCE);
        assert!(orbit.beta() <= OrbitCamera::MAX_BETA);
    }

    #[test]
    fn focus_presets() {
        let mut orbit = OrbitCamera::create();

        assert_eq!(orbit.update_focus(320.0), FocusPreset::Narrow);
        assert_eq!((orbit.target().y, orbit.target().z), (2.0, -5.0));

        assert_eq!(orbit.update_focus(1024.0), FocusPreset::Wide);
        assert_eq!((orbit.target().y, orbit.target().z), (-2.0, -18.0));

        // inclusive threshold
        assert_eq!(orbit.update_focus(640.0), FocusPreset::Narrow);
        assert_eq!((orbit.target().y, orbit.target().z), (2.0, -5.0));
        assert_eq!(FocusPreset::for_width(640.5), FocusPreset::Wide);
    }

    #[test]
    fn focus_is_idempotent_and_leaves_everything_else() {
        let mut orbit = OrbitCamera::create();
        orbit.update_focus(800.0);
        let once = orbit.clone();
        orbit.update_focus(800.0);
        assert_eq!(orbit, once);

        orbit.update_focus(300.0);
        assert_eq!(orbit.target().x, -5.0);
        assert_eq!(orbit.distance(), once.distance());
        assert_eq!(orbit.alpha(), once.alpha());
        assert_eq!(orbit.beta(), once.beta());
    }

    #[test]
    fn camera_sits_above_horizon_in_front_of_target() {
        let orbit = OrbitCamera::create();
        let camera = orbit.camera();
        assert!(camera.position.y > orbit.target().y);
        assert!(camera.position.z > orbit.target().z);
        assert!((camera.position.distance(orbit.target()) - 40.0).abs() < 1e-3);
    }
}
