//! The scene: one owner for every resource, advanced one tick at a time.
//!
//! [`SceneHandle`] is built once from a loaded [`AssetBundle`] and torn down
//! with [`SceneHandle::dispose`]. Input from the host is queued and applied at
//! the start of the next [`tick`](SceneHandle::tick), so a tick always sees a
//! consistent snapshot.

use std::collections::VecDeque;
use std::f32::consts::PI;

use glam::{Quat, Vec3};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::assets::AssetBundle;
use crate::bodies::BodyRegistry;
use crate::camera::Camera;
use crate::config::SceneConfig;
use crate::error::SceneError;
use crate::interaction;
use crate::lifecycle::{self, KillVolume};
use crate::material::Lighting;
use crate::orbit_camera::OrbitCamera;
use crate::particles::ParticleSystem;
use crate::physics::{PhysicsWorld, TIMESTEP};
use crate::picking::{self, Ray};
use crate::renderer::{self, FrameView, Renderer};

/// Logo yaw added every tick, in radians.
pub const LOGO_SPIN: f32 = PI / 600.0;

/// Ticks per full logo turn.
const SPIN_PERIOD: u64 = 1200;

/// Something the host wants the scene to react to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SceneEvent {
    /// The viewport changed. `logical_width` drives the camera focus, the
    /// physical size drives the render targets.
    Resize {
        logical_width: f32,
        width: u32,
        height: u32,
    },
    /// A discrete pointer press, already turned into a pick ray.
    PointerDown(Ray),
}

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub stepped: bool,
    /// Letters sent back to the spawn region.
    pub recycled: usize,
    /// Pointer events that pushed a body.
    pub pushed: usize,
    pub rendered: bool,
}

pub struct SceneHandle<R: Renderer> {
    renderer: Option<R>,
    camera: OrbitCamera,
    lighting: Lighting,
    physics: PhysicsWorld,
    registry: BodyRegistry,
    kill_volume: KillVolume,
    particles: ParticleSystem,
    events: VecDeque<SceneEvent>,
    /// Spin ticks modulo one turn, so the yaw never loses precision.
    logo_ticks: u64,
    rng: StdRng,
    disposed: bool,
}

impl<R: Renderer> SceneHandle<R> {
    /// Build the whole scene from loaded assets.
    ///
    /// `renderer` may be `None` to run the simulation headless.
    pub fn new(assets: &AssetBundle, renderer: Option<R>, config: &SceneConfig) -> Result<Self, SceneError> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let camera = Self::create_camera(config.width as f32);
        let lighting = Self::create_lighting();
        let (mut physics, kill_volume) = Self::create_physics();

        let mut registry = BodyRegistry::new();
        registry.spawn_scene_bodies(&mut physics, assets, &mut rng)?;
        // colliders must be in place before the first pick
        physics.refresh_queries();

        let particles = Self::create_particles(&mut rng);

        log::info!("scene ready: {} bodies, {} particles", registry.len(), particles.len());

        Ok(Self {
            renderer,
            camera,
            lighting,
            physics,
            registry,
            kill_volume,
            particles,
            events: VecDeque::new(),
            logo_ticks: 0,
            rng,
            disposed: false,
        })
    }

    fn create_camera(viewport_width: f32) -> OrbitCamera {
        let mut camera = OrbitCamera::create();
        let preset = camera.update_focus(viewport_width);
        log::info!("camera focus {:?} for width {}", preset, viewport_width);
        camera
    }

    fn create_lighting() -> Lighting {
        let lighting = Lighting::scene_default();
        log::info!(
            "light at y {} pointing {}",
            lighting.light.position.y,
            lighting.light.direction
        );
        lighting
    }

    fn create_physics() -> (PhysicsWorld, KillVolume) {
        let mut physics = PhysicsWorld::new();
        let kill_volume = KillVolume::create(&mut physics);
        log::info!("physics ready, kill volume top at y {}", kill_volume.top());
        (physics, kill_volume)
    }

    fn create_particles(rng: &mut StdRng) -> ParticleSystem {
        let mut particles = ParticleSystem::fountain(Vec3::ZERO);
        particles.start(rng);
        particles
    }

    /// Queue an event for the next tick. Ignored once disposed.
    pub fn queue(&mut self, event: SceneEvent) {
        if !self.disposed {
            self.events.push_back(event);
        }
    }

    /// Advance the scene by one fixed step and draw it.
    pub fn tick(&mut self) -> TickOutcome {
        if self.disposed {
            return TickOutcome::default();
        }
        let pushed = self.drain_events();

        self.physics.step();

        let recycled = lifecycle::evaluate_triggers(
            &mut self.registry,
            &mut self.physics,
            &self.kill_volume,
            &mut self.rng,
        );
        if recycled > 0 {
            // picks at the start of the next tick must see the reset poses
            self.physics.refresh_queries();
        }

        self.spin_logo();
        self.particles.update(&mut self.rng);
        self.registry.sync_transforms(&self.physics);

        TickOutcome {
            stepped: true,
            recycled,
            pushed,
            rendered: self.render(),
        }
    }

    fn drain_events(&mut self) -> usize {
        let mut pushed = 0;
        while let Some(event) = self.events.pop_front() {
            match event {
                SceneEvent::Resize {
                    logical_width,
                    width,
                    height,
                } => {
                    self.camera.update_focus(logical_width);
                    if let Some(renderer) = &mut self.renderer {
                        renderer.resize(width, height);
                    }
                }
                SceneEvent::PointerDown(ray) => {
                    let target = picking::pick(&self.physics, &self.registry, &ray);
                    if interaction::apply_pointer_force(target, &ray, &self.registry, &mut self.physics)
                        .is_some()
                    {
                        pushed += 1;
                    }
                }
            }
        }
        pushed
    }

    fn spin_logo(&mut self) {
        let Some(logo) = self.registry.logo() else {
            return;
        };
        let Some((body, base)) = self
            .registry
            .record(logo)
            .map(|r| (r.body, r.base_rotation))
        else {
            return;
        };

        self.logo_ticks = (self.logo_ticks + 1) % SPIN_PERIOD;
        let rotation = Quat::from_rotation_y(self.logo_yaw()) * base;
        self.physics.set_kinematic_rotation(body, rotation);
        self.registry.set_rotation(logo, rotation);
    }

    fn render(&mut self) -> bool {
        let time = self.elapsed();
        let Some(renderer) = &mut self.renderer else {
            return false;
        };

        let items = renderer::collect_draw_items(&self.registry);
        let particles = self.particles.instances();
        let frame = FrameView {
            camera: self.camera.camera(),
            lighting: &self.lighting,
            items: &items,
            particles: &particles,
            particle_pivot: self.particles.config().translation_pivot,
            time,
        };

        match renderer.render(&frame) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("frame dropped: {}", e);
                false
            }
        }
    }

    /// Release every resource. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.renderer = None;
        self.events.clear();
        self.particles.stop();
        self.registry.clear();
        self.physics.clear();
        log::info!("scene disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Simulated seconds since creation.
    pub fn elapsed(&self) -> f32 {
        self.physics.steps() as f32 * TIMESTEP
    }

    /// The current view, for building pick rays.
    pub fn camera(&self) -> Camera {
        self.camera.camera()
    }

    pub fn orbit_camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn lighting(&self) -> &Lighting {
        &self.lighting
    }

    /// Current logo yaw in [0, 2π).
    pub fn logo_yaw(&self) -> f32 {
        self.logo_ticks as f32 * LOGO_SPIN
    }

    pub fn registry(&self) -> &BodyRegistry {
        &self.registry
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }

    pub fn kill_volume(&self) -> &KillVolume {
        &self.kill_volume
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn renderer(&self) -> Option<&R> {
        self.renderer.as_ref()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::cube_bundle;
    use crate::renderer::RenderError;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        resizes: Vec<(u32, u32)>,
        frames: Vec<(usize, usize, f32)>,
    }

    struct RecordingRenderer {
        log: Rc<RefCell<Log>>,
        fail: bool,
    }

    impl Renderer for RecordingRenderer {
        fn resize(&mut self, width: u32, height: u32) {
            self.log.borrow_mut().resizes.push((width, height));
        }

        fn render(&mut self, frame: &FrameView<'_>) -> Result<(), RenderError> {
            if self.fail {
                return Err(RenderError::SurfaceLost);
            }
            self.log
                .borrow_mut()
                .frames
                .push((frame.items.len(), frame.particles.len(), frame.time));
            Ok(())
        }
    }

    fn scene(fail: bool) -> (SceneHandle<RecordingRenderer>, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let renderer = RecordingRenderer {
            log: Rc::clone(&log),
            fail,
        };
        let config = SceneConfig::new().size(1024, 768).seed(11);
        let scene = SceneHandle::new(&cube_bundle(), Some(renderer), &config).unwrap();
        (scene, log)
    }

    #[test]
    fn setup_builds_everything() {
        let (scene, _) = scene(false);
        assert_eq!(scene.registry().len(), 9);
        assert!(scene.particles().is_started());
        assert!(scene.particles().len() > 4900);
        assert_eq!(scene.orbit_camera().target().y, -2.0);
        assert_eq!(scene.orbit_camera().target().z, -18.0);
        assert_eq!(scene.elapsed(), 0.0);
    }

    #[test]
    fn tick_steps_and_renders_once() {
        let (mut scene, log) = scene(false);
        let outcome = scene.tick();
        assert!(outcome.stepped && outcome.rendered);

        let log = log.borrow();
        assert_eq!(log.frames.len(), 1);
        let (items, particles, time) = log.frames[0];
        assert_eq!(items, 9);
        assert!(particles > 4900);
        assert!((time - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn resize_refocuses_the_camera() {
        let (mut scene, log) = scene(false);
        scene.queue(SceneEvent::Resize {
            logical_width: 320.0,
            width: 640,
            height: 960,
        });
        assert_eq!(scene.pending_events(), 1);
        scene.tick();

        assert_eq!(scene.pending_events(), 0);
        assert_eq!(scene.orbit_camera().target().y, 2.0);
        assert_eq!(scene.orbit_camera().target().z, -5.0);
        assert_eq!(log.borrow().resizes, vec![(640, 960)]);
    }

    #[test]
    fn logo_spins_every_tick() {
        let (mut scene, _) = scene(false);
        let logo = scene.registry().logo().unwrap();
        for _ in 0..3 {
            scene.tick();
        }
        assert!((scene.logo_yaw() - 3.0 * LOGO_SPIN).abs() < 1e-6);

        let expected = Quat::from_rotation_y(3.0 * LOGO_SPIN);
        let rotation = scene.registry().transform(logo).unwrap().rotation;
        assert!(rotation.abs_diff_eq(expected, 1e-5));
        // and it stays put
        let position = scene.registry().transform(logo).unwrap().position;
        assert!(position.abs_diff_eq(crate::bodies::LOGO_POSITION, 1e-4));
    }

    #[test]
    fn logo_step_holds_after_long_runs() {
        let (mut scene, _) = scene(false);
        let logo = scene.registry().logo().unwrap();

        scene.logo_ticks = SPIN_PERIOD - 3;
        scene.tick();
        let before = scene.logo_yaw();
        scene.tick();
        assert!((scene.logo_yaw() - before - LOGO_SPIN).abs() < 1e-6);

        // wraps to the start of the next turn
        scene.tick();
        assert_eq!(scene.logo_yaw(), 0.0);
        let rotation = scene.registry().transform(logo).unwrap().rotation;
        assert!(rotation.abs_diff_eq(Quat::IDENTITY, 1e-5));
        scene.tick();
        assert!((scene.logo_yaw() - LOGO_SPIN).abs() < 1e-6);

        // ten more turns and the yaw is still bounded
        for _ in 0..SPIN_PERIOD * 10 {
            scene.spin_logo();
            assert!(scene.logo_yaw() < std::f32::consts::TAU);
        }
    }

    #[test]
    fn recycled_letter_is_pickable_on_the_next_tick() {
        let (mut scene, _) = scene(false);
        let f = scene.registry().find("f").unwrap();
        let body = scene.registry().record(f).unwrap().body;

        scene
            .physics_mut()
            .set_translation(body, crate::lifecycle::KILL_CENTER + Vec3::new(0.0, -5.0, 0.0));
        assert_eq!(scene.tick().recycled, 1);
        let at = scene.physics().position(body).unwrap();

        let ray = Ray::new(Vec3::new(at.x, at.y, 50.0), Vec3::NEG_Z);
        assert_eq!(
            picking::pick(scene.physics(), scene.registry(), &ray),
            picking::PickTarget::Body(f)
        );
    }

    #[test]
    fn pointer_push_moves_the_picked_letter() {
        let (mut scene, _) = scene(false);
        let o = scene.registry().find("o").unwrap();
        let body = scene.registry().record(o).unwrap().body;

        // move it clear of its neighbours; one tick puts the collider there
        scene.physics_mut().set_translation(body, Vec3::new(30.0, 40.0, 0.0));
        scene.tick();
        let before = scene.physics().linear_velocity(body).unwrap();
        let at = scene.physics().position(body).unwrap();

        scene.queue(SceneEvent::PointerDown(Ray::new(
            Vec3::new(at.x, at.y, 50.0),
            Vec3::NEG_Z,
        )));
        let outcome = scene.tick();
        assert_eq!(outcome.pushed, 1);

        let after = scene.physics().linear_velocity(body).unwrap();
        assert!((after.z - before.z + 200.0 / 60.0).abs() < 0.05);
    }

    #[test]
    fn pointer_on_ground_does_nothing() {
        let (mut scene, _) = scene(false);
        scene.queue(SceneEvent::PointerDown(Ray::new(
            Vec3::new(30.0, 50.0, 30.0),
            Vec3::NEG_Y,
        )));
        let outcome = scene.tick();
        assert_eq!(outcome.pushed, 0);
        assert!(outcome.stepped);
    }

    #[test]
    fn render_errors_do_not_stop_the_tick() {
        let (mut scene, _) = scene(true);
        let outcome = scene.tick();
        assert!(outcome.stepped);
        assert!(!outcome.rendered);
        assert!((scene.logo_yaw() - LOGO_SPIN).abs() < 1e-6);
    }

    #[test]
    fn dispose_stops_everything_and_is_idempotent() {
        let (mut scene, log) = scene(false);
        scene.tick();
        scene.dispose();
        assert!(scene.is_disposed());
        assert!(scene.renderer().is_none());
        assert!(scene.registry().is_empty());
        assert_eq!(scene.physics().body_count(), 0);

        scene.queue(SceneEvent::Resize {
            logical_width: 320.0,
            width: 1,
            height: 1,
        });
        assert_eq!(scene.pending_events(), 0);
        assert_eq!(scene.tick(), TickOutcome::default());

        scene.dispose();
        assert_eq!(log.borrow().frames.len(), 1);
    }

    #[test]
    fn runs_headless() {
        let config = SceneConfig::new().seed(1);
        let mut scene: SceneHandle<RecordingRenderer> =
            SceneHandle::new(&cube_bundle(), None, &config).unwrap();
        let outcome = scene.tick();
        assert!(outcome.stepped);
        assert!(!outcome.rendered);
    }
}
