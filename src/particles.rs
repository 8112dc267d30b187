//! The ambient particle field.
//!
//! A CPU particle emitter with a fixed pool. Every frame it ages particles,
//! fades them towards the dead colour, bends their direction by gravity and
//! moves them, then tops the pool back up from the emit box. Time is measured
//! in update-speed units, not seconds: one frame advances every particle by
//! `update_speed` (times the step offset while pre-warming).
//!
//! # Example
//!
//! ```
//! use letterfall::{ParticleSystem, Vec3};
//! use rand::SeedableRng;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(1);
//! let mut particles = ParticleSystem::fountain(Vec3::ZERO);
//! particles.start(&mut rng);
//! assert!(particles.len() > 4900);
//! ```

use glam::{Vec2, Vec3, Vec4};
use rand::Rng;

/// Emitter settings.
#[derive(Clone, Debug, PartialEq)]
pub struct EmitterConfig {
    pub capacity: usize,
    /// Particles per unit of scaled time.
    pub emit_rate: f32,
    /// Spawn box corners, relative to the emitter.
    pub min_emit_box: Vec3,
    pub max_emit_box: Vec3,
    pub min_size: f32,
    pub max_size: f32,
    pub min_lifetime: f32,
    pub max_lifetime: f32,
    pub color1: Vec4,
    pub color2: Vec4,
    pub color_dead: Vec4,
    pub gravity: Vec3,
    pub direction1: Vec3,
    pub direction2: Vec3,
    pub min_angular_speed: f32,
    pub max_angular_speed: f32,
    pub min_emit_power: f32,
    pub max_emit_power: f32,
    pub update_speed: f32,
    /// Billboard offset in units of particle size.
    pub translation_pivot: Vec2,
    pub prewarm_cycles: u32,
    pub prewarm_step_offset: f32,
}

impl EmitterConfig {
    /// The vignette's background field: sparks spread over a huge box that
    /// start invisible and brighten to white as they age.
    pub fn fountain() -> Self {
        Self {
            capacity: 5000,
            emit_rate: 5000.0,
            min_emit_box: Vec3::splat(-700.0),
            max_emit_box: Vec3::splat(700.0),
            min_size: 1.0,
            max_size: 5.0,
            min_lifetime: 1.0,
            max_lifetime: 10.0,
            color1: Vec4::ZERO,
            color2: Vec4::ZERO,
            color_dead: Vec4::ONE,
            gravity: Vec3::new(0.0, 0.0, -2.0),
            direction1: Vec3::splat(-1.0),
            direction2: Vec3::splat(1.0),
            min_angular_speed: 0.0,
            max_angular_speed: std::f32::consts::PI,
            min_emit_power: 1.0,
            max_emit_power: 1.0,
            update_speed: 0.0004,
            translation_pivot: Vec2::new(100.0, 30.0),
            prewarm_cycles: 500,
            prewarm_step_offset: 5.0,
        }
    }
}

/// One live particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec4,
    color_step: Vec4,
    pub size: f32,
    pub angle: f32,
    pub angular_speed: f32,
    pub age: f32,
    pub lifetime: f32,
}

/// Per-particle data uploaded for instanced drawing.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleInstance {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 4],
    pub angle: f32,
    pub _padding: [f32; 3],
}

impl ParticleInstance {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<ParticleInstance>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &[
            // position + size
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x4,
            },
            wgpu::VertexAttribute {
                offset: 16,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x4,
            },
            wgpu::VertexAttribute {
                offset: 32,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32,
            },
        ],
    };
}

/// Emitter plus its live pool.
#[derive(Clone, Debug)]
pub struct ParticleSystem {
    config: EmitterConfig,
    emitter: Vec3,
    particles: Vec<Particle>,
    excess: f32,
    started: bool,
}

impl ParticleSystem {
    pub fn new(config: EmitterConfig, emitter: Vec3) -> Self {
        Self {
            particles: Vec::with_capacity(config.capacity),
            config,
            emitter,
            excess: 0.0,
            started: false,
        }
    }

    /// The background fountain, emitting around `emitter`.
    pub fn fountain(emitter: Vec3) -> Self {
        Self::new(EmitterConfig::fountain(), emitter)
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Begin emitting, running the pre-warm cycles first.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.started {
            return;
        }
        self.started = true;
        let step = self.config.update_speed * self.config.prewarm_step_offset;
        for _ in 0..self.config.prewarm_cycles {
            self.advance(step, rng);
        }
        log::info!(
            "particle field pre-warmed: {} of {} particles",
            self.particles.len(),
            self.config.capacity
        );
    }

    /// Advance one frame.
    pub fn update<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.started {
            self.advance(self.config.update_speed, rng);
        }
    }

    /// Stop and drop every particle.
    pub fn stop(&mut self) {
        self.started = false;
        self.particles.clear();
        self.excess = 0.0;
    }

    fn advance<R: Rng + ?Sized>(&mut self, step: f32, rng: &mut R) {
        let gravity = self.config.gravity * step;
        self.particles.retain_mut(|p| {
            p.age += step;
            if p.age >= p.lifetime {
                return false;
            }
            p.color = (p.color + p.color_step * step).clamp(Vec4::ZERO, Vec4::ONE);
            p.angle += p.angular_speed * step;
            p.direction += gravity;
            p.position += p.direction * step;
            true
        });

        let wanted = self.config.emit_rate * step + self.excess;
        let count = wanted.floor();
        self.excess = wanted - count;

        let free = self.config.capacity - self.particles.len();
        for _ in 0..(count as usize).min(free) {
            let particle = self.spawn(rng);
            self.particles.push(particle);
        }
    }

    fn spawn<R: Rng + ?Sized>(&self, rng: &mut R) -> Particle {
        let c = &self.config;
        let lerp3 = |rng: &mut R, a: Vec3, b: Vec3| {
            Vec3::new(
                rng.gen_range(0.0f32..=1.0),
                rng.gen_range(0.0f32..=1.0),
                rng.gen_range(0.0f32..=1.0),
            ) * (b - a)
                + a
        };
        let range = |rng: &mut R, lo: f32, hi: f32| lo + rng.gen_range(0.0f32..=1.0) * (hi - lo);

        let lifetime = range(rng, c.min_lifetime, c.max_lifetime);
        let power = range(rng, c.min_emit_power, c.max_emit_power);
        let color = c.color1.lerp(c.color2, rng.gen_range(0.0f32..=1.0));

        Particle {
            position: self.emitter + lerp3(rng, c.min_emit_box, c.max_emit_box),
            direction: lerp3(rng, c.direction1, c.direction2) * power,
            color,
            color_step: (c.color_dead - color) / lifetime,
            size: range(rng, c.min_size, c.max_size),
            angle: 0.0,
            angular_speed: range(rng, c.min_angular_speed, c.max_angular_speed),
            age: 0.0,
            lifetime,
        }
    }

    /// GPU instance data for every live particle.
    pub fn instances(&self) -> Vec<ParticleInstance> {
        self.particles
            .iter()
            .map(|p| ParticleInstance {
                position: p.position.to_array(),
                size: p.size,
                color: p.color.to_array(),
                angle: p.angle,
                _padding: [0.0; 3],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn prewarm_fills_the_pool() {
        let mut particles = ParticleSystem::fountain(Vec3::ZERO);
        assert!(particles.is_empty());
        particles.start(&mut rng());
        // 500 cycles of 10 new particles, give or take float carry
        assert!(particles.len() >= 4990, "{}", particles.len());

        // starting twice does not pre-warm again
        let before = particles.particles()[0];
        particles.start(&mut rng());
        assert_eq!(particles.particles()[0], before);
    }

    #[test]
    fn spawns_inside_configured_ranges() {
        let mut particles = ParticleSystem::fountain(Vec3::new(1.0, 2.0, 3.0));
        particles.start(&mut rng());
        for p in particles.particles() {
            assert!((1.0..=5.0).contains(&p.size));
            assert!((1.0..=10.0).contains(&p.lifetime));
            assert!(p.age < p.lifetime);
            assert!(p.angular_speed <= std::f32::consts::PI);
            // pre-warm moves particles by well under a unit
            assert!((p.position - Vec3::new(1.0, 2.0, 3.0)).abs().max_element() < 701.0);
        }
    }

    #[test]
    fn frame_emits_fractional_rate_with_carry() {
        let mut config = EmitterConfig::fountain();
        config.prewarm_cycles = 0;
        config.update_speed = 0.25;
        config.emit_rate = 6.0; // 1.5 per frame
        config.min_lifetime = 100.0;
        config.max_lifetime = 100.0;
        let mut particles = ParticleSystem::new(config, Vec3::ZERO);
        let mut rng = rng();
        particles.start(&mut rng);
        assert_eq!(particles.len(), 0);

        for _ in 0..5 {
            particles.update(&mut rng);
        }
        // 1 + 2 + 1 + 2 + 1
        assert_eq!(particles.len(), 7);
    }

    #[test]
    fn update_ages_fades_and_falls() {
        let mut config = EmitterConfig::fountain();
        config.prewarm_cycles = 0;
        config.update_speed = 0.25;
        config.emit_rate = 4.0; // one per frame
        config.min_lifetime = 100.0;
        config.max_lifetime = 100.0;
        let mut particles = ParticleSystem::new(config, Vec3::ZERO);
        let mut rng = rng();
        particles.start(&mut rng);
        particles.update(&mut rng);
        let first = particles.particles()[0];
        particles.update(&mut rng);
        let later = particles.particles()[0];

        assert_eq!(later.age, 0.25);
        assert!(later.color.x > first.color.x);
        assert!(later.direction.z < first.direction.z);
        assert!((later.position - (first.position + later.direction * 0.25)).length() < 1e-3);
    }

    #[test]
    fn stop_clears_and_update_is_inert() {
        let mut particles = ParticleSystem::fountain(Vec3::ZERO);
        let mut rng = rng();
        particles.update(&mut rng);
        assert!(particles.is_empty());
        particles.start(&mut rng);
        particles.stop();
        assert!(particles.is_empty());
        assert!(!particles.is_started());
    }

    #[test]
    fn instance_is_48_bytes() {
        assert_eq!(std::mem::size_of::<ParticleInstance>(), 48);
    }
}
