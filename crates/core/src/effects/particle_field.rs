//! Particle-field effect: a ring of particles whose depth, color and size
//! follow the frequency frame bin assigned to each particle.

use std::f32::consts::TAU;

use glam::Vec3;

use crate::{
    analysis::FrequencyFrame,
    scene::{ParticleBuffer, Renderable, RenderableId, Scene},
    settings::{EffectSettings, Rgb, SettingValue},
    Result,
};

use super::{bin, Effect, EffectState, TimeContext};

const DEPTH_RANGE: f32 = 20.0;

pub struct ParticleFieldEffect;

impl Effect for ParticleFieldEffect {
    fn name(&self) -> &'static str {
        "GlitchCircle"
    }

    fn default_settings(&self) -> EffectSettings {
        EffectSettings::new()
            .color("particleColor", Rgb::new(0.0, 1.0, 0.0))
            .number("particleSize", 1.0, 0.1..=10.0)
            .topology_number("particleCount", 512.0, 100.0..=2000.0)
            .number("radius", 10.0, 1.0..=20.0)
            .toggle("glitch", false)
    }

    fn prepare(&self, scene: &mut Scene, settings: &EffectSettings) -> Result<Box<dyn EffectState>> {
        let count = settings.number_or("particleCount", 512.0) as usize;
        let size = settings.number_or("particleSize", 1.0) as f32;
        let radius = settings.number_or("radius", 10.0) as f32;
        let color = settings.color_or("particleColor", Rgb::new(0.0, 1.0, 0.0));

        let buffer = build_ring(count, radius, size, color);
        let particles = scene.insert(Renderable::Particles(buffer));
        scene.set_glitch(settings.toggle_or("glitch", false));

        Ok(Box::new(ParticleFieldState {
            particles,
            count,
            size,
            radius,
        }))
    }
}

struct ParticleFieldState {
    particles: RenderableId,
    count: usize,
    size: f32,
    radius: f32,
}

impl EffectState for ParticleFieldState {
    fn animate(&mut self, scene: &mut Scene, frame: &FrequencyFrame, _time: &TimeContext) {
        let Some(buffer) = scene.particles_mut(self.particles) else {
            return;
        };

        for i in 0..self.count {
            let scale = f32::from(bin(frame, i)) / 128.0;
            buffer.positions[i].z = scale * DEPTH_RANGE;
            buffer.colors[i] = Vec3::new(scale, 1.0 - scale, scale * 0.5);
            buffer.sizes[i] = self.size * scale;
        }
    }

    fn apply_setting(&mut self, scene: &mut Scene, key: &str, value: &SettingValue) {
        match (key, value) {
            ("particleColor", SettingValue::Color(color)) => {
                if let Some(buffer) = scene.particles_mut(self.particles) {
                    buffer.material_color = *color;
                }
            }
            ("particleSize", SettingValue::Number(size)) => {
                self.size = *size as f32;
                if let Some(buffer) = scene.particles_mut(self.particles) {
                    buffer.material_size = self.size;
                }
            }
            ("radius", SettingValue::Number(radius)) => {
                // Radius moves existing particles in place; count is fixed,
                // so the x/y rewrite keeps every buffer length intact.
                self.radius = *radius as f32;
                if let Some(buffer) = scene.particles_mut(self.particles) {
                    for (i, position) in buffer.positions.iter_mut().enumerate() {
                        let angle = ring_angle(i, self.count);
                        position.x = angle.cos() * self.radius;
                        position.y = angle.sin() * self.radius;
                    }
                }
            }
            ("glitch", SettingValue::Toggle(enabled)) => {
                scene.set_glitch(*enabled);
            }
            _ => {}
        }
    }

    fn rebuild(&mut self, scene: &mut Scene, settings: &EffectSettings) -> Result<()> {
        self.count = settings.number_or("particleCount", 512.0) as usize;
        self.size = settings.number_or("particleSize", 1.0) as f32;
        self.radius = settings.number_or("radius", 10.0) as f32;
        let color = settings.color_or("particleColor", Rgb::new(0.0, 1.0, 0.0));

        // Full replacement: the old position/color/size arrays are dropped
        // wholesale, never resized in place.
        if let Some(buffer) = scene.particles_mut(self.particles) {
            *buffer = build_ring(self.count, self.radius, self.size, color);
        }
        Ok(())
    }

    fn teardown(self: Box<Self>, scene: &mut Scene) {
        scene.remove(self.particles);
        scene.set_glitch(false);
        tracing::debug!("particle field torn down");
    }
}

fn build_ring(count: usize, radius: f32, size: f32, color: Rgb) -> ParticleBuffer {
    let mut buffer = ParticleBuffer {
        positions: Vec::with_capacity(count),
        colors: Vec::with_capacity(count),
        sizes: Vec::with_capacity(count),
        material_color: color,
        material_size: size,
        opacity: 0.75,
    };

    for i in 0..count {
        let angle = ring_angle(i, count);
        buffer.positions.push(Vec3::new(
            angle.cos() * radius,
            angle.sin() * radius,
            seeded_depth(i),
        ));
        buffer.colors.push(Vec3::splat(0.5));
        buffer.sizes.push(size);
    }
    buffer
}

fn ring_angle(index: usize, count: usize) -> f32 {
    index as f32 / count as f32 * TAU
}

/// Deterministic per-index depth in `[-10, 10)`, replacing the original's
/// per-prepare randomness so a persisted animation replays identically.
fn seeded_depth(index: usize) -> f32 {
    let mut x = index as u64 ^ 0x9e37_79b9_7f4a_7c15;
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^= x >> 31;
    let unit = (x >> 40) as f32 / (1u64 << 24) as f32;
    unit * DEPTH_RANGE - DEPTH_RANGE * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepare_with_count(scene: &mut Scene, count: f64) -> (Box<dyn EffectState>, EffectSettings) {
        let effect = ParticleFieldEffect;
        let mut settings = effect.default_settings();
        settings
            .set("particleCount", SettingValue::Number(count))
            .unwrap();
        let state = effect.prepare(scene, &settings).unwrap();
        (state, settings)
    }

    fn only_buffer(scene: &Scene) -> ParticleBuffer {
        scene
            .renderables()
            .find_map(|(_, renderable)| match renderable {
                Renderable::Particles(buffer) => Some(buffer.clone()),
                _ => None,
            })
            .expect("particle buffer present")
    }

    #[test]
    fn particles_start_on_the_configured_circle() {
        let mut scene = Scene::default();
        let (_state, _) = prepare_with_count(&mut scene, 100.0);

        let buffer = only_buffer(&scene);
        assert_eq!(buffer.len(), 100);
        for position in &buffer.positions {
            let planar = (position.x * position.x + position.y * position.y).sqrt();
            assert!((planar - 10.0).abs() < 1e-3, "planar distance {planar}");
        }
    }

    #[test]
    fn count_change_replaces_buffers_wholesale() {
        let mut scene = Scene::default();
        let (mut state, mut settings) = prepare_with_count(&mut scene, 512.0);
        assert_eq!(only_buffer(&scene).len(), 512);

        settings
            .set("particleCount", SettingValue::Number(1000.0))
            .unwrap();
        state.rebuild(&mut scene, &settings).unwrap();

        let buffer = only_buffer(&scene);
        assert_eq!(buffer.positions.len(), 1000);
        assert_eq!(buffer.colors.len(), 1000);
        assert_eq!(buffer.sizes.len(), 1000);
    }

    #[test]
    fn animate_drives_depth_color_and_size_from_bins() {
        let mut scene = Scene::default();
        let (mut state, _) = prepare_with_count(&mut scene, 100.0);

        let mut bins = vec![0u8; 4];
        bins[1] = 128; // particles 1, 5, 9, ... read this bin
        let frame = FrequencyFrame::from_bins(bins);
        state.animate(&mut scene, &frame, &TimeContext::default());

        let buffer = only_buffer(&scene);
        assert_eq!(buffer.positions[1].z, DEPTH_RANGE);
        assert_eq!(buffer.colors[1], Vec3::new(1.0, 0.0, 0.5));
        assert_eq!(buffer.sizes[1], 1.0);

        // Silent bins collapse their particles.
        assert_eq!(buffer.positions[0].z, 0.0);
        assert_eq!(buffer.colors[0], Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(buffer.sizes[0], 0.0);
    }

    #[test]
    fn radius_update_patches_positions_in_place() {
        let mut scene = Scene::default();
        let (mut state, _) = prepare_with_count(&mut scene, 128.0);
        let before = only_buffer(&scene);

        state.apply_setting(&mut scene, "radius", &SettingValue::Number(5.0));
        let after = only_buffer(&scene);
        assert_eq!(after.len(), before.len());
        for (before_pos, after_pos) in before.positions.iter().zip(&after.positions) {
            let planar = (after_pos.x * after_pos.x + after_pos.y * after_pos.y).sqrt();
            assert!((planar - 5.0).abs() < 1e-3);
            assert_eq!(before_pos.z, after_pos.z);
        }
    }

    #[test]
    fn glitch_toggle_reaches_the_scene() {
        let mut scene = Scene::default();
        let (mut state, _) = prepare_with_count(&mut scene, 100.0);
        assert!(!scene.glitch_enabled());

        state.apply_setting(&mut scene, "glitch", &SettingValue::Toggle(true));
        assert!(scene.glitch_enabled());

        state.teardown(&mut scene);
        assert!(!scene.glitch_enabled());
        assert_eq!(scene.renderable_count(), 0);
    }

    #[test]
    fn depth_seed_is_deterministic_and_in_range() {
        for i in 0..2000 {
            let depth = seeded_depth(i);
            assert_eq!(depth, seeded_depth(i));
            assert!((-10.0..10.0).contains(&depth));
        }
    }
}
