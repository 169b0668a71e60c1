//! Noise-displaced mesh effect: two wireframe ground planes and one or two
//! spheres, all deformed by coherent noise scaled with band energy.

use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use noise::{NoiseFn, OpenSimplex};

use crate::{
    analysis::FrequencyFrame,
    modulation::{aggregate, modulate, split_bands, AggregateOp},
    scene::{MeshBuffer, Renderable, RenderableId, Scene},
    settings::{EffectSettings, Rgb, SettingValue},
    Result,
};

use super::{Effect, EffectState, TimeContext};

const PLANE_SIZE: f32 = 800.0;
const PLANE_SEGMENTS: usize = 20;
const PLANE_OFFSET: f32 = 30.0;
const SPHERE_RADIUS: f32 = 10.0;
const GROUND_AMPLITUDE: f32 = 2.0;
const SPHERE_AMPLITUDE: f32 = 7.0;
/// Time drift rate for the 3D noise field, per millisecond.
const SPHERE_TIME_RATE: f64 = 0.000_01;
/// Per-axis weights applied to the sphere's time drift.
const SPHERE_AXIS_WEIGHTS: [f64; 3] = [7.0, 8.0, 9.0];
const NOISE_SEED: u32 = 7;

pub struct NoiseMeshEffect;

impl Effect for NoiseMeshEffect {
    fn name(&self) -> &'static str {
        "MatrixShape"
    }

    fn default_settings(&self) -> EffectSettings {
        EffectSettings::new()
            .number("bassGain", 1.0, 0.0..=2.0)
            .number("trebleGain", 1.0, 0.0..=2.0)
            .number("rotationSpeed", 0.005, 0.0..=0.1)
            .topology_number("sphereDetail", 3.0, 0.0..=5.0)
            .topology_toggle("twinSpheres", false)
            .color("planeColor", Rgb::from_hex("#6904ce").unwrap_or(Rgb::new(0.4, 0.0, 0.8)))
            .color("sphereColor", Rgb::from_hex("#ff00ee").unwrap_or(Rgb::new(1.0, 0.0, 0.9)))
    }

    fn prepare(&self, scene: &mut Scene, settings: &EffectSettings) -> Result<Box<dyn EffectState>> {
        let mut state = NoiseMeshState {
            planes: Vec::new(),
            spheres: Vec::new(),
            plane_reference: Vec::new(),
            sphere_reference: Vec::new(),
            noise: OpenSimplex::new(NOISE_SEED),
            bass_gain: settings.number_or("bassGain", 1.0) as f32,
            treble_gain: settings.number_or("trebleGain", 1.0) as f32,
            rotation_speed: settings.number_or("rotationSpeed", 0.005) as f32,
            rotation: 0.0,
        };
        state.build(scene, settings);
        Ok(Box::new(state))
    }
}

struct NoiseMeshState {
    planes: Vec<RenderableId>,
    spheres: Vec<RenderableId>,
    /// Undisplaced local-space grid shared by both planes.
    plane_reference: Vec<Vec3>,
    /// Undisplaced sphere vertices shared by every sphere instance.
    sphere_reference: Vec<Vec3>,
    noise: OpenSimplex,
    bass_gain: f32,
    treble_gain: f32,
    rotation_speed: f32,
    rotation: f32,
}

impl NoiseMeshState {
    fn build(&mut self, scene: &mut Scene, settings: &EffectSettings) {
        let plane_color =
            settings.color_or("planeColor", Rgb::new(0.4, 0.0, 0.8));
        let sphere_color =
            settings.color_or("sphereColor", Rgb::new(1.0, 0.0, 0.9));
        let detail = settings.number_or("sphereDetail", 3.0) as usize;
        let twin = settings.toggle_or("twinSpheres", false);

        let template = MeshBuffer::plane(PLANE_SIZE, PLANE_SIZE, PLANE_SEGMENTS);
        self.plane_reference = template.positions.clone();
        for offset in [PLANE_OFFSET, -PLANE_OFFSET] {
            let mut plane = template.clone();
            plane.rotation.x = -FRAC_PI_2;
            plane.translation = Vec3::new(0.0, offset, 0.0);
            plane.color = plane_color;
            plane.wireframe = true;
            self.planes.push(scene.insert(Renderable::Mesh(plane)));
        }

        let sphere_template = MeshBuffer::icosphere(SPHERE_RADIUS, detail);
        self.sphere_reference = sphere_template.positions.clone();
        let centers = if twin {
            vec![Vec3::new(-15.0, 0.0, 0.0), Vec3::new(15.0, 0.0, 0.0)]
        } else {
            vec![Vec3::ZERO]
        };
        for center in centers {
            let mut sphere = sphere_template.clone();
            sphere.translation = center;
            sphere.color = sphere_color;
            sphere.wireframe = true;
            self.spheres.push(scene.insert(Renderable::Mesh(sphere)));
        }
    }

    fn release(&mut self, scene: &mut Scene) {
        for id in self.planes.drain(..).chain(self.spheres.drain(..)) {
            scene.remove(id);
        }
    }

    fn displace_ground(&self, mesh: &mut MeshBuffer, millis: f64, amplitude: f32) {
        for (position, reference) in mesh.positions.iter_mut().zip(&self.plane_reference) {
            let sample = self.noise.get([
                f64::from(reference.x) + millis * 0.000_3,
                f64::from(reference.y) + millis * 0.000_1,
            ]) as f32;
            let displaced = sample * amplitude * GROUND_AMPLITUDE;

            position.x = reference.x;
            position.y = reference.y;
            // Non-finite displacement never reaches the buffer; the vertex
            // falls back to its reference plane.
            position.z = if displaced.is_finite() { displaced } else { 0.0 };
        }
        mesh.recompute_normals();
    }

    fn displace_sphere(&self, mesh: &mut MeshBuffer, millis: f64, bass: f32, treble: f32) {
        for (position, reference) in mesh.positions.iter_mut().zip(&self.sphere_reference) {
            let normal = reference.normalize_or_zero();
            if normal == Vec3::ZERO {
                *position = *reference;
                continue;
            }

            let sample = self.noise.get([
                f64::from(normal.x) + millis * SPHERE_TIME_RATE * SPHERE_AXIS_WEIGHTS[0],
                f64::from(normal.y) + millis * SPHERE_TIME_RATE * SPHERE_AXIS_WEIGHTS[1],
                f64::from(normal.z) + millis * SPHERE_TIME_RATE * SPHERE_AXIS_WEIGHTS[2],
            ]) as f32;

            let mut distance = SPHERE_RADIUS + bass + sample * SPHERE_AMPLITUDE * treble;
            if !distance.is_finite() {
                distance = SPHERE_RADIUS;
            }
            *position = normal * distance;
        }
        mesh.recompute_normals();
    }
}

impl EffectState for NoiseMeshState {
    fn animate(&mut self, scene: &mut Scene, frame: &FrequencyFrame, time: &TimeContext) {
        let (lower, upper) = split_bands(frame.as_slice());
        let lower_max = aggregate(lower, AggregateOp::Max);
        let upper_avg = aggregate(upper, AggregateOp::Avg);
        let millis = time.elapsed_seconds * 1000.0;

        let top_amp = modulate(upper_avg, 0.0, 255.0, 0.5, 4.0) * self.treble_gain;
        let bottom_amp = modulate(lower_max, 0.0, 255.0, 0.5, 4.0) * self.bass_gain;
        let bass = modulate(lower_max, 0.0, 255.0, 0.0, 8.0) * self.bass_gain;
        let treble = modulate(upper_avg, 0.0, 255.0, 0.0, 4.0) * self.treble_gain;

        for (plane, amplitude) in self.planes.iter().zip([top_amp, bottom_amp]) {
            if let Some(mesh) = scene.mesh_mut(*plane) {
                self.displace_ground(mesh, millis, amplitude);
            }
        }

        for sphere in &self.spheres {
            if let Some(mesh) = scene.mesh_mut(*sphere) {
                self.displace_sphere(mesh, millis, bass, treble);
            }
        }

        self.rotation += self.rotation_speed;
        for id in self.planes.iter().chain(&self.spheres) {
            if let Some(mesh) = scene.mesh_mut(*id) {
                mesh.rotation.y = self.rotation;
            }
        }
    }

    fn apply_setting(&mut self, scene: &mut Scene, key: &str, value: &SettingValue) {
        match (key, value) {
            ("bassGain", SettingValue::Number(gain)) => self.bass_gain = *gain as f32,
            ("trebleGain", SettingValue::Number(gain)) => self.treble_gain = *gain as f32,
            ("rotationSpeed", SettingValue::Number(speed)) => {
                self.rotation_speed = *speed as f32;
            }
            ("planeColor", SettingValue::Color(color)) => {
                for id in &self.planes {
                    if let Some(mesh) = scene.mesh_mut(*id) {
                        mesh.color = *color;
                    }
                }
            }
            ("sphereColor", SettingValue::Color(color)) => {
                for id in &self.spheres {
                    if let Some(mesh) = scene.mesh_mut(*id) {
                        mesh.color = *color;
                    }
                }
            }
            _ => {}
        }
    }

    fn rebuild(&mut self, scene: &mut Scene, settings: &EffectSettings) -> Result<()> {
        self.release(scene);
        self.build(scene, settings);
        Ok(())
    }

    fn teardown(mut self: Box<Self>, scene: &mut Scene) {
        self.release(scene);
        tracing::debug!("noise mesh torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(scene: &mut Scene) -> (Box<dyn EffectState>, EffectSettings) {
        let effect = NoiseMeshEffect;
        let settings = effect.default_settings();
        let state = effect.prepare(scene, &settings).unwrap();
        (state, settings)
    }

    fn meshes(scene: &Scene) -> Vec<MeshBuffer> {
        scene
            .renderables()
            .filter_map(|(_, renderable)| match renderable {
                Renderable::Mesh(mesh) => Some(mesh.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn prepare_registers_two_planes_and_one_sphere() {
        let mut scene = Scene::default();
        let (_state, _) = prepared(&mut scene);
        assert_eq!(scene.renderable_count(), 3);

        let meshes = meshes(&scene);
        let planes: Vec<&MeshBuffer> = meshes
            .iter()
            .filter(|m| m.vertex_count() == (PLANE_SEGMENTS + 1).pow(2))
            .collect();
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0].translation.y, PLANE_OFFSET);
        assert_eq!(planes[1].translation.y, -PLANE_OFFSET);
    }

    #[test]
    fn twin_sphere_toggle_is_topology_changing() {
        let mut scene = Scene::default();
        let (mut state, mut settings) = prepared(&mut scene);
        assert!(settings.is_topology("twinSpheres"));

        settings
            .set("twinSpheres", SettingValue::Toggle(true))
            .unwrap();
        state.rebuild(&mut scene, &settings).unwrap();
        assert_eq!(scene.renderable_count(), 4);

        state.teardown(&mut scene);
        assert_eq!(scene.renderable_count(), 0);
    }

    #[test]
    fn zero_gains_leave_the_reference_shapes_untouched() {
        let mut scene = Scene::default();
        let effect = NoiseMeshEffect;
        let mut settings = effect.default_settings();
        settings.set("bassGain", SettingValue::Number(0.0)).unwrap();
        settings.set("trebleGain", SettingValue::Number(0.0)).unwrap();
        let mut state = effect.prepare(&mut scene, &settings).unwrap();

        let before = meshes(&scene);
        let mut bins = vec![200u8; 128];
        bins[3] = 255;
        let frame = FrequencyFrame::from_bins(bins);
        state.animate(&mut scene, &frame, &TimeContext {
            elapsed_seconds: 12.5,
            delta_seconds: 0.016,
        });

        let after = meshes(&scene);
        for (reference, displaced) in before.iter().zip(&after) {
            for (a, b) in reference.positions.iter().zip(&displaced.positions) {
                assert!((*a - *b).length() < 1e-4);
            }
        }
    }

    #[test]
    fn loud_frame_displaces_both_shape_kinds() {
        let mut scene = Scene::default();
        let (mut state, _) = prepared(&mut scene);
        let before = meshes(&scene);

        let frame = FrequencyFrame::from_bins(vec![220u8; 128]);
        state.animate(&mut scene, &frame, &TimeContext {
            elapsed_seconds: 3.0,
            delta_seconds: 0.016,
        });

        let after = meshes(&scene);
        for (reference, displaced) in before.iter().zip(&after) {
            let moved = reference
                .positions
                .iter()
                .zip(&displaced.positions)
                .any(|(a, b)| (*a - *b).length() > 1e-3);
            assert!(moved, "displacement should perturb every mesh");
        }
    }

    #[test]
    fn displacement_keeps_normals_unit_length() {
        let mut scene = Scene::default();
        let (mut state, _) = prepared(&mut scene);

        let frame = FrequencyFrame::from_bins(vec![180u8; 128]);
        state.animate(&mut scene, &frame, &TimeContext {
            elapsed_seconds: 1.0,
            delta_seconds: 0.016,
        });

        for mesh in meshes(&scene) {
            for normal in &mesh.normals {
                let len = normal.length();
                assert!(len == 0.0 || (len - 1.0).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn rotation_accumulates_per_tick() {
        let mut scene = Scene::default();
        let (mut state, _) = prepared(&mut scene);

        let frame = FrequencyFrame::silence(128);
        for _ in 0..10 {
            state.animate(&mut scene, &frame, &TimeContext::default());
        }

        for mesh in meshes(&scene) {
            assert!((mesh.rotation.y - 0.05).abs() < 1e-6);
        }
    }
}
