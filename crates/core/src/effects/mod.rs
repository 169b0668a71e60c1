//! Pluggable visual effect strategies.
//!
//! Every effect implements the same lifecycle contract: `prepare` registers
//! renderables into the scene and returns an exclusively owned state handle,
//! `animate` mutates those renderables in place once per tick, and `teardown`
//! deterministically releases everything the state owns. The registry maps
//! effect-type identifiers to implementations so new effects slot in without
//! touching the scheduler.

mod bar_graph;
mod noise_mesh;
mod particle_field;

use std::collections::BTreeMap;

use crate::{
    analysis::FrequencyFrame,
    scene::Scene,
    settings::{EffectSettings, SettingValue},
    AudioMateError, Result,
};

pub use bar_graph::BarGraphEffect;
pub use noise_mesh::NoiseMeshEffect;
pub use particle_field::ParticleFieldEffect;

/// Timing information handed to `animate` each tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeContext {
    /// Wall-clock seconds since the session started.
    pub elapsed_seconds: f64,
    /// Seconds since the previous tick.
    pub delta_seconds: f64,
}

/// One interchangeable visual strategy.
pub trait Effect {
    /// Stable effect-type identifier used by the registry, the control
    /// surface and persisted animations.
    fn name(&self) -> &'static str;

    /// Declares the effect's tunables with defaults and valid ranges.
    fn default_settings(&self) -> EffectSettings;

    /// Registers the effect's renderables into the scene and returns the
    /// state handle that owns them.
    fn prepare(&self, scene: &mut Scene, settings: &EffectSettings) -> Result<Box<dyn EffectState>>;
}

/// Live session state for one prepared effect.
///
/// Exactly one state is active at a time; the render loop owns it between
/// `prepare` and `teardown` and nothing else holds it.
pub trait EffectState {
    /// Advances the effect one frame, mutating renderables in place. No
    /// reallocation happens here; topology changes go through [`rebuild`].
    ///
    /// [`rebuild`]: EffectState::rebuild
    fn animate(&mut self, scene: &mut Scene, frame: &FrequencyFrame, time: &TimeContext);

    /// Pushes one non-topology setting change into live renderables without
    /// waiting for the next tick.
    fn apply_setting(&mut self, scene: &mut Scene, key: &str, value: &SettingValue);

    /// Regenerates owned geometry wholesale after a topology-changing setting
    /// fired. Old buffers are discarded, never patched in place.
    fn rebuild(&mut self, scene: &mut Scene, settings: &EffectSettings) -> Result<()>;

    /// Releases every renderable the state owns. Consumes the state so a torn
    /// down effect cannot be animated again.
    fn teardown(self: Box<Self>, scene: &mut Scene);
}

/// Maps effect-type identifiers to implementations.
#[derive(Default)]
pub struct EffectRegistry {
    entries: BTreeMap<String, Box<dyn Effect>>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the three built-in effects.
    pub fn with_builtin_effects() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BarGraphEffect));
        registry.register(Box::new(ParticleFieldEffect));
        registry.register(Box::new(NoiseMeshEffect));
        registry
    }

    pub fn register(&mut self, effect: Box<dyn Effect>) {
        self.entries.insert(effect.name().to_string(), effect);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Effect> {
        self.entries.get(name).map(Box::as_ref)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Default settings for the named effect type.
    pub fn default_settings(&self, name: &str) -> Result<EffectSettings> {
        self.get(name)
            .map(Effect::default_settings)
            .ok_or_else(|| AudioMateError::UnknownEffect(name.to_string()))
    }

    /// Prepares the named effect. An unknown identifier aborts this call with
    /// [`AudioMateError::UnknownEffect`]; it never falls back to a default
    /// effect, which would mask a caller bug.
    pub fn prepare(
        &self,
        name: &str,
        scene: &mut Scene,
        settings: &EffectSettings,
    ) -> Result<Box<dyn EffectState>> {
        let effect = self
            .get(name)
            .ok_or_else(|| AudioMateError::UnknownEffect(name.to_string()))?;
        tracing::info!(effect = name, "preparing effect");
        effect.prepare(scene, settings)
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("effects", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Frame access that treats an empty frame as silence instead of panicking.
pub(crate) fn bin(frame: &FrequencyFrame, index: usize) -> u8 {
    if frame.is_empty() {
        0
    } else {
        frame[index % frame.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_knows_all_three_effects() {
        let registry = EffectRegistry::with_builtin_effects();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["GlitchCircle", "MatrixShape", "SineWave"]);
    }

    #[test]
    fn unknown_effect_is_an_error_not_a_default() {
        let registry = EffectRegistry::with_builtin_effects();
        let mut scene = Scene::default();
        let settings = EffectSettings::new();

        match registry.prepare("WobbleCube", &mut scene, &settings) {
            Err(AudioMateError::UnknownEffect(name)) => assert_eq!(name, "WobbleCube"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("unknown effect must not prepare"),
        }
        assert_eq!(scene.renderable_count(), 0);
    }

    #[test]
    fn switching_effects_leaks_no_renderables() {
        let registry = EffectRegistry::with_builtin_effects();
        let mut scene = Scene::default();
        let names: Vec<String> = registry.names().map(str::to_string).collect();

        for _ in 0..3 {
            for name in &names {
                let settings = registry.default_settings(name).unwrap();
                let state = registry.prepare(name, &mut scene, &settings).unwrap();
                assert!(scene.renderable_count() > 0);
                state.teardown(&mut scene);
                assert_eq!(scene.renderable_count(), 0);
            }
        }
    }
}
