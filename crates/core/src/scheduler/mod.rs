//! Single-threaded, frame-driven render loop.
//!
//! The host's display layer drives [`RenderLoop::tick`] from its
//! frame-presentation callback; the loop itself never spins a timer. Each tick
//! samples the analyzer, animates the active effect and reports whether it
//! re-armed. Cancellation is explicit through a shared [`CancelToken`] and
//! idempotent: once cancelled, no further tick fires and cancelling again is a
//! no-op. Tearing down the session's resources stays the caller's move.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    analysis::FrequencyAnalyzer,
    audio::SignalNode,
    effects::{EffectRegistry, EffectState, TimeContext},
    scene::Scene,
    settings::{EffectSettings, ParameterStore, SettingValue},
    Result,
};

/// Shared cancellation flag threaded through every call site able to stop the
/// loop, replacing self-rescheduling callbacks nobody holds a handle to.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops the loop. Safe to call any number of times; only the first call
    /// observes a state change.
    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            tracing::info!("render loop cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

struct ActiveEffect {
    name: String,
    state: Box<dyn EffectState>,
    store: ParameterStore,
}

/// Owns the per-session engine state and decides when anything ticks.
pub struct RenderLoop {
    registry: EffectRegistry,
    analyzer: FrequencyAnalyzer,
    scene: Scene,
    active: Option<ActiveEffect>,
    token: CancelToken,
    started_at: Option<f64>,
    last_tick: Option<f64>,
}

impl RenderLoop {
    pub fn new(registry: EffectRegistry, analyzer: FrequencyAnalyzer) -> Self {
        Self {
            registry,
            analyzer,
            scene: Scene::default(),
            active: None,
            token: CancelToken::new(),
            started_at: None,
            last_tick: None,
        }
    }

    /// Handle the host keeps to stop the loop from interaction callbacks.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Connects the decoded or live audio graph to the analyzer tap.
    pub fn attach_audio(&mut self, node: SignalNode) {
        self.analyzer.attach_source(node);
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn analyzer(&self) -> &FrequencyAnalyzer {
        &self.analyzer
    }

    pub fn active_effect(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.name.as_str())
    }

    pub fn settings(&self) -> Option<&EffectSettings> {
        self.active.as_ref().map(|active| active.store.settings())
    }

    /// Switches to the named effect with its default settings.
    pub fn switch_effect(&mut self, name: &str) -> Result<()> {
        let settings = self.registry.default_settings(name)?;
        self.switch_effect_with_settings(name, settings)
    }

    /// Switches to the named effect using explicit settings, e.g. restored
    /// from a persisted snapshot.
    ///
    /// The whole transition happens between ticks: the old state is fully
    /// torn down before the new one is prepared, and no tick can interleave
    /// because ticks and switches share the one logical engine thread. An
    /// unknown name fails before the old effect is touched, leaving the
    /// session stable.
    pub fn switch_effect_with_settings(
        &mut self,
        name: &str,
        settings: EffectSettings,
    ) -> Result<()> {
        if self.registry.get(name).is_none() {
            return Err(crate::AudioMateError::UnknownEffect(name.to_string()));
        }

        if let Some(previous) = self.active.take() {
            tracing::info!(effect = %previous.name, "tearing down previous effect");
            previous.state.teardown(&mut self.scene);
        }

        let state = self.registry.prepare(name, &mut self.scene, &settings)?;
        self.active = Some(ActiveEffect {
            name: name.to_string(),
            state,
            store: ParameterStore::new(settings),
        });
        Ok(())
    }

    /// Tears down the active effect without replacing it.
    pub fn teardown_session(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::info!(effect = %active.name, "session teardown");
            active.state.teardown(&mut self.scene);
        }
    }

    /// Routes one control-surface update into the live effect.
    pub fn update_setting(&mut self, key: &str, value: SettingValue) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            return Err(crate::AudioMateError::InvalidInput(
                "no active effect to update",
            ));
        };
        active
            .store
            .update(key, value, active.state.as_mut(), &mut self.scene)
    }

    /// Applies a host resize notification out-of-band. The next composed
    /// frame picks it up; one stale-sized frame may already be in flight.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.scene.set_viewport(width, height);
    }

    /// Runs one frame. Returns `Ok(true)` when the loop re-armed for the next
    /// presentation callback, `Ok(false)` when it is cancelled (in which case
    /// nothing was sampled or animated).
    pub fn tick(&mut self, now_seconds: f64) -> Result<bool> {
        if self.token.is_cancelled() {
            return Ok(false);
        }

        let started_at = *self.started_at.get_or_insert(now_seconds);
        let time = TimeContext {
            elapsed_seconds: now_seconds - started_at,
            delta_seconds: self.last_tick.map(|last| now_seconds - last).unwrap_or(0.0),
        };
        self.last_tick = Some(now_seconds);

        if let Some(active) = self.active.as_mut() {
            // Deferred topology rebuild lands at the top of the tick, before
            // the frame is sampled, so animate always sees fresh buffers.
            if active.store.take_rebuild() {
                active.state.rebuild(&mut self.scene, active.store.settings())?;
            }

            let frame = self.analyzer.sample();
            active.state.animate(&mut self.scene, &frame, &time);
        }

        Ok(!self.token.is_cancelled())
    }
}

impl std::fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("active", &self.active.as_ref().map(|a| &a.name))
            .field("cancelled", &self.token.is_cancelled())
            .field("renderables", &self.scene.renderable_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AudioMateError;

    fn render_loop() -> RenderLoop {
        let registry = EffectRegistry::with_builtin_effects();
        let analyzer = FrequencyAnalyzer::configure(256, 0.8, -100.0).unwrap();
        RenderLoop::new(registry, analyzer)
    }

    #[test]
    fn double_cancel_is_a_no_op() {
        let mut engine = render_loop();
        engine.switch_effect("GlitchCircle").unwrap();

        engine.cancel();
        engine.cancel();
        assert!(engine.is_cancelled());

        // No further tick fires after cancellation.
        assert!(!engine.tick(0.0).unwrap());
        assert!(!engine.tick(0.016).unwrap());
        // Teardown stays the caller's responsibility.
        assert_eq!(engine.scene().renderable_count(), 1);
        engine.teardown_session();
        assert_eq!(engine.scene().renderable_count(), 0);
    }

    #[test]
    fn repeated_switches_match_prepares_with_teardowns() {
        let mut engine = render_loop();
        for name in ["SineWave", "GlitchCircle", "MatrixShape", "SineWave"] {
            engine.switch_effect(name).unwrap();
            assert!(engine.scene().renderable_count() > 0);
            assert_eq!(engine.active_effect(), Some(name));
        }
        engine.teardown_session();
        assert_eq!(engine.scene().renderable_count(), 0);
    }

    #[test]
    fn unknown_effect_leaves_the_session_stable() {
        let mut engine = render_loop();
        engine.switch_effect("MatrixShape").unwrap();
        let renderables = engine.scene().renderable_count();

        let err = engine.switch_effect("DiscoFloor").unwrap_err();
        assert!(matches!(err, AudioMateError::UnknownEffect(_)));
        assert_eq!(engine.active_effect(), Some("MatrixShape"));
        assert_eq!(engine.scene().renderable_count(), renderables);
    }

    #[test]
    fn ticks_animate_without_an_audio_session() {
        let mut engine = render_loop();
        engine.switch_effect("SineWave").unwrap();

        // No source attached: the analyzer degrades to silence and the
        // effect renders its idle shape, with no error surfaced.
        assert!(engine.tick(0.0).unwrap());
        assert!(engine.tick(0.016).unwrap());
    }

    #[test]
    fn topology_rebuild_happens_on_the_next_tick() {
        let mut engine = render_loop();
        engine.switch_effect("GlitchCircle").unwrap();
        engine.tick(0.0).unwrap();

        engine
            .update_setting("particleCount", SettingValue::Number(1000.0))
            .unwrap();

        // The control surface update alone must not regenerate geometry.
        let before = particle_len(&engine);
        assert_eq!(before, 512);

        engine.tick(0.016).unwrap();
        assert_eq!(particle_len(&engine), 1000);
    }

    #[test]
    fn non_topology_update_lands_immediately() {
        let mut engine = render_loop();
        engine.switch_effect("GlitchCircle").unwrap();

        engine
            .update_setting("glitch", SettingValue::Toggle(true))
            .unwrap();
        assert!(engine.scene().glitch_enabled());
    }

    #[test]
    fn resize_applies_out_of_band() {
        let mut engine = render_loop();
        engine.resize(1280, 720);
        assert_eq!(engine.scene().viewport(), (1280, 720));
    }

    fn particle_len(engine: &RenderLoop) -> usize {
        engine
            .scene()
            .renderables()
            .find_map(|(_, renderable)| match renderable {
                crate::scene::Renderable::Particles(buffer) => Some(buffer.len()),
                _ => None,
            })
            .expect("particles present")
    }
}
