//! Persistence and gallery playback seams.
//!
//! Saving and storage live with an external collaborator; the engine's side
//! of the contract is a fully serializable save request and the ability to
//! re-prepare an effect from a persisted snapshot so a gallery entry replays
//! visually equivalent output.

use serde::{Deserialize, Serialize};

use crate::{
    effects::{EffectRegistry, EffectState},
    scene::Scene,
    settings::{EffectSettings, SettingsSnapshot},
    Result,
};

/// Opaque save request handed to the upload collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    /// Identity of the owning account, opaque to the engine.
    pub owner: String,
    /// Display name chosen by the user.
    pub name: String,
    /// Effect-type identifier, resolvable through the registry on replay.
    pub effect_type: String,
    /// Settings values sufficient to reconstruct identical
    /// [`EffectSettings`] over the effect's declarations.
    pub settings: SettingsSnapshot,
    /// The encoded audio the animation was driven by.
    pub audio: Vec<u8>,
}

impl SaveRequest {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|_| crate::AudioMateError::InvalidInput("save request failed to serialize"))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|_| crate::AudioMateError::InvalidInput("save request failed to parse"))
    }
}

/// Re-prepares a persisted animation for playback.
///
/// Restores the snapshot over the effect's declared defaults, then runs the
/// normal prepare path. An unknown effect type propagates as
/// [`crate::AudioMateError::UnknownEffect`] rather than substituting another
/// effect.
pub fn replay(
    registry: &EffectRegistry,
    scene: &mut Scene,
    effect_type: &str,
    snapshot: &SettingsSnapshot,
) -> Result<(Box<dyn EffectState>, EffectSettings)> {
    let mut settings = registry.default_settings(effect_type)?;
    settings.restore(snapshot)?;
    let state = registry.prepare(effect_type, scene, &settings)?;
    Ok((state, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingValue;

    #[test]
    fn save_request_round_trips_through_json() {
        let registry = EffectRegistry::with_builtin_effects();
        let mut settings = registry.default_settings("GlitchCircle").unwrap();
        settings.set("radius", SettingValue::Number(14.0)).unwrap();

        let request = SaveRequest {
            owner: "user-42".to_string(),
            name: "friday demo".to_string(),
            effect_type: "GlitchCircle".to_string(),
            settings: settings.snapshot(),
            audio: vec![1, 2, 3],
        };

        let parsed = SaveRequest::from_json(&request.to_json().unwrap()).unwrap();
        assert_eq!(parsed.effect_type, "GlitchCircle");
        assert_eq!(parsed.settings, settings.snapshot());
        assert_eq!(parsed.audio, vec![1, 2, 3]);
    }

    #[test]
    fn replay_reconstructs_the_persisted_configuration() {
        let registry = EffectRegistry::with_builtin_effects();
        let mut scene = Scene::default();

        let mut original = registry.default_settings("GlitchCircle").unwrap();
        original
            .set("particleCount", SettingValue::Number(250.0))
            .unwrap();
        let snapshot = original.snapshot();

        let (state, settings) =
            replay(&registry, &mut scene, "GlitchCircle", &snapshot).unwrap();
        assert_eq!(settings.number_or("particleCount", 0.0), 250.0);
        assert_eq!(scene.renderable_count(), 1);

        state.teardown(&mut scene);
        assert_eq!(scene.renderable_count(), 0);
    }

    #[test]
    fn replay_of_an_unknown_type_propagates_the_error() {
        let registry = EffectRegistry::with_builtin_effects();
        let mut scene = Scene::default();
        let snapshot = EffectSettings::new().snapshot();

        assert!(replay(&registry, &mut scene, "LostEffect", &snapshot).is_err());
        assert_eq!(scene.renderable_count(), 0);
    }
}
