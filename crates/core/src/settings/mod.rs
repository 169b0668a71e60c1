//! Live-mutable per-effect settings and the parameter store binding them to an
//! external control surface.
//!
//! Every tunable declares its type and valid range up front. Updates merge
//! into the existing map, never replace it, and are pushed into live effect
//! state immediately. Topology-changing keys are the exception: they only mark
//! the active state for a rebuild that the scheduler performs on its next
//! tick, so a control surface drag never stalls on geometry regeneration.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::{
    effects::EffectState, scene::Scene, AudioMateError, Result,
};

/// Linear RGB color with components in `[0, 1]`. The default is black.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb`, the format the control surface exchanges.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        // Byte slicing below is only safe once every digit is ASCII hex.
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .ok()
                .map(|v| f32::from(v) / 255.0)
        };
        Some(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub fn to_hex(self) -> String {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }
}

/// One tunable parameter value as exchanged with the control surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    Number(f64),
    Toggle(bool),
    Color(Rgb),
}

#[derive(Debug, Clone)]
struct SettingSpec {
    range: Option<RangeInclusive<f64>>,
    topology: bool,
}

/// Named mapping of tunable parameters with declared valid ranges.
///
/// Effects declare their keys when constructing defaults; the store only ever
/// merges values into the declared set.
#[derive(Debug, Clone, Default)]
pub struct EffectSettings {
    values: BTreeMap<String, SettingValue>,
    specs: BTreeMap<String, SettingSpec>,
}

impl EffectSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a numeric setting with its valid range.
    pub fn number(mut self, key: &str, default: f64, range: RangeInclusive<f64>) -> Self {
        self.declare(key, SettingValue::Number(default), Some(range), false);
        self
    }

    /// Declares a numeric setting whose change forces full geometry
    /// regeneration rather than an in-place patch.
    pub fn topology_number(mut self, key: &str, default: f64, range: RangeInclusive<f64>) -> Self {
        self.declare(key, SettingValue::Number(default), Some(range), true);
        self
    }

    pub fn toggle(mut self, key: &str, default: bool) -> Self {
        self.declare(key, SettingValue::Toggle(default), None, false);
        self
    }

    /// Declares a toggle that changes renderable topology when flipped.
    pub fn topology_toggle(mut self, key: &str, default: bool) -> Self {
        self.declare(key, SettingValue::Toggle(default), None, true);
        self
    }

    pub fn color(mut self, key: &str, default: Rgb) -> Self {
        self.declare(key, SettingValue::Color(default), None, false);
        self
    }

    fn declare(
        &mut self,
        key: &str,
        default: SettingValue,
        range: Option<RangeInclusive<f64>>,
        topology: bool,
    ) {
        self.values.insert(key.to_string(), default);
        self.specs
            .insert(key.to_string(), SettingSpec { range, topology });
    }

    /// Merges one value into the map, validating the key, value type and
    /// declared range.
    pub fn set(&mut self, key: &str, value: SettingValue) -> Result<()> {
        let Some(spec) = self.specs.get(key) else {
            return Err(AudioMateError::InvalidInput("unknown setting key"));
        };
        let current = self
            .values
            .get(key)
            .ok_or(AudioMateError::InvalidInput("unknown setting key"))?;

        if std::mem::discriminant(current) != std::mem::discriminant(&value) {
            return Err(AudioMateError::SettingTypeMismatch(key.to_string()));
        }
        if let (SettingValue::Number(number), Some(range)) = (&value, &spec.range) {
            if !range.contains(number) {
                return Err(AudioMateError::InvalidInput(
                    "setting value outside its declared range",
                ));
            }
        }

        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn is_topology(&self, key: &str) -> bool {
        self.specs.get(key).map(|spec| spec.topology).unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        match self.values.get(key) {
            Some(SettingValue::Number(v)) => *v,
            _ => default,
        }
    }

    pub fn toggle_or(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(SettingValue::Toggle(v)) => *v,
            _ => default,
        }
    }

    pub fn color_or(&self, key: &str, default: Rgb) -> Rgb {
        match self.values.get(key) {
            Some(SettingValue::Color(v)) => *v,
            _ => default,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Serializable view of the current values, sufficient to reconstruct an
    /// identical settings map over the same declarations.
    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            values: self.values.clone(),
        }
    }

    /// Merges a snapshot back in, validating every entry against the declared
    /// specs. Unknown or out-of-range entries abort the restore.
    pub fn restore(&mut self, snapshot: &SettingsSnapshot) -> Result<()> {
        for (key, value) in &snapshot.values {
            self.set(key, value.clone())?;
        }
        Ok(())
    }
}

/// Persisted form of [`EffectSettings`] values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    values: BTreeMap<String, SettingValue>,
}

impl SettingsSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|_| AudioMateError::InvalidInput("settings snapshot failed to serialize"))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|_| AudioMateError::InvalidInput("settings snapshot failed to parse"))
    }
}

/// Binds the control surface to the active effect's settings.
#[derive(Debug)]
pub struct ParameterStore {
    settings: EffectSettings,
    rebuild_pending: bool,
}

impl ParameterStore {
    pub fn new(settings: EffectSettings) -> Self {
        Self {
            settings,
            rebuild_pending: false,
        }
    }

    pub fn settings(&self) -> &EffectSettings {
        &self.settings
    }

    /// Merges one update and pushes it into the live effect state.
    ///
    /// Non-topology keys mutate the running renderables immediately, without
    /// waiting for the next tick. Topology-changing keys only mark the state
    /// for rebuild; the scheduler regenerates geometry at the top of its next
    /// tick so this call stays cheap on the control surface thread.
    pub fn update(
        &mut self,
        key: &str,
        value: SettingValue,
        state: &mut dyn EffectState,
        scene: &mut Scene,
    ) -> Result<()> {
        self.settings.set(key, value.clone())?;

        if self.settings.is_topology(key) {
            self.rebuild_pending = true;
            tracing::debug!(key, "topology setting changed, rebuild deferred");
        } else {
            state.apply_setting(scene, key, &value);
        }
        Ok(())
    }

    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    /// Consumes the pending-rebuild mark. Called once per tick.
    pub fn take_rebuild(&mut self) -> bool {
        std::mem::take(&mut self.rebuild_pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_settings() -> EffectSettings {
        EffectSettings::new()
            .topology_number("particleCount", 512.0, 100.0..=2000.0)
            .number("radius", 10.0, 1.0..=20.0)
            .toggle("glitch", false)
            .color("particleColor", Rgb::from_hex("#00ff00").unwrap())
    }

    #[test]
    fn set_merges_and_validates_ranges() {
        let mut settings = demo_settings();
        settings
            .set("radius", SettingValue::Number(15.0))
            .expect("in-range update");
        assert_eq!(settings.number_or("radius", 0.0), 15.0);
        assert_eq!(settings.number_or("particleCount", 0.0), 512.0);

        assert!(settings.set("radius", SettingValue::Number(50.0)).is_err());
        assert!(settings.set("unknown", SettingValue::Number(1.0)).is_err());
        assert!(settings.set("radius", SettingValue::Toggle(true)).is_err());
    }

    #[test]
    fn topology_flags_are_declared_per_key() {
        let settings = demo_settings();
        assert!(settings.is_topology("particleCount"));
        assert!(!settings.is_topology("radius"));
        assert!(!settings.is_topology("glitch"));
    }

    #[test]
    fn snapshot_round_trips_identically() {
        let mut settings = demo_settings();
        settings.set("radius", SettingValue::Number(4.0)).unwrap();
        settings
            .set("particleColor", SettingValue::Color(Rgb::new(1.0, 0.0, 0.5)))
            .unwrap();

        let json = settings.snapshot().to_json().unwrap();
        let restored_snapshot = SettingsSnapshot::from_json(&json).unwrap();

        let mut restored = demo_settings();
        restored.restore(&restored_snapshot).unwrap();
        assert_eq!(restored.snapshot(), settings.snapshot());
    }

    #[test]
    fn hex_colors_parse_and_format() {
        let green = Rgb::from_hex("#00ff00").unwrap();
        assert_eq!(green.to_hex(), "#00ff00");
        assert!(Rgb::from_hex("00ff00").is_none());
        assert!(Rgb::from_hex("#12345").is_none());
        assert_eq!(Rgb::default().to_hex(), "#000000");
    }

    #[test]
    fn hex_rejects_non_ascii_input_without_panicking() {
        // Six bytes but not six hex digits; slicing must never land inside
        // a multibyte character.
        assert!(Rgb::from_hex("#a\u{e9}aaa").is_none());
        assert!(Rgb::from_hex("#ggaabb").is_none());
        assert!(Rgb::from_hex("#00ff0\u{e9}").is_none());
    }

    /// Effect state that accepts every update without touching a scene.
    struct NullState;

    impl EffectState for NullState {
        fn animate(
            &mut self,
            _scene: &mut Scene,
            _frame: &crate::analysis::FrequencyFrame,
            _time: &crate::effects::TimeContext,
        ) {
        }

        fn apply_setting(&mut self, _scene: &mut Scene, _key: &str, _value: &SettingValue) {}

        fn rebuild(&mut self, _scene: &mut Scene, _settings: &EffectSettings) -> Result<()> {
            Ok(())
        }

        fn teardown(self: Box<Self>, _scene: &mut Scene) {}
    }

    #[test]
    fn store_defers_topology_updates_and_reports_them_pending() {
        let mut store = ParameterStore::new(demo_settings());
        let mut state = NullState;
        let mut scene = Scene::default();
        assert!(!store.rebuild_pending());

        store
            .update(
                "particleCount",
                SettingValue::Number(800.0),
                &mut state,
                &mut scene,
            )
            .unwrap();
        assert!(store.rebuild_pending());

        assert!(store.take_rebuild());
        assert!(!store.rebuild_pending());
        assert!(!store.take_rebuild());
    }
}
