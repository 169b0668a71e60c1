//! Core library for the AudioMate animation studio.
//!
//! The crate implements an audio-reactive procedural animation engine: a
//! frequency analyzer turns the attached audio graph into per-tick magnitude
//! frames, pluggable effect strategies translate those frames into scene
//! mutations, a frame-driven scheduler ties the two together, and a capture
//! pipeline muxes the presented frames with the live audio into one
//! downloadable artifact. Rendering and audio decoding stay with the host;
//! the engine consumes a drawable surface and a decoded signal graph.

pub mod analysis;
pub mod audio;
pub mod capture;
pub mod config;
pub mod effects;
pub mod error;
pub mod modulation;
pub mod persist;
pub mod scene;
pub mod scheduler;
pub mod settings;

pub use analysis::{FrequencyAnalyzer, FrequencyFrame};
pub use audio::{BufferSource, SignalNode};
pub use capture::{
    CaptureArtifact, CapturePipeline, CaptureSession, ContainerFormat, Encoder, InMemoryEncoder,
    PresentationSurface,
};
pub use config::{AnalyzerConfig, AppConfig, CaptureConfig};
pub use effects::{
    BarGraphEffect, Effect, EffectRegistry, EffectState, NoiseMeshEffect, ParticleFieldEffect,
    TimeContext,
};
pub use error::{AudioMateError, Result};
pub use persist::{replay, SaveRequest};
pub use scene::{
    LabelSprite, MeshBuffer, ParticleBuffer, Renderable, RenderableId, Scene,
};
pub use scheduler::{CancelToken, RenderLoop};
pub use settings::{
    EffectSettings, ParameterStore, Rgb, SettingValue, SettingsSnapshot,
};
