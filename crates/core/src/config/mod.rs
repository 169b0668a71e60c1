use serde::{Deserialize, Serialize};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub analyzer: AnalyzerConfig,
    pub capture: CaptureConfig,
}

/// Analyzer defaults matching the original studio: 256-point FFT, WebAudio's
/// stock smoothing and decibel window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub fft_size: usize,
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Configuration for the capture pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub fps: u32,
    pub base_name: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: 25,
            base_name: "visualizer".to_string(),
        }
    }
}
