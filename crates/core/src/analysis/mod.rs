//! Real-time frequency analysis.
//!
//! [`FrequencyAnalyzer`] converts whatever audio the attached [`SignalNode`]
//! carries into fixed-length per-tick magnitude snapshots. Sampling never
//! blocks and never fails: with no source attached (or not enough history for
//! one window yet) it yields a silent frame, which callers must treat as a
//! valid reading rather than a fault.

use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{audio::SignalNode, AudioMateError, Result};

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32_768;

/// One spectral snapshot: per-bin magnitudes mapped onto unsigned bytes.
///
/// The length equals the analyzer bin count for the whole life of the
/// analyzer configuration. Frames are produced once per tick and never
/// retained across ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyFrame {
    bins: Vec<u8>,
}

impl FrequencyFrame {
    /// An all-zero frame of the given bin count.
    pub fn silence(bin_count: usize) -> Self {
        Self {
            bins: vec![0; bin_count],
        }
    }

    pub fn from_bins(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// True when every bin magnitude is zero.
    pub fn is_silent(&self) -> bool {
        self.bins.iter().all(|bin| *bin == 0)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bins
    }
}

impl std::ops::Index<usize> for FrequencyFrame {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.bins[index]
    }
}

/// Converts a live or file-backed signal into [`FrequencyFrame`] snapshots.
pub struct FrequencyAnalyzer {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    plan: Arc<dyn RealToComplex<f32>>,
    planner: RealFftPlanner<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    smoothed: Vec<f32>,
    window: Vec<f32>,
    source: Option<SignalNode>,
}

impl FrequencyAnalyzer {
    /// Creates an analyzer with the given FFT configuration.
    ///
    /// `fft_size` must be a power of two within the supported range;
    /// `smoothing` is the exponential time constant in `[0, 1)`;
    /// `min_decibels` must sit below the fixed −30 dB ceiling of the byte
    /// mapping.
    pub fn configure(fft_size: usize, smoothing: f32, min_decibels: f32) -> Result<Self> {
        Self::with_ceiling(fft_size, smoothing, min_decibels, -30.0)
    }

    /// As [`configure`](Self::configure) with an explicit dB ceiling.
    pub fn with_ceiling(
        fft_size: usize,
        smoothing: f32,
        min_decibels: f32,
        max_decibels: f32,
    ) -> Result<Self> {
        if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
            return Err(AudioMateError::InvalidInput(
                "fft size must be a power of two between 32 and 32768",
            ));
        }
        if !(0.0..1.0).contains(&smoothing) {
            return Err(AudioMateError::InvalidInput(
                "smoothing time constant must lie in [0, 1)",
            ));
        }
        if min_decibels >= max_decibels {
            return Err(AudioMateError::InvalidInput(
                "minimum decibels must lie below the maximum",
            ));
        }

        let mut planner = RealFftPlanner::new();
        let plan = planner.plan_fft_forward(fft_size);
        let input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();
        let bin_count = fft_size / 2;

        Ok(Self {
            fft_size,
            smoothing,
            min_decibels,
            max_decibels,
            plan,
            planner,
            input,
            spectrum,
            scratch,
            smoothed: vec![0.0; bin_count],
            window: hann_window(fft_size),
            source: None,
        })
    }

    /// Number of bins in every frame this analyzer produces.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Rewires the capture tap without resetting the configured settings.
    pub fn attach_source(&mut self, node: SignalNode) {
        tracing::debug!(fft_size = self.fft_size, "attaching analyzer source");
        self.source = Some(node);
    }

    /// Drops the current tap; subsequent samples are silent frames.
    pub fn detach_source(&mut self) {
        self.source = None;
        self.smoothed.fill(0.0);
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Produces the next frame. Non-blocking; silence when no source is
    /// attached or the source has not yet filled one analysis window.
    pub fn sample(&mut self) -> FrequencyFrame {
        let Some(source) = &self.source else {
            return FrequencyFrame::silence(self.bin_count());
        };
        if !source.latest_window(&mut self.input) {
            return FrequencyFrame::silence(self.bin_count());
        }

        for (sample, w) in self.input.iter_mut().zip(&self.window) {
            *sample *= w;
        }

        if self
            .plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .is_err()
        {
            // A failed transform is a transient glitch; degrade to silence
            // rather than surfacing a fault mid-tick.
            return FrequencyFrame::silence(self.bin_count());
        }

        let scale = 1.0 / self.fft_size as f32;
        let smoothing = self.smoothing;
        let (min_db, max_db) = (self.min_decibels, self.max_decibels);
        let bins = self
            .smoothed
            .iter_mut()
            .zip(self.spectrum.iter().take(self.fft_size / 2))
            .map(|(smoothed, bin)| {
                let magnitude = bin.norm() * scale;
                *smoothed = smoothing * *smoothed + (1.0 - smoothing) * magnitude;
                byte_magnitude(*smoothed, min_db, max_db)
            })
            .collect();

        FrequencyFrame::from_bins(bins)
    }

    /// Changes the FFT size, preserving the smoothing and dB range and the
    /// attached source.
    pub fn set_fft_size(&mut self, fft_size: usize) -> Result<()> {
        if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
            return Err(AudioMateError::InvalidInput(
                "fft size must be a power of two between 32 and 32768",
            ));
        }

        self.fft_size = fft_size;
        self.plan = self.planner.plan_fft_forward(fft_size);
        self.input = self.plan.make_input_vec();
        self.spectrum = self.plan.make_output_vec();
        self.scratch = self.plan.make_scratch_vec();
        self.smoothed = vec![0.0; fft_size / 2];
        self.window = hann_window(fft_size);
        Ok(())
    }

}

fn byte_magnitude(magnitude: f32, min_decibels: f32, max_decibels: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }

    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - min_decibels) / (max_decibels - min_decibels);
    scaled.clamp(0.0, 255.0) as u8
}

impl fmt::Debug for FrequencyAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrequencyAnalyzer")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 - 0.5 * ((2.0 * PI * i as f32) / (len as f32 - 1.0)).cos())
        .collect()
}
