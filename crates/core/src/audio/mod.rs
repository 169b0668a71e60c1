//! Signal graph abstraction feeding the frequency analyzer.
//!
//! Both a live capture device and a decoded file buffer normalize to one
//! [`SignalNode`] before the analyzer ever sees them. Producers push blocks of
//! floating point samples; the analyzer pulls the most recent window without
//! waiting. One-frame staleness is acceptable by design, so there is no
//! rendezvous between the audio clock and the render clock.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Upper bound on buffered history. Large enough for any supported FFT
/// window, small enough that a stalled consumer cannot grow without bound.
const MAX_QUEUED_SAMPLES: usize = 1 << 16;

/// Shared tap into one point of the audio graph.
///
/// Cloning yields another handle onto the same underlying sample ring, which
/// is how the analyzer and the capture pipeline observe the same output node.
#[derive(Debug, Clone, Default)]
pub struct SignalNode {
    shared: Arc<Mutex<SampleRing>>,
}

#[derive(Debug, Default)]
struct SampleRing {
    samples: VecDeque<f32>,
    total_pushed: u64,
}

impl SignalNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block of samples from the producing side of the graph.
    pub fn push_block(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let Ok(mut ring) = self.shared.lock() else {
            return;
        };
        ring.samples.extend(samples.iter().copied());
        ring.total_pushed += samples.len() as u64;
        let overflow = ring.samples.len().saturating_sub(MAX_QUEUED_SAMPLES);
        if overflow > 0 {
            ring.samples.drain(..overflow);
        }
    }

    /// Copies the most recent `out.len()` samples into `out`.
    ///
    /// Returns `false` without touching `out` when fewer samples than one full
    /// window have ever been pushed. Never blocks on the producer: the call
    /// only contends on a short critical section.
    pub fn latest_window(&self, out: &mut [f32]) -> bool {
        let Ok(ring) = self.shared.lock() else {
            return false;
        };
        if ring.samples.len() < out.len() || out.is_empty() {
            return false;
        }

        let start = ring.samples.len() - out.len();
        for (slot, sample) in out.iter_mut().zip(ring.samples.iter().skip(start)) {
            *slot = *sample;
        }
        true
    }

    /// Total samples ever pushed through this node.
    pub fn samples_pushed(&self) -> u64 {
        self.shared.lock().map(|ring| ring.total_pushed).unwrap_or(0)
    }
}

/// Deterministic file-backed source: a fully decoded sample buffer played
/// forward into a [`SignalNode`] under an explicit clock.
///
/// This is the engine-side stand-in for the host's decode pipeline; live
/// device capture feeds the same node type from its own callback.
#[derive(Debug)]
pub struct BufferSource {
    samples: Vec<f32>,
    sample_rate: u32,
    cursor: usize,
    node: SignalNode,
}

impl BufferSource {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            cursor: 0,
            node: SignalNode::new(),
        }
    }

    /// The graph node downstream consumers tap.
    pub fn node(&self) -> SignalNode {
        self.node.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// True once the cursor has consumed the whole buffer.
    pub fn finished(&self) -> bool {
        self.cursor >= self.samples.len()
    }

    /// Advances playback by `seconds`, pushing the covered samples into the
    /// node. Clamps at end of buffer rather than wrapping.
    pub fn advance(&mut self, seconds: f64) {
        if self.finished() || seconds <= 0.0 {
            return;
        }

        let count = (seconds * self.sample_rate as f64) as usize;
        let end = (self.cursor + count).min(self.samples.len());
        self.node.push_block(&self.samples[self.cursor..end]);
        self.cursor = end;
    }
}
