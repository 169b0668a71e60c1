//! Audio+video capture of a running session.
//!
//! The pipeline taps the presentation surface's frame stream and the audio
//! graph's output node, muxes both through an [`Encoder`] and buffers the
//! encoded chunks until `stop` concatenates them into one downloadable
//! artifact. Container choice is a capability probe over a preference list,
//! never a try-and-recover on a failed open. Missing audio is a hard,
//! user-visible failure raised before any encoder session exists: an artifact
//! without its audio track would be a permanent defect, unlike the analyzer's
//! transient silent frames.

use crate::{audio::SignalNode, AudioMateError, Result};

/// Samples of audio muxed alongside each captured frame.
const AUDIO_BLOCK: usize = 1024;

/// Containers the pipeline knows how to ask an encoder about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Webm,
    Mp4,
}

impl ContainerFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Webm => "video/webm",
            Self::Mp4 => "video/mp4",
        }
    }
}

/// Fixed-size drawable target the host composes into.
///
/// Rendering itself happens outside this crate; the surface only holds the
/// most recently presented pixels so capture can tap them.
#[derive(Debug, Clone)]
pub struct PresentationSurface {
    width: u32,
    height: u32,
    frame: Vec<u8>,
}

impl PresentationSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame: vec![0; (width * height * 4) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Stores one presented RGBA frame. Oversized input is truncated to the
    /// surface size; undersized input leaves the remainder untouched.
    pub fn present(&mut self, pixels: &[u8]) {
        let len = pixels.len().min(self.frame.len());
        self.frame[..len].copy_from_slice(&pixels[..len]);
    }

    pub fn frame_bytes(&self) -> &[u8] {
        &self.frame
    }
}

/// Encoding backend seam.
///
/// `supports` is the capability probe the pipeline runs before opening a
/// session; `begin` must not be called for a container the probe rejected.
pub trait Encoder {
    fn supports(&self, container: ContainerFormat) -> bool;
    fn begin(&mut self, container: ContainerFormat, width: u32, height: u32) -> Result<()>;
    /// Encodes one muxed video+audio chunk. Chunk handoff is fire-and-forget;
    /// implementations must not block the caller on I/O.
    fn encode(&mut self, video_frame: &[u8], audio_block: &[f32]) -> Vec<u8>;
    /// Flushes any trailing data when the session finalizes.
    fn finish(&mut self) -> Vec<u8>;
}

/// Development and test backend: stores frames and audio interleaved, raw.
/// Production encoders plug in behind the same [`Encoder`] trait.
#[derive(Debug)]
pub struct InMemoryEncoder {
    supported: Vec<ContainerFormat>,
    frames_encoded: usize,
}

impl Default for InMemoryEncoder {
    fn default() -> Self {
        Self::supporting(vec![ContainerFormat::Webm, ContainerFormat::Mp4])
    }
}

impl InMemoryEncoder {
    pub fn supporting(supported: Vec<ContainerFormat>) -> Self {
        Self {
            supported,
            frames_encoded: 0,
        }
    }
}

impl Encoder for InMemoryEncoder {
    fn supports(&self, container: ContainerFormat) -> bool {
        self.supported.contains(&container)
    }

    fn begin(&mut self, container: ContainerFormat, width: u32, height: u32) -> Result<()> {
        tracing::debug!(?container, width, height, "encoder session opened");
        Ok(())
    }

    fn encode(&mut self, video_frame: &[u8], audio_block: &[f32]) -> Vec<u8> {
        self.frames_encoded += 1;
        let mut chunk = Vec::with_capacity(video_frame.len() + audio_block.len() * 4);
        chunk.extend_from_slice(video_frame);
        for sample in audio_block {
            chunk.extend_from_slice(&sample.to_le_bytes());
        }
        chunk
    }

    fn finish(&mut self) -> Vec<u8> {
        Vec::new()
    }
}

/// Finished recording: one artifact ready for delivery.
#[derive(Debug, Clone)]
pub struct CaptureArtifact {
    pub data: Vec<u8>,
    pub file_name: String,
    pub container: ContainerFormat,
}

/// Configures and opens capture sessions.
#[derive(Debug, Clone)]
pub struct CapturePipeline {
    preferred: Vec<ContainerFormat>,
    base_name: String,
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self {
            preferred: vec![ContainerFormat::Webm, ContainerFormat::Mp4],
            base_name: "visualizer".to_string(),
        }
    }
}

impl CapturePipeline {
    pub fn new(preferred: Vec<ContainerFormat>, base_name: impl Into<String>) -> Self {
        Self {
            preferred,
            base_name: base_name.into(),
        }
    }

    /// Opens a capture session over the surface and audio output node.
    ///
    /// Fails fast, before any encoder session is opened, when no audio graph
    /// is connected or when no preferred container passes the capability
    /// probe.
    pub fn start(
        &self,
        surface: &PresentationSurface,
        audio: Option<&SignalNode>,
        mut encoder: Box<dyn Encoder>,
    ) -> Result<CaptureSession> {
        let Some(audio) = audio else {
            return Err(AudioMateError::CaptureWithoutAudio);
        };

        let container = self
            .preferred
            .iter()
            .copied()
            .find(|candidate| encoder.supports(*candidate))
            .ok_or(AudioMateError::UnsupportedContainer)?;

        encoder.begin(container, surface.width(), surface.height())?;
        tracing::info!(?container, "capture session started");

        Ok(CaptureSession {
            encoder,
            container,
            audio: audio.clone(),
            audio_scratch: vec![0.0; AUDIO_BLOCK],
            chunks: Vec::new(),
            base_name: self.base_name.clone(),
        })
    }
}

/// Live recording: start → accumulate → stop → one artifact.
pub struct CaptureSession {
    encoder: Box<dyn Encoder>,
    container: ContainerFormat,
    audio: SignalNode,
    audio_scratch: Vec<f32>,
    chunks: Vec<Vec<u8>>,
    base_name: String,
}

impl CaptureSession {
    pub fn container(&self) -> ContainerFormat {
        self.container
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Muxes the surface's current frame with the latest audio window. Called
    /// from the presentation callback; never blocks the render loop.
    pub fn capture_frame(&mut self, surface: &PresentationSurface) {
        if !self.audio.latest_window(&mut self.audio_scratch) {
            self.audio_scratch.fill(0.0);
        }
        let chunk = self.encoder.encode(surface.frame_bytes(), &self.audio_scratch);
        self.chunks.push(chunk);
    }

    /// Finalizes the encoder and concatenates the buffered chunks into one
    /// deliverable artifact named for the chosen container.
    pub fn stop(mut self) -> CaptureArtifact {
        let trailer = self.encoder.finish();
        if !trailer.is_empty() {
            self.chunks.push(trailer);
        }

        let data = self.chunks.concat();
        let file_name = format!("{}.{}", self.base_name, self.container.extension());
        tracing::info!(file_name, bytes = data.len(), "capture finalized");

        CaptureArtifact {
            data,
            file_name,
            container: self.container,
        }
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("container", &self.container)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}
