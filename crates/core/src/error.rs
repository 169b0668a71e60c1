/// Result alias that carries the custom [`AudioMateError`] type.
pub type Result<T> = std::result::Result<T, AudioMateError>;

/// Common error type for the core crate.
///
/// Only user-facing failures appear here. Degraded-but-valid conditions such
/// as an analyzer with no attached source are absorbed by the subsystem that
/// observes them and never surface as errors.
#[derive(Debug, thiserror::Error)]
pub enum AudioMateError {
    /// An effect-type identifier that no registered effect answers to. The
    /// registry never substitutes a default effect for an unknown name.
    #[error("unknown effect type `{0}`")]
    UnknownEffect(String),
    /// Capture was started without a connected audio graph. Raised before any
    /// encoder session is opened so no partial artifact can exist.
    #[error("capture requires a connected audio graph")]
    CaptureWithoutAudio,
    /// None of the candidate capture containers passed the capability probe.
    #[error("no supported capture container")]
    UnsupportedContainer,
    /// A configuration or setting value outside its declared valid range.
    #[error("{0}")]
    InvalidInput(&'static str),
    /// A setting update that does not match the declared type of the key.
    #[error("setting `{0}` does not accept the provided value type")]
    SettingTypeMismatch(String),
    /// Wrapper around FFT processing errors.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
