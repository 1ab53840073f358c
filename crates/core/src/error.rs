/// Result alias that carries the custom [`PlayerError`] type.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Common error type for the core crate.
///
/// None of these are fatal. The player logs them and keeps the remaining
/// features usable.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// The platform refused to start playback (autoplay policy or similar).
    #[error("playback blocked: {0}")]
    PlaybackBlocked(String),
    /// The media source could not be decoded or fetched.
    #[error("media source error: {0}")]
    DecodeOrSource(String),
    /// Remote metadata could not be fetched or parsed.
    #[error("metadata lookup failed: {0}")]
    MetadataLookupFailed(String),
    /// The analysis graph has not been initialised yet.
    #[error("audio analysis is not available")]
    AnalysisUnavailable,
    /// Configuration values that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The backend rejected a playback rate.
    #[error("unsupported playback rate {0}")]
    InvalidRate(f32),
    /// Key-value storage failures.
    #[error("storage error: {0}")]
    Storage(String),
    /// Free-form message for call sites without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// FFT planning or execution failures.
    #[error("fft error: {0}")]
    Fft(#[from] realfft::FftError),
}

impl PlayerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for PlayerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PlayerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
