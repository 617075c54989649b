//! Error types for the voice pipeline.

use thiserror::Error;

/// Result type alias for voice operations.
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors from capture, segmentation, speech services, and playback.
///
/// Only `Capture`/`Stream` failures are fatal to a session; service errors
/// are absorbed per turn by the orchestrator.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("audio device error: {0}")]
    Capture(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("playback error: {0}")]
    Playback(String),

    /// Cancellation observed between frames; the session shuts down cleanly.
    #[error("interrupted")]
    Interrupted,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::DevicesError> for VoiceError {
    fn from(err: cpal::DevicesError) -> Self {
        VoiceError::Capture(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for VoiceError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        VoiceError::Capture(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for VoiceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        VoiceError::Stream(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for VoiceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        VoiceError::Stream(err.to_string())
    }
}
