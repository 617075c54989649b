//! # Parley Voice — capture, segmentation, and speech services
//!
//! Turns a live microphone stream into discrete utterances and connects them
//! to speech services. Segmentation is energy-based: constant time per frame,
//! no look-ahead, suitable for live audio with zero model dependencies.
//!
//! ```text
//! ┌──────────────┐   frames   ┌──────────────────┐   Utterance
//! │  Mic (cpal)  │ ─────────▶ │ FrameAccumulator │ ─────────────▶ STT
//! └──────────────┘            │  (RMS gate +     │
//!                             │   silence limit) │       reply ──▶ TTS ──▶ rodio
//!                             └──────────────────┘
//! ```

pub mod audio;
pub mod error;
pub mod output;
pub mod segmenter;
pub mod stt;

pub use audio::{AudioCapture, AudioConfig, AudioFrame};
pub use error::{VoiceError, VoiceResult};
pub use output::{
    HttpSynthesizer, PlaceholderSynthesizer, SpeakerOutput, SpeechSink, SynthesisBackend,
    VoiceSpeaker,
};
pub use segmenter::{
    rms, FrameAccumulator, SegmentProgress, SegmenterConfig, TurnSegmenter, Utterance,
    UtteranceSource,
};
pub use stt::{
    create_transcriber, utterance_to_wav, HttpTranscriber, PlaceholderTranscriber,
    TranscribeBackend,
};
