//! Speech synthesis and playback of replies.
//!
//! `SynthesisBackend` is the seam to the external TTS service; `SpeakerOutput`
//! owns the rodio sink. `SpeechSink` wraps both so the orchestrator speaks
//! through one call and tests can capture lines instead of playing audio.

use crate::error::{VoiceError, VoiceResult};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::time::Duration;
use tracing::info;

/// Backend that turns text into playable audio bytes (WAV/MP3).
pub trait SynthesisBackend: Send + Sync {
    /// Synthesize text. An empty result skips playback.
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>>;
}

/// Placeholder TTS: returns empty audio so nothing plays.
#[derive(Debug, Default)]
pub struct PlaceholderSynthesizer;

impl SynthesisBackend for PlaceholderSynthesizer {
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        info!(text = %text, "tts placeholder (no audio)");
        Ok(Vec::new())
    }
}

/// HTTP synthesis backend for OpenAI-compatible APIs.
///
/// Posts JSON to `{base_url}/audio/speech` with the model, voice, and target
/// language tag; the response body is the audio bytes.
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Voice/speaker tag understood by the service.
    pub voice: String,
    /// Target language tag (e.g. en-US, hi-IN).
    pub language: String,
    client: reqwest::blocking::Client,
}

impl HttpSynthesizer {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
        language: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            voice: voice.into(),
            language: language.into(),
            client,
        })
    }

    /// Build from environment: `PARLEY_TTS_API_URL`, `PARLEY_TTS_API_KEY`,
    /// `PARLEY_TTS_MODEL`, `PARLEY_TTS_VOICE`, `PARLEY_TTS_LANGUAGE`.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("PARLEY_TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("PARLEY_TTS_API_KEY")
            .map_err(|_| VoiceError::Config("PARLEY_TTS_API_KEY not set".to_string()))?;
        let model = std::env::var("PARLEY_TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        let voice = std::env::var("PARLEY_TTS_VOICE").unwrap_or_else(|_| "alloy".to_string());
        let language = std::env::var("PARLEY_TTS_LANGUAGE").unwrap_or_else(|_| "en-US".to_string());
        Self::new(base_url, api_key, model, voice, language)
    }
}

impl SynthesisBackend for HttpSynthesizer {
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
            "language": self.language,
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Synthesis(format!(
                "tts api error {}: {}",
                status, body
            )));
        }
        let bytes = res
            .bytes()
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Playback over the default output device.
pub struct SpeakerOutput {
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
    sink: Sink,
}

impl SpeakerOutput {
    pub fn new() -> VoiceResult<Self> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| VoiceError::Playback(e.to_string()))?;
        let sink =
            Sink::try_new(&stream_handle).map_err(|e| VoiceError::Playback(e.to_string()))?;
        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
            sink,
        })
    }

    /// Decode and queue audio bytes (WAV/MP3). No-op for empty input.
    pub fn play_bytes(&self, bytes: &[u8]) -> VoiceResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let cursor = Cursor::new(bytes.to_vec());
        let source = rodio::Decoder::new(cursor)
            .map_err(|e| VoiceError::Playback(format!("decode failed: {}", e)))?;
        self.sink.append(source.convert_samples::<f32>());
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        !self.sink.empty()
    }

    pub fn stop(&self) {
        self.sink.stop();
    }

    /// Block until queued audio finishes.
    pub fn sleep_until_end(&self) {
        self.sink.sleep_until_end();
    }
}

/// Where spoken replies go. The live implementation synthesizes and plays;
/// tests record the lines instead.
pub trait SpeechSink {
    fn speak(&mut self, text: &str) -> VoiceResult<()>;
}

/// Live sink: synthesize through the backend and play to completion. Playback
/// blocks so the microphone never captures the agent's own reply.
pub struct VoiceSpeaker {
    output: SpeakerOutput,
    backend: Box<dyn SynthesisBackend>,
}

impl VoiceSpeaker {
    pub fn new(backend: Box<dyn SynthesisBackend>) -> VoiceResult<Self> {
        Ok(Self {
            output: SpeakerOutput::new()?,
            backend,
        })
    }
}

impl SpeechSink for VoiceSpeaker {
    fn speak(&mut self, text: &str) -> VoiceResult<()> {
        let bytes = self.backend.synthesize(text)?;
        self.output.play_bytes(&bytes)?;
        self.output.sleep_until_end();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_synthesizer_returns_empty() {
        let tts = PlaceholderSynthesizer;
        assert!(tts.synthesize("hello").unwrap().is_empty());
    }
}
