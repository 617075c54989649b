//! Speech-to-text: convert a bounded `Utterance` into a transcript.
//!
//! `TranscribeBackend` is the seam to the external service; the HTTP
//! implementation posts a WAV upload to an OpenAI-compatible transcription
//! endpoint. A transcript may legitimately be empty (silent recording).

use crate::error::{VoiceError, VoiceResult};
use crate::segmenter::Utterance;
use std::io::Cursor;
use std::time::Duration;

/// Backend for converting PCM to text. Implement for remote or local STT.
pub trait TranscribeBackend: Send + Sync {
    /// Transcribe one utterance. Returns an empty string when the service
    /// detects no speech.
    fn transcribe(&self, utterance: &Utterance) -> VoiceResult<String>;
}

/// Encode an utterance as 16-bit mono WAV bytes for upload.
pub fn utterance_to_wav(utterance: &Utterance) -> VoiceResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: utterance.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;
        for &sample in &utterance.samples {
            writer
                .write_sample(sample)
                .map_err(|e| VoiceError::Transcription(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

/// Placeholder STT for running the loop without a service: returns a fixed
/// string, or a description of the buffer when none is configured.
#[derive(Debug, Default)]
pub struct PlaceholderTranscriber {
    pub response: Option<String>,
}

impl PlaceholderTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
        }
    }
}

impl TranscribeBackend for PlaceholderTranscriber {
    fn transcribe(&self, utterance: &Utterance) -> VoiceResult<String> {
        if let Some(ref r) = self.response {
            return Ok(r.clone());
        }
        Ok(format!(
            "[stt placeholder: {} samples, {:.1}s]",
            utterance.samples.len(),
            utterance.duration().as_secs_f32()
        ))
    }
}

/// HTTP transcription backend for OpenAI-compatible APIs.
///
/// Posts `multipart/form-data` with the WAV file, model, and mode selector to
/// `{base_url}/audio/transcriptions`. Reads the transcript from `text`,
/// falling back to `transcript` for providers that use that field.
#[derive(Debug, Clone)]
pub struct HttpTranscriber {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Service mode selector (transcribe | translate | verbatim | ...).
    pub mode: String,
    client: reqwest::blocking::Client,
}

impl HttpTranscriber {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        mode: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            mode: mode.into(),
            client,
        })
    }

    /// Build from environment: `PARLEY_STT_API_URL`, `PARLEY_STT_API_KEY`,
    /// `PARLEY_STT_MODEL`, `PARLEY_STT_MODE`.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("PARLEY_STT_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("PARLEY_STT_API_KEY")
            .map_err(|_| VoiceError::Config("PARLEY_STT_API_KEY not set".to_string()))?;
        let model = std::env::var("PARLEY_STT_MODEL").unwrap_or_else(|_| "whisper-1".to_string());
        let mode = std::env::var("PARLEY_STT_MODE").unwrap_or_else(|_| "transcribe".to_string());
        Self::new(base_url, api_key, model, mode)
    }
}

impl TranscribeBackend for HttpTranscriber {
    fn transcribe(&self, utterance: &Utterance) -> VoiceResult<String> {
        if utterance.is_empty() {
            return Ok(String::new());
        }
        let wav = utterance_to_wav(utterance)?;
        let url = format!(
            "{}/audio/transcriptions",
            self.base_url.trim_end_matches('/')
        );
        let part = reqwest::blocking::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("mode", self.mode.clone());

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Transcription(format!(
                "stt api error {}: {}",
                status, body
            )));
        }
        let json: serde_json::Value = res
            .json()
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;
        let text = json
            .get("text")
            .or_else(|| json.get("transcript"))
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        Ok(text)
    }
}

/// Best available STT from the environment: the HTTP backend when an API key
/// is configured, otherwise the placeholder.
pub fn create_transcriber() -> VoiceResult<Box<dyn TranscribeBackend>> {
    match HttpTranscriber::from_env() {
        Ok(http) => Ok(Box::new(http)),
        Err(_) => Ok(Box::new(PlaceholderTranscriber::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn utterance(samples: Vec<i16>) -> Utterance {
        Utterance {
            samples,
            sample_rate: 16_000,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn placeholder_reports_buffer_shape() {
        let stt = PlaceholderTranscriber::new();
        let text = stt.transcribe(&utterance(vec![0; 1024])).unwrap();
        assert!(text.contains("1024"));
    }

    #[test]
    fn placeholder_with_fixed_response() {
        let stt = PlaceholderTranscriber::with_response("hello there");
        assert_eq!(stt.transcribe(&utterance(vec![])).unwrap(), "hello there");
    }

    #[test]
    fn wav_encoding_has_riff_header_and_data() {
        let wav = utterance_to_wav(&utterance(vec![0, 1, -1, 32_000])).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header + 2 bytes per sample
        assert_eq!(wav.len(), 44 + 4 * 2);
    }
}
