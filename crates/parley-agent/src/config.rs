//! Session configuration loaded from `.env`.
//!
//! Everything here is static configuration, not runtime-negotiated: audio
//! format, segmentation thresholds, retrieval sizing, sampling parameters,
//! the fixed spoken lines, and the guardrail word lists.

use crate::chat::SamplingParams;
use parley_guardrail::GuardrailConfig;
use parley_voice::{AudioConfig, SegmenterConfig};
use std::path::PathBuf;
use tracing::warn;

const DEFAULT_OPENING_LINE: &str =
    "Hello, thank you for taking the call. Is there anything I can help you with today?";

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a professional and empathetic voice assistant on a phone call.
Your role is to answer the caller's questions using the provided knowledge
and to acknowledge any concerns warmly.

Strict rules:
  - Keep every response to 1-3 SHORT, spoken sentences. This is a phone call, not an email.
  - Never read out bullet points or lists aloud; convert them into natural speech.
  - Always maintain a respectful, caring, and professional tone.
  - Do NOT make up details. Only use the knowledge provided to you.
  - If you don't know something, say you'll note it down and have someone follow up.
";

const DEFAULT_FAREWELL: &str =
    "Thank you for your time. Someone will reach out if there is any follow-up. Have a wonderful day!";

const DEFAULT_INPUT_REFUSAL: &str = "I'm sorry, I can't help with that topic.";
const DEFAULT_OUTPUT_REFUSAL: &str = "I'm sorry, I can't share that response.";
const DEFAULT_APOLOGY: &str = "I'm sorry, I ran into a problem. Could you repeat that?";

/// Full agent configuration. `from_env` reads `PARLEY_*` variables; unset or
/// invalid values fall back to the defaults documented per field.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// PARLEY_SAMPLE_RATE / PARLEY_FRAME_SIZE. Capture is always mono; a
    /// non-mono PARLEY_CHANNELS is warned about and ignored.
    pub audio: AudioConfig,
    /// PARLEY_SILENCE_THRESHOLD / PARLEY_SILENCE_SECS / PARLEY_MAX_RECORD_SECS.
    pub segmenter: SegmenterConfig,
    /// PARLEY_DATA_DIR: corpus directory (default ./data).
    pub data_dir: PathBuf,
    /// PARLEY_CHUNK_SIZE: words per retrieval chunk (default 250).
    pub chunk_size: usize,
    /// PARLEY_TOP_K: snippets injected into the prompt (default 3).
    pub top_k: usize,
    /// PARLEY_TEMPERATURE / PARLEY_TOP_P / PARLEY_MAX_TOKENS.
    pub sampling: SamplingParams,
    /// PARLEY_OPENING_LINE: greeting spoken before the first turn.
    pub opening_line: String,
    /// PARLEY_SYSTEM_PROMPT: fixed system instruction.
    pub system_prompt: String,
    /// PARLEY_FAREWELL: spoken on exit-phrase match.
    pub farewell: String,
    /// Spoken when inbound text is blocked.
    pub input_refusal: String,
    /// Spoken in place of a blocked reply.
    pub output_refusal: String,
    /// Spoken when generation fails.
    pub apology: String,
    /// PARLEY_BLOCKED_TOPICS / PARLEY_EXIT_PHRASES (comma-separated overrides).
    pub guardrail: GuardrailConfig,
}

impl AgentConfig {
    pub fn from_env() -> Self {
        let mut audio = AudioConfig::default();
        audio.sample_rate = env_u32("PARLEY_SAMPLE_RATE", audio.sample_rate);
        audio.frame_size = env_usize("PARLEY_FRAME_SIZE", audio.frame_size);
        // The frame math and the WAV upload both assume mono; a stereo stream
        // would halve the silence window and mislabel the upload.
        let channels = env_u32("PARLEY_CHANNELS", audio.channels as u32);
        if channels != 1 {
            warn!(
                requested = channels,
                "multi-channel capture is not supported; using mono"
            );
        }
        audio.channels = 1;

        let mut segmenter = SegmenterConfig::default();
        segmenter.silence_threshold =
            env_f32("PARLEY_SILENCE_THRESHOLD", segmenter.silence_threshold);
        segmenter.silence_secs = env_f32("PARLEY_SILENCE_SECS", segmenter.silence_secs);
        segmenter.max_record_secs = env_f32("PARLEY_MAX_RECORD_SECS", segmenter.max_record_secs);

        let mut sampling = SamplingParams::default();
        sampling.temperature = env_f32("PARLEY_TEMPERATURE", sampling.temperature);
        sampling.top_p = env_f32("PARLEY_TOP_P", sampling.top_p);
        sampling.max_tokens = env_u32("PARLEY_MAX_TOKENS", sampling.max_tokens);

        let mut guardrail = GuardrailConfig::default();
        if let Some(topics) = env_list("PARLEY_BLOCKED_TOPICS") {
            guardrail.blocked_topics = topics;
        }
        if let Some(phrases) = env_list("PARLEY_EXIT_PHRASES") {
            guardrail.exit_phrases = phrases;
        }

        Self {
            audio,
            segmenter,
            data_dir: PathBuf::from(env_string("PARLEY_DATA_DIR", "./data")),
            chunk_size: env_usize("PARLEY_CHUNK_SIZE", 250),
            top_k: env_usize("PARLEY_TOP_K", 3),
            sampling,
            opening_line: env_string("PARLEY_OPENING_LINE", DEFAULT_OPENING_LINE),
            system_prompt: env_string("PARLEY_SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT),
            farewell: env_string("PARLEY_FAREWELL", DEFAULT_FAREWELL),
            input_refusal: DEFAULT_INPUT_REFUSAL.to_string(),
            output_refusal: DEFAULT_OUTPUT_REFUSAL.to_string(),
            apology: DEFAULT_APOLOGY.to_string(),
            guardrail,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            segmenter: SegmenterConfig::default(),
            data_dir: PathBuf::from("./data"),
            chunk_size: 250,
            top_k: 3,
            sampling: SamplingParams::default(),
            opening_line: DEFAULT_OPENING_LINE.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            farewell: DEFAULT_FAREWELL.to_string(),
            input_refusal: DEFAULT_INPUT_REFUSAL.to_string(),
            output_refusal: DEFAULT_OUTPUT_REFUSAL.to_string(),
            apology: DEFAULT_APOLOGY.to_string(),
            guardrail: GuardrailConfig::default(),
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_list(name: &str) -> Option<Vec<String>> {
    let raw = std::env::var(name).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
