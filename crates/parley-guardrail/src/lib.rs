//! **Guardrail** — policy gate for text crossing the model boundary.
//!
//! Inbound user text is checked against a blocklist of topic keywords before
//! retrieval or generation runs; outbound model text passes through a rewrite
//! slot so redaction can be added without touching the call site. The matching
//! strategy is deliberately pluggable: the `Verdict` contract stays stable
//! even when keyword matching is replaced by a classifier.

use tracing::debug;

/// Topics refused on the way in. Matched case-insensitively as substrings.
const DEFAULT_BLOCKED_TOPICS: &[&str] = &[
    "violence", "hate", "illegal", "abuse", "drug", "weapon", "bomb", "kill", "suicide",
];

/// Phrases that end the call when present anywhere in the transcript.
const DEFAULT_EXIT_PHRASES: &[&str] = &[
    "quit",
    "exit",
    "bye",
    "goodbye",
    "stop",
    "disconnect",
    "end call",
    "hang up",
    "that's all",
    "nothing else",
];

/// Blocklist and exit-phrase sets. Built once at startup; the agent binary
/// overrides either list from the environment.
#[derive(Debug, Clone)]
pub struct GuardrailConfig {
    /// Inbound text containing any of these (case-insensitive) is refused.
    pub blocked_topics: Vec<String>,
    /// Transcripts containing any of these end the session.
    pub exit_phrases: Vec<String>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            blocked_topics: DEFAULT_BLOCKED_TOPICS.iter().map(|s| s.to_string()).collect(),
            exit_phrases: DEFAULT_EXIT_PHRASES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Outcome of a guardrail check.
///
/// For inbound checks `detail` is the matched topic keyword (empty when
/// allowed). For outbound checks `detail` is the text to speak, possibly
/// rewritten by the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub detail: String,
}

/// The guardrail filter. Cheap to construct, no state beyond its config.
#[derive(Debug, Clone)]
pub struct Guardrail {
    config: GuardrailConfig,
}

impl Guardrail {
    pub fn new(config: GuardrailConfig) -> Self {
        Self { config }
    }

    /// Check user text before it reaches retrieval or the model.
    /// The first matching blocklist keyword is reported as the reason.
    pub fn check_input(&self, text: &str) -> Verdict {
        let lowered = text.to_lowercase();
        for topic in &self.config.blocked_topics {
            if lowered.contains(topic.to_lowercase().as_str()) {
                debug!(topic = %topic, "inbound text blocked");
                return Verdict {
                    allowed: false,
                    detail: topic.clone(),
                };
            }
        }
        Verdict {
            allowed: true,
            detail: String::new(),
        }
    }

    /// Check model text before it is spoken. Currently a pass-through that
    /// returns the text unchanged; rewrites (e.g. PII redaction) slot in here.
    pub fn check_output(&self, text: &str) -> Verdict {
        Verdict {
            allowed: true,
            detail: text.to_string(),
        }
    }

    /// Whether the transcript contains an exit phrase (case-insensitive
    /// substring membership, matching the transcript as spoken).
    pub fn is_exit(&self, transcript: &str) -> bool {
        let lowered = transcript.to_lowercase();
        self.config
            .exit_phrases
            .iter()
            .any(|p| lowered.contains(p.to_lowercase().as_str()))
    }
}

impl Default for Guardrail {
    fn default() -> Self {
        Self::new(GuardrailConfig::default())
    }
}
