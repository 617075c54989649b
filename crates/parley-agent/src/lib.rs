//! # Parley Agent — the turn-based conversation engine
//!
//! Wires the voice, retrieval, and guardrail crates into one synchronous
//! call loop:
//!
//! ```text
//! mic ──▶ segment ──▶ transcribe ──▶ guard(in) ──▶ retrieve ──▶ generate
//!                                                                  │
//!                          speaker ◀── synthesize ◀── guard(out) ◀─┘
//! ```
//!
//! Exactly one turn is in flight at a time; the microphone is released while
//! services run, and playback blocks so the agent never hears itself.

pub mod chat;
pub mod config;
pub mod error;
pub mod history;
pub mod orchestrator;

pub use chat::{create_chat, ChatBackend, ChatError, ChatMessage, HttpChat, SamplingParams};
pub use config::AgentConfig;
pub use error::AgentError;
pub use history::{DialogueHistory, DialogueTurn, Role, HISTORY_CAP};
pub use orchestrator::{CallState, TurnOutcome, VoiceSession};
