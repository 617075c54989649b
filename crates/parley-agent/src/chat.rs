//! Chat completion backend: role-tagged messages in, one reply out.
//!
//! The HTTP implementation speaks the OpenAI-compatible `chat/completions`
//! contract. The session never lets a backend failure reach the caller's
//! ears; it substitutes a fixed apology instead.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("chat configuration error: {0}")]
    Config(String),

    #[error("chat request failed: {0}")]
    Request(String),

    #[error("chat api error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("chat response contained no content")]
    EmptyResponse,
}

/// One role-tagged message in the prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Fixed sampling parameters for reply generation. Low temperature keeps the
/// tone consistent; the token cap keeps replies short enough to speak.
#[derive(Debug, Clone)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_p: 0.9,
            max_tokens: 150,
        }
    }
}

/// Backend that generates one reply from the assembled prompt.
pub trait ChatBackend: Send + Sync {
    fn complete(&self, messages: &[ChatMessage], params: &SamplingParams)
        -> Result<String, ChatError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// OpenAI-compatible chat completion client.
#[derive(Debug, Clone)]
pub struct HttpChat {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    client: reqwest::blocking::Client,
}

impl HttpChat {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ChatError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ChatError::Config(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// Build from environment: `PARLEY_CHAT_API_URL`, `PARLEY_CHAT_API_KEY`,
    /// `PARLEY_CHAT_MODEL`.
    pub fn from_env() -> Result<Self, ChatError> {
        let base_url = std::env::var("PARLEY_CHAT_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("PARLEY_CHAT_API_KEY")
            .map_err(|_| ChatError::Config("PARLEY_CHAT_API_KEY not set".to_string()))?;
        let model =
            std::env::var("PARLEY_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Self::new(base_url, api_key, model)
    }
}

impl ChatBackend for HttpChat {
    fn complete(
        &self,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<String, ChatError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| ChatError::Request(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().unwrap_or_default();
            return Err(ChatError::Api { status, body });
        }
        let parsed: ChatResponse = res.json().map_err(|e| ChatError::Request(e.to_string()))?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(ChatError::EmptyResponse)?;
        Ok(content)
    }
}

/// Placeholder chat for running the loop without a model service.
#[derive(Debug, Default)]
pub struct PlaceholderChat;

impl ChatBackend for PlaceholderChat {
    fn complete(
        &self,
        messages: &[ChatMessage],
        _params: &SamplingParams,
    ) -> Result<String, ChatError> {
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");
        Ok(format!("[chat placeholder] I heard: {}", last))
    }
}

/// Best available chat backend from the environment: HTTP when a key is
/// configured, otherwise the placeholder.
pub fn create_chat() -> Box<dyn ChatBackend> {
    match HttpChat::from_env() {
        Ok(http) => Box::new(http),
        Err(_) => Box::new(PlaceholderChat),
    }
}
