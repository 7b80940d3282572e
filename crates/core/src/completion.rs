//! CompletionClient trait: the abstraction over the language-model backend.
//!
//! A client knows how to send an ordered message list to a chat-completion
//! endpoint and hand back the first choice's text, or a classified failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::CompletionError;
use crate::message::ChatMessage;

/// Fixed generation parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// The model to use (e.g., "qwen/qwen-2.5-coder:free")
    pub model: String,

    /// Sampling temperature, kept low for code help
    pub temperature: f32,

    /// Upper bound on generated tokens
    pub max_tokens: u32,

    /// Nucleus sampling cutoff
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: "qwen/qwen-2.5-coder:free".into(),
            temperature: 0.15,
            max_tokens: 900,
            top_p: 0.9,
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub params: GenerationParams,

    /// Ordered context: system directive, history, new user input
    pub messages: Vec<ChatMessage>,
}

/// A successful completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// First choice's message content, never empty
    pub content: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Token usage statistics, when the service reports them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The completion-service seam.
///
/// The router calls `complete()` without knowing which backend answers.
/// Test doubles implement this trait with scripted results.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// A human-readable name for this client (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send the request and wait for the complete answer.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError>;

    /// Health check: can we reach the service?
    async fn health_check(&self) -> std::result::Result<bool, CompletionError> {
        Ok(true)
    }
}
