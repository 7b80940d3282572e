//! OpenAI-compatible completion client.
//!
//! Works with: OpenRouter, OpenAI, Ollama, vLLM, Together AI, and any
//! endpoint exposing `/chat/completions` in the OpenAI wire format.
//!
//! Every failure is classified into [`CompletionError`]:
//! - connect / timeout / read errors → `Transport`
//! - non-2xx status → `Service { status, body }`
//! - 2xx without usable text → `EmptyResponse`

use std::time::Duration;

use async_trait::async_trait;
use chatrelay_config::CompletionConfig;
use chatrelay_core::completion::*;
use chatrelay_core::error::CompletionError;
use chatrelay_core::message::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Longest error body kept in a `Service` failure.
const MAX_ERROR_BODY_CHARS: usize = 500;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// An OpenAI-compatible completion client.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new client with a whole-request timeout.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Build from the `[completion]` config section.
    pub fn from_config(config: &CompletionConfig, api_key: &str) -> Result<Self, CompletionError> {
        let name = if config.api_url.contains("openrouter.ai") {
            "openrouter"
        } else {
            "openai_compat"
        };
        Self::new(
            name,
            config.api_url.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Convert our context messages to the wire format.
    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::System => "system".into(),
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                },
                content: Some(m.content.clone()),
            })
            .collect()
    }

    /// Build the JSON request body.
    fn request_body(request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": request.params.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.params.temperature,
            "max_tokens": request.params.max_tokens,
            "top_p": request.params.top_p,
        })
    }

    /// Extract the first choice's text from a 2xx body.
    fn parse_success(body: &str) -> Result<CompletionResponse, CompletionError> {
        let api_response: ApiResponse = serde_json::from_str(body).map_err(|e| {
            warn!(error = %e, "Unparseable completion response");
            CompletionError::EmptyResponse
        })?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse)?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse {
            content,
            model: api_response.model.unwrap_or_default(),
            usage,
        })
    }
}

/// Cut an error body down to a short diagnostic.
fn snippet(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    cut.push_str("...");
    cut
}

fn transport_error(e: reqwest::Error) -> CompletionError {
    if e.is_timeout() {
        CompletionError::Transport("request timed out".into())
    } else if e.is_connect() {
        CompletionError::Transport(format!("connection failed: {e}"))
    } else {
        CompletionError::Transport(e.to_string())
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            client = %self.name,
            model = %request.params.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Completion service returned error");
            return Err(CompletionError::Service {
                status: status.as_u16(),
                body: snippet(&text),
            });
        }

        let parsed = Self::parse_success(&text)?;
        debug!(
            model = %parsed.model,
            total_tokens = parsed.usage.map(|u| u.total_tokens),
            "Completion received"
        );
        Ok(parsed)
    }

    async fn health_check(&self) -> std::result::Result<bool, CompletionError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
