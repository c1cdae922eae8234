//! OpenAI-compatible chat-completion adapter.
//!
//! Talks to `POST {base_url}/v1/chat/completions`, so any server speaking the
//! OpenAI chat API (hosted, Azure, local) works.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CompletionRequest, LlmConfig, PromptMessage};
use crate::domain::ports::TextGenerator;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("API key not set. Set OPENAI_API_KEY or configure llm.api_key")]
    MissingApiKey,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse completion response: {0}")]
    InvalidResponse(String),
}

impl From<GeneratorError> for DomainError {
    fn from(err: GeneratorError) -> Self {
        DomainError::GenerationFailed(err.to_string())
    }
}

/// Chat-completion generator backed by an OpenAI-compatible HTTP API.
pub struct OpenAiChatGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiChatGenerator {
    /// Build a generator from the `llm` config section. The HTTP timeout is
    /// the only bound on generation latency.
    pub fn new(config: &LlmConfig) -> Result<Self, GeneratorError> {
        let api_key = config.resolved_api_key().ok_or(GeneratorError::MissingApiKey)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(GeneratorError::ClientBuild)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn call_chat_api(&self, request: CompletionRequest) -> Result<String, GeneratorError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(GeneratorError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(GeneratorError::Api { status: status.as_u16(), body });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::InvalidResponse(e.to_string()))?;

        // A missing choice or null content is an empty completion, not an error.
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl TextGenerator for OpenAiChatGenerator {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> DomainResult<String> {
        let message_count = request.messages.len();
        let text = self.call_chat_api(request).await.map_err(|e| {
            tracing::warn!(model = %self.model, error = %e, "chat completion failed");
            DomainError::from(e)
        })?;
        tracing::debug!(model = %self.model, message_count, reply_len = text.len(), "chat completion finished");
        Ok(text)
    }
}

// -- OpenAI API request/response types --

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
