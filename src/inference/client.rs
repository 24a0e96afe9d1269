//! OpenAI-compatible inference client.
//!
//! Sends non-streaming chat completion requests to the configured endpoint
//! and walks the fallback chain when the primary model is unavailable.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use crate::config::LlmConfig;

use super::errors::InferenceError;
use super::response::parse_chat_response;
use super::types::{ChatCompletionRequest, ChatMessage, ChatOptions, ChatResponse, ToolDefinition};

// ─── ChatBackend ─────────────────────────────────────────────────────────────

/// The chat collaborator the agent loop talks to.
///
/// `tools` is `None` for tool-free calls (summaries). Implementations must be
/// shareable across concurrent analyses.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        options: ChatOptions,
    ) -> Result<ChatResponse, InferenceError>;
}

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// HTTP client for an OpenAI-compatible chat completions endpoint.
///
/// Holds no per-request state, so one instance can serve any number of
/// concurrent analyses.
pub struct InferenceClient {
    http: HttpClient,
    config: LlmConfig,
}

impl InferenceClient {
    /// Build the client. Does NOT check connectivity; that happens on the
    /// first request.
    pub fn from_config(config: LlmConfig) -> Result<Self, InferenceError> {
        let http = HttpClient::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, config })
    }

    /// Primary model followed by the fallback chain, without duplicates.
    fn model_chain(&self) -> Vec<&str> {
        let mut chain = vec![self.config.model.as_str()];
        for model in &self.config.fallback_models {
            if !chain.contains(&model.as_str()) {
                chain.push(model.as_str());
            }
        }
        chain
    }

    /// Send one request to one model.
    async fn try_request(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        options: ChatOptions,
    ) -> Result<ChatResponse, InferenceError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let body = ChatCompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            tools: tools.map(<[ToolDefinition]>::to_vec),
            tool_choice: tools.map(|_| "auto".to_string()),
            temperature: options.temperature.unwrap_or(self.config.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
            stream: false,
        };

        tracing::debug!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            tool_count = body.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "chat completion request"
        );

        let mut request = self.http.post(&url).json(&body);
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: self.config.request_timeout_secs,
                }
            } else {
                InferenceError::ConnectionFailed {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| InferenceError::ResponseError {
                reason: format!("failed to read response body: {e}"),
            })?;

        parse_chat_response(&body_text)
    }
}

#[async_trait]
impl ChatBackend for InferenceClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        options: ChatOptions,
    ) -> Result<ChatResponse, InferenceError> {
        let mut attempted = Vec::new();

        for model in self.model_chain() {
            match self.try_request(model, messages, tools, options).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retriable() => {
                    tracing::warn!(model, error = %e, "model unavailable, trying next in chain");
                    attempted.push(model.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        Err(InferenceError::AllModelsUnavailable { attempted })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
