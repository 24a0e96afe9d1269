//! Chat completion response parsing.
//!
//! Reduces an OpenAI-compatible response body to a [`ChatResponse`]. Tool
//! call arguments are carried through as raw text; they are only decoded
//! when the call is dispatched.

use serde::Deserialize;
use uuid::Uuid;

use super::errors::InferenceError;
use super::types::{ChatChoice, ChatResponse, Role, ToolCall, ToolCallResponse};

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallResponse>>,
}

/// Parse a non-streaming chat completion body.
///
/// An empty `choices` array is not an error here: the agent loop treats it
/// as "no tool calls" and the summarizer reports it itself.
pub fn parse_chat_response(body: &str) -> Result<ChatResponse, InferenceError> {
    let wire: WireResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::ResponseError {
            reason: format!("failed to parse chat completion: {e}"),
        })?;

    let choices = wire
        .choices
        .into_iter()
        .map(|choice| ChatChoice {
            role: choice.message.role.unwrap_or_default(),
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| ToolCall {
                    id: tc
                        .id
                        .filter(|id| !id.is_empty())
                        .unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
                    name: tc.function.name,
                    arguments: tc.function.arguments,
                })
                .collect(),
            finish_reason: choice.finish_reason,
        })
        .collect();

    Ok(ChatResponse { choices })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
