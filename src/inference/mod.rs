//! Inference Client — OpenAI-compatible chat completions.
//!
//! This module handles all communication with the model endpoint:
//! - Non-streaming chat completions with optional tool catalogs
//! - Response parsing into choices and raw tool calls
//! - Fallback chain management across configured models
//!
//! The agent loop only sees the [`ChatBackend`] trait, so tests and
//! alternative providers can stand in for the HTTP client.

pub mod client;
pub mod errors;
pub mod response;
pub mod types;

// Re-exports for convenience
pub use client::{ChatBackend, InferenceClient};
pub use errors::InferenceError;
pub use types::{ChatChoice, ChatMessage, ChatOptions, ChatResponse, Role, ToolCall, ToolDefinition};
