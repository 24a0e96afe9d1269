//! Inference error types.
//!
//! Variants carry the endpoint, status or reason needed for a useful log line;
//! logging itself happens at the call site.

use thiserror::Error;

/// Errors that can occur during a chat completion call.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the model endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The model endpoint did not respond within the configured timeout.
    #[error("inference timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Non-2xx HTTP response from the model endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be read or decoded.
    #[error("malformed response: {reason}")]
    ResponseError { reason: String },

    /// The endpoint answered but produced no choice to read from.
    #[error("no choices in chat completion response")]
    EmptyChoices,

    /// Every model in the fallback chain failed with a retriable error.
    #[error("all models unavailable (tried: {})", attempted.join(", "))]
    AllModelsUnavailable { attempted: Vec<String> },
}

impl InferenceError {
    /// Whether this failure may succeed against another model in the chain.
    ///
    /// HTTP 404 is included because OpenAI-compatible gateways answer 404
    /// for a model that is not deployed; 429 because rate limits are per model.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            InferenceError::ConnectionFailed { .. }
                | InferenceError::Timeout { .. }
                | InferenceError::HttpError { status: 404, .. }
                | InferenceError::HttpError { status: 429, .. }
                | InferenceError::HttpError { status: 500, .. }
                | InferenceError::HttpError { status: 502..=504, .. }
        )
    }
}
