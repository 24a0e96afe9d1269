//! Hosting API error types.

use thiserror::Error;

/// Errors returned by a [`RepositoryHost`](super::RepositoryHost).
#[derive(Debug, Error)]
pub enum HostError {
    /// No credential was configured. Raised before any request is built and
    /// surfaced verbatim to the caller of `analyze`.
    #[error(
        "GitHub token is not configured. Set github.token to a personal access token with repo scope"
    )]
    CredentialMissing,

    /// The path does not exist in the repository (or the repository is not
    /// visible with the configured token).
    #[error("not found: '{path}'")]
    NotFound { path: String },

    /// The API answered with a body we could not interpret.
    #[error("decode error: {reason}")]
    Decode { reason: String },

    /// Connection, TLS or timeout failure.
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// Any other non-2xx status.
    #[error("GitHub API request failed with status {status}: {body}")]
    Http { status: u16, body: String },
}
