//! Agent Core error types.

use thiserror::Error;

use crate::github::HostError;
use crate::inference::InferenceError;

/// Failure of a single tool call. Never aborts an analysis: the driver
/// records it and answers the model with a placeholder reply.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments were not a flat JSON object of strings.
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// A required argument was absent.
    #[error("missing argument '{argument}' for '{tool}'")]
    MissingArgument { tool: String, argument: String },

    /// The model asked for a tool that is not in the catalog.
    #[error("unknown tool: '{name}'")]
    UnknownTool { name: String },

    /// The hosting API call behind the tool failed.
    #[error("'{tool}' failed: {source}")]
    Host { tool: String, source: HostError },

    /// The summary chat call behind `generate_summary` failed.
    #[error("summary failed: {source}")]
    Summary { source: InferenceError },

    /// The call did not finish within the per-call timeout.
    #[error("'{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// The analysis was cancelled before the call finished.
    #[error("'{tool}' cancelled before completion")]
    Cancelled { tool: String },
}

/// Failure that aborts a whole analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The identifier was neither `owner/repo` nor a repository URL.
    #[error("Invalid repository format. Expected 'owner/repo' or a valid GitHub URL.")]
    InvalidRepository,

    /// The hosting credential is missing; the message is shown verbatim.
    #[error("{0}")]
    Credential(HostError),

    /// The initial root listing could not be fetched.
    #[error("error viewing root folder: {source}")]
    RootListing { source: HostError },

    /// A chat call of the conversation loop failed.
    #[error("chat completion failed on turn {turn}: {source}")]
    Chat { turn: u32, source: InferenceError },

    /// A blocking collaborator call exceeded the per-call timeout.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },
}

impl From<HostError> for AnalysisError {
    fn from(e: HostError) -> Self {
        match e {
            HostError::CredentialMissing => AnalysisError::Credential(e),
            other => AnalysisError::RootListing { source: other },
        }
    }
}
