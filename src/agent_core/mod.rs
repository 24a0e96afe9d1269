//! Agent Core — repository analysis orchestration.
//!
//! Submodules:
//! - `repo_ref`: Repository identifier parsing (`owner/repo` or URL)
//! - `tool_catalog`: The three tools offered to the model
//! - `tool_router`: Dispatches model tool calls to the collaborators
//! - `summarizer`: Tool-free summary calls (tool + final answer)
//! - `notifier`: Asynchronous "viewed file" event delivery
//! - `driver`: The bounded conversation loop
//! - `types`: Conversation state, outcomes and the analysis report
//! - `errors`: Tool-level and analysis-level error types

pub mod driver;
pub mod errors;
pub mod notifier;
pub mod repo_ref;
pub mod summarizer;
pub mod tool_catalog;
pub mod tool_router;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use driver::{ConversationDriver, DriverOptions, DriverRun, MAX_ITERATIONS};
pub use errors::{AnalysisError, ToolError};
pub use notifier::{ChannelSink, Event, EventEnvelope, EventNotifier, EventSink, NotifyError};
pub use repo_ref::RepositoryRef;
pub use summarizer::ContextSummarizer;
pub use tool_router::ToolDispatcher;
pub use types::{AnalysisOutcome, AnalysisReport, ToolCallRecord, ToolOutcome};
