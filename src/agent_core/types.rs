//! Shared types for the agent core.
//!
//! Per-invocation conversation state, per-call outcome records and the
//! analysis report returned to callers.

use serde::Serialize;

use crate::inference::types::ChatMessage;

use super::repo_ref::RepositoryRef;

// ─── Conversation State ─────────────────────────────────────────────────────

/// State of one analysis. Created per invocation and dropped when it
/// returns. History and context buffer are append-only.
#[derive(Debug, Default)]
pub struct ConversationState {
    messages: Vec<ChatMessage>,
    iteration_count: u32,
    context: String,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Append raw text (the seed listing).
    pub fn append_raw(&mut self, text: &str) {
        self.context.push_str(text);
    }

    /// Append one tool result, labeled by the tool that produced it.
    pub fn append_tool_output(&mut self, tool: &str, text: &str) {
        self.context.push_str(tool);
        self.context.push_str(":\n");
        self.context.push_str(text);
        self.context.push_str("\n\n");
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn into_context(self) -> String {
        self.context
    }

    /// Count a chat turn and return its 1-based number.
    pub fn begin_turn(&mut self) -> u32 {
        self.iteration_count += 1;
        self.iteration_count
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }
}

// ─── Outcomes ───────────────────────────────────────────────────────────────

/// Result of one dispatched tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success,
    Failed { reason: String },
}

/// Record of one tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCallRecord {
    pub turn: u32,
    pub call_id: String,
    pub tool: String,
    pub outcome: ToolOutcome,
}

impl ToolCallRecord {
    pub fn succeeded(&self) -> bool {
        self.outcome == ToolOutcome::Success
    }
}

/// Why an analysis stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// The model stopped requesting tools.
    Completed,
    /// The turn ceiling was reached while the model still requested tools.
    IterationLimitReached,
    /// The caller cancelled the run.
    Cancelled,
    /// A fatal error aborted the run.
    Failed { reason: String },
}

/// Everything an analysis produced.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub repository: RepositoryRef,
    pub outcome: AnalysisOutcome,
    /// Final, prompt-focused answer (or the descriptive error text).
    pub summary: String,
    /// Raw context buffer the summary was compressed from.
    pub context: String,
    pub turns: u32,
    pub tool_calls: Vec<ToolCallRecord>,
}
