//! ConversationDriver — the bounded analyze loop.
//!
//! States: INIT → RUNNING ⇄ TOOL_DISPATCH → DONE.
//!
//! 1. **INIT** — fetch the root listing once, seed the history with the
//!    analyzer persona and the prompt, seed the context buffer with the listing
//! 2. **RUNNING** — one chat call per turn with the full history and the tool
//!    catalog; stop when the top choice requests no tools or the ceiling is hit
//! 3. **TOOL_DISPATCH** — execute the requested calls one after another; every
//!    call gets a function-role reply, successful results go to the buffer
//!
//! A failed INIT fetch or chat call aborts the run. A failed tool call never
//! does.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::github::RepositoryHost;
use crate::inference::types::{ChatMessage, ChatOptions};
use crate::inference::ChatBackend;

use super::errors::{AnalysisError, ToolError};
use super::notifier::EventNotifier;
use super::repo_ref::RepositoryRef;
use super::summarizer::ContextSummarizer;
use super::tool_catalog::tool_definitions;
use super::tool_router::ToolDispatcher;
use super::types::{AnalysisOutcome, ConversationState, ToolCallRecord, ToolOutcome};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Hard ceiling on chat turns per analysis.
pub const MAX_ITERATIONS: u32 = 5;

/// System persona of the analysis conversation.
pub const ANALYZER_PERSONA: &str = "You are a repository analyzer. Analyze the repository structure and content using the provided tools. Focus on the user's prompt and find relevant information.";

// ─── Types ──────────────────────────────────────────────────────────────────

/// Knobs of one driver run.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Chat turns allowed; values above [`MAX_ITERATIONS`] are clamped.
    pub max_iterations: u32,
    /// Timeout for each chat, hosting and tool call. `None` waits forever.
    pub call_timeout: Option<Duration>,
    /// Branch, tag or commit to read.
    pub git_ref: Option<String>,
    pub chat: ChatOptions,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            call_timeout: None,
            git_ref: None,
            chat: ChatOptions::default(),
        }
    }
}

/// What a completed (non-fatal) run produced.
#[derive(Debug, Clone)]
pub struct DriverRun {
    /// `Completed`, `IterationLimitReached` or `Cancelled`.
    pub outcome: AnalysisOutcome,
    pub context: String,
    pub turns: u32,
    pub tool_calls: Vec<ToolCallRecord>,
    pub messages: Vec<ChatMessage>,
}

/// Result of racing a collaborator call against cancellation and timeout.
enum Guarded<T> {
    Done(T),
    TimedOut(u64),
    Cancelled,
}

// ─── ConversationDriver ─────────────────────────────────────────────────────

pub struct ConversationDriver<'a> {
    chat: &'a dyn ChatBackend,
    host: &'a dyn RepositoryHost,
    summarizer: &'a ContextSummarizer,
    notifier: &'a EventNotifier,
    options: DriverOptions,
    cancel: CancellationToken,
}

impl<'a> ConversationDriver<'a> {
    pub fn new(
        chat: &'a dyn ChatBackend,
        host: &'a dyn RepositoryHost,
        summarizer: &'a ContextSummarizer,
        notifier: &'a EventNotifier,
    ) -> Self {
        Self {
            chat,
            host,
            summarizer,
            notifier,
            options: DriverOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, mut options: DriverOptions) -> Self {
        options.max_iterations = options.max_iterations.clamp(1, MAX_ITERATIONS);
        self.options = options;
        self
    }

    /// Stop at the next turn boundary or blocking call once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the loop for `repo` and return the accumulated context.
    pub async fn run(&self, repo: &RepositoryRef, prompt: &str) -> Result<DriverRun, AnalysisError> {
        self.host.ensure_credentials()?;

        let git_ref = self.options.git_ref.as_deref();
        let mut state = ConversationState::new();
        let mut records: Vec<ToolCallRecord> = Vec::new();

        // ── INIT ────────────────────────────────────────────────────────────
        let listing = match self
            .guarded(self.host.get_folder(&repo.owner, &repo.name, "", git_ref))
            .await
        {
            Guarded::Done(result) => result?,
            Guarded::TimedOut(secs) => {
                return Err(AnalysisError::Timeout {
                    operation: "root folder listing".into(),
                    secs,
                })
            }
            Guarded::Cancelled => return Ok(finish(state, records, AnalysisOutcome::Cancelled)),
        };

        tracing::info!(repo = %repo, entries = listing.lines().count(), "root listing fetched");

        state.push(ChatMessage::system(ANALYZER_PERSONA));
        state.push(ChatMessage::user(format!(
            "Analyze the following repository structure and provide a summary, focusing on the user's prompt: '{prompt}'\n\nRepository structure:\n{listing}"
        )));
        state.append_raw(&listing);

        let mut dispatcher = ToolDispatcher::new(repo, self.host, self.summarizer, self.notifier)
            .with_git_ref(git_ref);
        if let Some(limit) = self.options.call_timeout {
            dispatcher = dispatcher.with_timeout(limit);
        }

        // ── RUNNING ⇄ TOOL_DISPATCH ─────────────────────────────────────────
        let mut outcome = AnalysisOutcome::IterationLimitReached;

        while state.iteration_count() < self.options.max_iterations {
            if self.cancel.is_cancelled() {
                outcome = AnalysisOutcome::Cancelled;
                break;
            }

            let turn = state.begin_turn();
            let call = self
                .chat
                .chat(state.messages(), Some(tool_definitions()), self.options.chat);
            let response = match self.guarded(call).await {
                Guarded::Done(Ok(response)) => response,
                Guarded::Done(Err(source)) => {
                    tracing::error!(turn, error = %source, "chat completion failed");
                    return Err(AnalysisError::Chat { turn, source });
                }
                Guarded::TimedOut(secs) => {
                    return Err(AnalysisError::Timeout {
                        operation: format!("chat completion (turn {turn})"),
                        secs,
                    })
                }
                Guarded::Cancelled => {
                    outcome = AnalysisOutcome::Cancelled;
                    break;
                }
            };

            let finish_reason = response
                .first()
                .and_then(|c| c.finish_reason.as_deref())
                .unwrap_or("none");
            let Some(choice) = response.first().filter(|c| !c.tool_calls.is_empty()) else {
                tracing::info!(turn, finish_reason, "model requested no tools, analysis complete");
                outcome = AnalysisOutcome::Completed;
                break;
            };

            tracing::debug!(
                turn,
                finish_reason,
                tool_calls = choice.tool_calls.len(),
                "dispatching tool calls"
            );

            let mut replies = Vec::with_capacity(choice.tool_calls.len());
            let mut cancelled = false;

            // After a cancel the remaining calls are not run, but each still
            // gets a placeholder reply.
            for call in &choice.tool_calls {
                let result = if cancelled {
                    Err(ToolError::Cancelled {
                        tool: call.name.clone(),
                    })
                } else {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            cancelled = true;
                            Err(ToolError::Cancelled { tool: call.name.clone() })
                        }
                        result = dispatcher.dispatch_call(call) => result,
                    }
                };

                let call_outcome = match result {
                    Ok(text) => {
                        state.append_tool_output(&call.name, &text);
                        replies.push(ChatMessage::function_reply(&call.name, &call.id, text));
                        ToolOutcome::Success
                    }
                    Err(e) => {
                        tracing::warn!(turn, tool = %call.name, call_id = %call.id, error = %e, "tool call failed");
                        replies.push(ChatMessage::function_reply(
                            &call.name,
                            &call.id,
                            format!("Error: {e}"),
                        ));
                        ToolOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                };
                records.push(ToolCallRecord {
                    turn,
                    call_id: call.id.clone(),
                    tool: call.name.clone(),
                    outcome: call_outcome,
                });
            }

            for reply in replies {
                state.push(reply);
            }
            state.push(ChatMessage::reply(choice.role, choice.content.clone()));

            if cancelled {
                outcome = AnalysisOutcome::Cancelled;
                break;
            }
        }

        if outcome == AnalysisOutcome::IterationLimitReached {
            tracing::info!(
                turns = state.iteration_count(),
                "iteration ceiling reached, stopping analysis"
            );
        }

        Ok(finish(state, records, outcome))
    }

    /// Race `fut` against cancellation and the per-call timeout.
    async fn guarded<F: Future>(&self, fut: F) -> Guarded<F::Output> {
        let timed = async {
            match self.options.call_timeout {
                Some(limit) => tokio::time::timeout(limit, fut)
                    .await
                    .map_err(|_| limit.as_secs()),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Guarded::Cancelled,
            result = timed => match result {
                Ok(value) => Guarded::Done(value),
                Err(secs) => Guarded::TimedOut(secs),
            },
        }
    }
}

fn finish(state: ConversationState, tool_calls: Vec<ToolCallRecord>, outcome: AnalysisOutcome) -> DriverRun {
    let turns = state.iteration_count();
    let messages = state.messages().to_vec();
    DriverRun {
        outcome,
        context: state.into_context(),
        turns,
        tool_calls,
        messages,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
