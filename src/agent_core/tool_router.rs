//! ToolDispatcher — executes one model tool call against the collaborators.
//!
//! Each call is decoded, routed by name and executed:
//! - `view_file` → hosting file read, then a "viewed file" notification
//! - `view_folder` → hosting folder listing
//! - `generate_summary` → tool-free summary chat call
//!
//! Failures are returned as [`ToolError`]s; the driver decides what to tell
//! the model about them.

use std::collections::HashMap;
use std::time::Duration;

use crate::github::RepositoryHost;
use crate::inference::types::ToolCall;

use super::errors::ToolError;
use super::notifier::EventNotifier;
use super::repo_ref::RepositoryRef;
use super::summarizer::ContextSummarizer;
use super::tool_catalog::{GENERATE_SUMMARY, VIEW_FILE, VIEW_FOLDER};

/// Tool arguments: a flat mapping of string keys to string values.
pub type ToolArguments = HashMap<String, String>;

/// Routes tool calls for one analysis of one repository.
pub struct ToolDispatcher<'a> {
    repo: &'a RepositoryRef,
    git_ref: Option<&'a str>,
    host: &'a dyn RepositoryHost,
    summarizer: &'a ContextSummarizer,
    notifier: &'a EventNotifier,
    timeout: Option<Duration>,
}

impl<'a> ToolDispatcher<'a> {
    pub fn new(
        repo: &'a RepositoryRef,
        host: &'a dyn RepositoryHost,
        summarizer: &'a ContextSummarizer,
        notifier: &'a EventNotifier,
    ) -> Self {
        Self {
            repo,
            git_ref: None,
            host,
            summarizer,
            notifier,
            timeout: None,
        }
    }

    /// Read files and folders at this branch, tag or commit.
    pub fn with_git_ref(mut self, git_ref: Option<&'a str>) -> Self {
        self.git_ref = git_ref;
        self
    }

    /// Bound each dispatch by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Dispatch a tool call as returned by the model.
    pub async fn dispatch_call(&self, call: &ToolCall) -> Result<String, ToolError> {
        self.dispatch(&call.name, &call.arguments).await
    }

    /// Decode `raw_arguments` and execute `tool_name`.
    pub async fn dispatch(&self, tool_name: &str, raw_arguments: &str) -> Result<String, ToolError> {
        let args = decode_arguments(tool_name, raw_arguments)?;

        let run = self.execute(tool_name, &args);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| ToolError::Timeout {
                    tool: tool_name.to_string(),
                    secs: limit.as_secs(),
                })?,
            None => run.await,
        }
    }

    async fn execute(&self, tool_name: &str, args: &ToolArguments) -> Result<String, ToolError> {
        let host_err = |source| ToolError::Host {
            tool: tool_name.to_string(),
            source,
        };

        match tool_name {
            VIEW_FILE => {
                let path = required(tool_name, args, "path")?;
                let content = self
                    .host
                    .get_file(&self.repo.owner, &self.repo.name, path, self.git_ref)
                    .await
                    .map_err(host_err)?;
                self.notifier.notify(path);
                Ok(content)
            }
            VIEW_FOLDER => {
                let path = required(tool_name, args, "path")?;
                self.host
                    .get_folder(&self.repo.owner, &self.repo.name, path, self.git_ref)
                    .await
                    .map_err(host_err)
            }
            GENERATE_SUMMARY => {
                let content = required(tool_name, args, "content")?;
                self.summarizer
                    .summarize(content)
                    .await
                    .map_err(|source| ToolError::Summary { source })
            }
            other => Err(ToolError::UnknownTool {
                name: other.to_string(),
            }),
        }
    }
}

// ─── Free Functions ─────────────────────────────────────────────────────────

/// Decode raw JSON arguments into a flat string map.
pub fn decode_arguments(tool_name: &str, raw: &str) -> Result<ToolArguments, ToolError> {
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
        tool: tool_name.to_string(),
        reason: e.to_string(),
    })
}

fn required<'v>(tool: &str, args: &'v ToolArguments, name: &str) -> Result<&'v str, ToolError> {
    args.get(name)
        .map(String::as_str)
        .ok_or_else(|| ToolError::MissingArgument {
            tool: tool.to_string(),
            argument: name.to_string(),
        })
}

// ─── Tests ──────────────────────────────────────────────────────────────────
