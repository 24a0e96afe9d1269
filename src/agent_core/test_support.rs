//! Scripted collaborators shared by the agent core tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::github::{HostError, RepositoryHost};
use crate::inference::types::{ChatChoice, ChatResponse, Role, ToolCall, ToolDefinition};
use crate::inference::{ChatBackend, ChatMessage, ChatOptions, InferenceError};

use super::notifier::{Event, EventEnvelope, EventSink, NotifyError};

/// One scripted chat reply.
pub enum Reply {
    Respond(ChatResponse),
    Fail,
    /// Never answers.
    Hang,
}

/// Plays back a script of replies; the last one repeats forever.
pub struct ScriptedChat {
    script: Vec<Reply>,
    calls: Mutex<Vec<(Vec<ChatMessage>, bool)>>,
}

impl ScriptedChat {
    pub fn new(script: Vec<Reply>) -> Self {
        assert!(!script.is_empty(), "script needs at least one reply");
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// History sent with the `n`-th (0-based) call.
    pub fn messages_of(&self, n: usize) -> Vec<ChatMessage> {
        self.calls.lock().unwrap()[n].0.clone()
    }

    pub fn had_tools(&self, n: usize) -> bool {
        self.calls.lock().unwrap()[n].1
    }
}

#[async_trait]
impl ChatBackend for ScriptedChat {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        _options: ChatOptions,
    ) -> Result<ChatResponse, InferenceError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((messages.to_vec(), tools.is_some()));
            calls.len() - 1
        };
        match &self.script[n.min(self.script.len() - 1)] {
            Reply::Respond(response) => Ok(response.clone()),
            Reply::Hang => std::future::pending().await,
            Reply::Fail => Err(InferenceError::HttpError {
                status: 401,
                body: "invalid api key".into(),
            }),
        }
    }
}

/// An assistant reply requesting `calls`, given as `(name, raw arguments)`.
pub fn tool_reply(text: &str, calls: &[(&str, &str)]) -> Reply {
    let tool_calls = calls
        .iter()
        .enumerate()
        .map(|(i, (name, args))| ToolCall::new(format!("call_{i}"), *name, *args))
        .collect();
    Reply::Respond(ChatResponse {
        choices: vec![ChatChoice {
            role: Role::Assistant,
            content: text.to_string(),
            tool_calls,
            finish_reason: Some("tool_calls".into()),
        }],
    })
}

/// An assistant reply without tool calls.
pub fn text_reply(text: &str) -> Reply {
    tool_reply(text, &[])
}

/// In-memory repository. Files are served from `files`; every folder lists
/// as `"<path>/ (dir)"` except the root, which lists `root`. Reads of a path
/// in `stalled` never finish.
pub struct ScriptedHost {
    pub root: String,
    pub files: Vec<(String, String)>,
    pub credential: bool,
    pub fail_root: bool,
    pub stalled: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedHost {
    pub fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            files: Vec::new(),
            credential: true,
            fail_root: false,
            stalled: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.to_string()));
        self
    }

    pub fn with_stalled(mut self, path: &str) -> Self {
        self.stalled.push(path.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryHost for ScriptedHost {
    fn ensure_credentials(&self) -> Result<(), HostError> {
        if self.credential {
            Ok(())
        } else {
            Err(HostError::CredentialMissing)
        }
    }

    async fn get_file(
        &self,
        _owner: &str,
        _name: &str,
        path: &str,
        _git_ref: Option<&str>,
    ) -> Result<String, HostError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_credentials()?;
        if self.stalled.iter().any(|p| p == path) {
            std::future::pending::<()>().await;
        }
        self.files
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| HostError::NotFound { path: path.into() })
    }

    async fn get_folder(
        &self,
        _owner: &str,
        _name: &str,
        path: &str,
        _git_ref: Option<&str>,
    ) -> Result<String, HostError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_credentials()?;
        if path.is_empty() {
            if self.fail_root {
                return Err(HostError::Transport {
                    reason: "connection reset".into(),
                });
            }
            return Ok(self.root.clone());
        }
        Ok(format!("{path}/ (dir)\n"))
    }
}

/// Records every event it receives.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, envelope: &EventEnvelope) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(envelope.event().clone());
        Ok(())
    }
}
