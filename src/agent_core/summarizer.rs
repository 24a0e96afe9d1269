//! ContextSummarizer — single-shot, tool-free chat calls.
//!
//! Two call sites share it:
//! - `summarize`: the `generate_summary` tool; errors propagate to the dispatcher
//! - `finalize`: the last step of an analysis; errors become a fixed fallback text

use std::sync::Arc;
use std::time::Duration;

use crate::inference::{ChatBackend, ChatMessage, ChatOptions, InferenceError};

/// Persona for ad-hoc content summaries.
pub const SUMMARIZER_PERSONA: &str =
    "You are a helpful assistant that summarizes content. Provide concise summaries.";

/// Persona for compressing the accumulated repository context.
pub const CONTEXT_SUMMARIZER_PERSONA: &str = "You are a helpful assistant that summarizes repository contexts. Provide concise summaries focusing on the user's prompt.";

/// Returned by [`ContextSummarizer::finalize`] when the chat call fails.
pub const FINALIZE_FALLBACK: &str = "Error occurred while summarizing the context";

/// Returned by [`ContextSummarizer::finalize`] when the model produced no choice.
pub const NO_SUMMARY: &str = "No summary generated";

pub struct ContextSummarizer {
    chat: Arc<dyn ChatBackend>,
    options: ChatOptions,
    timeout: Option<Duration>,
}

impl ContextSummarizer {
    pub fn new(chat: Arc<dyn ChatBackend>) -> Self {
        Self {
            chat,
            options: ChatOptions::default(),
            timeout: None,
        }
    }

    /// Bound every summary call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Summarize arbitrary text. Fails when the call fails or yields no choice.
    pub async fn summarize(&self, text: &str) -> Result<String, InferenceError> {
        let messages = [
            ChatMessage::system(SUMMARIZER_PERSONA),
            ChatMessage::user(format!("Please summarize the following content:\n\n{text}")),
        ];

        let response = self.call(&messages).await?;
        response
            .first()
            .map(|choice| choice.content.clone())
            .ok_or(InferenceError::EmptyChoices)
    }

    /// Compress the context buffer into an answer focused on `prompt`.
    ///
    /// Never fails: a failed call yields [`FINALIZE_FALLBACK`].
    pub async fn finalize(&self, context: &str, prompt: &str) -> String {
        let messages = [
            ChatMessage::system(CONTEXT_SUMMARIZER_PERSONA),
            ChatMessage::user(format!(
                "Please summarize the following repository context, focusing on the user's prompt: '{prompt}'\n\n{context}"
            )),
        ];

        match self.call(&messages).await {
            Ok(response) => match response.first() {
                Some(choice) => choice.content.clone(),
                None => NO_SUMMARY.to_string(),
            },
            Err(e) => {
                tracing::warn!(error = %e, "context summarization failed, using fallback");
                FINALIZE_FALLBACK.to_string()
            }
        }
    }

    async fn call(
        &self,
        messages: &[ChatMessage],
    ) -> Result<crate::inference::ChatResponse, InferenceError> {
        let call = self.chat.chat(messages, None, self.options);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| InferenceError::Timeout {
                    duration_secs: limit.as_secs(),
                })?,
            None => call.await,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::{ChatChoice, ChatResponse, ToolDefinition};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with a fixed text (or fails) and records what it was sent.
    struct FixedChat {
        reply: Option<String>,
        seen: Mutex<Vec<(Vec<ChatMessage>, bool)>>,
    }

    impl FixedChat {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(text.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for FixedChat {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            tools: Option<&[ToolDefinition]>,
            _options: ChatOptions,
        ) -> Result<ChatResponse, InferenceError> {
            self.seen
                .lock()
                .unwrap()
                .push((messages.to_vec(), tools.is_some()));
            match &self.reply {
                Some(text) => Ok(ChatResponse {
                    choices: vec![ChatChoice {
                        content: text.clone(),
                        ..ChatChoice::default()
                    }],
                }),
                None => Err(InferenceError::HttpError {
                    status: 401,
                    body: "invalid api key".into(),
                }),
            }
        }
    }

    struct EmptyChat;

    #[async_trait]
    impl ChatBackend for EmptyChat {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: Option<&[ToolDefinition]>,
            _options: ChatOptions,
        ) -> Result<ChatResponse, InferenceError> {
            Ok(ChatResponse::default())
        }
    }

    #[tokio::test]
    async fn test_summarize_is_tool_free() {
        let chat = FixedChat::replying("short");
        let summarizer = ContextSummarizer::new(chat.clone());

        assert_eq!(summarizer.summarize("long text").await.unwrap(), "short");

        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (messages, had_tools) = &seen[0];
        assert!(!had_tools);
        assert_eq!(messages[0].content, SUMMARIZER_PERSONA);
        assert!(messages[1].content.ends_with("long text"));
    }

    #[tokio::test]
    async fn test_summarize_propagates_errors() {
        let summarizer = ContextSummarizer::new(FixedChat::failing());
        assert!(summarizer.summarize("x").await.is_err());

        let summarizer = ContextSummarizer::new(Arc::new(EmptyChat));
        assert!(matches!(
            summarizer.summarize("x").await,
            Err(InferenceError::EmptyChoices)
        ));
    }

    #[tokio::test]
    async fn test_finalize_falls_back_on_failure() {
        let summarizer = ContextSummarizer::new(FixedChat::failing());
        let text = summarizer.finalize("context", "prompt").await;
        assert_eq!(text, "Error occurred while summarizing the context");
    }

    #[tokio::test]
    async fn test_finalize_without_choices() {
        let summarizer = ContextSummarizer::new(Arc::new(EmptyChat));
        assert_eq!(summarizer.finalize("c", "p").await, NO_SUMMARY);
    }

    #[tokio::test]
    async fn test_finalize_embeds_prompt_and_context() {
        let chat = FixedChat::replying("answer");
        let summarizer = ContextSummarizer::new(chat.clone());
        assert_eq!(summarizer.finalize("src (dir)\n", "where is main?").await, "answer");

        let seen = chat.seen.lock().unwrap();
        let user = &seen[0].0[1].content;
        assert!(user.contains("'where is main?'"));
        assert!(user.ends_with("src (dir)\n"));
        assert_eq!(seen[0].0[0].content, CONTEXT_SUMMARIZER_PERSONA);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalize_times_out_to_fallback() {
        struct SlowChat;

        #[async_trait]
        impl ChatBackend for SlowChat {
            async fn chat(
                &self,
                _messages: &[ChatMessage],
                _tools: Option<&[ToolDefinition]>,
                _options: ChatOptions,
            ) -> Result<ChatResponse, InferenceError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ChatResponse::default())
            }
        }

        let summarizer = ContextSummarizer::new(Arc::new(SlowChat)).with_timeout(Duration::from_secs(5));
        assert_eq!(summarizer.finalize("c", "p").await, FINALIZE_FALLBACK);
    }
}
