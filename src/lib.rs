pub mod agent_core;
pub mod config;
pub mod github;
pub mod inference;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use agent_core::repo_ref::parse_with_hosts;
use agent_core::{
    AnalysisError, AnalysisOutcome, AnalysisReport, ContextSummarizer, ConversationDriver,
    DriverOptions, EventNotifier, EventSink,
};
use config::{AnalysisConfig, AppConfig, LoggingConfig};
use github::{GitHubClient, HostError, RepositoryHost};
use inference::{ChatBackend, ChatOptions, InferenceClient, InferenceError};

/// Filter used when neither `RUST_LOG` nor `logging.filter` is set.
pub const DEFAULT_LOG_FILTER: &str = "repo_context=info,warn";

/// Summary text of a cancelled analysis.
pub const CANCELLED_SUMMARY: &str = "Analysis cancelled before completion.";

/// How long a finished analysis waits for queued notifications.
const NOTIFY_GRACE: Duration = Duration::from_secs(2);

/// Return the platform-standard data directory for repo-context.
///
/// - macOS: `~/Library/Application Support/repo-context/`
/// - Windows: `{FOLDERID_RoamingAppData}\repo-context\`
/// - Linux: `$XDG_DATA_HOME/repo-context/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.repo-context/` only if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("repo-context");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".repo-context")
}

/// Relative log paths live in the data directory.
fn resolve_log_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir().join(path)
    }
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr unless `logging.file` is set; stdout is reserved for the
/// analysis output. With a file:
/// 1. Rotates existing logs (`x.log` → `x.log.1` → … → `.{keep_files}`).
/// 2. Opens a fresh file with a line-flushing writer.
pub fn init_tracing(config: &LoggingConfig) -> std::io::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER))
    });

    let log_path = config.file.as_deref().map(resolve_log_path);
    let writer = match log_path {
        Some(ref path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            rotate_log_file(path, config.keep_files);
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            BoxMakeWriter::new(FlushingWriter::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_path.is_none())
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(std::io::Error::other)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = ?log_path.as_ref().map(|p| p.display().to_string()),
        pid = std::process::id(),
        "repo-context starting"
    );
    Ok(())
}

/// Rotate log files: `x.log` → `x.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    if keep == 0 {
        let _ = std::fs::remove_file(base_path);
        return;
    }

    let numbered = |i: u32| PathBuf::from(format!("{}.{i}", base_path.display()));

    let _ = std::fs::remove_file(numbered(keep));
    for i in (1..keep).rev() {
        let _ = std::fs::rename(numbered(i), numbered(i + 1));
    }
    if base_path.exists() {
        let _ = std::fs::rename(base_path, numbered(1));
    }
}

/// A writer over a shared file that flushes after every write, so log lines
/// survive an abrupt exit.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(std::sync::Mutex::new(file)),
        }
    }

    fn lock(&self) -> std::io::Result<std::sync::MutexGuard<'_, std::fs::File>> {
        self.file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))
    }
}

impl Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self.lock()?;
        let n = f.write(buf)?;
        f.flush()?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.lock()?.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ─── Analyzer ────────────────────────────────────────────────────────────────

/// Failure to build the HTTP collaborators from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("inference client: {0}")]
    Inference(#[from] InferenceError),

    #[error("github client: {0}")]
    Host(#[from] HostError),
}

/// Entry point of the library: analyzes repositories against a chat and a
/// hosting collaborator.
///
/// Holds no per-analysis state; concurrent `analyze` calls are independent.
pub struct Analyzer {
    chat: Arc<dyn ChatBackend>,
    host: Arc<dyn RepositoryHost>,
    settings: AnalysisConfig,
    git_ref: Option<String>,
}

impl Analyzer {
    pub fn new(chat: Arc<dyn ChatBackend>, host: Arc<dyn RepositoryHost>) -> Self {
        Self {
            chat,
            host,
            settings: AnalysisConfig::default(),
            git_ref: None,
        }
    }

    /// Build the HTTP collaborators described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, SetupError> {
        let chat = InferenceClient::from_config(config.llm.clone())?;
        let host = GitHubClient::from_config(config.github.clone())?;
        Ok(Self::new(Arc::new(chat), Arc::new(host)).with_settings(config.analysis.clone()))
    }

    pub fn with_settings(mut self, settings: AnalysisConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Read the repository at this branch, tag or commit instead of the
    /// configured one.
    pub fn with_git_ref(mut self, git_ref: Option<String>) -> Self {
        self.git_ref = git_ref;
        self
    }

    /// Analyze `identifier` with a focus on `prompt` and return the answer.
    ///
    /// Never fails: every error path resolves to a descriptive message.
    pub async fn analyze(
        &self,
        identifier: &str,
        prompt: &str,
        sink: Option<Arc<dyn EventSink>>,
    ) -> String {
        self.analyze_detailed(identifier, prompt, sink, CancellationToken::new())
            .await
            .summary
    }

    /// Like [`Analyzer::analyze`], returning the outcome, the raw context and
    /// the per-call records alongside the answer.
    pub async fn analyze_detailed(
        &self,
        identifier: &str,
        prompt: &str,
        sink: Option<Arc<dyn EventSink>>,
        cancel: CancellationToken,
    ) -> AnalysisReport {
        tracing::info!(identifier, prompt_len = prompt.len(), "analysis requested");

        let repo = parse_with_hosts(identifier, &self.settings.allowed_hosts);
        if repo.is_empty() {
            tracing::warn!(identifier, "invalid repository identifier");
            return failed_report(repo, AnalysisError::InvalidRepository);
        }

        let call_timeout =
            (self.settings.call_timeout_secs > 0).then(|| Duration::from_secs(self.settings.call_timeout_secs));

        let mut summarizer = ContextSummarizer::new(Arc::clone(&self.chat));
        if let Some(limit) = call_timeout {
            summarizer = summarizer.with_timeout(limit);
        }
        let notifier = EventNotifier::from_sink(sink, self.settings.notify_queue_capacity);

        let options = DriverOptions {
            max_iterations: self.settings.max_iterations,
            call_timeout,
            git_ref: self.git_ref.clone(),
            chat: ChatOptions::default(),
        };

        let result = ConversationDriver::new(
            self.chat.as_ref(),
            self.host.as_ref(),
            &summarizer,
            &notifier,
        )
        .with_options(options)
        .with_cancellation(cancel.clone())
        .run(&repo, prompt)
        .await;

        let run = match result {
            Ok(run) => run,
            Err(e) => {
                notifier.shutdown(NOTIFY_GRACE).await;
                return failed_report(repo, e);
            }
        };

        let mut outcome = run.outcome;
        let summary = if outcome == AnalysisOutcome::Cancelled {
            notifier.shutdown(NOTIFY_GRACE).await;
            CANCELLED_SUMMARY.to_string()
        } else {
            let finalize = async {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    summary = summarizer.finalize(&run.context, prompt) => Some(summary),
                }
            };
            let (finalized, ()) = tokio::join!(finalize, notifier.shutdown(NOTIFY_GRACE));
            finalized.unwrap_or_else(|| {
                tracing::warn!(repo = %repo, "analysis cancelled during final summary");
                outcome = AnalysisOutcome::Cancelled;
                CANCELLED_SUMMARY.to_string()
            })
        };

        tracing::info!(
            repo = %repo,
            outcome = ?outcome,
            turns = run.turns,
            tool_calls = run.tool_calls.len(),
            context_len = run.context.len(),
            "analysis finished"
        );

        AnalysisReport {
            repository: repo,
            outcome,
            summary,
            context: run.context,
            turns: run.turns,
            tool_calls: run.tool_calls,
        }
    }
}

fn failed_report(repository: agent_core::RepositoryRef, error: AnalysisError) -> AnalysisReport {
    let summary = match &error {
        AnalysisError::InvalidRepository | AnalysisError::Credential(_) => format!("Error: {error}"),
        _ => {
            tracing::error!(repo = %repository, error = %error, "analysis failed");
            format!("Error analyzing repository: {error}")
        }
    };

    AnalysisReport {
        repository,
        outcome: AnalysisOutcome::Failed {
            reason: error.to_string(),
        },
        summary,
        context: String::new(),
        turns: 0,
        tool_calls: Vec::new(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::summarizer::FINALIZE_FALLBACK;
    use crate::agent_core::test_support::{
        text_reply, tool_reply, RecordingSink, Reply, ScriptedChat, ScriptedHost,
    };
    use crate::agent_core::ChannelSink;
    use tokio::sync::mpsc;

    const ROOT: &str = "README.md (file)\nsrc (dir)\n";

    fn analyzer(chat: &Arc<ScriptedChat>, host: &Arc<ScriptedHost>) -> Analyzer {
        Analyzer::new(chat.clone(), host.clone())
    }

    #[tokio::test]
    async fn test_analyze_end_to_end() {
        let chat = Arc::new(ScriptedChat::new(vec![
            tool_reply("reading", &[("view_file", r#"{"path": "README.md"}"#)]),
            text_reply("done"),
            text_reply("It is a greeting library."),
        ]));
        let host = Arc::new(ScriptedHost::new(ROOT).with_file("README.md", "# hello"));
        let sink = Arc::new(RecordingSink::default());

        let report = analyzer(&chat, &host)
            .analyze_detailed(
                "https://github.com/octo/hello",
                "what is this?",
                Some(sink.clone()),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(report.summary, "It is a greeting library.");
        assert_eq!(report.outcome, AnalysisOutcome::Completed);
        assert_eq!(report.repository.to_string(), "octo/hello");
        assert_eq!(report.context, format!("{ROOT}view_file:\n# hello\n\n"));
        assert_eq!(report.turns, 2);

        // Two loop turns with tools, then the tool-free finalize call.
        assert_eq!(chat.call_count(), 3);
        assert!(chat.had_tools(1));
        assert!(!chat.had_tools(2));
        assert!(chat.messages_of(2)[1].content.contains("'what is this?'"));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].content, "Viewed README.md");
    }

    #[tokio::test]
    async fn test_invalid_identifier_makes_no_calls() {
        let chat = Arc::new(ScriptedChat::new(vec![text_reply("done")]));
        let host = Arc::new(ScriptedHost::new(ROOT));

        for id in ["owner", "", "a/b/c"] {
            let text = analyzer(&chat, &host).analyze(id, "p", None).await;
            assert_eq!(
                text,
                "Error: Invalid repository format. Expected 'owner/repo' or a valid GitHub URL."
            );
        }
        assert_eq!(chat.call_count(), 0);
        assert_eq!(host.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_is_surfaced_verbatim() {
        let chat = Arc::new(ScriptedChat::new(vec![text_reply("done")]));
        let mut host = ScriptedHost::new(ROOT);
        host.credential = false;
        let host = Arc::new(host);

        let text = analyzer(&chat, &host).analyze("octo/hello", "p", None).await;
        assert_eq!(text, format!("Error: {}", HostError::CredentialMissing));
        assert!(text.contains("GitHub token is not configured"));
        assert_eq!(chat.call_count(), 0);
        assert_eq!(host.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_with_real_client_skips_network() {
        let chat = Arc::new(ScriptedChat::new(vec![text_reply("done")]));
        let host = GitHubClient::from_config(config::GitHubConfig {
            api_base_url: "http://127.0.0.1:9".to_string(),
            token: None,
            ..config::GitHubConfig::default()
        })
        .unwrap();

        let text = Analyzer::new(chat.clone(), Arc::new(host))
            .analyze("octo/hello", "p", None)
            .await;
        assert!(text.starts_with("Error: GitHub token is not configured"));
        assert_eq!(chat.call_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_failure_is_reported_as_text() {
        let chat = Arc::new(ScriptedChat::new(vec![Reply::Fail]));
        let host = Arc::new(ScriptedHost::new(ROOT));

        let report = analyzer(&chat, &host)
            .analyze_detailed("octo/hello", "p", None, CancellationToken::new())
            .await;
        assert!(report
            .summary
            .starts_with("Error analyzing repository: chat completion failed on turn 1"));
        assert!(matches!(report.outcome, AnalysisOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_finalize_failure_uses_fallback() {
        let chat = Arc::new(ScriptedChat::new(vec![text_reply("done"), Reply::Fail]));
        let host = Arc::new(ScriptedHost::new(ROOT));

        let report = analyzer(&chat, &host)
            .analyze_detailed("octo/hello", "p", None, CancellationToken::new())
            .await;
        assert_eq!(report.summary, FINALIZE_FALLBACK);
        assert_eq!(report.outcome, AnalysisOutcome::Completed);
        assert_eq!(report.context, ROOT);
    }

    #[tokio::test]
    async fn test_cancelled_analysis_skips_finalize() {
        let chat = Arc::new(ScriptedChat::new(vec![text_reply("done")]));
        let host = Arc::new(ScriptedHost::new(ROOT));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = analyzer(&chat, &host)
            .analyze_detailed("octo/hello", "p", None, cancel)
            .await;
        assert_eq!(report.outcome, AnalysisOutcome::Cancelled);
        assert_eq!(report.summary, CANCELLED_SUMMARY);
        assert_eq!(chat.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_final_summary() {
        // The loop call answers; the tool-free finalize call never does.
        let chat = Arc::new(ScriptedChat::new(vec![text_reply("done"), Reply::Hang]));
        let host = Arc::new(ScriptedHost::new(ROOT));
        let cancel = CancellationToken::new();
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                cancel.cancel();
            });
        }

        let start = tokio::time::Instant::now();
        let report = analyzer(&chat, &host)
            .analyze_detailed("octo/hello", "p", None, cancel)
            .await;

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(report.outcome, AnalysisOutcome::Cancelled);
        assert_eq!(report.summary, CANCELLED_SUMMARY);
        assert_eq!(report.context, ROOT);
        assert_eq!(chat.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_sink_is_released_after_analysis() {
        struct HungSink;

        #[async_trait::async_trait]
        impl EventSink for HungSink {
            async fn send(
                &self,
                _envelope: &agent_core::EventEnvelope,
            ) -> Result<(), agent_core::NotifyError> {
                std::future::pending::<()>().await;
                Ok(())
            }
        }

        let chat = Arc::new(ScriptedChat::new(vec![
            tool_reply("reading", &[("view_file", r#"{"path": "README.md"}"#)]),
            text_reply("done"),
        ]));
        let host = Arc::new(ScriptedHost::new(ROOT).with_file("README.md", "# hello"));
        let sink = Arc::new(HungSink);

        let text = analyzer(&chat, &host)
            .analyze("octo/hello", "p", Some(sink.clone()))
            .await;

        assert_eq!(text, "done");
        assert_eq!(Arc::strong_count(&sink), 1);
    }

    #[tokio::test]
    async fn test_allowed_hosts_restrict_urls() {
        let chat = Arc::new(ScriptedChat::new(vec![text_reply("done")]));
        let host = Arc::new(ScriptedHost::new(ROOT));
        let analyzer = analyzer(&chat, &host).with_settings(AnalysisConfig {
            allowed_hosts: vec!["github.com".into()],
            ..AnalysisConfig::default()
        });

        let text = analyzer
            .analyze("https://gitlab.com/octo/hello", "p", None)
            .await;
        assert!(text.starts_with("Error: Invalid repository format"));

        let text = analyzer.analyze("https://GitHub.com/octo/hello", "p", None).await;
        assert_eq!(text, "done");
    }

    #[tokio::test]
    async fn test_channel_sink_receives_event_frames() {
        let chat = Arc::new(ScriptedChat::new(vec![
            tool_reply("reading", &[("view_file", r#"{"path": "README.md"}"#)]),
            text_reply("done"),
        ]));
        let host = Arc::new(ScriptedHost::new(ROOT).with_file("README.md", "# hello"));
        let (tx, mut rx) = mpsc::channel(8);

        analyzer(&chat, &host)
            .analyze("octo/hello", "p", Some(Arc::new(ChannelSink::new(tx))))
            .await;

        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value[0], "EVENT");
        assert_eq!(value[1]["kind"], 6838);
        assert_eq!(value[1]["content"], "Viewed README.md");
        assert!(value[1]["created_at"].is_i64());
    }

    #[test]
    fn test_rotate_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("repo-context.log");
        let numbered = |i: u32| dir.path().join(format!("repo-context.log.{i}"));

        std::fs::write(&base, "current").unwrap();
        std::fs::write(numbered(1), "one").unwrap();
        std::fs::write(numbered(2), "two").unwrap();

        rotate_log_file(&base, 2);

        assert!(!base.exists());
        assert_eq!(std::fs::read_to_string(numbered(1)).unwrap(), "current");
        assert_eq!(std::fs::read_to_string(numbered(2)).unwrap(), "one");
        assert!(!numbered(3).exists());
    }

    #[test]
    fn test_relative_log_path_lands_in_data_dir() {
        let abs = std::env::temp_dir().join("x.log");
        assert_eq!(resolve_log_path(&abs), abs);
        assert_eq!(
            resolve_log_path(Path::new("logs/x.log")),
            data_dir().join("logs/x.log")
        );
    }
}
