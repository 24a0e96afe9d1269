use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use repo_context::agent_core::{ChannelSink, EventSink};
use repo_context::config::{find_config_path, load_config};
use repo_context::{init_tracing, Analyzer};

/// Analyze a GitHub repository with an LLM, focused on a prompt.
#[derive(Debug, Parser)]
#[command(name = "repo-context", version, about)]
struct Cli {
    /// `owner/repo` or a repository URL.
    repository: String,

    /// What to look for in the repository.
    prompt: String,

    /// Configuration file (default: search upward for repo-context.yaml).
    #[arg(long, short = 'c', env = "REPO_CONTEXT_CONFIG")]
    config: Option<PathBuf>,

    /// Branch, tag or commit to read.
    #[arg(long = "ref", value_name = "REF")]
    git_ref: Option<String>,

    /// Print the full analysis report as JSON.
    #[arg(long)]
    json: bool,

    /// Print "viewed file" events to stderr as they happen.
    #[arg(long)]
    events: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => find_config_path(&std::env::current_dir()?)?,
    };
    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_tracing(&config.logging).context("failed to initialize logging")?;
    tracing::debug!(config = %config_path.display(), "configuration loaded");

    let analyzer = Analyzer::from_config(&config)?.with_git_ref(cli.git_ref);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling analysis");
                cancel.cancel();
            }
        });
    }

    let (sink, printer) = if cli.events {
        let (tx, mut rx) = mpsc::channel::<String>(config.analysis.notify_queue_capacity);
        let printer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                eprintln!("{frame}");
            }
        });
        let sink: Arc<dyn EventSink> = Arc::new(ChannelSink::new(tx));
        (Some(sink), Some(printer))
    } else {
        (None, None)
    };

    let report = analyzer
        .analyze_detailed(&cli.repository, &cli.prompt, sink, cancel)
        .await;

    if let Some(printer) = printer {
        let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary);
    }
    Ok(())
}
