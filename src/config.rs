//! Application configuration loading and validation.
//!
//! Reads `repo-context.yaml` and resolves environment variables. The file is
//! the single source of truth for the model endpoint, the GitHub credential
//! and the analysis limits; nothing below the entry point reads process
//! environment state.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::agent_core::driver::MAX_ITERATIONS;

/// File name searched for when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "repo-context.yaml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "REPO_CONTEXT_CONFIG";

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors raised while locating, reading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find repo-context.yaml (set REPO_CONTEXT_CONFIG or pass --config)")]
    NotFound,

    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Top-level configuration (mirrors `repo-context.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Base URL up to and including the API version, e.g. `https://api.groq.com/openai/v1`.
    pub base_url: String,
    pub model: String,
    /// Models tried in order when the primary fails with a retriable error.
    #[serde(default)]
    pub fallback_models: Vec<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// GitHub contents API access.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_github_api")]
    pub api_base_url: String,
    /// Personal access token. Absent or empty means every hosting call fails
    /// with the credential-missing error before touching the network.
    #[serde(default)]
    pub token: Option<String>,
    /// Branch, tag or commit passed as `ref`; the default branch when unset.
    #[serde(default)]
    pub git_ref: Option<String>,
    #[serde(default = "default_github_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_github_api(),
            token: None,
            git_ref: None,
            timeout_secs: default_github_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Limits of the conversation loop.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Chat turns per analysis. Clamped to the hard ceiling of 5.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Timeout applied to every external call made by the loop; 0 disables it.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Capacity of the "viewed file" notification queue.
    #[serde(default = "default_notify_queue_capacity")]
    pub notify_queue_capacity: usize,
    /// When non-empty, repository URLs must name one of these hosts.
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            call_timeout_secs: default_call_timeout_secs(),
            notify_queue_capacity: default_notify_queue_capacity(),
            allowed_hosts: Vec::new(),
        }
    }
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default)]
    pub filter: Option<String>,
    /// Emit JSON lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
    /// Log to this file (rotated on startup) instead of stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Rotated files kept next to `file`.
    #[serde(default = "default_keep_files")]
    pub keep_files: u32,
}

fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_github_api() -> String {
    "https://api.github.com".to_string()
}
fn default_github_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("repo-context/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_max_iterations() -> u32 {
    MAX_ITERATIONS
}
fn default_call_timeout_secs() -> u64 {
    60
}
fn default_notify_queue_capacity() -> usize {
    64
}
fn default_keep_files() -> u32 {
    3
}

// ─── Loading ─────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Parse, interpolate and validate a YAML document.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(raw);
        let mut config: AppConfig =
            serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
                reason: e.to_string(),
            })?;
        config.normalize()?;
        Ok(config)
    }

    /// Blank optional strings become `None` and limits are clamped.
    fn normalize(&mut self) -> Result<(), ConfigError> {
        if self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "llm.base_url must not be empty".into(),
            });
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "llm.model must not be empty".into(),
            });
        }
        self.llm.base_url = self.llm.base_url.trim_end_matches('/').to_string();
        self.github.api_base_url = self.github.api_base_url.trim_end_matches('/').to_string();

        self.llm.api_key = non_blank(self.llm.api_key.take());
        self.github.token = non_blank(self.github.token.take());
        self.github.git_ref = non_blank(self.github.git_ref.take());
        self.llm.fallback_models.retain(|m| !m.trim().is_empty());

        if self.analysis.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                reason: "analysis.max_iterations must be at least 1".into(),
            });
        }
        if self.analysis.max_iterations > MAX_ITERATIONS {
            tracing::warn!(
                configured = self.analysis.max_iterations,
                ceiling = MAX_ITERATIONS,
                "analysis.max_iterations above ceiling, clamping"
            );
            self.analysis.max_iterations = MAX_ITERATIONS;
        }
        if self.analysis.notify_queue_capacity == 0 {
            self.analysis.notify_queue_capacity = 1;
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Resolve the config file path.
///
/// Order: `REPO_CONTEXT_CONFIG` if it points at an existing file, then the
/// first `repo-context.yaml` found walking upward from `start`.
pub fn find_config_path(start: &Path) -> Result<PathBuf, ConfigError> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(explicit);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(ConfigError::NotFound)
}

/// Load and parse the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    AppConfig::from_yaml_str(&raw)
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name).unwrap_or_else(|_| default.to_string()),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
