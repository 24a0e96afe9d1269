//! GitHub contents API client.
//!
//! Fetches single files (base64-decoded) and directory listings for one
//! repository path. The credential check runs before any request is built,
//! so a missing token never costs a network round-trip.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{Client as HttpClient, StatusCode};
use url::Url;

use crate::config::GitHubConfig;

use super::errors::HostError;
use super::types::{render_listing, ContentFile, ContentItem};

// ─── RepositoryHost ──────────────────────────────────────────────────────────

/// The hosting content collaborator.
///
/// `git_ref` selects a branch, tag or commit; `None` means the default branch.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Fail fast when the host cannot authenticate. Called once before the
    /// first network call of an analysis.
    fn ensure_credentials(&self) -> Result<(), HostError> {
        Ok(())
    }

    /// Text content of one file.
    async fn get_file(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, HostError>;

    /// Newline-joined `"<path> (<type>)"` listing of one folder.
    async fn get_folder(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, HostError>;
}

// ─── GitHubClient ────────────────────────────────────────────────────────────

/// [`RepositoryHost`] backed by the GitHub REST API.
pub struct GitHubClient {
    http: HttpClient,
    config: GitHubConfig,
}

impl GitHubClient {
    pub fn from_config(config: GitHubConfig) -> Result<Self, HostError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| HostError::Transport {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, config })
    }

    fn token(&self) -> Result<&str, HostError> {
        self.config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(HostError::CredentialMissing)
    }

    /// `{api}/repos/{owner}/{name}/contents/{path}[?ref=…]`, percent-encoded.
    fn contents_url(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Url, HostError> {
        let mut url = Url::parse(&self.config.api_base_url).map_err(|e| HostError::Transport {
            reason: format!("invalid api_base_url '{}': {e}", self.config.api_base_url),
        })?;

        {
            let mut segments = url.path_segments_mut().map_err(|_| HostError::Transport {
                reason: format!("api_base_url '{}' cannot be a base", self.config.api_base_url),
            })?;
            segments
                .pop_if_empty()
                .extend(["repos", owner, name, "contents"])
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }

        if let Some(r) = git_ref.or(self.config.git_ref.as_deref()) {
            url.query_pairs_mut().append_pair("ref", r);
        }
        Ok(url)
    }

    /// GET a contents URL and return the body of a 2xx response.
    async fn fetch(&self, url: Url, path: &str) -> Result<String, HostError> {
        let token = self.token()?;

        tracing::debug!(url = %url, "github contents request");

        let response = self
            .http
            .get(url)
            .header("Authorization", format!("token {token}"))
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
            .map_err(|e| HostError::Transport {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(HostError::NotFound {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response.text().await.map_err(|e| HostError::Transport {
            reason: format!("failed to read response body: {e}"),
        })
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    fn ensure_credentials(&self) -> Result<(), HostError> {
        self.token().map(|_| ())
    }

    async fn get_file(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, HostError> {
        self.token()?;
        let url = self.contents_url(owner, name, path, git_ref)?;
        let body = self.fetch(url, path).await?;
        decode_file_body(&body)
    }

    async fn get_folder(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, HostError> {
        self.token()?;
        let url = self.contents_url(owner, name, path, git_ref)?;
        let body = self.fetch(url, path).await?;
        decode_folder_body(&body)
    }
}

// ─── Body decoding ───────────────────────────────────────────────────────────

/// Decode a file response: base64 content, possibly wrapped at 60 columns.
fn decode_file_body(body: &str) -> Result<String, HostError> {
    let file: ContentFile = serde_json::from_str(body).map_err(|e| HostError::Decode {
        reason: format!("expected a file object: {e}"),
    })?;

    if file.encoding != "base64" {
        return Err(HostError::Decode {
            reason: format!("unexpected file encoding: '{}'", file.encoding),
        });
    }

    let compact: String = file.content.split_whitespace().collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| HostError::Decode {
            reason: format!("failed to decode base64 content: {e}"),
        })?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode a directory response into the rendered listing.
fn decode_folder_body(body: &str) -> Result<String, HostError> {
    let items: Vec<ContentItem> = serde_json::from_str(body).map_err(|e| HostError::Decode {
        reason: format!("expected a directory listing: {e}"),
    })?;
    Ok(render_listing(&items))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
