//! Repository identifier parsing.
//!
//! Accepts either a bare `owner/name` pair or an `http(s)` URL whose first
//! two path segments are the owner and the repository name. URL hosts are
//! not checked unless the caller supplies an allow-list, so mirrors and
//! GitHub Enterprise URLs parse the same way as `github.com` ones.

use std::fmt;

use serde::Serialize;
use url::Url;

/// An `(owner, name)` pair. Both fields are non-empty after a successful
/// parse and both are empty after a failed one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    fn new(owner: &str, name: &str) -> Self {
        if owner.is_empty() || name.is_empty() {
            return Self::default();
        }
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }

    /// True when parsing failed.
    pub fn is_empty(&self) -> bool {
        self.owner.is_empty() || self.name.is_empty()
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Parse a repository identifier, accepting URLs on any host.
///
/// ```
/// use repo_context::agent_core::repo_ref::parse;
///
/// assert_eq!(parse("rust-lang/cargo").to_string(), "rust-lang/cargo");
/// assert_eq!(parse("https://example.org/rust-lang/cargo/tree/master").name, "cargo");
/// assert!(parse("a/b/c").is_empty());
/// ```
pub fn parse(identifier: &str) -> RepositoryRef {
    parse_with_hosts(identifier, &[])
}

/// Parse a repository identifier, rejecting URLs whose host is not in
/// `allowed_hosts` (case-insensitive). An empty list allows every host.
///
/// Surrounding whitespace is ignored; whitespace inside a segment is kept.
pub fn parse_with_hosts(identifier: &str, allowed_hosts: &[String]) -> RepositoryRef {
    let identifier = identifier.trim();

    if identifier.starts_with("http://") || identifier.starts_with("https://") {
        return parse_url(identifier, allowed_hosts);
    }

    match identifier.split('/').collect::<Vec<_>>().as_slice() {
        [owner, name] => RepositoryRef::new(owner, name),
        _ => RepositoryRef::default(),
    }
}

fn parse_url(identifier: &str, allowed_hosts: &[String]) -> RepositoryRef {
    let Ok(url) = Url::parse(identifier) else {
        return RepositoryRef::default();
    };

    if !allowed_hosts.is_empty() {
        let host = url.host_str().unwrap_or_default();
        if !allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
            tracing::debug!(host, "repository URL host not allowed");
            return RepositoryRef::default();
        }
    }

    // "/owner/name/…" splits into ["", owner, name, …].
    let segments: Vec<&str> = url.path().split('/').collect();
    if segments.len() < 3 {
        return RepositoryRef::default();
    }
    RepositoryRef::new(segments[1], segments[2])
}
