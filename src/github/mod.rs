//! GitHub Client — read-only access to repository contents.
//!
//! Submodules:
//! - `client`: the [`RepositoryHost`] trait and its HTTP implementation
//! - `types`: contents API wire types and listing rendering
//! - `errors`: hosting error taxonomy

pub mod client;
pub mod errors;
pub mod types;

// Re-exports for convenience
pub use client::{GitHubClient, RepositoryHost};
pub use errors::HostError;
