//! Collaborators the engine depends on but does not own.
//!
//! The engine receives these as trait objects so callers can inject a real
//! implementation (local git clone, environment) or an in-memory fake.

/// In-memory diff provider backed by a JSON fixture.
pub mod fixture;
/// Diff provider backed by a local git clone.
pub mod git;
/// Secret stores: process environment and static maps.
pub mod secret;

use std::time::Duration;

pub use fixture::FixtureDiffProvider;
pub use git::GitDiffProvider;
pub use secret::{EnvSecretStore, StaticSecretStore};

/// Failures reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider rejected credentials")]
    Unauthorized,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("provider rate limit exceeded")]
    RateLimited,
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider call killed after {0:?}")]
    TimedOut(Duration),
}

/// Source of changed file paths and commit messages for a repository.
pub trait DiffProvider: Send + Sync {
    /// Paths changed between `base` and `head` in `repo` (the repository's full name).
    fn compare(&self, repo: &str, base: &str, head: &str) -> Result<Vec<String>, ProviderError>;

    /// Full message of commit `sha` in `repo`.
    fn commit_message(&self, repo: &str, sha: &str) -> Result<String, ProviderError>;
}

/// Key/value secret lookup, e.g. the webhook signing secret.
pub trait SecretStore: Send + Sync {
    /// Value stored under `key`; `NotFound` when there is none.
    fn get(&self, key: &str) -> Result<String, ProviderError>;
}
