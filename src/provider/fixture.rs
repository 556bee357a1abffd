use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::{DiffProvider, ProviderError};

/// Diff provider answering from fixed data.
///
/// The JSON form is:
///
/// ```json
/// { "compare": { "ba5eba5e...4eadbeef": ["src/a.py"] },
///   "commits": { "4eadbeef": "fix: thing" } }
/// ```
///
/// Lookups ignore the repository name. Unknown ranges or commits are
/// reported as [`ProviderError::NotFound`], like a real provider would.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FixtureDiffProvider {
    #[serde(default)]
    compare: HashMap<String, Vec<String>>,
    #[serde(default)]
    commits: HashMap<String, String>,
    /// When set, every call fails with this error.
    #[serde(skip)]
    failure: Option<ProviderError>,
}

impl FixtureDiffProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }

    pub fn with_compare<I, S>(mut self, base: &str, head: &str, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compare.insert(
            range_key(base, head),
            paths.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn with_commit(mut self, sha: &str, message: &str) -> Self {
        self.commits.insert(sha.to_string(), message.to_string());
        self
    }

    /// Make every call fail with `err`.
    pub fn failing(err: ProviderError) -> Self {
        Self {
            failure: Some(err),
            ..Self::default()
        }
    }
}

fn range_key(base: &str, head: &str) -> String {
    format!("{base}...{head}")
}

impl DiffProvider for FixtureDiffProvider {
    fn compare(&self, _repo: &str, base: &str, head: &str) -> Result<Vec<String>, ProviderError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let key = range_key(base, head);
        self.compare
            .get(&key)
            .cloned()
            .ok_or(ProviderError::NotFound(key))
    }

    fn commit_message(&self, _repo: &str, sha: &str) -> Result<String, ProviderError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.commits
            .get(sha)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("commit {sha}")))
    }
}
