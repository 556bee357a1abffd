//! Parameters for the downstream build a passing delivery should start.
//!
//! Starting the build is left to the caller; this only decides what to build.

use serde::Serialize;
use serde_json::Value;

use crate::event::EventKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildRequest {
    /// Clone URL of the repository (`repository.html_url`).
    pub repository_url: Option<String>,
    /// Branch, tag, or `pr/<number>` to check out.
    pub source_version: String,
}

impl BuildRequest {
    /// Derive the build request for a delivery. `None` when the payload
    /// lacks the fields needed to pick a source version.
    pub fn from_event(kind: EventKind, payload: &Value) -> Option<Self> {
        let source_version = match kind {
            EventKind::Push => push_version(payload)?,
            EventKind::PullRequest => pull_request_version(payload)?,
        };
        Some(Self {
            repository_url: payload
                .pointer("/repository/html_url")
                .and_then(Value::as_str)
                .map(str::to_string),
            source_version,
        })
    }
}

/// The pushed branch or tag name.
fn push_version(payload: &Value) -> Option<String> {
    let git_ref = payload.get("ref")?.as_str()?;
    let name = ["refs/heads/", "refs/tags/"]
        .iter()
        .find_map(|prefix| git_ref.strip_prefix(prefix))
        .unwrap_or_else(|| git_ref.rsplit('/').next().unwrap_or(git_ref));
    (!name.is_empty()).then(|| name.to_string())
}

/// A merged pull request builds its base branch; any other activity builds the PR head.
fn pull_request_version(payload: &Value) -> Option<String> {
    let pr = payload.get("pull_request")?;
    let merged = pr
        .get("merged")
        .or_else(|| payload.get("merged"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let closed = payload.get("action").and_then(Value::as_str) == Some("closed");

    if closed && merged {
        return pr
            .pointer("/base/ref")
            .and_then(Value::as_str)
            .map(str::to_string);
    }
    let number = pr.get("number").and_then(Value::as_u64)?;
    Some(format!("pr/{number}"))
}
