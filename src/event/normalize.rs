use std::time::{Duration, Instant};

use serde_json::Value;

use super::{EventContext, EventKind, fields};
use crate::filter::EvalError;
use crate::provider::{DiffProvider, ProviderError};

/// Point in time after which no further collaborator call may start or finish.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    fn check(&self) -> Result<(), EvalError> {
        if Instant::now() >= self.at {
            Err(EvalError::DeadlineExceeded(self.budget))
        } else {
            Ok(())
        }
    }
}

/// Diff provider calls bounded by an optional deadline.
struct Bounded<'a> {
    inner: &'a dyn DiffProvider,
    deadline: Option<Deadline>,
}

impl Bounded<'_> {
    fn call<T>(&self, f: impl FnOnce() -> Result<T, ProviderError>) -> Result<T, EvalError> {
        if let Some(d) = &self.deadline {
            d.check()?;
        }
        let out = f().map_err(|e| match e {
            ProviderError::TimedOut(budget) => EvalError::DeadlineExceeded(budget),
            other => EvalError::CollaboratorUnavailable(other),
        })?;
        // A result that arrives late is discarded: the caller has already given up.
        if let Some(d) = &self.deadline {
            d.check()?;
        }
        Ok(out)
    }

    fn compare(&self, repo: &str, base: &str, head: &str) -> Result<Vec<String>, EvalError> {
        self.call(|| self.inner.compare(repo, base, head))
    }

    fn commit_message(&self, repo: &str, sha: &str) -> Result<String, EvalError> {
        self.call(|| self.inner.commit_message(repo, sha))
    }
}

/// Build the well-known field context for a delivery.
///
/// Fails with [`EvalError::UnsupportedEventKind`] for kinds other than
/// `push` and `pull_request`.
pub fn normalize(
    event_kind: &str,
    payload: &Value,
    diff: &dyn DiffProvider,
) -> Result<EventContext, EvalError> {
    normalize_within(event_kind, payload, diff, None)
}

/// [`normalize`], with collaborator calls bounded by `deadline`.
pub fn normalize_within(
    event_kind: &str,
    payload: &Value,
    diff: &dyn DiffProvider,
    deadline: Option<Deadline>,
) -> Result<EventContext, EvalError> {
    let kind = EventKind::parse(event_kind)
        .ok_or_else(|| EvalError::UnsupportedEventKind(event_kind.to_string()))?;
    let diff = Bounded {
        inner: diff,
        deadline,
    };

    let mut ctx = EventContext::new(kind);
    ctx.set(fields::ACTOR_ACCOUNT_ID, scalar_at(payload, &["sender", "id"]));

    match kind {
        EventKind::Push => {
            let repo = required(payload, &["repository", "full_name"])?;
            let before = revision(payload, &["before"])?;
            let after = revision(payload, &["after"])?;

            ctx.set(fields::FILE_PATH, diff.compare(repo, before, after)?);
            ctx.set(
                fields::COMMIT_MESSAGE,
                scalar_at(payload, &["head_commit", "message"]),
            );
            ctx.set(fields::BASE_REF, scalar_at(payload, &["ref"]));
        }
        EventKind::PullRequest => {
            let repo = required(payload, &["repository", "full_name"])?;
            let base = revision(payload, &["pull_request", "base", "sha"])?;
            let head = revision(payload, &["pull_request", "head", "sha"])?;

            ctx.set(fields::FILE_PATH, diff.compare(repo, base, head)?);
            ctx.set(
                fields::COMMIT_MESSAGE,
                vec![diff.commit_message(repo, head)?],
            );
            ctx.set(
                fields::BASE_REF,
                scalar_at(payload, &["pull_request", "base", "ref"]),
            );
            ctx.set(
                fields::HEAD_REF,
                scalar_at(payload, &["pull_request", "head", "ref"]),
            );
            ctx.set(fields::PR_ACTION, scalar_at(payload, &["action"]));
        }
    }

    Ok(ctx)
}

fn lookup<'v>(payload: &'v Value, path: &[&str]) -> Option<&'v Value> {
    path.iter().try_fold(payload, |node, key| node.get(key))
}

/// A string the normaliser cannot work without.
fn required<'v>(payload: &'v Value, path: &[&str]) -> Result<&'v str, EvalError> {
    lookup(payload, path)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EvalError::MalformedPayload(path.join(".")))
}

/// A commit id handed to the diff provider: 7 to 64 hex digits, nothing else.
fn revision<'v>(payload: &'v Value, path: &[&str]) -> Result<&'v str, EvalError> {
    let sha = required(payload, path)?;
    if (7..=64).contains(&sha.len()) && sha.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(sha)
    } else {
        Err(EvalError::MalformedPayload(path.join(".")))
    }
}

/// Optional scalar rendered as a one-element sequence; absent or null gives an empty one.
fn scalar_at(payload: &Value, path: &[&str]) -> Vec<String> {
    match lookup(payload, path) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(v @ (Value::Number(_) | Value::Bool(_))) => vec![v.to_string()],
        _ => Vec::new(),
    }
}
