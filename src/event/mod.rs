//! Event normalisation: turning a raw webhook payload into named fields.

pub mod normalize;
pub mod resolve;

pub use normalize::{Deadline, normalize, normalize_within};
pub use resolve::{Resolved, resolve};

use std::collections::BTreeMap;

/// Well-known field names a predicate may reference directly.
pub mod fields {
    pub const EVENT: &str = "event";
    pub const ACTOR_ACCOUNT_ID: &str = "actor_account_id";
    pub const FILE_PATH: &str = "file_path";
    pub const COMMIT_MESSAGE: &str = "commit_message";
    pub const BASE_REF: &str = "base_ref";
    pub const HEAD_REF: &str = "head_ref";
    pub const PR_ACTION: &str = "pr_action";

    /// Every well-known name, for any event kind.
    pub const ALL: &[&str] = &[
        EVENT,
        ACTOR_ACCOUNT_ID,
        FILE_PATH,
        COMMIT_MESSAGE,
        BASE_REF,
        HEAD_REF,
        PR_ACTION,
    ];

    /// Whether `name` is resolved from the context rather than the raw payload.
    pub fn is_well_known(name: &str) -> bool {
        ALL.contains(&name)
    }
}

/// Event kinds the normaliser knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Push,
    PullRequest,
}

impl EventKind {
    /// Parse a provider event name (the `X-GitHub-Event` header value).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "push" => Some(EventKind::Push),
            "pull_request" => Some(EventKind::PullRequest),
            _ => None,
        }
    }

    /// Provider event name, as carried in the `event` field.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
        }
    }

    /// Well-known fields populated for this kind.
    pub fn fields(self) -> &'static [&'static str] {
        use fields::*;
        match self {
            EventKind::Push => &[EVENT, ACTOR_ACCOUNT_ID, FILE_PATH, COMMIT_MESSAGE, BASE_REF],
            EventKind::PullRequest => &[
                EVENT,
                ACTOR_ACCOUNT_ID,
                FILE_PATH,
                COMMIT_MESSAGE,
                BASE_REF,
                HEAD_REF,
                PR_ACTION,
            ],
        }
    }
}

/// Well-known field values for one delivery.
///
/// Every value is a sequence, even when the field is conceptually a
/// single string, so multi- and single-valued fields match the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
    pub kind: EventKind,
    values: BTreeMap<&'static str, Vec<String>>,
}

impl EventContext {
    /// An empty context for `kind`, with only the `event` field set.
    pub fn new(kind: EventKind) -> Self {
        let mut values = BTreeMap::new();
        values.insert(fields::EVENT, vec![kind.as_str().to_string()]);
        Self { kind, values }
    }

    /// Set a well-known field. Names outside [`fields::ALL`] are ignored.
    pub fn set(&mut self, name: &str, value: Vec<String>) {
        if let Some(key) = fields::ALL.iter().find(|k| **k == name) {
            self.values.insert(*key, value);
        }
    }

    /// Values of a field, or `None` if this kind never populates it.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// Whether the field was populated, even with an empty sequence.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}
