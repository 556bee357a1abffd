//! Types produced by the path parser and consumed by the evaluator.

/// One step of a path expression, applied to every node matched so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `.name` or `["name"]`: object member by key
    Child(String),
    /// `[n]`: array element; negative indexes count from the end
    Index(i64),
    /// `.*` or `[*]`: every member of an object or element of an array
    Wildcard,
    /// `..name`: `name` at any depth below the current node
    Descendant(String),
}

/// A parsed path expression such as `repository.owner.login` or `$.commits[*].id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    /// Source expression text, kept for error reporting.
    pub source: String,
    pub selectors: Vec<Selector>,
}

/// Syntax errors in a path expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("empty path expression")]
    Empty,
    #[error("expected a member name at offset {0}")]
    ExpectedName(usize),
    #[error("unterminated bracket starting at offset {0}")]
    UnterminatedBracket(usize),
    #[error("invalid bracket selector `{0}`")]
    InvalidBracket(String),
    #[error("unexpected character `{ch}` at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
}
