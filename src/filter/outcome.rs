/// Verdict for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationResult {
    /// The group at this index (declaration order) matched.
    Matched(usize),
    /// Filter groups exist and none matched.
    NotMatched,
    /// The event kind has no defined handling.
    Unsupported(String),
    /// No filter groups are declared for the repository.
    Unconfigured,
}

impl EvaluationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationResult::Matched(_) => "matched",
            EvaluationResult::NotMatched => "not_matched",
            EvaluationResult::Unsupported(_) => "unsupported",
            EvaluationResult::Unconfigured => "unconfigured",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EvaluationResult::Matched(_) => "MATCHED",
            EvaluationResult::NotMatched => "NOT MATCHED",
            EvaluationResult::Unsupported(_) => "UNSUPPORTED",
            EvaluationResult::Unconfigured => "UNCONFIGURED",
        }
    }

    pub fn matched_group(&self) -> Option<usize> {
        match self {
            EvaluationResult::Matched(i) => Some(*i),
            _ => None,
        }
    }
}
