use std::time::Duration;

use crate::provider::ProviderError;
use crate::query::QueryError;

/// Failures while evaluating a delivery against its filter groups.
///
/// "No group matched" is not an error; see
/// [`EvaluationResult::NotMatched`](super::EvaluationResult::NotMatched).
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("invalid filter field `{field}`: {source}")]
    InvalidFilterField {
        field: String,
        #[source]
        source: QueryError,
    },

    #[error("invalid pattern `{pattern}` for field `{field}`: {source}")]
    InvalidPattern {
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("event kind not supported: {0}")]
    UnsupportedEventKind(String),

    #[error("payload field `{0}` is missing or invalid")]
    MalformedPayload(String),

    #[error("diff provider unavailable: {0}")]
    CollaboratorUnavailable(#[from] ProviderError),

    #[error("evaluation exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),
}

impl EvalError {
    /// Attributable to the filter-group document rather than the delivery.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EvalError::InvalidFilterField { .. } | EvalError::InvalidPattern { .. }
        )
    }

    /// Environmental failures the sender may retry.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            EvalError::CollaboratorUnavailable(_) | EvalError::DeadlineExceeded(_)
        )
    }

    /// Stable type name used in error response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::InvalidFilterField { .. } | EvalError::InvalidPattern { .. } => {
                "InvalidFilterConfiguration"
            }
            EvalError::UnsupportedEventKind(_) => "UnsupportedEventKind",
            EvalError::MalformedPayload(_) => "MalformedPayload",
            EvalError::CollaboratorUnavailable(_) => "CollaboratorUnavailable",
            EvalError::DeadlineExceeded(_) => "DeadlineExceeded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy() {
        let bad_field = EvalError::InvalidFilterField {
            field: "a[".into(),
            source: QueryError::UnterminatedBracket(1),
        };
        assert!(bad_field.is_config_error());
        assert!(!bad_field.is_server_error());

        let down = EvalError::from(ProviderError::RateLimited);
        assert!(down.is_server_error());
        assert!(!down.is_config_error());

        let late = EvalError::DeadlineExceeded(Duration::from_secs(30));
        assert!(late.is_server_error());

        let malformed = EvalError::MalformedPayload("before".into());
        assert!(!malformed.is_server_error());
        assert!(!malformed.is_config_error());
    }

    #[test]
    fn messages_name_the_offender() {
        let err = EvalError::InvalidFilterField {
            field: "a[".into(),
            source: QueryError::UnterminatedBracket(1),
        };
        assert_eq!(
            err.to_string(),
            "invalid filter field `a[`: unterminated bracket starting at offset 1"
        );
        assert_eq!(err.kind(), "InvalidFilterConfiguration");
    }
}
