pub mod error;
pub mod outcome;
pub mod predicate;

pub use error::EvalError;
pub use outcome::EvaluationResult;
pub use predicate::{FilterGroup, FilterGroupSet, FilterPredicate, satisfied};

use std::time::Duration;

use serde_json::Value;

use crate::config::Config;
use crate::event::{self, Deadline, EventContext, EventKind, Resolved};
use crate::provider::DiffProvider;

/// Evaluate one group: every predicate must hold. Stops at the first that doesn't.
///
/// An empty group holds vacuously.
pub fn evaluate_group(
    group: &FilterGroup,
    ctx: &EventContext,
    payload: &Value,
) -> Result<bool, EvalError> {
    for predicate in &group.predicates {
        let held = match event::resolve(&predicate.field, ctx, payload)? {
            Resolved::Values(values) => predicate.matches(&values)?,
            // Fail closed, whatever the exclusion flag says.
            Resolved::Unavailable => false,
        };
        if !held {
            return Ok(false);
        }
    }
    Ok(true)
}

/// OR across filter groups, with the delivery normalised once up front.
pub struct FilterEngine<'a> {
    diff: &'a dyn DiffProvider,
    supported: Vec<EventKind>,
    timeout: Option<Duration>,
}

impl<'a> FilterEngine<'a> {
    /// Engine accepting every kind the normaliser understands, with no deadline.
    pub fn new(diff: &'a dyn DiffProvider) -> Self {
        Self {
            diff,
            supported: vec![EventKind::Push, EventKind::PullRequest],
            timeout: None,
        }
    }

    /// Engine restricted to the configured event kinds and provider timeout.
    ///
    /// Configured names without a normaliser are dropped; they would only
    /// ever evaluate to `Unsupported` anyway.
    pub fn from_config(config: &Config, diff: &'a dyn DiffProvider) -> Self {
        let supported = config
            .settings
            .supported_events
            .iter()
            .filter_map(|name| EventKind::parse(name))
            .collect();
        Self {
            diff,
            supported,
            timeout: config.provider.timeout(),
        }
    }

    /// Override the deadline applied around diff-provider calls.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn supports(&self, event_kind: &str) -> bool {
        EventKind::parse(event_kind).is_some_and(|k| self.supported.contains(&k))
    }

    /// Evaluate a delivery against a repository's filter groups.
    ///
    /// `group_set` is `None` when the repository has no declared groups.
    /// Configuration, payload and collaborator problems are errors; every
    /// other outcome, including "nothing matched", is an [`EvaluationResult`].
    pub fn evaluate(
        &self,
        group_set: Option<&FilterGroupSet>,
        event_kind: &str,
        payload: &Value,
    ) -> Result<EvaluationResult, EvalError> {
        let Some(group_set) = group_set else {
            return Ok(EvaluationResult::Unconfigured);
        };

        if !self.supports(event_kind) {
            return Ok(EvaluationResult::Unsupported(event_kind.to_string()));
        }

        if group_set.is_empty() {
            return Ok(EvaluationResult::Unconfigured);
        }

        let deadline = self.timeout.map(Deadline::after);
        let ctx = match event::normalize_within(event_kind, payload, self.diff, deadline) {
            Ok(ctx) => ctx,
            Err(EvalError::UnsupportedEventKind(kind)) => {
                return Ok(EvaluationResult::Unsupported(kind));
            }
            Err(e) => return Err(e),
        };

        for (index, group) in group_set.groups.iter().enumerate() {
            if evaluate_group(group, &ctx, payload)? {
                return Ok(EvaluationResult::Matched(index));
            }
        }

        Ok(EvaluationResult::NotMatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FixtureDiffProvider, ProviderError};
    use serde_json::json;

    fn push_payload() -> Value {
        json!({
            "repository": {
                "name": "dummy-repo",
                "full_name": "user/dummy-repo",
                "private": "true"
            },
            "ref": "main",
            "before": "ba5eba5e",
            "after": "4eadbeef",
            "head_commit": { "message": "dummy-head-commit-message" },
            "sender": { "id": 1 }
        })
    }

    fn diff(paths: &[&str]) -> FixtureDiffProvider {
        FixtureDiffProvider::new().with_compare("ba5eba5e", "4eadbeef", paths.iter().copied())
    }

    fn set(groups: Vec<Vec<FilterPredicate>>) -> FilterGroupSet {
        FilterGroupSet::new(groups.into_iter().map(FilterGroup::new).collect())
    }

    fn push_ctx() -> EventContext {
        event::normalize("push", &push_payload(), &diff(&["a.py"])).unwrap()
    }

    #[test]
    fn empty_group_is_vacuously_true() {
        assert!(evaluate_group(&FilterGroup::default(), &push_ctx(), &push_payload()).unwrap());
    }

    #[test]
    fn group_is_and_of_predicates() {
        let ctx = push_ctx();
        let group = FilterGroup::new(vec![
            FilterPredicate::new("event", "push"),
            FilterPredicate::new("file_path", r".+\.py"),
        ]);
        assert!(evaluate_group(&group, &ctx, &push_payload()).unwrap());

        let group = FilterGroup::new(vec![
            FilterPredicate::new("event", "push"),
            FilterPredicate::new("file_path", r".+\.sh"),
        ]);
        assert!(!evaluate_group(&group, &ctx, &push_payload()).unwrap());
    }

    #[test]
    fn unavailable_field_fails_closed_even_when_excluding() {
        let ctx = push_ctx();
        for p in [
            FilterPredicate::new("head_ref", ".*"),
            FilterPredicate::excluding("head_ref", "feature"),
        ] {
            let group = FilterGroup::new(vec![p]);
            assert!(!evaluate_group(&group, &ctx, &push_payload()).unwrap());
        }
    }

    #[test]
    fn group_short_circuits_before_later_errors() {
        let group = FilterGroup::new(vec![
            FilterPredicate::new("event", "pull_request"),
            FilterPredicate::new("file_path", "(unclosed"),
        ]);
        assert!(!evaluate_group(&group, &push_ctx(), &push_payload()).unwrap());
    }

    #[test]
    fn group_propagates_resolver_errors() {
        let group = FilterGroup::new(vec![FilterPredicate::new("repository[", "x")]);
        let err = evaluate_group(&group, &push_ctx(), &push_payload()).unwrap_err();
        assert!(matches!(err, EvalError::InvalidFilterField { .. }));
    }

    #[test]
    fn absent_group_set_is_unconfigured() {
        let d = diff(&[]);
        let engine = FilterEngine::new(&d);
        assert_eq!(
            engine.evaluate(None, "push", &push_payload()).unwrap(),
            EvaluationResult::Unconfigured
        );
        assert_eq!(
            engine
                .evaluate(Some(&FilterGroupSet::default()), "push", &push_payload())
                .unwrap(),
            EvaluationResult::Unconfigured
        );
    }

    #[test]
    fn unsupported_kind_regardless_of_groups() {
        let d = diff(&[]);
        let engine = FilterEngine::new(&d);
        for groups in [
            set(vec![]),
            set(vec![vec![]]),
            set(vec![vec![FilterPredicate::new("event", ".*")]]),
        ] {
            assert_eq!(
                engine.evaluate(Some(&groups), "issue_comment", &json!({})).unwrap(),
                EvaluationResult::Unsupported("issue_comment".into())
            );
        }
    }

    #[test]
    fn first_matching_group_wins() {
        let d = diff(&["a.py"]);
        let engine = FilterEngine::new(&d);
        let groups = set(vec![
            vec![FilterPredicate::new("file_path", r"\.sh$")],
            vec![FilterPredicate::new("base_ref", "main")],
            vec![FilterPredicate::new("event", "push")],
        ]);
        assert_eq!(
            engine.evaluate(Some(&groups), "push", &push_payload()).unwrap(),
            EvaluationResult::Matched(1)
        );
    }

    #[test]
    fn later_group_errors_are_not_reached_after_a_match() {
        let d = diff(&["a.py"]);
        let engine = FilterEngine::new(&d);
        let groups = set(vec![
            vec![FilterPredicate::new("event", "push")],
            vec![FilterPredicate::new("file_path", "(unclosed")],
        ]);
        assert_eq!(
            engine.evaluate(Some(&groups), "push", &push_payload()).unwrap(),
            EvaluationResult::Matched(0)
        );
    }

    #[test]
    fn no_matching_group() {
        let d = diff(&["a.py"]);
        let engine = FilterEngine::new(&d);
        let groups = set(vec![vec![FilterPredicate::new("repository.private", "false")]]);
        assert_eq!(
            engine.evaluate(Some(&groups), "push", &push_payload()).unwrap(),
            EvaluationResult::NotMatched
        );
    }

    #[test]
    fn collaborator_failure_is_an_error_not_a_miss() {
        let d = FixtureDiffProvider::failing(ProviderError::Unauthorized);
        let engine = FilterEngine::new(&d);
        let groups = set(vec![vec![FilterPredicate::new("event", "push")]]);
        let err = engine
            .evaluate(Some(&groups), "push", &push_payload())
            .unwrap_err();
        assert!(err.is_server_error());
    }

    #[test]
    fn zero_timeout_surfaces_deadline() {
        let d = diff(&["a.py"]);
        let mut engine = FilterEngine::new(&d);
        engine.set_timeout(Some(Duration::ZERO));
        let groups = set(vec![vec![FilterPredicate::new("event", "push")]]);
        assert!(matches!(
            engine.evaluate(Some(&groups), "push", &push_payload()),
            Err(EvalError::DeadlineExceeded(_))
        ));
    }

    #[test]
    fn configured_kinds_narrow_support() {
        let d = diff(&["a.py"]);
        let mut config = Config::default_config();
        config.settings.supported_events = vec!["pull_request".into(), "release".into()];
        let engine = FilterEngine::from_config(&config, &d);
        let groups = set(vec![vec![FilterPredicate::new("event", "push")]]);
        assert_eq!(
            engine.evaluate(Some(&groups), "push", &push_payload()).unwrap(),
            EvaluationResult::Unsupported("push".into())
        );
        assert_eq!(
            engine.evaluate(Some(&groups), "release", &json!({})).unwrap(),
            EvaluationResult::Unsupported("release".into())
        );
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let d = diff(&["a.py", "b.sh"]);
        let engine = FilterEngine::new(&d);
        let groups = set(vec![
            vec![FilterPredicate::excluding("file_path", r"\.sh$")],
            vec![FilterPredicate::new("commit_message", "dummy")],
        ]);
        let first = engine.evaluate(Some(&groups), "push", &push_payload()).unwrap();
        let second = engine.evaluate(Some(&groups), "push", &push_payload()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, EvaluationResult::Matched(1));
    }
}
