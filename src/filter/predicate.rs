use regex::Regex;
use serde::{Deserialize, Serialize};

use super::EvalError;

/// One field/pattern rule.
///
/// Deserializes from `{"field": .., "pattern": .., "exclude_matched": ..}`;
/// `type` and `exclude_matched_filter` are accepted as older spellings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FilterPredicate {
    /// Well-known field name or a path into the payload.
    #[serde(alias = "type")]
    pub field: String,
    /// Regular expression searched (unanchored) in each value.
    pub pattern: String,
    /// Invert: satisfied only when no value matches.
    #[serde(
        default,
        alias = "excludeMatched",
        alias = "exclude_matched_filter"
    )]
    pub exclude_matched: bool,
}

impl FilterPredicate {
    /// Predicate that holds when any value of `field` matches `pattern`.
    pub fn new(field: &str, pattern: &str) -> Self {
        Self {
            field: field.to_string(),
            pattern: pattern.to_string(),
            exclude_matched: false,
        }
    }

    /// Predicate that holds when no value of `field` matches `pattern`.
    pub fn excluding(field: &str, pattern: &str) -> Self {
        Self {
            exclude_matched: true,
            ..Self::new(field, pattern)
        }
    }

    /// Compile the pattern; an invalid one is a configuration error.
    pub fn compile(&self) -> Result<Regex, EvalError> {
        Regex::new(&self.pattern).map_err(|source| EvalError::InvalidPattern {
            field: self.field.clone(),
            pattern: self.pattern.clone(),
            source,
        })
    }

    /// Evaluate this predicate against resolved values.
    pub fn matches(&self, values: &[String]) -> Result<bool, EvalError> {
        Ok(satisfied(&self.compile()?, self.exclude_matched, values))
    }
}

/// Core matching rule.
///
/// `hit` is whether any value contains a match. A normal predicate needs a
/// hit; an excluding one needs every value to be clear of the pattern.
pub fn satisfied(re: &Regex, exclude_matched: bool, values: &[String]) -> bool {
    let hit = values.iter().any(|v| re.is_match(v));
    hit != exclude_matched
}

/// AND-combined predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FilterGroup {
    pub predicates: Vec<FilterPredicate>,
}

impl FilterGroup {
    pub fn new(predicates: Vec<FilterPredicate>) -> Self {
        Self { predicates }
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// OR-combined groups: the full trigger policy for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FilterGroupSet {
    pub groups: Vec<FilterGroup>,
}

impl FilterGroupSet {
    pub fn new(groups: Vec<FilterGroup>) -> Self {
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
