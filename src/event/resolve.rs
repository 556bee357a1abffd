use serde_json::Value;

use super::{EventContext, fields};
use crate::filter::EvalError;
use crate::query;

/// Values a predicate's field resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Field resolved; the sequence may be empty when a path matched nothing.
    Values(Vec<String>),
    /// A well-known field that this event kind never carries (e.g. `head_ref` on a push).
    Unavailable,
}

/// Resolve a predicate field against the well-known context, falling back
/// to a path query over the raw payload.
pub fn resolve(field: &str, ctx: &EventContext, payload: &Value) -> Result<Resolved, EvalError> {
    if let Some(values) = ctx.get(field) {
        return Ok(Resolved::Values(values.to_vec()));
    }

    // Well-known for another kind: must not fall through to the payload.
    if fields::is_well_known(field) {
        return Ok(Resolved::Unavailable);
    }

    query::select(payload, field)
        .map(Resolved::Values)
        .map_err(|source| EvalError::InvalidFilterField {
            field: field.to_string(),
            source,
        })
}
