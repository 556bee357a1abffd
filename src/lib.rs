//! webhook-gate: decides whether a source-control webhook delivery should
//! trigger a downstream build.
//!
//! A repository's trigger policy is a set of filter groups. Each group is a
//! list of predicates (field, regex pattern, exclusion flag) that must all
//! hold; the delivery passes if any group holds. Evaluation yields one of
//! [`filter::EvaluationResult::Matched`], [`NotMatched`](filter::EvaluationResult::NotMatched),
//! [`Unsupported`](filter::EvaluationResult::Unsupported) or
//! [`Unconfigured`](filter::EvaluationResult::Unconfigured).
//!
//! # Architecture
//!
//! - **[`event`]**: Event normaliser and field resolver: payload → well-known fields.
//! - **[`query`]**: Path expressions over the raw payload for everything else.
//! - **[`filter`]**: Predicates, group evaluation, the filter engine, its errors.
//! - **[`provider`]**: Collaborators: diff provider and secret store.
//! - **[`handler`]**: Delivery in, status + JSON body out.
//! - **[`config`]**: Settings (embedded defaults + user overlay) and the filter-group document.
//! - **[`logging`]**: stderr diagnostics and the decision log.

/// Settings and filter-group document loading.
pub mod config;
/// Event kinds, normalisation, and field resolution.
pub mod event;
/// Filter data model and evaluation engine.
pub mod filter;
/// Webhook delivery handling and response mapping.
pub mod handler;
/// Logger setup and decision records.
pub mod logging;
/// Diff provider and secret store traits with implementations.
pub mod provider;
/// Path expressions over JSON payloads.
pub mod query;
/// Webhook signature verification.
pub mod signature;
/// Downstream build request derivation.
pub mod trigger;

use serde_json::Value;

use filter::{EvalError, EvaluationResult, FilterEngine, FilterGroupSet};
use provider::DiffProvider;

/// Evaluate a delivery with every supported event kind and no deadline.
///
/// This is the main entry point for tests and simple usage.
/// For deadlines or narrowed event kinds, build a [`FilterEngine`] directly.
pub fn evaluate(
    group_set: Option<&FilterGroupSet>,
    event_kind: &str,
    payload: &Value,
    diff: &dyn DiffProvider,
) -> Result<EvaluationResult, EvalError> {
    FilterEngine::new(diff).evaluate(group_set, event_kind, payload)
}
