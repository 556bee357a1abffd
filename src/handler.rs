//! Transport-facing layer: one webhook delivery in, one status and JSON body out.
//!
//! This is where engine outcomes and errors become user-visible responses
//! and where they are logged; the engine itself does neither.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::{Config, FilterDocument};
use crate::event::EventKind;
use crate::filter::{EvalError, EvaluationResult, FilterEngine};
use crate::provider::{DiffProvider, SecretStore};
use crate::signature;
use crate::trigger::BuildRequest;

/// Header naming the event kind.
pub const EVENT_HEADER: &str = "X-GitHub-Event";

pub const MATCHED_MESSAGE: &str = "Payload fulfills at least one filter group";
pub const NOT_MATCHED_MESSAGE: &str = "Payload does not fulfill trigger requirements";
pub const UNCONFIGURED_MESSAGE: &str = "Filter groups were not defined for repository";

/// A webhook delivery as handed over by the HTTP front end.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Delivery {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
}

impl Delivery {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, kind: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({
                "isError": true,
                "type": kind,
                "message": message.into(),
            }),
        }
    }

    /// Whether the downstream build should run.
    pub fn trigger(&self) -> bool {
        self.body.get("trigger").and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Status code for an evaluation error.
pub fn status_for(err: &EvalError) -> u16 {
    match err {
        EvalError::InvalidFilterField { .. } | EvalError::InvalidPattern { .. } => 422,
        EvalError::UnsupportedEventKind(_) | EvalError::MalformedPayload(_) => 400,
        EvalError::CollaboratorUnavailable(_) => 502,
        EvalError::DeadlineExceeded(_) => 504,
    }
}

pub struct WebhookHandler<'a> {
    config: &'a Config,
    filters: &'a FilterDocument,
    secrets: &'a dyn SecretStore,
    diff: &'a dyn DiffProvider,
}

impl<'a> WebhookHandler<'a> {
    pub fn new(
        config: &'a Config,
        filters: &'a FilterDocument,
        secrets: &'a dyn SecretStore,
        diff: &'a dyn DiffProvider,
    ) -> Self {
        Self {
            config,
            filters,
            secrets,
            diff,
        }
    }

    /// Verify, evaluate, and map one delivery to a response.
    pub fn handle(&self, delivery: &Delivery) -> Response {
        if self.config.settings.verify_signature
            && let Err(resp) = self.verify(delivery)
        {
            return resp;
        }

        let payload: Value = match serde_json::from_str(&delivery.body) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("delivery body is not JSON: {e}");
                return Response::error(400, "MalformedPayload", "body is not valid JSON");
            }
        };
        let Some(repo) = payload.pointer("/repository/name").and_then(Value::as_str) else {
            return Response::error(
                400,
                "MalformedPayload",
                "payload is missing required field `repository.name`",
            );
        };
        let Some(event) = delivery.header(EVENT_HEADER) else {
            return Response::error(
                400,
                "MalformedPayload",
                format!("missing {EVENT_HEADER} header"),
            );
        };

        log::info!("triggered repo: {repo}");
        log::info!("event: {event}");

        let groups = self.filters.groups_for(repo);
        log::debug!("filter groups: {groups:?}");

        let engine = FilterEngine::from_config(self.config, self.diff);
        match engine.evaluate(groups, event, &payload) {
            Ok(result) => self.respond(&result, event, &payload),
            Err(e) => {
                if e.is_server_error() {
                    log::error!("evaluation failed for {repo}: {e}");
                } else {
                    log::warn!("evaluation rejected for {repo}: {e}");
                }
                Response::error(status_for(&e), e.kind(), e.to_string())
            }
        }
    }

    fn verify(&self, delivery: &Delivery) -> Result<(), Response> {
        let sig = &self.config.signature;
        let secret = self.secrets.get(&sig.secret_key).map_err(|e| {
            log::error!("cannot load webhook secret `{}`: {e}", sig.secret_key);
            Response::error(500, "ServerError", "Internal server error")
        })?;
        let header = delivery
            .header(&sig.header)
            .ok_or(signature::SignatureError::Missing);
        header
            .and_then(|h| signature::verify(&secret, h, delivery.body.as_bytes()))
            .map_err(|e| {
                log::warn!("signature rejected: {e}");
                Response::error(401, "SignatureError", e.to_string())
            })
    }

    fn respond(&self, result: &EvaluationResult, event: &str, payload: &Value) -> Response {
        log::info!("verdict: {}", result.label());
        match result {
            EvaluationResult::Matched(group) => Response::ok(json!({
                "message": MATCHED_MESSAGE,
                "matched_group": group,
                "trigger": true,
                "build": build_request(event, payload),
            })),
            EvaluationResult::NotMatched => Response::ok(json!({
                "message": NOT_MATCHED_MESSAGE,
                "trigger": false,
            })),
            EvaluationResult::Unconfigured => {
                let allow = self.config.settings.unconfigured_policy.allows();
                let mut body = json!({
                    "message": UNCONFIGURED_MESSAGE,
                    "trigger": allow,
                });
                if allow {
                    body["build"] = build_request(event, payload);
                }
                Response::ok(body)
            }
            EvaluationResult::Unsupported(kind) => Response::error(
                400,
                "UnsupportedEventKind",
                format!("GitHub event is not supported: {kind}"),
            ),
        }
    }
}

fn build_request(event: &str, payload: &Value) -> Value {
    EventKind::parse(event)
        .and_then(|kind| BuildRequest::from_event(kind, payload))
        .map_or(Value::Null, |req| json!(req))
}
