use std::fs::OpenOptions;
use std::path::PathBuf;

use log::LevelFilter;
use serde_json::Value;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};

use crate::handler::{Delivery, EVENT_HEADER, Response};

/// Log target reserved for decision records.
const DECISION_TARGET: &str = "webhook_gate::decisions";

/// ~/.local/share/webhook-gate/decisions.log
fn decision_log_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".local/share/webhook-gate/decisions.log"))
}

/// Install the process logger: diagnostics to stderr (stdout carries the
/// response), decision records appended to the decision log.
///
/// Best-effort: if the decision log can't be opened, only stderr logging is set up.
pub fn init(level: LevelFilter) {
    let term_config = ConfigBuilder::new()
        .add_filter_ignore_str(DECISION_TARGET)
        .build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        term_config,
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(path) = decision_log_path() {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) {
            let file_config = ConfigBuilder::new()
                .add_filter_allow_str(DECISION_TARGET)
                .set_time_format_rfc3339()
                .build();
            loggers.push(WriteLogger::new(LevelFilter::Info, file_config, file));
        }
    }

    // Already initialised (e.g. in tests) is fine.
    let _ = CombinedLogger::init(loggers);
}

/// One tab-separated record per delivery: label, status, repo, event, message.
pub fn decision_record(delivery: &Delivery, response: &Response) -> String {
    let repo = serde_json::from_str::<Value>(&delivery.body)
        .ok()
        .and_then(|v| {
            v.pointer("/repository/full_name")
                .or_else(|| v.pointer("/repository/name"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "-".into());
    let event = delivery.header(EVENT_HEADER).unwrap_or("-");
    let label = if response.status >= 400 {
        "ERROR"
    } else if response.trigger() {
        "TRIGGER"
    } else {
        "SKIP"
    };
    // Compact single-line message for the log
    let message = response
        .body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("")
        .replace('\n', "; ");

    format!(
        "{label}\t{status}\t{repo}\t{event}\t{message}",
        status = response.status
    )
}

/// Emit the decision record for a handled delivery.
pub fn log_decision(delivery: &Delivery, response: &Response) {
    log::info!(target: DECISION_TARGET, "{}", decision_record(delivery, response));
}
