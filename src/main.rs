//! webhook-gate: evaluates one webhook delivery against its repository's filter groups.
//!
//! Reads a delivery (`{"headers": {...}, "body": "<raw JSON string>"}`) from
//! stdin and writes `{"status": <code>, "body": {...}}` to stdout.
//!
//! Usage:
//!   webhook-gate [--config PATH] [--filter-groups PATH]
//!                [--git-dir PATH | --diff-fixture PATH] [--verbose]
//!   webhook-gate check [--config PATH] [--filter-groups PATH]

use std::io::Read;
use std::path::PathBuf;

use log::LevelFilter;
use webhook_gate::config::{Config, FilterDocument};
use webhook_gate::handler::{Delivery, WebhookHandler};
use webhook_gate::logging;
use webhook_gate::provider::{DiffProvider, EnvSecretStore, FixtureDiffProvider, GitDiffProvider};

#[derive(Debug, Default)]
struct Args {
    check: bool,
    verbose: bool,
    config: Option<PathBuf>,
    filter_groups: Option<PathBuf>,
    git_dir: Option<PathBuf>,
    diff_fixture: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .map(PathBuf::from)
                .ok_or_else(|| format!("{name} requires a value"))
        };
        match arg.as_str() {
            "check" => args.check = true,
            "--verbose" | "-v" => args.verbose = true,
            "--config" => args.config = Some(value("--config")?),
            "--filter-groups" => args.filter_groups = Some(value("--filter-groups")?),
            "--git-dir" => args.git_dir = Some(value("--git-dir")?),
            "--diff-fixture" => args.diff_fixture = Some(value("--diff-fixture")?),
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(args)
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("webhook-gate: {msg}");
    std::process::exit(1);
}

fn main() {
    let args = parse_args().unwrap_or_else(|e| fail(e));
    logging::init(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    let config = match &args.config {
        Some(path) => Config::load_from(path).unwrap_or_else(|e| fail(e)),
        None => Config::load(),
    };
    let filter_path = args
        .filter_groups
        .clone()
        .unwrap_or_else(|| config.paths.filter_groups_path());
    let filters = FilterDocument::load(&filter_path).unwrap_or_else(|e| fail(e));

    if args.check {
        match filters.validate() {
            Ok(()) => {
                let count = filters.repositories().count();
                println!("{}: {count} repositories OK", filter_path.display());
                return;
            }
            Err(e) => fail(e),
        }
    }

    let diff: Box<dyn DiffProvider> = match (&args.diff_fixture, &args.git_dir) {
        (Some(path), _) => Box::new(FixtureDiffProvider::from_path(path).unwrap_or_else(|e| {
            fail(format!("cannot load diff fixture {}: {e}", path.display()))
        })),
        (None, Some(dir)) => {
            Box::new(GitDiffProvider::new(dir).with_timeout(config.provider.timeout()))
        }
        (None, None) => Box::new(
            GitDiffProvider::new(config.provider.git_dir_path())
                .with_timeout(config.provider.timeout()),
        ),
    };

    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        fail(format!("failed to read stdin: {e}"));
    }
    let delivery: Delivery =
        serde_json::from_str(&input).unwrap_or_else(|e| fail(format!("JSON parse error: {e}")));

    let secrets = EnvSecretStore;
    let handler = WebhookHandler::new(&config, &filters, &secrets, diff.as_ref());
    let response = handler.handle(&delivery);
    logging::log_decision(&delivery, &response);

    match serde_json::to_string(&response) {
        Ok(out) => println!("{out}"),
        Err(e) => fail(format!("cannot encode response: {e}")),
    }
    if response.status >= 400 {
        std::process::exit(1);
    }
}
