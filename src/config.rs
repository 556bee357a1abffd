use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::event::fields;
use crate::filter::{EvalError, FilterGroupSet};
use crate::query;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// Errors loading settings or the filter-group document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {}: {source}", .path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid filter-group document: {0}")]
    Document(#[from] serde_json::Error),
    #[error("repository `{repo}`, group {group}, predicate {predicate}: {source}")]
    InvalidPredicate {
        repo: String,
        group: usize,
        predicate: usize,
        #[source]
        source: EvalError,
    },
}

// ── Final (merged) config types ──

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub signature: SignatureConfig,
}

/// Policy for repositories with no filter groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnconfiguredPolicy {
    #[default]
    Allow,
    Deny,
}

impl UnconfiguredPolicy {
    pub fn allows(self) -> bool {
        self == UnconfiguredPolicy::Allow
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub unconfigured_policy: UnconfiguredPolicy,
    #[serde(default)]
    pub supported_events: Vec<String>,
    #[serde(default)]
    pub verify_signature: bool,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Paths {
    #[serde(default)]
    pub filter_groups: String,
}

impl Paths {
    /// Filter-group document path with `~` expanded.
    pub fn filter_groups_path(&self) -> PathBuf {
        expand(&self.filter_groups)
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ProviderConfig {
    /// Seconds; zero disables the deadline.
    #[serde(default)]
    pub timeout_secs: u64,
    #[serde(default)]
    pub git_dir: String,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn git_dir_path(&self) -> PathBuf {
        expand(&self.git_dir)
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct SignatureConfig {
    /// Header carrying `sha256=<hex>`.
    #[serde(default)]
    pub header: String,
    /// Key looked up in the secret store for the signing secret.
    #[serde(default)]
    pub secret_key: String,
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    paths: PathsOverlay,
    #[serde(default)]
    provider: ProviderOverlay,
    #[serde(default)]
    signature: SignatureOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    #[serde(default)]
    replace: bool,
    unconfigured_policy: Option<UnconfiguredPolicy>,
    #[serde(default)]
    supported_events: Vec<String>,
    #[serde(default)]
    remove_supported_events: Vec<String>,
    verify_signature: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct PathsOverlay {
    filter_groups: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ProviderOverlay {
    timeout_secs: Option<u64>,
    git_dir: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SignatureOverlay {
    header: Option<String>,
    secret_key: Option<String>,
}

// ── Merge logic ──

/// Merge a user list into a default list.
/// In replace mode: user list replaces default entirely.
/// In merge mode: remove items first, then extend with additions (deduped).
fn merge_list(base: &mut Vec<String>, add: Vec<String>, remove: &[String], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.contains(item));
        for item in add {
            if !base.contains(&item) {
                base.push(item);
            }
        }
    }
}

fn set_if<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Defaults merged with the user overlay at
    /// `~/.config/webhook-gate/config.toml`, if present.
    ///
    /// A broken overlay is reported and ignored so the gate keeps running
    /// on defaults.
    pub fn load() -> Self {
        let mut config = Self::default_config();
        let Some(home) = std::env::var_os("HOME") else {
            return config;
        };
        let path = Path::new(&home).join(".config/webhook-gate/config.toml");
        if !path.exists() {
            return config;
        }
        match Self::read_overlay(&path) {
            Ok(overlay) => config.apply_overlay(overlay),
            Err(e) => log::warn!("ignoring user config: {e}"),
        }
        config
    }

    /// Defaults merged with an explicitly named overlay. Errors are fatal here.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default_config();
        config.apply_overlay(Self::read_overlay(path)?);
        Ok(config)
    }

    fn read_overlay(path: &Path) -> Result<ConfigOverlay, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let s = overlay.settings;
        set_if(&mut self.settings.unconfigured_policy, s.unconfigured_policy);
        set_if(&mut self.settings.verify_signature, s.verify_signature);
        merge_list(
            &mut self.settings.supported_events,
            s.supported_events,
            &s.remove_supported_events,
            s.replace,
        );

        set_if(&mut self.paths.filter_groups, overlay.paths.filter_groups);

        let p = overlay.provider;
        set_if(&mut self.provider.timeout_secs, p.timeout_secs);
        set_if(&mut self.provider.git_dir, p.git_dir);

        let sig = overlay.signature;
        set_if(&mut self.signature.header, sig.header);
        set_if(&mut self.signature.secret_key, sig.secret_key);
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}

// ── Filter-group document ──

/// Filter groups for every monitored repository, keyed by repository name.
///
/// A repository mapped to `null` is declared but ungated, which is
/// reported the same way as one that is missing entirely.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FilterDocument {
    repos: BTreeMap<String, Option<FilterGroupSet>>,
}

impl FilterDocument {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Groups for `repo`, or `None` when it has no declared groups.
    pub fn groups_for(&self, repo: &str) -> Option<&FilterGroupSet> {
        self.repos
            .get(repo)
            .and_then(Option::as_ref)
            .filter(|set| !set.is_empty())
    }

    pub fn repositories(&self) -> impl Iterator<Item = &str> {
        self.repos.keys().map(String::as_str)
    }

    /// Compile every pattern and parse every path field, reporting the first problem.
    ///
    /// Evaluation does not need this; it finds the same errors lazily, but
    /// only in groups it actually reaches.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (repo, set) in &self.repos {
            let Some(set) = set else { continue };
            for (g, group) in set.groups.iter().enumerate() {
                for (p, predicate) in group.predicates.iter().enumerate() {
                    let checked = predicate.compile().and_then(|_| {
                        if fields::is_well_known(&predicate.field) {
                            return Ok(());
                        }
                        query::parse(&predicate.field).map(drop).map_err(|source| {
                            EvalError::InvalidFilterField {
                                field: predicate.field.clone(),
                                source,
                            }
                        })
                    });
                    checked.map_err(|source| ConfigError::InvalidPredicate {
                        repo: repo.clone(),
                        group: g,
                        predicate: p,
                        source,
                    })?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let config = Config::default_config();
        assert_eq!(config.settings.unconfigured_policy, UnconfiguredPolicy::Allow);
        assert_eq!(config.settings.supported_events, vec!["push", "pull_request"]);
        assert!(config.settings.verify_signature);
        assert_eq!(config.paths.filter_groups, "/opt/filter_groups.json");
        assert_eq!(config.provider.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.signature.header, "X-Hub-Signature-256");
        assert_eq!(config.signature.secret_key, "GITHUB_WEBHOOK_SECRET");
    }

    #[test]
    fn overlay_scalars_override() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [settings]
            unconfigured_policy = "deny"
            verify_signature = false

            [provider]
            timeout_secs = 0
            "#,
        );
        assert!(!config.settings.unconfigured_policy.allows());
        assert!(!config.settings.verify_signature);
        assert_eq!(config.provider.timeout(), None);
    }

    #[test]
    fn overlay_extends_and_removes_events() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [settings]
            supported_events = ["push", "release"]
            remove_supported_events = ["pull_request"]
            "#,
        );
        assert_eq!(config.settings.supported_events, vec!["push", "release"]);
    }

    #[test]
    fn overlay_replace_events() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [settings]
            replace = true
            supported_events = ["pull_request"]
            "#,
        );
        assert_eq!(config.settings.supported_events, vec!["pull_request"]);
    }

    #[test]
    fn empty_overlay_changes_nothing() {
        let mut config = Config::default_config();
        config.apply_overlay_str("");
        assert_eq!(config.settings.supported_events.len(), 2);
        assert_eq!(config.paths.filter_groups, "/opt/filter_groups.json");
        assert_eq!(config.provider.git_dir, ".");
    }

    #[test]
    fn tilde_paths_expand() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [paths]
            filter_groups = "~/filters.json"
            "#,
        );
        let path = config.paths.filter_groups_path();
        assert!(path.ends_with("filters.json"));
        assert!(!path.starts_with("~"));
    }

    #[test]
    fn load_from_missing_file_is_read_error() {
        let err = Config::load_from(Path::new("/nonexistent/webhook-gate.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn document_lookup() {
        let doc = FilterDocument::from_json(
            r#"{
                "gated": [[{"type": "event", "pattern": "push"}]],
                "declared-null": null,
                "declared-empty": []
            }"#,
        )
        .unwrap();
        assert_eq!(doc.groups_for("gated").map(|s| s.groups.len()), Some(1));
        assert!(doc.groups_for("declared-null").is_none());
        assert!(doc.groups_for("declared-empty").is_none());
        assert!(doc.groups_for("missing").is_none());
        assert_eq!(
            doc.repositories().collect::<Vec<_>>(),
            vec!["declared-empty", "declared-null", "gated"]
        );
    }

    #[test]
    fn document_rejects_wrong_shape() {
        assert!(matches!(
            FilterDocument::from_json(r#"{"repo": {"field": "event"}}"#),
            Err(ConfigError::Document(_))
        ));
    }

    #[test]
    fn validate_accepts_good_document() {
        let doc = FilterDocument::from_json(
            r#"{"repo": [[
                {"field": "file_path", "pattern": ".+\\.py"},
                {"field": "repository.private", "pattern": "true"}
            ]]}"#,
        )
        .unwrap();
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn validate_reports_bad_pattern_position() {
        let doc = FilterDocument::from_json(
            r#"{"repo": [
                [{"field": "event", "pattern": "push"}],
                [{"field": "event", "pattern": "push"}, {"field": "file_path", "pattern": "(x"}]
            ]}"#,
        )
        .unwrap();
        match doc.validate().unwrap_err() {
            ConfigError::InvalidPredicate {
                repo,
                group,
                predicate,
                source,
            } => {
                assert_eq!(repo, "repo");
                assert_eq!((group, predicate), (1, 1));
                assert!(matches!(source, EvalError::InvalidPattern { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_reports_bad_path_field() {
        let doc = FilterDocument::from_json(
            r#"{"repo": [[{"field": "commits[", "pattern": "x"}]]}"#,
        )
        .unwrap();
        assert!(matches!(
            doc.validate(),
            Err(ConfigError::InvalidPredicate {
                source: EvalError::InvalidFilterField { .. },
                ..
            })
        ));
    }
}
