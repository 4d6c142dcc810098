//! Run configuration, built once at startup.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use issuepub_github::RepoId;
use issuepub_source::{DiscoverFilter, FailurePolicy};
use issuepub_store::CacheOptions;

pub const DEFAULT_SOURCE_DIR: &str = "issues";
pub const DEFAULT_REPORT: &str = "issuepub-report.json";
pub const INDEX_FILE_NAME: &str = "INDEX.md";
pub const DEFAULT_PACING: Duration = Duration::from_millis(1000);

/// What a run is allowed to do remotely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Parse and validate only, zero network access
    ValidateOnly,
    /// Check existence when possible, never mutate the tracker
    DryRun,
    /// Create, close and comment
    Publish,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidateOnly => "validate-only",
            Self::DryRun => "dry-run",
            Self::Publish => "publish",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub source_dir: PathBuf,
    pub report_path: PathBuf,
    /// Index artifact; `<source_dir>/INDEX.md` when unset
    pub index_path: Option<PathBuf>,
    pub api_url: String,
    /// `owner/name`
    pub repository: Option<String>,
    pub token: Option<String>,
    pub publish: bool,
    pub validate_only: bool,
    pub include_meta: bool,
    pub only_prefix: Option<String>,
    /// Attached to every created item, before per-document assignees
    pub assignees: Vec<String>,
    pub close_superseded: bool,
    pub add_metadata: bool,
    pub fail_on: FailurePolicy,
    pub cache: CacheOptions,
    /// Sleep after every mutating call
    pub pacing: Duration,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            report_path: PathBuf::from(DEFAULT_REPORT),
            index_path: None,
            api_url: issuepub_github::client::DEFAULT_API_URL.to_string(),
            repository: None,
            token: None,
            publish: false,
            validate_only: false,
            include_meta: false,
            only_prefix: None,
            assignees: Vec::new(),
            close_superseded: false,
            add_metadata: false,
            fail_on: FailurePolicy::Warn,
            cache: CacheOptions::default(),
            pacing: DEFAULT_PACING,
        }
    }
}

/// `1`, `true`, `yes`, `on`, case-insensitive.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Comma-separated list, blanks dropped.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl PublishConfig {
    /// Overlay the process environment.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay environment switches read through `lookup`.
    ///
    /// Unset variables leave the current value alone. A set boolean
    /// switch wins in both directions, so `PUBLISH=0` turns publishing
    /// off even when the config file enabled it.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(repo) = non_empty("GITHUB_REPOSITORY") {
            self.repository = Some(repo.trim().to_string());
        }
        if let Some(token) = non_empty("GITHUB_TOKEN") {
            self.token = Some(token.trim().to_string());
        }

        let flags: [(&str, &mut bool); 8] = [
            ("PUBLISH", &mut self.publish),
            ("VALIDATE_ONLY", &mut self.validate_only),
            ("INCLUDE_META", &mut self.include_meta),
            ("CLOSE_SUPERSEDED", &mut self.close_superseded),
            ("ADD_METADATA", &mut self.add_metadata),
            ("DISABLE_CACHE", &mut self.cache.disabled),
            ("CLEAR_CACHE", &mut self.cache.clear),
            ("CACHE_COMPRESS", &mut self.cache.compress),
        ];
        for (key, slot) in flags {
            if let Some(value) = lookup(key) {
                *slot = is_truthy(&value);
            }
        }

        if let Some(prefix) = non_empty("ONLY_PREFIX") {
            self.only_prefix = Some(prefix.trim().to_string());
        }
        if let Some(list) = lookup("ASSIGNEES") {
            self.assignees = split_list(&list);
        }
        if let Some(ttl) = non_empty("CACHE_TTL_MINUTES") {
            let minutes: i64 = ttl
                .trim()
                .parse()
                .with_context(|| format!("CACHE_TTL_MINUTES must be a whole number, got {ttl:?}"))?;
            anyhow::ensure!(minutes >= 0, "CACHE_TTL_MINUTES must not be negative");
            self.cache.ttl_minutes = minutes;
        }
        if let Some(policy) = lookup("VALIDATION_FAIL_ON") {
            self.fail_on = FailurePolicy::from_name(&policy).with_context(|| {
                format!("VALIDATION_FAIL_ON must be `errors` or `warn`, got {policy:?}")
            })?;
        }
        Ok(())
    }

    pub fn index_path(&self) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| self.source_dir.join(INDEX_FILE_NAME))
    }

    /// Repository and token, when both are configured.
    pub fn credentials(&self) -> anyhow::Result<Option<(RepoId, &str)>> {
        match (self.repository.as_deref(), self.token.as_deref()) {
            (Some(repo), Some(token)) => Ok(Some((RepoId::parse(repo)?, token))),
            _ => Ok(None),
        }
    }

    /// Effective mode. Publishing without credentials degrades to a dry run.
    pub fn mode(&self) -> RunMode {
        if self.validate_only {
            RunMode::ValidateOnly
        } else if self.publish && self.repository.is_some() && self.token.is_some() {
            RunMode::Publish
        } else {
            RunMode::DryRun
        }
    }

    pub fn discover_filter(&self) -> DiscoverFilter {
        DiscoverFilter {
            include_meta: self.include_meta,
            prefix: self.only_prefix.clone(),
            exclude: vec![self.index_path()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn truthy_values() {
        for v in ["1", "true", "TRUE", "yes", "On", " on "] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["0", "false", "no", "", "enabled"] {
            assert!(!is_truthy(v), "{v}");
        }
    }

    #[test]
    fn defaults_are_dry_run() {
        let config = PublishConfig::default();
        assert_eq!(config.mode(), RunMode::DryRun);
        assert_eq!(config.cache.ttl_minutes, 60);
        assert_eq!(config.index_path(), PathBuf::from("issues/INDEX.md"));
    }

    #[test]
    fn env_switches() {
        let mut config = PublishConfig::default();
        config
            .apply_env_with(env(&[
                ("GITHUB_REPOSITORY", "acme/widgets"),
                ("GITHUB_TOKEN", "t0k"),
                ("PUBLISH", "yes"),
                ("ASSIGNEES", "alice, bob,,"),
                ("CACHE_TTL_MINUTES", "5"),
                ("CACHE_COMPRESS", "1"),
                ("ONLY_PREFIX", "ui-"),
                ("VALIDATION_FAIL_ON", "errors"),
            ]))
            .unwrap();
        assert_eq!(config.mode(), RunMode::Publish);
        assert_eq!(config.assignees, ["alice", "bob"]);
        assert_eq!(config.cache.ttl_minutes, 5);
        assert!(config.cache.compress);
        assert_eq!(config.only_prefix.as_deref(), Some("ui-"));
        assert_eq!(config.fail_on, FailurePolicy::Errors);
        let (repo, token) = config.credentials().unwrap().unwrap();
        assert_eq!(repo.to_string(), "acme/widgets");
        assert_eq!(token, "t0k");
    }

    #[test]
    fn publish_without_token_is_dry_run() {
        let mut config = PublishConfig::default();
        config
            .apply_env_with(env(&[("GITHUB_REPOSITORY", "acme/widgets"), ("PUBLISH", "1")]))
            .unwrap();
        assert_eq!(config.mode(), RunMode::DryRun);
        assert!(config.credentials().unwrap().is_none());
    }

    #[test]
    fn validate_only_wins() {
        let mut config = PublishConfig::default();
        config
            .apply_env_with(env(&[("PUBLISH", "1"), ("VALIDATE_ONLY", "true")]))
            .unwrap();
        assert_eq!(config.mode(), RunMode::ValidateOnly);
    }

    #[test]
    fn set_false_switch_overrides_file_value() {
        let mut config = PublishConfig {
            publish: true,
            ..Default::default()
        };
        config.apply_env_with(env(&[("PUBLISH", "0")])).unwrap();
        assert!(!config.publish);
    }

    #[test]
    fn invalid_values_are_errors() {
        let mut config = PublishConfig::default();
        assert!(config.apply_env_with(env(&[("CACHE_TTL_MINUTES", "soon")])).is_err());
        assert!(config.apply_env_with(env(&[("CACHE_TTL_MINUTES", "-1")])).is_err());
        assert!(config.apply_env_with(env(&[("VALIDATION_FAIL_ON", "strict")])).is_err());
    }

    #[test]
    fn invalid_repository_is_an_error() {
        let config = PublishConfig {
            repository: Some("widgets".into()),
            token: Some("t".into()),
            ..Default::default()
        };
        assert!(config.credentials().is_err());
    }

    #[test]
    fn index_is_excluded_from_discovery() {
        let config = PublishConfig {
            source_dir: PathBuf::from("docs"),
            ..Default::default()
        };
        assert_eq!(config.discover_filter().exclude, [PathBuf::from("docs/INDEX.md")]);
    }
}
