//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use issuepub_pipeline::PublishConfig;
use serde::Deserialize;

/// `issuepub.toml`. Every field is optional; unset fields keep the
/// built-in default.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub github: GithubConfig,
    pub cache: CacheConfig,
    pub paths: PathsConfig,
    pub pacing: PacingConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct GithubConfig {
    pub api_url: Option<String>,
    pub repository: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub path: Option<PathBuf>,
    pub ttl_minutes: Option<i64>,
    pub compress: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub source_dir: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub index: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PacingConfig {
    pub delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./issuepub.toml (current directory)
    /// 2. ~/.config/issuepub/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("issuepub.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "issuepub") {
            let user_config = dirs.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Defaults overlaid with this file, then with the environment.
    ///
    /// Command-line flags are applied by the caller afterwards.
    pub fn resolve(&self) -> Result<PublishConfig> {
        let mut resolved = PublishConfig::default();
        self.apply_to(&mut resolved);
        resolved.apply_env()?;
        Ok(resolved)
    }

    fn apply_to(&self, config: &mut PublishConfig) {
        if let Some(url) = &self.github.api_url {
            config.api_url = url.clone();
        }
        if let Some(repo) = &self.github.repository {
            config.repository = Some(repo.clone());
        }
        if let Some(token) = &self.github.token {
            config.token = Some(token.clone());
        }

        if let Some(path) = &self.cache.path {
            config.cache.path = path.clone();
        }
        if let Some(ttl) = self.cache.ttl_minutes {
            config.cache.ttl_minutes = ttl;
        }
        if let Some(compress) = self.cache.compress {
            config.cache.compress = compress;
        }

        if let Some(dir) = &self.paths.source_dir {
            config.source_dir = dir.clone();
        }
        if let Some(report) = &self.paths.report {
            config.report_path = report.clone();
        }
        if let Some(index) = &self.paths.index {
            config.index_path = Some(index.clone());
        }

        // max_retries is process-wide HTTP state, installed in main
        if let Some(ms) = self.pacing.delay_ms {
            config.pacing = Duration::from_millis(ms);
        }
    }
}
