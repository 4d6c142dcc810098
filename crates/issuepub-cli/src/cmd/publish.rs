//! `issuepub publish` - create tracker items for new documents

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use issuepub_core::SharedProgress;
use issuepub_github::{GitHubClient, IssueTracker};
use issuepub_pipeline::{PublishConfig, Publisher, RunMode};
use issuepub_store::Cache;

use crate::config::Config;

#[derive(Args, Debug, Default)]
pub struct PublishArgs {
    /// Directory of markdown documents
    #[arg(short, long)]
    pub source_dir: Option<PathBuf>,

    /// Run report output path
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Index artifact to annotate (default: <source-dir>/INDEX.md)
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Target repository, owner/name
    #[arg(long)]
    pub repository: Option<String>,

    /// Create items (otherwise dry run)
    #[arg(long)]
    pub publish: bool,

    /// Include `_`-prefixed meta documents
    #[arg(long)]
    pub include_meta: bool,

    /// Only documents whose file name starts with this prefix
    #[arg(long)]
    pub only_prefix: Option<String>,

    /// Assign created items (repeatable, replaces ASSIGNEES)
    #[arg(short, long = "assignee")]
    pub assignees: Vec<String>,

    /// Close items listed under `supersedes`
    #[arg(long)]
    pub close_superseded: bool,

    /// Comment source file, content hash and timestamp on created items
    #[arg(long)]
    pub add_metadata: bool,

    /// Bypass the persistent cache
    #[arg(long)]
    pub no_cache: bool,

    /// Wipe the persistent cache before the run
    #[arg(long)]
    pub clear_cache: bool,

    /// Minutes before a cache entry is stale
    #[arg(long)]
    pub ttl_minutes: Option<i64>,

    /// Milliseconds to wait after every mutating call
    #[arg(long)]
    pub pacing_ms: Option<u64>,
}

impl PublishArgs {
    /// Flags override file and environment only when given.
    pub fn apply(&self, config: &mut PublishConfig) {
        if let Some(dir) = &self.source_dir {
            config.source_dir = dir.clone();
        }
        if let Some(report) = &self.report {
            config.report_path = report.clone();
        }
        if let Some(index) = &self.index {
            config.index_path = Some(index.clone());
        }
        if let Some(repo) = &self.repository {
            config.repository = Some(repo.clone());
        }
        if let Some(prefix) = &self.only_prefix {
            config.only_prefix = Some(prefix.clone());
        }
        if !self.assignees.is_empty() {
            config.assignees = self.assignees.clone();
        }
        if let Some(ttl) = self.ttl_minutes {
            config.cache.ttl_minutes = ttl;
        }
        if let Some(ms) = self.pacing_ms {
            config.pacing = Duration::from_millis(ms);
        }
        config.publish |= self.publish;
        config.include_meta |= self.include_meta;
        config.close_superseded |= self.close_superseded;
        config.add_metadata |= self.add_metadata;
        config.cache.disabled |= self.no_cache;
        config.cache.clear |= self.clear_cache;
    }
}

pub fn run(args: PublishArgs, file_config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let mut config = file_config.resolve()?;
    args.apply(&mut config);
    execute(&config, progress)
}

/// Shared by `publish` and `validate`.
pub fn execute(config: &PublishConfig, progress: &SharedProgress) -> Result<ExitCode> {
    let mode = config.mode();

    let client = if mode == RunMode::ValidateOnly {
        None
    } else {
        match config.credentials()? {
            Some((repo, token)) => {
                log::info!("Tracker: {repo}");
                Some(GitHubClient::new(&config.api_url, repo, token))
            }
            None => {
                log::info!("No repository or token configured, existence checks skipped");
                None
            }
        }
    };
    let tracker = client.as_ref().map(|c| c as &dyn IssueTracker);

    // Validation never touches the cache file
    let cache = if mode == RunMode::ValidateOnly {
        Cache::disabled()
    } else {
        Cache::open(config.cache.clone())
    };

    let outcome = Publisher::new(config, tracker, cache, progress.clone()).run()?;
    let status = outcome.exit_status(config.fail_on);
    if status != 0 {
        log::warn!("Finished with exit status {status}");
    }
    Ok(ExitCode::from(status))
}
