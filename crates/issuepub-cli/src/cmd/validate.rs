//! `issuepub validate` - parse and check documents, no network

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, ValueEnum};

use issuepub_core::SharedProgress;
use issuepub_source::FailurePolicy;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Directory of markdown documents
    #[arg(short, long)]
    pub source_dir: Option<PathBuf>,

    /// Run report output path
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Include `_`-prefixed meta documents
    #[arg(long)]
    pub include_meta: bool,

    /// Only documents whose file name starts with this prefix
    #[arg(long)]
    pub only_prefix: Option<String>,

    /// Exit with status 2 when any document has schema errors
    #[arg(long, value_enum)]
    pub fail_on: Option<FailOn>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FailOn {
    Errors,
    Warn,
}

impl From<FailOn> for FailurePolicy {
    fn from(f: FailOn) -> Self {
        match f {
            FailOn::Errors => FailurePolicy::Errors,
            FailOn::Warn => FailurePolicy::Warn,
        }
    }
}

pub fn run(args: ValidateArgs, file_config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let mut config = file_config.resolve()?;
    config.validate_only = true;
    if let Some(dir) = args.source_dir {
        config.source_dir = dir;
    }
    if let Some(report) = args.report {
        config.report_path = report;
    }
    if let Some(prefix) = args.only_prefix {
        config.only_prefix = Some(prefix);
    }
    config.include_meta |= args.include_meta;
    if let Some(policy) = args.fail_on {
        config.fail_on = policy.into();
    }
    log::debug!("validation failure policy: {}", config.fail_on.as_str());

    super::publish::execute(&config, progress)
}
