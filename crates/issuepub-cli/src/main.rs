//! issuepub - publish markdown documents as GitHub issues
//!
//! Each document becomes at most one issue, keyed by title, no matter how
//! often the tool runs. Existence lookups are cached between runs.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

mod cmd;
mod config;

use config::Config;

/// Exit status for configuration and setup failures
const SETUP_FAILURE_EXIT: u8 = 2;

#[derive(Parser)]
#[command(name = "issuepub")]
#[command(about = "Publish markdown documents as GitHub issues, at most once each")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./issuepub.toml or ~/.config/issuepub/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Maximum retry attempts for rate-limited or failed API calls
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Publish documents (dry run unless --publish or PUBLISH=1)
    Publish(cmd::publish::PublishArgs),
    /// Validate documents without any network access
    Validate(cmd::validate::ValidateArgs),
    /// Inspect or clear the lookup cache
    Cache(cmd::cache::CacheArgs),
    /// Show resolved configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let progress = Arc::new(issuepub_core::ProgressContext::new());

    // TTY: warnings only unless --debug, the spinner shows activity.
    // non-TTY: info, log lines are the progress.
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = is_tty && !cli.debug;
    issuepub_core::init_logging(quiet, cli.debug, multi);

    if let Err(e) = issuepub_core::install_signal_handlers() {
        log::warn!("Cannot install signal handlers: {e}");
    }

    match run(cli, &progress) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(SETUP_FAILURE_EXIT)
        }
    }
}

fn run(cli: Cli, progress: &issuepub_core::SharedProgress) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    issuepub_core::set_http_config(http_settings(cli.timeout, cli.max_retries, &config));

    match cli.command {
        Command::Publish(args) => cmd::publish::run(args, &config, progress),
        Command::Validate(args) => cmd::validate::run(args, &config, progress),
        Command::Cache(args) => cmd::cache::run(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Config => print_config(&config).map(|()| ExitCode::SUCCESS),
    }
}

/// Flag, then config file, then built-in default.
fn http_settings(
    timeout: Option<u64>,
    max_retries: Option<u32>,
    config: &Config,
) -> issuepub_core::HttpConfig {
    let defaults = issuepub_core::HttpConfig::default();
    issuepub_core::HttpConfig {
        request_timeout: timeout
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout),
        max_retries: max_retries
            .or(config.pacing.max_retries)
            .unwrap_or(defaults.max_retries),
    }
}

/// Resolved settings; HTTP values come from the installed process config.
fn print_config(config: &Config) -> Result<()> {
    let resolved = config.resolve()?;
    let on_off = |b: bool| if b { "on" } else { "off" };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec!["Mode", resolved.mode().as_str()]);
    table.add_row(vec!["API URL", &resolved.api_url]);
    table.add_row(vec![
        "Repository",
        resolved.repository.as_deref().unwrap_or("not set"),
    ]);
    table.add_row(vec![
        "Token",
        if resolved.token.is_some() {
            "configured"
        } else {
            "not set"
        },
    ]);
    table.add_row(vec![
        "Source directory",
        &resolved.source_dir.display().to_string(),
    ]);
    table.add_row(vec!["Report", &resolved.report_path.display().to_string()]);
    table.add_row(vec!["Index", &resolved.index_path().display().to_string()]);
    table.add_row(vec![
        "Only prefix",
        resolved.only_prefix.as_deref().unwrap_or("-"),
    ]);
    table.add_row(vec!["Include meta", on_off(resolved.include_meta)]);
    table.add_row(vec!["Assignees", &resolved.assignees.join(", ")]);
    table.add_row(vec!["Close superseded", on_off(resolved.close_superseded)]);
    table.add_row(vec!["Add metadata", on_off(resolved.add_metadata)]);
    table.add_row(vec!["Validation fail on", resolved.fail_on.as_str()]);
    table.add_row(vec![
        "Cache",
        &if resolved.cache.disabled {
            "disabled".to_string()
        } else {
            format!(
                "{} ({} min TTL{})",
                resolved.cache.path.display(),
                resolved.cache.ttl_minutes,
                if resolved.cache.compress { ", gzip" } else { "" }
            )
        },
    ]);
    table.add_row(vec!["Pacing", &format!("{}ms", resolved.pacing.as_millis())]);
    table.add_row(vec![
        "Max retries",
        &issuepub_core::http_config().max_retries.to_string(),
    ]);
    table.add_row(vec![
        "Request timeout",
        &format!("{}s", issuepub_core::http_config().request_timeout.as_secs()),
    ]);

    eprintln!("\n{table}");
    Ok(())
}
