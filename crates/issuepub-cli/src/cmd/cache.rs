//! `issuepub cache` - inspect or reset the persistent lookup cache

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use issuepub_store::{Cache, CacheOptions};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,

    /// Cache file (default from config / environment)
    #[arg(short, long, global = true)]
    pub path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show entry counts, stale counts and on-disk form
    Info,
    /// Remove both on-disk forms
    Clear,
}

pub fn run(args: CacheArgs, file_config: &Config) -> Result<()> {
    let mut options = file_config.resolve()?.cache;
    if let Some(path) = args.path {
        options.path = path;
    }
    match args.action {
        CacheAction::Info => info(options),
        CacheAction::Clear => clear(&options),
    }
}

fn file_cell(path: &Path) -> Cell {
    match std::fs::metadata(path) {
        Ok(meta) => Cell::new(format!("{} bytes", meta.len())).fg(Color::Green),
        Err(_) => Cell::new("absent").fg(Color::DarkGrey),
    }
}

fn info(options: CacheOptions) -> Result<()> {
    let plain = options.plain_path();
    let compressed = options.compressed_path();
    let ttl = options.ttl_minutes;
    let cache = Cache::open(CacheOptions {
        clear: false,
        disabled: false,
        ..options
    });
    let stats = cache.stats(Utc::now());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Namespace").fg(Color::Cyan),
            Cell::new("Entries").fg(Color::Cyan),
            Cell::new("Stale").fg(Color::Cyan),
        ]);
    table.add_row(vec![
        Cell::new("exists"),
        Cell::new(stats.exists_total),
        Cell::new(stats.exists_stale).fg(Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("searches"),
        Cell::new(stats.searches_total),
        Cell::new(stats.searches_stale).fg(Color::Yellow),
    ]);

    let mut files = Table::new();
    files
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Form").fg(Color::Cyan),
            Cell::new("Path").fg(Color::Cyan),
            Cell::new("Size").fg(Color::Cyan),
        ]);
    files.add_row(vec![
        Cell::new("json"),
        Cell::new(plain.display()),
        file_cell(&plain),
    ]);
    files.add_row(vec![
        Cell::new("gzip"),
        Cell::new(compressed.display()),
        file_cell(&compressed),
    ]);

    eprintln!("\n{files}");
    eprintln!("{table}");
    eprintln!("TTL: {ttl} minutes");
    Ok(())
}

fn clear(options: &CacheOptions) -> Result<()> {
    let removed = Cache::remove_files(options)?;
    if removed == 0 {
        eprintln!("No cache files found.");
    } else {
        eprintln!("Removed {removed} cache file(s).");
    }
    Ok(())
}
