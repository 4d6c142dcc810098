//! Run report: one outcome record per document, in encounter order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use serde::{Deserialize, Serialize};

/// Terminal outcome of one document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Validate-only run
    Validate,
    /// Title already present in the tracker
    SkipExists,
    /// Would have been created (no publish switch or no credentials)
    DryRun,
    Created,
    Error,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::SkipExists => "skip-exists",
            Self::DryRun => "dry-run",
            Self::Created => "created",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub file: String,
    pub title: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ReportRecord {
    pub fn new(file: impl Into<String>, title: impl Into<String>, action: Action) -> Self {
        Self {
            file: file.into(),
            title: title.into(),
            action,
            number: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Ordered outcome records for one run.
#[derive(Debug, Default)]
pub struct RunReport {
    records: Vec<ReportRecord>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ReportRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ReportRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// file → number for every document created in this run
    pub fn created(&self) -> BTreeMap<String, u64> {
        self.records
            .iter()
            .filter(|r| r.action == Action::Created)
            .filter_map(|r| r.number.map(|n| (r.file.clone(), n)))
            .collect()
    }

    /// Any document ended in `error`.
    pub fn has_failures(&self) -> bool {
        self.records.iter().any(|r| r.action == Action::Error)
    }

    pub fn summary(&self) -> ReportSummary {
        let mut s = ReportSummary {
            total: self.records.len(),
            ..Default::default()
        };
        for r in &self.records {
            match r.action {
                Action::Validate => s.validated += 1,
                Action::SkipExists => s.skipped += 1,
                Action::DryRun => s.dry_run += 1,
                Action::Created => s.created += 1,
                Action::Error => s.failed += 1,
            }
            s.with_warnings += usize::from(!r.warnings.is_empty());
            s.with_errors += usize::from(!r.errors.is_empty());
        }
        s
    }

    /// Write as a pretty JSON array (tmp → rename).
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json =
            serde_json::to_string_pretty(&self.records).context("failed to serialize report")?;
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        std::fs::write(&tmp, json + "\n")
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let records = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Self { records })
    }
}

/// Counts per action for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub total: usize,
    pub validated: usize,
    pub skipped: usize,
    pub dry_run: usize,
    pub created: usize,
    pub failed: usize,
    pub with_warnings: usize,
    pub with_errors: usize,
}

impl ReportSummary {
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Outcome")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Documents").fg(Color::Cyan),
            ]);

        let rows = [
            (Action::Validate.as_str(), self.validated, Color::Reset),
            (Action::SkipExists.as_str(), self.skipped, Color::Reset),
            (Action::DryRun.as_str(), self.dry_run, Color::Yellow),
            (Action::Created.as_str(), self.created, Color::Green),
            (Action::Error.as_str(), self.failed, Color::Red),
        ];
        for (label, count, color) in rows {
            if count > 0 {
                table.add_row(vec![Cell::new(label), Cell::new(count).fg(color)]);
            }
        }
        table.add_row(vec![Cell::new("with warnings"), Cell::new(self.with_warnings)]);
        table.add_row(vec![Cell::new("with errors"), Cell::new(self.with_errors)]);
        table.add_row(vec![
            Cell::new("Total").add_attribute(comfy_table::Attribute::Bold),
            Cell::new(self.total).add_attribute(comfy_table::Attribute::Bold),
        ]);
        table.to_string()
    }

    /// Print table to stderr (TTY mode).
    pub fn print(&self) {
        eprintln!("\n{}", self.format_table());
    }

    /// One log line (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "Run summary: {} documents, {} created, {} skipped, {} dry-run, {} validated, {} failed ({} with errors, {} with warnings)",
            self.total,
            self.created,
            self.skipped,
            self.dry_run,
            self.validated,
            self.failed,
            self.with_errors,
            self.with_warnings
        );
    }
}
