//! Source directory listing

use std::path::{Path, PathBuf};

use anyhow::Context;

/// File name prefix reserved for meta documents (templates, notes).
pub const META_PREFIX: char = '_';

/// Which files of a source directory are publishable.
#[derive(Debug, Clone, Default)]
pub struct DiscoverFilter {
    /// Include `_`-prefixed meta files
    pub include_meta: bool,
    /// Only files whose name starts with this prefix
    pub prefix: Option<String>,
    /// Files never treated as documents (e.g. the index artifact)
    pub exclude: Vec<PathBuf>,
}

impl DiscoverFilter {
    fn accepts(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if !self.include_meta && name.starts_with(META_PREFIX) {
            return false;
        }
        if let Some(prefix) = self.prefix.as_deref() {
            if !name.starts_with(prefix) {
                return false;
            }
        }
        !self
            .exclude
            .iter()
            .any(|ex| ex.file_name() == path.file_name() && same_dir(ex, path))
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    let canon = |p: &Path| p.parent().and_then(|d| d.canonicalize().ok());
    match (canon(a), canon(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.parent() == b.parent(),
    }
}

/// List `*.md` documents in `dir` (non-recursive), sorted by file name.
///
/// Sorting fixes the encounter order, which is the report order.
pub fn discover(dir: &Path, filter: &DiscoverFilter) -> anyhow::Result<Vec<PathBuf>> {
    anyhow::ensure!(
        dir.is_dir(),
        "Source directory does not exist: {}",
        dir.display()
    );

    let pattern = format!("{}/*.md", glob::Pattern::escape(&dir.to_string_lossy()));

    let mut entries: Vec<PathBuf> = glob::glob(&pattern)
        .context("invalid glob pattern")?
        .filter_map(|e| e.ok())
        .filter(|p| p.is_file() && filter.accepts(p))
        .collect();
    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    log::debug!("{}: {} documents", dir.display(), entries.len());
    Ok(entries)
}
