//! Persistent lookup cache carried between runs.
//!
//! One JSON document, plain or gzip-compressed (never both on disk):
//!
//! ```text
//! {
//!   "version": 1,
//!   "saved_at": "...",
//!   "ttl_minutes": 60,
//!   "exists":   { "<normalized title>": { "value": true, "captured_at": "..." } },
//!   "searches": { "<normalized title>": { "value": [ ... ], "captured_at": "..." } }
//! }
//! ```
//!
//! Loaded once at startup and flushed once at the end of a run. Stale
//! entries read as misses and stay on disk until the next `put` for the
//! same key. The tracker is ground truth, so every failure here degrades
//! to a cold cache with a warning instead of an error.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Bump when the on-disk layout changes; older files load as cold.
pub const CACHE_FORMAT_VERSION: u32 = 1;

pub const DEFAULT_TTL_MINUTES: i64 = 60;

/// Independent key spaces sharing one file and one TTL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Namespace {
    /// Boolean "title already exists remotely"
    Exists,
    /// Full search results for supersede resolution
    Searches,
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exists => f.write_str("exists"),
            Self::Searches => f.write_str("searches"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    saved_at: DateTime<Utc>,
    ttl_minutes: i64,
    #[serde(default)]
    exists: BTreeMap<String, CacheEntry>,
    #[serde(default)]
    searches: BTreeMap<String, CacheEntry>,
}

/// Where and how the cache lives on disk.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Plain JSON path; the compressed form is this path plus `.gz`
    pub path: PathBuf,
    pub ttl_minutes: i64,
    pub compress: bool,
    /// Wipe on-disk state before loading (cold cache for this run)
    pub clear: bool,
    /// No load, no save, every `get` misses
    pub disabled: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".issuepub-cache.json"),
            ttl_minutes: DEFAULT_TTL_MINUTES,
            compress: false,
            clear: false,
            disabled: false,
        }
    }
}

impl CacheOptions {
    pub fn plain_path(&self) -> PathBuf {
        self.path.clone()
    }

    pub fn compressed_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".gz");
        PathBuf::from(name)
    }

    /// (preferred, fallback) paths for the current setting
    fn paths(&self) -> (PathBuf, PathBuf) {
        if self.compress {
            (self.compressed_path(), self.plain_path())
        } else {
            (self.plain_path(), self.compressed_path())
        }
    }
}

/// Entry counts for `cache info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub exists_total: usize,
    pub exists_stale: usize,
    pub searches_total: usize,
    pub searches_stale: usize,
}

/// Two-namespace TTL cache.
#[derive(Debug)]
pub struct Cache {
    /// None for in-memory caches (tests)
    options: Option<CacheOptions>,
    ttl: TimeDelta,
    disabled: bool,
    exists: BTreeMap<String, CacheEntry>,
    searches: BTreeMap<String, CacheEntry>,
    dirty: bool,
}

impl Cache {
    /// Load according to `options`. Never fails.
    pub fn open(options: CacheOptions) -> Self {
        let mut cache = Self {
            ttl: ttl_delta(options.ttl_minutes),
            disabled: options.disabled,
            exists: BTreeMap::new(),
            searches: BTreeMap::new(),
            dirty: false,
            options: None,
        };

        if options.disabled {
            log::info!("cache: disabled for this run");
            return cache;
        }

        if options.clear {
            match Self::remove_files(&options) {
                Ok(0) => log::info!("cache: clear requested, nothing on disk"),
                Ok(n) => log::info!("cache: cleared {n} file(s)"),
                Err(e) => log::warn!("cache: clear failed: {e:#}"),
            }
        } else {
            cache.load(&options);
        }

        cache.options = Some(options);
        cache
    }

    /// Cache that never touches disk.
    pub fn in_memory(ttl_minutes: i64) -> Self {
        Self {
            options: None,
            ttl: ttl_delta(ttl_minutes),
            disabled: false,
            exists: BTreeMap::new(),
            searches: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Cache where `get` always misses and `put` does nothing.
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::in_memory(DEFAULT_TTL_MINUTES)
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn load(&mut self, options: &CacheOptions) {
        let (preferred, fallback) = options.paths();
        let (path, compressed) = if preferred.exists() {
            (preferred, options.compress)
        } else if fallback.exists() {
            log::info!(
                "cache: {} not found, migrating from {}",
                preferred.display(),
                fallback.display()
            );
            // Saving rewrites it in the configured form
            self.dirty = true;
            (fallback, !options.compress)
        } else {
            log::debug!("cache: no cache file, starting cold");
            return;
        };

        match read_cache_file(&path, compressed) {
            Ok(file) if file.version == CACHE_FORMAT_VERSION => {
                log::info!(
                    "cache: loaded {} exists / {} searches entries from {}",
                    file.exists.len(),
                    file.searches.len(),
                    path.display()
                );
                self.exists = file.exists;
                self.searches = file.searches;
            }
            Ok(file) => {
                log::warn!(
                    "cache: {} has format version {} (expected {CACHE_FORMAT_VERSION}), starting cold",
                    path.display(),
                    file.version
                );
            }
            Err(e) => {
                log::warn!("cache: cannot load {}: {e:#}, starting cold", path.display());
            }
        }
    }

    fn table(&self, ns: Namespace) -> &BTreeMap<String, CacheEntry> {
        match ns {
            Namespace::Exists => &self.exists,
            Namespace::Searches => &self.searches,
        }
    }

    fn table_mut(&mut self, ns: Namespace) -> &mut BTreeMap<String, CacheEntry> {
        match ns {
            Namespace::Exists => &mut self.exists,
            Namespace::Searches => &mut self.searches,
        }
    }

    /// Fresh value for `key`, or None on miss / stale / disabled.
    pub fn get<T: DeserializeOwned>(&self, ns: Namespace, key: &str) -> Option<T> {
        self.get_at(ns, key, Utc::now())
    }

    pub fn get_at<T: DeserializeOwned>(
        &self,
        ns: Namespace,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<T> {
        if self.disabled {
            return None;
        }
        let key = normalize_key(key);
        let entry = self.table(ns).get(&key)?;
        if now - entry.captured_at > self.ttl {
            log::debug!("cache: {ns} entry for {key:?} is stale");
            return None;
        }
        match serde_json::from_value(entry.value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                log::debug!("cache: {ns} entry for {key:?} has unexpected shape: {e}");
                None
            }
        }
    }

    pub fn put<T: Serialize>(&mut self, ns: Namespace, key: &str, value: &T) {
        self.put_at(ns, key, value, Utc::now());
    }

    pub fn put_at<T: Serialize>(
        &mut self,
        ns: Namespace,
        key: &str,
        value: &T,
        captured_at: DateTime<Utc>,
    ) {
        if self.disabled {
            return;
        }
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("cache: cannot serialize {ns} value: {e}");
                return;
            }
        };
        let key = normalize_key(key);
        self.table_mut(ns).insert(key, CacheEntry { value, captured_at });
        self.dirty = true;
    }

    pub fn stats(&self, now: DateTime<Utc>) -> CacheStats {
        let stale = |table: &BTreeMap<String, CacheEntry>| {
            table
                .values()
                .filter(|e| now - e.captured_at > self.ttl)
                .count()
        };
        CacheStats {
            exists_total: self.exists.len(),
            exists_stale: stale(&self.exists),
            searches_total: self.searches.len(),
            searches_stale: stale(&self.searches),
        }
    }

    /// Write to disk in the configured form and drop the other form.
    ///
    /// No-op for disabled/in-memory caches and when nothing changed.
    pub fn save(&mut self) -> Result<()> {
        let Some(options) = self.options.as_ref() else {
            return Ok(());
        };
        if self.disabled || !self.dirty {
            return Ok(());
        }

        let (target, other) = options.paths();
        let file = CacheFile {
            version: CACHE_FORMAT_VERSION,
            saved_at: Utc::now(),
            ttl_minutes: options.ttl_minutes,
            exists: self.exists.clone(),
            searches: self.searches.clone(),
        };
        write_cache_file(&target, &file, options.compress)?;

        if other.exists() {
            fs::remove_file(&other)
                .with_context(|| format!("failed to remove {}", other.display()))?;
        }

        log::info!(
            "cache: saved {} exists / {} searches entries to {}",
            self.exists.len(),
            self.searches.len(),
            target.display()
        );
        self.dirty = false;
        Ok(())
    }

    /// Delete both on-disk forms. Returns how many files were removed.
    pub fn remove_files(options: &CacheOptions) -> Result<usize> {
        let mut removed = 0;
        for path in [options.plain_path(), options.compressed_path()] {
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn ttl_delta(minutes: i64) -> TimeDelta {
    TimeDelta::try_minutes(minutes.max(0)).unwrap_or(TimeDelta::MAX)
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn read_cache_file(path: &Path, compressed: bool) -> Result<CacheFile> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let json = if compressed {
        let mut out = String::new();
        GzDecoder::new(raw.as_slice())
            .read_to_string(&mut out)
            .context("failed to decompress")?;
        out
    } else {
        String::from_utf8(raw).context("not UTF-8")?
    };
    serde_json::from_str(&json).context("failed to parse cache JSON")
}

/// Atomic tmp → rename write.
fn write_cache_file(path: &Path, file: &CacheFile, compressed: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let json = serde_json::to_vec(file).context("failed to serialize cache")?;
    let out = File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
    if compressed {
        let mut enc = GzEncoder::new(out, Compression::default());
        enc.write_all(&json)?;
        enc.finish()?.sync_all()?;
    } else {
        let mut out = out;
        out.write_all(&json)?;
        out.sync_all()?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to rename {} → {}", tmp.display(), path.display()))?;
    Ok(())
}
