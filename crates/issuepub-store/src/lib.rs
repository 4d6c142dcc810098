//! issuepub-store: local state of a publishing run
//!
//! The persistent lookup cache carried between runs, the per-run
//! outcome report, the index artifact rewrite, and content hashing
//! for provenance comments.

pub mod cache;
pub mod hash;
pub mod index;
pub mod report;

pub use cache::{Cache, CacheEntry, CacheOptions, CacheStats, Namespace};
pub use hash::{content_hash, short_hash};
pub use index::{annotate_index, rewrite_index};
pub use report::{Action, ReportRecord, ReportSummary, RunReport};
