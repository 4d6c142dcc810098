//! Does a tracker item with this title already exist?

use issuepub_core::ApiError;
use issuepub_github::{IssueTracker, exact_title_matches};
use issuepub_source::normalize_title;
use issuepub_store::{Cache, Namespace};

/// Cached existence check.
///
/// A fresh `exists` entry answers without a remote call. On a miss the
/// tracker is searched, candidates are filtered to exact title matches
/// (closed items count) and the answer is cached.
pub fn resolve_exists(
    tracker: &dyn IssueTracker,
    cache: &mut Cache,
    title: &str,
) -> Result<bool, ApiError> {
    let key = normalize_title(title);
    if let Some(hit) = cache.get::<bool>(Namespace::Exists, &key) {
        log::debug!("exists {key:?}: cached {hit}");
        return Ok(hit);
    }
    let candidates = tracker.search_by_title(title)?;
    let exists = !exact_title_matches(title, &candidates).is_empty();
    cache.put(Namespace::Exists, &key, &exists);
    Ok(exists)
}

/// Remember a title created in this run.
pub fn record_created(cache: &mut Cache, title: &str) {
    cache.put(Namespace::Exists, &normalize_title(title), &true);
}
