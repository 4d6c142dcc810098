//! Closing the items a newly created document replaces.

use std::time::Duration;

use issuepub_core::ApiError;
use issuepub_github::{IssueState, IssueTracker, RemoteIssue, exact_title_matches};
use issuepub_source::{SupersedeRef, normalize_title};
use issuepub_store::{Cache, Namespace};

/// Closed items and problems for one document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SupersedeOutcome {
    pub closed: Vec<u64>,
    pub warnings: Vec<String>,
}

pub fn audit_comment(new_number: u64) -> String {
    format!("Superseded by #{new_number}.")
}

/// Resolve every reference, then close and comment each target.
///
/// Numeric references are used as-is. Title references go through a
/// cached search and must match exactly; open candidates win over closed
/// ones. The new item itself and repeated targets are skipped. Nothing
/// here fails the document: problems come back as warnings.
pub fn close_superseded(
    tracker: &dyn IssueTracker,
    cache: &mut Cache,
    refs: &[SupersedeRef],
    new_number: u64,
    pacing: Duration,
) -> SupersedeOutcome {
    let mut outcome = SupersedeOutcome::default();
    let mut seen = Vec::new();

    for reference in refs {
        let number = match resolve(tracker, cache, reference) {
            Ok(Some(n)) => n,
            Ok(None) => {
                log::warn!("supersede {reference}: no matching item, skipped");
                outcome
                    .warnings
                    .push(format!("supersede {reference}: no matching item"));
                continue;
            }
            Err(e) => {
                log::warn!("supersede {reference}: lookup failed: {e}");
                outcome
                    .warnings
                    .push(format!("supersede {reference}: lookup failed: {e}"));
                continue;
            }
        };
        if number == new_number || seen.contains(&number) {
            log::debug!("supersede {reference}: #{number} already handled");
            continue;
        }
        seen.push(number);

        if let Err(e) = tracker.set_state(number, IssueState::Closed) {
            log::warn!("supersede #{number}: close failed: {e}");
            outcome
                .warnings
                .push(format!("supersede #{number}: close failed: {e}"));
            continue;
        }
        pace(pacing);
        if let Err(e) = tracker.add_comment(number, &audit_comment(new_number)) {
            log::warn!("supersede #{number}: comment failed: {e}");
            outcome
                .warnings
                .push(format!("supersede #{number}: closed but comment failed: {e}"));
        } else {
            pace(pacing);
        }
        log::info!("closed #{number}, superseded by #{new_number}");
        outcome.closed.push(number);
    }
    outcome
}

fn resolve(
    tracker: &dyn IssueTracker,
    cache: &mut Cache,
    reference: &SupersedeRef,
) -> Result<Option<u64>, ApiError> {
    let title = match reference {
        SupersedeRef::Number(n) => return Ok(Some(*n)),
        SupersedeRef::Title(t) => t,
    };
    let key = normalize_title(title);
    let candidates = match cache.get::<Vec<RemoteIssue>>(Namespace::Searches, &key) {
        Some(hit) => hit,
        None => {
            let found = tracker.search_by_title(title)?;
            cache.put(Namespace::Searches, &key, &found);
            found
        }
    };
    let matches = exact_title_matches(title, &candidates);
    let best = matches
        .iter()
        .find(|c| c.state == IssueState::Open)
        .or_else(|| matches.first());
    Ok(best.map(|c| c.number))
}

pub(crate) fn pace(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}
