//! Tracker abstraction

use issuepub_core::ApiError;

use crate::model::{IssueState, NewIssue, RemoteIssue};

/// The four remote operations the pipeline needs.
///
/// Calls are synchronous; each one completes before the next document
/// step starts.
pub trait IssueTracker {
    /// Candidates whose title matches `title` according to the remote
    /// search. Ranking and fuzziness are up to the service; callers must
    /// filter for exact matches with [`exact_title_matches`].
    fn search_by_title(&self, title: &str) -> Result<Vec<RemoteIssue>, ApiError>;

    fn create_issue(&self, issue: &NewIssue) -> Result<RemoteIssue, ApiError>;

    fn set_state(&self, number: u64, state: IssueState) -> Result<(), ApiError>;

    fn add_comment(&self, number: u64, body: &str) -> Result<(), ApiError>;
}

/// Candidates whose title equals `title` ignoring case and surrounding
/// or repeated whitespace.
pub fn exact_title_matches<'a>(title: &str, candidates: &'a [RemoteIssue]) -> Vec<&'a RemoteIssue> {
    let wanted = fold(title);
    candidates
        .iter()
        .filter(|c| fold(&c.title) == wanted)
        .collect()
}

fn fold(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
