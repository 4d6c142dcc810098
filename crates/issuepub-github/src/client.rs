//! GitHub REST client
//!
//! Every call is a single blocking request on the shared runtime, wrapped
//! in [`retry_with_backoff`] so rate limits and 5xx responses are retried.
//! Creation is the exception: a create that may have landed is looked up
//! among recent issues before it is sent again.

use issuepub_core::{
    ApiError, SHARED_RUNTIME, http_client, retry_with_backoff, retry_with_recheck,
};
use reqwest::Method;
use serde::Deserialize;

use crate::model::{IssueState, NewIssue, RemoteIssue, RepoId};
use crate::tracker::{IssueTracker, exact_title_matches};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const SEARCH_PAGE_SIZE: u32 = 100;
/// The search API serves at most 1000 results
const MAX_SEARCH_PAGES: u32 = 10;
/// Newest issues scanned when checking whether a create landed
const RECENT_PAGE_SIZE: u32 = 30;

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    incomplete_results: bool,
    #[serde(default)]
    items: Vec<RemoteIssue>,
}

/// Authenticated client for one repository.
pub struct GitHubClient {
    api_url: String,
    repo: RepoId,
    token: String,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("repo", &self.repo)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, repo: RepoId, token: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            repo,
            token: token.into(),
        }
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    fn issues_url(&self) -> String {
        format!("{}/repos/{}/{}/issues", self.api_url, self.repo.owner, self.repo.name)
    }

    fn issue_url(&self, number: u64) -> String {
        format!("{}/{number}", self.issues_url())
    }

    fn search_url(&self, title: &str, page: u32) -> Result<reqwest::Url, ApiError> {
        let base = format!("{}/search/issues", self.api_url);
        parse_url(
            &base,
            &[
                ("q", search_query(&self.repo, title)),
                ("per_page", SEARCH_PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ],
        )
    }

    /// Newest issues first, open and closed.
    fn recent_url(&self) -> Result<reqwest::Url, ApiError> {
        parse_url(
            &self.issues_url(),
            &[
                ("state", "all".to_string()),
                ("sort", "created".to_string()),
                ("direction", "desc".to_string()),
                ("per_page", RECENT_PAGE_SIZE.to_string()),
            ],
        )
    }

    /// One request with auth headers; returns the response body text.
    fn send(&self, method: Method, url: &str, body: Option<String>) -> Result<String, ApiError> {
        SHARED_RUNTIME.handle().block_on(async {
            let mut req = http_client()
                .request(method, url)
                .bearer_auth(&self.token)
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", API_VERSION);
            if let Some(body) = body {
                req = req.header("Content-Type", "application/json").body(body);
            }
            let resp = req.send().await.map_err(|e| ApiError::from_reqwest(&e))?;
            let status = resp.status();
            if status.is_success() {
                return resp.text().await.map_err(|e| ApiError::from_reqwest(&e));
            }
            // Rate-limit headers are needed to classify the failure
            let headers = resp.headers().clone();
            let body = resp.text().await.unwrap_or_default();
            Err(ApiError::from_response(status.as_u16(), &headers, &body))
        })
    }

    fn send_json(
        &self,
        label: &str,
        method: Method,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<String, ApiError> {
        let body = payload.to_string();
        retry_with_backoff(label, || self.send(method.clone(), url, Some(body.clone())))
    }

    /// Exact-title match among the newest issues, if any.
    fn find_recent(&self, title: &str) -> Result<Option<RemoteIssue>, ApiError> {
        let url = self.recent_url()?;
        let text = retry_with_backoff("recent", || self.send(Method::GET, url.as_str(), None))?;
        let items: Vec<RemoteIssue> =
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(exact_title_matches(title, &items).first().map(|&i| i.clone()))
    }
}

impl IssueTracker for GitHubClient {
    fn search_by_title(&self, title: &str) -> Result<Vec<RemoteIssue>, ApiError> {
        let items = collect_search_pages(title, |page| {
            let url = self.search_url(title, page)?;
            let text =
                retry_with_backoff("search", || self.send(Method::GET, url.as_str(), None))?;
            decode_search(&text)
        })?;
        log::debug!("search {title:?}: {} candidates", items.len());
        Ok(items)
    }

    /// Never sent twice for a request that may already have created the
    /// item: after a timeout or 5xx the newest issues are checked first.
    fn create_issue(&self, issue: &NewIssue) -> Result<RemoteIssue, ApiError> {
        let body = serde_json::to_string(issue).map_err(|e| ApiError::Decode(e.to_string()))?;
        let url = self.issues_url();
        retry_with_recheck(
            "create",
            || {
                let text = self.send(Method::POST, &url, Some(body.clone()))?;
                serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
            },
            || self.find_recent(&issue.title),
        )
    }

    fn set_state(&self, number: u64, state: IssueState) -> Result<(), ApiError> {
        let payload = serde_json::json!({ "state": state.as_str() });
        self.send_json("set-state", Method::PATCH, &self.issue_url(number), &payload)?;
        Ok(())
    }

    fn add_comment(&self, number: u64, body: &str) -> Result<(), ApiError> {
        let payload = serde_json::json!({ "body": body });
        let url = format!("{}/comments", self.issue_url(number));
        self.send_json("comment", Method::POST, &url, &payload)?;
        Ok(())
    }
}

/// Search qualifier restricting matches to issue titles in `repo`.
fn search_query(repo: &RepoId, title: &str) -> String {
    // Quotes would end the phrase early
    let phrase: String = title.chars().filter(|&c| c != '"').collect();
    format!("repo:{repo} is:issue in:title \"{}\"", phrase.trim())
}

fn parse_url(base: &str, params: &[(&str, String)]) -> Result<reqwest::Url, ApiError> {
    reqwest::Url::parse_with_params(base, params).map_err(|e| ApiError::Http {
        status: None,
        message: format!("invalid API URL: {e}"),
    })
}

fn decode_search(text: &str) -> Result<SearchResponse, ApiError> {
    serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Follow result pages until every candidate is read or the API's
/// result window ends.
fn collect_search_pages(
    title: &str,
    mut fetch: impl FnMut(u32) -> Result<SearchResponse, ApiError>,
) -> Result<Vec<RemoteIssue>, ApiError> {
    let mut items = Vec::new();
    let mut total = 0;
    for page in 1..=MAX_SEARCH_PAGES {
        let resp = fetch(page)?;
        if resp.incomplete_results {
            log::warn!("search {title:?}: GitHub returned incomplete results");
        }
        let got = resp.items.len();
        total = resp.total_count;
        items.extend(resp.items);
        if got < SEARCH_PAGE_SIZE as usize || items.len() as u64 >= total {
            return Ok(items);
        }
    }
    log::warn!(
        "search {title:?}: read {} of {total} candidates, an exact match may be missed",
        items.len()
    );
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GitHubClient {
        GitHubClient::new(
            "https://ghe.example.com/api/v3/",
            RepoId::parse("acme/widgets").unwrap(),
            "secret",
        )
    }

    #[test]
    fn urls() {
        let c = client();
        assert_eq!(c.issues_url(), "https://ghe.example.com/api/v3/repos/acme/widgets/issues");
        assert_eq!(
            c.issue_url(42),
            "https://ghe.example.com/api/v3/repos/acme/widgets/issues/42"
        );
    }

    #[test]
    fn search_url_encodes_query() {
        let url = client().search_url("Fix \"login\" bug", 2).unwrap();
        assert_eq!(url.path(), "/api/v3/search/issues");
        let q: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(q[0].1, "repo:acme/widgets is:issue in:title \"Fix login bug\"");
        assert_eq!(q[1], ("per_page".to_string(), "100".to_string()));
        assert_eq!(q[2], ("page".to_string(), "2".to_string()));
    }

    #[test]
    fn recent_url_sorts_newest_first() {
        let url = client().recent_url().unwrap();
        assert_eq!(url.path(), "/api/v3/repos/acme/widgets/issues");
        let q: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(q.contains(&("state".to_string(), "all".to_string())));
        assert!(q.contains(&("direction".to_string(), "desc".to_string())));
    }

    fn page(total: u64, numbers: std::ops::Range<u64>) -> SearchResponse {
        SearchResponse {
            total_count: total,
            items: numbers
                .map(|n| RemoteIssue {
                    number: n,
                    title: format!("Login bug {n}"),
                    state: IssueState::Open,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn search_follows_pages() {
        let mut requested = Vec::new();
        let items = collect_search_pages("Login bug", |p| {
            requested.push(p);
            Ok(match p {
                1 => page(230, 0..100),
                2 => page(230, 100..200),
                _ => page(230, 200..230),
            })
        })
        .unwrap();
        assert_eq!(requested, [1, 2, 3]);
        assert_eq!(items.len(), 230);
        assert_eq!(items[229].number, 229);
    }

    #[test]
    fn search_single_page() {
        let mut calls = 0;
        let items = collect_search_pages("x", |_| {
            calls += 1;
            Ok(page(3, 0..3))
        })
        .unwrap();
        assert_eq!((calls, items.len()), (1, 3));
    }

    #[test]
    fn search_stops_at_result_window() {
        let mut calls = 0;
        let items = collect_search_pages("x", |p| {
            calls += 1;
            let start = u64::from(p - 1) * 100;
            Ok(page(5000, start..start + 100))
        })
        .unwrap();
        assert_eq!(calls, MAX_SEARCH_PAGES);
        assert_eq!(items.len(), 1000);
    }

    #[test]
    fn search_page_error_propagates() {
        let result = collect_search_pages("x", |p| {
            if p == 1 {
                Ok(page(150, 0..100))
            } else {
                Err(ApiError::Decode("eof".into()))
            }
        });
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn decode_search_items() {
        let json = r#"{
            "total_count": 2,
            "incomplete_results": false,
            "items": [
                {"number": 3, "title": "A", "state": "open", "html_url": "x"},
                {"number": 9, "title": "B", "state": "closed"}
            ]
        }"#;
        let resp = decode_search(json).unwrap();
        assert_eq!(resp.total_count, 2);
        let items = resp.items;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].state, IssueState::Closed);
    }

    #[test]
    fn decode_search_garbage() {
        assert!(matches!(decode_search("<html>"), Err(ApiError::Decode(_))));
    }

    #[test]
    fn debug_redacts_token() {
        let dbg = format!("{:?}", client());
        assert!(!dbg.contains("secret"));
    }
}
