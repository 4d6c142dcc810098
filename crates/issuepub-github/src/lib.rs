//! Issuepub GitHub - issue tracker access
//!
//! The [`IssueTracker`] trait is the seam between the pipeline and the
//! remote service; [`GitHubClient`] implements it over the GitHub REST
//! API. Tests substitute an in-process fake.

pub mod client;
pub mod model;
pub mod tracker;

pub use client::GitHubClient;
pub use model::{IssueState, NewIssue, RemoteIssue, RepoId};
pub use tracker::{IssueTracker, exact_title_matches};
