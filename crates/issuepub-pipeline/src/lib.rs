//! Issuepub Pipeline - publishing documents as tracker items
//!
//! Run configuration, the per-document state machine and the
//! orchestrator that drives it against an [`IssueTracker`].
//!
//! [`IssueTracker`]: issuepub_github::IssueTracker

pub mod config;
pub mod idempotency;
pub mod orchestrator;
pub mod state;
pub mod supersede;

pub use config::{PublishConfig, RunMode, is_truthy};
pub use orchestrator::{Publisher, RunOutcome};
pub use state::{DocState, Flow, Step, Terminal, next_step};
