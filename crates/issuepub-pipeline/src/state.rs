//! Per-document state machine.
//!
//! ```text
//! Start → Parsed → Validated ─┬─ validate-only ─────────────→ Done(Validated)
//!                             ├─ no title ──────────────────→ Done(Errored)
//!                             ├─ no tracker ────────────────→ Done(Simulated)
//!                             └→ Checked ─┬─ exists ────────→ Done(Skipped)
//!                                         ├─ dry run ───────→ Done(Simulated)
//!                                         └→ Created → SupersedeResolved → Annotated → Done(Created)
//! ```
//!
//! Any failing step moves to `Failed`, which ends in `Done(Errored)`.
//! [`next_step`] is pure; the orchestrator performs the step and picks the
//! following state from its result.

use issuepub_store::Action;

use crate::config::RunMode;

/// Run-wide inputs to the transition function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Flow {
    pub mode: RunMode,
    /// A tracker is available for existence checks
    pub remote: bool,
    pub close_superseded: bool,
    pub add_metadata: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocState {
    Start,
    Parsed,
    Validated { has_title: bool },
    Checked { exists: bool },
    Created { has_supersedes: bool },
    SupersedeResolved,
    Annotated,
    Failed,
    Done(Terminal),
}

/// Work the orchestrator performs next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Parse,
    Validate,
    CheckExists,
    Create,
    CloseSuperseded,
    Annotate,
    Finish(Terminal),
    /// Already terminal
    Stop,
}

/// How a document left the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    Validated,
    Skipped,
    Simulated,
    Created,
    Errored,
}

impl Terminal {
    pub fn action(self) -> Action {
        match self {
            Self::Validated => Action::Validate,
            Self::Skipped => Action::SkipExists,
            Self::Simulated => Action::DryRun,
            Self::Created => Action::Created,
            Self::Errored => Action::Error,
        }
    }
}

pub fn next_step(state: DocState, flow: &Flow) -> Step {
    match state {
        DocState::Start => Step::Parse,
        DocState::Parsed => Step::Validate,
        DocState::Validated { .. } if flow.mode == RunMode::ValidateOnly => {
            Step::Finish(Terminal::Validated)
        }
        DocState::Validated { has_title: false } => Step::Finish(Terminal::Errored),
        DocState::Validated { has_title: true } if flow.remote => Step::CheckExists,
        DocState::Validated { has_title: true } => Step::Finish(Terminal::Simulated),
        DocState::Checked { exists: true } => Step::Finish(Terminal::Skipped),
        DocState::Checked { exists: false } if flow.mode == RunMode::Publish => Step::Create,
        DocState::Checked { exists: false } => Step::Finish(Terminal::Simulated),
        DocState::Created { has_supersedes: true } if flow.close_superseded => {
            Step::CloseSuperseded
        }
        DocState::Created { .. } | DocState::SupersedeResolved if flow.add_metadata => {
            Step::Annotate
        }
        DocState::Created { .. } | DocState::SupersedeResolved | DocState::Annotated => {
            Step::Finish(Terminal::Created)
        }
        DocState::Failed => Step::Finish(Terminal::Errored),
        DocState::Done(_) => Step::Stop,
    }
}
