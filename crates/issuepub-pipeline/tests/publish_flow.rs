//! End-to-end runs of the publisher against an in-process tracker.

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use issuepub_core::{ApiError, ProgressContext};
use issuepub_github::{IssueState, IssueTracker, NewIssue, RemoteIssue};
use issuepub_pipeline::{PublishConfig, Publisher, RunOutcome};
use issuepub_source::FailurePolicy;
use issuepub_store::{Action, Cache, CacheOptions, RunReport};
use tempfile::TempDir;

/// Tracker keeping items in memory and logging every call.
struct FakeTracker {
    items: RefCell<Vec<RemoteIssue>>,
    calls: RefCell<Vec<String>>,
    next_number: Cell<u64>,
    /// Titles whose creation is rejected
    reject: Vec<String>,
    /// Every search fails with a server error
    fail_search: bool,
}

impl FakeTracker {
    fn new() -> Self {
        Self {
            items: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            next_number: Cell::new(100),
            reject: Vec::new(),
            fail_search: false,
        }
    }

    fn with_item(self, number: u64, title: &str, state: IssueState) -> Self {
        self.items.borrow_mut().push(RemoteIssue {
            number,
            title: title.to_string(),
            state,
        });
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

impl IssueTracker for FakeTracker {
    /// Substring search, like the real one: callers must filter.
    fn search_by_title(&self, title: &str) -> Result<Vec<RemoteIssue>, ApiError> {
        self.calls.borrow_mut().push(format!("search {title}"));
        if self.fail_search {
            return Err(ApiError::Http {
                status: Some(502),
                message: "Bad Gateway".into(),
            });
        }
        let needle = title.to_lowercase();
        Ok(self
            .items
            .borrow()
            .iter()
            .filter(|i| i.title.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    fn create_issue(&self, issue: &NewIssue) -> Result<RemoteIssue, ApiError> {
        self.calls.borrow_mut().push(format!("create {}", issue.title));
        if self.reject.contains(&issue.title) {
            return Err(ApiError::Http {
                status: Some(422),
                message: "Validation Failed".into(),
            });
        }
        let number = self.next_number.get();
        self.next_number.set(number + 1);
        let created = RemoteIssue {
            number,
            title: issue.title.clone(),
            state: IssueState::Open,
        };
        self.items.borrow_mut().push(created.clone());
        Ok(created)
    }

    fn set_state(&self, number: u64, state: IssueState) -> Result<(), ApiError> {
        self.calls
            .borrow_mut()
            .push(format!("state #{number} {}", state.as_str()));
        Ok(())
    }

    fn add_comment(&self, number: u64, body: &str) -> Result<(), ApiError> {
        self.calls
            .borrow_mut()
            .push(format!("comment #{number} {}", body.lines().next().unwrap_or("")));
        Ok(())
    }
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(docs: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("issues")).unwrap();
        let ws = Self { dir };
        for (name, text) in docs {
            ws.write(name, text);
        }
        ws
    }

    fn write(&self, name: &str, text: &str) {
        std::fs::write(self.dir.path().join("issues").join(name), text).unwrap();
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> PublishConfig {
        PublishConfig {
            source_dir: self.path().join("issues"),
            report_path: self.path().join("out/report.json"),
            repository: Some("acme/widgets".into()),
            token: Some("token".into()),
            publish: true,
            pacing: Duration::ZERO,
            cache: CacheOptions {
                path: self.path().join("cache.json"),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn run_with(config: &PublishConfig, tracker: Option<&dyn IssueTracker>, cache: Cache) -> RunOutcome {
    let progress = Arc::new(ProgressContext::hidden());
    Publisher::new(config, tracker, cache, progress)
        .run()
        .unwrap()
}

fn run(config: &PublishConfig, tracker: &FakeTracker) -> RunOutcome {
    run_with(config, Some(tracker as &dyn IssueTracker), Cache::open(config.cache.clone()))
}

fn actions(outcome: &RunOutcome) -> Vec<(String, Action)> {
    outcome
        .report
        .records()
        .iter()
        .map(|r| (r.file.clone(), r.action))
        .collect()
}

#[test]
fn second_run_skips_everything() {
    let ws = Workspace::new(&[
        ("a-first.md", "# First item\n\nbody\n"),
        ("b-second.md", "---\ntitle: Second item\nlabels: bug, ui\n---\ntext\n"),
    ]);
    let config = ws.config();
    let tracker = FakeTracker::new();

    let first = run(&config, &tracker);
    assert!(first.report.records().iter().all(|r| r.action == Action::Created));
    assert_eq!(tracker.count("create"), 2);

    // Cold cache: existence comes from the tracker search
    let second = run_with(&config, Some(&tracker as &dyn IssueTracker), Cache::in_memory(60));
    assert!(second
        .report
        .records()
        .iter()
        .all(|r| r.action == Action::SkipExists));
    assert_eq!(tracker.count("create"), 2);
    assert_eq!(second.exit_status(FailurePolicy::Warn), 0);
}

#[test]
fn persisted_cache_answers_without_search() {
    let ws = Workspace::new(&[("a.md", "# Alpha\n")]);
    let config = ws.config();
    let tracker = FakeTracker::new();

    run(&config, &tracker);
    let searches = tracker.count("search");
    let second = run(&config, &tracker);

    assert_eq!(actions(&second), [("a.md".to_string(), Action::SkipExists)]);
    assert_eq!(tracker.count("search"), searches);
}

#[test]
fn near_title_is_not_a_duplicate() {
    let ws = Workspace::new(&[("fix-login-bug.md", "no heading here\n")]);
    let config = ws.config();
    let tracker = FakeTracker::new().with_item(3, "Fix login bug on Safari", IssueState::Open);

    let outcome = run(&config, &tracker);
    let record = &outcome.report.records()[0];
    assert_eq!(record.title, "fix login bug");
    assert_eq!(record.action, Action::Created);
    assert_eq!(record.number, Some(100));
}

#[test]
fn validate_only_makes_no_calls() {
    let ws = Workspace::new(&[
        ("a.md", "---\ntitle: A\npriority: high\n---\n"),
        ("b.md", "---\nlabels:\n  kind: bug\n---\n# B\n"),
    ]);
    let config = PublishConfig {
        validate_only: true,
        ..ws.config()
    };
    let tracker = FakeTracker::new();

    let outcome = run(&config, &tracker);
    assert!(tracker.calls().is_empty());
    assert!(outcome
        .report
        .records()
        .iter()
        .all(|r| r.action == Action::Validate));
    assert_eq!(outcome.report.records()[0].warnings, ["unknown field `priority`"]);
    assert!(!outcome.report.records()[1].errors.is_empty());
    assert_eq!(outcome.exit_status(FailurePolicy::Errors), 2);
    assert_eq!(outcome.exit_status(FailurePolicy::Warn), 0);
}

#[test]
fn supersede_closes_numeric_and_titled_items() {
    let ws = Workspace::new(&[(
        "new.md",
        "---\ntitle: New login flow\nsupersedes: [42, \"Old Title\"]\n---\n",
    )]);
    let config = PublishConfig {
        close_superseded: true,
        ..ws.config()
    };
    let tracker = FakeTracker::new().with_item(17, "Old Title", IssueState::Open);

    let outcome = run(&config, &tracker);
    assert_eq!(outcome.report.records()[0].number, Some(100));
    let calls = tracker.calls();
    for expected in [
        "state #42 closed",
        "comment #42 Superseded by #100.",
        "state #17 closed",
        "comment #17 Superseded by #100.",
    ] {
        assert!(calls.iter().any(|c| c == expected), "missing {expected:?} in {calls:?}");
    }
}

#[test]
fn supersede_disabled_leaves_items_alone() {
    let ws = Workspace::new(&[("new.md", "---\ntitle: N\nsupersedes: 42\n---\n")]);
    let tracker = FakeTracker::new();
    run(&ws.config(), &tracker);
    assert_eq!(tracker.count("state"), 0);
}

#[test]
fn failed_creation_does_not_stop_the_batch() {
    let ws = Workspace::new(&[("a.md", "# A\n"), ("b.md", "# B\n"), ("c.md", "# C\n")]);
    let config = ws.config();
    let mut tracker = FakeTracker::new();
    tracker.reject.push("B".into());

    let outcome = run(&config, &tracker);
    assert_eq!(
        actions(&outcome),
        [
            ("a.md".to_string(), Action::Created),
            ("b.md".to_string(), Action::Error),
            ("c.md".to_string(), Action::Created),
        ]
    );
    assert!(outcome.report.records()[1].errors[0].contains("422"));
    assert_eq!(outcome.exit_status(FailurePolicy::Warn), 1);

    // The failed document is retried on the next run
    tracker.reject.clear();
    let retry = run(&config, &tracker);
    assert_eq!(retry.report.records()[1].action, Action::Created);
}

#[test]
fn unconfirmed_existence_still_creates() {
    let ws = Workspace::new(&[("a.md", "# Alpha\n")]);
    let config = ws.config();
    let mut tracker = FakeTracker::new();
    tracker.fail_search = true;

    let outcome = run(&config, &tracker);
    let record = &outcome.report.records()[0];
    assert_eq!(record.action, Action::Created);
    assert_eq!(record.number, Some(100));
    assert!(
        record
            .warnings
            .iter()
            .any(|w| w.contains("could not confirm existence") && w.contains("502")),
        "{:?}",
        record.warnings
    );
    assert!(record.errors.is_empty());
    assert_eq!(tracker.count("create"), 1);
    assert_eq!(outcome.exit_status(FailurePolicy::Warn), 0);

    // A failed lookup is not cached; the created item is
    tracker.fail_search = false;
    let second = run(&config, &tracker);
    assert_eq!(second.report.records()[0].action, Action::SkipExists);
    assert_eq!(tracker.count("create"), 1);
}

#[test]
fn unreadable_document_is_not_a_schema_error() {
    let ws = Workspace::new(&[("a.md", "# A\n")]);
    std::fs::write(ws.path().join("issues/b.md"), b"\xff\xfe\x00").unwrap();
    let config = PublishConfig {
        validate_only: true,
        ..ws.config()
    };

    let outcome = run(&config, &FakeTracker::new());
    assert_eq!(
        actions(&outcome),
        [
            ("a.md".to_string(), Action::Validate),
            ("b.md".to_string(), Action::Error),
        ]
    );
    assert_eq!(outcome.schema_errors, 0);
    assert_eq!(outcome.exit_status(FailurePolicy::Errors), 1);
}

#[test]
fn index_annotated_once() {
    let index = "| File | Issue |\n|------|-------|\n| a.md | |\n| b.md | |\n";
    let ws = Workspace::new(&[("a.md", "# A\n"), ("INDEX.md", index)]);
    let config = ws.config();
    let tracker = FakeTracker::new();

    let first = run(&config, &tracker);
    assert_eq!(first.report.len(), 1, "index is not a source document");
    assert!(first.index_updated);
    let annotated = std::fs::read_to_string(config.index_path()).unwrap();
    assert_eq!(annotated, "| File | Issue |\n|------|-------|\n| a.md | #100 |\n| b.md | |\n");

    let second = run(&config, &tracker);
    assert!(!second.index_updated);
    assert_eq!(std::fs::read_to_string(config.index_path()).unwrap(), annotated);
}

#[test]
fn dry_run_without_credentials() {
    let index = "| File | Issue |\n|---|---|\n| a.md | |\n";
    let ws = Workspace::new(&[("a.md", "# A\n"), ("INDEX.md", index)]);
    let config = PublishConfig {
        token: None,
        ..ws.config()
    };

    let outcome = run_with(&config, None, Cache::in_memory(60));
    assert_eq!(actions(&outcome), [("a.md".to_string(), Action::DryRun)]);
    assert!(!outcome.index_updated);
    assert_eq!(std::fs::read_to_string(config.index_path()).unwrap(), index);
}

#[test]
fn dry_run_still_checks_existence() {
    let ws = Workspace::new(&[("a.md", "# A\n"), ("b.md", "# B\n")]);
    let config = PublishConfig {
        publish: false,
        ..ws.config()
    };
    let tracker = FakeTracker::new().with_item(1, "a", IssueState::Closed);

    let outcome = run(&config, &tracker);
    assert_eq!(
        actions(&outcome),
        [
            ("a.md".to_string(), Action::SkipExists),
            ("b.md".to_string(), Action::DryRun),
        ]
    );
    assert_eq!(tracker.count("create"), 0);
}

#[test]
fn untitled_document_is_an_error() {
    let ws = Workspace::new(&[("--.md", "just text\n"), ("ok.md", "# Ok\n")]);
    let tracker = FakeTracker::new();

    let outcome = run(&ws.config(), &tracker);
    assert_eq!(outcome.report.records()[0].action, Action::Error);
    assert_eq!(outcome.report.records()[1].action, Action::Created);
    assert_eq!(tracker.count("create"), 1);
}

#[test]
fn provenance_comment_after_creation() {
    let ws = Workspace::new(&[("a.md", "# A\n")]);
    let config = PublishConfig {
        add_metadata: true,
        ..ws.config()
    };
    let tracker = FakeTracker::new();

    run(&config, &tracker);
    assert!(tracker
        .calls()
        .contains(&"comment #100 <!-- issuepub:provenance -->".to_string()));
}

#[test]
fn assignees_and_labels_reach_the_tracker() {
    struct Capture(RefCell<Vec<NewIssue>>);
    impl IssueTracker for Capture {
        fn search_by_title(&self, _: &str) -> Result<Vec<RemoteIssue>, ApiError> {
            Ok(Vec::new())
        }
        fn create_issue(&self, issue: &NewIssue) -> Result<RemoteIssue, ApiError> {
            self.0.borrow_mut().push(issue.clone());
            Ok(RemoteIssue {
                number: 1,
                title: issue.title.clone(),
                state: IssueState::Open,
            })
        }
        fn set_state(&self, _: u64, _: IssueState) -> Result<(), ApiError> {
            Ok(())
        }
        fn add_comment(&self, _: u64, _: &str) -> Result<(), ApiError> {
            Ok(())
        }
    }

    let ws = Workspace::new(&[(
        "a.md",
        "---\nlabels: [bug, ui]\nassignees: carol, alice\n---\n# A\n\nDetails.\n",
    )]);
    let config = PublishConfig {
        assignees: vec!["alice".into(), "bob".into()],
        ..ws.config()
    };
    let tracker = Capture(RefCell::new(Vec::new()));
    run_with(&config, Some(&tracker as &dyn IssueTracker), Cache::in_memory(60));

    let created = tracker.0.borrow();
    assert_eq!(created[0].labels, ["bug", "ui"]);
    assert_eq!(created[0].assignees, ["alice", "bob", "carol"]);
    assert_eq!(created[0].body, "Details.");
}

#[test]
fn report_written_in_encounter_order() {
    let ws = Workspace::new(&[("b.md", "# B\n"), ("a.md", "# A\n"), ("_meta.md", "# M\n")]);
    let config = ws.config();
    let tracker = FakeTracker::new();

    run(&config, &tracker);
    let report = RunReport::read_from(&config.report_path).unwrap();
    let files: Vec<_> = report.records().iter().map(|r| r.file.as_str()).collect();
    assert_eq!(files, ["a.md", "b.md"]);
}
