//! Batch driver: discover, run every document through the state
//! machine, then flush cache, report and index.

use std::path::Path;

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use issuepub_core::{INTERRUPTED_EXIT, SharedProgress, is_shutdown_requested};
use issuepub_github::{IssueTracker, NewIssue};
use issuepub_source::{FailurePolicy, SourceDocument, discover, validate_document};
use issuepub_store::{Cache, ReportRecord, RunReport, content_hash, rewrite_index, short_hash};

use crate::config::{PublishConfig, RunMode};
use crate::idempotency::{record_created, resolve_exists};
use crate::state::{DocState, Flow, Step, next_step};
use crate::supersede::{close_superseded, pace};

/// Hidden marker opening every provenance comment
pub const PROVENANCE_MARKER: &str = "<!-- issuepub:provenance -->";

/// Hex digits of the content hash shown in provenance comments
const HASH_PREFIX_LEN: usize = 16;

/// Result of one batch.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub mode: RunMode,
    /// Documents whose preamble failed validation. Read and transport
    /// failures are not counted here.
    pub schema_errors: usize,
    /// Stopped early by a shutdown request
    pub interrupted: bool,
    /// Index artifact was rewritten
    pub index_updated: bool,
}

impl RunOutcome {
    /// 130 interrupted, 2 schema errors under the `errors` policy in a
    /// validate-only run, 1 any document errored, else 0.
    pub fn exit_status(&self, policy: FailurePolicy) -> u8 {
        if self.interrupted {
            INTERRUPTED_EXIT
        } else if self.mode == RunMode::ValidateOnly
            && policy == FailurePolicy::Errors
            && self.schema_errors > 0
        {
            2
        } else if self.report.has_failures() {
            1
        } else {
            0
        }
    }
}

/// One publishing run over a source directory.
///
/// Owns the cache for the duration of the run; the tracker is `None`
/// when no credentials are configured.
pub struct Publisher<'a> {
    config: &'a PublishConfig,
    tracker: Option<&'a dyn IssueTracker>,
    cache: Cache,
    progress: SharedProgress,
    schema_errors: usize,
}

/// Per-document scratch data carried between steps.
struct DocRun {
    doc: Option<SourceDocument>,
    text_hash: String,
    number: Option<u64>,
    record: ReportRecord,
}

impl<'a> Publisher<'a> {
    pub fn new(
        config: &'a PublishConfig,
        tracker: Option<&'a dyn IssueTracker>,
        cache: Cache,
        progress: SharedProgress,
    ) -> Self {
        Self {
            config,
            tracker,
            cache,
            progress,
            schema_errors: 0,
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn into_cache(self) -> Cache {
        self.cache
    }

    fn flow(&self) -> Flow {
        let mode = self.config.mode();
        Flow {
            mode,
            remote: self.tracker.is_some() && mode != RunMode::ValidateOnly,
            close_superseded: self.config.close_superseded,
            add_metadata: self.config.add_metadata,
        }
    }

    /// Process every discovered document.
    ///
    /// Only discovery and the report write are fatal. Per-document
    /// failures end up in the report.
    pub fn run(&mut self) -> anyhow::Result<RunOutcome> {
        let flow = self.flow();
        if self.config.publish && flow.mode == RunMode::DryRun {
            log::warn!("publishing requested without repository or token, running as dry run");
        }

        let files = discover(&self.config.source_dir, &self.config.discover_filter())?;
        log::info!(
            "{} documents in {} ({})",
            files.len(),
            self.config.source_dir.display(),
            flow.mode
        );

        let pb = self.progress.run_bar(flow.mode.as_str(), files.len());
        let mut report = RunReport::new();
        let mut interrupted = false;
        self.schema_errors = 0;

        for (i, path) in files.iter().enumerate() {
            if is_shutdown_requested() {
                log::warn!(
                    "Shutdown requested, stopping after {i} of {} documents",
                    files.len()
                );
                interrupted = true;
                break;
            }
            let record = self.process(path, &flow);
            log::info!("[{}/{}] {}: {}", i + 1, files.len(), record.file, record.action);
            pb.set_message(record.file.clone());
            pb.inc(1);
            report.push(record);
        }
        pb.finish_and_clear();

        if let Err(e) = self.cache.save() {
            log::warn!("cache: save failed: {e:#}");
        }

        report
            .write_to(&self.config.report_path)
            .context("Failed to write run report")?;
        log::info!("report: {}", self.config.report_path.display());

        let mut index_updated = false;
        if flow.mode == RunMode::Publish {
            match rewrite_index(&self.config.index_path(), &report.created()) {
                Ok(changed) => index_updated = changed,
                Err(e) => log::warn!("index: rewrite failed: {e:#}"),
            }
        }

        let summary = report.summary();
        if self.progress.is_tty() {
            summary.print();
        } else {
            summary.log();
        }

        Ok(RunOutcome {
            report,
            mode: flow.mode,
            schema_errors: self.schema_errors,
            interrupted,
            index_updated,
        })
    }

    /// Drive one document to a terminal state. Never fails.
    fn process(&mut self, path: &Path, flow: &Flow) -> ReportRecord {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut run = DocRun {
            doc: None,
            text_hash: String::new(),
            number: None,
            record: ReportRecord::new(file, "", issuepub_store::Action::Error),
        };

        let mut state = DocState::Start;
        loop {
            let step = next_step(state, flow);
            let result = match step {
                Step::Parse => self.parse(path, &mut run),
                Step::Validate => self.validate(&mut run),
                Step::CheckExists => self.check_exists(&mut run),
                Step::Create => self.create(&mut run),
                Step::CloseSuperseded => self.close_superseded(&mut run),
                Step::Annotate => self.annotate(&mut run),
                Step::Finish(terminal) => Ok(DocState::Done(terminal)),
                Step::Stop => break,
            };
            state = result.unwrap_or_else(|e| {
                log::error!("{}: {e:#}", run.record.file);
                run.record.errors.push(format!("{e:#}"));
                DocState::Failed
            });
            if let DocState::Done(terminal) = state {
                run.record.action = terminal.action();
            }
        }

        run.record.number = run.number;
        run.record
    }

    fn parse(&self, path: &Path, run: &mut DocRun) -> anyhow::Result<DocState> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        run.text_hash = short_hash(&content_hash(text.as_bytes()), HASH_PREFIX_LEN);
        let doc = SourceDocument::parse(&run.record.file, &text);
        run.record.title = doc.title.clone();
        run.doc = Some(doc);
        Ok(DocState::Parsed)
    }

    fn validate(&mut self, run: &mut DocRun) -> anyhow::Result<DocState> {
        let doc = parsed(run)?;
        let outcome = validate_document(doc);
        let has_title = !doc.title.trim().is_empty();
        self.schema_errors += usize::from(outcome.has_errors());
        for e in &outcome.errors {
            log::warn!("{}: {e}", run.record.file);
        }
        for w in &outcome.warnings {
            log::debug!("{}: {w}", run.record.file);
        }
        run.record.errors.extend(outcome.errors);
        run.record.warnings.extend(outcome.warnings);
        Ok(DocState::Validated { has_title })
    }

    fn check_exists(&mut self, run: &mut DocRun) -> anyhow::Result<DocState> {
        let tracker = self.tracker.context("no tracker configured")?;
        let title = parsed(run)?.title.clone();
        match resolve_exists(tracker, &mut self.cache, &title) {
            Ok(exists) => Ok(DocState::Checked { exists }),
            Err(e) => {
                log::warn!("{}: could not confirm existence: {e}", run.record.file);
                run.record.warnings.push(format!(
                    "could not confirm existence, attempting creation: {e}"
                ));
                Ok(DocState::Checked { exists: false })
            }
        }
    }

    fn create(&mut self, run: &mut DocRun) -> anyhow::Result<DocState> {
        let tracker = self.tracker.context("no tracker configured")?;
        let doc = parsed(run)?;
        let issue = NewIssue {
            title: doc.title.clone(),
            body: doc.body.clone(),
            labels: doc.labels.clone(),
            assignees: merge_assignees(&self.config.assignees, &doc.assignees),
        };
        let has_supersedes = !doc.supersedes.is_empty();

        let created = tracker
            .create_issue(&issue)
            .map_err(|e| anyhow::anyhow!("create failed: {e}"))?;
        log::info!("{}: created #{}", run.record.file, created.number);
        record_created(&mut self.cache, &issue.title);
        run.number = Some(created.number);
        pace(self.config.pacing);
        Ok(DocState::Created { has_supersedes })
    }

    fn close_superseded(&mut self, run: &mut DocRun) -> anyhow::Result<DocState> {
        let tracker = self.tracker.context("no tracker configured")?;
        let number = run.number.context("no created item to supersede with")?;
        let refs = parsed(run)?.supersedes.clone();
        let outcome = close_superseded(tracker, &mut self.cache, &refs, number, self.config.pacing);
        run.record.warnings.extend(outcome.warnings);
        Ok(DocState::SupersedeResolved)
    }

    /// A failed annotation is a warning: the item exists either way.
    fn annotate(&mut self, run: &mut DocRun) -> anyhow::Result<DocState> {
        let tracker = self.tracker.context("no tracker configured")?;
        let number = run.number.context("no created item to annotate")?;
        let body = provenance_comment(&run.record.file, &run.text_hash, Utc::now());
        match tracker.add_comment(number, &body) {
            Ok(()) => pace(self.config.pacing),
            Err(e) => {
                log::warn!("{}: provenance comment failed: {e}", run.record.file);
                run.record
                    .warnings
                    .push(format!("provenance comment failed: {e}"));
            }
        }
        Ok(DocState::Annotated)
    }
}

fn parsed(run: &DocRun) -> anyhow::Result<&SourceDocument> {
    run.doc.as_ref().context("document was not parsed")
}

/// Global assignees first, then the document's own; case-insensitive dedup.
pub fn merge_assignees(global: &[String], own: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for login in global.iter().chain(own) {
        let login = login.trim().trim_start_matches('@');
        if login.is_empty() || merged.iter().any(|m| m.eq_ignore_ascii_case(login)) {
            continue;
        }
        merged.push(login.to_string());
    }
    merged
}

pub fn provenance_comment(file: &str, hash: &str, at: chrono::DateTime<Utc>) -> String {
    format!(
        "{PROVENANCE_MARKER}\nSource: `{file}`\nContent hash: `blake3:{hash}`\nPublished: {}\n",
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn assignees_merge_in_order() {
        let merged = merge_assignees(&strings(&["alice", "bob"]), &strings(&["Bob", "@carol", ""]));
        assert_eq!(merged, ["alice", "bob", "carol"]);
    }

    #[test]
    fn provenance_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        let body = provenance_comment("a.md", "0123456789abcdef", at);
        assert!(body.starts_with(PROVENANCE_MARKER));
        assert!(body.contains("Source: `a.md`"));
        assert!(body.contains("blake3:0123456789abcdef"));
        assert!(body.contains("Published: 2026-03-01T12:30:00Z"));
    }

    fn outcome(mode: RunMode, report: RunReport, schema_errors: usize, interrupted: bool) -> RunOutcome {
        RunOutcome {
            report,
            mode,
            schema_errors,
            interrupted,
            index_updated: false,
        }
    }

    #[test]
    fn exit_statuses() {
        use issuepub_store::Action;

        let mut schema = RunReport::new();
        let mut rec = ReportRecord::new("a.md", "A", Action::Validate);
        rec.errors.push("bad".into());
        schema.push(rec);

        let validate = outcome(RunMode::ValidateOnly, schema, 1, false);
        assert_eq!(validate.exit_status(FailurePolicy::Errors), 2);
        assert_eq!(validate.exit_status(FailurePolicy::Warn), 0);

        let mut failed = RunReport::new();
        failed.push(ReportRecord::new("b.md", "B", Action::Error));
        assert_eq!(outcome(RunMode::Publish, failed, 0, false).exit_status(FailurePolicy::Warn), 1);

        assert_eq!(
            outcome(RunMode::Publish, RunReport::new(), 0, true).exit_status(FailurePolicy::Warn),
            130
        );
    }

    #[test]
    fn read_failure_is_not_a_schema_error() {
        use issuepub_store::Action;

        let mut report = RunReport::new();
        let mut rec = ReportRecord::new("a.md", "", Action::Error);
        rec.errors.push("Cannot read a.md".into());
        report.push(rec);

        let validate = outcome(RunMode::ValidateOnly, report, 0, false);
        assert_eq!(validate.exit_status(FailurePolicy::Errors), 1);
    }
}
