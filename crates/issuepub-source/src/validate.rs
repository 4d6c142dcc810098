//! Preamble schema validation. Pure, never touches the network.

use crate::document::SourceDocument;
use crate::preamble::{LIST_FIELDS, Preamble, PreambleValue};

/// Fields the pipeline understands. Anything else is a warning.
pub const KNOWN_FIELDS: &[&str] = &["title", "labels", "supersedes", "assignees"];

/// Errors and warnings for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// How validation errors affect a validate-only run's exit status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Report errors, exit normally
    #[default]
    Warn,
    /// Any schema error makes a validate-only run fail
    Errors,
}

impl FailurePolicy {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "errors" | "error" => Some(Self::Errors),
            "warn" | "warnings" | "none" | "" => Some(Self::Warn),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Errors => "errors",
        }
    }
}

/// Check preamble fields against the schema.
pub fn validate(preamble: &Preamble) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    for (key, value) in preamble.iter() {
        if !KNOWN_FIELDS.contains(&key) {
            outcome.warnings.push(format!("unknown field `{key}`"));
            continue;
        }
        if LIST_FIELDS.contains(&key) && !matches!(value, PreambleValue::Sequence(_)) {
            outcome.errors.push(format!(
                "`{key}` must be a list or a string, found {}",
                value.kind()
            ));
        }
    }

    match preamble.get("title") {
        Some(PreambleValue::Scalar(t)) if t.trim().is_empty() => {
            outcome.errors.push("`title` is empty".to_string());
        }
        Some(value @ (PreambleValue::Sequence(_) | PreambleValue::Nested(_))) => {
            outcome
                .errors
                .push(format!("`title` must be a string, found {}", value.kind()));
        }
        _ => {}
    }

    outcome
}

/// Full document check: structural parse problems, schema, and title.
pub fn validate_document(doc: &SourceDocument) -> ValidationOutcome {
    let mut outcome = ValidationOutcome {
        errors: doc.diagnostics.clone(),
        warnings: Vec::new(),
    };
    let schema = validate(&doc.preamble);
    outcome.errors.extend(schema.errors);
    outcome.warnings.extend(schema.warnings);

    if doc.title.trim().is_empty() {
        outcome
            .errors
            .push("could not derive a non-empty title".to_string());
    }
    outcome
}
