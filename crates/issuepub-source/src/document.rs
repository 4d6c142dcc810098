//! Source documents: one markdown file → one tracker item

use std::path::Path;

use anyhow::Context;

use crate::preamble::{Preamble, PreambleValue, split_preamble};

/// Where a document's title came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TitleSource {
    /// `title:` preamble field
    Declared,
    /// First level-1 heading of the body
    Heading,
    /// File name with separators replaced by spaces
    FileName,
}

/// A reference to an older tracker item this document replaces.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SupersedeRef {
    Number(u64),
    Title(String),
}

impl SupersedeRef {
    /// `42` and `#42` are numeric, anything else non-empty is a title.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let digits = raw.strip_prefix('#').unwrap_or(raw);
        match digits.parse::<u64>() {
            Ok(n) if digits.bytes().all(|b| b.is_ascii_digit()) => Some(Self::Number(n)),
            _ => Some(Self::Title(raw.to_string())),
        }
    }
}

impl std::fmt::Display for SupersedeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "#{n}"),
            Self::Title(t) => write!(f, "\"{t}\""),
        }
    }
}

/// A parsed input file.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// File name; join key between report rows and created items
    pub identifier: String,
    pub preamble: Preamble,
    /// Idempotency key before normalization. May be empty, which
    /// validation reports as an error.
    pub title: String,
    pub title_source: TitleSource,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub supersedes: Vec<SupersedeRef>,
    /// Structural preamble problems, surfaced as validation errors
    pub diagnostics: Vec<String>,
}

impl SourceDocument {
    /// Read and parse a file. The file name becomes the identifier.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let identifier = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("No file name in {}", path.display()))?;
        Ok(Self::parse(&identifier, &text))
    }

    /// Parse raw text. Pure; never fails.
    pub fn parse(identifier: &str, text: &str) -> Self {
        let split = split_preamble(text);
        let heading = first_heading(split.body);

        let (title, title_source) = match declared_title(&split.preamble) {
            Some(t) => (t.to_string(), TitleSource::Declared),
            None => match heading {
                Some(h) => (h.text.to_string(), TitleSource::Heading),
                None => (title_from_file_name(identifier), TitleSource::FileName),
            },
        };

        let body = match heading {
            Some(h) => format!("{}{}", &split.body[..h.start], &split.body[h.end..]),
            None => split.body.to_string(),
        };

        let preamble = split.preamble;
        let labels = preamble.list("labels").to_vec();
        let assignees = preamble.list("assignees").to_vec();
        let supersedes = preamble
            .list("supersedes")
            .iter()
            .filter_map(|raw| SupersedeRef::parse(raw))
            .collect();

        Self {
            identifier: identifier.to_string(),
            title,
            title_source,
            body: body.trim().to_string(),
            labels,
            assignees,
            supersedes,
            diagnostics: split.diagnostics,
            preamble,
        }
    }

    /// Normalized idempotency key.
    pub fn key(&self) -> String {
        normalize_title(&self.title)
    }
}

/// Lower-cased, trimmed, whitespace-collapsed title.
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn declared_title(preamble: &Preamble) -> Option<&str> {
    match preamble.get("title") {
        Some(PreambleValue::Scalar(t)) if !t.trim().is_empty() => Some(t.trim()),
        _ => None,
    }
}

/// `fix-login-bug.md` → `fix login bug`
fn title_from_file_name(identifier: &str) -> String {
    let stem = Path::new(identifier)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Copy)]
struct Heading<'a> {
    text: &'a str,
    /// Byte range of the whole heading line, newline included
    start: usize,
    end: usize,
}

/// First `# Heading` line outside fenced code blocks.
fn first_heading(body: &str) -> Option<Heading<'_>> {
    let mut offset = 0;
    let mut fence: Option<&str> = None;
    for line in body.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let trimmed = line.trim();

        if let Some(marker) = fence {
            if trimmed.starts_with(marker) {
                fence = None;
            }
            continue;
        }
        if trimmed.starts_with("```") {
            fence = Some("```");
            continue;
        }
        if trimmed.starts_with("~~~") {
            fence = Some("~~~");
            continue;
        }

        if let Some(rest) = line.trim_end().strip_prefix("# ") {
            let text = rest.trim().trim_end_matches('#').trim_end();
            if !text.is_empty() {
                return Some(Heading {
                    text,
                    start,
                    end: offset,
                });
            }
        }
    }
    None
}
