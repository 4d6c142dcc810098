//! Index artifact rewrite.
//!
//! The index is a markdown file with one or more pipe tables listing
//! source documents. After a publishing run, rows mentioning a newly
//! created document get its tracker number:
//!
//! ```text
//! | File             | Issue |        | File             | Issue |
//! |------------------|-------|   →    |------------------|-------|
//! | fix-login-bug.md |       |        | fix-login-bug.md | #123  |
//! ```
//!
//! Tables with an `Issue` column get the number in that column; other
//! tables get ` (#123)` appended to the cell naming the file. Existing
//! annotations are never removed, only added to, and only cells that
//! change are touched, so an empty update leaves the file byte-identical.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

/// Header names (case-insensitive) of the column receiving numbers
const ISSUE_HEADERS: &[&str] = &["issue", "issues", "tracker"];

/// Rewrite the index at `path` in place. Returns whether it changed.
///
/// A missing index is not an error; there is simply nothing to annotate.
pub fn rewrite_index(path: &Path, created: &BTreeMap<String, u64>) -> Result<bool> {
    if created.is_empty() {
        return Ok(false);
    }
    if !path.exists() {
        log::debug!("index: {} not found, skipping", path.display());
        return Ok(false);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let updated = annotate_index(&text, created);
    if updated == text {
        return Ok(false);
    }
    std::fs::write(path, updated).with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("index: annotated {}", path.display());
    Ok(true)
}

/// Pure rewrite of index text.
pub fn annotate_index(text: &str, created: &BTreeMap<String, u64>) -> String {
    if created.is_empty() {
        return text.to_string();
    }

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut out = String::with_capacity(text.len() + created.len() * 8);
    let mut table: Option<TableState> = None;

    for (i, line) in lines.iter().enumerate() {
        let content = line.trim_end_matches(['\n', '\r']);
        let ending = &line[content.len()..];

        if !is_table_row(content) {
            table = None;
            out.push_str(line);
            continue;
        }

        match table.as_mut() {
            None => {
                // A header row only counts when a separator row follows
                let next_is_separator = lines
                    .get(i + 1)
                    .map(|l| is_separator_row(l.trim_end_matches(['\n', '\r'])))
                    .unwrap_or(false);
                if next_is_separator {
                    table = Some(TableState {
                        issue_column: issue_column(content),
                        seen_separator: false,
                    });
                }
                out.push_str(line);
            }
            Some(state) if !state.seen_separator => {
                state.seen_separator = true;
                out.push_str(line);
            }
            Some(state) => {
                out.push_str(&annotate_row(content, state.issue_column, created));
                out.push_str(ending);
            }
        }
    }
    out
}

struct TableState {
    issue_column: Option<usize>,
    seen_separator: bool,
}

fn is_table_row(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn is_separator_row(line: &str) -> bool {
    let cells = cell_spans(line);
    !cells.is_empty()
        && cells.iter().all(|&(s, e)| {
            let c = line[s..e].trim();
            !c.is_empty() && c.contains('-') && c.chars().all(|ch| matches!(ch, '-' | ':'))
        })
}

fn issue_column(header: &str) -> Option<usize> {
    cell_spans(header).iter().position(|&(s, e)| {
        let name = header[s..e].trim().to_ascii_lowercase();
        ISSUE_HEADERS.contains(&name.as_str())
    })
}

/// Byte ranges of cell contents between unescaped pipes.
fn cell_spans(line: &str) -> Vec<(usize, usize)> {
    let bytes = line.as_bytes();
    let mut pipes = Vec::new();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'|' && (i == 0 || bytes[i - 1] != b'\\') {
            pipes.push(i);
        }
    }
    let mut spans: Vec<(usize, usize)> = pipes.windows(2).map(|w| (w[0] + 1, w[1])).collect();
    // Row without a trailing pipe: last cell runs to end of line
    if let Some(&last) = pipes.last() {
        if !line[last + 1..].trim().is_empty() {
            spans.push((last + 1, line.len()));
        }
    }
    spans
}

fn annotate_row(row: &str, issue_column: Option<usize>, created: &BTreeMap<String, u64>) -> String {
    let spans = cell_spans(row);

    let Some((file_cell, number)) = spans.iter().enumerate().find_map(|(idx, &(s, e))| {
        created
            .iter()
            .find(|(file, _)| mentions_file(&row[s..e], file))
            .map(|(_, &n)| (idx, n))
    }) else {
        return row.to_string();
    };

    let target = match issue_column {
        Some(col) if col < spans.len() => col,
        _ => file_cell,
    };
    let (s, e) = spans[target];
    let cell = &row[s..e];
    let marker = format!("#{number}");
    if mentions_number(cell, number) {
        return row.to_string();
    }

    let trimmed = cell.trim();
    let new_cell = if target != file_cell || issue_column.is_some() {
        if trimmed.is_empty() {
            format!(" {marker} ")
        } else {
            format!(" {trimmed}, {marker} ")
        }
    } else {
        format!(" {trimmed} ({marker}) ")
    };
    format!("{}{}{}", &row[..s], new_cell, &row[e..])
}

/// `name` appears as a whole file name, not inside a longer one.
fn mentions_file(cell: &str, name: &str) -> bool {
    let is_name_char = |c: char| c.is_alphanumeric() || matches!(c, '-' | '_' | '.');
    cell.match_indices(name).any(|(i, _)| {
        let before = cell[..i].chars().next_back();
        let after = cell[i + name.len()..].chars().next();
        !before.is_some_and(is_name_char) && !after.is_some_and(is_name_char)
    })
}

fn mentions_number(cell: &str, number: u64) -> bool {
    let marker = format!("#{number}");
    cell.match_indices(&marker).any(|(i, _)| {
        !cell[i + marker.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    })
}
