//! Preamble block parsing.
//!
//! A preamble is a `---` delimited block at the very top of a document
//! holding `key: value` lines. Supported value shapes:
//!
//! ```text
//! title: Fix login bug          scalar (quotes stripped)
//! labels: [bug, "ui, web"]      inline sequence
//! labels: bug, ui               scalar, split for list-typed fields
//! supersedes:                   block sequence
//!   - 42
//!   - Old title
//! owner:                        nested mapping (rejected for list fields)
//!   team: platform
//! ```
//!
//! Values are normalized once here; downstream code never looks at the
//! raw shape again.

use std::collections::BTreeMap;

/// Opening and closing line of a preamble block
pub const DELIMITER: &str = "---";

/// Fields whose scalar values are split on `,` into sequences.
pub const LIST_FIELDS: &[&str] = &["labels", "supersedes", "assignees"];

/// A single preamble value after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreambleValue {
    Scalar(String),
    Sequence(Vec<String>),
    /// Indented `key: value` lines under a key
    Nested(Vec<(String, String)>),
}

impl PreambleValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[String]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Short shape name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "string",
            Self::Sequence(_) => "list",
            Self::Nested(_) => "mapping",
        }
    }
}

/// Declared preamble fields, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preamble {
    fields: BTreeMap<String, PreambleValue>,
}

impl Preamble {
    pub fn get(&self, key: &str) -> Option<&PreambleValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Insert a field, normalizing list-typed fields.
    pub fn insert(&mut self, key: impl Into<String>, value: PreambleValue) {
        let key = key.into();
        let value = if LIST_FIELDS.contains(&key.as_str()) {
            normalize_list_field(value)
        } else {
            value
        };
        self.fields.insert(key, value);
    }

    /// List-typed field as a sequence; empty when absent or not a list.
    pub fn list(&self, key: &str) -> &[String] {
        self.get(key)
            .and_then(PreambleValue::as_sequence)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PreambleValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn normalize_list_field(value: PreambleValue) -> PreambleValue {
    match value {
        PreambleValue::Scalar(s) => PreambleValue::Sequence(
            s.split(',')
                .map(|item| strip_quotes(item).to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        ),
        other => other,
    }
}

/// Result of splitting a document into preamble and body.
#[derive(Debug, Clone, Default)]
pub struct SplitDocument<'a> {
    pub preamble: Preamble,
    pub body: &'a str,
    /// Structural problems found while parsing the block
    pub diagnostics: Vec<String>,
}

/// Split raw document text into preamble and body.
///
/// Text without a leading delimiter line is all body. An opening
/// delimiter without a closing one is reported and the whole text is
/// treated as body.
pub fn split_preamble(text: &str) -> SplitDocument<'_> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines = text.split_inclusive('\n');
    let block_start = match lines.next() {
        Some(first) if first.trim_end() == DELIMITER => first.len(),
        _ => {
            return SplitDocument {
                body: text,
                ..Default::default()
            };
        }
    };

    let mut offset = block_start;
    let mut block_end = None;
    for line in lines {
        if line.trim_end() == DELIMITER {
            block_end = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }

    let Some((block_end, body_start)) = block_end else {
        return SplitDocument {
            body: text,
            diagnostics: vec!["preamble block is not terminated".to_string()],
            ..Default::default()
        };
    };

    let (preamble, diagnostics) = parse_block(&text[block_start..block_end]);
    SplitDocument {
        preamble,
        body: &text[body_start..],
        diagnostics,
    }
}

/// Key whose value is being built from indented child lines.
struct OpenKey {
    name: String,
    items: Vec<String>,
    nested: Vec<(String, String)>,
}

impl OpenKey {
    fn close(self, preamble: &mut Preamble) {
        let value = if !self.nested.is_empty() {
            PreambleValue::Nested(self.nested)
        } else if !self.items.is_empty() {
            PreambleValue::Sequence(self.items)
        } else {
            PreambleValue::Scalar(String::new())
        };
        preamble.insert(self.name, value);
    }
}

fn parse_block(raw: &str) -> (Preamble, Vec<String>) {
    let mut preamble = Preamble::default();
    let mut diagnostics = Vec::new();
    let mut open: Option<OpenKey> = None;

    for (idx, raw_line) in raw.lines().enumerate() {
        let line_num = idx + 2; // line 1 is the opening delimiter
        let line = raw_line.trim_end();
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indented = trimmed.len() != line.len();
        if let Some(item) = list_item(trimmed) {
            match open.as_mut() {
                Some(key) if key.nested.is_empty() => {
                    let item = strip_quotes(item);
                    if !item.is_empty() {
                        key.items.push(item.to_string());
                    }
                }
                _ => diagnostics.push(format!(
                    "preamble line {line_num}: list item without a list key"
                )),
            }
            continue;
        }

        if indented {
            match (open.as_mut(), key_value(trimmed)) {
                (Some(key), Some((k, v))) if key.items.is_empty() => {
                    key.nested.push((k.to_string(), strip_quotes(v).to_string()));
                }
                _ => diagnostics.push(format!(
                    "preamble line {line_num}: unexpected indentation `{trimmed}`"
                )),
            }
            continue;
        }

        if let Some(key) = open.take() {
            key.close(&mut preamble);
        }

        let Some((key, value)) = key_value(line) else {
            diagnostics.push(format!("preamble line {line_num}: unsupported syntax `{line}`"));
            continue;
        };
        if preamble.contains(key) {
            diagnostics.push(format!("preamble line {line_num}: duplicate field `{key}`"));
        }

        if value.is_empty() {
            open = Some(OpenKey {
                name: key.to_string(),
                items: Vec::new(),
                nested: Vec::new(),
            });
        } else if value.starts_with('[') && value.ends_with(']') {
            preamble.insert(key, PreambleValue::Sequence(parse_inline_list(value)));
        } else {
            preamble.insert(key, PreambleValue::Scalar(strip_quotes(value).to_string()));
        }
    }

    if let Some(key) = open.take() {
        key.close(&mut preamble);
    }

    (preamble, diagnostics)
}

fn list_item(trimmed: &str) -> Option<&str> {
    if trimmed == "-" {
        return Some("");
    }
    trimmed.strip_prefix("- ").map(str::trim)
}

fn key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim_end();
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return None;
    }
    Some((key, value.trim()))
}

fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    let bytes = value.as_bytes();
    if value.len() >= 2
        && ((bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\''))
    {
        return value[1..value.len() - 1].trim();
    }
    value
}

/// `[a, "b, c", 'd']` → `["a", "b, c", "d"]`
fn parse_inline_list(value: &str) -> Vec<String> {
    let inner = value[1..value.len() - 1].trim();
    let mut items = Vec::new();
    let mut buf = String::new();
    let mut quote: Option<char> = None;

    for ch in inner.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                buf.push(ch);
            }
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                buf.push(ch);
            }
            None if ch == ',' => {
                push_item(&mut items, &buf);
                buf.clear();
            }
            None => buf.push(ch),
        }
    }
    push_item(&mut items, &buf);
    items
}

fn push_item(items: &mut Vec<String>, raw: &str) {
    let item = strip_quotes(raw);
    if !item.is_empty() {
        items.push(item.to_string());
    }
}
