//! Dependency edge encoding.
//!
//! Inline tasks carry an ID token on the depended-upon line and a dependency
//! token on the dependent line. Reading accepts every notation; writing uses
//! the configured [`LinkStyle`] unless the line is already structured.
//! Note tasks keep their dependencies in a `blockedBy` header list.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frontmatter;
use crate::parser::file_stem;
use crate::patterns::{self, compile, split_ids, DEPENDS_GLYPH, ID_GLYPH};
use crate::task::{push_unique, TaskRecord};

pub const RELTYPE_FINISH_TO_START: &str = "FINISHTOSTART";
/// Column of the `-` in `blockedBy` entries written to a new list.
pub const ENTRY_INDENT: usize = 2;

/// Leading whitespace, then a `⛔` list.
static DEPENDS_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(\s*)⛔\x{FE0F}?\s*([a-zA-Z0-9]{6}(?:\s*,\s*[a-zA-Z0-9]{6})*)")
});

/// Leading whitespace, optional outer bracket, then `[dependsOn:: list]`.
static STRUCTURED_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(\s*)(\[?)\[dependsOn::\s*([a-zA-Z0-9]{6}(?:\s*,\s*[a-zA-Z0-9]{6})*)\s*\](\]?)")
});

static WIKI_TARGET: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\[\[([^\]|#]+)(?:[|#][^\]]*)?\]\]$"));

/// Notation used when writing new inline dependency tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStyle {
    /// One `⛔ id` token per dependency.
    Individual,
    /// A single `⛔ a,b,c` token.
    #[default]
    Csv,
    /// A single `[dependsOn:: a, b]` field, with `[id:: x]` IDs.
    Dataview,
}

impl LinkStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStyle::Individual => "individual",
            LinkStyle::Csv => "csv",
            LinkStyle::Dataview => "dataview",
        }
    }
}

impl fmt::Display for LinkStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkStyle {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "individual" => Ok(LinkStyle::Individual),
            "csv" => Ok(LinkStyle::Csv),
            "dataview" => Ok(LinkStyle::Dataview),
            other => Err(Error::InvalidArgument(format!(
                "unknown linking style '{other}' (expected individual|csv|dataview)"
            ))),
        }
    }
}

/// UI correlation key for an edge.
pub fn edge_hash(from_id: &str, to_id: &str) -> String {
    format!("{from_id}-{to_id}")
}

/// The *from* side of `hash`, given the *to* side; a bare id passes through.
pub fn source_of_hash<'a>(hash: &'a str, to_id: &str) -> &'a str {
    hash.strip_suffix(to_id)
        .and_then(|rest| rest.strip_suffix('-'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(hash)
}

/// Every dependency ID the line references, in any notation.
pub fn referenced_ids(line: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for id in patterns::csv_links(line)
        .into_iter()
        .chain(patterns::individual_links(line))
        .chain(patterns::dataview_links(line))
    {
        push_unique(&mut ids, id);
    }
    ids
}

fn append_token(line: &str, token: &str) -> String {
    format!("{} {token}", line.trim_end())
}

/// The token written for a task's own ID.
pub fn id_token(id: &str, style: LinkStyle) -> String {
    match style {
        LinkStyle::Dataview => format!("[id:: {id}]"),
        LinkStyle::Individual | LinkStyle::Csv => format!("{ID_GLYPH} {id}"),
    }
}

/// Give the line an ID token unless it already has one in either notation.
pub fn add_id(line: &str, id: &str, style: LinkStyle) -> String {
    if patterns::has_id_token(line) {
        return line.to_string();
    }
    append_token(line, &id_token(id, style))
}

fn uses_structured_fields(line: &str) -> bool {
    patterns::DATAVIEW_ID_GLOBAL.is_match(line) || patterns::DATAVIEW_DEPENDS.is_match(line)
}

/// Record a dependency on `id`.
pub fn add_dependency(line: &str, id: &str, style: LinkStyle) -> String {
    if referenced_ids(line).iter().any(|existing| existing == id) {
        return line.to_string();
    }

    if style == LinkStyle::Dataview || uses_structured_fields(line) {
        return match STRUCTURED_TOKEN.captures(line) {
            Some(caps) => {
                let mut ids = split_ids(&caps[3]);
                ids.push(id.to_string());
                let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
                let token = render_structured(&caps, &ids.join(", "));
                format!("{}{token}{}", &line[..whole.start], &line[whole.end..])
            }
            None => append_token(line, &format!("[dependsOn:: {id}]")),
        };
    }

    match style {
        LinkStyle::Csv => merge_csv(line, id),
        _ => append_token(line, &format!("{DEPENDS_GLYPH} {id}")),
    }
}

/// Fold every `⛔` token into the first one and add `id` to it.
fn merge_csv(line: &str, id: &str) -> String {
    let matches: Vec<Captures> = DEPENDS_TOKEN.captures_iter(line).collect();
    if matches.is_empty() {
        return append_token(line, &format!("{DEPENDS_GLYPH} {id}"));
    }

    let mut ids = Vec::new();
    for caps in &matches {
        for existing in split_ids(&caps[2]) {
            push_unique(&mut ids, existing);
        }
    }
    push_unique(&mut ids, id);

    let mut out = String::with_capacity(line.len() + id.len() + 2);
    let mut last = 0;
    for (idx, caps) in matches.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&line[last..whole.start()]);
        if idx == 0 {
            out.push_str(&caps[1]);
            out.push_str(DEPENDS_GLYPH);
            out.push(' ');
            out.push_str(&ids.join(","));
        }
        last = whole.end();
    }
    out.push_str(&line[last..]);
    out
}

fn render_structured(caps: &Captures, list: &str) -> String {
    format!("{}{}[dependsOn:: {list}]{}", &caps[1], &caps[2], &caps[4])
}

fn separator_of(list: &str) -> &'static str {
    if list.contains(", ") {
        ", "
    } else {
        ","
    }
}

/// Drop `id` from every dependency token; a token left empty is deleted
/// together with its leading whitespace.
pub fn remove_dependency(line: &str, id: &str) -> String {
    let line = filter_tokens(line, &DEPENDS_TOKEN, 2, id, |caps, list| {
        format!("{}{DEPENDS_GLYPH} {list}", &caps[1])
    });
    filter_tokens(&line, &STRUCTURED_TOKEN, 3, id, |caps, list| {
        render_structured(caps, list)
    })
}

fn filter_tokens(
    line: &str,
    pattern: &Regex,
    list_group: usize,
    id: &str,
    render: impl Fn(&Captures, &str) -> String,
) -> String {
    pattern
        .replace_all(line, |caps: &Captures| {
            let list = &caps[list_group];
            let ids = split_ids(list);
            if !ids.iter().any(|existing| existing == id) {
                return caps[0].to_string();
            }
            let kept: Vec<String> = ids.into_iter().filter(|existing| existing != id).collect();
            if kept.is_empty() {
                String::new()
            } else {
                render(caps, &kept.join(separator_of(list)))
            }
        })
        .into_owned()
}

/// One `blockedBy` entry of a note header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedByEntry {
    /// Raw reference, normally `[[Name]]`.
    pub uid: String,
    pub reltype: String,
}

impl BlockedByEntry {
    pub fn new(name: &str) -> Self {
        Self::with_uid(format!("[[{name}]]"))
    }

    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            reltype: RELTYPE_FINISH_TO_START.to_string(),
        }
    }

    /// The referenced note name.
    pub fn target(&self) -> &str {
        WIKI_TARGET
            .captures(&self.uid)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .unwrap_or_else(|| self.uid.trim())
    }

    /// Whether this entry points at `name`, bracketed or bare.
    pub fn refers_to(&self, name: &str) -> bool {
        self.target() == name || self.uid.contains(&format!("[[{name}]]"))
    }

    /// Two-line form with the list marker at column `indent`.
    pub fn render_at(&self, indent: usize) -> [String; 2] {
        let pad = " ".repeat(indent);
        [
            format!("{pad}- uid: \"{}\"", self.uid),
            format!("{pad}  reltype: {}", self.reltype),
        ]
    }
}

/// A `blockedBy` entry and the lines it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedBySpan {
    pub lines: Range<usize>,
    /// Column of the entry's `-`.
    pub indent: usize,
    pub entry: BlockedByEntry,
}

/// Entries of the `blockedBy` list held in `lines[block]`, at any
/// indentation.
///
/// An entry runs from its list item through the key lines below it. Comment
/// and blank lines after an entry belong to no entry. A list item counts as
/// nested when it sits under an entry key that has no value of its own.
pub fn blocked_by_spans<S: AsRef<str>>(lines: &[S], block: Range<usize>) -> Vec<BlockedBySpan> {
    let mut spans: Vec<BlockedBySpan> = Vec::new();
    let mut nested_under: Option<usize> = None;
    for idx in block {
        let line = lines[idx].as_ref();
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        let item = frontmatter::list_item(line);

        if let Some(value) = item.filter(|_| !matches!(nested_under, Some(key) if indent >= key)) {
            let uid = frontmatter::key_value(value, "uid").unwrap_or(value);
            spans.push(BlockedBySpan {
                lines: idx..idx + 1,
                indent,
                entry: BlockedByEntry::with_uid(frontmatter::unquote(uid)),
            });
            nested_under = None;
            continue;
        }

        let Some(span) = spans.last_mut() else {
            continue;
        };
        span.lines.end = idx + 1;
        if item.is_some() {
            continue;
        }
        if let Some(value) = frontmatter::key_value(trimmed, "reltype") {
            span.entry.reltype = frontmatter::unquote(value).to_string();
        } else if let Some(value) = frontmatter::key_value(trimmed, "uid") {
            if span.entry.uid.is_empty() {
                span.entry.uid = frontmatter::unquote(value).to_string();
            }
        }
        nested_under = trimmed.ends_with(':').then_some(indent);
    }
    spans
}

/// Name written into a `blockedBy` entry for `task`.
pub fn note_dependency_name(task: &TaskRecord) -> String {
    if task.link.trim().is_empty() {
        return task.text.trim().to_string();
    }
    file_stem(&task.link)
}

/// Name of the note a path points at, for matching `blockedBy` entries.
pub fn note_name_of_path(path: &str) -> String {
    file_stem(path)
}
