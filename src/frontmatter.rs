//! Note header ("frontmatter") helpers.
//!
//! Reads go through `serde_yaml`. Writes never do: the note mutator patches
//! header lines in place so that everything it does not touch keeps its
//! exact bytes, and these helpers only locate lines.

use std::ops::Range;

use serde_yaml::{Mapping, Value};

pub const DELIMITER: &str = "---";

/// Line indices of the opening and closing delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderBounds {
    pub start: usize,
    pub end: usize,
}

impl HeaderBounds {
    /// Indices of the lines strictly between the delimiters.
    pub fn body(&self) -> Range<usize> {
        self.start + 1..self.end
    }
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == DELIMITER
}

/// Header boundaries; the header must open on the first line.
pub fn find_header<S: AsRef<str>>(lines: &[S]) -> Option<HeaderBounds> {
    let first = lines.first()?;
    if !is_delimiter(first.as_ref()) {
        return None;
    }
    lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, line)| is_delimiter(line.as_ref()))
        .map(|(end, _)| HeaderBounds { start: 0, end })
}

/// Value part of `name: value` when `line` is the top-level key `name`.
pub fn key_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?;
    let rest = rest.strip_prefix(':')?;
    Some(rest.trim())
}

/// Index of the top-level `name:` line inside the header.
pub fn find_field<S: AsRef<str>>(lines: &[S], bounds: HeaderBounds, name: &str) -> Option<usize> {
    bounds
        .body()
        .find(|&idx| key_value(lines[idx].as_ref(), name).is_some())
}

/// Lines belonging to the list under the key at `key_idx`.
///
/// Items may be indented or start at column zero (`- value`); the block
/// ends at the next top-level key or the closing delimiter.
pub fn list_block<S: AsRef<str>>(lines: &[S], key_idx: usize, end: usize) -> Range<usize> {
    let first = key_idx + 1;
    let mut idx = first;
    while idx < end {
        let line = lines[idx].as_ref();
        let continues = line.starts_with(' ')
            || line.starts_with('\t')
            || line.starts_with("- ")
            || line == "-";
        if !continues {
            break;
        }
        idx += 1;
    }
    first..idx
}

/// Value of a list item line (`  - value`), any indentation.
pub fn list_item(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix('-')?;
    if !(rest.is_empty() || rest.starts_with(' ')) {
        return None;
    }
    Some(rest.trim())
}

/// Strip one layer of matching YAML quotes.
pub fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Items of a flow sequence `[a, b]`, or `None` when `value` is not one.
pub fn flow_items(value: &str) -> Option<Vec<String>> {
    let inner = value.trim().strip_prefix('[')?.strip_suffix(']')?;
    Some(
        inner
            .split(',')
            .map(|item| unquote(item).to_string())
            .filter(|item| !item.is_empty())
            .collect(),
    )
}

/// Parse the header block of `document` as a YAML mapping.
///
/// `Ok(None)` when there is no header or it is not a mapping.
pub fn parse_header(document: &str) -> Result<Option<Mapping>, serde_yaml::Error> {
    let lines: Vec<&str> = document.lines().collect();
    let Some(bounds) = find_header(&lines) else {
        return Ok(None);
    };
    let yaml = lines[bounds.body()].join("\n");
    if yaml.trim().is_empty() {
        return Ok(Some(Mapping::new()));
    }
    match serde_yaml::from_str::<Value>(&yaml)? {
        Value::Mapping(map) => Ok(Some(map)),
        _ => Ok(None),
    }
}

pub fn get<'a>(header: &'a Mapping, key: &str) -> Option<&'a Value> {
    header.get(key)
}

/// A header value read as a list of strings; a scalar becomes one item.
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_string).collect(),
        other => scalar_string(other).into_iter().collect(),
    }
}

pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_must_start_on_first_line() {
        let lines = ["---", "status: open", "---", "body"];
        assert_eq!(find_header(&lines), Some(HeaderBounds { start: 0, end: 2 }));

        let lines = ["# title", "---", "a: b", "---"];
        assert_eq!(find_header(&lines), None);

        let lines = ["---", "status: open"];
        assert_eq!(find_header(&lines), None);
    }

    #[test]
    fn field_lookup_is_exact_on_key() {
        let lines = ["---", "tagsfoo: x", "tags: ", "---"];
        let bounds = find_header(&lines).unwrap();
        assert_eq!(find_field(&lines, bounds, "tags"), Some(2));
        assert_eq!(key_value(lines[2], "tags"), Some(""));
    }

    #[test]
    fn list_block_accepts_column_zero_items() {
        let lines = [
            "---",
            "blockedBy:",
            "- uid: \"[[A]]\"",
            "  reltype: FINISHTOSTART",
            "status: open",
            "---",
        ];
        assert_eq!(list_block(&lines, 1, 5), 2..4);
    }

    #[test]
    fn flow_items_strip_quotes() {
        assert_eq!(
            flow_items("[task, 'project', \"x\"]"),
            Some(vec!["task".to_string(), "project".to_string(), "x".to_string()])
        );
        assert_eq!(flow_items("task"), None);
    }

    #[test]
    fn parse_header_reads_mapping() {
        let doc = "---\nstatus: open\ntags:\n  - task\n---\n# Body";
        let header = parse_header(doc).unwrap().unwrap();
        assert_eq!(
            get(&header, "status").and_then(scalar_string).as_deref(),
            Some("open")
        );
        assert_eq!(string_list(get(&header, "tags").unwrap()), vec!["task"]);
    }

    #[test]
    fn parse_header_without_header_is_none() {
        assert!(parse_header("just text").unwrap().is_none());
    }
}
