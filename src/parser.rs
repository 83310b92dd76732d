//! Turns raw observations into normalized task records.
//!
//! Parsing is permissive: a malformed line still yields a record (random ID,
//! empty priority, todo status) and every dependency notation is read and
//! unioned regardless of which one the vault is configured to write.

use std::path::Path;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::frontmatter;
use crate::patterns;
use crate::task::{
    push_unique, RawObservation, TaskKind, TaskRecord, TaskStatus, PRIORITY_GLYPHS,
};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
pub const ID_LEN: usize = 6;
pub const DEFAULT_TASK_TAG: &str = "task";

static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| patterns::compile(r"\[\[([^\]|#]+)(?:[|#][^\]]*)?\]\]"));

/// Six random lowercase base-36 characters.
pub fn generate_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Paths of every document in the vault, used to resolve `[[Name]]` links.
#[derive(Debug, Clone, Default)]
pub struct NoteIndex {
    paths: Vec<String>,
}

impl NoteIndex {
    pub fn new(mut paths: Vec<String>) -> Self {
        paths.sort();
        Self { paths }
    }

    /// Resolve a wiki-link target to a document path.
    ///
    /// Exact `Name.md` first, then the first document whose stem matches.
    pub fn resolve(&self, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let with_ext = if name.ends_with(".md") {
            name.to_string()
        } else {
            format!("{name}.md")
        };
        if let Some(path) = self.paths.iter().find(|path| **path == with_ext) {
            return Some(path.clone());
        }
        let wanted = file_stem(name);
        self.paths
            .iter()
            .find(|path| file_stem(path) == wanted)
            .cloned()
    }
}

/// File name without directories or the `.md` extension.
pub fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

#[derive(Debug, Clone)]
pub struct TaskParser {
    task_tag: String,
}

impl Default for TaskParser {
    fn default() -> Self {
        Self::new(DEFAULT_TASK_TAG)
    }
}

impl TaskParser {
    /// `task_tag` marks a note as a note task.
    pub fn new(task_tag: impl Into<String>) -> Self {
        let task_tag: String = task_tag.into();
        Self {
            task_tag: task_tag.trim_start_matches('#').to_string(),
        }
    }

    pub fn parse(&self, raw: &RawObservation, kind: TaskKind) -> TaskRecord {
        let text = raw.text.as_str();
        let id = patterns::find_id(text).unwrap_or_else(generate_id);
        let priority = patterns::find_priority(text).unwrap_or_default().to_string();
        let starred = patterns::has_star(text);

        let mut tags = Vec::new();
        for tag in patterns::tags(text) {
            push_unique(&mut tags, tag);
        }

        let mut incoming_links = Vec::new();
        for link in patterns::csv_links(text)
            .into_iter()
            .chain(patterns::individual_links(text))
            .chain(patterns::dataview_links(text))
        {
            push_unique(&mut incoming_links, link);
        }

        let status = match kind {
            TaskKind::Inline => TaskStatus::from_inline_code(&raw.status),
            TaskKind::Note => TaskStatus::from_note_value(&raw.status),
        };

        TaskRecord {
            id,
            kind,
            summary: Self::summary(text),
            text: text.lines().next().unwrap_or_default().trim().to_string(),
            tags,
            status,
            priority,
            link: raw.path.clone(),
            incoming_links,
            starred,
        }
    }

    /// Task text with every metadata token stripped.
    pub fn summary(text: &str) -> String {
        let mut summary = patterns::TAG_GLOBAL.replace_all(text, " ").into_owned();
        for pattern in [
            &*patterns::EMOJI_ID_REMOVAL,
            &*patterns::DATAVIEW_ID_REMOVAL,
            &*patterns::DEPENDS_REMOVAL,
            &*patterns::DATAVIEW_DEPENDS_REMOVAL,
            &*patterns::STAR,
            &*patterns::DATAVIEW_DATE,
            &*patterns::GLYPH_DATE,
            &*patterns::PICTOGRAPHIC,
        ] {
            summary = pattern.replace_all(&summary, " ").into_owned();
        }
        patterns::WHITESPACE
            .replace_all(&summary, " ")
            .trim()
            .to_string()
    }

    /// Parse a whole document as a note task.
    ///
    /// Returns `None` unless the header carries the task tag. An unreadable
    /// header is logged and skipped.
    pub fn parse_note(&self, path: &str, document: &str, index: &NoteIndex) -> Option<TaskRecord> {
        let header = match frontmatter::parse_header(document) {
            Ok(Some(header)) => header,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(path, error = %err, "skipping note with unreadable header");
                return None;
            }
        };

        let tags: Vec<String> = frontmatter::get(&header, "tags")
            .map(frontmatter::string_list)
            .unwrap_or_default()
            .into_iter()
            .map(|tag| tag.trim_start_matches('#').to_string())
            .collect();
        if !tags.iter().any(|tag| *tag == self.task_tag) {
            return None;
        }

        let status = frontmatter::get(&header, "status")
            .and_then(frontmatter::scalar_string)
            .unwrap_or_else(|| "open".to_string());
        let raw = RawObservation::new(status, file_stem(path), path);
        let mut record = self.parse(&raw, TaskKind::Note);

        record.id = path.to_string();
        record.tags = Vec::new();
        for tag in tags {
            push_unique(&mut record.tags, tag);
        }
        record.priority = frontmatter::get(&header, "priority")
            .and_then(frontmatter::scalar_string)
            .map(|value| normalize_note_priority(&value).to_string())
            .unwrap_or_default();
        if let Some(Value::Bool(starred)) = frontmatter::get(&header, "starred") {
            record.starred = *starred;
        }
        record.incoming_links = note_dependencies(&header, index);

        Some(record)
    }
}

/// Map note priority words onto the inline priority glyphs.
pub fn normalize_note_priority(priority: &str) -> &'static str {
    match priority.trim().to_ascii_lowercase().as_str() {
        "highest" => PRIORITY_GLYPHS[0],
        "high" => PRIORITY_GLYPHS[1],
        "low" => PRIORITY_GLYPHS[3],
        "lowest" => PRIORITY_GLYPHS[4],
        _ => "",
    }
}

/// Union of `blockedBy` (resolved to paths) and legacy `dependsOn` entries.
fn note_dependencies(header: &Mapping, index: &NoteIndex) -> Vec<String> {
    let mut links = Vec::new();

    if let Some(Value::Sequence(items)) = frontmatter::get(header, "blockedBy") {
        for item in items {
            let target = match item {
                Value::Mapping(entry) => entry.get("uid").and_then(frontmatter::scalar_string),
                other => frontmatter::scalar_string(other),
            };
            let Some(target) = target else { continue };
            let Some(caps) = WIKI_LINK.captures(&target) else {
                continue;
            };
            match index.resolve(&caps[1]) {
                Some(path) => push_unique(&mut links, path),
                None => tracing::debug!(name = &caps[1], "unresolved blockedBy entry"),
            }
        }
    }

    if let Some(value) = frontmatter::get(header, "dependsOn") {
        for dep in frontmatter::string_list(value) {
            push_unique(&mut links, dep);
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline(status: &str, text: &str) -> TaskRecord {
        TaskParser::default().parse(
            &RawObservation::new(status, text, "notes/today.md"),
            TaskKind::Inline,
        )
    }

    #[test]
    fn note_priority_words_map_to_inline_glyphs() {
        let mapped: Vec<&str> = ["Highest", "high", "normal", "low", "LOWEST", ""]
            .into_iter()
            .map(normalize_note_priority)
            .collect();
        assert_eq!(mapped, vec!["🔺", "⏫", "", "🔽", "⏬", ""]);
        for glyph in PRIORITY_GLYPHS {
            assert_eq!(patterns::find_priority(&format!("a {glyph} b")), Some(glyph));
        }
    }

    #[test]
    fn extracts_every_field() {
        let record = inline("/", "Write report #work ⏫ ⭐ 🆔 ab12cd ⛔ zzzzzz");
        assert_eq!(record.id, "ab12cd");
        assert_eq!(record.kind, TaskKind::Inline);
        assert_eq!(record.status, TaskStatus::InProgress);
        assert_eq!(record.priority, "⏫");
        assert!(record.starred);
        assert_eq!(record.tags, vec!["work"]);
        assert_eq!(record.incoming_links, vec!["zzzzzz"]);
        assert_eq!(record.summary, "Write report");
        assert_eq!(record.link, "notes/today.md");
    }

    #[test]
    fn missing_id_is_generated() {
        let record = inline(" ", "Plain task");
        assert_eq!(record.id.len(), ID_LEN);
        assert!(record
            .id
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn all_dependency_notations_are_unioned() {
        let record = inline(
            " ",
            "Mixed ⛔ aaaaaa,bbbbbb ⛔ cccccc [dependsOn:: bbbbbb, dddddd]",
        );
        assert_eq!(
            record.incoming_links,
            vec!["aaaaaa", "bbbbbb", "cccccc", "dddddd"]
        );
    }

    #[test]
    fn duplicate_tags_collapse() {
        let record = inline(" ", "Task #a #b #a");
        assert_eq!(record.tags, vec!["a", "b"]);
    }

    #[test]
    fn summary_strips_dates_and_brackets() {
        assert_eq!(
            TaskParser::summary("Ship it 📅 2024-03-01 ✅ 2024-03-02 [id:: ab12cd] [[start::2024-02-01]]"),
            "Ship it"
        );
    }

    #[test]
    fn metadata_only_line_is_empty() {
        let record = inline(" ", "🆔 ab12cd #tag ⛔ cccccc");
        assert!(record.is_empty());
    }

    #[test]
    fn text_keeps_first_line_only() {
        let record = inline(" ", "First line\nsecond line");
        assert_eq!(record.text, "First line");
    }

    #[test]
    fn note_header_overlays_record() {
        let index = NoteIndex::new(vec![
            "Tasks/Task1.md".to_string(),
            "Tasks/Task2.md".to_string(),
        ]);
        let doc = "---\nstatus: in-progress\npriority: High\nstarred: true\ntags:\n  - task\n  - '#work'\nblockedBy:\n  - uid: \"[[Task2]]\"\n    reltype: FINISHTOSTART\n  - uid: \"[[Missing]]\"\ndependsOn:\n  - Tasks/Legacy.md\n---\n# Body";
        let record = TaskParser::default()
            .parse_note("Tasks/Task1.md", doc, &index)
            .unwrap();
        assert_eq!(record.id, "Tasks/Task1.md");
        assert_eq!(record.kind, TaskKind::Note);
        assert_eq!(record.text, "Task1");
        assert_eq!(record.summary, "Task1");
        assert_eq!(record.status, TaskStatus::InProgress);
        assert_eq!(record.priority, "⏫");
        assert!(record.starred);
        assert_eq!(record.tags, vec!["task", "work"]);
        assert_eq!(
            record.incoming_links,
            vec!["Tasks/Task2.md", "Tasks/Legacy.md"]
        );
    }

    #[test]
    fn note_without_task_tag_is_skipped() {
        let doc = "---\ntags: [project]\n---\n";
        assert!(TaskParser::default()
            .parse_note("a.md", doc, &NoteIndex::default())
            .is_none());
    }

    #[test]
    fn unreadable_header_is_skipped() {
        let doc = "---\ntags: [task\n---\n";
        assert!(TaskParser::default()
            .parse_note("a.md", doc, &NoteIndex::default())
            .is_none());
    }

    #[test]
    fn index_resolves_by_stem() {
        let index = NoteIndex::new(vec!["deep/dir/Target.md".to_string()]);
        assert_eq!(index.resolve("Target").as_deref(), Some("deep/dir/Target.md"));
        assert_eq!(index.resolve("deep/dir/Target").as_deref(), Some("deep/dir/Target.md"));
        assert_eq!(index.resolve("Other"), None);
    }
}
