//! Mutations of note tasks: metadata lives in the document's header block.
//!
//! Header edits locate fields line by line and patch them in place. Header
//! boundaries are recomputed for every edit, and nothing after the closing
//! delimiter is ever touched.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::codec::{self, BlockedByEntry, BlockedBySpan, LinkStyle};
use crate::error::Result;
use crate::frontmatter::{self, HeaderBounds};
use crate::parser::DEFAULT_TASK_TAG;
use crate::store::{DocumentStore, EditOutcome};
use crate::task::{TaskRecord, TaskStatus};

use super::{edit_document, TaskMutator, DEFAULT_NOTE_PREFIX};

const TAGS: &str = "tags";
const STATUS: &str = "status";
const STARRED: &str = "starred";
const BLOCKED_BY: &str = "blockedBy";
const DEPENDS_ON: &str = "dependsOn";

/// Attempts at finding a free file name for a new note.
const CREATE_ATTEMPTS: i64 = 16;

fn tag_key(value: &str) -> &str {
    frontmatter::unquote(value).trim_start_matches('#')
}

/// Items of an inline (flow or scalar) header value.
fn inline_items(value: &str) -> Vec<String> {
    frontmatter::flow_items(value).unwrap_or_else(|| {
        let value = frontmatter::unquote(value);
        if value.is_empty() {
            Vec::new()
        } else {
            vec![value.to_string()]
        }
    })
}

fn needs_quotes(item: &str) -> bool {
    item.starts_with(['#', '&', '*', '!', '|', '>', '%', '@', '`', '"', '\''])
        || item.contains([',', '[', ']', '{', '}'])
        || item.contains(": ")
}

fn render_flow(key: &str, items: &[String]) -> String {
    let items: Vec<String> = items
        .iter()
        .map(|item| {
            if needs_quotes(item) {
                format!("\"{}\"", item.replace('"', "\\\""))
            } else {
                item.clone()
            }
        })
        .collect();
    format!("{key}: [{}]", items.join(", "))
}

pub fn set_status(lines: &mut Vec<String>, bounds: HeaderBounds, status: TaskStatus) {
    let line = format!("{STATUS}: {}", status.note_value());
    match frontmatter::find_field(lines, bounds, STATUS) {
        Some(idx) => lines[idx] = line,
        None => lines.insert(bounds.end, line),
    }
}

pub fn add_tag(lines: &mut Vec<String>, bounds: HeaderBounds, tag: &str) {
    let tag = tag.trim().trim_start_matches('#');
    if tag.is_empty() {
        return;
    }
    let Some(idx) = frontmatter::find_field(lines, bounds, TAGS) else {
        lines.insert(bounds.end, format!("{TAGS}:"));
        lines.insert(bounds.end + 1, format!("  - {tag}"));
        return;
    };

    let value = frontmatter::key_value(&lines[idx], TAGS)
        .unwrap_or_default()
        .to_string();
    if value.is_empty() {
        let block = frontmatter::list_block(lines, idx, bounds.end);
        let present = lines[block.clone()]
            .iter()
            .filter_map(|line| frontmatter::list_item(line))
            .any(|item| tag_key(item) == tag);
        if !present {
            lines.insert(block.end, format!("  - {tag}"));
        }
        return;
    }

    let mut items = inline_items(&value);
    if items.iter().any(|item| tag_key(item) == tag) {
        return;
    }
    items.push(tag.to_string());
    lines[idx] = render_flow(TAGS, &items);
}

pub fn remove_tag(lines: &mut Vec<String>, bounds: HeaderBounds, tag: &str) {
    let tag = tag.trim().trim_start_matches('#');
    let Some(idx) = frontmatter::find_field(lines, bounds, TAGS) else {
        return;
    };

    let value = frontmatter::key_value(&lines[idx], TAGS)
        .unwrap_or_default()
        .to_string();
    if value.is_empty() {
        let block = frontmatter::list_block(lines, idx, bounds.end);
        let doomed: Vec<usize> = block
            .filter(|&i| {
                frontmatter::list_item(&lines[i])
                    .map(|item| tag_key(item) == tag)
                    .unwrap_or(false)
            })
            .collect();
        for i in doomed.into_iter().rev() {
            lines.remove(i);
        }
        return;
    }

    let items = inline_items(&value);
    let kept: Vec<String> = items
        .iter()
        .filter(|item| tag_key(item) != tag)
        .cloned()
        .collect();
    if kept.len() != items.len() {
        lines[idx] = render_flow(TAGS, &kept);
    }
}

pub fn set_starred(lines: &mut Vec<String>, bounds: HeaderBounds, starred: bool) {
    let line = format!("{STARRED}: {starred}");
    match frontmatter::find_field(lines, bounds, STARRED) {
        Some(idx) => {
            let current = frontmatter::key_value(&lines[idx], STARRED).unwrap_or_default();
            if current != starred.to_string() {
                lines[idx] = line;
            }
        }
        // Unstarring a note that never had the field is a no-op.
        None if starred => lines.insert(bounds.end, line),
        None => {}
    }
}

/// The `blockedBy` key line, any flow items on it, and the entries below.
struct BlockedBySection {
    key: usize,
    has_value: bool,
    flow: Vec<String>,
    spans: Vec<BlockedBySpan>,
}

fn blocked_by_section(lines: &[String], bounds: HeaderBounds) -> Option<BlockedBySection> {
    let key = frontmatter::find_field(lines, bounds, BLOCKED_BY)?;
    let value = frontmatter::key_value(&lines[key], BLOCKED_BY).unwrap_or_default();
    let block = frontmatter::list_block(lines, key, bounds.end);
    Some(BlockedBySection {
        key,
        has_value: !value.is_empty(),
        flow: inline_items(value),
        spans: codec::blocked_by_spans(lines, block),
    })
}

/// Add a `blockedBy` entry for the note called `name`.
///
/// The new entry goes after the last existing one; other lines of the list
/// are left as they are.
pub fn add_dependency(lines: &mut Vec<String>, bounds: HeaderBounds, name: &str) {
    let Some(section) = blocked_by_section(lines, bounds) else {
        let [uid, reltype] = BlockedByEntry::new(name).render_at(codec::ENTRY_INDENT);
        let tail = lines.split_off(bounds.end);
        lines.extend([format!("{BLOCKED_BY}:"), uid, reltype]);
        lines.extend(tail);
        return;
    };
    let present = section
        .flow
        .iter()
        .any(|uid| BlockedByEntry::with_uid(uid.as_str()).refers_to(name))
        || section.spans.iter().any(|span| span.entry.refers_to(name));
    if present {
        return;
    }

    let indent = section
        .spans
        .last()
        .map_or(codec::ENTRY_INDENT, |span| span.indent);
    let mut added = Vec::new();
    if section.has_value {
        // A flow value (`blockedBy: [...]`) becomes a block list.
        lines[section.key] = format!("{BLOCKED_BY}:");
        for uid in &section.flow {
            added.extend(BlockedByEntry::with_uid(uid.as_str()).render_at(indent));
        }
    }
    added.extend(BlockedByEntry::new(name).render_at(indent));

    let at = section
        .spans
        .last()
        .map_or(section.key + 1, |span| span.lines.end);
    let tail = lines.split_off(at);
    lines.extend(added);
    lines.extend(tail);
}

/// Drop every reference to the note at `from_path`; the field itself stays.
pub fn remove_dependency(lines: &mut Vec<String>, bounds: HeaderBounds, from_path: &str) {
    let name = codec::note_name_of_path(from_path);
    let is_target = |entry: &BlockedByEntry| entry.refers_to(&name) || entry.refers_to(from_path);

    if let Some(section) = blocked_by_section(lines, bounds) {
        for span in section.spans.iter().rev() {
            if is_target(&span.entry) {
                lines.drain(span.lines.clone());
            }
        }
        let kept: Vec<String> = section
            .flow
            .iter()
            .filter(|uid| !is_target(&BlockedByEntry::with_uid(uid.as_str())))
            .cloned()
            .collect();
        if kept.len() != section.flow.len() {
            lines[section.key] = if kept.is_empty() {
                format!("{BLOCKED_BY}:")
            } else {
                render_flow(BLOCKED_BY, &kept)
            };
        }
    }

    // Header boundaries shift when the section above shrinks.
    let Some(bounds) = frontmatter::find_header(lines) else {
        return;
    };
    if let Some(idx) = frontmatter::find_field(lines, bounds, DEPENDS_ON) {
        let block = frontmatter::list_block(lines, idx, bounds.end);
        let doomed: Vec<usize> = block
            .filter(|&i| {
                frontmatter::list_item(&lines[i])
                    .map(|item| frontmatter::unquote(item) == from_path)
                    .unwrap_or(false)
            })
            .collect();
        for i in doomed.into_iter().rev() {
            lines.remove(i);
        }
    }
}

/// Text of a freshly created note task.
pub fn new_note_text(text: &str, task_tag: &str) -> String {
    format!("---\n{STATUS}: open\n{TAGS}: [{task_tag}]\n---\n# {}\n", text.trim())
}

/// Mutator for a note whose header holds the task metadata.
pub struct NoteMutator {
    task: TaskRecord,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    prefix: String,
    task_tag: String,
}

impl NoteMutator {
    pub fn new(task: TaskRecord, store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            task,
            store,
            clock,
            prefix: DEFAULT_NOTE_PREFIX.to_string(),
            task_tag: DEFAULT_TASK_TAG.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_task_tag(mut self, task_tag: impl Into<String>) -> Self {
        self.task_tag = task_tag.into();
        self
    }

    async fn edit_header<F>(&self, edit: F) -> Result<EditOutcome>
    where
        F: FnOnce(&mut Vec<String>, HeaderBounds) + Send + 'static,
    {
        let outcome = edit_document(self.store.as_ref(), &self.task.link, move |document| {
            let Some(bounds) = frontmatter::find_header(&document.lines) else {
                return Ok(false);
            };
            edit(&mut document.lines, bounds);
            Ok(true)
        })
        .await?;
        if outcome == EditOutcome::NotFound {
            tracing::debug!(path = %self.task.link, "note or header not found");
        }
        Ok(outcome)
    }

    /// Create a sibling note for `text`; returns its path.
    pub async fn create_sibling(&self, text: &str) -> Result<String> {
        let parent = Path::new(&self.task.link)
            .parent()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        let millis = self.clock.now_millis();
        let body = new_note_text(text, &self.task_tag);

        let mut path = String::new();
        for attempt in 0..CREATE_ATTEMPTS {
            let name = format!("{}-{}.md", self.prefix, millis + attempt);
            path = if parent.is_empty() {
                name
            } else {
                format!("{parent}/{name}")
            };
            if self.store.read(&path).await?.is_none() {
                break;
            }
        }
        self.store.create(&path, &body).await?;
        tracing::debug!(path = %path, "created note task");
        Ok(path)
    }
}

#[async_trait]
impl TaskMutator for NoteMutator {
    fn task(&self) -> &TaskRecord {
        &self.task
    }

    async fn update_status(&self, status: TaskStatus) -> Result<EditOutcome> {
        self.edit_header(move |lines, bounds| set_status(lines, bounds, status))
            .await
    }

    async fn add_tag(&self, tag: &str) -> Result<EditOutcome> {
        let tag = tag.to_string();
        self.edit_header(move |lines, bounds| add_tag(lines, bounds, &tag))
            .await
    }

    async fn remove_tag(&self, tag: &str) -> Result<EditOutcome> {
        let tag = tag.to_string();
        self.edit_header(move |lines, bounds| remove_tag(lines, bounds, &tag))
            .await
    }

    async fn add_star(&self) -> Result<EditOutcome> {
        self.edit_header(|lines, bounds| set_starred(lines, bounds, true))
            .await
    }

    async fn remove_star(&self) -> Result<EditOutcome> {
        self.edit_header(|lines, bounds| set_starred(lines, bounds, false))
            .await
    }

    async fn add_link_metadata(
        &self,
        from: &TaskRecord,
        _style: LinkStyle,
    ) -> Result<EditOutcome> {
        let name = codec::note_dependency_name(from);
        self.edit_header(move |lines, bounds| add_dependency(lines, bounds, &name))
            .await
    }

    async fn remove_link_metadata(&self, hash: &str) -> Result<EditOutcome> {
        let from = codec::source_of_hash(hash, &self.task.id).to_string();
        self.edit_header(move |lines, bounds| remove_dependency(lines, bounds, &from))
            .await
    }

    async fn add_task_line(&self, text: &str) -> Result<EditOutcome> {
        self.create_sibling(text).await?;
        Ok(EditOutcome::Applied)
    }

    async fn delete(&self) -> Result<EditOutcome> {
        Ok(if self.store.delete(&self.task.link).await? {
            EditOutcome::Applied
        } else {
            EditOutcome::NotFound
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::parser::{NoteIndex, TaskParser};
    use crate::store::MemoryDocumentStore;
    use chrono::NaiveDate;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn apply(text: &str, edit: impl FnOnce(&mut Vec<String>, HeaderBounds)) -> String {
        let mut lines = lines(text);
        let bounds = frontmatter::find_header(&lines).unwrap();
        edit(&mut lines, bounds);
        lines.join("\n")
    }

    fn note(path: &str) -> TaskRecord {
        let mut record = TaskParser::default()
            .parse_note(path, "---\ntags: [task]\n---\n", &NoteIndex::default())
            .unwrap();
        record.link = path.to_string();
        record
    }

    #[test]
    fn status_is_replaced_in_place() {
        assert_eq!(
            apply("---\nstatus: open\n---", |l, b| set_status(l, b, TaskStatus::Done)),
            "---\nstatus: done\n---"
        );
        assert_eq!(
            apply("---\ntitle: x\n---\nbody", |l, b| set_status(l, b, TaskStatus::InProgress)),
            "---\ntitle: x\nstatus: in-progress\n---\nbody"
        );
    }

    #[test]
    fn tags_block_list() {
        let text = "---\ntags:\n  - task\nstatus: open\n---\n- body #x";
        let added = apply(text, |l, b| add_tag(l, b, "#work"));
        assert_eq!(added, "---\ntags:\n  - task\n  - work\nstatus: open\n---\n- body #x");
        assert_eq!(apply(&added, |l, b| add_tag(l, b, "work")), added);
        assert_eq!(apply(&added, |l, b| remove_tag(l, b, "work")), text);
    }

    #[test]
    fn tags_created_when_absent() {
        assert_eq!(
            apply("---\nstatus: open\n---", |l, b| add_tag(l, b, "task")),
            "---\nstatus: open\ntags:\n  - task\n---"
        );
    }

    #[test]
    fn flow_tags_stay_flow() {
        let text = "---\ntags: [task, \"#home\"]\n---";
        assert_eq!(
            apply(text, |l, b| add_tag(l, b, "work")),
            "---\ntags: [task, \"#home\", work]\n---"
        );
        assert_eq!(apply(text, |l, b| add_tag(l, b, "home")), text);
        assert_eq!(
            apply(text, |l, b| remove_tag(l, b, "home")),
            "---\ntags: [task]\n---"
        );
        assert_eq!(
            apply("---\ntags: task\n---", |l, b| add_tag(l, b, "work")),
            "---\ntags: [task, work]\n---"
        );
    }

    #[test]
    fn star_flips_scalar() {
        let starred = apply("---\nstatus: open\n---", |l, b| set_starred(l, b, true));
        assert_eq!(starred, "---\nstatus: open\nstarred: true\n---");
        assert_eq!(apply(&starred, |l, b| set_starred(l, b, true)), starred);
        assert_eq!(
            apply(&starred, |l, b| set_starred(l, b, false)),
            "---\nstatus: open\nstarred: false\n---"
        );
        assert_eq!(
            apply("---\nstatus: open\n---", |l, b| set_starred(l, b, false)),
            "---\nstatus: open\n---"
        );
    }

    #[test]
    fn dependency_entries_are_canonical() {
        let text = "---\nstatus: open\n---\nbody";
        let once = apply(text, |l, b| add_dependency(l, b, "Task2"));
        assert_eq!(
            once,
            "---\nstatus: open\nblockedBy:\n  - uid: \"[[Task2]]\"\n    reltype: FINISHTOSTART\n---\nbody"
        );
        assert_eq!(apply(&once, |l, b| add_dependency(l, b, "Task2")), once);

        let twice = apply(&once, |l, b| add_dependency(l, b, "Task3"));
        assert!(twice.contains("  - uid: \"[[Task3]]\"\n    reltype: FINISHTOSTART\n---"));

        let removed = apply(&twice, |l, b| remove_dependency(l, b, "Tasks/Task2.md"));
        assert_eq!(
            removed,
            "---\nstatus: open\nblockedBy:\n  - uid: \"[[Task3]]\"\n    reltype: FINISHTOSTART\n---\nbody"
        );
        let emptied = apply(&removed, |l, b| remove_dependency(l, b, "Task3"));
        assert_eq!(emptied, "---\nstatus: open\nblockedBy:\n---\nbody");
    }

    #[test]
    fn new_entries_follow_list_indent() {
        let text = "---\nblockedBy:\n- uid: \"[[A]]\"\n  reltype: FINISHTOSTART\n---";
        assert_eq!(
            apply(text, |l, b| add_dependency(l, b, "B")),
            "---\nblockedBy:\n- uid: \"[[A]]\"\n  reltype: FINISHTOSTART\n- uid: \"[[B]]\"\n  reltype: FINISHTOSTART\n---"
        );
    }

    #[test]
    fn untouched_entries_keep_extra_keys_and_comments() {
        let text = "---\nblockedBy:\n  - uid: \"[[A]]\"\n    reltype: FINISHTOSTART\n    lag: 2d\n  # keep me\nstatus: open\n---";
        let added = apply(text, |l, b| add_dependency(l, b, "B"));
        assert_eq!(
            added,
            "---\nblockedBy:\n  - uid: \"[[A]]\"\n    reltype: FINISHTOSTART\n    lag: 2d\n  - uid: \"[[B]]\"\n    reltype: FINISHTOSTART\n  # keep me\nstatus: open\n---"
        );
        assert_eq!(apply(&added, |l, b| remove_dependency(l, b, "Tasks/B.md")), text);
        assert_eq!(
            apply(text, |l, b| remove_dependency(l, b, "A")),
            "---\nblockedBy:\n  # keep me\nstatus: open\n---"
        );
    }

    #[test]
    fn flow_dependencies_are_tolerated() {
        let text = "---\nblockedBy: [\"[[A]]\"]\n---";
        assert_eq!(
            apply(text, |l, b| add_dependency(l, b, "B")),
            "---\nblockedBy:\n  - uid: \"[[A]]\"\n    reltype: FINISHTOSTART\n  - uid: \"[[B]]\"\n    reltype: FINISHTOSTART\n---"
        );
        assert_eq!(apply(text, |l, b| add_dependency(l, b, "A")), text);
        assert_eq!(
            apply(text, |l, b| remove_dependency(l, b, "A")),
            "---\nblockedBy:\n---"
        );
    }

    #[test]
    fn legacy_depends_on_is_cleaned() {
        let text = "---\ndependsOn:\n  - Tasks/A.md\n  - Tasks/B.md\n---";
        assert_eq!(
            apply(text, |l, b| remove_dependency(l, b, "Tasks/A.md")),
            "---\ndependsOn:\n  - Tasks/B.md\n---"
        );
    }

    #[tokio::test]
    async fn header_edits_leave_body_alone() {
        let doc = "---\r\nstatus: open\r\ntags: [task]\r\n---\r\n# Title\r\nstatus: body\r\n";
        let store = Arc::new(MemoryDocumentStore::with_documents([("Tasks/A.md", doc)]));
        let clock = Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        let mutator = NoteMutator::new(note("Tasks/A.md"), store.clone(), clock);

        assert_eq!(
            mutator.update_status(TaskStatus::Done).await.unwrap(),
            EditOutcome::Applied
        );
        assert_eq!(
            store.read("Tasks/A.md").await.unwrap().unwrap(),
            "---\r\nstatus: done\r\ntags: [task]\r\n---\r\n# Title\r\nstatus: body\r\n"
        );
    }

    #[tokio::test]
    async fn missing_header_is_not_found() {
        let store = Arc::new(MemoryDocumentStore::with_documents([("a.md", "# plain\n")]));
        let clock = Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        let mutator = NoteMutator::new(note("a.md"), store.clone(), clock);
        assert_eq!(mutator.add_star().await.unwrap(), EditOutcome::NotFound);
    }

    #[tokio::test]
    async fn add_task_line_creates_sibling() {
        let store = Arc::new(MemoryDocumentStore::with_documents([(
            "Tasks/A.md",
            "---\ntags: [task]\n---\n",
        )]));
        let clock = Arc::new(FixedClock::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            1_000,
        ));
        let mutator = NoteMutator::new(note("Tasks/A.md"), store.clone(), clock);

        let first = mutator.create_sibling("Follow up").await.unwrap();
        assert_eq!(first, "Tasks/Task-1000.md");
        assert_eq!(
            store.read(&first).await.unwrap().unwrap(),
            "---\nstatus: open\ntags: [task]\n---\n# Follow up\n"
        );
        let second = mutator.create_sibling("Again").await.unwrap();
        assert_eq!(second, "Tasks/Task-1001.md");

        assert_eq!(mutator.delete().await.unwrap(), EditOutcome::Applied);
        assert_eq!(mutator.delete().await.unwrap(), EditOutcome::NotFound);
    }
}
