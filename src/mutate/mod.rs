//! Task mutation engine.
//!
//! One [`TaskMutator`] implementation per task kind. Every operation is a
//! single store transform over one document: split into lines, locate the
//! task, rewrite the minimum, rejoin. Lines that are not edited keep their
//! exact bytes, and every operation except `add_task_line` is idempotent.

pub mod inline;
pub mod note;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::codec::LinkStyle;
use crate::error::Result;
use crate::parser::DEFAULT_TASK_TAG;
use crate::patterns;
use crate::store::{DocumentStore, EditOutcome};
use crate::task::{TaskKind, TaskRecord, TaskStatus};

pub use inline::InlineMutator;
pub use note::NoteMutator;

/// Default file name prefix for notes created by `add_task_line`.
pub const DEFAULT_NOTE_PREFIX: &str = "Task";

#[async_trait]
pub trait TaskMutator: Send + Sync {
    /// The record this mutator edits.
    fn task(&self) -> &TaskRecord;

    async fn update_status(&self, status: TaskStatus) -> Result<EditOutcome>;

    async fn add_tag(&self, tag: &str) -> Result<EditOutcome>;

    async fn remove_tag(&self, tag: &str) -> Result<EditOutcome>;

    async fn add_star(&self) -> Result<EditOutcome>;

    async fn remove_star(&self) -> Result<EditOutcome>;

    /// Record that this task depends on `from`.
    async fn add_link_metadata(&self, from: &TaskRecord, style: LinkStyle)
        -> Result<EditOutcome>;

    /// Drop the dependency identified by an edge hash (or a bare source id).
    async fn remove_link_metadata(&self, hash: &str) -> Result<EditOutcome>;

    /// Add a related task next to this one.
    async fn add_task_line(&self, text: &str) -> Result<EditOutcome>;

    /// Remove the task from the vault.
    async fn delete(&self) -> Result<EditOutcome>;
}

/// A document split into lines, remembering how to put it back together.
///
/// Each line keeps its own terminator. Lines added by an edit take the
/// document's first terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub lines: Vec<String>,
    original: Vec<String>,
    endings: Vec<&'static str>,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut endings = Vec::new();
        for piece in text.split_inclusive('\n') {
            let (line, ending) = if let Some(line) = piece.strip_suffix("\r\n") {
                (line, "\r\n")
            } else if let Some(line) = piece.strip_suffix('\n') {
                (line, "\n")
            } else {
                (piece, "")
            };
            lines.push(line.to_string());
            endings.push(ending);
        }
        if lines.is_empty() {
            lines.push(String::new());
            endings.push("");
        }
        Self {
            original: lines.clone(),
            lines,
            endings,
        }
    }

    fn default_ending(&self) -> &'static str {
        self.endings
            .iter()
            .copied()
            .find(|ending| !ending.is_empty())
            .unwrap_or("\n")
    }

    /// Terminator for line `idx` of the edited document. Lines matching the
    /// unchanged head or tail keep theirs; edited lines in between keep the
    /// terminator of the line they replaced.
    fn ending_for(&self, idx: usize, head: usize, tail: usize) -> &'static str {
        let last = self.lines.len() - 1;
        if idx == last {
            return self.endings.last().copied().unwrap_or("");
        }
        let ending = if idx < head {
            self.endings[idx]
        } else if idx >= self.lines.len() - tail {
            self.endings[idx + self.original.len() - self.lines.len()]
        } else if idx < self.original.len() - tail {
            self.endings[idx]
        } else {
            ""
        };
        if ending.is_empty() {
            self.default_ending()
        } else {
            ending
        }
    }

    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let shared = self.lines.len().min(self.original.len());
        let head = self
            .lines
            .iter()
            .zip(&self.original)
            .take_while(|(line, original)| line == original)
            .count();
        let tail = self
            .lines
            .iter()
            .rev()
            .zip(self.original.iter().rev())
            .take(shared - head)
            .take_while(|(line, original)| line == original)
            .count();

        let mut text = String::new();
        for (idx, line) in self.lines.iter().enumerate() {
            text.push_str(line);
            text.push_str(self.ending_for(idx, head, tail));
        }
        text
    }
}

/// Finds an inline task's line inside its document.
#[derive(Debug, Clone, Copy)]
pub struct Locator<'a> {
    id: &'a str,
    text: &'a str,
}

impl<'a> Locator<'a> {
    pub fn new(id: &'a str, text: &'a str) -> Self {
        Self { id, text }
    }

    pub fn for_task(task: &'a TaskRecord) -> Self {
        Self::new(&task.id, &task.text)
    }

    /// Emoji ID, then bracketed ID, then raw text, then core text. Only the
    /// ID steps look beyond checklist lines.
    pub fn find<S: AsRef<str>>(&self, lines: &[S]) -> Option<usize> {
        let id = self.id.trim();
        if !id.is_empty() {
            let by_emoji = lines.iter().position(|line| {
                patterns::EMOJI_ID
                    .captures_iter(line.as_ref())
                    .any(|caps| &caps[1] == id)
            });
            if by_emoji.is_some() {
                return by_emoji;
            }
            let by_field = lines.iter().position(|line| {
                patterns::DATAVIEW_ID
                    .captures_iter(line.as_ref())
                    .any(|caps| &caps[1] == id)
            });
            if by_field.is_some() {
                return by_field;
            }
        }

        let text = self.text.trim();
        if text.is_empty() {
            return None;
        }
        let checklist = |line: &S| {
            patterns::CHECKLIST
                .captures(line.as_ref())
                .map(|caps| caps[3].trim().to_string())
        };
        if let Some(idx) = lines
            .iter()
            .position(|line| checklist(line).is_some_and(|body| body == text))
        {
            return Some(idx);
        }
        if let Some(idx) = lines
            .iter()
            .position(|line| checklist(line).is_some_and(|body| body.contains(text)))
        {
            return Some(idx);
        }

        let core = core_text(text);
        if core.is_empty() {
            return None;
        }
        lines.iter().position(|line| {
            let Some(body) = checklist(line) else {
                return false;
            };
            let line_core = core_text(&body);
            !line_core.is_empty() && (line_core.contains(&core) || core.contains(&line_core))
        })
    }
}

/// Text with IDs and tags removed, whitespace collapsed.
fn core_text(text: &str) -> String {
    let text = patterns::EMOJI_ID_REMOVAL.replace_all(text, " ");
    let text = patterns::DATAVIEW_ID_REMOVAL.replace_all(&text, " ");
    let text = patterns::TAG_GLOBAL.replace_all(&text, " ");
    patterns::WHITESPACE
        .replace_all(&text, " ")
        .trim()
        .to_string()
}

/// Run `edit` against a document, reporting `NotFound` when `edit` never
/// located its target.
pub(crate) async fn edit_document<F>(
    store: &dyn DocumentStore,
    path: &str,
    edit: F,
) -> Result<EditOutcome>
where
    F: FnOnce(&mut Document) -> Result<bool> + Send + 'static,
{
    let located = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&located);

    let outcome = store
        .transform(
            path,
            Box::new(move |text: String| {
                let mut document = Document::parse(&text);
                if !edit(&mut document)? {
                    return Ok(text);
                }
                flag.store(true, Ordering::SeqCst);
                let rendered = document.render();
                Ok(rendered)
            }),
        )
        .await?;

    if outcome == EditOutcome::Unchanged && !located.load(Ordering::SeqCst) {
        return Ok(EditOutcome::NotFound);
    }
    Ok(outcome)
}

/// Run `edit` against the task's own line.
pub(crate) async fn edit_task_line<F>(
    store: &dyn DocumentStore,
    task: &TaskRecord,
    edit: F,
) -> Result<EditOutcome>
where
    F: FnOnce(&mut Document, usize) -> Result<()> + Send + 'static,
{
    let id = task.id.clone();
    let text = task.text.clone();
    let outcome = edit_document(store, &task.link, move |document| {
        let Some(idx) = Locator::new(&id, &text).find(&document.lines) else {
            return Ok(false);
        };
        edit(document, idx)?;
        Ok(true)
    })
    .await?;

    if outcome == EditOutcome::NotFound {
        tracing::debug!(id = %task.id, path = %task.link, "task line not found");
    }
    Ok(outcome)
}

/// Picks the mutator for a record by its kind.
#[derive(Clone)]
pub struct TaskEditor {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    note_prefix: String,
    task_tag: String,
}

impl TaskEditor {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            note_prefix: DEFAULT_NOTE_PREFIX.to_string(),
            task_tag: DEFAULT_TASK_TAG.to_string(),
        }
    }

    /// File name prefix for notes created next to a note task.
    pub fn with_note_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.note_prefix = prefix.into();
        self
    }

    /// Tag written into the header of newly created notes.
    pub fn with_task_tag(mut self, task_tag: impl Into<String>) -> Self {
        self.task_tag = task_tag.into();
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn mutator(&self, task: &TaskRecord) -> Box<dyn TaskMutator> {
        match task.kind {
            TaskKind::Inline => Box::new(InlineMutator::new(
                task.clone(),
                Arc::clone(&self.store),
                Arc::clone(&self.clock),
            )),
            TaskKind::Note => Box::new(
                NoteMutator::new(
                    task.clone(),
                    Arc::clone(&self.store),
                    Arc::clone(&self.clock),
                )
                .with_prefix(self.note_prefix.clone())
                .with_task_tag(self.task_tag.clone()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_keeps_line_endings() {
        for text in ["a\nb\n", "a\r\nb\r\n", "a\nb", "", "single", "a\r\nb\nc\r\n"] {
            assert_eq!(Document::parse(text).render(), text);
        }
        let doc = Document::parse("a\r\nb");
        assert_eq!(doc.lines, vec!["a", "b"]);
    }

    #[test]
    fn mixed_line_endings_survive_edits() {
        let mut doc = Document::parse("a\r\nb\nc\r\nd\n");
        doc.lines[2] = "C".to_string();
        assert_eq!(doc.render(), "a\r\nb\nC\r\nd\n");

        let mut doc = Document::parse("a\nb\r\nc\n");
        doc.lines.insert(1, "new".to_string());
        assert_eq!(doc.render(), "a\nnew\nb\r\nc\n");

        let mut doc = Document::parse("a\r\nb\nc");
        doc.lines.remove(1);
        assert_eq!(doc.render(), "a\r\nc");

        let mut doc = Document::parse("a");
        doc.lines.push("b".to_string());
        assert_eq!(doc.render(), "a\nb");
    }

    #[test]
    fn locator_prefers_ids() {
        let lines = [
            "- [ ] Write report",
            "- [ ] Write report again 🆔 ab12cd",
            "- [ ] Other [id:: zz99zz]",
        ];
        assert_eq!(Locator::new("ab12cd", "Write report").find(&lines), Some(1));
        assert_eq!(Locator::new("zz99zz", "nothing").find(&lines), Some(2));
        assert_eq!(Locator::new("qqqqqq", "Write report").find(&lines), Some(0));
    }

    #[test]
    fn locator_falls_back_to_core_text() {
        let lines = ["intro Write report", "- [ ] Write report #work"];
        // Raw text has a tag the line no longer carries.
        assert_eq!(
            Locator::new("", "Write report #home").find(&lines),
            Some(1)
        );
        assert_eq!(Locator::new("", "Missing").find(&lines), None);
    }

    #[test]
    fn locator_text_steps_skip_prose() {
        let lines = ["# Groceries", "Buy Groceries today", "- [ ] Groceries"];
        assert_eq!(Locator::new("", "Groceries").find(&lines), Some(2));

        let lines = ["- [ ] Milk and eggs", "- [ ] Milk"];
        assert_eq!(Locator::new("", "Milk").find(&lines), Some(1));
    }
}
