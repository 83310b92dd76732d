//! Vault scanning: documents in, task records out.
//!
//! A document that cannot be read or parsed is logged and skipped; one bad
//! file never aborts the scan.

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::parser::{NoteIndex, TaskParser};
use crate::patterns;
use crate::store::DocumentStore;
use crate::task::{RawObservation, TaskKind, TaskRecord};

const FENCES: [&str; 2] = ["```", "~~~"];

/// Checklist lines of `text` as raw observations. Fenced code is skipped.
pub fn observations(path: &str, text: &str) -> Vec<RawObservation> {
    let mut fence: Option<&str> = None;
    let mut found = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if let Some(open) = fence {
            if trimmed.starts_with(open) {
                fence = None;
            }
            continue;
        }
        if let Some(open) = FENCES.iter().find(|f| trimmed.starts_with(**f)) {
            fence = Some(*open);
            continue;
        }
        if let Some(caps) = patterns::CHECKLIST.captures(line) {
            found.push(RawObservation::new(&caps[2], &caps[3], path));
        }
    }
    found
}

#[derive(Debug, Clone)]
pub struct Scanner {
    parser: TaskParser,
    exclude: Vec<glob::Pattern>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(TaskParser::default(), Vec::new())
    }
}

impl Scanner {
    pub fn new(parser: TaskParser, exclude: Vec<glob::Pattern>) -> Self {
        Self { parser, exclude }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            TaskParser::new(config.notes.task_tag.clone()),
            config.scan.patterns()?,
        ))
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.exclude.iter().any(|pattern| pattern.matches(path))
    }

    /// Tasks found in one document: the note task first (if any), then its
    /// non-empty inline tasks in line order.
    pub fn parse_document(&self, path: &str, text: &str, index: &NoteIndex) -> Vec<TaskRecord> {
        let mut tasks = Vec::new();
        if let Some(note) = self.parser.parse_note(path, text, index) {
            tasks.push(note);
        }
        tasks.extend(
            observations(path, text)
                .iter()
                .map(|raw| self.parser.parse(raw, TaskKind::Inline))
                .filter(|task| !task.is_empty()),
        );
        tasks
    }

    /// Every task in the vault, in path order.
    pub async fn scan(&self, store: &dyn DocumentStore) -> Result<Vec<TaskRecord>> {
        let paths: Vec<String> = store
            .list()
            .await?
            .into_iter()
            .filter(|path| !self.is_excluded(path))
            .collect();
        let index = NoteIndex::new(paths.clone());

        let mut tasks = Vec::new();
        for path in &paths {
            let text = match store.read(path).await {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(err) => {
                    warn!(path = %path, error = %err, "skipping unreadable document");
                    continue;
                }
            };
            tasks.extend(self.parse_document(path, &text, &index));
        }
        debug!(documents = paths.len(), tasks = tasks.len(), "scanned vault");
        Ok(tasks)
    }
}

/// Resolve a user-supplied selector: exact id, then note path, then a
/// unique case-insensitive summary substring.
pub fn select<'a>(tasks: &'a [TaskRecord], selector: &str) -> Result<&'a TaskRecord> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(Error::InvalidArgument("task selector cannot be empty".to_string()));
    }
    if let Some(task) = tasks.iter().find(|task| task.id == selector) {
        return Ok(task);
    }
    let path = selector.trim_start_matches("./").replace('\\', "/");
    if let Some(task) = tasks
        .iter()
        .find(|task| task.kind == TaskKind::Note && task.link == path)
    {
        return Ok(task);
    }

    let needle = selector.to_lowercase();
    let matches: Vec<&TaskRecord> = tasks
        .iter()
        .filter(|task| task.summary.to_lowercase().contains(&needle))
        .collect();
    match matches.as_slice() {
        [] => Err(Error::TaskNotFound(selector.to_string())),
        [task] => Ok(task),
        many => Err(Error::AmbiguousTask {
            selector: selector.to_string(),
            candidates: many
                .iter()
                .map(|task| format!("{} ({})", task.id, task.summary))
                .collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use crate::task::TaskStatus;

    #[test]
    fn observations_skip_fenced_code() {
        let text = "- [ ] one\n```\n- [ ] not a task\n```\n* [x] two\n1. [/] three\nplain";
        let found = observations("a.md", text);
        let texts: Vec<&str> = found.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(found[1].status, "x");
    }

    #[tokio::test]
    async fn scan_finds_inline_and_note_tasks() {
        let store = MemoryDocumentStore::with_documents([
            ("daily.md", "- [ ] Write report #work 🆔 ab12cd\n- [ ] #only-a-tag\n- [x] Ship ⛔ ab12cd\n"),
            ("Tasks/Plan.md", "---\nstatus: in-progress\ntags: [task]\nblockedBy:\n  - uid: \"[[Spec]]\"\n---\n# Plan\n"),
            ("Tasks/Spec.md", "---\ntags:\n  - task\n---\n"),
            ("notes.md", "---\ntags: [idea]\n---\nNothing here"),
            (".obsidian/x.md", "- [ ] hidden\n"),
        ]);
        let scanner = Scanner::from_config(&Config::default()).unwrap();
        let tasks = scanner.scan(&store).await.unwrap();

        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[0], "Tasks/Plan.md");
        assert_eq!(ids[1], "Tasks/Spec.md");
        assert_eq!(ids[2], "ab12cd");

        let plan = &tasks[0];
        assert_eq!(plan.kind, TaskKind::Note);
        assert_eq!(plan.status, TaskStatus::InProgress);
        assert_eq!(plan.incoming_links, vec!["Tasks/Spec.md".to_string()]);

        let ship = &tasks[3];
        assert_eq!(ship.status, TaskStatus::Done);
        assert_eq!(ship.incoming_links, vec!["ab12cd".to_string()]);
    }

    #[tokio::test]
    async fn unreadable_header_is_skipped() {
        let store = MemoryDocumentStore::with_documents([
            ("bad.md", "---\ntags: [task\n---\n- [ ] still inline\n"),
        ]);
        let tasks = Scanner::default().scan(&store).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind, TaskKind::Inline);
    }

    #[test]
    fn select_prefers_id_then_path_then_summary() {
        let scanner = Scanner::default();
        let index = NoteIndex::default();
        let mut tasks = scanner.parse_document(
            "a.md",
            "- [ ] Write report 🆔 ab12cd\n- [ ] Write summary\n",
            &index,
        );
        tasks.extend(scanner.parse_document("N.md", "---\ntags: [task]\n---\n", &index));

        assert_eq!(select(&tasks, "ab12cd").unwrap().summary, "Write report");
        assert_eq!(select(&tasks, "./N.md").unwrap().kind, TaskKind::Note);
        assert_eq!(select(&tasks, "SUMMARY").unwrap().summary, "Write summary");
        assert!(matches!(
            select(&tasks, "write"),
            Err(Error::AmbiguousTask { .. })
        ));
        assert!(matches!(select(&tasks, "nope"), Err(Error::TaskNotFound(_))));
    }
}
