//! Mutations of inline tasks: one checklist line carrying its metadata.
//!
//! The `*_line` functions are pure line rewrites; [`InlineMutator`] wraps
//! each in one store transform over the owning document. A line's leading
//! indentation is never touched.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::clock::Clock;
use crate::codec::{self, LinkStyle};
use crate::dates::{self, DateField};
use crate::error::{Error, Result};
use crate::patterns::{self, STAR_GLYPH};
use crate::store::{DocumentStore, EditOutcome};
use crate::task::{TaskRecord, TaskStatus};

use super::{edit_task_line, Document, TaskMutator};

fn normalize_tag(tag: &str) -> &str {
    tag.trim().trim_start_matches('#')
}

/// Swap the checklist bracket and adjust date stamps for the new status.
pub fn set_status_line(line: &str, status: TaskStatus, today: &str) -> Result<String> {
    let line = patterns::STATUS_BOX
        .replace(line, status.checkbox())
        .into_owned();

    match status {
        TaskStatus::Done => dates::add_date(&line, DateField::Done, today),
        TaskStatus::InProgress => {
            let line = dates::remove_date(&line, DateField::Done);
            dates::add_date(&line, DateField::Start, today)
        }
        TaskStatus::Todo => {
            let line = dates::remove_date(&line, DateField::Canceled);
            let line = dates::remove_date(&line, DateField::Done);
            Ok(dates::remove_date(&line, DateField::Start))
        }
        TaskStatus::Canceled => Ok(line),
    }
}

/// `#tag` or `#tag/child` present on the line.
pub fn has_tag(line: &str, tag: &str) -> bool {
    let tag = normalize_tag(tag);
    let nested = format!("{tag}/");
    patterns::tags(line)
        .iter()
        .any(|existing| existing == tag || existing.starts_with(&nested))
}

pub fn add_tag_line(line: &str, tag: &str) -> String {
    let tag = normalize_tag(tag);
    if tag.is_empty() || has_tag(line, tag) {
        return line.to_string();
    }
    format!("{} #{tag}", line.trim_end())
}

pub fn remove_tag_line(line: &str, tag: &str) -> Result<String> {
    let tag = normalize_tag(tag);
    if tag.is_empty() || !has_tag(line, tag) {
        return Ok(line.to_string());
    }
    let pattern = Regex::new(&format!(r"\s*#{}(?:/\S*)?(?:\s|$)", regex::escape(tag)))
        .map_err(|err| Error::InvalidArgument(format!("invalid tag '{tag}': {err}")))?;
    Ok(dates::cut(line, &pattern))
}

pub fn add_star_line(line: &str) -> String {
    if patterns::has_star(line) {
        return line.to_string();
    }
    match patterns::METADATA_GLYPH.find(line) {
        Some(m) => {
            let (before, after) = line.split_at(m.start());
            if before.ends_with(' ') {
                format!("{before}{STAR_GLYPH} {after}")
            } else {
                format!("{before} {STAR_GLYPH} {after}")
            }
        }
        None => format!("{} {STAR_GLYPH}", line.trim_end()),
    }
}

pub fn remove_star_line(line: &str) -> String {
    if !patterns::has_star(line) {
        return line.to_string();
    }
    dates::cut(line, &patterns::STAR_WITH_SPACE)
}

/// Mutator for a checklist line.
pub struct InlineMutator {
    task: TaskRecord,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl InlineMutator {
    pub fn new(task: TaskRecord, store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { task, store, clock }
    }

    async fn edit_line<F>(&self, edit: F) -> Result<EditOutcome>
    where
        F: FnOnce(&str) -> Result<String> + Send + 'static,
    {
        edit_task_line(self.store.as_ref(), &self.task, move |document: &mut Document, idx| {
            let line = edit(&document.lines[idx])?;
            document.lines[idx] = line;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl TaskMutator for InlineMutator {
    fn task(&self) -> &TaskRecord {
        &self.task
    }

    async fn update_status(&self, status: TaskStatus) -> Result<EditOutcome> {
        let today = self.clock.today_string();
        self.edit_line(move |line| set_status_line(line, status, &today))
            .await
    }

    async fn add_tag(&self, tag: &str) -> Result<EditOutcome> {
        let tag = tag.to_string();
        self.edit_line(move |line| Ok(add_tag_line(line, &tag))).await
    }

    async fn remove_tag(&self, tag: &str) -> Result<EditOutcome> {
        let tag = tag.to_string();
        self.edit_line(move |line| remove_tag_line(line, &tag)).await
    }

    async fn add_star(&self) -> Result<EditOutcome> {
        self.edit_line(|line| Ok(add_star_line(line))).await
    }

    async fn remove_star(&self) -> Result<EditOutcome> {
        self.edit_line(|line| Ok(remove_star_line(line))).await
    }

    async fn add_link_metadata(
        &self,
        from: &TaskRecord,
        style: LinkStyle,
    ) -> Result<EditOutcome> {
        let from_id = from.id.clone();
        let source = edit_task_line(self.store.as_ref(), from, move |document, idx| {
            document.lines[idx] = codec::add_id(&document.lines[idx], &from_id, style);
            Ok(())
        })
        .await?;
        if source == EditOutcome::NotFound {
            tracing::warn!(from = %from.id, path = %from.link, "source task line not found; writing dependency only");
        }

        let from_id = from.id.clone();
        let target = self
            .edit_line(move |line| Ok(codec::add_dependency(line, &from_id, style)))
            .await?;
        if target == EditOutcome::NotFound && source.is_applied() {
            tracing::warn!(
                from = %from.id,
                to = %self.task.id,
                "half-written edge: source tagged but dependent task not found"
            );
        }

        Ok(if source.is_applied() && target != EditOutcome::NotFound {
            EditOutcome::Applied
        } else {
            target
        })
    }

    async fn remove_link_metadata(&self, hash: &str) -> Result<EditOutcome> {
        let from_id = codec::source_of_hash(hash, &self.task.id).to_string();
        self.edit_line(move |line| Ok(codec::remove_dependency(line, &from_id)))
            .await
    }

    async fn add_task_line(&self, text: &str) -> Result<EditOutcome> {
        let new_lines: Vec<String> = text.lines().map(str::to_string).collect();
        if new_lines.is_empty() {
            return Err(Error::EmptyTaskLine);
        }
        edit_task_line(self.store.as_ref(), &self.task, move |document, idx| {
            let tail = document.lines.split_off(idx + 1);
            document.lines.extend(new_lines);
            document.lines.extend(tail);
            Ok(())
        })
        .await
    }

    async fn delete(&self) -> Result<EditOutcome> {
        edit_task_line(self.store.as_ref(), &self.task, |document, idx| {
            document.lines.remove(idx);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::parser::TaskParser;
    use crate::store::MemoryDocumentStore;
    use crate::task::{RawObservation, TaskKind};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()))
    }

    fn record(path: &str, line: &str) -> TaskRecord {
        let caps = patterns::CHECKLIST.captures(line).unwrap();
        TaskParser::default().parse(
            &RawObservation::new(&caps[2], &caps[3], path),
            TaskKind::Inline,
        )
    }

    #[test]
    fn done_stamps_completion_date() {
        assert_eq!(
            set_status_line("- [ ] Write report #work 🆔 ab12cd", TaskStatus::Done, "2024-01-01")
                .unwrap(),
            "- [x] Write report #work 🆔 ab12cd ✅ 2024-01-01"
        );
    }

    #[test]
    fn in_progress_swaps_done_for_start() {
        assert_eq!(
            set_status_line("- [x] Task ✅ 2023-12-31", TaskStatus::InProgress, "2024-01-01")
                .unwrap(),
            "- [/] Task 🛫 2024-01-01"
        );
    }

    #[test]
    fn todo_clears_stamps() {
        assert_eq!(
            set_status_line(
                "  - [-] Task 🛫 2023-12-01 ❌ 2023-12-02 📅 2024-02-01",
                TaskStatus::Todo,
                "2024-01-01"
            )
            .unwrap(),
            "  - [ ] Task 📅 2024-02-01"
        );
    }

    #[test]
    fn canceled_only_changes_bracket() {
        assert_eq!(
            set_status_line("- [/] Task 🛫 2023-12-01", TaskStatus::Canceled, "2024-01-01").unwrap(),
            "- [-] Task 🛫 2023-12-01"
        );
    }

    #[test]
    fn tag_matching_is_anchored() {
        assert!(has_tag("- [ ] a #project/x", "project"));
        assert!(!has_tag("- [ ] a #project-x", "project"));
        assert_eq!(add_tag_line("- [ ] a #project-x", "#project"), "- [ ] a #project-x #project");
    }

    #[test]
    fn tag_add_is_idempotent() {
        let once = add_tag_line("- [ ] a", "work");
        assert_eq!(once, "- [ ] a #work");
        assert_eq!(add_tag_line(&once, "work"), once);
    }

    #[test]
    fn tag_removal_keeps_neighbours() {
        assert_eq!(
            remove_tag_line("    - [ ] a #work/deep b #home", "work").unwrap(),
            "    - [ ] a b #home"
        );
        assert_eq!(
            remove_tag_line("- [ ] a #work-x", "work").unwrap(),
            "- [ ] a #work-x"
        );
    }

    #[test]
    fn tag_removal_leaves_other_spacing() {
        assert_eq!(remove_tag_line("- [ ] a  b #x", "x").unwrap(), "- [ ] a  b");
        assert_eq!(
            remove_tag_line("- [ ] a\tb #x  c", "x").unwrap(),
            "- [ ] a\tb c"
        );
        assert_eq!(remove_star_line("- [ ] a  b ⭐"), "- [ ] a  b");
    }

    #[test]
    fn star_goes_before_metadata() {
        assert_eq!(add_star_line("- [ ] a 📅 2024-01-01"), "- [ ] a ⭐ 📅 2024-01-01");
        assert_eq!(add_star_line("- [ ] a"), "- [ ] a ⭐");
        assert_eq!(add_star_line("- [ ] a ⭐"), "- [ ] a ⭐");
    }

    #[test]
    fn star_removal_collapses_space() {
        assert_eq!(remove_star_line("  - [ ] a ⭐ 📅 2024-01-01"), "  - [ ] a 📅 2024-01-01");
        assert_eq!(remove_star_line("- [ ] a ⭐"), "- [ ] a");
    }

    #[tokio::test]
    async fn update_status_rewrites_only_task_line() {
        let doc = "# Today\n- [ ] Write report #work 🆔 ab12cd\n- [ ] Other\n";
        let store = Arc::new(MemoryDocumentStore::with_documents([("today.md", doc)]));
        let task = record("today.md", "- [ ] Write report #work 🆔 ab12cd");
        let mutator = InlineMutator::new(task, store.clone(), clock());

        assert_eq!(
            mutator.update_status(TaskStatus::Done).await.unwrap(),
            EditOutcome::Applied
        );
        assert_eq!(
            store.read("today.md").await.unwrap().unwrap(),
            "# Today\n- [x] Write report #work 🆔 ab12cd ✅ 2024-01-01\n- [ ] Other\n"
        );
        assert_eq!(
            mutator.update_status(TaskStatus::Done).await.unwrap(),
            EditOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn missing_task_is_not_found() {
        let store = Arc::new(MemoryDocumentStore::with_documents([("a.md", "- [ ] Else\n")]));
        let task = record("a.md", "- [ ] Gone 🆔 ab12cd");
        let mutator = InlineMutator::new(task, store.clone(), clock());
        assert_eq!(mutator.add_star().await.unwrap(), EditOutcome::NotFound);
        assert_eq!(store.read("a.md").await.unwrap().unwrap(), "- [ ] Else\n");
    }

    #[tokio::test]
    async fn heading_with_task_text_is_left_alone() {
        let doc = "# Groceries\nGroceries for the week\n- [ ] Groceries\n";
        let store = Arc::new(MemoryDocumentStore::with_documents([("list.md", doc)]));
        let task = record("list.md", "- [ ] Groceries");
        let mutator = InlineMutator::new(task, store.clone(), clock());

        mutator.update_status(TaskStatus::Done).await.unwrap();
        mutator.add_tag("shop").await.unwrap();
        assert_eq!(
            store.read("list.md").await.unwrap().unwrap(),
            "# Groceries\nGroceries for the week\n- [x] Groceries ✅ 2024-01-01 #shop\n"
        );
    }

    #[tokio::test]
    async fn link_writes_both_lines() {
        let doc = "- [ ] A 🆔 aaaaaa\n- [ ] B\n- [ ] C\n";
        let store = Arc::new(MemoryDocumentStore::with_documents([("p.md", doc)]));
        let a = record("p.md", "- [ ] A 🆔 aaaaaa");
        let b = record("p.md", "- [ ] B");
        let c = record("p.md", "- [ ] C");

        let mutator = InlineMutator::new(b.clone(), store.clone(), clock());
        mutator.add_link_metadata(&a, LinkStyle::Csv).await.unwrap();
        mutator.add_link_metadata(&c, LinkStyle::Csv).await.unwrap();

        let text = store.read("p.md").await.unwrap().unwrap();
        let expected = format!(
            "- [ ] A 🆔 aaaaaa\n- [ ] B ⛔ aaaaaa,{c}\n- [ ] C 🆔 {c}\n",
            c = c.id
        );
        assert_eq!(text, expected);

        let outcome = mutator
            .remove_link_metadata(&codec::edge_hash("aaaaaa", &b.id))
            .await
            .unwrap();
        assert_eq!(outcome, EditOutcome::Applied);
        let text = store.read("p.md").await.unwrap().unwrap();
        assert!(text.contains(&format!("- [ ] B ⛔ {}\n", c.id)));
    }

    async fn reparse(store: &MemoryDocumentStore, path: &str, id: &str) -> TaskRecord {
        let text = store.read(path).await.unwrap().unwrap();
        let line = text.lines().find(|line| line.contains(id)).unwrap();
        record(path, line)
    }

    #[tokio::test]
    async fn links_reparse_the_same_in_every_style() {
        for style in [LinkStyle::Individual, LinkStyle::Csv, LinkStyle::Dataview] {
            let doc = "- [ ] A 🆔 aaaaaa\n- [/] B 🔼 #x #y 🆔 bbbbbb\n- [ ] C 🆔 cccccc\n";
            let store = Arc::new(MemoryDocumentStore::with_documents([("p.md", doc)]));
            let a = record("p.md", "- [ ] A 🆔 aaaaaa");
            let b = record("p.md", "- [/] B 🔼 #x #y 🆔 bbbbbb");
            let c = record("p.md", "- [ ] C 🆔 cccccc");

            let mutator = InlineMutator::new(b.clone(), store.clone(), clock());
            mutator.add_link_metadata(&a, style).await.unwrap();
            mutator.add_link_metadata(&c, style).await.unwrap();

            let linked = reparse(&store, "p.md", "bbbbbb").await;
            let links: BTreeSet<&str> = linked.incoming_links.iter().map(String::as_str).collect();
            assert_eq!(links, BTreeSet::from(["aaaaaa", "cccccc"]), "{style}");
            assert_eq!(linked.id, b.id);
            assert_eq!(linked.status, b.status);
            assert_eq!(linked.tags, b.tags);
            assert_eq!(linked.priority, b.priority);
            assert_eq!(linked.summary, b.summary);

            mutator.remove_tag("x").await.unwrap();
            let untagged = reparse(&store, "p.md", "bbbbbb").await;
            assert_eq!(untagged.tags, vec!["y".to_string()], "{style}");
            assert_eq!(
                TaskRecord {
                    tags: linked.tags.clone(),
                    text: linked.text.clone(),
                    ..untagged
                },
                linked,
                "{style}"
            );
        }
    }

    #[tokio::test]
    async fn add_task_line_and_delete() {
        let doc = "- [ ] A\n  - [ ] keep\n";
        let store = Arc::new(MemoryDocumentStore::with_documents([("a.md", doc)]));
        let task = record("a.md", "- [ ] A");
        let mutator = InlineMutator::new(task, store.clone(), clock());

        mutator.add_task_line("- [ ] A2").await.unwrap();
        assert_eq!(
            store.read("a.md").await.unwrap().unwrap(),
            "- [ ] A\n- [ ] A2\n  - [ ] keep\n"
        );

        mutator.delete().await.unwrap();
        assert_eq!(
            store.read("a.md").await.unwrap().unwrap(),
            "- [ ] A2\n  - [ ] keep\n"
        );
    }
}
