//! Task commands: list, show, status, tag, star, add, delete.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::output::{emit_success, format_task_line, HumanOutput};
use crate::patterns;
use crate::store::EditOutcome;
use crate::task::{TaskKind, TaskRecord, TaskStatus};

use super::Context;

pub struct ListOptions {
    pub status: Option<String>,
    pub tag: Option<String>,
    pub kind: Option<String>,
}

#[derive(Serialize)]
struct EditReport<'a> {
    task: &'a str,
    kind: TaskKind,
    path: &'a str,
    outcome: EditOutcome,
}

/// Print the result of one mutation.
fn emit_edit(ctx: &Context, command: &str, task: &TaskRecord, outcome: EditOutcome) -> Result<()> {
    let header = match outcome {
        EditOutcome::Applied => format!("{command}: updated {}", task.id),
        EditOutcome::Unchanged => format!("{command}: {} already up to date", task.id),
        EditOutcome::NotFound => format!("{command}: {} not found in {}", task.id, task.link),
    };
    let mut human = HumanOutput::new(header);
    if ctx.verbose {
        human.push_summary("path", task.link.clone());
    }
    if outcome == EditOutcome::NotFound {
        human.push_warning("the task moved or changed since it was scanned; nothing was written");
    }

    let report = EditReport {
        task: &task.id,
        kind: task.kind,
        path: &task.link,
        outcome,
    };
    emit_success(ctx.output, command, &report, Some(&human))
}

pub async fn run_list(ctx: &Context, options: ListOptions) -> Result<()> {
    let status = options
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()?;
    let kind = options
        .kind
        .as_deref()
        .map(str::parse::<TaskKind>)
        .transpose()?;
    let tag = options
        .tag
        .as_deref()
        .map(|tag| tag.trim().trim_start_matches('#').to_string());

    let tasks: Vec<TaskRecord> = ctx
        .tasks()
        .await?
        .into_iter()
        .filter(|task| status.map_or(true, |s| task.status == s))
        .filter(|task| kind.map_or(true, |k| task.kind == k))
        .filter(|task| tag.as_deref().map_or(true, |t| task.has_tag(t)))
        .collect();

    let mut human = HumanOutput::new(format!("{} task(s)", tasks.len()));
    if ctx.verbose {
        human.push_summary("vault", ctx.vault.display().to_string());
    }
    for task in &tasks {
        human.push_detail(format_task_line(task));
        if ctx.verbose {
            human.push_detail(format!("    {}", task.link));
        }
    }
    emit_success(ctx.output, "list", &tasks, Some(&human))
}

pub async fn run_show(ctx: &Context, selector: &str) -> Result<()> {
    let task = ctx.task(selector).await?;

    let mut human = HumanOutput::new(task.summary.clone());
    human.push_summary("id", task.id.clone());
    human.push_summary("kind", task.kind.as_str());
    human.push_summary("status", task.status.as_str());
    human.push_summary("path", task.link.clone());
    if !task.priority.is_empty() {
        human.push_summary("priority", task.priority.clone());
    }
    if !task.tags.is_empty() {
        human.push_summary("tags", task.tags.join(", "));
    }
    if task.starred {
        human.push_summary("starred", "yes");
    }
    if !task.incoming_links.is_empty() {
        human.push_summary("depends on", task.incoming_links.join(", "));
    }
    emit_success(ctx.output, "show", &task, Some(&human))
}

pub async fn run_status(ctx: &Context, selector: &str, status: &str) -> Result<()> {
    let status: TaskStatus = status.parse()?;
    let task = ctx.task(selector).await?;
    let outcome = ctx.editor.mutator(&task).update_status(status).await?;
    emit_edit(ctx, "status", &task, outcome)
}

pub async fn run_tag(ctx: &Context, selector: &str, tag: &str, add: bool) -> Result<()> {
    let tag = tag.trim().trim_start_matches('#');
    if tag.is_empty() || tag.contains(char::is_whitespace) {
        return Err(Error::InvalidArgument(format!(
            "invalid tag '{tag}': expected a single word"
        )));
    }
    let task = ctx.task(selector).await?;
    let mutator = ctx.editor.mutator(&task);
    let (command, outcome) = if add {
        ("tag add", mutator.add_tag(tag).await?)
    } else {
        ("tag remove", mutator.remove_tag(tag).await?)
    };
    emit_edit(ctx, command, &task, outcome)
}

pub async fn run_star(ctx: &Context, selector: &str, star: bool) -> Result<()> {
    let task = ctx.task(selector).await?;
    let mutator = ctx.editor.mutator(&task);
    let (command, outcome) = if star {
        ("star", mutator.add_star().await?)
    } else {
        ("unstar", mutator.remove_star().await?)
    };
    emit_edit(ctx, command, &task, outcome)
}

pub async fn run_add(ctx: &Context, selector: &str, text: &str) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidArgument("task text cannot be empty".to_string()));
    }
    let task = ctx.task(selector).await?;
    let line = match task.kind {
        TaskKind::Inline if !patterns::CHECKLIST.is_match(text) => format!("- [ ] {text}"),
        _ => text.to_string(),
    };
    let outcome = ctx.editor.mutator(&task).add_task_line(&line).await?;
    emit_edit(ctx, "add", &task, outcome)
}

pub async fn run_delete(ctx: &Context, selector: &str) -> Result<()> {
    let task = ctx.task(selector).await?;
    let outcome = ctx.editor.mutator(&task).delete().await?;
    emit_edit(ctx, "delete", &task, outcome)
}
