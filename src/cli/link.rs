//! Dependency commands: link, unlink, edges.

use serde::Serialize;

use crate::codec::{self, LinkStyle};
use crate::error::Result;
use crate::links;
use crate::output::{emit_success, HumanOutput};
use crate::scan;
use crate::store::EditOutcome;

use super::Context;

#[derive(Serialize)]
struct LinkReport<'a> {
    from: &'a str,
    to: &'a str,
    hash: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<LinkStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<EditOutcome>,
}

pub async fn run_link(ctx: &Context, from: &str, to: &str, style: Option<&str>) -> Result<()> {
    let style = match style {
        Some(style) => style.parse()?,
        None => ctx.config.linking.style,
    };
    let tasks = ctx.tasks().await?;
    let from = scan::select(&tasks, from)?;
    let to = scan::select(&tasks, to)?;

    let hash = links::add_link_signs_between_tasks(&ctx.editor, from, to, style).await?;

    let mut human = HumanOutput::new(format!("link: {} now depends on {}", to.id, from.id));
    human.push_summary("hash", hash.clone());
    if ctx.verbose {
        human.push_summary("style", style.as_str());
    }
    let report = LinkReport {
        from: &from.id,
        to: &to.id,
        hash: &hash,
        style: Some(style),
        outcome: None,
    };
    emit_success(ctx.output, "link", &report, Some(&human))
}

pub async fn run_unlink(ctx: &Context, from: &str, to: &str) -> Result<()> {
    let tasks = ctx.tasks().await?;
    let from = scan::select(&tasks, from)?;
    let to = scan::select(&tasks, to)?;

    let hash = codec::edge_hash(&from.id, &to.id);
    let outcome = links::remove_link_signs_between_tasks(&ctx.editor, to, &hash).await?;

    let header = match outcome {
        EditOutcome::Applied => format!("unlink: {} no longer depends on {}", to.id, from.id),
        _ => format!("unlink: {} did not depend on {}", to.id, from.id),
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("hash", hash.clone());
    let report = LinkReport {
        from: &from.id,
        to: &to.id,
        hash: &hash,
        style: None,
        outcome: Some(outcome),
    };
    emit_success(ctx.output, "unlink", &report, Some(&human))
}

pub async fn run_edges(ctx: &Context) -> Result<()> {
    let tasks = ctx.tasks().await?;
    let edges = links::edges_from_tasks(&tasks);

    let mut human = HumanOutput::new(format!("{} edge(s)", edges.len()));
    for edge in &edges {
        human.push_detail(format!("{} -> {}", edge.from, edge.to));
    }
    emit_success(ctx.output, "edges", &edges, Some(&human))
}
