//! Dependency edges between tasks.
//!
//! Inline pairs are a two-sided write (ID on the source line, dependency on
//! the target line). Note pairs are one-sided: only the target's
//! `blockedBy` list changes. Edges never span task kinds.

use serde::Serialize;
use tracing::{debug, info};

use crate::codec::{self, LinkStyle};
use crate::error::{Error, Result};
use crate::mutate::TaskEditor;
use crate::store::EditOutcome;
use crate::task::TaskRecord;

/// A directed dependency: `to` waits on `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskEdge {
    pub from: String,
    pub to: String,
    pub hash: String,
}

/// Reject edges the vault cannot represent before touching any document.
pub fn validate_link(from: &TaskRecord, to: &TaskRecord) -> Result<()> {
    if from.kind != to.kind {
        return Err(Error::CrossKindLink {
            from: from.kind,
            to: to.kind,
        });
    }
    if from.id == to.id {
        return Err(Error::SelfLink(from.id.clone()));
    }
    Ok(())
}

/// Make `to` depend on `from`; returns the edge hash.
pub async fn add_link_signs_between_tasks(
    editor: &TaskEditor,
    from: &TaskRecord,
    to: &TaskRecord,
    style: LinkStyle,
) -> Result<String> {
    validate_link(from, to)?;

    let outcome = editor.mutator(to).add_link_metadata(from, style).await?;
    let hash = codec::edge_hash(&from.id, &to.id);
    match outcome {
        EditOutcome::NotFound => {
            tracing::warn!(hash = %hash, path = %to.link, "dependent task not found; edge not written")
        }
        outcome => info!(hash = %hash, outcome = outcome.as_str(), "linked tasks"),
    }
    Ok(hash)
}

/// Drop the edge `hash` from the dependent task's metadata.
pub async fn remove_link_signs_between_tasks(
    editor: &TaskEditor,
    to: &TaskRecord,
    hash: &str,
) -> Result<EditOutcome> {
    let outcome = editor.mutator(to).remove_link_metadata(hash).await?;
    debug!(hash, outcome = outcome.as_str(), "unlinked tasks");
    Ok(outcome)
}

/// One edge per incoming link, in record order.
pub fn edges_from_tasks(tasks: &[TaskRecord]) -> Vec<TaskEdge> {
    tasks
        .iter()
        .flat_map(|task| {
            task.incoming_links.iter().map(move |from| TaskEdge {
                from: from.clone(),
                to: task.id.clone(),
                hash: codec::edge_hash(from, &task.id),
            })
        })
        .collect()
}
