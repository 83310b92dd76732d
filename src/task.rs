//! Task records shared by the parser, the mutators and the CLI.
//!
//! A record is a normalized view of one task regardless of where it lives:
//! a checklist line carrying emoji metadata (inline) or a note whose header
//! block carries the metadata (note).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Priority glyphs, highest first.
pub const PRIORITY_GLYPHS: [&str; 5] = ["🔺", "⏫", "🔼", "🔽", "⏬"];

/// Which backing store owns a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Inline,
    Note,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Inline => "inline",
            TaskKind::Note => "note",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(TaskKind::Inline),
            "note" => Ok(TaskKind::Note),
            other => Err(Error::InvalidArgument(format!(
                "unknown task kind '{other}' (expected inline|note)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Canceled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Done,
        TaskStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Canceled => "canceled",
        }
    }

    /// Checklist bracket written into inline task lines.
    pub fn checkbox(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "[ ]",
            TaskStatus::InProgress => "[/]",
            TaskStatus::Done => "[x]",
            TaskStatus::Canceled => "[-]",
        }
    }

    /// Value written into a note header `status:` field.
    pub fn note_value(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "open",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
            TaskStatus::Canceled => "canceled",
        }
    }

    /// Map a checklist status character. Unknown codes are `Todo`.
    pub fn from_inline_code(code: &str) -> Self {
        match code {
            "x" | "X" => TaskStatus::Done,
            "/" => TaskStatus::InProgress,
            "-" => TaskStatus::Canceled,
            _ => TaskStatus::Todo,
        }
    }

    /// Map a note header status value. Unknown values are `Todo`.
    pub fn from_note_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "done" | "completed" => TaskStatus::Done,
            "in-progress" | "in_progress" => TaskStatus::InProgress,
            "canceled" | "cancelled" | "none" => TaskStatus::Canceled,
            _ => TaskStatus::Todo,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "todo" | "open" => Ok(TaskStatus::Todo),
            "in_progress" | "in-progress" | "doing" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "canceled" | "cancelled" => Ok(TaskStatus::Canceled),
            other => Err(Error::InvalidArgument(format!(
                "unknown status '{other}' (expected todo|in_progress|done|canceled)"
            ))),
        }
    }
}

/// One task as seen by a scan, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObservation {
    /// Checklist character (inline) or header status value (note).
    pub status: String,
    /// Task text without the checklist prefix, or the note title.
    pub text: String,
    /// Vault-relative path of the owning document.
    pub path: String,
}

impl RawObservation {
    pub fn new(
        status: impl Into<String>,
        text: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            status: status.into(),
            text: text.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub kind: TaskKind,
    pub summary: String,
    /// First line of the source text; used to find the task again.
    pub text: String,
    pub tags: Vec<String>,
    pub status: TaskStatus,
    pub priority: String,
    pub link: String,
    /// Tasks that must finish before this one: ids (inline) or paths (note).
    pub incoming_links: Vec<String>,
    pub starred: bool,
}

impl TaskRecord {
    /// A task whose text is nothing but metadata.
    pub fn is_empty(&self) -> bool {
        self.summary.trim().is_empty()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim_start_matches('#');
        self.tags.iter().any(|t| t == tag)
    }
}

/// Push `value` unless it is already present, keeping first-seen order.
pub(crate) fn push_unique(values: &mut Vec<String>, value: impl Into<String>) {
    let value = value.into();
    if !values.contains(&value) {
        values.push(value);
    }
}
