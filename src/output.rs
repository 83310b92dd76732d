//! Shared output formatting for tasklink commands.

use serde::Serialize;

use crate::error::{exit_codes, Error, Result};
use crate::task::TaskRecord;

pub const SCHEMA_VERSION: &str = "tasklink.v1";

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Text printed for a command when `--json` is off.
#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    data: &'a T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

/// The JSON envelope for a successful command.
pub fn success_json<T: Serialize>(
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<String> {
    let payload = Envelope {
        schema_version: SCHEMA_VERSION,
        command,
        status: "success",
        data,
        warnings: human.map(|h| h.warnings.clone()).unwrap_or_default(),
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        println!("{}", success_json(command, data, human)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    error: ErrorBody<'a>,
}

/// The JSON envelope for a failed command.
pub fn error_json(command: &str, err: &Error) -> Result<String> {
    let message = err.to_string();
    let payload = ErrorEnvelope {
        schema_version: SCHEMA_VERSION,
        command,
        status: "error",
        error: ErrorBody {
            message: &message,
            code: err.exit_code(),
            kind: error_kind(err),
            details: err.details(),
        },
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    if json {
        println!("{}", error_json(command, err)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = error_hint(err) {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = vec![output.header.clone()];

    if !output.summary.is_empty() {
        lines.push(String::new());
        for (key, value) in &output.summary {
            lines.push(format!("{key}: {value}"));
        }
    }
    push_section(&mut lines, None, &output.details);
    push_section(&mut lines, Some("Warnings"), &output.warnings);

    lines.join("\n")
}

/// One-line rendering used by `list`.
pub fn format_task_line(task: &TaskRecord) -> String {
    let mut line = format!("{} {} {}", task.status.checkbox(), task.id, task.summary);
    if task.starred {
        line.push_str(" ⭐");
    }
    if !task.priority.is_empty() {
        line.push(' ');
        line.push_str(&task.priority);
    }
    for tag in &task.tags {
        line.push_str(" #");
        line.push_str(tag);
    }
    line
}

pub fn infer_command_name_from_args() -> String {
    command_name(std::env::args().skip(1))
}

fn command_name(args: impl IntoIterator<Item = String>) -> String {
    let mut takes_value = false;
    let mut positional = args.into_iter().filter(|arg| {
        if takes_value {
            takes_value = false;
            return false;
        }
        if arg == "--vault" {
            takes_value = true;
            return false;
        }
        !arg.starts_with('-')
    });

    let Some(command) = positional.next() else {
        return "tasklink".to_string();
    };
    if command == "tag" {
        if let Some(sub) = positional.next() {
            return format!("{command} {sub}");
        }
    }
    command
}

fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        exit_codes::USER_ERROR => "user_error",
        exit_codes::LINK_REJECTED => "link_rejected",
        _ => "operation_failed",
    }
}

fn error_hint(err: &Error) -> Option<&'static str> {
    match err {
        Error::AmbiguousTask { .. } => Some("use the task id shown by `tasklink list`"),
        Error::TaskNotFound(_) => Some("tasklink list"),
        Error::VaultNotFound(_) => Some("pass --vault <dir> or set TASKLINK_VAULT"),
        Error::InvalidConfig(_) => Some("fix .tasklink.toml then retry"),
        Error::CrossKindLink { .. } => Some("link inline tasks to inline tasks and notes to notes"),
        Error::LockFailed(_) => Some("retry once the other writer finishes"),
        _ => None,
    }
}

fn push_section(lines: &mut Vec<String>, title: Option<&str>, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    if let Some(title) = title {
        lines.push(format!("{title}:"));
    }
    for item in items {
        lines.push(format!("  {item}"));
    }
}
