//! Error types for tasklink
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, bad config)
//! - 3: Link rejected (cross-kind or self dependency)
//! - 4: Operation failed (IO, lock contention, programmer error)

use std::path::PathBuf;
use thiserror::Error;

use crate::task::TaskKind;

/// Exit codes for the tasklink CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const LINK_REJECTED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tasklink operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Vault not found: {0}")]
    VaultNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task selector '{selector}' is ambiguous: {}", candidates.join(", "))]
    AmbiguousTask {
        selector: String,
        candidates: Vec<String>,
    },

    // Link rejections (exit code 3)
    #[error("Cannot link tasks of different kinds ({from} -> {to})")]
    CrossKindLink { from: TaskKind, to: TaskKind },

    #[error("Task {0} cannot depend on itself")]
    SelfLink(String),

    // Programmer errors (exit code 4)
    #[error("Invalid date field: {0} (expected due|done|start|scheduled|created|canceled)")]
    InvalidDateField(String),

    #[error("Task line cannot be empty")]
    EmptyTaskLine,

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Path escapes the vault: {0}")]
    PathOutsideVault(String),

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::VaultNotFound(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::TaskNotFound(_)
            | Error::AmbiguousTask { .. } => exit_codes::USER_ERROR,

            // Link rejections
            Error::CrossKindLink { .. } | Error::SelfLink(_) => exit_codes::LINK_REJECTED,

            // Operation failures
            Error::InvalidDateField(_)
            | Error::EmptyTaskLine
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::PathOutsideVault(_)
            | Error::TaskJoin(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::AmbiguousTask {
                selector,
                candidates,
            } => Some(serde_json::json!({
                "selector": selector,
                "candidates": candidates,
            })),
            Error::CrossKindLink { from, to } => Some(serde_json::json!({
                "from_kind": from,
                "to_kind": to,
            })),
            _ => None,
        }
    }
}

/// Result type alias for tasklink operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(
            Error::TaskNotFound("x".into()).exit_code(),
            exit_codes::USER_ERROR
        );
        assert_eq!(
            Error::SelfLink("ab12cd".into()).exit_code(),
            exit_codes::LINK_REJECTED
        );
        assert_eq!(Error::EmptyTaskLine.exit_code(), exit_codes::OPERATION_FAILED);
    }

    #[test]
    fn cross_kind_message_and_details() {
        let err = Error::CrossKindLink {
            from: TaskKind::Inline,
            to: TaskKind::Note,
        };
        assert_eq!(err.to_string(), "Cannot link tasks of different kinds (inline -> note)");
        let details = err.details().expect("details");
        assert_eq!(details["from_kind"], "inline");
        assert_eq!(details["to_kind"], "note");
    }
}
