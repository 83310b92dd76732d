//! tasklink - dependency-aware tasks in Markdown vaults
//!
//! This library finds tasks in a directory of Markdown documents and edits
//! them in place, keeping a dependency graph between tasks in sync with the
//! text.
//!
//! # Core Concepts
//!
//! - **Inline tasks**: one checklist line, metadata as emoji or `[key:: value]` tokens
//! - **Note tasks**: a whole document whose metadata lives in its header block
//! - **Edges**: `to` depends on `from`, written as ID and dependency tokens
//!
//! # Module Organization
//!
//! - `patterns`: regex vocabulary for every inline token
//! - `task`: the task record model
//! - `parser`: observations and note headers into records
//! - `dates`, `frontmatter`, `codec`: token-level encode/decode
//! - `mutate`: per-kind mutators over the document store
//! - `store`, `lock`: document access with per-document locks and atomic writes
//! - `scan`: vault walk and task selection
//! - `links`: edge creation, removal and derivation
//! - `cli`, `output`, `config`: the `tasklink` binary

pub mod cli;
pub mod clock;
pub mod codec;
pub mod config;
pub mod dates;
pub mod error;
pub mod frontmatter;
pub mod links;
pub mod lock;
pub mod mutate;
pub mod output;
pub mod parser;
pub mod patterns;
pub mod scan;
pub mod store;
pub mod task;

pub use error::{Error, Result};
pub use mutate::{TaskEditor, TaskMutator};
pub use store::{DocumentStore, EditOutcome, FsDocumentStore, MemoryDocumentStore};
pub use task::{TaskKind, TaskRecord, TaskStatus};
