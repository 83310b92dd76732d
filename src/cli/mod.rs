//! Command-line interface for tasklink
//!
//! This module defines the CLI structure using clap derive macros.
//! Each group of subcommands is implemented in its own submodule.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::mutate::TaskEditor;
use crate::output::OutputOptions;
use crate::scan::{self, Scanner};
use crate::store::FsDocumentStore;
use crate::task::TaskRecord;

mod init;
mod link;
mod task;

/// tasklink - dependency-aware tasks in Markdown vaults
///
/// Reads checklist tasks and task notes from a directory of Markdown files
/// and edits their status, tags, stars and dependencies in place.
#[derive(Parser, Debug)]
#[command(name = "tasklink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the vault (defaults to current directory)
    #[arg(long, global = true, env = "TASKLINK_VAULT")]
    pub vault: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default .tasklink.toml into the vault
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// List tasks found in the vault
    List {
        /// Only tasks with this status (todo, in_progress, done, canceled)
        #[arg(long)]
        status: Option<String>,

        /// Only tasks carrying this tag
        #[arg(long)]
        tag: Option<String>,

        /// Only tasks of this kind (inline, note)
        #[arg(long)]
        kind: Option<String>,
    },

    /// Show one task
    Show {
        /// Task id, note path, or summary text
        task: String,
    },

    /// Set a task's status
    Status {
        /// Task id, note path, or summary text
        task: String,

        /// New status: todo, in_progress, done, canceled
        status: String,
    },

    /// Tag management
    #[command(subcommand)]
    Tag(TagCommands),

    /// Star a task
    Star {
        /// Task id, note path, or summary text
        task: String,
    },

    /// Remove a task's star
    Unstar {
        /// Task id, note path, or summary text
        task: String,
    },

    /// Make <to> depend on <from>
    Link {
        /// Task that must finish first
        from: String,

        /// Task that waits
        to: String,

        /// Token style for inline tasks: individual, csv, dataview
        #[arg(long)]
        style: Option<String>,
    },

    /// Remove the dependency of <to> on <from>
    Unlink {
        /// Task that must finish first
        from: String,

        /// Task that waits
        to: String,
    },

    /// List dependency edges
    Edges,

    /// Add a task next to an existing one
    Add {
        /// Task id, note path, or summary text
        task: String,

        /// Text of the new task (a checklist line for inline tasks)
        text: String,
    },

    /// Delete a task
    Delete {
        /// Task id, note path, or summary text
        task: String,
    },
}

/// Tag subcommands
#[derive(Subcommand, Debug)]
pub enum TagCommands {
    /// Add a tag to a task
    Add {
        /// Task id, note path, or summary text
        task: String,

        /// Tag, with or without '#'
        tag: String,
    },

    /// Remove a tag from a task
    Remove {
        /// Task id, note path, or summary text
        task: String,

        /// Tag, with or without '#'
        tag: String,
    },
}

/// Everything a command needs to reach the vault.
pub struct Context {
    pub vault: PathBuf,
    pub config: Config,
    pub editor: TaskEditor,
    pub output: OutputOptions,
    pub verbose: bool,
}

impl Context {
    pub fn open(vault: Option<PathBuf>, output: OutputOptions, verbose: bool) -> Result<Self> {
        let vault = resolve_vault(vault)?;
        let config = Config::load_from_vault(&vault)?;
        let store = FsDocumentStore::new(vault.clone())
            .with_lock_timeout(config.store.lock_timeout_ms);
        let editor = TaskEditor::new(Arc::new(store), Arc::new(SystemClock))
            .with_note_prefix(config.notes.new_note_prefix.clone())
            .with_task_tag(config.notes.task_tag.clone());
        Ok(Self {
            vault,
            config,
            editor,
            output,
            verbose,
        })
    }

    pub async fn tasks(&self) -> Result<Vec<TaskRecord>> {
        Scanner::from_config(&self.config)?
            .scan(self.editor.store().as_ref())
            .await
    }

    /// Scan the vault and resolve one selector.
    pub async fn task(&self, selector: &str) -> Result<TaskRecord> {
        let tasks = self.tasks().await?;
        scan::select(&tasks, selector).cloned()
    }
}

pub fn resolve_vault(vault: Option<PathBuf>) -> Result<PathBuf> {
    let path = match vault {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    if !path.is_dir() {
        return Err(Error::VaultNotFound(path));
    }
    Ok(path)
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        if let Commands::Init { force } = self.command {
            return init::run(self.vault, force, output);
        }

        let ctx = Context::open(self.vault, output, self.verbose)?;
        match self.command {
            Commands::Init { .. } => Ok(()),
            Commands::List { status, tag, kind } => {
                task::run_list(
                    &ctx,
                    task::ListOptions {
                        status,
                        tag,
                        kind,
                    },
                )
                .await
            }
            Commands::Show { task } => task::run_show(&ctx, &task).await,
            Commands::Status { task, status } => task::run_status(&ctx, &task, &status).await,
            Commands::Tag(TagCommands::Add { task, tag }) => {
                task::run_tag(&ctx, &task, &tag, true).await
            }
            Commands::Tag(TagCommands::Remove { task, tag }) => {
                task::run_tag(&ctx, &task, &tag, false).await
            }
            Commands::Star { task } => task::run_star(&ctx, &task, true).await,
            Commands::Unstar { task } => task::run_star(&ctx, &task, false).await,
            Commands::Link { from, to, style } => {
                link::run_link(&ctx, &from, &to, style.as_deref()).await
            }
            Commands::Unlink { from, to } => link::run_unlink(&ctx, &from, &to).await,
            Commands::Edges => link::run_edges(&ctx).await,
            Commands::Add { task, text } => task::run_add(&ctx, &task, &text).await,
            Commands::Delete { task } => task::run_delete(&ctx, &task).await,
        }
    }
}
