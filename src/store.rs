//! Document store: the only way the engine reads or writes vault text.
//!
//! Every edit goes through [`DocumentStore::transform`], a read-modify-write
//! that no other transform on the same document can interleave with.
//! Edits spanning two documents are two transforms; nothing rolls the first
//! one back if the second fails.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};

/// A pure edit of one document's full text.
pub type Transform = Box<dyn FnOnce(String) -> Result<String> + Send>;

/// What a transform did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOutcome {
    /// The text changed and was written back.
    Applied,
    /// The transform returned the text it was given.
    Unchanged,
    /// The document (or the task inside it) does not exist.
    NotFound,
}

impl EditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditOutcome::Applied => "applied",
            EditOutcome::Unchanged => "unchanged",
            EditOutcome::NotFound => "not_found",
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, EditOutcome::Applied)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Current text of a document, or `None` when it does not exist.
    async fn read(&self, path: &str) -> Result<Option<String>>;

    /// Atomically replace a document's text with `transform(text)`.
    async fn transform(&self, path: &str, transform: Transform) -> Result<EditOutcome>;

    /// Create a new document. Fails if it already exists.
    async fn create(&self, path: &str, text: &str) -> Result<()>;

    /// Delete a document; `false` when there was nothing to delete.
    async fn delete(&self, path: &str) -> Result<bool>;

    /// Vault-relative paths of every Markdown document, sorted.
    async fn list(&self) -> Result<Vec<String>>;
}

fn is_markdown(path: &str) -> bool {
    Path::new(path)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

/// Check that `path` is a plain relative path inside the vault.
pub fn validate_relative(path: &str) -> Result<&str> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(Error::PathOutsideVault(path.to_string()));
    }
    let inside = Path::new(trimmed)
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if !inside {
        return Err(Error::PathOutsideVault(path.to_string()));
    }
    Ok(trimmed)
}

/// Documents on disk under a vault root.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
    lock_timeout_ms: u64,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<(PathBuf, PathBuf)> {
        let relative = validate_relative(path)?;
        Ok((
            self.root.join(relative),
            lock::lock_path_for(&self.root, relative),
        ))
    }
}

fn read_if_exists(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn read(&self, path: &str) -> Result<Option<String>> {
        let (full, _) = self.resolve(path)?;
        tokio::task::spawn_blocking(move || read_if_exists(&full)).await?
    }

    async fn transform(&self, path: &str, transform: Transform) -> Result<EditOutcome> {
        let (full, lock_path) = self.resolve(path)?;
        let timeout = self.lock_timeout_ms;
        let label = path.to_string();

        tokio::task::spawn_blocking(move || {
            let _lock = FileLock::acquire(&lock_path, timeout)?;
            let Some(current) = read_if_exists(&full)? else {
                tracing::debug!(path = %label, "transform target missing");
                return Ok(EditOutcome::NotFound);
            };
            let next = transform(current.clone())?;
            if next == current {
                return Ok(EditOutcome::Unchanged);
            }
            lock::write_atomic(&full, next.as_bytes())?;
            tracing::debug!(path = %label, bytes = next.len(), "document rewritten");
            Ok(EditOutcome::Applied)
        })
        .await?
    }

    async fn create(&self, path: &str, text: &str) -> Result<()> {
        let (full, lock_path) = self.resolve(path)?;
        let timeout = self.lock_timeout_ms;
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let _lock = FileLock::acquire(&lock_path, timeout)?;
            if full.exists() {
                return Err(Error::OperationFailed(format!(
                    "document already exists: {}",
                    full.display()
                )));
            }
            lock::write_atomic(&full, text.as_bytes())
        })
        .await?
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let (full, lock_path) = self.resolve(path)?;
        let timeout = self.lock_timeout_ms;

        tokio::task::spawn_blocking(move || {
            let _lock = FileLock::acquire(&lock_path, timeout)?;
            match fs::remove_file(&full) {
                Ok(()) => Ok(true),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(err) => Err(err.into()),
            }
        })
        .await?
    }

    async fn list(&self) -> Result<Vec<String>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || list_markdown(&root)).await?
    }
}

fn list_markdown(root: &Path) -> Result<Vec<String>> {
    let pattern = format!(
        "{}/**/*.md",
        glob::Pattern::escape(&root.to_string_lossy())
    );
    let entries = glob::glob(&pattern)
        .map_err(|err| Error::OperationFailed(format!("invalid vault path: {err}")))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable vault entry");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if relative.starts_with(".tasklink/") {
            continue;
        }
        paths.push(relative);
    }
    paths.sort();
    Ok(paths)
}

/// Documents held in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<BTreeMap<String, String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents<I, P, T>(documents: I) -> Self
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<String>,
        T: Into<String>,
    {
        Self {
            documents: Mutex::new(
                documents
                    .into_iter()
                    .map(|(path, text)| (path.into(), text.into()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read(&self, path: &str) -> Result<Option<String>> {
        let path = validate_relative(path)?;
        Ok(self.documents.lock().await.get(path).cloned())
    }

    async fn transform(&self, path: &str, transform: Transform) -> Result<EditOutcome> {
        let path = validate_relative(path)?;
        let mut documents = self.documents.lock().await;
        let Some(current) = documents.get(path) else {
            return Ok(EditOutcome::NotFound);
        };
        let next = transform(current.clone())?;
        if next == *current {
            return Ok(EditOutcome::Unchanged);
        }
        documents.insert(path.to_string(), next);
        Ok(EditOutcome::Applied)
    }

    async fn create(&self, path: &str, text: &str) -> Result<()> {
        let path = validate_relative(path)?;
        let mut documents = self.documents.lock().await;
        if documents.contains_key(path) {
            return Err(Error::OperationFailed(format!(
                "document already exists: {path}"
            )));
        }
        documents.insert(path.to_string(), text.to_string());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let path = validate_relative(path)?;
        Ok(self.documents.lock().await.remove(path).is_some())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .documents
            .lock()
            .await
            .keys()
            .filter(|path| is_markdown(path))
            .cloned()
            .collect())
    }
}
