//! Configuration loading and management
//!
//! Handles parsing of `.tasklink.toml` at the vault root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::codec::LinkStyle;
use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::mutate::DEFAULT_NOTE_PREFIX;
use crate::parser::DEFAULT_TASK_TAG;

/// Config file name, relative to the vault root
pub const CONFIG_FILE: &str = ".tasklink.toml";

/// Longest lock wait accepted from configuration
const MAX_LOCK_TIMEOUT_MS: u64 = 600_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Dependency token style
    #[serde(default)]
    pub linking: LinkingConfig,

    /// Note task configuration
    #[serde(default)]
    pub notes: NotesConfig,

    /// Vault scan configuration
    #[serde(default)]
    pub scan: ScanConfig,

    /// Document store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkingConfig {
    /// Notation for new dependency tokens
    #[serde(default)]
    pub style: LinkStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesConfig {
    /// Header tag marking a document as a note task
    #[serde(default = "default_task_tag")]
    pub task_tag: String,

    /// File name prefix for notes created next to a note task
    #[serde(default = "default_note_prefix")]
    pub new_note_prefix: String,
}

fn default_task_tag() -> String {
    DEFAULT_TASK_TAG.to_string()
}

fn default_note_prefix() -> String {
    DEFAULT_NOTE_PREFIX.to_string()
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            task_tag: default_task_tag(),
            new_note_prefix: default_note_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Glob patterns (vault-relative) skipped while scanning
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_exclude() -> Vec<String> {
    vec![".obsidian/**".to_string(), ".trash/**".to_string()]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
        }
    }
}

impl ScanConfig {
    /// Compiled exclude patterns.
    pub fn patterns(&self) -> Result<Vec<glob::Pattern>> {
        self.exclude
            .iter()
            .map(|pattern| compile_pattern(pattern, "scan.exclude"))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How long a transform waits for a document lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

fn compile_pattern(pattern: &str, field: &str) -> Result<glob::Pattern> {
    if pattern.trim().is_empty() {
        return Err(Error::InvalidConfig(format!(
            "{field}: pattern cannot be empty"
        )));
    }
    glob::Pattern::new(pattern).map_err(|err| {
        Error::InvalidConfig(format!("{field}: invalid glob pattern '{pattern}': {err}"))
    })
}

impl Config {
    /// Load configuration from a `.tasklink.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the vault root, or return defaults when the
    /// file is missing
    pub fn load_from_vault(vault_root: &Path) -> Result<Self> {
        let config_path = Self::path_in(vault_root);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn path_in(vault_root: &Path) -> PathBuf {
        vault_root.join(CONFIG_FILE)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.notes.validate()?;
        self.scan.patterns()?;
        self.store.validate()?;
        Ok(())
    }
}

impl NotesConfig {
    fn validate(&self) -> Result<()> {
        let tag = self.task_tag.trim();
        if tag.is_empty() {
            return Err(Error::InvalidConfig(
                "notes.task_tag cannot be empty".to_string(),
            ));
        }
        if tag.starts_with('#') || tag.contains(char::is_whitespace) {
            return Err(Error::InvalidConfig(format!(
                "notes.task_tag '{tag}' must be a bare tag without '#' or spaces"
            )));
        }

        let prefix = self.new_note_prefix.trim();
        if prefix.is_empty() {
            return Err(Error::InvalidConfig(
                "notes.new_note_prefix cannot be empty".to_string(),
            ));
        }
        if prefix.contains(['/', '\\']) {
            return Err(Error::InvalidConfig(format!(
                "notes.new_note_prefix '{prefix}' cannot contain path separators"
            )));
        }
        Ok(())
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<()> {
        if self.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "store.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.lock_timeout_ms > MAX_LOCK_TIMEOUT_MS {
            return Err(Error::InvalidConfig(format!(
                "store.lock_timeout_ms must be <= {MAX_LOCK_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}
