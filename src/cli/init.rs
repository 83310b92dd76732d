//! tasklink init command implementation
//!
//! Writes a default `.tasklink.toml` at the vault root.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::{Config, CONFIG_FILE};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};

use super::resolve_vault;

#[derive(Serialize)]
struct InitReport {
    vault: PathBuf,
    config: PathBuf,
    created: bool,
}

pub fn run(vault: Option<PathBuf>, force: bool, output: OutputOptions) -> Result<()> {
    let vault = resolve_vault(vault)?;
    let path = Config::path_in(&vault);

    let created = if path.exists() && !force {
        // Refuse to clobber, but still surface a broken file.
        Config::load(&path)?;
        false
    } else {
        Config::default().save(&path)?;
        true
    };
    tracing::debug!(path = %path.display(), created, "init");

    let header = if created {
        format!("tasklink init: wrote {CONFIG_FILE}")
    } else {
        "tasklink init: nothing to do".to_string()
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("vault", vault.display().to_string());
    if !created {
        human.push_warning(format!("{CONFIG_FILE} already exists (use --force to overwrite)"));
    }

    let report = InitReport {
        vault,
        config: path,
        created,
    };
    emit_success(output, "init", &report, Some(&human))
}
