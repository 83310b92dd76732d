#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_cmd::Command;
use tasklink::clock::FixedClock;
use tasklink::{FsDocumentStore, TaskEditor};
use tempfile::TempDir;

pub const DAILY: &str = "# Today\n- [ ] Write report #work 🆔 ab12cd\n- [ ] Review draft ⛔ ab12cd\n- [x] Ship release 🆔 ef34gh\n";
pub const PLAN: &str = "---\nstatus: open\ntags: [task]\n---\n# Plan\nBody text\n";
pub const SPEC: &str = "---\ntags:\n  - task\n---\n";

pub struct TestVault {
    dir: TempDir,
}

impl TestVault {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    /// A vault with a daily note of inline tasks and two note tasks.
    pub fn fixture() -> Self {
        let vault = Self::new();
        vault.write("daily.md", DAILY);
        vault.write("Tasks/Plan.md", PLAN);
        vault.write("Tasks/Spec.md", SPEC);
        vault
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn read(&self, rel_path: &str) -> String {
        fs::read_to_string(self.dir.path().join(rel_path)).expect("read file")
    }

    pub fn exists(&self, rel_path: &str) -> bool {
        self.dir.path().join(rel_path).exists()
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        self.write(".tasklink.toml", contents)
    }

    pub fn store(&self) -> Arc<FsDocumentStore> {
        Arc::new(FsDocumentStore::new(self.dir.path()))
    }

    pub fn editor(&self) -> TaskEditor {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        TaskEditor::new(self.store(), Arc::new(FixedClock::on(date)))
    }

    /// The binary, pointed at this vault.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("tasklink").expect("binary");
        cmd.env("TASKLINK_VAULT", self.dir.path())
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run with `--json`, expect success, return the parsed envelope.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .output()
            .expect("run tasklink");
        assert!(
            output.status.success(),
            "tasklink {args:?} failed: {}",
            String::from_utf8_lossy(&output.stdout)
        );
        serde_json::from_slice(&output.stdout).expect("json output")
    }
}

pub fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}
