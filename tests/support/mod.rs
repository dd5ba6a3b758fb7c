#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// A throwaway data directory for one test.
pub struct DataDir {
    dir: TempDir,
}

impl DataDir {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_file(&self) -> PathBuf {
        self.dir.path().join("progress-v1.json")
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        self.write_file("progress.toml", contents)
    }

    /// `progress` pointed at this directory, run from inside it.
    pub fn cmd(&self) -> Command {
        let mut cmd = progress_cmd();
        cmd.arg("--dir").arg(self.path()).current_dir(self.path());
        cmd
    }
}

pub fn progress_cmd() -> Command {
    let mut cmd = Command::cargo_bin("progress").expect("progress binary");
    cmd.env_remove("PROGRESS_DIR").env_remove("RUST_LOG");
    cmd
}

/// Run a `--json` command and return its parsed envelope.
pub fn run_json(mut cmd: Command) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let output = cmd.arg("--json").output()?;
    if !output.status.success() {
        return Err(format!(
            "command failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stdout)
        )
        .into());
    }
    Ok(serde_json::from_slice(&output.stdout)?)
}
