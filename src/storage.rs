//! Data directory layout
//!
//! ```text
//! <data dir>/
//!   progress.toml           # Optional configuration
//!   progress-v1.json        # Persisted collection (name follows storage.key)
//!   progress-v1.json.lock   # fs2 lock guarding the collection file
//! ```
//!
//! The data directory is chosen by the caller (`--dir` / `PROGRESS_DIR`) or
//! defaults to the platform data directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;

use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::medium::FileMedium;
use crate::notifier::FileWatchSource;
use crate::store::ProgressStore;

/// Environment variable naming the data directory
pub const DATA_DIR_ENV: &str = "PROGRESS_DIR";

/// Resolved data directory plus the configuration found in it
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    config: Config,
}

impl Storage {
    /// Use `explicit` if given, otherwise the platform data directory.
    pub fn open(explicit: Option<&Path>) -> Result<Self> {
        let root = match explicit {
            Some(dir) => dir.to_path_buf(),
            None => default_data_dir()?,
        };
        Ok(Self::at(root))
    }

    /// Storage rooted at `root`, loading `progress.toml` if present.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config = Config::load_from_dir(&root);
        Self { root, config }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// File holding the persisted collection.
    pub fn data_path(&self) -> PathBuf {
        self.medium().path_for(&self.config.storage.key)
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn medium(&self) -> FileMedium {
        FileMedium::new(&self.root).with_lock_timeout(self.config.storage.lock_timeout_ms)
    }

    pub fn store(&self) -> Arc<ProgressStore> {
        Arc::new(ProgressStore::new(
            self.medium(),
            self.config.storage.key.clone(),
        ))
    }

    /// Cross-process source watching this directory's data file.
    pub fn watch_source(&self) -> FileWatchSource {
        FileWatchSource::new(self.data_path())
            .with_debounce(Duration::from_millis(self.config.watch.debounce_ms))
    }
}

fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", "progress")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            Error::StorageUnavailable(format!(
                "no home directory found; pass --dir or set {DATA_DIR_ENV}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_configured_key() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[storage]\nkey = \"custom\"",
        )
        .unwrap();

        let storage = Storage::at(dir.path());
        assert_eq!(storage.config().storage.key, "custom");
        assert_eq!(storage.data_path(), dir.path().join("custom.json"));
        assert_eq!(storage.config_path(), dir.path().join("progress.toml"));
    }

    #[test]
    fn store_persists_into_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::at(dir.path());
        storage.ensure_dirs().unwrap();

        let store = storage.store();
        store.add_todo("Persisted").unwrap();

        let raw = fs::read_to_string(storage.data_path()).unwrap();
        assert!(raw.contains("\"title\":\"Persisted\""));

        let reopened = Storage::at(dir.path()).store();
        assert_eq!(reopened.read()[0].title, "Persisted");
    }

    #[test]
    fn explicit_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(Some(dir.path())).unwrap();
        assert_eq!(storage.root(), dir.path());
    }
}
