//! Durable key-value media
//!
//! A [`Medium`] stores whole string values under keys. Reads and writes are
//! atomic per call; there is no read-modify-write atomicity across calls.
//!
//! - [`FileMedium`]: one `<key>.json` file per key in a data directory,
//!   shared by every process pointed at that directory.
//! - [`MemoryMedium`]: a handle onto a [`SharedMemory`] map. Each handle is a
//!   separate context; writes through one handle are announced to listeners
//!   registered by the others.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};

/// Whole-value key-value storage.
pub trait Medium: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed medium rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FileMedium {
    dir: PathBuf,
    lock_timeout_ms: u64,
}

impl FileMedium {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the value for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Medium for FileMedium {
    fn get(&self, key: &str) -> Result<Option<String>> {
        lock::read_locked_opt(self.path_for(key), self.lock_timeout_ms)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock::write_atomic_locked(self.path_for(key), value.as_bytes(), self.lock_timeout_ms)
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock::remove_locked(self.path_for(key), self.lock_timeout_ms)
    }
}

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct MemoryState {
    values: HashMap<String, String>,
    // Total stored bytes allowed; `None` means unlimited.
    quota: Option<usize>,
    disabled: bool,
    listeners: Vec<(u64, u64, Listener)>,
}

/// The shared backing of one or more [`MemoryMedium`] contexts.
#[derive(Clone, Default)]
pub struct SharedMemory {
    state: Arc<Mutex<MemoryState>>,
    next_id: Arc<AtomicU64>,
}

impl SharedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new context onto this memory.
    pub fn context(&self) -> MemoryMedium {
        MemoryMedium {
            shared: self.clone(),
            context_id: self.next_id.fetch_add(1, Ordering::SeqCst),
        }
    }

    /// Limit the total size of stored values; writes beyond it fail.
    pub fn set_quota(&self, quota: Option<usize>) {
        self.lock().quota = quota;
    }

    /// Make every read, write and removal fail, like storage turned off.
    pub fn set_disabled(&self, disabled: bool) {
        self.lock().disabled = disabled;
    }

    /// Raw stored value, bypassing any context.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Listeners run after the state lock is released.
    fn announce(&self, origin: u64) {
        let listeners: Vec<Listener> = self
            .lock()
            .listeners
            .iter()
            .filter(|(_, context, _)| *context != origin)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

/// One context's view of a [`SharedMemory`].
#[derive(Clone)]
pub struct MemoryMedium {
    shared: SharedMemory,
    context_id: u64,
}

impl MemoryMedium {
    /// Register `listener` for writes made by other contexts. Returns a
    /// registration id for [`MemoryMedium::unlisten`].
    pub fn listen_foreign(&self, listener: impl Fn() + Send + Sync + 'static) -> u64 {
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        self.shared
            .lock()
            .listeners
            .push((id, self.context_id, Arc::new(listener)));
        id
    }

    pub fn unlisten(&self, id: u64) {
        self.shared
            .lock()
            .listeners
            .retain(|(listener_id, _, _)| *listener_id != id);
    }
}

impl Medium for MemoryMedium {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let state = self.shared.lock();
        if state.disabled {
            return Err(Error::StorageUnavailable("storage is disabled".to_string()));
        }
        Ok(state.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        {
            let mut state = self.shared.lock();
            if state.disabled {
                return Err(Error::StorageUnavailable("storage is disabled".to_string()));
            }
            if let Some(quota) = state.quota {
                let others: usize = state
                    .values
                    .iter()
                    .filter(|(k, _)| k.as_str() != key)
                    .map(|(k, v)| k.len() + v.len())
                    .sum();
                if others + key.len() + value.len() > quota {
                    return Err(Error::StorageUnavailable(format!(
                        "quota of {quota} bytes exceeded"
                    )));
                }
            }
            state.values.insert(key.to_string(), value.to_string());
        }
        self.shared.announce(self.context_id);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let removed = {
            let mut state = self.shared.lock();
            if state.disabled {
                return Err(Error::StorageUnavailable("storage is disabled".to_string()));
            }
            state.values.remove(key).is_some()
        };
        if removed {
            self.shared.announce(self.context_id);
        }
        Ok(())
    }
}
