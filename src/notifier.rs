//! Change notification across contexts
//!
//! A [`ChangeNotifier`] merges two kinds of trigger onto the store's
//! [`ChangeBus`]:
//!
//! - the same-context signal the store publishes after each local write,
//!   reset or replace;
//! - cross-context sources, attached as [`ChangeSource`] adapters, which fire
//!   when some *other* context changed the shared medium.
//!
//! Subscribers get no payload and re-read the store.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::bus::{ChangeBus, Subscription};
use crate::error::{Error, Result};
use crate::medium::MemoryMedium;
use crate::store::ProgressStore;

/// Default quiet period before a burst of file events becomes one notification.
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// A pluggable trigger that publishes on the bus when another context
/// changed the store's medium.
pub trait ChangeSource {
    fn name(&self) -> &'static str;

    /// Begin delivering; delivery stops when the returned handle is dropped.
    fn start(self, store: Weak<ProgressStore>, bus: ChangeBus) -> Result<SourceHandle>;
}

/// Keeps an attached source running.
pub struct SourceHandle {
    name: &'static str,
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl SourceHandle {
    pub fn new(name: &'static str, stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name,
            stop: Some(Box::new(stop)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
            debug!(source = self.name, "change source detached");
        }
    }
}

pub struct ChangeNotifier {
    store: Arc<ProgressStore>,
    sources: Vec<SourceHandle>,
}

impl ChangeNotifier {
    /// Notifier carrying only the store's same-context signal.
    pub fn new(store: Arc<ProgressStore>) -> Self {
        Self {
            store,
            sources: Vec::new(),
        }
    }

    pub fn store(&self) -> &Arc<ProgressStore> {
        &self.store
    }

    pub fn attach(&mut self, source: impl ChangeSource) -> Result<()> {
        let name = source.name();
        let handle = source.start(Arc::downgrade(&self.store), self.store.bus().clone())?;
        debug!(source = name, "change source attached");
        self.sources.push(handle);
        Ok(())
    }

    pub fn with_source(mut self, source: impl ChangeSource) -> Result<Self> {
        self.attach(source)?;
        Ok(self)
    }

    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.store.bus().subscribe(callback)
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(SourceHandle::name).collect()
    }
}

/// Foreign writes on a [`MemoryMedium`]'s shared memory.
pub struct MemorySource {
    medium: MemoryMedium,
}

impl MemorySource {
    pub fn new(medium: MemoryMedium) -> Self {
        Self { medium }
    }
}

impl ChangeSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn start(self, _store: Weak<ProgressStore>, bus: ChangeBus) -> Result<SourceHandle> {
        let id = self.medium.listen_foreign(move || bus.publish());
        let medium = self.medium;
        Ok(SourceHandle::new("memory", move || medium.unlisten(id)))
    }
}

/// Filesystem changes to the store's key file made by other processes.
///
/// Events are debounced, and a notification is published unless the file
/// holds exactly what the store itself last wrote, which filters out this
/// process's own writes without missing foreign ones a `read` already saw.
pub struct FileWatchSource {
    path: PathBuf,
    debounce: Duration,
}

enum WatchMsg {
    Fs(notify::Result<Event>),
    Stop,
}

impl FileWatchSource {
    /// Watch `path`, the file holding the store's value.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

impl ChangeSource for FileWatchSource {
    fn name(&self) -> &'static str {
        "file-watch"
    }

    fn start(self, store: Weak<ProgressStore>, bus: ChangeBus) -> Result<SourceHandle> {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::InvalidArgument(format!("no parent directory: {}", self.path.display())))?;
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| Error::InvalidArgument(format!("not a file path: {}", self.path.display())))?;
        std::fs::create_dir_all(&dir)?;

        let (event_tx, event_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let fs_tx = event_tx.clone();
        let debounce = self.debounce;

        let worker = thread::spawn(move || {
            let watcher: notify::Result<RecommendedWatcher> =
                notify::recommended_watcher(move |res| {
                    let _ = fs_tx.send(WatchMsg::Fs(res));
                });
            let mut watcher = match watcher {
                Ok(watcher) => watcher,
                Err(err) => {
                    let _ = ready_tx.send(Err(err.into()));
                    return;
                }
            };
            if let Err(err) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
                let _ = ready_tx.send(Err(err.into()));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            watch_loop(&event_rx, &file_name, debounce, &store, &bus);
            drop(watcher);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = worker.join();
                return Err(err);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(Error::OperationFailed("file watcher exited during setup".to_string()));
            }
        }

        Ok(SourceHandle::new("file-watch", move || {
            let _ = event_tx.send(WatchMsg::Stop);
            let _ = worker.join();
        }))
    }
}

fn watch_loop(
    event_rx: &mpsc::Receiver<WatchMsg>,
    file_name: &OsString,
    debounce: Duration,
    store: &Weak<ProgressStore>,
    bus: &ChangeBus,
) {
    let mut pending: Option<Instant> = None;

    loop {
        let timeout = pending
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT);
        match event_rx.recv_timeout(timeout) {
            Ok(WatchMsg::Fs(Ok(event))) => {
                if touches(&event, file_name) {
                    pending = Some(Instant::now() + debounce);
                }
            }
            Ok(WatchMsg::Fs(Err(err))) => {
                warn!(error = %err, "file watch error");
            }
            Ok(WatchMsg::Stop) => break,
            Err(RecvTimeoutError::Timeout) => {
                if pending.take().is_none() {
                    continue;
                }
                let Some(store) = store.upgrade() else {
                    break;
                };
                if store.has_foreign_change() {
                    debug!(key = store.key(), "foreign change detected");
                    bus.publish();
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn touches(event: &Event, file_name: &OsString) -> bool {
    event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(file_name.as_os_str()))
}
