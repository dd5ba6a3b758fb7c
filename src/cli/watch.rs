//! progress watch command implementation
//!
//! Subscribes to the change notifier (local writes plus the file watcher) and
//! prints one line per observed change. With `--json` each line is a compact
//! JSON event.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::model::Collection;
use crate::notifier::ChangeNotifier;
use crate::output::OutputOptions;
use crate::storage::Storage;

use super::todo::ProgressReport;

pub const EVENT_SCHEMA_VERSION: &str = "progress.event.v1";

/// Options for `progress watch`
pub struct WatchOptions {
    pub count: Option<usize>,
    pub timeout: Option<u64>,
    pub output: OutputOptions,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
enum WatchEventKind {
    Snapshot,
    Changed,
}

#[derive(Serialize)]
struct WatchEvent {
    schema_version: &'static str,
    event: WatchEventKind,
    timestamp: DateTime<Utc>,
    data: ProgressReport,
}

pub fn run(storage: &Storage, options: WatchOptions) -> Result<()> {
    storage.ensure_dirs()?;
    let notifier = ChangeNotifier::new(storage.store()).with_source(storage.watch_source())?;
    let store = notifier.store();

    let (tx, rx) = mpsc::channel();
    let _subscription = notifier.subscribe(move || {
        let _ = tx.send(());
    });

    let mut last = store.read();
    emit(&options, WatchEventKind::Snapshot, &last)?;

    let deadline = options
        .timeout
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut seen = 0usize;

    while options.count.map_or(true, |limit| seen < limit) {
        let received = match deadline {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
        }

        // Duplicate signals leave the snapshot pointer unchanged.
        let current = store.read();
        if Arc::ptr_eq(&current, &last) {
            continue;
        }
        last = current;
        seen += 1;
        emit(&options, WatchEventKind::Changed, &last)?;
    }

    Ok(())
}

fn emit(options: &WatchOptions, kind: WatchEventKind, todos: &Collection) -> Result<()> {
    let report = ProgressReport::build(todos);

    if options.output.json {
        let event = WatchEvent {
            schema_version: EVENT_SCHEMA_VERSION,
            event: kind,
            timestamp: Utc::now(),
            data: report,
        };
        println!("{}", serde_json::to_string(&event)?);
        return Ok(());
    }
    if options.output.quiet {
        return Ok(());
    }

    let label = match kind {
        WatchEventKind::Snapshot => "watching",
        WatchEventKind::Changed => "changed",
    };
    println!(
        "[{}] {label}: overall {}% across {} todos",
        Utc::now().format("%H:%M:%S"),
        report.overall,
        report.todos.len()
    );
    Ok(())
}
