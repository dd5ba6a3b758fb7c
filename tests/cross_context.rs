use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use progress::medium::{FileMedium, SharedMemory};
use progress::notifier::{ChangeNotifier, FileWatchSource, MemorySource};
use progress::store::{ProgressStore, DEFAULT_KEY};

const WAIT: Duration = Duration::from_secs(10);

#[test]
fn memory_contexts_see_each_others_writes() -> Result<(), Box<dyn std::error::Error>> {
    let shared = SharedMemory::new();
    let context_a = shared.context();
    let context_b = shared.context();

    let store_a = Arc::new(ProgressStore::new(context_a.clone(), DEFAULT_KEY));
    let store_b = Arc::new(ProgressStore::new(context_b.clone(), DEFAULT_KEY));
    let notifier_a = ChangeNotifier::new(Arc::clone(&store_a)).with_source(MemorySource::new(context_a))?;
    let notifier_b = ChangeNotifier::new(Arc::clone(&store_b)).with_source(MemorySource::new(context_b))?;

    let (tx_a, rx_a) = mpsc::channel();
    let _sub_a = notifier_a.subscribe(move || {
        let _ = tx_a.send(());
    });
    let (tx_b, rx_b) = mpsc::channel();
    let _sub_b = notifier_b.subscribe(move || {
        let _ = tx_b.send(());
    });

    let todo = store_a.add_todo("Shared")?;

    // A hears its own write locally; B hears it from the medium.
    rx_a.recv_timeout(WAIT)?;
    rx_b.recv_timeout(WAIT)?;
    assert_eq!(store_b.read()[0].id, todo.id);
    assert!(rx_a.try_recv().is_err());

    store_b.reset();
    rx_a.recv_timeout(WAIT)?;
    rx_b.recv_timeout(WAIT)?;
    assert!(store_a.read().is_empty());
    Ok(())
}

#[test]
fn dropping_the_notifier_stops_foreign_signals() -> Result<(), Box<dyn std::error::Error>> {
    let shared = SharedMemory::new();
    let context = shared.context();
    let store = Arc::new(ProgressStore::new(context.clone(), DEFAULT_KEY));
    let notifier = ChangeNotifier::new(Arc::clone(&store)).with_source(MemorySource::new(context))?;
    assert_eq!(notifier.source_names(), vec!["memory"]);

    let (tx, rx) = mpsc::channel();
    let sub = notifier.subscribe(move || {
        let _ = tx.send(());
    });
    drop(notifier);

    let writer = ProgressStore::new(shared.context(), DEFAULT_KEY);
    writer.add_todo("Unheard")?;
    assert!(rx.try_recv().is_err());

    sub.unsubscribe();
    Ok(())
}

#[test]
fn file_watch_reports_writes_from_another_store() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let medium = FileMedium::new(dir.path());
    let watched = Arc::new(ProgressStore::new(medium.clone(), DEFAULT_KEY));
    let writer = ProgressStore::new(medium.clone(), DEFAULT_KEY);

    let source = FileWatchSource::new(medium.path_for(DEFAULT_KEY)).with_debounce(Duration::from_millis(50));
    let notifier = ChangeNotifier::new(Arc::clone(&watched)).with_source(source)?;
    assert_eq!(notifier.source_names(), vec!["file-watch"]);

    let (tx, rx) = mpsc::channel();
    let _sub = notifier.subscribe(move || {
        let _ = tx.send(());
    });

    let before = watched.read();
    let todo = writer.add_todo("From another process")?;

    rx.recv_timeout(WAIT)?;
    let after = watched.read();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after[0].id, todo.id);
    Ok(())
}

#[test]
fn file_watch_still_reports_after_an_early_read() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let medium = FileMedium::new(dir.path());
    let watched = Arc::new(ProgressStore::new(medium.clone(), DEFAULT_KEY));
    watched.add_todo("Local")?;
    let writer = ProgressStore::new(medium.clone(), DEFAULT_KEY);

    let source = FileWatchSource::new(medium.path_for(DEFAULT_KEY)).with_debounce(Duration::from_millis(300));
    let notifier = ChangeNotifier::new(Arc::clone(&watched)).with_source(source)?;

    let (tx, rx) = mpsc::channel();
    let _sub = notifier.subscribe(move || {
        let _ = tx.send(());
    });

    writer.add_todo("Remote")?;
    // Pick the change up before the debounce window closes.
    thread::sleep(Duration::from_millis(20));
    assert_eq!(watched.read().len(), 2);

    rx.recv_timeout(WAIT)?;
    Ok(())
}
