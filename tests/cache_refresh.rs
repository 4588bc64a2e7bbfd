// tests/cache_refresh.rs

mod common;
use crate::common::{init_tracing, mock_cache, mock_root, p, ErrorLog, EventRecorder, ROOT};

use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dirwatch::cache::Cache;
use dirwatch::ChangeKind::*;
use dirwatch::{AbortSignal, ChangeHandlers};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn initialize_records_tree_without_reporting() -> TestResult {
    init_tracing();
    let fs = mock_root();
    fs.add_file(p("a.txt"), "a");
    fs.add_file(p("sub/b.txt"), "b");
    fs.add_dir(p("sub/empty"));

    let errors = ErrorLog::default();
    let cache = mock_cache(&fs, &errors);
    assert!(!cache.is_initialized());

    cache.initialize()?;

    assert!(cache.is_initialized());
    assert_eq!(cache.directory_count(), 2);
    assert_eq!(cache.file_count(), 2);
    assert!(cache.is_directory(&p("sub")));
    assert!(cache.is_file(&p("sub/b.txt")));
    assert!(!cache.is_directory(&p(""))); // root is not a member
    assert_eq!(errors.len(), 0);
    Ok(())
}

#[test]
fn refresh_reports_each_change_kind_in_order() -> TestResult {
    init_tracing();
    let fs = mock_root();
    fs.add_file(p("a.txt"), "a");
    fs.add_file(p("sub/b.txt"), "b");

    let errors = ErrorLog::default();
    let cache = mock_cache(&fs, &errors);
    cache.initialize()?;

    fs.add_file(p("new.txt"), "n");
    fs.append(p("a.txt"), b" more");
    fs.remove(p("sub"));
    fs.add_dir(p("fresh"));

    let recorder = EventRecorder::new();
    assert!(cache.refresh_from_disk(&recorder.handlers()));

    assert_eq!(
        recorder.events(),
        vec![
            (DirectoryDeleted, p("sub")),
            (DirectoryCreated, p("fresh")),
            (FileDeleted, p("sub/b.txt")),
            (FileCreated, p("new.txt")),
            (FileChanged, p("a.txt")),
        ]
    );
    Ok(())
}

#[test]
fn second_refresh_without_changes_reports_nothing() -> TestResult {
    let fs = mock_root();
    fs.add_file(p("a.txt"), "a");
    let cache = mock_cache(&fs, &ErrorLog::default());
    cache.initialize()?;

    fs.add_file(p("b.txt"), "b");
    let recorder = EventRecorder::new();
    assert!(cache.refresh_from_disk(&recorder.handlers()));
    assert!(!cache.refresh_from_disk(&recorder.handlers()));
    assert_eq!(recorder.len(), 1);
    Ok(())
}

#[test]
fn touch_with_same_length_is_a_change() -> TestResult {
    let fs = mock_root();
    fs.add_file(p("a.txt"), "same");
    let cache = mock_cache(&fs, &ErrorLog::default());
    cache.initialize()?;

    // Same length, later modification time.
    fs.add_file(p("a.txt"), "SAME");

    let recorder = EventRecorder::new();
    assert!(cache.refresh_from_disk(&recorder.handlers()));
    assert_eq!(recorder.events(), vec![(FileChanged, p("a.txt"))]);
    Ok(())
}

#[test]
fn directory_replaced_by_file_is_deleted_before_file_is_created() -> TestResult {
    let fs = mock_root();
    fs.add_file(p("x/inner.txt"), "i");
    let cache = mock_cache(&fs, &ErrorLog::default());
    cache.initialize()?;

    fs.remove(p("x"));
    fs.add_file(p("x"), "now a file");

    let recorder = EventRecorder::new();
    assert!(cache.refresh_from_disk(&recorder.handlers()));

    let deleted = recorder.position(DirectoryDeleted, p("x")).ok_or("no dir delete")?;
    let created = recorder.position(FileCreated, p("x")).ok_or("no file create")?;
    assert!(deleted < created);
    assert_eq!(recorder.count(FileDeleted, p("x/inner.txt")), 1);
    assert!(cache.is_file(&p("x")));
    assert!(!cache.is_directory(&p("x")));
    Ok(())
}

#[test]
fn file_replaced_by_directory_is_deleted_before_directory_is_created() -> TestResult {
    let fs = mock_root();
    fs.add_file(p("y"), "file");
    let cache = mock_cache(&fs, &ErrorLog::default());
    cache.initialize()?;

    fs.remove(p("y"));
    fs.add_dir(p("y"));

    let recorder = EventRecorder::new();
    assert!(cache.refresh_from_disk(&recorder.handlers()));
    assert_eq!(
        recorder.events(),
        vec![(FileDeleted, p("y")), (DirectoryCreated, p("y"))]
    );
    assert!(cache.is_directory(&p("y")));
    assert!(!cache.is_file(&p("y")));
    Ok(())
}

#[test]
fn recreated_directory_reports_old_contents_deleted_before_new_created() -> TestResult {
    let fs = mock_root();
    fs.add_file(p("d/old.txt"), "old");
    let cache = mock_cache(&fs, &ErrorLog::default());
    cache.initialize()?;

    fs.remove(p("d"));
    fs.add_file(p("d/new.txt"), "new");

    let recorder = EventRecorder::new();
    assert!(cache.refresh_from_disk(&recorder.handlers()));
    assert_eq!(
        recorder.events(),
        vec![(FileDeleted, p("d/old.txt")), (FileCreated, p("d/new.txt"))]
    );
    Ok(())
}

#[test]
fn unreadable_directory_keeps_its_contents() -> TestResult {
    init_tracing();
    let fs = mock_root();
    fs.add_file(p("locked/a.txt"), "a");
    fs.add_file(p("locked/deep/b.txt"), "b");
    fs.add_file(p("open.txt"), "o");

    let errors = ErrorLog::default();
    let cache = mock_cache(&fs, &errors);
    cache.initialize()?;

    fs.fail_read_dir(p("locked"));
    let recorder = EventRecorder::new();
    assert!(!cache.refresh_from_disk(&recorder.handlers()));
    assert!(recorder.is_empty());
    assert!(cache.is_file(&p("locked/deep/b.txt")));
    assert!(errors.entries().iter().any(|(path, _)| *path == p("locked")));

    fs.clear_failures();
    fs.remove(p("locked/a.txt"));
    assert!(cache.refresh_from_disk(&recorder.handlers()));
    assert_eq!(recorder.events(), vec![(FileDeleted, p("locked/a.txt"))]);
    Ok(())
}

#[test]
fn unlistable_root_is_retried_until_it_recovers() -> TestResult {
    init_tracing();
    let fs = mock_root();
    let errors = ErrorLog::default();
    let cache = mock_cache(&fs, &errors);
    cache.initialize()?;

    fs.fail_read_dir(ROOT);
    fs.add_file(p("late.txt"), "l");
    let healer = {
        let fs = fs.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            fs.clear_failures();
        })
    };

    let recorder = EventRecorder::new();
    assert!(cache.refresh_from_disk(&recorder.handlers()));
    healer.join().map_err(|_| "healer panicked")?;

    assert_eq!(recorder.events(), vec![(FileCreated, p("late.txt"))]);
    assert!(errors.len() >= 1);
    Ok(())
}

#[test]
fn abort_ends_a_retrying_refresh_without_reporting() -> TestResult {
    let fs = mock_root();
    let abort = AbortSignal::new();
    let errors = ErrorLog::default();
    let cache = Cache::new(Arc::new(fs.clone()), ROOT, abort.clone(), errors.sink())
        .with_retry_delay(Duration::from_millis(20));
    cache.initialize()?;

    fs.fail_read_dir(ROOT);
    fs.add_file(p("never.txt"), "n");
    let aborter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(80));
        abort.abort();
    });

    let recorder = EventRecorder::new();
    assert!(!cache.refresh_from_disk(&recorder.handlers()));
    aborter.join().map_err(|_| "aborter panicked")?;
    assert!(recorder.is_empty());
    assert!(!cache.is_file(&p("never.txt")));
    Ok(())
}

#[test]
fn initialize_fails_only_when_aborted() {
    let fs = mock_root();
    let abort = AbortSignal::new();
    abort.abort();
    let cache = Cache::new(
        Arc::new(fs),
        ROOT,
        abort,
        ErrorLog::default().sink(),
    );

    assert!(matches!(
        cache.initialize(),
        Err(dirwatch::DirwatchError::Aborted)
    ));
    assert!(!cache.is_initialized());
}

#[test]
fn callbacks_may_query_the_cache() -> TestResult {
    let fs = mock_root();
    let cache = Arc::new(mock_cache(&fs, &ErrorLog::default()));
    cache.initialize()?;
    fs.add_file(p("a.txt"), "a");

    let seen = Arc::new(std::sync::Mutex::new(None));
    let handlers = {
        let cache = Arc::clone(&cache);
        let seen = Arc::clone(&seen);
        ChangeHandlers::new().on_file_created(move |path| {
            *seen.lock().unwrap() = Some(cache.is_file(path));
        })
    };

    assert!(cache.refresh_from_disk(&handlers));
    assert_eq!(*seen.lock().unwrap(), Some(true));
    Ok(())
}
