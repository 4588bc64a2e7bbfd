// src/cache/mod.rs

//! Snapshot cache: the single shared view of the watched tree.
//!
//! The cache turns two scans into a minimal list of changes
//! ([`Cache::refresh_from_disk`]) and absorbs single changes reported by a
//! native source ([`Cache::patch`]). Both paths use test-and-set updates on
//! the same collections, so a change already recorded by one path is not
//! reported again by the other.
//!
//! Directories and files are guarded by separate mutexes, always taken in
//! that order. Whole refresh passes are serialized by a third gate mutex.

pub mod change;
pub mod record;
pub mod snapshot;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::errors::{DirwatchError, Result};
use crate::fs::FileSystem;
use crate::types::{AbortSignal, ChangeHandlers, ErrorSink};

pub use change::PendingChange;
pub use record::{fingerprint_of, FileRecord};
pub use snapshot::{DirectorySet, FileSet, Snapshot};

const ABORT_CHECK_SLICE: Duration = Duration::from_millis(10);

/// Paths that differ between two snapshots, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub directories_deleted: Vec<PathBuf>,
    pub directories_created: Vec<PathBuf>,
    pub files_deleted: Vec<PathBuf>,
    pub files_created: Vec<PathBuf>,
    pub files_changed: Vec<PathBuf>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.directories_deleted.is_empty()
            && self.directories_created.is_empty()
            && self.files_deleted.is_empty()
            && self.files_created.is_empty()
            && self.files_changed.is_empty()
    }
}

/// Diff `current` against `fresh`.
///
/// Paths beneath a directory `fresh` could not list are never reported as
/// deleted.
pub fn diff(current: &Snapshot, fresh: &Snapshot, fs: &dyn FileSystem) -> SnapshotDiff {
    let (directories_deleted, directories_created) =
        diff_directories(&current.directories, fresh);
    let (files_deleted, files_created, changed) = diff_files(&current.files, fresh, fs);
    SnapshotDiff {
        directories_deleted,
        directories_created,
        files_deleted,
        files_created,
        files_changed: changed.into_iter().map(|(path, _)| path).collect(),
    }
}

fn diff_directories(current: &DirectorySet, fresh: &Snapshot) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let deleted = current
        .iter()
        .filter(|p| !fresh.directories.contains(*p) && !fresh.is_under_unreadable(p))
        .cloned()
        .collect();
    let created = fresh
        .directories
        .iter()
        .filter(|p| !current.contains(*p))
        .cloned()
        .collect();
    (deleted, created)
}

type FileDiff = (Vec<PathBuf>, Vec<PathBuf>, Vec<(PathBuf, u64)>);

fn diff_files(current: &FileSet, fresh: &Snapshot, fs: &dyn FileSystem) -> FileDiff {
    let deleted = current
        .keys()
        .filter(|p| !fresh.files.contains_key(*p) && !fresh.is_under_unreadable(p))
        .cloned()
        .collect();

    let mut created = Vec::new();
    let mut changed = Vec::new();
    for (path, record) in fresh.files.iter() {
        match current.get(path) {
            None => created.push(path.clone()),
            Some(old) => {
                let new_fp = record.fingerprint(fs);
                if old.fingerprint(fs) != new_fp {
                    changed.push((path.clone(), new_fp));
                }
            }
        }
    }
    (deleted, created, changed)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The current snapshot of one watched root plus its synchronization.
#[derive(Debug)]
pub struct Cache {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    abort: AbortSignal,
    errors: ErrorSink,
    retry_delay: Duration,
    directories: Mutex<DirectorySet>,
    files: Mutex<FileSet>,
    refresh_gate: Mutex<()>,
    initialized: AtomicBool,
}

impl Cache {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        abort: AbortSignal,
        errors: ErrorSink,
    ) -> Self {
        Self {
            fs,
            root: root.into(),
            abort,
            errors,
            retry_delay: Duration::from_millis(250),
            directories: Mutex::new(DirectorySet::new()),
            files: Mutex::new(FileSet::new()),
            refresh_gate: Mutex::new(()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Delay between attempts when the root cannot be scanned.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Take the baseline snapshot. Emits nothing.
    ///
    /// Returns how long the successful scan took. Fails only with
    /// [`DirwatchError::Aborted`].
    pub fn initialize(&self) -> Result<Duration> {
        let _gate = lock(&self.refresh_gate);
        let (snapshot, elapsed) = self.scan_until_success().ok_or(DirwatchError::Aborted)?;

        *lock(&self.directories) = snapshot.directories;
        *lock(&self.files) = snapshot.files;
        self.initialized.store(true, Ordering::SeqCst);

        info!(root = ?self.root, took = ?elapsed, "cache initialized");
        Ok(elapsed)
    }

    pub fn is_directory(&self, path: &Path) -> bool {
        lock(&self.directories).contains(path)
    }

    pub fn is_file(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path)
    }

    pub fn directory_count(&self) -> usize {
        lock(&self.directories).len()
    }

    pub fn file_count(&self) -> usize {
        lock(&self.files).len()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Snapshot {
        let directories = lock(&self.directories).clone();
        let files = lock(&self.files).clone();
        Snapshot {
            directories,
            files,
            unreadable: Default::default(),
        }
    }

    /// Rescan the tree and report every effective change through `handlers`.
    ///
    /// Returns whether anything changed. Root scan failures are reported and
    /// retried until the scan succeeds or the abort signal is raised; an
    /// aborted refresh reports nothing and returns `false`.
    pub fn refresh_from_disk(&self, handlers: &ChangeHandlers) -> bool {
        let applied = {
            let _gate = lock(&self.refresh_gate);
            let Some((fresh, elapsed)) = self.scan_until_success() else {
                debug!(root = ?self.root, "refresh aborted");
                return false;
            };
            trace!(took = ?elapsed, "refresh scan finished");
            self.apply_fresh(&fresh)
        };

        for change in &applied {
            debug!(kind = ?change.kind(), path = ?change.path(), "refresh change");
            handlers.notify(change.kind(), change.path());
        }
        !applied.is_empty()
    }

    fn apply_fresh(&self, fresh: &Snapshot) -> Vec<PendingChange> {
        let fs = self.fs.as_ref();
        let mut applied = Vec::new();

        let mut dirs = lock(&self.directories);
        let (dirs_deleted, dirs_created) = diff_directories(&dirs, fresh);

        for path in dirs_deleted {
            if !fs.is_dir(&path) && dirs.remove(&path) {
                applied.push(PendingChange::DirectoryDeleted(path));
            }
        }

        let mut files = lock(&self.files);

        // A file replaced by a directory is deleted before the directory is
        // created.
        for path in dirs_created.iter() {
            if fs.is_dir(path) && files.remove(path).is_some() {
                applied.push(PendingChange::FileDeleted(path.clone()));
            }
        }

        for path in dirs_created {
            if fs.is_dir(&path) && !files.contains_key(&path) && dirs.insert(path.clone()) {
                applied.push(PendingChange::DirectoryCreated(path));
            }
        }
        drop(dirs);

        let (files_deleted, files_created, files_changed) = diff_files(&files, fresh, fs);

        for path in files_deleted {
            if !fs.is_file(&path) && files.remove(&path).is_some() {
                applied.push(PendingChange::FileDeleted(path));
            }
        }

        for path in files_created {
            if !fs.is_file(&path) || files.contains_key(&path) {
                continue;
            }
            if let Some(record) = fresh.files.get(&path) {
                files.insert(path.clone(), record.clone());
                applied.push(PendingChange::FileCreated(path));
            }
        }

        // A scanned fingerprint that no longer matches the disk is stale: a
        // native patch may already hold a newer one.
        for (path, scanned) in files_changed {
            let live = FileRecord::for_path(path.clone()).fingerprint(fs);
            if live != scanned {
                trace!(?path, "stale scan fingerprint skipped");
                continue;
            }
            if let Some(record) = files.get_mut(&path) {
                if record.fingerprint(fs) != live {
                    record.set_fingerprint(live);
                    applied.push(PendingChange::FileChanged(path));
                }
            }
        }

        applied
    }

    /// Apply one externally observed change without rescanning.
    ///
    /// Returns `false` when the cache already reflects the change (or the
    /// change contradicts what the cache knows), so the caller can drop a
    /// duplicate notification.
    pub fn patch(&self, change: &PendingChange) -> bool {
        if !self.is_initialized() {
            return false;
        }
        let fs = self.fs.as_ref();

        let applied = match change {
            PendingChange::DirectoryCreated(path) => {
                let mut dirs = lock(&self.directories);
                let files = lock(&self.files);
                !files.contains_key(path) && dirs.insert(path.clone())
            }
            PendingChange::DirectoryDeleted(path) => lock(&self.directories).remove(path),
            PendingChange::FileCreated(path) => {
                let dirs = lock(&self.directories);
                let mut files = lock(&self.files);
                if dirs.contains(path) || files.contains_key(path) {
                    false
                } else {
                    let record = FileRecord::for_path(path.clone());
                    record.fingerprint(fs);
                    files.insert(path.clone(), record);
                    true
                }
            }
            PendingChange::FileChanged(path) => {
                let mut files = lock(&self.files);
                match files.get_mut(path) {
                    // Gone already: the deletion will be reported instead.
                    Some(_) if !fs.is_file(path) => false,
                    Some(record) => {
                        let current = FileRecord::for_path(path.clone()).fingerprint(fs);
                        if record.fingerprint(fs) != current {
                            record.set_fingerprint(current);
                            true
                        } else {
                            false
                        }
                    }
                    None => false,
                }
            }
            PendingChange::FileDeleted(path) => lock(&self.files).remove(path).is_some(),
        };

        trace!(?change, applied, "patch");
        applied
    }

    fn scan_until_success(&self) -> Option<(Snapshot, Duration)> {
        loop {
            if self.abort.is_aborted() {
                return None;
            }
            let started = Instant::now();
            match Snapshot::take(self.fs.as_ref(), &self.root, &self.abort, &self.errors) {
                Ok(snapshot) => return Some((snapshot, started.elapsed())),
                Err(DirwatchError::Aborted) => return None,
                Err(err) => {
                    self.errors.report(&self.root, &err);
                    self.sleep_unless_aborted(self.retry_delay);
                }
            }
        }
    }

    fn sleep_unless_aborted(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while !self.abort.is_aborted() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(ABORT_CHECK_SLICE.min(deadline - now));
        }
    }
}
