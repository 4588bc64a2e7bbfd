// src/types.rs

//! Small shared types: change kinds, the user callback slots, the error sink
//! and the cooperative abort flag.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::errors::DirwatchError;

/// The five kinds of change reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    DirectoryCreated,
    DirectoryDeleted,
    FileCreated,
    FileChanged,
    FileDeleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::DirectoryCreated => "Dir created",
            ChangeKind::DirectoryDeleted => "Dir deleted",
            ChangeKind::FileCreated => "File created",
            ChangeKind::FileChanged => "File changed",
            ChangeKind::FileDeleted => "File deleted",
        };
        f.write_str(s)
    }
}

/// A user callback receiving the absolute path of the changed entry.
pub type PathCallback = Arc<dyn Fn(&Path) + Send + Sync>;

/// The five callback slots supplied by the caller.
///
/// Unset slots are ignored; the change is still recorded by the cache.
#[derive(Clone, Default)]
pub struct ChangeHandlers {
    directory_created: Option<PathCallback>,
    directory_deleted: Option<PathCallback>,
    file_created: Option<PathCallback>,
    file_changed: Option<PathCallback>,
    file_deleted: Option<PathCallback>,
}

impl fmt::Debug for ChangeHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeHandlers")
            .field("directory_created", &self.directory_created.is_some())
            .field("directory_deleted", &self.directory_deleted.is_some())
            .field("file_created", &self.file_created.is_some())
            .field("file_changed", &self.file_changed.is_some())
            .field("file_deleted", &self.file_deleted.is_some())
            .finish()
    }
}

impl ChangeHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// All five slots at once, in the order directory created, directory
    /// deleted, file created, file changed, file deleted.
    pub fn from_fns<A, B, C, D, E>(
        directory_created: A,
        directory_deleted: B,
        file_created: C,
        file_changed: D,
        file_deleted: E,
    ) -> Self
    where
        A: Fn(&Path) + Send + Sync + 'static,
        B: Fn(&Path) + Send + Sync + 'static,
        C: Fn(&Path) + Send + Sync + 'static,
        D: Fn(&Path) + Send + Sync + 'static,
        E: Fn(&Path) + Send + Sync + 'static,
    {
        Self::new()
            .on_directory_created(directory_created)
            .on_directory_deleted(directory_deleted)
            .on_file_created(file_created)
            .on_file_changed(file_changed)
            .on_file_deleted(file_deleted)
    }

    pub fn on_directory_created(mut self, f: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.directory_created = Some(Arc::new(f));
        self
    }

    pub fn on_directory_deleted(mut self, f: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.directory_deleted = Some(Arc::new(f));
        self
    }

    pub fn on_file_created(mut self, f: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.file_created = Some(Arc::new(f));
        self
    }

    pub fn on_file_changed(mut self, f: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.file_changed = Some(Arc::new(f));
        self
    }

    pub fn on_file_deleted(mut self, f: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.file_deleted = Some(Arc::new(f));
        self
    }

    /// Invoke the slot matching `kind`, if one is set.
    pub fn notify(&self, kind: ChangeKind, path: &Path) {
        let slot = match kind {
            ChangeKind::DirectoryCreated => &self.directory_created,
            ChangeKind::DirectoryDeleted => &self.directory_deleted,
            ChangeKind::FileCreated => &self.file_created,
            ChangeKind::FileChanged => &self.file_changed,
            ChangeKind::FileDeleted => &self.file_deleted,
        };
        if let Some(callback) = slot {
            callback(path);
        }
    }
}

/// Receives scan, native-source and probe errors.
#[derive(Clone)]
pub struct ErrorSink {
    inner: Arc<dyn Fn(&Path, &DirwatchError) + Send + Sync>,
}

impl ErrorSink {
    pub fn new(f: impl Fn(&Path, &DirwatchError) + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(f) }
    }

    /// Sink that only logs.
    pub fn logging() -> Self {
        Self::new(|path, err| warn!(path = ?path, error = %err, "dirwatch error"))
    }

    pub fn report(&self, path: &Path, err: &DirwatchError) {
        (self.inner)(path, err);
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::logging()
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink").finish_non_exhaustive()
    }
}

/// Cooperative cancellation flag shared by scans and the orchestrator loop.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal nobody will ever raise.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
