// src/cache/snapshot.rs

//! Recursive listing of a watched tree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::cache::record::FileRecord;
use crate::errors::{DirwatchError, Result};
use crate::fs::{DirEntry, EntryKind, FileSystem};
use crate::types::{AbortSignal, ErrorSink};

pub type DirectorySet = BTreeSet<PathBuf>;
pub type FileSet = BTreeMap<PathBuf, FileRecord>;

/// Directories and file records of a root at one instant.
///
/// The root itself is not a member of `directories`.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub directories: DirectorySet,
    pub files: FileSet,
    /// Directories below the root whose listing failed during this scan.
    /// Their previous contents are unknown rather than gone.
    pub unreadable: BTreeSet<PathBuf>,
}

impl Snapshot {
    /// Scan `root` recursively.
    ///
    /// Fails only if the root cannot be listed or `abort` is raised. Errors
    /// below the root go to `errors` and the walk carries on with siblings.
    pub fn take(
        fs: &dyn FileSystem,
        root: &Path,
        abort: &AbortSignal,
        errors: &ErrorSink,
    ) -> Result<Snapshot> {
        let mut snapshot = Snapshot::default();

        let entries = fs
            .read_dir(root)
            .map_err(|e| DirwatchError::Other(e.context(format!("listing root {:?}", root))))?;
        let mut scanner = Scanner {
            fs,
            abort,
            errors,
            snapshot: &mut snapshot,
        };
        scanner.visit_entries(root, entries)?;

        debug!(
            root = ?root,
            directories = snapshot.directories.len(),
            files = snapshot.files.len(),
            unreadable = snapshot.unreadable.len(),
            "snapshot taken"
        );
        Ok(snapshot)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.directories.contains(path) || self.files.contains_key(path)
    }

    /// True if `path` lies beneath a directory this scan could not list.
    pub fn is_under_unreadable(&self, path: &Path) -> bool {
        self.unreadable
            .iter()
            .any(|dir| path != dir && path.starts_with(dir))
    }
}

struct Scanner<'a> {
    fs: &'a dyn FileSystem,
    abort: &'a AbortSignal,
    errors: &'a ErrorSink,
    snapshot: &'a mut Snapshot,
}

impl Scanner<'_> {
    fn check_abort(&self) -> Result<()> {
        if self.abort.is_aborted() {
            return Err(DirwatchError::Aborted);
        }
        Ok(())
    }

    fn visit_dir(&mut self, dir: &Path) -> Result<()> {
        self.check_abort()?;
        match self.fs.read_dir(dir) {
            Ok(entries) => self.visit_entries(dir, entries),
            Err(err) => {
                self.snapshot.unreadable.insert(dir.to_path_buf());
                self.errors.report(dir, &DirwatchError::Other(err));
                Ok(())
            }
        }
    }

    fn visit_entries(
        &mut self,
        dir: &Path,
        entries: Vec<anyhow::Result<DirEntry>>,
    ) -> Result<()> {
        let mut subdirs = Vec::new();

        for entry in entries {
            self.check_abort()?;
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.errors.report(dir, &DirwatchError::Other(err));
                    continue;
                }
            };
            match entry.kind {
                EntryKind::Directory => {
                    self.snapshot.directories.insert(entry.path.clone());
                    subdirs.push(entry.path);
                }
                EntryKind::File => {
                    let record = FileRecord::new(entry.path.clone(), dir);
                    // Prime now so the snapshot reflects this instant.
                    record.fingerprint(self.fs);
                    trace!(path = ?entry.path, "scanned file");
                    self.snapshot.files.insert(entry.path, record);
                }
            }
        }

        for sub in subdirs {
            self.visit_dir(&sub)?;
        }
        Ok(())
    }
}
