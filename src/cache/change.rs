// src/cache/change.rs

use std::path::{Path, PathBuf};

use crate::types::ChangeKind;

/// One observed change, carrying the absolute path it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingChange {
    DirectoryCreated(PathBuf),
    DirectoryDeleted(PathBuf),
    FileCreated(PathBuf),
    FileChanged(PathBuf),
    FileDeleted(PathBuf),
}

impl PendingChange {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match kind {
            ChangeKind::DirectoryCreated => PendingChange::DirectoryCreated(path),
            ChangeKind::DirectoryDeleted => PendingChange::DirectoryDeleted(path),
            ChangeKind::FileCreated => PendingChange::FileCreated(path),
            ChangeKind::FileChanged => PendingChange::FileChanged(path),
            ChangeKind::FileDeleted => PendingChange::FileDeleted(path),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            PendingChange::DirectoryCreated(_) => ChangeKind::DirectoryCreated,
            PendingChange::DirectoryDeleted(_) => ChangeKind::DirectoryDeleted,
            PendingChange::FileCreated(_) => ChangeKind::FileCreated,
            PendingChange::FileChanged(_) => ChangeKind::FileChanged,
            PendingChange::FileDeleted(_) => ChangeKind::FileDeleted,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            PendingChange::DirectoryCreated(p)
            | PendingChange::DirectoryDeleted(p)
            | PendingChange::FileCreated(p)
            | PendingChange::FileChanged(p)
            | PendingChange::FileDeleted(p) => p,
        }
    }
}
