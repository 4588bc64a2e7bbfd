// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

pub mod mock;

/// Kind of a directory entry as seen by a scan.
///
/// Symlinks are not followed and are reported as files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// One entry returned by [`FileSystem::read_dir`]. Paths are full paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// The subset of file metadata used for fingerprinting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub len: u64,
    /// `None` when the platform or filesystem cannot report it.
    pub modified: Option<SystemTime>,
}

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    /// List a directory.
    ///
    /// The outer error means the directory itself could not be listed; an
    /// inner error means a single entry could not be inspected.
    fn read_dir(&self, path: &Path) -> Result<Vec<Result<DirEntry>>>;

    /// Stat a single file without following symlinks.
    fn stat(&self, path: &Path) -> Result<FileStat>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn is_file(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| !m.is_dir())
            .unwrap_or(false)
    }

    fn is_dir(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("canonicalizing {:?}", path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<Result<DirEntry>>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry
                .with_context(|| format!("reading entry in {:?}", path))
                .and_then(|entry| {
                    let entry_path = entry.path();
                    let file_type = entry
                        .file_type()
                        .with_context(|| format!("reading file type of {:?}", entry_path))?;
                    let kind = if file_type.is_dir() {
                        EntryKind::Directory
                    } else {
                        EntryKind::File
                    };
                    Ok(DirEntry {
                        path: entry_path,
                        kind,
                    })
                });
            entries.push(entry);
        }
        Ok(entries)
    }

    fn stat(&self, path: &Path) -> Result<FileStat> {
        let meta = fs::symlink_metadata(path).with_context(|| format!("stat {:?}", path))?;
        Ok(FileStat {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}
