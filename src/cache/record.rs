// src/cache/record.rs

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::UNIX_EPOCH;

use tracing::trace;

use crate::fs::{FileStat, FileSystem};

/// Identity and cheap content fingerprint of one file.
///
/// Two records with the same `path` are the same file, whatever their
/// fingerprints.
#[derive(Debug, Clone)]
pub struct FileRecord {
    path: PathBuf,
    parent: PathBuf,
    fingerprint: OnceLock<u64>,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, parent: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            parent: parent.into(),
            fingerprint: OnceLock::new(),
        }
    }

    /// Record for `path`, with the parent taken from the path itself.
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::new(path, parent)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parent(&self) -> &Path {
        &self.parent
    }

    /// Fingerprint, stat-ing the file on first access.
    ///
    /// A file that vanished or cannot be stat'ed fingerprints as `0`.
    pub fn fingerprint(&self, fs: &dyn FileSystem) -> u64 {
        *self.fingerprint.get_or_init(|| match fs.stat(&self.path) {
            Ok(stat) => fingerprint_of(&stat),
            Err(err) => {
                trace!(path = ?self.path, error = %err, "stat failed; zero fingerprint");
                0
            }
        })
    }

    /// Fingerprint if it has already been computed.
    pub fn cached_fingerprint(&self) -> Option<u64> {
        self.fingerprint.get().copied()
    }

    pub fn set_fingerprint(&mut self, value: u64) {
        self.fingerprint = OnceLock::from(value);
    }
}

impl PartialEq for FileRecord {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FileRecord {}

impl Hash for FileRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

/// Combine size and modification time; size alone when the time is missing.
pub fn fingerprint_of(stat: &FileStat) -> u64 {
    let mut hash: u64 = 17;
    hash = hash.wrapping_mul(23).wrapping_add(stat.len);
    if let Some(nanos) = stat
        .modified
        .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
    {
        hash = hash.wrapping_mul(23).wrapping_add(nanos);
    }
    hash
}
