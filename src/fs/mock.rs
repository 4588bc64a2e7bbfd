// src/fs/mock.rs

use super::{DirEntry, EntryKind, FileStat, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: u64 },
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Logical clock used as the modification time of written files.
    clock: u64,
    failing_dirs: HashSet<PathBuf>,
    failing_stats: HashSet<PathBuf>,
}

/// In-memory filesystem for deterministic scans.
///
/// Every write advances a logical clock, so two writes of the same length
/// still produce different modification times. Listing or stat failures can
/// be injected per path.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        ensure_dir_entry(&mut state.entries, path.as_ref());
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.lock();
        state.clock += 1;
        let modified = state.clock;
        state.entries.insert(
            path.clone(),
            MockEntry::File {
                content: content.into(),
                modified,
            },
        );

        if let Some(parent) = path.parent() {
            ensure_dir_entry(&mut state.entries, parent);
            link_child(&mut state.entries, parent, &path);
        }
    }

    /// Append to an existing file, or create it.
    pub fn append(&self, path: impl AsRef<Path>, extra: &[u8]) {
        let path = path.as_ref();
        let existing = {
            let state = self.lock();
            match state.entries.get(path) {
                Some(MockEntry::File { content, .. }) => content.clone(),
                _ => Vec::new(),
            }
        };
        let mut content = existing;
        content.extend_from_slice(extra);
        self.add_file(path, content);
    }

    /// Remove a file or a whole directory subtree.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut state = self.lock();
        state
            .entries
            .retain(|p, _| p != path && !p.starts_with(path));
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if let Some(MockEntry::Dir(children)) = state.entries.get_mut(parent) {
                let name = name.to_string_lossy();
                children.retain(|c| *c != name);
            }
        }
    }

    /// Make `read_dir` fail for this directory until cleared.
    pub fn fail_read_dir(&self, path: impl AsRef<Path>) {
        self.lock().failing_dirs.insert(path.as_ref().to_path_buf());
    }

    /// Make `stat` fail for this file until cleared.
    pub fn fail_stat(&self, path: impl AsRef<Path>) {
        self.lock().failing_stats.insert(path.as_ref().to_path_buf());
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_dirs.clear();
        state.failing_stats.clear();
    }
}

fn ensure_dir_entry(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if entries.contains_key(path) {
        return;
    }
    entries.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
    if let Some(parent) = path.parent() {
        if parent != path && !parent.as_os_str().is_empty() {
            ensure_dir_entry(entries, parent);
            link_child(entries, parent, path);
        }
    }
}

fn link_child(entries: &mut HashMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
    if let Some(MockEntry::Dir(children)) = entries.get_mut(parent) {
        if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
            if !children.iter().any(|c| c == name) {
                children.push(name.to_string());
            }
        }
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::Dir(_)))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // In mock, we just return the path as is, assuming absolute paths are used in tests
        if self.exists(path) {
            Ok(path.to_path_buf())
        } else {
            Err(anyhow!("No such file or directory: {:?}", path))
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<Result<DirEntry>>> {
        let state = self.lock();
        if state.failing_dirs.contains(path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        match state.entries.get(path) {
            Some(MockEntry::Dir(children)) => Ok(children
                .iter()
                .map(|name| {
                    let child = path.join(name);
                    match state.entries.get(&child) {
                        Some(MockEntry::Dir(_)) => Ok(DirEntry {
                            path: child,
                            kind: EntryKind::Directory,
                        }),
                        Some(MockEntry::File { .. }) => Ok(DirEntry {
                            path: child,
                            kind: EntryKind::File,
                        }),
                        None => Err(anyhow!("Dangling entry: {:?}", child)),
                    }
                })
                .collect()),
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }

    fn stat(&self, path: &Path) -> Result<FileStat> {
        let state = self.lock();
        if state.failing_stats.contains(path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        match state.entries.get(path) {
            Some(MockEntry::File { content, modified }) => Ok(FileStat {
                len: content.len() as u64,
                modified: Some(SystemTime::UNIX_EPOCH + Duration::from_nanos(*modified)),
            }),
            Some(MockEntry::Dir(_)) => Ok(FileStat {
                len: 0,
                modified: None,
            }),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }
}
