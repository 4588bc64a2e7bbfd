use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dirwatch::{ChangeHandlers, ChangeKind};

use crate::wait_until;

/// Records every callback invocation, in order.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<(ChangeKind, PathBuf)>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers that push into this recorder.
    pub fn handlers(&self) -> ChangeHandlers {
        let slot = |kind: ChangeKind| {
            let events = Arc::clone(&self.events);
            move |path: &Path| events.lock().unwrap().push((kind, path.to_path_buf()))
        };
        ChangeHandlers::from_fns(
            slot(ChangeKind::DirectoryCreated),
            slot(ChangeKind::DirectoryDeleted),
            slot(ChangeKind::FileCreated),
            slot(ChangeKind::FileChanged),
            slot(ChangeKind::FileDeleted),
        )
    }

    pub fn events(&self) -> Vec<(ChangeKind, PathBuf)> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// How many times `kind` was reported for `path`.
    pub fn count(&self, kind: ChangeKind, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, p)| *k == kind && p == path)
            .count()
    }

    /// Position of the first `kind` event for `path`.
    pub fn position(&self, kind: ChangeKind, path: impl AsRef<Path>) -> Option<usize> {
        let path = path.as_ref();
        self.events
            .lock()
            .unwrap()
            .iter()
            .position(|(k, p)| *k == kind && p == path)
    }

    /// Block until `kind` has been reported for `path`, up to `timeout`.
    pub fn wait_for(&self, kind: ChangeKind, path: impl AsRef<Path>, timeout: Duration) -> bool {
        let path = path.as_ref();
        wait_until(timeout, || self.count(kind, path) > 0)
    }
}
