#![allow(dead_code)]

pub use dirwatch_test_utils::{
    init_tracing, wait_until, EventRecorder, ManualHandle, ManualSource, ScanningSource,
    ScriptedSource, SilentSource,
};

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dirwatch::cache::Cache;
use dirwatch::errors::DirwatchError;
use dirwatch::fs::mock::MockFileSystem;
use dirwatch::{AbortSignal, ErrorSink};

pub const ROOT: &str = "/w";
pub const WAIT: Duration = Duration::from_secs(5);

/// Absolute path under the mock root.
pub fn p(rel: &str) -> PathBuf {
    PathBuf::from(ROOT).join(rel)
}

/// Mock filesystem holding an empty root directory.
pub fn mock_root() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_dir(ROOT);
    fs
}

/// Reported errors, as `(path, message)`.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: Arc<Mutex<Vec<(PathBuf, String)>>>,
}

impl ErrorLog {
    pub fn sink(&self) -> ErrorSink {
        let entries = Arc::clone(&self.entries);
        ErrorSink::new(move |path, err: &DirwatchError| {
            entries
                .lock()
                .unwrap()
                .push((path.to_path_buf(), err.to_string()))
        })
    }

    pub fn entries(&self) -> Vec<(PathBuf, String)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// Cache over `fs` rooted at [`ROOT`], with a short retry delay.
pub fn mock_cache(fs: &MockFileSystem, errors: &ErrorLog) -> Cache {
    Cache::new(Arc::new(fs.clone()), ROOT, AbortSignal::new(), errors.sink())
        .with_retry_delay(Duration::from_millis(20))
}
