//! Native event sources for tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dirwatch::cache::{diff, Snapshot};
use dirwatch::errors::{DirwatchError, Result};
use dirwatch::fs::{FileSystem, RealFileSystem};
use dirwatch::native::{NativeEvent, NativeEventSource, NativeSender};
use dirwatch::{AbortSignal, ErrorSink};
use tracing::{debug, trace};

/// Starts fine and never reports anything.
#[derive(Debug, Default)]
pub struct SilentSource {
    starts: Arc<AtomicUsize>,
}

impl SilentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counter of `start` calls, readable after the source is moved.
    pub fn start_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.starts)
    }
}

impl NativeEventSource for SilentSource {
    fn start(&mut self, _root: &Path, _sink: NativeSender) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {}
}

#[derive(Debug, Default)]
struct ManualState {
    sink: Option<NativeSender>,
    root: Option<PathBuf>,
    starts: usize,
    stops: usize,
}

/// Source driven by the test through a [`ManualHandle`].
#[derive(Debug, Default)]
pub struct ManualSource {
    state: Arc<Mutex<ManualState>>,
    fail_start: bool,
    needs_restart: Arc<AtomicBool>,
}

/// Test side of a [`ManualSource`].
#[derive(Debug, Clone)]
pub struct ManualHandle {
    state: Arc<Mutex<ManualState>>,
    needs_restart: Arc<AtomicBool>,
}

impl ManualSource {
    pub fn new() -> (Self, ManualHandle) {
        let source = Self::default();
        let handle = ManualHandle {
            state: Arc::clone(&source.state),
            needs_restart: Arc::clone(&source.needs_restart),
        };
        (source, handle)
    }

    /// A source whose `start` always fails.
    pub fn failing() -> (Self, ManualHandle) {
        let (mut source, handle) = Self::new();
        source.fail_start = true;
        (source, handle)
    }
}

impl NativeEventSource for ManualSource {
    fn start(&mut self, root: &Path, sink: NativeSender) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.starts += 1;
        if self.fail_start {
            return Err(DirwatchError::Native("manual source refused to start".into()));
        }
        state.sink = Some(sink);
        state.root = Some(root.to_path_buf());
        self.needs_restart.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.sink.take().is_some() {
            state.stops += 1;
        }
    }

    fn needs_restart(&self) -> bool {
        self.needs_restart.load(Ordering::SeqCst)
    }
}

impl ManualHandle {
    /// Deliver `event`. Returns false when the source is not running.
    pub fn send(&self, event: NativeEvent) -> bool {
        let state = self.state.lock().unwrap();
        match &state.sink {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().sink.is_some()
    }

    /// Root passed to the most recent `start`.
    pub fn root(&self) -> Option<PathBuf> {
        self.state.lock().unwrap().root.clone()
    }

    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }

    pub fn request_restart(&self) {
        self.needs_restart.store(true, Ordering::SeqCst);
    }
}

/// A native source that reports every change kind by rescanning the tree
/// on a short interval from its own thread.
///
/// It behaves like a fully capable platform source, which lets tests drive
/// the evented code paths without depending on the host's notification API.
#[derive(Debug)]
pub struct ScanningSource {
    fs: Arc<dyn FileSystem>,
    interval: Duration,
    worker: Option<(AbortSignal, JoinHandle<()>)>,
}

impl ScanningSource {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            interval: Duration::from_millis(5),
            worker: None,
        }
    }

    /// Scans the real filesystem.
    pub fn real() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl NativeEventSource for ScanningSource {
    fn start(&mut self, root: &Path, sink: NativeSender) -> Result<()> {
        self.stop();

        let abort = AbortSignal::new();
        let quiet = ErrorSink::new(|_, _| {});
        let baseline = Snapshot::take(self.fs.as_ref(), root, &abort, &quiet)?;

        let fs = Arc::clone(&self.fs);
        let root = root.to_path_buf();
        let interval = self.interval;
        let worker_abort = abort.clone();
        let handle = thread::Builder::new()
            .name("scanning-source".to_string())
            .spawn(move || {
                let mut previous = baseline;
                while !worker_abort.is_aborted() {
                    thread::sleep(interval);
                    let fresh = match Snapshot::take(fs.as_ref(), &root, &worker_abort, &quiet) {
                        Ok(fresh) => fresh,
                        Err(err) => {
                            trace!(?root, error = %err, "scanning source skipped a pass");
                            continue;
                        }
                    };
                    let changes = diff(&previous, &fresh, fs.as_ref());
                    let events = changes
                        .directories_deleted
                        .into_iter()
                        .map(NativeEvent::DirectoryDeleted)
                        .chain(changes.directories_created.into_iter().map(NativeEvent::DirectoryCreated))
                        .chain(changes.files_deleted.into_iter().map(NativeEvent::FileDeleted))
                        .chain(changes.files_created.into_iter().map(NativeEvent::FileCreated))
                        .chain(changes.files_changed.into_iter().map(NativeEvent::FileChanged));
                    for event in events {
                        if sink.send(event).is_err() {
                            return;
                        }
                    }
                    previous = fresh;
                }
            })
            .map_err(|e| DirwatchError::Native(e.to_string()))?;

        self.worker = Some((abort, handle));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some((abort, handle)) = self.worker.take() {
            abort.abort();
            let _ = handle.join();
        }
    }
}

impl Drop for ScanningSource {
    fn drop(&mut self) {
        self.stop();
    }
}

type ReadyFn = dyn Fn(&Path) -> bool + Send + Sync;
type ScriptFn = dyn Fn(&Path) -> Vec<NativeEvent> + Send + Sync;

/// A native source that replays a fixed list of events once the watched
/// root reaches a given state.
///
/// Useful when the exact event stream matters more than what the host
/// would deliver, such as a source that never reports one half of a rename.
pub struct ScriptedSource {
    ready: Arc<ReadyFn>,
    script: Arc<ScriptFn>,
    worker: Option<(AbortSignal, JoinHandle<()>)>,
}

impl ScriptedSource {
    /// `script` builds the events from the root once `ready(root)` holds.
    pub fn new(
        ready: impl Fn(&Path) -> bool + Send + Sync + 'static,
        script: impl Fn(&Path) -> Vec<NativeEvent> + Send + Sync + 'static,
    ) -> Self {
        Self {
            ready: Arc::new(ready),
            script: Arc::new(script),
            worker: None,
        }
    }
}

impl std::fmt::Debug for ScriptedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedSource")
            .field("running", &self.worker.is_some())
            .finish()
    }
}

impl NativeEventSource for ScriptedSource {
    fn start(&mut self, root: &Path, sink: NativeSender) -> Result<()> {
        self.stop();

        let abort = AbortSignal::new();
        let worker_abort = abort.clone();
        let ready = Arc::clone(&self.ready);
        let script = Arc::clone(&self.script);
        let root = root.to_path_buf();
        let handle = thread::Builder::new()
            .name("scripted-source".to_string())
            .spawn(move || {
                while !ready(&root) {
                    if worker_abort.is_aborted() {
                        return;
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                let events = script(&root);
                debug!(?root, events = events.len(), "replaying scripted events");
                for event in events {
                    if sink.send(event).is_err() {
                        return;
                    }
                }
            })
            .map_err(|e| DirwatchError::Native(e.to_string()))?;

        self.worker = Some((abort, handle));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some((abort, handle)) = self.worker.take() {
            abort.abort();
            let _ = handle.join();
        }
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.stop();
    }
}
