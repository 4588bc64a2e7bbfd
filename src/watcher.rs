// src/watcher.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::config::WatchOptions;
use crate::engine::{Orchestrator, Session, WatchState};
use crate::errors::{DirwatchError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::native::{NativeEventSource, NotifySource};
use crate::settings::WatcherSettings;
use crate::types::{AbortSignal, ChangeHandlers, ErrorSink};

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Watches one directory tree and reports changes through callbacks.
///
/// ```no_run
/// use dirwatch::{ChangeHandlers, Watcher};
///
/// let handlers = ChangeHandlers::new()
///     .on_file_created(|p| println!("File created {}", p.display()))
///     .on_file_deleted(|p| println!("File deleted {}", p.display()));
/// let mut watcher = Watcher::new(".", handlers)?;
/// watcher.watch()?;
/// // ...
/// watcher.stop_watching();
/// # Ok::<(), dirwatch::DirwatchError>(())
/// ```
///
/// Callbacks run on the session thread, or on the caller's thread for
/// [`Watcher::force_refresh`].
pub struct Watcher {
    root: PathBuf,
    handlers: ChangeHandlers,
    errors: ErrorSink,
    options: WatchOptions,
    preset: Option<WatcherSettings>,
    fs: Arc<dyn FileSystem>,
    native: Option<Box<dyn NativeEventSource>>,
    session: Option<Arc<Session>>,
    cache: Option<Arc<Cache>>,
    thread: Option<JoinHandle<Box<dyn NativeEventSource>>>,
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("root", &self.root)
            .field("state", &self.state())
            .field("settings", &self.settings())
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Watcher for `root` on the real filesystem.
    pub fn new(root: impl AsRef<Path>, handlers: ChangeHandlers) -> Result<Self> {
        Self::with_file_system(root, handlers, Arc::new(RealFileSystem))
    }

    /// Watcher that scans through `fs`.
    ///
    /// `root` must be an existing directory; it is canonicalized once and
    /// every reported path starts with it.
    pub fn with_file_system(
        root: impl AsRef<Path>,
        handlers: ChangeHandlers,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let root = root.as_ref();
        if !fs.exists(root) {
            return Err(DirwatchError::RootNotFound(root.to_path_buf()));
        }
        if !fs.is_dir(root) {
            return Err(DirwatchError::NotADirectory(root.to_path_buf()));
        }
        let root = fs.canonicalize(root)?;

        Ok(Self {
            root,
            handlers,
            errors: ErrorSink::default(),
            options: WatchOptions::default(),
            preset: None,
            fs,
            native: None,
            session: None,
            cache: None,
            thread: None,
        })
    }

    pub fn with_options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Use these settings instead of running the capability probe.
    pub fn with_settings(mut self, settings: WatcherSettings) -> Self {
        self.preset = Some(settings);
        self
    }

    pub fn with_native_source(mut self, source: Box<dyn NativeEventSource>) -> Self {
        self.native = Some(source);
        self
    }

    /// Receive scan, native and probe errors. Takes effect at the next
    /// [`Watcher::watch`].
    pub fn set_error_notifier(&mut self, f: impl Fn(&Path, &DirwatchError) + Send + Sync + 'static) {
        self.errors = ErrorSink::new(f);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start watching in the background. Returns immediately.
    pub fn watch(&mut self) -> Result<()> {
        if self.thread.is_some() {
            return Err(DirwatchError::AlreadyWatching);
        }

        let abort = AbortSignal::new();
        let session = Arc::new(Session::new(abort.clone()));
        let cache = Arc::new(
            Cache::new(Arc::clone(&self.fs), self.root.clone(), abort, self.errors.clone())
                .with_retry_delay(self.options.scan_retry_delay()),
        );
        let native = self.native.take().unwrap_or_else(|| {
            Box::new(
                NotifySource::new()
                    .with_restart_on_new_directory(self.options.restart_on_new_directory),
            )
        });

        let orchestrator = Orchestrator::new(
            Arc::clone(&cache),
            native,
            self.handlers.clone(),
            self.errors.clone(),
            self.options.clone(),
            self.preset,
            Arc::clone(&session),
        );
        let handle = orchestrator
            .spawn()
            .map_err(|e| DirwatchError::io(&self.root, e))?;

        info!(root = ?self.root, "watch started");
        self.session = Some(session);
        self.cache = Some(cache);
        self.thread = Some(handle);
        Ok(())
    }

    /// Stop the session and wait for its thread to exit. Idempotent.
    ///
    /// The wait is bounded by `stop_timeout_ms`; a thread that does not exit
    /// in time is detached and reported with a warning.
    pub fn stop_watching(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        if let Some(session) = &self.session {
            session.request_stop();
        }

        let deadline = Instant::now() + self.options.stop_timeout();
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(STOP_POLL_INTERVAL);
        }

        if handle.is_finished() {
            match handle.join() {
                Ok(native) => self.native = Some(native),
                Err(_) => warn!("watch session thread panicked"),
            }
        } else {
            warn!(
                timeout = ?self.options.stop_timeout(),
                "watch session did not stop in time; detaching"
            );
        }
        self.cache = None;
        info!(root = ?self.root, "watch stopped");
    }

    /// Run a reconciliation pass now, on the calling thread.
    ///
    /// Returns whether anything changed; `false` when no session is running.
    pub fn force_refresh(&self) -> bool {
        let (Some(cache), Some(session)) = (&self.cache, &self.session) else {
            return false;
        };
        if session.state() != WatchState::Running {
            debug!(state = ?session.state(), "force_refresh ignored");
            return false;
        }
        cache.refresh_from_disk(&self.handlers)
    }

    /// Settings of the current (or last) session, once calibrated.
    pub fn settings(&self) -> Option<WatcherSettings> {
        self.session.as_ref().and_then(|s| s.settings())
    }

    /// Block until the session has published its settings, up to `timeout`.
    pub fn wait_for_settings(&self, timeout: Duration) -> Option<WatcherSettings> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(settings) = self.settings() {
                return Some(settings);
            }
            if Instant::now() >= deadline || self.session.is_none() {
                return None;
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }
    }

    pub fn state(&self) -> WatchState {
        self.session
            .as_ref()
            .map(|s| s.state())
            .unwrap_or(WatchState::NotStarted)
    }

    /// Block until the session is running, up to `timeout`.
    pub fn wait_until_running(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.state() {
                WatchState::Running => return true,
                WatchState::Stopping | WatchState::Stopped => return false,
                WatchState::NotStarted if self.session.is_none() => return false,
                // The session thread has not picked up yet.
                WatchState::NotStarted | WatchState::Initializing => {}
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop_watching();
    }
}
