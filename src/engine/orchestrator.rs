// src/engine/orchestrator.rs

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::cache::Cache;
use crate::config::WatchOptions;
use crate::errors::DirwatchError;
use crate::native::{native_channel, NativeEvent, NativeEventSource, NativeSender};
use crate::probe::CapabilityProbe;
use crate::settings::WatcherSettings;
use crate::types::{ChangeHandlers, ErrorSink};

use super::{Session, WatchState};

/// Drives one watch session on a dedicated thread.
///
/// The orchestrator owns the native source for the lifetime of the session
/// and hands it back when the thread exits, so the facade can start another
/// session with the same source.
pub struct Orchestrator {
    cache: Arc<Cache>,
    native: Box<dyn NativeEventSource>,
    handlers: ChangeHandlers,
    errors: ErrorSink,
    options: WatchOptions,
    preset: Option<WatcherSettings>,
    session: Arc<Session>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("root", &self.cache.root())
            .field("native", &self.native)
            .field("preset", &self.preset)
            .finish_non_exhaustive()
    }
}

/// One step of the main loop.
enum Step {
    Wake,
    Native(Option<NativeEvent>),
    Tick,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<Cache>,
        native: Box<dyn NativeEventSource>,
        handlers: ChangeHandlers,
        errors: ErrorSink,
        options: WatchOptions,
        preset: Option<WatcherSettings>,
        session: Arc<Session>,
    ) -> Self {
        Self {
            cache,
            native,
            handlers,
            errors,
            options,
            preset,
            session,
        }
    }

    /// Start the session thread. The thread returns the native source.
    pub fn spawn(self) -> io::Result<JoinHandle<Box<dyn NativeEventSource>>> {
        thread::Builder::new()
            .name("dirwatch-orchestrator".to_string())
            .spawn(move || self.run())
    }

    /// Run the session to completion on the current thread.
    pub fn run(self) -> Box<dyn NativeEventSource> {
        let session = Arc::clone(&self.session);
        let root = self.cache.root().to_path_buf();
        let errors = self.errors.clone();

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
        {
            Ok(rt) => rt,
            Err(err) => {
                errors.report(&root, &DirwatchError::io(&root, err));
                session.set_state(WatchState::Stopped);
                return self.native;
            }
        };

        let native = runtime.block_on(self.run_session());
        session.set_state(WatchState::Stopped);
        info!(root = ?root, "watch session stopped");
        native
    }

    async fn run_session(self) -> Box<dyn NativeEventSource> {
        let Orchestrator {
            cache,
            mut native,
            handlers,
            errors,
            options,
            preset,
            session,
        } = self;

        session.set_state(WatchState::Initializing);

        let settings = match preset {
            Some(settings) => settings,
            None if options.skip_probe => WatcherSettings::polling_only(
                CapabilityProbe::new(options.clone()).calibrate_poll_frequency(
                    cache.file_system().as_ref(),
                    cache.root(),
                    session.abort_signal(),
                ),
            ),
            None => CapabilityProbe::new(options.clone()).run(
                native.as_mut(),
                cache.file_system().as_ref(),
                cache.root(),
                session.abort_signal(),
            ),
        };
        session.publish_settings(settings);

        if cache.initialize().is_err() {
            debug!("stopped before the baseline snapshot completed");
            session.set_state(WatchState::Stopping);
            return native;
        }

        let (tx, mut rx) = native_channel();
        let started = match native.start(cache.root(), tx.clone()) {
            Ok(()) => true,
            Err(err) => {
                errors.report(cache.root(), &err);
                warn!("native source unavailable; falling back to polling");
                false
            }
        };
        let mut native = NativeGuard {
            source: Some(native),
            running: started,
        };

        let mut reactor = Reactor {
            cache: &cache,
            handlers: &handlers,
            errors: &errors,
            poll: settings.poll_frequency(),
            continuous: settings.continuous_polling() || !started,
        };
        session.set_state(WatchState::Running);
        info!(
            root = ?cache.root(),
            continuous_polling = reactor.continuous,
            poll_frequency_ms = settings.poll_frequency_ms(),
            "watch session running"
        );

        let mut ticker = time::interval(reactor.poll + options.loop_margin());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Catch whatever changed between the baseline and the native start.
        let mut deadline = Some(Instant::now() + reactor.poll);

        loop {
            if session.stop_requested() {
                break;
            }

            let step = tokio::select! {
                _ = session.woken() => Step::Wake,
                event = rx.recv() => Step::Native(event),
                _ = ticker.tick() => Step::Tick,
            };

            match step {
                Step::Wake => continue,
                Step::Native(Some(event)) => {
                    reactor.on_native(event);
                    deadline = Some(Instant::now() + reactor.poll);
                }
                // `tx` is held above, so the channel cannot close.
                Step::Native(None) => continue,
                Step::Tick => {
                    if native.needs_restart() {
                        if !native.restart(cache.root(), &tx, &errors) {
                            warn!("native source lost; falling back to polling");
                            reactor.continuous = true;
                        }
                        deadline = Some(Instant::now() + reactor.poll);
                    }
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        deadline = reactor.catch_up();
                    }
                }
            }
        }

        session.set_state(WatchState::Stopping);
        debug!("orchestrator loop exiting");
        native.into_inner()
    }
}

/// Borrowed view used by the loop to react to events and ticks.
struct Reactor<'a> {
    cache: &'a Cache,
    handlers: &'a ChangeHandlers,
    errors: &'a ErrorSink,
    poll: std::time::Duration,
    continuous: bool,
}

impl Reactor<'_> {
    fn on_native(&self, event: NativeEvent) {
        if let NativeEvent::Error { path, message } = &event {
            let path = path.as_deref().unwrap_or(self.cache.root());
            self.errors
                .report(path, &DirwatchError::Native(message.clone()));
            return;
        }

        let Some(change) = event.to_change(|p| self.cache.is_directory(p)) else {
            return;
        };
        if !self.is_inside_root(change.path()) {
            trace!(path = ?change.path(), "ignoring event outside the watched tree");
            return;
        }

        if self.cache.patch(&change) {
            debug!(kind = ?change.kind(), path = ?change.path(), "native change");
            self.handlers.notify(change.kind(), change.path());
        } else {
            trace!(?change, "native change already known");
        }
    }

    /// Full reconciliation. Returns the next deadline.
    fn catch_up(&self) -> Option<Instant> {
        let changed = self.cache.refresh_from_disk(self.handlers);
        if changed || self.continuous {
            Some(Instant::now() + self.poll)
        } else {
            None
        }
    }

    fn is_inside_root(&self, path: &Path) -> bool {
        let root = self.cache.root();
        path != root && path.starts_with(root)
    }
}

/// Stops the native source on every exit path of the loop.
struct NativeGuard {
    source: Option<Box<dyn NativeEventSource>>,
    running: bool,
}

impl NativeGuard {
    fn needs_restart(&self) -> bool {
        self.running && self.source.as_ref().is_some_and(|s| s.needs_restart())
    }

    /// Stop and start again. Returns whether the source is running.
    fn restart(&mut self, root: &Path, tx: &NativeSender, errors: &ErrorSink) -> bool {
        let Some(source) = self.source.as_mut() else {
            return false;
        };
        debug!("restarting native source");
        source.stop();
        if let Err(err) = source.start(root, tx.clone()) {
            errors.report(root, &err);
            self.running = false;
        }
        self.running
    }

    fn into_inner(mut self) -> Box<dyn NativeEventSource> {
        let mut source = self
            .source
            .take()
            .unwrap_or_else(|| Box::new(crate::native::NotifySource::new()));
        source.stop();
        source
    }
}

impl Drop for NativeGuard {
    fn drop(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.stop();
        }
    }
}
