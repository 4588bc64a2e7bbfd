// src/engine/mod.rs

//! The watch session engine.
//!
//! This module owns the background side of a watch session:
//! - the lifecycle state shared with the [`Watcher`](crate::Watcher) facade
//! - the orchestrator loop that fuses native events with catch-up scans
//!
//! The facade only talks to the loop through [`Session`]: it raises the abort
//! signal, wakes the loop, and reads the published settings and state.

pub mod orchestrator;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::settings::WatcherSettings;
use crate::types::AbortSignal;

pub use orchestrator::Orchestrator;

/// Lifecycle of one watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    NotStarted,
    /// Probing the native source and taking the baseline snapshot.
    Initializing,
    Running,
    Stopping,
    Stopped,
}

impl WatchState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WatchState::NotStarted,
            1 => WatchState::Initializing,
            2 => WatchState::Running,
            3 => WatchState::Stopping,
            _ => WatchState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WatchState::NotStarted => 0,
            WatchState::Initializing => 1,
            WatchState::Running => 2,
            WatchState::Stopping => 3,
            WatchState::Stopped => 4,
        }
    }
}

/// State shared between the facade and the orchestrator thread.
#[derive(Debug)]
pub struct Session {
    state: AtomicU8,
    settings: Mutex<Option<WatcherSettings>>,
    abort: AbortSignal,
    wake: Notify,
}

impl Session {
    pub fn new(abort: AbortSignal) -> Self {
        Self {
            state: AtomicU8::new(WatchState::NotStarted.as_u8()),
            settings: Mutex::new(None),
            abort,
            wake: Notify::new(),
        }
    }

    pub fn state(&self) -> WatchState {
        WatchState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: WatchState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    pub fn settings(&self) -> Option<WatcherSettings> {
        *self.settings.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn publish_settings(&self, settings: WatcherSettings) {
        *self.settings.lock().unwrap_or_else(|e| e.into_inner()) = Some(settings);
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    /// Ask the loop to exit at its next check.
    pub fn request_stop(&self) {
        self.abort.abort();
        self.wake.notify_one();
    }

    pub fn stop_requested(&self) -> bool {
        self.abort.is_aborted()
    }

    pub(crate) async fn woken(&self) {
        self.wake.notified().await
    }
}
