// src/settings.rs

use std::time::Duration;

/// Smallest poll interval the watcher will use.
pub const MIN_POLL_FREQUENCY_MS: u64 = 100;

/// What the native event source was observed to deliver, plus the poll
/// interval calibrated for this root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherSettings {
    pub can_detect_evented_directory_create: bool,
    pub can_detect_evented_directory_delete: bool,
    pub can_detect_evented_directory_rename: bool,
    pub can_detect_evented_file_create: bool,
    pub can_detect_evented_file_change: bool,
    pub can_detect_evented_file_delete: bool,
    pub can_detect_evented_file_rename: bool,
    poll_frequency_ms: u64,
}

impl WatcherSettings {
    pub fn new(
        can_detect_directory_create: bool,
        can_detect_directory_delete: bool,
        can_detect_directory_rename: bool,
        can_detect_file_create: bool,
        can_detect_file_change: bool,
        can_detect_file_delete: bool,
        can_detect_file_rename: bool,
    ) -> Self {
        Self {
            can_detect_evented_directory_create: can_detect_directory_create,
            can_detect_evented_directory_delete: can_detect_directory_delete,
            can_detect_evented_directory_rename: can_detect_directory_rename,
            can_detect_evented_file_create: can_detect_file_create,
            can_detect_evented_file_change: can_detect_file_change,
            can_detect_evented_file_delete: can_detect_file_delete,
            can_detect_evented_file_rename: can_detect_file_rename,
            poll_frequency_ms: MIN_POLL_FREQUENCY_MS,
        }
    }

    /// Nothing is evented; every change comes from polling.
    pub fn polling_only(poll_frequency_ms: u64) -> Self {
        Self::new(false, false, false, false, false, false, false)
            .with_poll_frequency_ms(poll_frequency_ms)
    }

    /// Every change type is evented; scans only run after native activity.
    pub fn fully_evented(poll_frequency_ms: u64) -> Self {
        Self::new(true, true, true, true, true, true, true).with_poll_frequency_ms(poll_frequency_ms)
    }

    /// True unless all seven change types are delivered natively.
    pub fn continuous_polling(&self) -> bool {
        let supports_all = self.can_detect_evented_directory_create
            && self.can_detect_evented_directory_delete
            && self.can_detect_evented_directory_rename
            && self.can_detect_evented_file_create
            && self.can_detect_evented_file_change
            && self.can_detect_evented_file_delete
            && self.can_detect_evented_file_rename;
        !supports_all
    }

    pub fn poll_frequency_ms(&self) -> u64 {
        self.poll_frequency_ms
    }

    pub fn poll_frequency(&self) -> Duration {
        Duration::from_millis(self.poll_frequency_ms)
    }

    /// Set the poll interval; values below the floor are ignored.
    pub fn set_poll_frequency_ms(&mut self, milliseconds: u64) {
        if milliseconds > MIN_POLL_FREQUENCY_MS {
            self.poll_frequency_ms = milliseconds;
        }
    }

    pub fn with_poll_frequency_ms(mut self, milliseconds: u64) -> Self {
        self.set_poll_frequency_ms(milliseconds);
        self
    }
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self::polling_only(MIN_POLL_FREQUENCY_MS)
    }
}
