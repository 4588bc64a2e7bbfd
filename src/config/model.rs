// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::settings::MIN_POLL_FREQUENCY_MS;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// probe_timeout_ms = 3000
/// scan_retry_delay_ms = 250
/// restart_on_new_directory = false
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchOptions,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub watch: WatchOptions,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(watch: WatchOptions) -> Self {
        Self { watch }
    }
}

/// `[watch]` section: tuning knobs for the probe and the watch loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// How long the capability probe waits for the native source.
    ///
    /// On slow storage the scripted probe can time out and under-report
    /// capabilities; raising this trades startup time for accuracy.
    pub probe_timeout_ms: u64,

    /// How often the probe checks whether every capability was observed.
    pub probe_poll_interval_ms: u64,

    /// Lower bound of the calibrated poll interval.
    pub min_poll_frequency_ms: u64,

    /// Poll interval = `poll_scale` x duration of one scan of the root.
    pub poll_scale: u32,

    /// Added to the poll interval to get the loop cadence.
    pub loop_margin_ms: u64,

    /// Pause before retrying a scan whose root could not be listed.
    pub scan_retry_delay_ms: u64,

    /// How long `stop_watching` waits for the background thread.
    pub stop_timeout_ms: u64,

    /// Re-arm the native source whenever a directory is created.
    pub restart_on_new_directory: bool,

    /// Skip calibration and poll continuously.
    pub skip_probe: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 3000,
            probe_poll_interval_ms: 10,
            min_poll_frequency_ms: MIN_POLL_FREQUENCY_MS,
            poll_scale: 4,
            loop_margin_ms: 20,
            scan_retry_delay_ms: 250,
            stop_timeout_ms: 5000,
            restart_on_new_directory: false,
            skip_probe: false,
        }
    }
}

impl WatchOptions {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn probe_poll_interval(&self) -> Duration {
        Duration::from_millis(self.probe_poll_interval_ms)
    }

    pub fn loop_margin(&self) -> Duration {
        Duration::from_millis(self.loop_margin_ms)
    }

    pub fn scan_retry_delay(&self) -> Duration {
        Duration::from_millis(self.scan_retry_delay_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
