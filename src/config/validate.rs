// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, WatchOptions};
use crate::errors::{DirwatchError, Result};
use crate::settings::MIN_POLL_FREQUENCY_MS;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DirwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_options(&raw.watch)?;
        Ok(ConfigFile::new_unchecked(raw.watch))
    }
}

/// Check value ranges of a `[watch]` section.
pub fn validate_options(opts: &WatchOptions) -> Result<()> {
    ensure_positive("probe_timeout_ms", opts.probe_timeout_ms)?;
    ensure_positive("probe_poll_interval_ms", opts.probe_poll_interval_ms)?;
    ensure_positive("poll_scale", u64::from(opts.poll_scale))?;
    ensure_positive("stop_timeout_ms", opts.stop_timeout_ms)?;

    if opts.probe_poll_interval_ms > opts.probe_timeout_ms {
        return Err(DirwatchError::ConfigError(format!(
            "[watch].probe_poll_interval_ms ({}) must not exceed probe_timeout_ms ({})",
            opts.probe_poll_interval_ms, opts.probe_timeout_ms
        )));
    }

    if opts.min_poll_frequency_ms < MIN_POLL_FREQUENCY_MS {
        return Err(DirwatchError::ConfigError(format!(
            "[watch].min_poll_frequency_ms must be >= {} (got {})",
            MIN_POLL_FREQUENCY_MS, opts.min_poll_frequency_ms
        )));
    }

    Ok(())
}

fn ensure_positive(key: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(DirwatchError::ConfigError(format!(
            "[watch].{key} must be >= 1 (got 0)"
        )));
    }
    Ok(())
}
