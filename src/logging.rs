// src/logging.rs

//! Logging setup for the `dirwatch` binary.
//!
//! The filter comes from, in order:
//! 1. `--log-level` on the command line
//! 2. `DIRWATCH_LOG`, which takes full `EnvFilter` directives
//!    (e.g. `debug` or `dirwatch=trace,notify=warn`)
//! 3. `info`
//!
//! Output goes to stderr; stdout is reserved for change lines.

use anyhow::{anyhow, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "DIRWATCH_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(cli_level, env.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

/// Resolve the filter from the CLI flag and the environment value.
///
/// Unparseable environment directives fall back to `info`.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::default().add_directive(LevelFilter::from(level).into());
    }
    env.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
