// src/cli.rs

//! Command-line interface of the `dirwatch` binary.

use std::io::{self, BufRead};
use std::thread;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::level_filters::LevelFilter;

/// `dirwatch [ROOT] [--config PATH] [--log-level LEVEL] [--no-probe]`
///
/// Prints the calibrated strategy, then one line per change. Type `refresh`
/// to force a rescan; `quit` or end of input stops.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dirwatch",
    version,
    about = "Print directory and file changes under a directory tree.",
    long_about = None
)]
pub struct CliArgs {
    /// Directory to watch. Default: the current working directory.
    #[arg(value_name = "ROOT")]
    pub root: Option<String>,

    /// TOML file with a `[watch]` section.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Overrides `DIRWATCH_LOG`.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Skip the capability probe and poll continuously.
    #[arg(long)]
    pub no_probe: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

/// A line typed at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Refresh,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "refresh" => Command::Refresh,
            "quit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Read commands from `input` on a detached thread.
///
/// The channel closes at end of input or on a read error. A blocked read
/// never holds up runtime shutdown.
pub fn spawn_command_reader<R>(input: R) -> io::Result<UnboundedReceiver<Command>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name("dirwatch-stdin".into())
        .spawn(move || {
            for line in input.lines() {
                let Ok(line) = line else { break };
                if tx.send(Command::parse(&line)).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}
