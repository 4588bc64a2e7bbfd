// src/lib.rs

//! Cross-platform directory change notifications.
//!
//! A [`Watcher`] reports directory create/delete and file
//! create/change/delete under one root. It combines whatever the platform's
//! native notification source delivers with periodic scans of the tree, so
//! changes the native source misses are still reported, once each.

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod native;
pub mod probe;
pub mod settings;
pub mod types;
pub mod watcher;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

pub use crate::config::WatchOptions;
pub use crate::engine::WatchState;
pub use crate::errors::DirwatchError;
pub use crate::native::{NativeEvent, NativeEventSource, NotifySource};
pub use crate::settings::WatcherSettings;
pub use crate::types::{AbortSignal, ChangeHandlers, ChangeKind, ErrorSink};
pub use crate::watcher::Watcher;

use crate::cli::{spawn_command_reader, CliArgs, Command};
use crate::config::loader::load_and_validate;

const SETTINGS_POLL: Duration = Duration::from_millis(20);

/// High-level entry point used by `main.rs`.
///
/// Loads the optional config, starts a watcher printing one line per change,
/// prints the calibrated strategy, then reads commands from stdin until
/// `quit`, EOF or Ctrl-C.
pub async fn run(args: CliArgs) -> Result<()> {
    let root = match &args.root {
        Some(root) => PathBuf::from(root),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };

    let mut options = match &args.config {
        Some(path) => load_and_validate(path)?.watch,
        None => WatchOptions::default(),
    };
    if args.no_probe {
        options.skip_probe = true;
    }
    debug!(?options, "effective watch options");

    let handlers = ChangeHandlers::new()
        .on_directory_created(|p| println!("{} {}", ChangeKind::DirectoryCreated, p.display()))
        .on_directory_deleted(|p| println!("{} {}", ChangeKind::DirectoryDeleted, p.display()))
        .on_file_created(|p| println!("{} {}", ChangeKind::FileCreated, p.display()))
        .on_file_changed(|p| println!("{} {}", ChangeKind::FileChanged, p.display()))
        .on_file_deleted(|p| println!("{} {}", ChangeKind::FileDeleted, p.display()));

    let mut watcher = Watcher::new(&root, handlers)?.with_options(options);
    watcher.set_error_notifier(|path, err| eprintln!("{}\n{err}", path.display()));
    watcher.watch()?;

    let settings = loop {
        if let Some(settings) = watcher.settings() {
            break Some(settings);
        }
        if watcher.state() == WatchState::Stopped {
            break None;
        }
        tokio::time::sleep(SETTINGS_POLL).await;
    };
    if let Some(settings) = settings {
        print_strategy(&settings);
    }

    let mut commands = spawn_command_reader(std::io::BufReader::new(std::io::stdin()))
        .context("cannot read from stdin")?;
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Refresh) => {
                    let changed = watcher.force_refresh();
                    info!(changed, "forced refresh");
                }
                Some(Command::Quit) | None => break,
                Some(Command::Unknown(other)) => debug!(command = %other, "unknown command"),
            },
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                }
                break;
            }
        }
    }

    tokio::task::spawn_blocking(move || watcher.stop_watching())
        .await
        .context("watcher shutdown task failed")?;
    Ok(())
}

fn print_strategy(settings: &WatcherSettings) {
    println!("Will poll continuously: {}", settings.continuous_polling());
    println!("Poll frequency: {} milliseconds", settings.poll_frequency_ms());
    println!(
        "Evented directory create: {}",
        settings.can_detect_evented_directory_create
    );
    println!(
        "Evented directory delete: {}",
        settings.can_detect_evented_directory_delete
    );
    println!(
        "Evented directory rename: {}",
        settings.can_detect_evented_directory_rename
    );
    println!("Evented file create: {}", settings.can_detect_evented_file_create);
    println!("Evented file change: {}", settings.can_detect_evented_file_change);
    println!("Evented file delete: {}", settings.can_detect_evented_file_delete);
    println!("Evented file rename: {}", settings.can_detect_evented_file_rename);
}
