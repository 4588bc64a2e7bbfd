// src/native/notify_source.rs

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, trace};

use crate::errors::Result;
use crate::native::{NativeEvent, NativeEventSource, NativeSender};

/// Native source backed by `notify`'s recommended watcher for the platform.
///
/// Dropping the source (or calling [`NativeEventSource::stop`]) stops the
/// underlying watcher.
pub struct NotifySource {
    watcher: Option<RecommendedWatcher>,
    restart_on_new_directory: bool,
    needs_restart: Arc<AtomicBool>,
}

impl std::fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySource")
            .field("running", &self.watcher.is_some())
            .field("restart_on_new_directory", &self.restart_on_new_directory)
            .finish()
    }
}

impl NotifySource {
    pub fn new() -> Self {
        Self {
            watcher: None,
            restart_on_new_directory: false,
            needs_restart: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Ask to be re-armed whenever a directory appears, for backends that do
    /// not extend a recursive watch to new subdirectories on their own.
    pub fn with_restart_on_new_directory(mut self, enabled: bool) -> Self {
        self.restart_on_new_directory = enabled;
        self
    }
}

impl Default for NotifySource {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEventSource for NotifySource {
    fn start(&mut self, root: &Path, sink: NativeSender) -> Result<()> {
        self.stop();
        self.needs_restart.store(false, Ordering::SeqCst);

        let needs_restart = Arc::clone(&self.needs_restart);
        let restart_on_new_directory = self.restart_on_new_directory;

        // Called synchronously by notify on its own thread.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let events = match res {
                    Ok(event) => {
                        trace!(?event, "received notify event");
                        translate_event(&event)
                    }
                    Err(err) => vec![NativeEvent::Error {
                        path: err.paths.first().cloned(),
                        message: err.to_string(),
                    }],
                };
                for event in events {
                    if restart_on_new_directory
                        && matches!(event, NativeEvent::DirectoryCreated(_))
                    {
                        needs_restart.store(true, Ordering::SeqCst);
                    }
                    if sink.send(event).is_err() {
                        // Receiver gone: the session is shutting down.
                        return;
                    }
                }
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        info!("native watcher started on {:?}", root);

        self.watcher = Some(watcher);
        Ok(())
    }

    fn stop(&mut self) {
        if self.watcher.take().is_some() {
            debug!("native watcher stopped");
        }
    }

    fn needs_restart(&self) -> bool {
        self.needs_restart.load(Ordering::SeqCst)
    }
}

/// Map one `notify` event onto zero or more native events.
///
/// Access events carry no change and are dropped. Paths whose kind is not
/// stated are classified by looking at the disk; a created path that is
/// already gone becomes [`NativeEvent::Other`].
pub fn translate_event(event: &Event) -> Vec<NativeEvent> {
    let paths = &event.paths;
    match event.kind {
        EventKind::Create(CreateKind::Folder) => {
            paths.iter().cloned().map(NativeEvent::DirectoryCreated).collect()
        }
        EventKind::Create(CreateKind::File) => {
            paths.iter().cloned().map(NativeEvent::FileCreated).collect()
        }
        EventKind::Create(_) => paths.iter().map(|p| created_at(p)).collect(),

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.iter().cloned().map(NativeEvent::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.iter().map(|p| created_at(p)).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match paths.as_slice() {
            [from, to] => vec![NativeEvent::Removed(from.clone()), created_at(to)],
            _ => paths.iter().map(|p| appeared_or_removed(p)).collect(),
        },
        EventKind::Modify(ModifyKind::Name(_)) => {
            paths.iter().map(|p| appeared_or_removed(p)).collect()
        }
        EventKind::Modify(_) => paths
            .iter()
            .map(|p| {
                if p.is_file() {
                    NativeEvent::FileChanged(p.clone())
                } else {
                    NativeEvent::Other
                }
            })
            .collect(),

        EventKind::Remove(RemoveKind::Folder) => {
            paths.iter().cloned().map(NativeEvent::DirectoryDeleted).collect()
        }
        EventKind::Remove(RemoveKind::File) => {
            paths.iter().cloned().map(NativeEvent::FileDeleted).collect()
        }
        EventKind::Remove(_) => paths.iter().cloned().map(NativeEvent::Removed).collect(),

        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            paths.iter().cloned().map(NativeEvent::FileChanged).collect()
        }
        EventKind::Access(_) => Vec::new(),

        EventKind::Any | EventKind::Other => vec![NativeEvent::Other],
    }
}

fn created_at(path: &Path) -> NativeEvent {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => NativeEvent::DirectoryCreated(path.to_path_buf()),
        Ok(_) => NativeEvent::FileCreated(path.to_path_buf()),
        Err(_) => NativeEvent::Other,
    }
}

fn appeared_or_removed(path: &Path) -> NativeEvent {
    if std::fs::symlink_metadata(path).is_ok() {
        created_at(path)
    } else {
        NativeEvent::Removed(PathBuf::from(path))
    }
}
