// src/native/mod.rs

//! Native (OS push) change notifications.
//!
//! The core treats the native source as lossy: events may be dropped,
//! duplicated, or report a removed path without saying whether it was a file
//! or a directory. Everything it delivers is reconciled against the cache, and
//! periodic scans catch whatever it missed.
//!
//! Sources push tagged [`NativeEvent`]s into an unbounded channel, so
//! delivery never blocks the source's own notification thread.

pub mod notify_source;

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::cache::PendingChange;
use crate::errors::Result;

pub use notify_source::NotifySource;

/// One raw notification from a native source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    DirectoryCreated(PathBuf),
    DirectoryDeleted(PathBuf),
    FileCreated(PathBuf),
    FileChanged(PathBuf),
    FileDeleted(PathBuf),
    /// A path disappeared and the source cannot tell what it was.
    Removed(PathBuf),
    /// Activity that maps to no change kind; still proof the tree is moving.
    Other,
    Error {
        path: Option<PathBuf>,
        message: String,
    },
}

impl NativeEvent {
    /// The cache change this event asks for, if any.
    ///
    /// `is_directory` decides what a [`NativeEvent::Removed`] path was.
    pub fn to_change(&self, is_directory: impl Fn(&Path) -> bool) -> Option<PendingChange> {
        let change = match self {
            NativeEvent::DirectoryCreated(p) => PendingChange::DirectoryCreated(p.clone()),
            NativeEvent::DirectoryDeleted(p) => PendingChange::DirectoryDeleted(p.clone()),
            NativeEvent::FileCreated(p) => PendingChange::FileCreated(p.clone()),
            NativeEvent::FileChanged(p) => PendingChange::FileChanged(p.clone()),
            NativeEvent::FileDeleted(p) => PendingChange::FileDeleted(p.clone()),
            NativeEvent::Removed(p) if is_directory(p) => {
                PendingChange::DirectoryDeleted(p.clone())
            }
            NativeEvent::Removed(p) => PendingChange::FileDeleted(p.clone()),
            NativeEvent::Other | NativeEvent::Error { .. } => return None,
        };
        Some(change)
    }
}

pub type NativeSender = mpsc::UnboundedSender<NativeEvent>;
pub type NativeReceiver = mpsc::UnboundedReceiver<NativeEvent>;

pub fn native_channel() -> (NativeSender, NativeReceiver) {
    mpsc::unbounded_channel()
}

/// An OS-specific push notification mechanism.
///
/// A source may be started, stopped and started again (on another root);
/// the probe and the watch session share one instance this way.
pub trait NativeEventSource: Send + Debug {
    /// Begin delivering events for `root` (recursively) into `sink`.
    fn start(&mut self, root: &Path, sink: NativeSender) -> Result<()>;

    /// Stop delivering events. Safe to call when not started.
    fn stop(&mut self);

    /// Raised when the source can no longer cover the tree without being
    /// re-armed (e.g. a new subdirectory it does not follow by itself).
    fn needs_restart(&self) -> bool {
        false
    }
}
