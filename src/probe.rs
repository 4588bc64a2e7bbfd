// src/probe.rs

//! One-shot calibration of the native event source.
//!
//! The probe scripts a set of filesystem mutations in a throwaway directory,
//! watches which of them the native source reports, and times one scan of
//! the real root to size the poll interval. It never fails: anything that
//! goes wrong leaves the affected capability unset, which only makes the
//! watcher poll more.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::cache::{Cache, PendingChange, Snapshot};
use crate::config::WatchOptions;
use crate::fs::{FileSystem, RealFileSystem};
use crate::native::{native_channel, NativeEventSource, NativeReceiver};
use crate::settings::WatcherSettings;
use crate::types::{AbortSignal, ErrorSink};

/// Paths of the scratch tree, before and after the scripted mutations.
#[derive(Debug, Clone)]
struct ScratchLayout {
    root: PathBuf,
    subdir: PathBuf,
    new_file: PathBuf,
    content_file: PathBuf,
    file_rename: [PathBuf; 3],
    dir_rename: [PathBuf; 3],
    dir_delete: PathBuf,
}

impl ScratchLayout {
    fn new(root: PathBuf) -> Self {
        let subdir = root.join("subdir");
        Self {
            new_file: subdir.join("myfile.txt"),
            subdir,
            content_file: root.join("content.txt"),
            file_rename: [
                root.join("moved_a.txt"),
                root.join("moved_b.txt"),
                root.join("moved_c.txt"),
            ],
            dir_rename: [
                root.join("dir_a"),
                root.join("dir_b"),
                root.join("dir_c"),
            ],
            dir_delete: root.join("dir_delete"),
            root,
        }
    }

    /// State that must exist before the native source is attached.
    fn prepare(&self) -> io::Result<()> {
        fs::create_dir(&self.dir_rename[0])?;
        fs::create_dir(&self.dir_delete)?;
        fs::write(&self.content_file, "to be changed")?;
        fs::write(&self.file_rename[0], "hey")?;
        Ok(())
    }

    fn mutate(&self) {
        step("create subdir", fs::create_dir(&self.subdir));
        step("write file", fs::write(&self.new_file, "hey"));
        step("append to file", append(&self.content_file, b"more content"));
        step("move file", fs::rename(&self.file_rename[0], &self.file_rename[1]));
        step("move file again", fs::rename(&self.file_rename[1], &self.file_rename[2]));
        step("delete file", fs::remove_file(&self.new_file));
        step("move dir", fs::rename(&self.dir_rename[0], &self.dir_rename[1]));
        step("move dir again", fs::rename(&self.dir_rename[1], &self.dir_rename[2]));
        step("delete dir", fs::remove_dir(&self.dir_delete));
    }
}

fn step(name: &str, result: io::Result<()>) {
    if let Err(err) = result {
        debug!(step = name, error = %err, "probe mutation failed");
    }
}

fn append(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::OpenOptions::new().append(true).open(path)?;
    file.write_all(bytes)
}

/// What the native source was seen to report.
#[derive(Debug, Default, Clone, Copy)]
struct Observations {
    directory_create: bool,
    directory_delete: bool,
    file_create: bool,
    file_change: bool,
    file_delete: bool,
    renamed_dir_left: bool,
    renamed_dir_arrived: bool,
    renamed_file_left: bool,
    renamed_file_arrived: bool,
}

impl Observations {
    fn observe(&mut self, change: &PendingChange, layout: &ScratchLayout) {
        let path = change.path();
        match change {
            PendingChange::DirectoryCreated(_) => {
                self.directory_create = true;
                if path == layout.dir_rename[2] {
                    self.renamed_dir_arrived = true;
                }
            }
            PendingChange::DirectoryDeleted(_) => {
                self.directory_delete = true;
                if path == layout.dir_rename[0] {
                    self.renamed_dir_left = true;
                }
            }
            PendingChange::FileCreated(_) => {
                self.file_create = true;
                if path == layout.file_rename[2] {
                    self.renamed_file_arrived = true;
                }
            }
            PendingChange::FileChanged(_) => self.file_change = true,
            PendingChange::FileDeleted(_) => {
                self.file_delete = true;
                if path == layout.file_rename[0] {
                    self.renamed_file_left = true;
                }
            }
        }
    }

    fn directory_rename(&self) -> bool {
        self.renamed_dir_left && self.renamed_dir_arrived
    }

    fn file_rename(&self) -> bool {
        self.renamed_file_left && self.renamed_file_arrived
    }

    fn complete(&self) -> bool {
        self.directory_create
            && self.directory_delete
            && self.directory_rename()
            && self.file_create
            && self.file_change
            && self.file_delete
            && self.file_rename()
    }

    fn into_settings(self) -> WatcherSettings {
        WatcherSettings::new(
            self.directory_create,
            self.directory_delete,
            self.directory_rename(),
            self.file_create,
            self.file_change,
            self.file_delete,
            self.file_rename(),
        )
    }
}

/// Calibrates [`WatcherSettings`] for one watch session.
#[derive(Debug, Clone)]
pub struct CapabilityProbe {
    options: WatchOptions,
}

impl CapabilityProbe {
    pub fn new(options: WatchOptions) -> Self {
        Self { options }
    }

    /// Probe `native` and time a scan of `root` through `fs`.
    pub fn run(
        &self,
        native: &mut dyn NativeEventSource,
        fs: &dyn FileSystem,
        root: &Path,
        abort: &AbortSignal,
    ) -> WatcherSettings {
        let observed = self.detect(native, abort);
        let mut settings = observed.into_settings();
        settings.set_poll_frequency_ms(self.calibrate_poll_frequency(fs, root, abort));

        info!(
            continuous_polling = settings.continuous_polling(),
            poll_frequency_ms = settings.poll_frequency_ms(),
            ?settings,
            "capability probe finished"
        );
        settings
    }

    /// `max(min_poll_frequency_ms, poll_scale x one scan of root)`.
    pub fn calibrate_poll_frequency(
        &self,
        fs: &dyn FileSystem,
        root: &Path,
        abort: &AbortSignal,
    ) -> u64 {
        let quiet = ErrorSink::new(|_, _| {});
        let started = Instant::now();
        let scan = Snapshot::take(fs, root, abort, &quiet);
        let elapsed = started.elapsed();
        if let Err(err) = scan {
            debug!(error = %err, "calibration scan failed; using minimum poll frequency");
            return self.options.min_poll_frequency_ms;
        }
        let scaled = elapsed.as_millis() as u64 * u64::from(self.options.poll_scale);
        scaled.max(self.options.min_poll_frequency_ms)
    }

    fn detect(&self, native: &mut dyn NativeEventSource, abort: &AbortSignal) -> Observations {
        let scratch = match tempfile::Builder::new().prefix("dirwatch-probe-").tempdir() {
            Ok(dir) => dir,
            Err(err) => {
                debug!(error = %err, "could not create probe directory");
                return Observations::default();
            }
        };
        let observed = self.detect_in(&scratch, native, abort);
        native.stop();

        if let Err(err) = scratch.close() {
            debug!(error = %err, "probe directory cleanup failed");
        }
        observed
    }

    fn detect_in(
        &self,
        scratch: &TempDir,
        native: &mut dyn NativeEventSource,
        abort: &AbortSignal,
    ) -> Observations {
        let root = fs::canonicalize(scratch.path()).unwrap_or_else(|_| scratch.path().to_path_buf());
        let layout = ScratchLayout::new(root);
        if let Err(err) = layout.prepare() {
            debug!(error = %err, "could not prepare probe directory");
            return Observations::default();
        }

        let cache = Cache::new(
            Arc::new(RealFileSystem),
            layout.root.clone(),
            abort.clone(),
            ErrorSink::new(|path, err| debug!(?path, error = %err, "probe scan error")),
        );
        if cache.initialize().is_err() {
            return Observations::default();
        }

        let (tx, mut rx) = native_channel();
        if let Err(err) = native.start(&layout.root, tx) {
            debug!(error = %err, "native source failed to start during probe");
            return Observations::default();
        }

        let mutator = {
            let layout = layout.clone();
            thread::Builder::new()
                .name("dirwatch-probe".to_string())
                .spawn(move || layout.mutate())
        };

        let observed = self.collect(&mut rx, &cache, &layout, abort);

        match mutator {
            Ok(handle) => {
                let _ = handle.join();
            }
            Err(err) => debug!(error = %err, "could not spawn probe mutation thread"),
        }
        observed
    }

    fn collect(
        &self,
        rx: &mut NativeReceiver,
        cache: &Cache,
        layout: &ScratchLayout,
        abort: &AbortSignal,
    ) -> Observations {
        let started = Instant::now();
        let timeout = self.options.probe_timeout();
        let interval = self.options.probe_poll_interval();
        let mut observed = Observations::default();

        loop {
            while let Ok(event) = rx.try_recv() {
                if let Some(change) = event.to_change(|p| cache.is_directory(p)) {
                    cache.patch(&change);
                    observed.observe(&change, layout);
                }
            }
            if observed.complete() || abort.is_aborted() || started.elapsed() >= timeout {
                break;
            }
            thread::sleep(interval);
        }

        debug!(took = ?started.elapsed(), complete = observed.complete(), "probe observation ended");
        observed
    }
}
