// tests/probe.rs

mod common;
use crate::common::{
    init_tracing, mock_root, p, ManualSource, ScanningSource, ScriptedSource, SilentSource, ROOT,
};

use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use dirwatch::native::NativeEvent;
use dirwatch::probe::CapabilityProbe;
use dirwatch::settings::MIN_POLL_FREQUENCY_MS;
use dirwatch::{AbortSignal, WatchOptions, WatcherSettings};

fn quick_options() -> WatchOptions {
    WatchOptions {
        probe_timeout_ms: 400,
        ..WatchOptions::default()
    }
}

fn assert_nothing_evented(settings: &WatcherSettings) {
    assert!(!settings.can_detect_evented_directory_create);
    assert!(!settings.can_detect_evented_directory_delete);
    assert!(!settings.can_detect_evented_directory_rename);
    assert!(!settings.can_detect_evented_file_create);
    assert!(!settings.can_detect_evented_file_change);
    assert!(!settings.can_detect_evented_file_delete);
    assert!(!settings.can_detect_evented_file_rename);
    assert!(settings.continuous_polling());
}

#[test]
fn silent_source_degrades_to_polling() {
    init_tracing();
    let fs = mock_root();
    fs.add_file(p("a.txt"), "a");
    let mut native = SilentSource::new();
    let starts = native.start_counter();

    let started = Instant::now();
    let settings = CapabilityProbe::new(quick_options()).run(
        &mut native,
        &fs,
        Path::new(ROOT),
        &AbortSignal::new(),
    );

    assert_nothing_evented(&settings);
    assert!(settings.poll_frequency_ms() >= MIN_POLL_FREQUENCY_MS);
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    // Waits out the probe timeout, but not much more.
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn source_that_fails_to_start_degrades_to_polling() {
    let fs = mock_root();
    let (mut native, handle) = ManualSource::failing();

    let settings = CapabilityProbe::new(quick_options()).run(
        &mut native,
        &fs,
        Path::new(ROOT),
        &AbortSignal::new(),
    );

    assert_nothing_evented(&settings);
    assert_eq!(handle.starts(), 1);
    assert!(!handle.is_running());
}

#[test]
fn fully_capable_source_is_detected() {
    init_tracing();
    let fs = mock_root();
    let mut native = ScanningSource::real();

    let settings = CapabilityProbe::new(WatchOptions::default()).run(
        &mut native,
        &fs,
        Path::new(ROOT),
        &AbortSignal::new(),
    );

    assert_eq!(
        settings,
        WatcherSettings::fully_evented(settings.poll_frequency_ms())
    );
    assert!(!settings.continuous_polling());
}

/// Every event of the calibration script, in order, for `root`.
fn calibration_events(root: &Path) -> Vec<NativeEvent> {
    use NativeEvent::*;
    let at = |rel: &str| root.join(rel);
    vec![
        DirectoryCreated(at("subdir")),
        FileCreated(at("subdir/myfile.txt")),
        FileChanged(at("content.txt")),
        FileDeleted(at("moved_a.txt")),
        FileCreated(at("moved_b.txt")),
        FileDeleted(at("moved_b.txt")),
        FileCreated(at("moved_c.txt")),
        FileDeleted(at("subdir/myfile.txt")),
        DirectoryDeleted(at("dir_a")),
        DirectoryCreated(at("dir_b")),
        DirectoryDeleted(at("dir_b")),
        DirectoryCreated(at("dir_c")),
        DirectoryDeleted(at("dir_delete")),
    ]
}

/// Replays the calibration events once the scripted mutations are done,
/// minus those `hide` rejects.
fn partial_source(hide: fn(&NativeEvent) -> bool) -> ScriptedSource {
    ScriptedSource::new(
        |root| root.join("dir_c").exists() && !root.join("dir_delete").exists(),
        move |root| {
            calibration_events(root)
                .into_iter()
                .filter(|event| !hide(event))
                .collect()
        },
    )
}

fn assert_all_but_renames(settings: &WatcherSettings) {
    assert!(settings.can_detect_evented_directory_create);
    assert!(settings.can_detect_evented_directory_delete);
    assert!(settings.can_detect_evented_file_create);
    assert!(settings.can_detect_evented_file_change);
    assert!(settings.can_detect_evented_file_delete);
    assert!(!settings.can_detect_evented_directory_rename);
    assert!(!settings.can_detect_evented_file_rename);
    assert!(settings.continuous_polling());
}

#[test]
fn rename_needs_the_final_name_to_arrive() {
    init_tracing();
    let fs = mock_root();
    let mut native = partial_source(|event| match event {
        NativeEvent::FileCreated(path) => path.ends_with("moved_c.txt"),
        NativeEvent::DirectoryCreated(path) => path.ends_with("dir_c"),
        _ => false,
    });

    let settings =
        CapabilityProbe::new(quick_options()).run(&mut native, &fs, Path::new(ROOT), &AbortSignal::new());

    assert_all_but_renames(&settings);
}

#[test]
fn rename_needs_the_first_name_to_leave() {
    init_tracing();
    let fs = mock_root();
    let mut native = partial_source(|event| match event {
        NativeEvent::FileDeleted(path) => path.ends_with("moved_a.txt"),
        NativeEvent::DirectoryDeleted(path) => path.ends_with("dir_a"),
        _ => false,
    });

    let settings =
        CapabilityProbe::new(quick_options()).run(&mut native, &fs, Path::new(ROOT), &AbortSignal::new());

    assert_all_but_renames(&settings);
}

#[test]
fn probe_leaves_the_source_stopped() {
    let fs = mock_root();
    let (mut native, handle) = ManualSource::new();

    CapabilityProbe::new(quick_options()).run(&mut native, &fs, Path::new(ROOT), &AbortSignal::new());

    assert_eq!(handle.starts(), 1);
    assert_eq!(handle.stops(), 1);
    assert!(!handle.is_running());
    // The scratch directory is gone once the probe returns.
    let scratch = handle.root().expect("probe started the source");
    assert!(!scratch.exists());
}

#[test]
fn abort_cuts_the_probe_short() {
    let fs = mock_root();
    let abort = AbortSignal::new();
    abort.abort();
    let options = WatchOptions {
        probe_timeout_ms: 10_000,
        ..WatchOptions::default()
    };

    let started = Instant::now();
    let settings =
        CapabilityProbe::new(options).run(&mut SilentSource::new(), &fs, Path::new(ROOT), &abort);

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(settings.continuous_polling());
    assert_eq!(settings.poll_frequency_ms(), MIN_POLL_FREQUENCY_MS);
}

#[test]
fn poll_frequency_never_drops_below_the_configured_floor() {
    let fs = mock_root();
    for i in 0..20 {
        fs.add_file(p(&format!("d{}/f{i}.txt", i % 4)), "x");
    }

    let default_floor = CapabilityProbe::new(WatchOptions::default()).calibrate_poll_frequency(
        &fs,
        Path::new(ROOT),
        &AbortSignal::new(),
    );
    assert!(default_floor >= MIN_POLL_FREQUENCY_MS);

    let raised = WatchOptions {
        min_poll_frequency_ms: 750,
        ..WatchOptions::default()
    };
    let frequency = CapabilityProbe::new(raised).calibrate_poll_frequency(
        &fs,
        Path::new(ROOT),
        &AbortSignal::new(),
    );
    assert!(frequency >= 750);
}

#[test]
fn unscannable_root_calibrates_to_the_floor() {
    let fs = mock_root();
    fs.fail_read_dir(ROOT);

    let frequency = CapabilityProbe::new(WatchOptions::default()).calibrate_poll_frequency(
        &fs,
        Path::new(ROOT),
        &AbortSignal::new(),
    );
    assert_eq!(frequency, MIN_POLL_FREQUENCY_MS);
}

#[test]
fn settings_ignore_poll_frequency_at_or_below_the_floor() {
    let mut settings = WatcherSettings::polling_only(500);
    assert_eq!(settings.poll_frequency_ms(), 500);

    settings.set_poll_frequency_ms(100);
    assert_eq!(settings.poll_frequency_ms(), 500);
    settings.set_poll_frequency_ms(20);
    assert_eq!(settings.poll_frequency_ms(), 500);
    settings.set_poll_frequency_ms(101);
    assert_eq!(settings.poll_frequency_ms(), 101);

    assert_eq!(WatcherSettings::default().poll_frequency_ms(), MIN_POLL_FREQUENCY_MS);
}

#[test]
fn continuous_polling_unless_all_seven_are_evented() {
    assert!(!WatcherSettings::fully_evented(100).continuous_polling());

    let mut almost = WatcherSettings::fully_evented(100);
    almost.can_detect_evented_file_rename = false;
    assert!(almost.continuous_polling());

    let mut almost = WatcherSettings::fully_evented(100);
    almost.can_detect_evented_directory_create = false;
    assert!(almost.continuous_polling());
}
