// tests/notify_translate.rs

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use notify::event::{
    AccessKind, AccessMode, CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode,
};
use notify::{Event, EventKind};

use dirwatch::native::notify_source::translate_event;
use dirwatch::native::NativeEvent;

type TestResult = Result<(), Box<dyn Error>>;

fn event(kind: EventKind, paths: &[&PathBuf]) -> Event {
    paths
        .iter()
        .fold(Event::new(kind), |ev, p| ev.add_path((*p).clone()))
}

#[test]
fn typed_creates_and_removes_map_directly() {
    let d = PathBuf::from("/r/d");
    let f = PathBuf::from("/r/f.txt");

    assert_eq!(
        translate_event(&event(EventKind::Create(CreateKind::Folder), &[&d])),
        vec![NativeEvent::DirectoryCreated(d.clone())]
    );
    assert_eq!(
        translate_event(&event(EventKind::Create(CreateKind::File), &[&f])),
        vec![NativeEvent::FileCreated(f.clone())]
    );
    assert_eq!(
        translate_event(&event(EventKind::Remove(RemoveKind::Folder), &[&d])),
        vec![NativeEvent::DirectoryDeleted(d.clone())]
    );
    assert_eq!(
        translate_event(&event(EventKind::Remove(RemoveKind::File), &[&f])),
        vec![NativeEvent::FileDeleted(f.clone())]
    );
    assert_eq!(
        translate_event(&event(EventKind::Remove(RemoveKind::Any), &[&f])),
        vec![NativeEvent::Removed(f)]
    );
}

#[test]
fn untyped_create_is_classified_from_disk() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("made");
    let file = tmp.path().join("made.txt");
    let gone = tmp.path().join("gone");
    fs::create_dir(&dir)?;
    fs::write(&file, "x")?;

    let kind = EventKind::Create(CreateKind::Any);
    assert_eq!(
        translate_event(&event(kind, &[&dir, &file, &gone])),
        vec![
            NativeEvent::DirectoryCreated(dir.clone()),
            NativeEvent::FileCreated(file.clone()),
            NativeEvent::Other,
        ]
    );
    Ok(())
}

#[test]
fn renames_become_removal_plus_creation() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let from = tmp.path().join("old.txt");
    let to = tmp.path().join("new.txt");
    fs::write(&to, "moved")?;

    let both = EventKind::Modify(ModifyKind::Name(RenameMode::Both));
    assert_eq!(
        translate_event(&event(both, &[&from, &to])),
        vec![
            NativeEvent::Removed(from.clone()),
            NativeEvent::FileCreated(to.clone()),
        ]
    );

    let half_from = EventKind::Modify(ModifyKind::Name(RenameMode::From));
    assert_eq!(
        translate_event(&event(half_from, &[&from])),
        vec![NativeEvent::Removed(from.clone())]
    );

    let half_to = EventKind::Modify(ModifyKind::Name(RenameMode::To));
    assert_eq!(
        translate_event(&event(half_to, &[&to])),
        vec![NativeEvent::FileCreated(to.clone())]
    );

    // Unknown rename direction: decided by whether the path still exists.
    let any = EventKind::Modify(ModifyKind::Name(RenameMode::Any));
    assert_eq!(
        translate_event(&event(any, &[&from, &to])),
        vec![NativeEvent::Removed(from), NativeEvent::FileCreated(to)]
    );
    Ok(())
}

#[test]
fn content_modifications_are_file_changes() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let file = tmp.path().join("data.bin");
    fs::write(&file, "x")?;
    let dir = tmp.path().to_path_buf();

    let data = EventKind::Modify(ModifyKind::Data(DataChange::Content));
    assert_eq!(
        translate_event(&event(data, &[&file])),
        vec![NativeEvent::FileChanged(file.clone())]
    );
    // A directory's metadata changing is activity, not a file change.
    let meta = EventKind::Modify(ModifyKind::Any);
    assert_eq!(translate_event(&event(meta, &[&dir])), vec![NativeEvent::Other]);

    let closed = EventKind::Access(AccessKind::Close(AccessMode::Write));
    assert_eq!(
        translate_event(&event(closed, &[&file])),
        vec![NativeEvent::FileChanged(file.clone())]
    );
    let opened = EventKind::Access(AccessKind::Open(AccessMode::Any));
    assert!(translate_event(&event(opened, &[&file])).is_empty());
    Ok(())
}

#[test]
fn catch_all_kinds_are_activity() {
    assert_eq!(translate_event(&Event::new(EventKind::Any)), vec![NativeEvent::Other]);
    assert_eq!(translate_event(&Event::new(EventKind::Other)), vec![NativeEvent::Other]);
}

#[test]
fn removed_resolves_against_known_directories() {
    let d = PathBuf::from("/r/d");
    let f = PathBuf::from("/r/f");
    let is_dir = |p: &std::path::Path| p == d.as_path();

    assert_eq!(
        NativeEvent::Removed(d.clone()).to_change(is_dir).map(|c| c.kind()),
        Some(dirwatch::ChangeKind::DirectoryDeleted)
    );
    assert_eq!(
        NativeEvent::Removed(f.clone()).to_change(is_dir).map(|c| c.kind()),
        Some(dirwatch::ChangeKind::FileDeleted)
    );
    assert_eq!(NativeEvent::Other.to_change(is_dir), None);
}
