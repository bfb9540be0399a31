//! Registry lifecycle: sharing, eviction, staleness and purging.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use alembic_cache::cache::{ArchiveEventHandler, ArchiveRegistry, BundleRef, RegistryConfig};
use alembic_cache::geom::XformOp;
use alembic_cache::scene::{NodeDesc, SceneDocument};
use parking_lot::Mutex;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<bool>>,
}

impl ArchiveEventHandler for Recorder {
    fn cleared(&self, purged: bool) {
        self.calls.lock().push(purged);
    }
}

fn write_scene(dir: &Path, name: &str, x: f64) -> PathBuf {
    let path = dir.join(name);
    SceneDocument::new(vec![NodeDesc::xform("root", vec![XformOp::Translate([x, 0.0, 0.0])])])
        .write(&path)
        .unwrap();
    path
}

fn registry(size: usize) -> ArchiveRegistry {
    ArchiveRegistry::with_config(RegistryConfig::default().with_file_cache_size(size))
}

fn touch(path: &Path, offset: Duration) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + offset).unwrap();
}

#[test]
fn test_capacity_evicts_exactly_one() {
    let dir = tempfile::tempdir().unwrap();
    let n = 3;
    let reg = registry(n);

    let mut held = Vec::new();
    let mut recorders = Vec::new();
    for i in 0..n {
        let path = write_scene(dir.path(), &format!("a{}.json", i), i as f64);
        let bundle = reg.open(&[&path]);
        let recorder = Arc::new(Recorder::default());
        assert!(bundle.add_event_handler(recorder.clone()));
        held.push(bundle);
        recorders.push(recorder);
    }
    assert_eq!(reg.len(), n);

    let extra = write_scene(dir.path(), "extra.json", 9.0);
    let newest = reg.open(&[&extra]);
    assert!(newest.is_valid());
    assert_eq!(reg.len(), n);

    let notified: Vec<Vec<bool>> = recorders.iter().map(|r| r.calls.lock().clone()).collect();
    let evicted: Vec<usize> = (0..n).filter(|&i| !notified[i].is_empty()).collect();
    assert_eq!(evicted.len(), 1);
    assert_eq!(notified[evicted[0]], vec![false]);
    assert!(!held[evicted[0]].is_valid());
    assert!(!reg.is_resident(&held[evicted[0]]));
}

#[test]
fn test_stale_bundle_replaced_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scene(dir.path(), "shot.json", 1.0);
    let reg = registry(4);

    let first = reg.open(&[&path]);
    let recorder = Arc::new(Recorder::default());
    first.add_event_handler(recorder.clone());

    write_scene(dir.path(), "shot.json", 2.0);
    touch(&path, Duration::from_secs(5));

    assert!(reg.find_existing(&[&path]).is_none());
    // Still resident: find_existing never reopens.
    assert!(reg.contains(&[&path]));

    let second = reg.open(&[&path]);
    assert!(!BundleRef::ptr_eq(&first, &second));
    assert!(second.is_valid());
    assert!(!first.is_valid());
    assert_eq!(*recorder.calls.lock(), vec![false]);

    let root = second.find_node("/root").unwrap();
    let x = second.world_transform(&root, 0.0).unwrap();
    assert_eq!(x.world.w_axis.x, 2.0);
}

#[test]
fn test_find_existing_shares_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scene(dir.path(), "a.json", 0.0);
    let reg = registry(4);

    assert!(reg.find_existing(&[&path]).is_none());
    let opened = reg.open(&[&path]);
    let found = reg.find_existing(&[&path]).unwrap();
    assert!(BundleRef::ptr_eq(&opened, &found));
}

#[test]
fn test_clear_all_purges_everything() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_scene(dir.path(), "a.json", 0.0);
    let b = write_scene(dir.path(), "b.json", 0.0);
    let reg = registry(4);

    let ba = reg.open(&[&a]);
    let bb = reg.open(&[&b]);
    let recorder = Arc::new(Recorder::default());
    ba.add_event_handler(recorder.clone());
    bb.add_event_handler(recorder.clone());

    reg.clear_all();
    assert!(reg.is_empty());
    assert!(!ba.is_valid() && !bb.is_valid());
    assert_eq!(*recorder.calls.lock(), vec![true, true]);
}

#[test]
fn test_handler_removal() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scene(dir.path(), "a.json", 0.0);
    let reg = registry(4);

    let bundle = reg.open(&[&path]);
    let recorder = Arc::new(Recorder::default());
    let handler: Arc<dyn ArchiveEventHandler> = recorder.clone();
    bundle.add_event_handler(handler.clone());
    // Adding twice keeps one registration.
    bundle.add_event_handler(handler.clone());
    assert_eq!(bundle.event_handler_count(), 1);

    assert!(bundle.remove_event_handler(&handler));
    reg.purge(&[&path]);
    assert!(recorder.calls.lock().is_empty());
}

#[test]
fn test_bad_file_reports_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("broken.json");
    std::fs::write(&bad, "{ not json").unwrap();
    let good = write_scene(dir.path(), "good.json", 0.0);
    let reg = registry(4);

    for _ in 0..2 {
        let bundle = reg.open(&[&good, &bad]);
        assert!(!bundle.is_valid());
        assert!(bundle.root().is_none());
        assert!(bundle.object_list(false).is_empty());
    }
    assert!(reg.is_empty());
}

#[test]
fn test_shrinking_capacity_applies_on_next_open() {
    let dir = tempfile::tempdir().unwrap();
    let reg = registry(4);
    let held: Vec<BundleRef> = (0..4)
        .map(|i| reg.open(&[write_scene(dir.path(), &format!("s{}.json", i), 0.0)]))
        .collect();
    assert_eq!(reg.len(), 4);

    reg.set_file_cache_size(2);
    assert_eq!(reg.len(), 4);
    let _more = reg.open(&[write_scene(dir.path(), "more.json", 0.0)]);
    assert_eq!(reg.len(), 2);
    assert_eq!(held.iter().filter(|b| b.is_valid()).count(), 1);
}
