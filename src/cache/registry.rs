//! Shared table of open archive bundles.
//!
//! Bundles are keyed by their ordered file list. The registry keeps at most
//! `file_cache_size` of them resident, evicting a random victim when a new
//! archive needs room. A resident bundle holds a reference of its own, so it
//! stays open with warm caches between callers until it is evicted, found
//! stale or purged.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

use crate::cache::bundle::{Bundle, BundleRef};
use crate::cache::config::RegistryConfig;
use crate::cache::events::ArchiveEventHandlerPtr;
use crate::cache::handle::ArchiveKey;
use crate::core::ArchiveOpener;
use crate::scene::SceneOpener;

#[derive(Default)]
struct RegistryState {
    items: HashMap<ArchiveKey, BundleRef>,
    /// Reverse index: file to the archives that include it.
    keys_with_path: HashMap<PathBuf, HashSet<ArchiveKey>>,
}

impl RegistryState {
    /// Returns the entry it replaced, which must be released and dropped
    /// after the lock is gone.
    fn insert(&mut self, key: ArchiveKey, bundle: BundleRef) -> Option<BundleRef> {
        for path in key.paths() {
            self.keys_with_path
                .entry(path.clone())
                .or_default()
                .insert(key.clone());
        }
        self.items.insert(key, bundle)
    }

    fn remove(&mut self, key: &ArchiveKey) -> Option<BundleRef> {
        let bundle = self.items.remove(key)?;
        for path in key.paths() {
            if let Some(keys) = self.keys_with_path.get_mut(path) {
                keys.remove(key);
                if keys.is_empty() {
                    self.keys_with_path.remove(path);
                }
            }
        }
        Some(bundle)
    }

    /// Remove random entries until fewer than `capacity` remain.
    fn make_room(&mut self, capacity: usize, victims: &mut Vec<BundleRef>) {
        let mut rng = rand::rng();
        while !self.items.is_empty() && self.items.len() >= capacity {
            let index = rng.random_range(0..self.items.len());
            let Some(key) = self.items.keys().nth(index).cloned() else {
                break;
            };
            if let Some(bundle) = self.remove(&key) {
                tracing::debug!("evicting {}", key);
                victims.push(bundle);
            }
        }
    }
}

pub(crate) struct RegistryShared {
    state: Mutex<RegistryState>,
    config: RegistryConfig,
    file_cache_size: AtomicUsize,
    opener: Arc<dyn ArchiveOpener>,
    warned: Mutex<HashSet<PathBuf>>,
}

impl RegistryShared {
    /// Called when a bundle's count drops to zero. Only bundles that already
    /// left the table get here, but the count and residency are checked again
    /// under the registry lock before tearing anything down.
    pub(crate) fn release_unreferenced(&self, bundle: &Arc<Bundle>) {
        {
            let state = self.state.lock();
            if bundle.ref_count() != 0 {
                return;
            }
            let resident = state
                .items
                .get(bundle.key())
                .is_some_and(|r| Arc::ptr_eq(r.arc(), bundle));
            if resident {
                return;
            }
        }
        bundle.release(false);
    }

    /// Release bundles taken out of the table. Must run without the lock.
    fn release_all(victims: Vec<BundleRef>, purged: bool) {
        for victim in victims {
            victim.release(purged);
        }
    }

    fn warn_once(&self, key: &ArchiveKey, error: Option<&str>) {
        let mut warned = self.warned.lock();
        let bad: Vec<&PathBuf> = key
            .paths()
            .iter()
            .filter(|p| !p.is_file())
            .collect();
        // Readable files that still failed are reported as a set.
        let bad = if bad.is_empty() { key.paths().iter().collect() } else { bad };
        for path in bad {
            if warned.insert(path.clone()) {
                tracing::warn!(
                    "unable to open {}: {}",
                    path.display(),
                    error.unwrap_or("unknown error")
                );
            }
        }
    }
}

/// Shared table of open archives.
///
/// Cloning is cheap and every clone sees the same bundles.
///
/// ```ignore
/// let registry = ArchiveRegistry::new();
/// let bundle = registry.open(&["shot.json"]);
/// if let Some(mesh) = bundle.find_node("/xform1/mesh") {
///     let xform = bundle.world_transform(&mesh, 5.0);
/// }
/// ```
#[derive(Clone)]
pub struct ArchiveRegistry {
    shared: Arc<RegistryShared>,
}

impl Default for ArchiveRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveRegistry {
    /// Registry reading scene files, configured from the environment.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::from_env())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_opener(config, Arc::new(SceneOpener))
    }

    /// Registry using a custom archive reader.
    pub fn with_opener(config: RegistryConfig, opener: Arc<dyn ArchiveOpener>) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                state: Mutex::new(RegistryState::default()),
                file_cache_size: AtomicUsize::new(config.file_cache_size.max(1)),
                config,
                opener,
                warned: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.shared.config
    }

    /// Maximum number of resident bundles.
    pub fn file_cache_size(&self) -> usize {
        self.shared.file_cache_size.load(Ordering::Relaxed)
    }

    /// Change the resident bundle limit, clamped to at least one. A smaller
    /// limit takes effect at the next open.
    pub fn set_file_cache_size(&self, size: usize) {
        self.shared.file_cache_size.store(size.max(1), Ordering::Relaxed);
    }

    /// Bundle for `paths`, opening the archive if needed.
    ///
    /// Resident bundles whose files changed on disk are replaced. Failures
    /// produce an invalid bundle, which is not kept. Files are read without
    /// holding the registry lock; if another thread registers the same
    /// archive meanwhile, its bundle wins and this one is discarded.
    pub fn open<P: AsRef<Path>>(&self, paths: &[P]) -> BundleRef {
        let key = ArchiveKey::new(paths);
        let shared = &self.shared;

        let stale = {
            let mut state = shared.state.lock();
            if let Some(bundle) = state.items.get(&key).filter(|b| !b.is_stale()) {
                return bundle.clone();
            }
            let stale = state.remove(&key);
            if stale.is_some() {
                tracing::debug!("{} changed on disk, reopening", key);
            }
            stale
        };
        RegistryShared::release_all(stale.into_iter().collect(), false);

        let bundle = Bundle::open(key.clone(), shared.opener.as_ref(), &shared.config);
        if !bundle.is_valid() {
            shared.warn_once(&key, bundle.error());
            return BundleRef::detached(bundle);
        }

        let mut victims = Vec::new();
        let result = {
            let mut state = shared.state.lock();
            let fresh = state.items.get(&key).filter(|b| !b.is_stale()).cloned();
            match fresh {
                Some(existing) => existing,
                None => {
                    victims.extend(state.remove(&key));
                    state.make_room(self.file_cache_size(), &mut victims);
                    let bundle = BundleRef::new(Arc::new(bundle), Arc::downgrade(shared));
                    victims.extend(state.insert(key.clone(), bundle.clone()));
                    bundle
                }
            }
        };

        // Listeners run outside the registry lock.
        RegistryShared::release_all(victims, false);
        result
    }

    /// Resident, up-to-date bundle for `paths`, without opening anything.
    pub fn find_existing<P: AsRef<Path>>(&self, paths: &[P]) -> Option<BundleRef> {
        let key = ArchiveKey::new(paths);
        let state = self.shared.state.lock();
        let bundle = state.items.get(&key)?;
        if bundle.is_stale() {
            return None;
        }
        Some(bundle.clone())
    }

    /// Whether a bundle for `paths` is resident.
    pub fn contains<P: AsRef<Path>>(&self, paths: &[P]) -> bool {
        self.shared.state.lock().items.contains_key(&ArchiveKey::new(paths))
    }

    /// Evict and release the bundle for `paths`, notifying its handlers.
    /// Returns false if no such bundle was resident.
    pub fn purge<P: AsRef<Path>>(&self, paths: &[P]) -> bool {
        let removed = self.shared.state.lock().remove(&ArchiveKey::new(paths));
        match removed {
            Some(bundle) => {
                RegistryShared::release_all(vec![bundle], true);
                true
            }
            None => false,
        }
    }

    /// Purge every bundle that includes `path`. Returns how many were purged.
    pub fn purge_file(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let removed: Vec<BundleRef> = {
            let mut state = self.shared.state.lock();
            let keys: Vec<ArchiveKey> = state
                .keys_with_path
                .get(&path)
                .map(|keys| keys.iter().cloned().collect())
                .unwrap_or_default();
            keys.iter().filter_map(|k| state.remove(k)).collect()
        };
        let count = removed.len();
        RegistryShared::release_all(removed, true);
        count
    }

    /// Purge every bundle.
    pub fn clear_all(&self) {
        let removed: Vec<BundleRef> = {
            let mut state = self.shared.state.lock();
            state.keys_with_path.clear();
            state.items.drain().map(|(_, b)| b).collect()
        };
        RegistryShared::release_all(removed, true);
    }

    /// Attach `handler` to the resident bundle for `paths`.
    ///
    /// Returns false when no valid bundle is resident.
    pub fn add_event_handler<P: AsRef<Path>>(
        &self,
        paths: &[P],
        handler: ArchiveEventHandlerPtr,
    ) -> bool {
        let state = self.shared.state.lock();
        match state.items.get(&ArchiveKey::new(paths)) {
            Some(bundle) => bundle.add_event_handler(handler),
            None => false,
        }
    }

    /// Number of resident bundles.
    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of the resident bundles.
    pub fn keys(&self) -> Vec<ArchiveKey> {
        self.shared.state.lock().items.keys().cloned().collect()
    }

    /// Whether `bundle` is the one currently resident for its key.
    pub fn is_resident(&self, bundle: &BundleRef) -> bool {
        let state = self.shared.state.lock();
        state
            .items
            .get(bundle.key())
            .is_some_and(|resident| BundleRef::ptr_eq(resident, bundle))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;

    use super::*;
    use crate::cache::events::ArchiveEventHandler;
    use crate::core::ArchiveReader;
    use crate::geom::XformOp;
    use crate::scene::{NodeDesc, SceneDocument};

    fn write_scene(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        SceneDocument::new(vec![NodeDesc::xform(
            "x",
            vec![XformOp::Translate([1.0, 0.0, 0.0])],
        )])
        .write(&path)
        .unwrap();
        path
    }

    fn registry(size: usize) -> ArchiveRegistry {
        ArchiveRegistry::with_config(RegistryConfig::default().with_file_cache_size(size))
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<bool>>);

    impl ArchiveEventHandler for Recorder {
        fn cleared(&self, purged: bool) {
            self.0.lock().push(purged);
        }
    }

    #[test]
    fn test_open_shares_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_scene(dir.path(), "a.json");
        let reg = registry(4);

        let a = reg.open(&[&path]);
        let b = reg.open(&[&path]);
        assert!(a.is_valid());
        assert!(BundleRef::ptr_eq(&a, &b));
        // Two callers plus the registry's own reference.
        assert_eq!(a.ref_count(), 3);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_bundle_stays_resident_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_scene(dir.path(), "a.json");
        let reg = registry(4);
        let recorder = Arc::new(Recorder::default());

        let first_stats = {
            let bundle = reg.open(&[&path]);
            assert!(bundle.add_event_handler(recorder.clone()));
            let x = bundle.find_node("/x").unwrap();
            bundle.local_transform(&x, 0.5).unwrap();
            bundle.visibility(&x, 0.5, true).unwrap();
            bundle.cache_stats()
        };
        assert_eq!(reg.len(), 1);
        assert!(recorder.0.lock().is_empty());

        let bundle = reg.open(&[&path]);
        assert!(bundle.is_valid());
        assert_eq!(bundle.cache_stats(), first_stats);
        assert_eq!(bundle.event_handler_count(), 1);
        assert_eq!(bundle.ref_count(), 2);
    }

    #[test]
    fn test_dropping_registry_releases_unheld_bundles() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_scene(dir.path(), "a.json");
        let b = write_scene(dir.path(), "b.json");
        let reg = registry(4);
        let recorder = Arc::new(Recorder::default());

        drop(reg.open(&[&a]));
        let held = reg.open(&[&b]);
        assert!(reg.add_event_handler(&[&a], recorder.clone()));
        assert!(held.add_event_handler(recorder.clone()));

        drop(reg);
        assert_eq!(*recorder.0.lock(), vec![false]);
        assert!(held.is_valid());
        drop(held);
        assert_eq!(*recorder.0.lock(), vec![false, false]);
    }

    #[test]
    fn test_evicted_bundle_notifies_once() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_scene(dir.path(), "a.json");
        let b = write_scene(dir.path(), "b.json");
        let reg = registry(1);
        let recorder = Arc::new(Recorder::default());

        let held = reg.open(&[&a]);
        assert!(held.add_event_handler(recorder.clone()));
        let _other = reg.open(&[&b]);
        assert!(!held.is_valid());
        drop(held);
        assert_eq!(*recorder.0.lock(), vec![false]);
    }

    /// Blocks inside `open` for files named `slow.json` until released.
    struct GatedOpener {
        entered: Mutex<mpsc::Sender<()>>,
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl ArchiveOpener for GatedOpener {
        fn open(&self, paths: &[PathBuf]) -> crate::Result<Arc<dyn ArchiveReader>> {
            if paths.iter().any(|p| p.ends_with("slow.json")) {
                let _ = self.entered.lock().send(());
                let _ = self.gate.lock().recv();
            }
            SceneOpener.open(paths)
        }
    }

    #[test]
    fn test_slow_open_does_not_block_registry() {
        let dir = tempfile::tempdir().unwrap();
        let slow = write_scene(dir.path(), "slow.json");
        let fast = write_scene(dir.path(), "fast.json");
        let (entered_tx, entered_rx) = mpsc::channel();
        let (gate_tx, gate_rx) = mpsc::channel();
        let opener = GatedOpener {
            entered: Mutex::new(entered_tx),
            gate: Mutex::new(gate_rx),
        };
        let reg = ArchiveRegistry::with_opener(RegistryConfig::default(), Arc::new(opener));
        let _fast = reg.open(&[&fast]);

        thread::scope(|s| {
            let opening = s.spawn(|| reg.open(&[&slow]).is_valid());
            entered_rx.recv().unwrap();

            // The slow open is in progress; other callers still get through.
            assert!(reg.find_existing(&[&fast]).is_some());
            assert!(!reg.contains(&[&slow]));
            assert!(reg.purge(&[&fast]));

            gate_tx.send(()).unwrap();
            assert!(opening.join().unwrap());
        });
        assert!(reg.contains(&[&slow]));
    }

    #[test]
    fn test_invalid_bundle_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(4);
        let missing = dir.path().join("missing.json");

        let bundle = reg.open(&[&missing]);
        assert!(!bundle.is_valid());
        assert!(bundle.error().is_some());
        assert!(bundle.find_node("/").is_none());
        assert!(reg.is_empty());
        assert!(!reg.add_event_handler(&[&missing], Arc::new(Recorder::default())));
    }

    #[test]
    fn test_empty_path_list_invalid() {
        let reg = registry(4);
        let none: [&str; 0] = [];
        assert!(!reg.open(&none).is_valid());
    }

    #[test]
    fn test_purge_notifies_and_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_scene(dir.path(), "a.json");
        let reg = registry(4);

        let bundle = reg.open(&[&path]);
        let recorder = Arc::new(Recorder::default());
        assert!(bundle.add_event_handler(recorder.clone()));

        assert!(reg.purge(&[&path]));
        assert!(!reg.purge(&[&path]));
        assert!(!bundle.is_valid());
        assert_eq!(*recorder.0.lock(), vec![true]);

        // Dropping the stale reference must not notify again.
        drop(bundle);
        assert_eq!(recorder.0.lock().len(), 1);
    }

    #[test]
    fn test_purge_file_uses_reverse_index() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_scene(dir.path(), "a.json");
        let b = write_scene(dir.path(), "b.json");
        let reg = registry(8);

        let _ab = reg.open(&[&a, &b]);
        let _ba = reg.open(&[&b, &a]);
        let _b = reg.open(&[&b]);
        assert_eq!(reg.len(), 3);

        assert_eq!(reg.purge_file(&a), 2);
        assert_eq!(reg.len(), 1);
        assert!(reg.contains(&[&b]));
    }

    #[test]
    fn test_file_cache_size_clamped() {
        let reg = registry(4);
        reg.set_file_cache_size(0);
        assert_eq!(reg.file_cache_size(), 1);
    }
}
