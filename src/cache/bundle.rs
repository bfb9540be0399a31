//! One open archive and the caches built over it.

use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};

use crate::cache::bounds::{BoundsCache, BoundsResult};
use crate::cache::config::RegistryConfig;
use crate::cache::events::{same_handler, ArchiveEventHandlerPtr};
use crate::cache::handle::{ArchiveKey, NodeHandle};
use crate::cache::path::PathCache;
use crate::cache::registry::RegistryShared;
use crate::cache::transform::{TransformCache, WorldXform};
use crate::cache::visibility::{VisibilityCache, VisibilityResult};
use crate::cache::walker::{walk, PathListWalker, TimeRange, TimeRangeWalker, WalkStatus, Walker};
use crate::core::{ArchiveOpener, ArchiveReader, ObjectRef};
use crate::geom::LocalXform;
use crate::util::{Chrono, Error};

static NEXT_BUNDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Entry counts of a bundle's caches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub paths: usize,
    pub static_transforms: usize,
    pub dynamic_transforms: usize,
    pub visibility: usize,
    pub static_bounds: usize,
    pub dynamic_bounds: usize,
}

#[derive(Default)]
struct ObjectLists {
    objects: OnceLock<Vec<String>>,
    with_face_sets: OnceLock<Vec<String>>,
}

/// An open archive plus its path, transform, visibility and bounds caches.
///
/// Obtained from an [`ArchiveRegistry`](crate::cache::ArchiveRegistry) through
/// a [`BundleRef`]. A bundle whose files could not be opened, or that has been
/// purged, is invalid: every query on it returns `None`.
pub struct Bundle {
    id: u64,
    key: ArchiveKey,
    reader: RwLock<Option<Arc<dyn ArchiveReader>>>,
    error: Option<String>,
    mtimes: Vec<Option<SystemTime>>,
    refs: AtomicUsize,
    released: AtomicBool,
    paths: PathCache,
    xforms: TransformCache,
    visibility: VisibilityCache,
    bounds: BoundsCache,
    lists: ObjectLists,
    handlers: Mutex<Vec<ArchiveEventHandlerPtr>>,
}

impl Bundle {
    fn with_reader(
        key: ArchiveKey,
        reader: Option<Arc<dyn ArchiveReader>>,
        error: Option<String>,
        mtimes: Vec<Option<SystemTime>>,
        config: &RegistryConfig,
    ) -> Self {
        Self {
            id: NEXT_BUNDLE_ID.fetch_add(1, Ordering::Relaxed),
            key,
            reader: RwLock::new(reader),
            error,
            mtimes,
            refs: AtomicUsize::new(0),
            released: AtomicBool::new(false),
            paths: PathCache::new(config.object_cache_entries),
            xforms: TransformCache::new(config.transform_cache_entries),
            visibility: VisibilityCache::new(config.visibility_cache_entries),
            bounds: BoundsCache::new(config.bounds_cache_entries),
            lists: ObjectLists::default(),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// A bundle that failed to open.
    pub(crate) fn invalid(key: ArchiveKey, error: &Error, config: &RegistryConfig) -> Self {
        Self::with_reader(key, None, Some(error.to_string()), Vec::new(), config)
    }

    /// Open the archive named by `key`.
    ///
    /// Modification times are taken before reading so that edits made while
    /// opening are detected as staleness later.
    pub(crate) fn open(
        key: ArchiveKey,
        opener: &dyn ArchiveOpener,
        config: &RegistryConfig,
    ) -> Self {
        let _span = tracing::info_span!("open_archive", archive = %key).entered();

        if key.is_empty() {
            return Self::invalid(key, &Error::EmptyArchive, config);
        }
        for path in key.paths() {
            if !path.is_file() {
                return Self::invalid(key.clone(), &Error::FileNotFound(path.clone()), config);
            }
        }

        let mtimes = key.paths().iter().map(|p| modified(p)).collect();
        match opener.open(key.paths()) {
            Ok(reader) => {
                let bundle = Self::with_reader(key, Some(reader), None, mtimes, config);
                if config.build_static_on_open {
                    if let Some(reader) = bundle.reader() {
                        bundle.xforms.static_table(&reader.root());
                    }
                }
                bundle
            }
            Err(e) => Self::invalid(key, &e, config),
        }
    }

    /// Identity of the archive.
    #[inline]
    pub fn key(&self) -> &ArchiveKey {
        &self.key
    }

    /// Files of the archive, in layering order.
    #[inline]
    pub fn paths(&self) -> &[PathBuf] {
        self.key.paths()
    }

    /// Whether the archive is open and has not been purged.
    pub fn is_valid(&self) -> bool {
        self.reader.read().is_some()
    }

    /// Why the archive could not be opened.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The archive reader, if still open.
    pub fn reader(&self) -> Option<Arc<dyn ArchiveReader>> {
        self.reader.read().clone()
    }

    fn root_object(&self) -> Option<ObjectRef> {
        self.reader.read().as_ref().map(|r| r.root())
    }

    /// Whether any file changed or disappeared since the bundle was opened.
    pub fn is_stale(&self) -> bool {
        self.key
            .paths()
            .iter()
            .zip(&self.mtimes)
            .any(|(path, opened)| modified(path) != *opened)
    }

    /// Handle to the archive top.
    pub fn root(&self) -> Option<NodeHandle> {
        self.find_node("/")
    }

    /// Resolve a slash-delimited path.
    pub fn find_node(&self, path: &str) -> Option<NodeHandle> {
        let root = self.root_object()?;
        self.paths.resolve(&self.key, self.id, &root, path)
    }

    /// Re-resolve handles made by another bundle of the same archive.
    fn own_node(&self, node: &NodeHandle) -> Option<NodeHandle> {
        if node.bundle_id() == self.id {
            Some(node.clone())
        } else if node.archive().same(&self.key) {
            self.find_node(node.path())
        } else {
            None
        }
    }

    /// World transform of `node` at `time`.
    ///
    /// `None` if the bundle is invalid or an ancestor cannot be resolved.
    pub fn world_transform(&self, node: &NodeHandle, time: Chrono) -> Option<WorldXform> {
        let root = self.root_object()?;
        let node = self.own_node(node)?;
        let lookup = |p: &str| self.paths.resolve(&self.key, self.id, &root, p);
        self.xforms.world_transform(&root, &node, time, &lookup)
    }

    /// Local transform of `node` at `time`; identity for nodes without one.
    pub fn local_transform(&self, node: &NodeHandle, time: Chrono) -> Option<LocalXform> {
        let root = self.root_object()?;
        let node = self.own_node(node)?;
        Some(self.xforms.local_transform(&root, &node, time))
    }

    /// Whether the transform governing `node` is animated.
    pub fn is_transform_animated(&self, node: &NodeHandle) -> bool {
        let Some(root) = self.root_object() else {
            return false;
        };
        let Some(node) = self.own_node(node) else {
            return false;
        };
        let lookup = |p: &str| self.paths.resolve(&self.key, self.id, &root, p);
        self.xforms.is_animated(&root, &node, &lookup)
    }

    /// Visibility of `node` at `time`, optionally resolving deferred values
    /// through its ancestors.
    pub fn visibility(
        &self,
        node: &NodeHandle,
        time: Chrono,
        include_ancestors: bool,
    ) -> Option<VisibilityResult> {
        let root = self.root_object()?;
        let node = self.own_node(node)?;
        let lookup = |p: &str| self.paths.resolve(&self.key, self.id, &root, p);
        Some(self.visibility.visibility(&node, time, include_ancestors, &lookup))
    }

    /// Authored bounds of `node` at `time`.
    pub fn bounds(&self, node: &NodeHandle, time: Chrono) -> Option<BoundsResult> {
        if !self.is_valid() {
            return None;
        }
        let node = self.own_node(node)?;
        self.bounds.bounds(&node, time)
    }

    /// Walk the whole archive from the top.
    pub fn walk<W: Walker + ?Sized>(&self, walker: &mut W) -> WalkStatus {
        match self.root() {
            Some(root) => walk(&root, walker),
            None => WalkStatus::BadArchive,
        }
    }

    /// Walk the subtree at each of `paths` in turn. Unknown paths are skipped.
    pub fn walk_objects<W, S>(&self, walker: &mut W, paths: &[S]) -> WalkStatus
    where
        W: Walker + ?Sized,
        S: AsRef<str>,
    {
        if !self.is_valid() {
            return WalkStatus::BadArchive;
        }
        for path in paths {
            let Some(node) = self.find_node(path.as_ref()) else {
                tracing::debug!("{}: no object at {}", self.key, path.as_ref());
                continue;
            };
            let status = walk(&node, walker);
            if !status.is_completed() {
                return status;
            }
        }
        WalkStatus::Completed
    }

    /// Paths of every node below the top, optionally including face sets.
    ///
    /// Computed on first request; empty for invalid bundles.
    pub fn object_list(&self, include_face_sets: bool) -> &[String] {
        if !self.is_valid() {
            return &[];
        }
        let cell = if include_face_sets {
            &self.lists.with_face_sets
        } else {
            &self.lists.objects
        };
        cell.get_or_init(|| {
            let mut walker = PathListWalker {
                include_face_sets,
                paths: Vec::new(),
            };
            self.walk(&mut walker);
            walker.paths
        })
    }

    /// Overall time span of the archive's sampled data.
    pub fn time_range(&self) -> TimeRange {
        let mut walker = TimeRangeWalker::default();
        self.walk(&mut walker);
        walker.range
    }

    /// Attach a handler. Refused on invalid bundles.
    pub fn add_event_handler(&self, handler: ArchiveEventHandlerPtr) -> bool {
        let mut handlers = self.handlers.lock();
        if !self.is_valid() {
            return false;
        }
        if !handlers.iter().any(|h| same_handler(h, &handler)) {
            handlers.push(handler);
        }
        true
    }

    /// Detach a handler without notifying it.
    pub fn remove_event_handler(&self, handler: &ArchiveEventHandlerPtr) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|h| !same_handler(h, handler));
        handlers.len() != before
    }

    /// Number of attached handlers.
    pub fn event_handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        let (static_transforms, dynamic_transforms) = self.xforms.len();
        let (static_bounds, dynamic_bounds) = self.bounds.len();
        CacheStats {
            paths: self.paths.len(),
            static_transforms,
            dynamic_transforms,
            visibility: self.visibility.len(),
            static_bounds,
            dynamic_bounds,
        }
    }

    /// Number of live [`BundleRef`]s, counting the registry's own while the
    /// bundle is resident.
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    /// Notify and detach handlers, then drop the reader and cached data.
    ///
    /// Runs once; later calls do nothing.
    pub(crate) fn release(&self, purged: bool) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        // Taken under the handler lock so no handler can attach afterwards.
        let (handlers, reader) = {
            let mut handlers = self.handlers.lock();
            (std::mem::take(&mut *handlers), self.reader.write().take())
        };
        for handler in &handlers {
            handler.cleared(purged);
        }
        drop(reader);

        self.paths.clear();
        self.xforms.clear();
        self.visibility.clear();
        self.bounds.clear();
        tracing::debug!("released {} (purged: {})", self.key, purged);
    }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("key", &self.key)
            .field("valid", &self.is_valid())
            .field("error", &self.error)
            .field("refs", &self.ref_count())
            .finish()
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Counted reference to a [`Bundle`].
///
/// The registry keeps one of these for every resident bundle, so caches stay
/// warm between callers. A bundle that has left the registry is torn down when
/// its last reference drops.
pub struct BundleRef {
    bundle: Arc<Bundle>,
    registry: Weak<RegistryShared>,
}

impl BundleRef {
    /// Count a new reference. Registry-owned bundles must be referenced
    /// under the registry lock.
    pub(crate) fn new(bundle: Arc<Bundle>, registry: Weak<RegistryShared>) -> Self {
        bundle.refs.fetch_add(1, Ordering::AcqRel);
        Self { bundle, registry }
    }

    /// Reference to a bundle no registry tracks.
    pub(crate) fn detached(bundle: Bundle) -> Self {
        Self::new(Arc::new(bundle), Weak::new())
    }

    /// Whether two references point to the same bundle.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.bundle, &b.bundle)
    }

    pub(crate) fn arc(&self) -> &Arc<Bundle> {
        &self.bundle
    }
}

impl Clone for BundleRef {
    fn clone(&self) -> Self {
        self.bundle.refs.fetch_add(1, Ordering::AcqRel);
        Self {
            bundle: Arc::clone(&self.bundle),
            registry: self.registry.clone(),
        }
    }
}

impl Drop for BundleRef {
    fn drop(&mut self) {
        if self.bundle.refs.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        match self.registry.upgrade() {
            Some(registry) => registry.release_unreferenced(&self.bundle),
            None => self.bundle.release(false),
        }
    }
}

impl Deref for BundleRef {
    type Target = Bundle;

    fn deref(&self) -> &Bundle {
        &self.bundle
    }
}

impl fmt::Debug for BundleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.bundle.fmt(f)
    }
}
