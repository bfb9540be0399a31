//! Path to node resolution.
//!
//! Resolved nodes are remembered by full path. A lookup first tries the
//! whole path, then the deepest cached ancestor, and only walks the reader
//! for the remaining components. Failed lookups leave the cache untouched.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::cache::handle::{ArchiveKey, NodeHandle};
use crate::core::{CappedMap, ObjectRef};

/// Path cache of one archive bundle.
pub struct PathCache {
    objects: Mutex<CappedMap<Arc<str>, ObjectRef>>,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            objects: Mutex::new(CappedMap::new(capacity)),
        }
    }

    /// Resolve `path` below `root`.
    ///
    /// Empty components are ignored, so `a/b`, `/a/b` and `/a//b/` all name
    /// the same node. An empty path or `/` resolves to the archive top.
    pub fn resolve(
        &self,
        archive: &ArchiveKey,
        bundle_id: u64,
        root: &ObjectRef,
        path: &str,
    ) -> Option<NodeHandle> {
        let components: SmallVec<[&str; 16]> = path.split('/').filter(|c| !c.is_empty()).collect();
        if components.is_empty() {
            return Some(NodeHandle::new(
                archive.clone(),
                bundle_id,
                Arc::from("/"),
                Arc::clone(root),
            ));
        }

        // Normalized path and the end offset of each prefix.
        let mut normalized = String::with_capacity(path.len() + 1);
        let mut ends: SmallVec<[usize; 16]> = SmallVec::with_capacity(components.len());
        for c in &components {
            normalized.push('/');
            normalized.push_str(c);
            ends.push(normalized.len());
        }

        let (start, mut object) = {
            let objects = self.objects.lock();
            if let Some(hit) = objects.get(normalized.as_str()) {
                return Some(NodeHandle::new(
                    archive.clone(),
                    bundle_id,
                    Arc::from(normalized.as_str()),
                    Arc::clone(hit),
                ));
            }
            ends[..ends.len() - 1]
                .iter()
                .enumerate()
                .rev()
                .find_map(|(i, &end)| {
                    objects
                        .get(&normalized[..end])
                        .map(|obj| (i + 1, Arc::clone(obj)))
                })
                .unwrap_or_else(|| (0, Arc::clone(root)))
        };

        let mut resolved: SmallVec<[(Arc<str>, ObjectRef); 8]> = SmallVec::new();
        for (i, name) in components.iter().enumerate().skip(start) {
            object = object.child_by_name(name)?;
            resolved.push((Arc::from(&normalized[..ends[i]]), Arc::clone(&object)));
        }

        let full = match resolved.last() {
            Some((p, _)) => Arc::clone(p),
            None => Arc::from(normalized.as_str()),
        };
        {
            let mut objects = self.objects.lock();
            for (p, obj) in resolved {
                objects.insert(p, obj);
            }
        }
        tracing::trace!("resolved {}", full);
        Some(NodeHandle::new(archive.clone(), bundle_id, full, object))
    }

    /// Number of cached paths.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.objects.lock().clear();
    }
}
