//! Authored bounds lookup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::handle::NodeHandle;
use crate::core::{CappedCache, SampleKey};
use crate::util::{BBox3d, Chrono};

/// Bounds of a node at one time, in its local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundsResult {
    pub bbox: BBox3d,
    pub is_constant: bool,
}

/// Bounds caches of one archive bundle.
///
/// Constant bounds and the absence of bounds are kept per path; animated
/// bounds per `(path, time)`.
pub struct BoundsCache {
    statics: RwLock<HashMap<Arc<str>, Option<BBox3d>>>,
    dynamic: CappedCache<SampleKey, BBox3d>,
}

impl BoundsCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            statics: RwLock::new(HashMap::new()),
            dynamic: CappedCache::new(capacity),
        }
    }

    /// Bounds of `node` at `time`, `None` if the node has none.
    pub fn bounds(&self, node: &NodeHandle, time: Chrono) -> Option<BoundsResult> {
        if let Some(cached) = self.statics.read().get(node.path()) {
            return cached.map(|bbox| BoundsResult { bbox, is_constant: true });
        }
        let key = SampleKey::new(Arc::clone(node.path_arc()), time);
        if let Some(bbox) = self.dynamic.get(&key) {
            return Some(BoundsResult { bbox, is_constant: false });
        }

        match node.object().bounds(time) {
            None => {
                self.statics.write().insert(Arc::clone(node.path_arc()), None);
                None
            }
            Some(sample) if sample.is_constant => {
                self.statics
                    .write()
                    .insert(Arc::clone(node.path_arc()), Some(sample.bbox));
                Some(BoundsResult { bbox: sample.bbox, is_constant: true })
            }
            Some(sample) => {
                let bbox = self.dynamic.insert(key, sample.bbox);
                Some(BoundsResult { bbox, is_constant: false })
            }
        }
    }

    /// Number of static and animated entries.
    pub fn len(&self) -> (usize, usize) {
        (self.statics.read().len(), self.dynamic.len())
    }

    pub fn clear(&self) {
        self.statics.write().clear();
        self.dynamic.clear();
    }
}
