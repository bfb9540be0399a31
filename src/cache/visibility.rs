//! Visibility resolution with inheritance.
//!
//! Each node's own visibility and its fully resolved visibility are cached
//! separately. Values that can never change (the node and every ancestor
//! consulted are constant) go into unbounded static tables, the rest into
//! capped per-time tables.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::handle::NodeHandle;
use crate::core::{CappedMap, SampleKey};
use crate::geom::ObjectVisibility;
use crate::util::Chrono;

/// Resolved visibility of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibilityResult {
    pub visibility: ObjectVisibility,
    /// Whether any node consulted has animated visibility.
    pub animated: bool,
}

struct Tables {
    own_static: HashMap<Arc<str>, ObjectVisibility>,
    full_static: HashMap<Arc<str>, ObjectVisibility>,
    own_dynamic: CappedMap<SampleKey, ObjectVisibility>,
    full_dynamic: CappedMap<SampleKey, ObjectVisibility>,
}

/// Visibility caches of one archive bundle.
pub struct VisibilityCache {
    tables: Mutex<Tables>,
}

impl VisibilityCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            tables: Mutex::new(Tables {
                own_static: HashMap::new(),
                full_static: HashMap::new(),
                own_dynamic: CappedMap::new(capacity),
                full_dynamic: CappedMap::new(capacity),
            }),
        }
    }

    /// Visibility of `node` at `time`.
    ///
    /// With `include_ancestors`, a deferred node takes its parent's resolved
    /// visibility and the archive top counts as visible. Without it, the
    /// node's own value is returned, which may be deferred.
    pub fn visibility(
        &self,
        node: &NodeHandle,
        time: Chrono,
        include_ancestors: bool,
        lookup: &dyn Fn(&str) -> Option<NodeHandle>,
    ) -> VisibilityResult {
        let mut tables = self.tables.lock();
        let (visibility, animated) = resolve(&mut tables, node, time, include_ancestors, lookup);
        VisibilityResult { visibility, animated }
    }

    /// Number of entries across all tables.
    pub fn len(&self) -> usize {
        let t = self.tables.lock();
        t.own_static.len() + t.full_static.len() + t.own_dynamic.len() + t.full_dynamic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut t = self.tables.lock();
        t.own_static.clear();
        t.full_static.clear();
        t.own_dynamic.clear();
        t.full_dynamic.clear();
    }
}

fn resolve(
    t: &mut Tables,
    node: &NodeHandle,
    time: Chrono,
    check_parent: bool,
    lookup: &dyn Fn(&str) -> Option<NodeHandle>,
) -> (ObjectVisibility, bool) {
    let path = node.path();
    let key = SampleKey::new(Arc::clone(node.path_arc()), time);

    if check_parent {
        if let Some(&v) = t.full_static.get(path) {
            return (v, false);
        }
        if let Some(&v) = t.full_dynamic.get(&key) {
            return (v, true);
        }
    }

    let (mut vis, mut animated) = if let Some(&v) = t.own_static.get(path) {
        (v, false)
    } else if let Some(&v) = t.own_dynamic.get(&key) {
        (v, true)
    } else {
        let (v, animated) = match node.object().visibility(time) {
            Some(sample) => (sample.value, !sample.is_constant),
            None => (ObjectVisibility::Deferred, false),
        };
        if animated {
            t.own_dynamic.insert(key.clone(), v);
        } else {
            t.own_static.insert(Arc::clone(node.path_arc()), v);
        }
        (v, animated)
    };

    if !check_parent || !vis.is_deferred() {
        return (vis, animated);
    }

    let parent = node.parent_path().and_then(lookup);
    vis = match parent {
        Some(parent) => {
            let (v, parent_animated) = resolve(t, &parent, time, true, lookup);
            animated |= parent_animated;
            v
        }
        None => ObjectVisibility::Visible,
    };

    if animated {
        t.full_dynamic.insert(key, vis);
    } else {
        t.full_static.insert(Arc::clone(node.path_arc()), vis);
    }
    (vis, animated)
}
