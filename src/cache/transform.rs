//! World transform resolution.
//!
//! Two tiers:
//! - a static table of every xform whose whole chain from the archive top is
//!   constant, built once per bundle and read without locking afterwards
//! - a capped `(path, time)` cache for everything else
//!
//! Nodes that carry no transform report the world transform of their nearest
//! transform-bearing ancestor; the archive top is the identity.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::cache::handle::{join_path, NodeHandle};
use crate::core::{CappedCache, ObjectRef, SampleKey};
use crate::geom::LocalXform;
use crate::util::{compose, Chrono, M44d};

/// Local and world transform of a node at one time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldXform {
    pub local: M44d,
    pub world: M44d,
    /// True when neither the node nor any ancestor it inherits from is
    /// animated.
    pub is_constant: bool,
    /// True when the node's own local transform is not animated.
    pub local_constant: bool,
    pub inherits: bool,
}

impl WorldXform {
    pub const IDENTITY: Self = Self {
        local: M44d::IDENTITY,
        world: M44d::IDENTITY,
        is_constant: true,
        local_constant: true,
        inherits: true,
    };

    /// Combine a local transform with the world transform of its parent.
    pub fn from_local(local: &LocalXform, parent: &WorldXform) -> Self {
        if local.inherits {
            Self {
                local: local.matrix,
                world: compose(&local.matrix, &parent.world),
                is_constant: local.is_constant && parent.is_constant,
                local_constant: local.is_constant,
                inherits: true,
            }
        } else {
            Self {
                local: local.matrix,
                world: local.matrix,
                is_constant: local.is_constant,
                local_constant: local.is_constant,
                inherits: false,
            }
        }
    }
}

type StaticTable = HashMap<Arc<str>, WorldXform>;

/// Transform caches of one archive bundle.
pub struct TransformCache {
    statics: OnceLock<StaticTable>,
    dynamic: CappedCache<SampleKey, WorldXform>,
    compute: Mutex<()>,
}

impl TransformCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            statics: OnceLock::new(),
            dynamic: CappedCache::new(capacity),
            compute: Mutex::new(()),
        }
    }

    /// The static table, built on first use.
    pub fn static_table(&self, root: &ObjectRef) -> &HashMap<Arc<str>, WorldXform> {
        self.statics.get_or_init(|| build_static_table(root))
    }

    /// Whether the static table has been built.
    pub fn is_static_built(&self) -> bool {
        self.statics.get().is_some()
    }

    /// World transform of `node` at `time`.
    ///
    /// `lookup` resolves ancestor paths. Returns `None` when an ancestor
    /// cannot be resolved.
    pub fn world_transform(
        &self,
        root: &ObjectRef,
        node: &NodeHandle,
        time: Chrono,
        lookup: &dyn Fn(&str) -> Option<NodeHandle>,
    ) -> Option<WorldXform> {
        let Some(node) = transform_owner(node, lookup)? else {
            return Some(WorldXform::IDENTITY);
        };

        let statics = self.static_table(root);
        if let Some(x) = statics.get(node.path()) {
            return Some(*x);
        }
        let key = SampleKey::new(Arc::clone(node.path_arc()), time);
        if let Some(x) = self.dynamic.get(&key) {
            return Some(x);
        }

        let _guard = self.compute.lock();
        if let Some(x) = self.dynamic.get(&key) {
            return Some(x);
        }

        // Collect the chain up to the first ancestor with a known world
        // transform, or the first node that does not inherit.
        let mut chain: SmallVec<[(Arc<str>, LocalXform); 8]> = SmallVec::new();
        let mut base = WorldXform::IDENTITY;
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if !current.kind().is_transform() {
                cursor = parent_of(&current, lookup)?;
                continue;
            }
            if !chain.is_empty() {
                if let Some(x) = statics.get(current.path()) {
                    base = *x;
                    break;
                }
                let key = SampleKey::new(Arc::clone(current.path_arc()), time);
                if let Some(x) = self.dynamic.get(&key) {
                    base = x;
                    break;
                }
            }
            let local = read_local(&current, time);
            chain.push((Arc::clone(current.path_arc()), local));
            if !local.inherits {
                break;
            }
            cursor = parent_of(&current, lookup)?;
        }

        let mut parent = base;
        for (path, local) in chain.into_iter().rev() {
            let x = WorldXform::from_local(&local, &parent);
            parent = self.dynamic.insert(SampleKey::new(path, time), x);
        }
        Some(parent)
    }

    /// Local transform of `node` at `time`, without composing ancestors.
    pub fn local_transform(&self, root: &ObjectRef, node: &NodeHandle, time: Chrono) -> LocalXform {
        if !node.kind().is_transform() {
            return LocalXform::IDENTITY;
        }
        let cached = self.static_table(root).get(node.path()).copied().or_else(|| {
            self.dynamic
                .get(&SampleKey::new(Arc::clone(node.path_arc()), time))
        });
        match cached {
            Some(x) => LocalXform {
                matrix: x.local,
                is_constant: x.local_constant,
                inherits: x.inherits,
            },
            None => read_local(node, time),
        }
    }

    /// Whether the transform governing `node` may change over time.
    ///
    /// Anything below an xform outside the static table counts as animated;
    /// nodes with no transform-bearing ancestor are not.
    pub fn is_animated(
        &self,
        root: &ObjectRef,
        node: &NodeHandle,
        lookup: &dyn Fn(&str) -> Option<NodeHandle>,
    ) -> bool {
        match transform_owner(node, lookup) {
            Some(Some(owner)) => !self.static_table(root).contains_key(owner.path()),
            Some(None) => false,
            None => true,
        }
    }

    /// Number of static and animated entries.
    pub fn len(&self) -> (usize, usize) {
        (self.statics.get().map_or(0, |s| s.len()), self.dynamic.len())
    }

    /// Drop animated entries. The static table lives as long as the bundle.
    pub fn clear(&self) {
        self.dynamic.clear();
    }
}

/// Unreadable transforms fall back to a constant, inheriting identity.
fn read_local(node: &NodeHandle, time: Chrono) -> LocalXform {
    node.object()
        .local_transform(time)
        .unwrap_or(LocalXform::IDENTITY)
}

fn parent_of(
    node: &NodeHandle,
    lookup: &dyn Fn(&str) -> Option<NodeHandle>,
) -> Option<Option<NodeHandle>> {
    match node.parent_path() {
        Some(p) => lookup(p).map(Some),
        None => Some(None),
    }
}

/// Nearest node at or above `node` that carries a transform. The inner
/// `None` means there is none; the outer one that an ancestor failed to
/// resolve.
fn transform_owner(
    node: &NodeHandle,
    lookup: &dyn Fn(&str) -> Option<NodeHandle>,
) -> Option<Option<NodeHandle>> {
    let mut current = node.clone();
    loop {
        if current.kind().is_transform() {
            return Some(Some(current));
        }
        match parent_of(&current, lookup)? {
            Some(parent) => current = parent,
            None => return Some(None),
        }
    }
}

fn build_static_table(root: &ObjectRef) -> StaticTable {
    let _span = tracing::info_span!("build_static_transforms").entered();

    let tops: Vec<ObjectRef> = (0..root.num_children())
        .filter_map(|i| root.child(i))
        .collect();
    let table: StaticTable = tops
        .par_iter()
        .flat_map_iter(|top| {
            let mut out = Vec::new();
            collect_static(top, "/", &WorldXform::IDENTITY, &mut out);
            out
        })
        .collect();

    tracing::debug!("static transform table: {} entries", table.len());
    table
}

fn collect_static(
    object: &ObjectRef,
    parent_path: &str,
    parent: &WorldXform,
    out: &mut Vec<(Arc<str>, WorldXform)>,
) {
    let path = join_path(parent_path, object.name());
    // Groups and shapes pass their parent's transform through.
    let x = if object.kind().is_transform() {
        let local = object.local_transform(0.0).unwrap_or(LocalXform::IDENTITY);
        if !local.is_constant {
            return;
        }
        let x = WorldXform::from_local(&local, parent);
        out.push((Arc::from(path.as_str()), x));
        x
    } else {
        *parent
    };
    for i in 0..object.num_children() {
        if let Some(child) = object.child(i) {
            collect_static(&child, &path, &x, out);
        }
    }
}
