//! Depth-first traversal of an archive.
//!
//! Children are visited in natural name order, so `shape2` comes before
//! `shape10`. A [`Walker`] decides per node whether to descend and can stop
//! the whole traversal.

use std::cmp::Ordering;

use crate::cache::handle::NodeHandle;
use crate::geom::NodeKind;
use crate::util::Chrono;

/// Visitor driven by [`walk_tree`].
pub trait Walker {
    /// Called once with the starting node. Returning false skips the walk.
    fn pre_process(&mut self, _node: &NodeHandle) -> bool {
        true
    }

    /// Visit a node. Return true to descend into its children.
    fn process(&mut self, node: &NodeHandle) -> bool;

    /// Checked before each node; true stops the traversal.
    fn interrupted(&self) -> bool {
        false
    }
}

/// Outcome of a walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkStatus {
    Completed,
    Interrupted,
    /// The archive could not be opened or was purged.
    BadArchive,
}

impl WalkStatus {
    #[inline]
    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

/// Run `walker` over the subtree at `start`.
pub fn walk<W: Walker + ?Sized>(start: &NodeHandle, walker: &mut W) -> WalkStatus {
    if !walker.pre_process(start) {
        return WalkStatus::Interrupted;
    }
    if walk_tree(start, walker) {
        WalkStatus::Completed
    } else {
        WalkStatus::Interrupted
    }
}

/// Process `node` and, if the walker asks for it, its subtree. Returns false
/// once the walker is interrupted.
pub fn walk_tree<W: Walker + ?Sized>(node: &NodeHandle, walker: &mut W) -> bool {
    if walker.interrupted() {
        return false;
    }
    if walker.process(node) {
        return walk_children(node, walker);
    }
    true
}

/// Walk each child of `node` in natural name order.
///
/// Walkers that handle some children themselves call this from
/// [`Walker::process`] and return false to avoid a second descent.
pub fn walk_children<W: Walker + ?Sized>(node: &NodeHandle, walker: &mut W) -> bool {
    let object = node.object();
    let mut children: Vec<NodeHandle> = (0..object.num_children())
        .filter_map(|i| object.child(i))
        .map(|child| node.child(child))
        .collect();
    children.sort_by(|a, b| natural_cmp(a.name(), b.name()));

    for child in &children {
        if !walk_tree(child, walker) {
            return false;
        }
    }
    true
}

/// Compare names treating embedded digit runs as numbers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (ab, bb) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);
    while i < ab.len() && j < bb.len() {
        if ab[i].is_ascii_digit() && bb[j].is_ascii_digit() {
            let (si, sj) = (i, j);
            while i < ab.len() && ab[i].is_ascii_digit() {
                i += 1;
            }
            while j < bb.len() && bb[j].is_ascii_digit() {
                j += 1;
            }
            let na = trim_zeros(&ab[si..i]);
            let nb = trim_zeros(&bb[sj..j]);
            let ord = na.len().cmp(&nb.len()).then_with(|| na.cmp(nb));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            match ab[i].cmp(&bb[j]) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                ord => return ord,
            }
        }
    }
    (ab.len() - i)
        .cmp(&(bb.len() - j))
        .then_with(|| a.cmp(b))
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let start = digits.iter().position(|&d| d != b'0').unwrap_or(digits.len());
    &digits[start..]
}

/// Time span covered by the nodes it has seen.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimeRange {
    start: Chrono,
    end: Chrono,
    computed: bool,
}

impl TimeRange {
    /// Widen the range by the sampled times of `node`.
    pub fn compute_time_range(&mut self, node: &NodeHandle) {
        let Some((sampling, count)) = node.object().time_sampling() else {
            return;
        };
        if count == 0 {
            return;
        }
        let (start, end) = (sampling.start_time(), sampling.end_time(count));
        if self.computed {
            self.start = self.start.min(start);
            self.end = self.end.max(end);
        } else {
            self.start = start;
            self.end = end;
            self.computed = true;
        }
    }

    /// True once some node contributed and the range is not a single instant.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.computed && self.start != self.end
    }

    #[inline]
    pub fn is_computed(&self) -> bool {
        self.computed
    }

    #[inline]
    pub fn start(&self) -> Chrono {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Chrono {
        self.end
    }
}

/// Accumulates the time range of every node in a subtree.
#[derive(Default)]
pub(crate) struct TimeRangeWalker {
    pub range: TimeRange,
}

impl Walker for TimeRangeWalker {
    fn process(&mut self, node: &NodeHandle) -> bool {
        self.range.compute_time_range(node);
        true
    }
}

/// Collects node paths, optionally skipping face sets.
pub(crate) struct PathListWalker {
    pub include_face_sets: bool,
    pub paths: Vec<String>,
}

impl Walker for PathListWalker {
    fn process(&mut self, node: &NodeHandle) -> bool {
        if !node.is_root() && (self.include_face_sets || node.kind() != NodeKind::FaceSet) {
            self.paths.push(node.path().to_string());
        }
        true
    }
}
