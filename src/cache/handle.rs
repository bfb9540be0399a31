//! Archive keys and node handles.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::ObjectRef;
use crate::geom::NodeKind;

/// Identity of a logical archive: its files in layering order.
///
/// Relative paths are made absolute against the current directory. Order is
/// significant, so `[a, b]` and `[b, a]` are different archives.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ArchiveKey(Arc<[PathBuf]>);

impl ArchiveKey {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths: Vec<PathBuf> = paths
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf())
            })
            .collect();
        Self(paths.into())
    }

    /// Files of the archive.
    #[inline]
    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `path` is one of the archive's files.
    pub fn contains(&self, path: &Path) -> bool {
        self.0.iter().any(|p| p == path)
    }

    #[inline]
    pub(crate) fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self == other
    }
}

impl fmt::Debug for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{}", p.display())?;
        }
        Ok(())
    }
}

/// A resolved node of an open archive.
///
/// Handles are cheap to clone. Two handles are equal when they name the same
/// path in the same archive, even if they were resolved by different bundles.
#[derive(Clone)]
pub struct NodeHandle {
    archive: ArchiveKey,
    bundle_id: u64,
    path: Arc<str>,
    object: ObjectRef,
}

impl NodeHandle {
    pub(crate) fn new(archive: ArchiveKey, bundle_id: u64, path: Arc<str>, object: ObjectRef) -> Self {
        Self {
            archive,
            bundle_id,
            path,
            object,
        }
    }

    /// Handle for a child object of this node.
    pub(crate) fn child(&self, object: ObjectRef) -> Self {
        let path: Arc<str> = Arc::from(join_path(&self.path, object.name()));
        Self {
            archive: self.archive.clone(),
            bundle_id: self.bundle_id,
            path,
            object,
        }
    }

    /// Full path, `/` for the archive top.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub(crate) fn path_arc(&self) -> &Arc<str> {
        &self.path
    }

    /// Last path component, empty for the archive top.
    pub fn name(&self) -> &str {
        match self.path.rfind('/') {
            Some(i) => &self.path[i + 1..],
            None => &self.path,
        }
    }

    /// Path of the parent node, `None` for the archive top.
    pub fn parent_path(&self) -> Option<&str> {
        parent_path(&self.path)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        &*self.path == "/"
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.object.kind()
    }

    /// Archive the node belongs to.
    #[inline]
    pub fn archive(&self) -> &ArchiveKey {
        &self.archive
    }

    /// Underlying reader object.
    #[inline]
    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    #[inline]
    pub(crate) fn bundle_id(&self) -> u64 {
        self.bundle_id
    }
}

impl PartialEq for NodeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.archive.same(&other.archive)
    }
}

impl Eq for NodeHandle {}

impl Hash for NodeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.archive.hash(state);
        self.path.hash(state);
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("archive", &self.archive)
            .field("path", &self.path)
            .field("kind", &self.kind())
            .finish()
    }
}

pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

pub(crate) fn parent_path(path: &str) -> Option<&str> {
    if path == "/" || path.is_empty() {
        return None;
    }
    match path.rfind('/') {
        Some(0) | None => Some("/"),
        Some(i) => Some(&path[..i]),
    }
}
