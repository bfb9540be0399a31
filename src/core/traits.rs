//! Reader interfaces the caches are built on.
//!
//! An [`ArchiveOpener`] turns an ordered list of files into one logical
//! [`ArchiveReader`]; readers expose a tree of [`ObjectReader`] nodes. Readers
//! must tolerate concurrent calls once opened.

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::{BoundsSample, TimeSampling, VisibilitySample};
use crate::geom::{LocalXform, NodeKind};
use crate::util::{Chrono, Result};

/// Shared handle to a node inside an open archive.
pub type ObjectRef = Arc<dyn ObjectReader>;

/// Reader interface for an object in the hierarchy.
pub trait ObjectReader: Send + Sync {
    /// Object name (empty for the archive top).
    fn name(&self) -> &str;

    /// Full slash-delimited path, `/` for the archive top.
    fn full_name(&self) -> &str;

    /// Node kind.
    fn kind(&self) -> NodeKind;

    /// Get the number of child objects.
    fn num_children(&self) -> usize;

    /// Get a child by index.
    fn child(&self, index: usize) -> Option<ObjectRef>;

    /// Get a child by name.
    fn child_by_name(&self, name: &str) -> Option<ObjectRef>;

    /// Local transform at `time`, `None` if the node has none or it cannot
    /// be read.
    fn local_transform(&self, time: Chrono) -> Option<LocalXform>;

    /// Own (non-inherited) visibility at `time`, `None` without a visibility
    /// property.
    fn visibility(&self, time: Chrono) -> Option<VisibilitySample>;

    /// Authored bounds at `time`, `None` if the node has none.
    fn bounds(&self, time: Chrono) -> Option<BoundsSample>;

    /// Time sampling of the node's animated data and its sample count.
    fn time_sampling(&self) -> Option<(&TimeSampling, usize)> {
        None
    }
}

/// Reader interface for an open, possibly layered archive.
pub trait ArchiveReader: Send + Sync {
    /// Display name of the archive.
    fn name(&self) -> &str;

    /// Files composing the archive, in layering order.
    fn filenames(&self) -> &[PathBuf];

    /// Get the root object.
    fn root(&self) -> ObjectRef;
}

/// Opens archives for the registry.
pub trait ArchiveOpener: Send + Sync {
    /// Open `paths` as one logical archive, later files overlaying earlier.
    fn open(&self, paths: &[PathBuf]) -> Result<Arc<dyn ArchiveReader>>;
}
