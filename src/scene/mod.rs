//! Layered scene archives stored as JSON documents.
//!
//! This is the archive reader the registry uses by default. Each file holds a
//! [`SceneDocument`]; opening several files overlays them in order, so later
//! files can add nodes or replace properties of nodes from earlier ones.
//!
//! ```ignore
//! use alembic_cache::scene::{NodeDesc, SceneDocument};
//! use alembic_cache::geom::XformOp;
//!
//! let doc = SceneDocument::new(vec![
//!     NodeDesc::xform("root", vec![XformOp::Translate([1.0, 0.0, 0.0])]),
//! ]);
//! doc.write("shot.json".as_ref())?;
//! ```

mod desc;
mod node;

pub use desc::{
    BoundsDesc, NodeDesc, SceneDocument, TimedBounds, TimedVisibility, TimedXform,
    VisibilityDesc, XformDesc,
};
pub use node::{SceneArchive, SceneNode};

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::{ArchiveOpener, ArchiveReader};
use crate::util::Result;

/// Opens [`SceneArchive`]s from scene files.
#[derive(Clone, Copy, Debug, Default)]
pub struct SceneOpener;

impl ArchiveOpener for SceneOpener {
    fn open(&self, paths: &[PathBuf]) -> Result<Arc<dyn ArchiveReader>> {
        Ok(Arc::new(SceneArchive::open(paths)?))
    }
}
