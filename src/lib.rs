//! # Alembic Cache
//!
//! Thread-safe resolution and caching over hierarchical, time-sampled scene
//! archives in the style of Alembic.
//!
//! An archive is one file or an ordered stack of files layered into a single
//! tree. Opening it through the [`ArchiveRegistry`](cache::ArchiveRegistry)
//! yields a shared bundle that answers, for any node path and time:
//! - which node the path names
//! - the node's local and world transform, and whether it is animated
//! - the node's visibility, resolved through its ancestors
//! - the node's authored bounds
//!
//! Answers are cached per bundle. Values that cannot change over time are
//! kept for the lifetime of the bundle; time-varying ones in capped caches.
//!
//! ## Modules
//!
//! - [`util`] - Errors and math types
//! - [`core`] - Reader traits, time sampling and capped caches
//! - [`geom`] - Node kinds, transforms and visibility values
//! - [`scene`] - Layered JSON scene archives, the default reader
//! - [`cache`] - Registry, bundles, resolvers and tree walking
//! - [`logging`] - Subscriber setup for `tracing` output
//!
//! ## Example
//!
//! ```ignore
//! use alembic_cache::prelude::*;
//!
//! let registry = ArchiveRegistry::new();
//! let bundle = registry.open(&["shot.json", "shot_fix.json"]);
//! let mesh = bundle.find_node("/xform1/mesh").expect("missing node");
//!
//! let xform = bundle.world_transform(&mesh, 5.0).unwrap();
//! let vis = bundle.visibility(&mesh, 5.0, true).unwrap();
//! println!("{:?} {:?}", xform.world, vis.visibility);
//! ```

pub mod util;
pub mod core;
pub mod geom;
pub mod scene;
pub mod cache;
pub mod logging;

// Re-export commonly used types
pub use util::{Error, Result};

/// Everything needed for typical registry queries.
pub mod prelude {
    pub use crate::cache::{
        ArchiveEventHandler, ArchiveRegistry, BundleRef, NodeHandle, RegistryConfig, TimeRange,
        WalkStatus, Walker,
    };
    pub use crate::geom::{NodeKind, ObjectVisibility};
    pub use crate::util::{BBox3d, Chrono, Error, Result, M44d};
}
