//! Resolution and caching engine.
//!
//! - [`ArchiveRegistry`] - shared table of open archives, one [`Bundle`] per
//!   ordered file list
//! - [`Bundle`] - an open archive with its path, transform, visibility and
//!   bounds caches
//! - [`Walker`] - depth-first traversal in natural name order
//!
//! All bundle queries take `&self` and may be issued from any number of
//! threads at once.

mod bounds;
mod bundle;
mod config;
mod events;
mod handle;
mod path;
mod registry;
mod transform;
mod visibility;
mod walker;

pub use bounds::{BoundsCache, BoundsResult};
pub use bundle::{Bundle, BundleRef, CacheStats};
pub use config::RegistryConfig;
pub use events::{ArchiveEventHandler, ArchiveEventHandlerPtr};
pub use handle::{ArchiveKey, NodeHandle};
pub use path::PathCache;
pub use registry::ArchiveRegistry;
pub use transform::{TransformCache, WorldXform};
pub use visibility::{VisibilityCache, VisibilityResult};
pub use walker::{natural_cmp, walk, walk_children, walk_tree, TimeRange, WalkStatus, Walker};
