//! Utility types and functions.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam, [`BBox3d`] and matrix layout helpers

mod error;
mod math;

pub use error::*;
pub use math::*;
