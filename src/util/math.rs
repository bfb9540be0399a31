//! Math type re-exports and scene-specific math utilities.
//!
//! Transforms are double precision throughout. Archives store matrices
//! row-major with row-vector convention (`p' = p * M`); glam is column-major
//! with column vectors, so the two layouts are transposes of each other and
//! `A * B` in archive terms is `B * A` in glam terms.

pub use glam::{DMat3, DMat4, DQuat, DVec3, DVec4};

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// 4x4 double precision matrix used for local and world transforms.
pub type M44d = DMat4;

/// Chrono type - time value (seconds).
pub type Chrono = f64;

/// Build a matrix from 16 row-major values as stored in an archive.
#[inline]
pub fn matrix_from_rows(v: &[f64; 16]) -> M44d {
    // Row-major rows become glam columns.
    DMat4::from_cols_array(v)
}

/// Flatten a matrix to 16 row-major values.
#[inline]
pub fn matrix_to_rows(m: &M44d) -> [f64; 16] {
    m.to_cols_array()
}

/// Compose a local transform under its parent's world transform.
///
/// Equivalent to `local * parent` in row-vector convention.
#[inline]
pub fn compose(local: &M44d, parent_world: &M44d) -> M44d {
    *parent_world * *local
}

/// 3D bounding box with double precision.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BBox3d {
    pub min: DVec3,
    pub max: DVec3,
}

impl BBox3d {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: DVec3::splat(f64::INFINITY),
        max: DVec3::splat(f64::NEG_INFINITY),
    };

    /// Create a new bounding box from min and max points.
    #[inline]
    pub const fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Create from `[x, y, z]` triples.
    #[inline]
    pub fn from_arrays(min: [f64; 3], max: [f64; 3]) -> Self {
        Self::new(DVec3::from_array(min), DVec3::from_array(max))
    }

    /// Check if this box is empty (has no volume).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this box to include a point.
    #[inline]
    pub fn expand_by_point(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expand this box to include another box.
    #[inline]
    pub fn expand_by_box(&mut self, other: &Self) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// Get the center of the box.
    #[inline]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size (extents) of the box.
    #[inline]
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Axis-aligned box enclosing this box after transformation.
    pub fn transformed(&self, m: &M44d) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut out = Self::EMPTY;
        for i in 0..8 {
            let corner = DVec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand_by_point(m.transform_point3(corner));
        }
        out
    }
}

impl Default for BBox3d {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BBox3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BBox3d({:?} - {:?})", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox3d() {
        let mut b = BBox3d::EMPTY;
        assert!(b.is_empty());

        b.expand_by_point(DVec3::new(-1.0, -1.0, -1.0));
        b.expand_by_point(DVec3::new(1.0, 1.0, 1.0));

        assert_eq!(b.center(), DVec3::ZERO);
        assert_eq!(b.size(), DVec3::splat(2.0));
    }

    #[test]
    fn test_bbox_pod() {
        assert_eq!(std::mem::size_of::<BBox3d>(), 48);
        let b = BBox3d::from_arrays([0.0; 3], [1.0; 3]);
        let bytes: &[u8] = bytemuck::bytes_of(&b);
        assert_eq!(bytes.len(), 48);
    }

    #[test]
    fn test_bbox_transformed() {
        let b = BBox3d::from_arrays([0.0; 3], [1.0; 3]);
        let moved = b.transformed(&DMat4::from_translation(DVec3::new(2.0, 0.0, 0.0)));
        assert_eq!(moved.min, DVec3::new(2.0, 0.0, 0.0));
        assert_eq!(moved.max, DVec3::new(3.0, 1.0, 1.0));
    }

    #[test]
    fn test_row_major_roundtrip() {
        // Translation lives in the last row in row-major storage.
        let rows = [
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            4.0, 5.0, 6.0, 1.0,
        ];
        let m = matrix_from_rows(&rows);
        assert_eq!(m.transform_point3(DVec3::ZERO), DVec3::new(4.0, 5.0, 6.0));
        assert_eq!(matrix_to_rows(&m), rows);
    }

    #[test]
    fn test_compose_order() {
        let parent = DMat4::from_scale(DVec3::splat(2.0));
        let local = DMat4::from_translation(DVec3::new(1.0, 0.0, 0.0));
        // Local translation is scaled by the parent.
        let world = compose(&local, &parent);
        assert_eq!(world.transform_point3(DVec3::ZERO), DVec3::new(2.0, 0.0, 0.0));
    }
}
