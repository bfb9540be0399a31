//! Xform (transform) samples.
//!
//! A local transform is stored as an ordered stack of operations, the same
//! way Alembic's Xform schema stores it, and collapsed to a single matrix on
//! read.

use serde::{Deserialize, Serialize};

use crate::util::{matrix_from_rows, DMat4, DVec3, M44d};

/// A single transform operation. Angles are in degrees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XformOp {
    Scale([f64; 3]),
    Translate([f64; 3]),
    RotateX(f64),
    RotateY(f64),
    RotateZ(f64),
    /// Axis + angle.
    Rotate { axis: [f64; 3], angle: f64 },
    /// Full matrix, 16 row-major values.
    Matrix([f64; 16]),
}

impl XformOp {
    /// Matrix for this operation alone.
    pub fn matrix(&self) -> M44d {
        match self {
            Self::Scale(s) => DMat4::from_scale(DVec3::from_array(*s)),
            Self::Translate(t) => DMat4::from_translation(DVec3::from_array(*t)),
            Self::RotateX(a) => DMat4::from_rotation_x(a.to_radians()),
            Self::RotateY(a) => DMat4::from_rotation_y(a.to_radians()),
            Self::RotateZ(a) => DMat4::from_rotation_z(a.to_radians()),
            Self::Rotate { axis, angle } => {
                let axis = DVec3::from_array(*axis).normalize_or_zero();
                if axis.length_squared() > 0.0001 {
                    DMat4::from_axis_angle(axis, angle.to_radians())
                } else {
                    DMat4::IDENTITY
                }
            }
            Self::Matrix(rows) => matrix_from_rows(rows),
        }
    }
}

/// Transform sample with decomposed operations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct XformSample {
    /// Transform operations in order.
    #[serde(default)]
    pub ops: Vec<XformOp>,
}

impl XformSample {
    /// Create identity xform.
    pub fn identity() -> Self {
        Self { ops: Vec::new() }
    }

    /// Create a sample from a list of operations.
    pub fn from_ops(ops: Vec<XformOp>) -> Self {
        Self { ops }
    }

    /// Compute the final 4x4 transformation matrix.
    pub fn matrix(&self) -> M44d {
        // Alembic left-multiplies row vectors (ret = m * ret); for glam column
        // vectors the equivalent is result = result * m.
        self.ops
            .iter()
            .fold(DMat4::IDENTITY, |result, op| result * op.matrix())
    }
}

impl Default for XformSample {
    fn default() -> Self {
        Self::identity()
    }
}

/// A local transform read at one time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalXform {
    /// Local matrix.
    pub matrix: M44d,
    /// Whether the transform has a single sample for all time.
    pub is_constant: bool,
    /// Whether the node composes with its parent's world transform.
    pub inherits: bool,
}

impl LocalXform {
    /// Identity, constant, inheriting. Used when a transform cannot be read.
    pub const IDENTITY: Self = Self {
        matrix: DMat4::IDENTITY,
        is_constant: true,
        inherits: true,
    };
}

impl Default for LocalXform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        assert_eq!(XformSample::identity().matrix(), DMat4::IDENTITY);
    }

    #[test]
    fn test_op_order() {
        // Translate then scale: the translation is not scaled.
        let s = XformSample::from_ops(vec![
            XformOp::Translate([1.0, 0.0, 0.0]),
            XformOp::Scale([2.0, 2.0, 2.0]),
        ]);
        let p = s.matrix().transform_point3(DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(p, DVec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_rotate_z() {
        let m = XformOp::RotateZ(90.0).matrix();
        let p = m.transform_point3(DVec3::X);
        assert!((p - DVec3::Y).length() < 1e-12);
    }

    #[test]
    fn test_degenerate_axis() {
        let op = XformOp::Rotate { axis: [0.0; 3], angle: 45.0 };
        assert_eq!(op.matrix(), DMat4::IDENTITY);
    }

    #[test]
    fn test_serde_ops() {
        let json = r#"{"ops":[{"translate":[1,2,3]},{"rotate_y":90.0}]}"#;
        let s: XformSample = serde_json::from_str(json).unwrap();
        assert_eq!(s.ops[0], XformOp::Translate([1.0, 2.0, 3.0]));
        assert_eq!(s.ops[1], XformOp::RotateY(90.0));
    }
}
