//! Node kinds and the per-node samples the caches read.
//!
//! Only transforms, visibility and bounds matter here; geometry payloads are
//! the concern of whatever translates nodes for rendering.

mod visibility;
mod xform;

pub use visibility::ObjectVisibility;
pub use xform::{LocalXform, XformOp, XformSample};

use serde::{Deserialize, Serialize};

/// Kind of a scene node.
///
/// Resolvers only care whether a node carries a transform; the rest of the
/// variants are passed through to callers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Plain grouping node (including the archive top).
    #[default]
    Group,
    Xform,
    PolyMesh,
    SubD,
    Curves,
    Points,
    NuPatch,
    FaceSet,
    Camera,
    Light,
}

impl NodeKind {
    /// Whether nodes of this kind carry a local transform.
    #[inline]
    pub fn is_transform(self) -> bool {
        matches!(self, Self::Xform)
    }

    /// Whether nodes of this kind are geometry shapes.
    pub fn is_shape(self) -> bool {
        matches!(
            self,
            Self::PolyMesh | Self::SubD | Self::Curves | Self::Points | Self::NuPatch
        )
    }

    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Xform => "xform",
            Self::PolyMesh => "polymesh",
            Self::SubD => "subd",
            Self::Curves => "curves",
            Self::Points => "points",
            Self::NuPatch => "nupatch",
            Self::FaceSet => "faceset",
            Self::Camera => "camera",
            Self::Light => "light",
        }
    }
}
