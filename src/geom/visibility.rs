//! Tri-state node visibility.
//!
//! Stored as an `i8` in scene files: `-1` defers to the parent, `0` hides,
//! `1` shows. A chain of deferred values that reaches the archive top is
//! visible.

use serde::{Deserialize, Serialize};

/// Visibility a node declares for itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i8", into = "i8")]
#[repr(i8)]
pub enum ObjectVisibility {
    /// Take the parent's resolved visibility.
    #[default]
    Deferred = -1,
    Hidden = 0,
    Visible = 1,
}

impl ObjectVisibility {
    /// Decode a stored value. Anything other than `0` or `1` defers.
    pub fn from_i8(value: i8) -> Self {
        match value {
            0 => Self::Hidden,
            1 => Self::Visible,
            _ => Self::Deferred,
        }
    }

    #[inline]
    pub fn to_i8(self) -> i8 {
        self as i8
    }

    #[inline]
    pub fn is_deferred(self) -> bool {
        self == Self::Deferred
    }

    #[inline]
    pub fn is_hidden(self) -> bool {
        self == Self::Hidden
    }

    #[inline]
    pub fn is_visible(self) -> bool {
        self == Self::Visible
    }

    /// This value, or `parent()` when deferred.
    pub fn or_inherit(self, parent: impl FnOnce() -> Self) -> Self {
        match self {
            Self::Deferred => parent(),
            explicit => explicit,
        }
    }
}

impl From<i8> for ObjectVisibility {
    fn from(value: i8) -> Self {
        Self::from_i8(value)
    }
}

impl From<ObjectVisibility> for i8 {
    fn from(vis: ObjectVisibility) -> Self {
        vis.to_i8()
    }
}
