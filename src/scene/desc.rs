//! Serialized scene description.
//!
//! One scene file holds a [`SceneDocument`]: the children of the archive top,
//! each a [`NodeDesc`] tree. Every property is a list of timed samples; a
//! single sample means the property is constant.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geom::{NodeKind, ObjectVisibility, XformOp};
use crate::util::{Chrono, Error, Result};

fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

/// Contents of one scene file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Children of the archive top.
    #[serde(default)]
    pub objects: Vec<NodeDesc>,
}

impl SceneDocument {
    /// Create a document from top-level nodes.
    pub fn new(objects: Vec<NodeDesc>) -> Self {
        Self { objects }
    }

    /// Read a document from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Write a document to disk.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// A transform sample at one time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimedXform {
    #[serde(default)]
    pub time: Chrono,
    #[serde(default)]
    pub ops: Vec<XformOp>,
}

/// Transform property of a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct XformDesc {
    /// Whether the node composes with its parent's world transform.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub inherits: bool,
    #[serde(default)]
    pub samples: Vec<TimedXform>,
}

impl Default for XformDesc {
    fn default() -> Self {
        Self { inherits: true, samples: Vec::new() }
    }
}

/// A visibility sample at one time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedVisibility {
    #[serde(default)]
    pub time: Chrono,
    pub value: ObjectVisibility,
}

/// Visibility property of a node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VisibilityDesc {
    #[serde(default)]
    pub samples: Vec<TimedVisibility>,
}

/// A bounds sample at one time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedBounds {
    #[serde(default)]
    pub time: Chrono,
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// Bounds property of a node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundsDesc {
    #[serde(default)]
    pub samples: Vec<TimedBounds>,
}

/// One node and its subtree.
///
/// In overlay files, `kind` and each property are optional: whatever is left
/// out keeps the value from earlier layers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDesc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xform: Option<XformDesc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<VisibilityDesc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundsDesc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDesc>,
}

impl NodeDesc {
    /// Node of the given kind with no properties.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind),
            ..Default::default()
        }
    }

    /// Grouping node.
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    /// Xform node with a constant transform.
    pub fn xform(name: impl Into<String>, ops: Vec<XformOp>) -> Self {
        Self::new(name, NodeKind::Xform).with_xform_samples(vec![(0.0, ops)])
    }

    /// Shape node of the given kind.
    pub fn shape(name: impl Into<String>, kind: NodeKind) -> Self {
        Self::new(name, kind)
    }

    /// Replace the transform samples, keeping the inherits flag.
    pub fn with_xform_samples(mut self, samples: Vec<(Chrono, Vec<XformOp>)>) -> Self {
        let xform = self.xform.get_or_insert_with(XformDesc::default);
        xform.samples = samples
            .into_iter()
            .map(|(time, ops)| TimedXform { time, ops })
            .collect();
        self
    }

    /// Set whether the node inherits its parent's transform.
    pub fn with_inherits(mut self, inherits: bool) -> Self {
        self.xform.get_or_insert_with(XformDesc::default).inherits = inherits;
        self
    }

    /// Constant visibility.
    pub fn with_visibility(self, value: ObjectVisibility) -> Self {
        self.with_visibility_samples(vec![(0.0, value)])
    }

    /// Animated visibility.
    pub fn with_visibility_samples(mut self, samples: Vec<(Chrono, ObjectVisibility)>) -> Self {
        self.visible = Some(VisibilityDesc {
            samples: samples
                .into_iter()
                .map(|(time, value)| TimedVisibility { time, value })
                .collect(),
        });
        self
    }

    /// Constant bounds.
    pub fn with_bounds(self, min: [f64; 3], max: [f64; 3]) -> Self {
        self.with_bounds_samples(vec![(0.0, min, max)])
    }

    /// Animated bounds.
    pub fn with_bounds_samples(mut self, samples: Vec<(Chrono, [f64; 3], [f64; 3])>) -> Self {
        self.bounds = Some(BoundsDesc {
            samples: samples
                .into_iter()
                .map(|(time, min, max)| TimedBounds { time, min, max })
                .collect(),
        });
        self
    }

    /// Append a child.
    pub fn with_child(mut self, child: NodeDesc) -> Self {
        self.children.push(child);
        self
    }

    /// Apply an overlay layer on top of this node.
    ///
    /// Properties the layer specifies replace ours; children are matched by
    /// name and overlaid recursively, unmatched ones are appended.
    pub fn overlay(&mut self, layer: NodeDesc) {
        if layer.kind.is_some() {
            self.kind = layer.kind;
        }
        if layer.xform.is_some() {
            self.xform = layer.xform;
        }
        if layer.visible.is_some() {
            self.visible = layer.visible;
        }
        if layer.bounds.is_some() {
            self.bounds = layer.bounds;
        }
        overlay_children(&mut self.children, layer.children);
    }
}

/// Overlay `layer` nodes onto `base` siblings.
pub(crate) fn overlay_children(base: &mut Vec<NodeDesc>, layer: Vec<NodeDesc>) {
    for node in layer {
        match base.iter_mut().find(|b| b.name == node.name) {
            Some(existing) => existing.overlay(node),
            None => base.push(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let json = r#"{"objects":[{"name":"a","children":[{"name":"b","kind":"poly_mesh"}]}]}"#;
        let doc: SceneDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.objects[0].name, "a");
        assert_eq!(doc.objects[0].kind, None);
        assert_eq!(doc.objects[0].children[0].kind, Some(NodeKind::PolyMesh));
    }

    #[test]
    fn test_inherits_defaults_true() {
        let json = r#"{"name":"x","xform":{"samples":[{"ops":[]}]}}"#;
        let node: NodeDesc = serde_json::from_str(json).unwrap();
        assert!(node.xform.unwrap().inherits);
    }

    #[test]
    fn test_overlay_replaces_and_appends() {
        let mut base = NodeDesc::xform("root", vec![XformOp::Translate([1.0, 0.0, 0.0])])
            .with_child(NodeDesc::shape("mesh", NodeKind::PolyMesh));

        let layer = NodeDesc {
            name: "root".into(),
            visible: Some(VisibilityDesc {
                samples: vec![TimedVisibility { time: 0.0, value: ObjectVisibility::Hidden }],
            }),
            children: vec![
                NodeDesc {
                    name: "mesh".into(),
                    bounds: Some(BoundsDesc::default()),
                    ..Default::default()
                },
                NodeDesc::group("extra"),
            ],
            ..Default::default()
        };
        base.overlay(layer);

        // Kind and xform survive, visibility comes from the layer.
        assert_eq!(base.kind, Some(NodeKind::Xform));
        assert!(base.xform.is_some());
        assert!(base.visible.is_some());
        assert_eq!(base.children.len(), 2);
        assert_eq!(base.children[0].kind, Some(NodeKind::PolyMesh));
        assert!(base.children[0].bounds.is_some());
        assert_eq!(base.children[1].name, "extra");
    }

    #[test]
    fn test_document_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let doc = SceneDocument::new(vec![NodeDesc::group("a").with_inherits(false)]);
        doc.write(&path).unwrap();
        assert_eq!(SceneDocument::read(&path).unwrap(), doc);
    }

    #[test]
    fn test_read_missing_file() {
        let err = SceneDocument::read(Path::new("/nonexistent/scene.json")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
