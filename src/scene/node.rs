//! In-memory scene tree built from merged scene documents.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::{
    ArchiveReader, BoundsSample, ObjectReader, ObjectRef, Sampled, TimeSampling, VisibilitySample,
};
use crate::geom::{LocalXform, NodeKind, ObjectVisibility, XformSample};
use crate::scene::desc::{NodeDesc, SceneDocument};
use crate::util::{BBox3d, Chrono, Error, Result, M44d};

/// Sampled transform of an xform node.
#[derive(Clone, Debug)]
struct XformProperty {
    matrices: Sampled<M44d>,
    inherits: bool,
}

/// One node of a scene archive.
#[derive(Debug)]
pub struct SceneNode {
    name: String,
    full_name: String,
    kind: NodeKind,
    xform: Option<XformProperty>,
    visibility: Option<Sampled<ObjectVisibility>>,
    bounds: Option<Sampled<BBox3d>>,
    children: Vec<Arc<SceneNode>>,
    child_index: HashMap<String, usize>,
}

impl SceneNode {
    /// The archive top: unnamed group at `/`.
    fn top(objects: Vec<NodeDesc>) -> Result<Arc<Self>> {
        let top = NodeDesc {
            name: String::new(),
            kind: Some(NodeKind::Group),
            children: objects,
            ..Default::default()
        };
        Self::build(top, "/")
    }

    fn build(desc: NodeDesc, full_name: &str) -> Result<Arc<Self>> {
        let kind = desc
            .kind
            .unwrap_or(if desc.xform.is_some() { NodeKind::Xform } else { NodeKind::Group });

        let xform = match desc.xform {
            Some(x) if kind.is_transform() => {
                check_increasing(full_name, x.samples.iter().map(|s| s.time))?;
                let (times, matrices) = x
                    .samples
                    .into_iter()
                    .map(|s| (s.time, XformSample::from_ops(s.ops).matrix()))
                    .unzip();
                Some(XformProperty {
                    matrices: Sampled::at_times(times, matrices),
                    inherits: x.inherits,
                })
            }
            _ => None,
        };

        let visibility = match desc.visible {
            Some(v) => {
                check_increasing(full_name, v.samples.iter().map(|s| s.time))?;
                let (times, values) = v.samples.into_iter().map(|s| (s.time, s.value)).unzip();
                Some(Sampled::at_times(times, values))
            }
            None => None,
        };

        let bounds = match desc.bounds {
            Some(b) => {
                check_increasing(full_name, b.samples.iter().map(|s| s.time))?;
                let (times, boxes) = b
                    .samples
                    .into_iter()
                    .map(|s| (s.time, BBox3d::from_arrays(s.min, s.max)))
                    .unzip();
                Some(Sampled::at_times(times, boxes))
            }
            None => None,
        };

        let mut children = Vec::with_capacity(desc.children.len());
        let mut child_index = HashMap::with_capacity(desc.children.len());
        for child in desc.children {
            if child.name.is_empty() || child.name.contains('/') {
                return Err(Error::invalid(format!(
                    "bad node name {:?} under {}",
                    child.name, full_name
                )));
            }
            if child_index.contains_key(&child.name) {
                return Err(Error::invalid(format!(
                    "duplicate node {:?} under {}",
                    child.name, full_name
                )));
            }
            let child_path = child_path(full_name, &child.name);
            child_index.insert(child.name.clone(), children.len());
            children.push(Self::build(child, &child_path)?);
        }

        Ok(Arc::new(Self {
            name: desc.name,
            full_name: full_name.to_string(),
            kind,
            xform,
            visibility,
            bounds,
            children,
            child_index,
        }))
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

fn check_increasing(path: &str, times: impl Iterator<Item = Chrono>) -> Result<()> {
    let mut prev = f64::NEG_INFINITY;
    for t in times {
        if !(t > prev) {
            return Err(Error::invalid(format!(
                "sample times of {} are not strictly increasing",
                path
            )));
        }
        prev = t;
    }
    Ok(())
}

impl ObjectReader for SceneNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn num_children(&self) -> usize {
        self.children.len()
    }

    fn child(&self, index: usize) -> Option<ObjectRef> {
        self.children.get(index).map(|c| Arc::clone(c) as ObjectRef)
    }

    fn child_by_name(&self, name: &str) -> Option<ObjectRef> {
        self.child_index.get(name).and_then(|&i| self.child(i))
    }

    fn local_transform(&self, time: Chrono) -> Option<LocalXform> {
        if !self.kind.is_transform() {
            return None;
        }
        let Some(xform) = &self.xform else {
            // Xform without samples.
            return Some(LocalXform::IDENTITY);
        };
        let matrix = match xform.matrices.value_at(time) {
            Some(m) => *m,
            None => M44d::IDENTITY,
        };
        Some(LocalXform {
            matrix,
            is_constant: xform.matrices.is_constant(),
            inherits: xform.inherits,
        })
    }

    fn visibility(&self, time: Chrono) -> Option<VisibilitySample> {
        let vis = self.visibility.as_ref()?;
        Some(VisibilitySample {
            value: *vis.value_at(time)?,
            is_constant: vis.is_constant(),
        })
    }

    fn bounds(&self, time: Chrono) -> Option<BoundsSample> {
        let bounds = self.bounds.as_ref()?;
        Some(BoundsSample {
            bbox: *bounds.value_at(time)?,
            is_constant: bounds.is_constant(),
        })
    }

    fn time_sampling(&self) -> Option<(&TimeSampling, usize)> {
        if let Some(x) = &self.xform {
            return Some((&x.matrices.time_sampling, x.matrices.num_samples()));
        }
        if let Some(v) = &self.visibility {
            return Some((&v.time_sampling, v.num_samples()));
        }
        self.bounds
            .as_ref()
            .map(|b| (&b.time_sampling, b.num_samples()))
    }
}

/// A scene archive: one or more scene documents layered into a single tree.
#[derive(Debug)]
pub struct SceneArchive {
    name: String,
    filenames: Vec<PathBuf>,
    root: Arc<SceneNode>,
}

impl SceneArchive {
    /// Open and layer scene files, later files overlaying earlier ones.
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        if paths.is_empty() {
            return Err(Error::EmptyArchive);
        }
        let mut layers = Vec::with_capacity(paths.len());
        for path in paths {
            layers.push(SceneDocument::read(path)?);
        }
        Self::from_layers(layers, paths.to_vec())
    }

    /// Build an archive from documents already in memory.
    pub fn from_layers(layers: Vec<SceneDocument>, filenames: Vec<PathBuf>) -> Result<Self> {
        let mut layers = layers.into_iter();
        let mut objects = layers.next().map(|d| d.objects).unwrap_or_default();
        for layer in layers {
            crate::scene::desc::overlay_children(&mut objects, layer.objects);
        }

        let name = filenames
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":");

        Ok(Self {
            name,
            filenames,
            root: SceneNode::top(objects)?,
        })
    }
}

impl ArchiveReader for SceneArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn filenames(&self) -> &[PathBuf] {
        &self.filenames
    }

    fn root(&self) -> ObjectRef {
        Arc::clone(&self.root) as ObjectRef
    }
}
