//! Scene-description stage abstraction and a JSON-backed in-memory stage.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::bbox::{BBox3, Transform};
use crate::errors::{ContextError, Result};

pub const PSEUDO_ROOT: &str = "/";

/// Handle to a prim by absolute path. `/` is the pseudo-root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Prim {
    path: String,
}

impl Prim {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn pseudo_root() -> Self {
        Self::new(PSEUDO_ROOT)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_pseudo_root(&self) -> bool {
        self.path == PSEUDO_ROOT
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }
}

/// Read-only access to a hierarchical, time-sampled scene.
///
/// Implementations must be safe to query from many threads at once.
pub trait Stage: Send + Sync + fmt::Debug {
    fn root_layer_identifier(&self) -> &str;

    /// Root layer first, then its sublayers in strength order.
    fn layer_stack(&self) -> Vec<String>;

    fn has_prim(&self, path: &str) -> bool;

    /// Absolute paths of the children of `path`, in authored order.
    fn children(&self, path: &str) -> Vec<String>;

    fn extent(&self, path: &str, time: f64) -> Option<BBox3>;

    fn local_transform(&self, path: &str, time: f64) -> Transform;

    fn pseudo_root(&self) -> Prim {
        Prim::pseudo_root()
    }

    fn prim_at(&self, path: &str) -> Option<Prim> {
        self.has_prim(path).then(|| Prim::new(path))
    }
}

/// Either a constant value or `[time, value]` samples sorted by time.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum Sampled<T> {
    Constant(T),
    Samples(Vec<(f64, T)>),
}

trait Lerp: Copy {
    fn lerp(a: Self, b: Self, t: f64) -> Self;
}

impl Lerp for [f64; 3] {
    fn lerp(a: Self, b: Self, t: f64) -> Self {
        [
            a[0] + (b[0] - a[0]) * t,
            a[1] + (b[1] - a[1]) * t,
            a[2] + (b[2] - a[2]) * t,
        ]
    }
}

impl Lerp for [[f64; 3]; 2] {
    fn lerp(a: Self, b: Self, t: f64) -> Self {
        [Lerp::lerp(a[0], b[0], t), Lerp::lerp(a[1], b[1], t)]
    }
}

impl<T: Lerp> Sampled<T> {
    /// Linear interpolation between bracketing samples; held at the ends.
    /// Non-finite times have no value.
    fn eval(&self, time: f64) -> Option<T> {
        if !time.is_finite() {
            return None;
        }
        match self {
            Sampled::Constant(v) => Some(*v),
            Sampled::Samples(samples) => {
                let (first, last) = (samples.first()?, samples.last()?);
                if time <= first.0 {
                    return Some(first.1);
                }
                if time >= last.0 {
                    return Some(last.1);
                }
                let hi = samples.partition_point(|(t, _)| *t <= time);
                let (t0, v0) = samples[hi - 1];
                let (t1, v1) = samples[hi];
                if t1 == t0 {
                    return Some(v1);
                }
                Some(T::lerp(v0, v1, (time - t0) / (t1 - t0)))
            }
        }
    }

    fn is_sorted(&self) -> bool {
        match self {
            Sampled::Constant(_) => true,
            Sampled::Samples(s) => s.windows(2).all(|w| w[0].0 <= w[1].0),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPrim {
    name: String,
    #[serde(default)]
    extent: Option<Sampled<[[f64; 3]; 2]>>,
    #[serde(default)]
    translate: Option<Sampled<[f64; 3]>>,
    #[serde(default)]
    scale: Option<Sampled<[f64; 3]>>,
    #[serde(default)]
    children: Vec<RawPrim>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    identifier: String,
    #[serde(default)]
    sublayers: Vec<String>,
    #[serde(default)]
    prims: Vec<RawPrim>,
}

#[derive(Debug)]
struct Node {
    extent: Option<Sampled<[[f64; 3]; 2]>>,
    translate: Option<Sampled<[f64; 3]>>,
    scale: Option<Sampled<[f64; 3]>>,
    children: Vec<String>,
}

/// A stage loaded from a JSON scene description:
///
/// ```json
/// { "identifier": "shot.json", "sublayers": ["anim.json"],
///   "prims": [ { "name": "world", "children": [
///       { "name": "box", "extent": [[0,0,0],[1,1,1]],
///         "translate": [[1, [0,0,0]], [2, [5,0,0]]] } ] } ] }
/// ```
#[derive(Debug)]
pub struct SceneDocument {
    identifier: String,
    sublayers: Vec<String>,
    nodes: HashMap<String, Node>,
}

impl SceneDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawDocument = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let doc = Self::from_json(&text)?;
        debug!(path = %path.as_ref().display(), prims = doc.nodes.len() - 1, "scene document opened");
        Ok(doc)
    }

    pub fn prim_count(&self) -> usize {
        self.nodes.len() - 1
    }

    fn from_raw(raw: RawDocument) -> Result<Self> {
        let mut nodes = HashMap::new();
        let children = insert_children(&mut nodes, "", raw.prims)?;
        nodes.insert(
            PSEUDO_ROOT.to_string(),
            Node {
                extent: None,
                translate: None,
                scale: None,
                children,
            },
        );
        Ok(Self {
            identifier: raw.identifier,
            sublayers: raw.sublayers,
            nodes,
        })
    }
}

fn insert_children(
    nodes: &mut HashMap<String, Node>,
    parent: &str,
    prims: Vec<RawPrim>,
) -> Result<Vec<String>> {
    let mut paths = Vec::with_capacity(prims.len());
    for prim in prims {
        if prim.name.is_empty() || prim.name.contains('/') {
            return Err(ContextError::Document(format!(
                "invalid prim name {:?} under {:?}",
                prim.name,
                if parent.is_empty() { PSEUDO_ROOT } else { parent }
            )));
        }
        let path = format!("{parent}/{}", prim.name);
        if nodes.contains_key(&path) {
            return Err(ContextError::Document(format!("duplicate prim {path}")));
        }
        let sorted = prim.extent.as_ref().map_or(true, Sampled::is_sorted)
            && prim.translate.as_ref().map_or(true, Sampled::is_sorted)
            && prim.scale.as_ref().map_or(true, Sampled::is_sorted);
        if !sorted {
            return Err(ContextError::Document(format!(
                "time samples of {path} are not sorted"
            )));
        }
        let children = insert_children(nodes, &path, prim.children)?;
        nodes.insert(
            path.clone(),
            Node {
                extent: prim.extent,
                translate: prim.translate,
                scale: prim.scale,
                children,
            },
        );
        paths.push(path);
    }
    Ok(paths)
}

impl Stage for SceneDocument {
    fn root_layer_identifier(&self) -> &str {
        &self.identifier
    }

    fn layer_stack(&self) -> Vec<String> {
        std::iter::once(self.identifier.clone())
            .chain(self.sublayers.iter().cloned())
            .collect()
    }

    fn has_prim(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    fn children(&self, path: &str) -> Vec<String> {
        self.nodes
            .get(path)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn extent(&self, path: &str, time: f64) -> Option<BBox3> {
        let [min, max] = self.nodes.get(path)?.extent.as_ref()?.eval(time)?;
        Some(BBox3::new(min, max))
    }

    fn local_transform(&self, path: &str, time: f64) -> Transform {
        let mut xform = Transform::default();
        if let Some(node) = self.nodes.get(path) {
            if let Some(t) = node.translate.as_ref().and_then(|s| s.eval(time)) {
                xform.translate = t;
            }
            if let Some(s) = node.scale.as_ref().and_then(|s| s.eval(time)) {
                xform.scale = s;
            }
        }
        xform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"{
        "identifier": "shot.json",
        "sublayers": ["anim.json", "fx_cache.json"],
        "prims": [
            { "name": "world", "children": [
                { "name": "box",
                  "extent": [[0,0,0],[1,1,1]],
                  "translate": [[1, [0,0,0]], [3, [4,0,0]]],
                  "scale": [2,2,2] },
                { "name": "empty" }
            ]}
        ]
    }"#;

    #[test]
    fn indexes_prims_by_path() {
        let doc = SceneDocument::from_json(DOC).unwrap();
        assert_eq!(doc.prim_count(), 3);
        assert_eq!(doc.children(PSEUDO_ROOT), vec!["/world".to_string()]);
        assert_eq!(
            doc.children("/world"),
            vec!["/world/box".to_string(), "/world/empty".to_string()]
        );
        assert!(doc.prim_at("/world/missing").is_none());
        assert_eq!(doc.prim_at("/world/box").unwrap().name(), "box");
        assert_eq!(
            doc.layer_stack(),
            vec!["shot.json", "anim.json", "fx_cache.json"]
        );
    }

    #[test]
    fn samples_interpolate_and_hold() {
        let doc = SceneDocument::from_json(DOC).unwrap();
        assert_eq!(doc.local_transform("/world/box", 0.0).translate, [0.0, 0.0, 0.0]);
        assert_eq!(doc.local_transform("/world/box", 2.0).translate, [2.0, 0.0, 0.0]);
        assert_eq!(doc.local_transform("/world/box", 9.0).translate, [4.0, 0.0, 0.0]);
        assert_eq!(doc.local_transform("/world/box", 2.0).scale, [2.0, 2.0, 2.0]);
        assert!(doc.extent("/world/empty", 0.0).is_none());
    }

    #[test]
    fn non_finite_times_have_no_samples() {
        let doc = SceneDocument::from_json(DOC).unwrap();
        assert!(doc.extent("/world/box", f64::NAN).is_none());
        assert_eq!(doc.local_transform("/world/box", f64::NAN), Transform::default());
        assert_eq!(
            doc.local_transform("/world/box", f64::INFINITY),
            Transform::default()
        );
    }

    #[test]
    fn rejects_bad_documents() {
        let dup = r#"{ "identifier": "x", "prims": [ {"name":"a"}, {"name":"a"} ] }"#;
        assert!(matches!(
            SceneDocument::from_json(dup),
            Err(ContextError::Document(_))
        ));
        let unsorted = r#"{ "identifier": "x", "prims": [
            {"name":"a", "translate": [[2,[0,0,0]],[1,[1,1,1]]]} ] }"#;
        assert!(SceneDocument::from_json(unsorted).is_err());
        assert!(SceneDocument::from_json("{").is_err());
    }
}
