use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::stage::{Prim, Stage};

/// Axis-aligned bounding box. The empty box has `min = +inf`, `max = -inf`
/// so that it is the identity for [`BBox3::union`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox3 {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for BBox3 {
    fn default() -> Self {
        Self::empty()
    }
}

impl BBox3 {
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    pub fn union(&self, other: &BBox3) -> BBox3 {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let mut out = *self;
        for i in 0..3 {
            out.min[i] = out.min[i].min(other.min[i]);
            out.max[i] = out.max[i].max(other.max[i]);
        }
        out
    }

    pub fn center(&self) -> [f64; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    pub fn size(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Flattened `[xmin, xmax, ymin, ymax, zmin, zmax]`, the layout renderers
    /// expect for a bound attribute.
    pub fn to_flat(&self) -> [f64; 6] {
        [
            self.min[0], self.max[0], self.min[1], self.max[1], self.min[2], self.max[2],
        ]
    }
}

/// Local transform of a prim relative to its parent: scale, then translate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translate: [f64; 3],
    pub scale: [f64; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translate: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl Transform {
    pub fn apply(&self, b: &BBox3) -> BBox3 {
        if b.is_empty() {
            return *b;
        }
        let mut out = BBox3::empty();
        for i in 0..3 {
            let lo = b.min[i] * self.scale[i] + self.translate[i];
            let hi = b.max[i] * self.scale[i] + self.translate[i];
            out.min[i] = lo.min(hi);
            out.max[i] = lo.max(hi);
        }
        out
    }
}

/// Memoizes untransformed bounds for one stage at one absolute time.
///
/// A cache is owned by a single worker; it is `Send` but is never shared.
#[derive(Debug)]
pub struct BBoxCache {
    stage: Arc<dyn Stage>,
    time: f64,
    memo: HashMap<String, BBox3>,
    hits: u64,
    misses: u64,
}

impl BBoxCache {
    pub fn new(stage: Arc<dyn Stage>, time: f64) -> Self {
        Self {
            stage,
            time,
            memo: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn stage(&self) -> &Arc<dyn Stage> {
        &self.stage
    }

    /// Changing the time invalidates everything memoized so far.
    pub fn set_time(&mut self, time: f64) {
        if time != self.time {
            self.time = time;
            self.memo.clear();
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    /// Bound of `prim` and its descendants in the prim's own space: the
    /// prim's extent unioned with each child's bound under the child's
    /// local transform. The prim's own transform is not applied.
    pub fn compute_untransformed_bound(&mut self, prim: &Prim) -> BBox3 {
        self.bound_of(prim.path())
    }

    fn bound_of(&mut self, path: &str) -> BBox3 {
        if let Some(b) = self.memo.get(path) {
            self.hits += 1;
            return *b;
        }
        self.misses += 1;

        let mut bound = self.stage.extent(path, self.time).unwrap_or_default();
        for child in self.stage.children(path) {
            let child_bound = self.bound_of(&child);
            let xform = self.stage.local_transform(&child, self.time);
            bound = bound.union(&xform.apply(&child_bound));
        }
        trace!(path, time = self.time, ?bound, "bound computed");
        self.memo.insert(path.to_string(), bound);
        bound
    }
}
