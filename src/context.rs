//! Shared, immutable traversal state.
//!
//! A [`TraversalContext`] is built once per top-level traversal and handed to
//! every location expansion as an `Arc`. All configuration is fixed at
//! construction. The only mutable state is the table of bounding-box caches,
//! where each worker thread lazily creates and exclusively owns its own entry.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use regex::Regex;
use serde_json::{Map, Value};
use thread_local::ThreadLocal;
use tracing::{debug, info, warn};

use crate::bbox::{BBox3, BBoxCache};
use crate::errors::{ContextError, Result};
use crate::session::SessionOverrides;
use crate::stage::{Prim, Stage, PSEUDO_ROOT};

/// Root-level output attribute name -> source attributes or namespaces.
pub type StringListMap = BTreeMap<String, Vec<String>>;

/// Shared handle; lives as long as the longest holder.
pub type TraversalContextRef = Arc<TraversalContext>;

pub struct TraversalContext {
    stage: Option<Arc<dyn Stage>>,
    root_location: String,
    isolate_path: String,
    session_attr: Value,
    ignore_layer_regex: String,
    ignore_layer_pattern: Option<Regex>,
    current_time: f64,
    shutter_open: f64,
    shutter_close: f64,
    motion_sample_times: Vec<f64>,
    default_motion_paths: BTreeSet<String>,
    is_motion_backward: bool,
    extra_attributes_or_namespaces: StringListMap,
    verbose: bool,
    error_message: Option<String>,
    bbox_caches: ThreadLocal<RefCell<WorkerCaches>>,
    workers_with_caches: AtomicUsize,
}

/// Caches owned by one worker thread: one per motion-sample offset, plus a
/// current-time cache created on demand for default-motion paths.
struct WorkerCaches {
    samples: Vec<BBoxCache>,
    current: Option<BBoxCache>,
}

/// Fields handed from the builder. Kept separate so the constructor does not
/// take a dozen positional arguments.
pub(crate) struct ContextParts {
    pub stage: Option<Arc<dyn Stage>>,
    pub root_location: String,
    pub isolate_path: String,
    pub session_attr: Value,
    pub ignore_layer_regex: String,
    pub ignore_layer_pattern: Option<Regex>,
    pub current_time: f64,
    pub shutter_open: f64,
    pub shutter_close: f64,
    pub motion_sample_times: Vec<f64>,
    pub default_motion_paths: BTreeSet<String>,
    pub extra_attributes_or_namespaces: StringListMap,
    pub verbose: bool,
    pub error_message: Option<String>,
}

/// Motion blur runs backward when more than one sample is requested and the
/// first is later than the last.
pub fn is_motion_backward(sample_times: &[f64]) -> bool {
    match (sample_times.first(), sample_times.last()) {
        (Some(first), Some(last)) if sample_times.len() > 1 => first > last,
        _ => false,
    }
}

impl TraversalContext {
    pub(crate) fn new(parts: ContextParts) -> TraversalContextRef {
        let is_motion_backward = is_motion_backward(&parts.motion_sample_times);
        if let Some(err) = &parts.error_message {
            debug!(error = %err, "traversal context created in error state");
        }
        Arc::new(Self {
            stage: parts.stage,
            root_location: parts.root_location,
            isolate_path: parts.isolate_path,
            session_attr: parts.session_attr,
            ignore_layer_regex: parts.ignore_layer_regex,
            ignore_layer_pattern: parts.ignore_layer_pattern,
            current_time: parts.current_time,
            shutter_open: parts.shutter_open,
            shutter_close: parts.shutter_close,
            motion_sample_times: parts.motion_sample_times,
            default_motion_paths: parts.default_motion_paths,
            is_motion_backward,
            extra_attributes_or_namespaces: parts.extra_attributes_or_namespaces,
            verbose: parts.verbose,
            error_message: parts.error_message,
            bbox_caches: ThreadLocal::new(),
            workers_with_caches: AtomicUsize::new(0),
        })
    }

    /// One bound per motion-sample time, or a single bound at the current
    /// time when no samples are configured. An errored or stage-less context
    /// yields no bounds.
    pub fn compute_bounds(&self, prim: &Prim) -> Vec<BBox3> {
        let bounds = self
            .with_worker_caches(|caches| {
                caches
                    .samples
                    .iter_mut()
                    .map(|cache| cache.compute_untransformed_bound(prim))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|err| self.uncached_bounds(prim, &self.sample_times(), err));

        if self.verbose {
            info!(prim = prim.path(), samples = bounds.len(), "computed bounds");
        }
        bounds
    }

    /// Bounds lined up with [`Self::motion_sample_times_for`]: a single
    /// current-time bound for default-motion paths, otherwise the same as
    /// [`Self::compute_bounds`].
    pub fn compute_location_bounds(&self, prim: &Prim) -> Vec<BBox3> {
        if self.motion_sample_times.is_empty() || !self.default_motion_paths.contains(prim.path()) {
            return self.compute_bounds(prim);
        }
        let current_time = self.current_time;
        self.with_worker_caches(|caches| {
            let cache = match caches.samples.iter().position(|c| c.time() == current_time) {
                Some(i) => &mut caches.samples[i],
                None => caches.current.get_or_insert_with(|| {
                    BBoxCache::new(Arc::clone(caches.samples[0].stage()), current_time)
                }),
            };
            vec![cache.compute_untransformed_bound(prim)]
        })
        .unwrap_or_else(|err| self.uncached_bounds(prim, &[current_time], err))
    }

    fn sample_times(&self) -> Vec<f64> {
        if self.motion_sample_times.is_empty() {
            return vec![self.current_time];
        }
        self.motion_sample_times
            .iter()
            .map(|offset| self.current_time + offset)
            .collect()
    }

    // Fallback when the calling thread's caches are unavailable: either the
    // context is unusable (no bounds) or the caches are already borrowed
    // further up this thread's stack (compute without memoizing).
    fn uncached_bounds(&self, prim: &Prim, times: &[f64], err: ContextError) -> Vec<BBox3> {
        match (&err, self.usable_stage()) {
            (ContextError::CacheBusy, Some(stage)) => {
                warn!(prim = prim.path(), "bounding box caches busy on this thread; computing uncached");
                times
                    .iter()
                    .map(|t| BBoxCache::new(Arc::clone(stage), *t).compute_untransformed_bound(prim))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    fn new_worker_caches(&self, stage: &Arc<dyn Stage>) -> RefCell<WorkerCaches> {
        self.workers_with_caches.fetch_add(1, Ordering::Relaxed);
        debug!(
            thread = ?thread::current().id(),
            samples = self.motion_sample_times.len(),
            "creating bounding box caches for worker"
        );
        let samples = self
            .sample_times()
            .into_iter()
            .map(|time| BBoxCache::new(Arc::clone(stage), time))
            .collect();
        RefCell::new(WorkerCaches {
            samples,
            current: None,
        })
    }

    fn with_worker_caches<R>(&self, f: impl FnOnce(&mut WorkerCaches) -> R) -> Result<R> {
        let stage = self.usable_stage().ok_or_else(|| {
            ContextError::Init(self.error_message.clone().unwrap_or_else(|| "no stage".into()))
        })?;
        let slot = self.bbox_caches.get_or(|| self.new_worker_caches(stage));
        let mut caches = slot.try_borrow_mut().map_err(|_| ContextError::CacheBusy)?;
        Ok(f(&mut caches))
    }

    /// Run `f` against the calling thread's per-sample caches, creating them
    /// if needed. Fails with [`ContextError::Init`] on an unusable context
    /// and with [`ContextError::CacheBusy`] when called again from inside `f`.
    pub fn with_bbox_caches<R>(&self, f: impl FnOnce(&mut Vec<BBoxCache>) -> R) -> Result<R> {
        self.with_worker_caches(|caches| f(&mut caches.samples))
    }

    /// Number of worker threads that have created bounding-box caches so far.
    pub fn bbox_cache_count(&self) -> usize {
        self.workers_with_caches.load(Ordering::Relaxed)
    }

    fn usable_stage(&self) -> Option<&Arc<dyn Stage>> {
        if let Some(err) = &self.error_message {
            warn!(error = %err, "errored traversal context used; treating as empty");
            return None;
        }
        self.stage.as_ref()
    }

    /// The pseudo-root, or the prim at the isolate path when one is set.
    pub fn root_prim(&self) -> Option<Prim> {
        let stage = self.usable_stage()?;
        if self.isolate_path.is_empty() {
            Some(stage.pseudo_root())
        } else {
            stage.prim_at(&self.isolate_path)
        }
    }

    pub fn stage(&self) -> Option<&Arc<dyn Stage>> {
        self.stage.as_ref()
    }

    /// Identifier of the stage's root layer; empty without a stage.
    pub fn file_name(&self) -> &str {
        self.stage
            .as_deref()
            .map(|s| s.root_layer_identifier())
            .unwrap_or_default()
    }

    pub fn root_location_path(&self) -> &str {
        &self.root_location
    }

    pub fn isolate_path(&self) -> &str {
        &self.isolate_path
    }

    pub fn session_attr(&self) -> &Value {
        &self.session_attr
    }

    pub fn session_overrides(&self) -> SessionOverrides<'_> {
        static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
        match self.session_attr.as_object() {
            Some(group) => SessionOverrides::new(group),
            None => SessionOverrides::new(EMPTY.get_or_init(Map::new)),
        }
    }

    pub fn ignore_layer_regex(&self) -> &str {
        &self.ignore_layer_regex
    }

    /// True when the layer matches the ignore pattern. An empty pattern
    /// ignores nothing.
    pub fn ignores_layer(&self, identifier: &str) -> bool {
        self.ignore_layer_pattern
            .as_ref()
            .is_some_and(|re| re.is_match(identifier))
    }

    /// The stage's layer stack with ignored layers removed.
    pub fn active_layers(&self) -> Vec<String> {
        self.stage
            .as_ref()
            .map(|s| s.layer_stack())
            .unwrap_or_default()
            .into_iter()
            .filter(|layer| !self.ignores_layer(layer))
            .collect()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn shutter_open(&self) -> f64 {
        self.shutter_open
    }

    pub fn shutter_close(&self) -> f64 {
        self.shutter_close
    }

    pub fn motion_sample_times(&self) -> &[f64] {
        &self.motion_sample_times
    }

    pub fn default_motion_paths(&self) -> &BTreeSet<String> {
        &self.default_motion_paths
    }

    /// Offsets to sample for `prim_path`. Default-motion paths, and contexts
    /// without configured samples, sample only the current time.
    pub fn motion_sample_times_for(&self, prim_path: &str) -> &[f64] {
        if self.motion_sample_times.is_empty() || self.default_motion_paths.contains(prim_path) {
            &[0.0][..]
        } else {
            self.motion_sample_times.as_slice()
        }
    }

    pub fn is_motion_backward(&self) -> bool {
        self.is_motion_backward
    }

    /// Sample time as written to output. Backward motion is mirrored inside
    /// the shutter window so output times still run open -> close.
    pub fn output_sample_time(&self, offset: f64) -> f64 {
        if self.is_motion_backward {
            self.shutter_open + self.shutter_close - offset
        } else {
            offset
        }
    }

    pub fn extra_attributes_or_namespaces(&self) -> &StringListMap {
        &self.extra_attributes_or_namespaces
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_errored(&self) -> bool {
        self.error_message.is_some()
    }

    /// Output location for a stage path: the isolate prefix is replaced by
    /// the root location.
    pub fn location_for_prim(&self, prim_path: &str) -> Option<String> {
        let rel = if self.isolate_path.is_empty() {
            Some(prim_path)
        } else {
            prim_path
                .strip_prefix(self.isolate_path.trim_end_matches('/'))
                .filter(|rest| rest.is_empty() || rest.starts_with('/'))
        }?;
        let rel = rel.trim_start_matches('/');
        let root = self.root_location.trim_end_matches('/');
        Some(if rel.is_empty() {
            if root.is_empty() { PSEUDO_ROOT.to_string() } else { root.to_string() }
        } else {
            format!("{root}/{rel}")
        })
    }

    /// Inverse of [`Self::location_for_prim`].
    pub fn prim_path_for_location(&self, location: &str) -> Option<String> {
        let root = self.root_location.trim_end_matches('/');
        let rel = location
            .strip_prefix(root)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))?
            .trim_start_matches('/');
        let base = self.isolate_path.trim_end_matches('/');
        Some(match (base.is_empty(), rel.is_empty()) {
            (true, true) => PSEUDO_ROOT.to_string(),
            (true, false) => format!("/{rel}"),
            (false, true) => base.to_string(),
            (false, false) => format!("{base}/{rel}"),
        })
    }
}

impl std::fmt::Debug for TraversalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraversalContext")
            .field("file_name", &self.file_name())
            .field("root_location", &self.root_location)
            .field("isolate_path", &self.isolate_path)
            .field("current_time", &self.current_time)
            .field("motion_sample_times", &self.motion_sample_times)
            .field("is_motion_backward", &self.is_motion_backward)
            .field("error_message", &self.error_message)
            .finish_non_exhaustive()
    }
}
