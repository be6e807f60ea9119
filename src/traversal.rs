//! Fork-join expansion of the scene beneath a context's root prim.
//!
//! Every expansion step receives its own clone of the shared context handle.
//! Child subtrees are forked onto a fixed pool of `parallelism` workers, so
//! the number of per-thread bounding-box cache sets is bounded by the pool
//! size rather than by the number of locations.

use itertools::Itertools;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bbox::BBox3;
use crate::context::TraversalContextRef;
use crate::stage::Prim;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub location: String,
    pub prim_path: String,
    pub bounds: Vec<BBox3>,
    /// Output sample time of each entry in `bounds`.
    pub sample_times: Vec<f64>,
}

/// Visit every active location beneath the context's root. `parallelism` is
/// the number of pool workers; 0 expands on the calling thread.
/// An errored context visits nothing.
pub fn expand<F>(ctx: &TraversalContextRef, parallelism: usize, visit: F)
where
    F: Fn(LocationRecord) + Sync,
{
    if let Some(msg) = ctx.error_message() {
        debug!(error = msg, "skipping traversal of errored context");
        return;
    }
    let Some(root) = ctx.root_prim() else {
        debug!(isolate_path = ctx.isolate_path(), "no root prim; nothing to expand");
        return;
    };
    if parallelism == 0 {
        expand_prim(ctx.clone(), root, false, &visit);
        return;
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(parallelism)
        .thread_name(|i| format!("tctx-worker-{i}"))
        .build()
    {
        Ok(pool) => pool.install(|| expand_prim(ctx.clone(), root, true, &visit)),
        Err(err) => {
            warn!(%err, parallelism, "worker pool unavailable; expanding inline");
            expand_prim(ctx.clone(), root, false, &visit);
        }
    }
}

/// Expand and gather every record, ordered by location.
pub fn collect(ctx: &TraversalContextRef, parallelism: usize) -> Vec<LocationRecord> {
    let out = Mutex::new(Vec::new());
    expand(ctx, parallelism, |record| out.lock().push(record));
    out.into_inner()
        .into_iter()
        .sorted_by(|a, b| a.location.cmp(&b.location))
        .collect()
}

fn expand_prim<F>(ctx: TraversalContextRef, prim: Prim, parallel: bool, visit: &F)
where
    F: Fn(LocationRecord) + Sync,
{
    let Some(location) = ctx.location_for_prim(prim.path()) else {
        return;
    };
    if ctx.session_overrides().activation_for(&location) == Some(false) {
        debug!(location = %location, "deactivated by session overrides");
        return;
    }

    let bounds = ctx.compute_location_bounds(&prim);
    let sample_times = ctx
        .motion_sample_times_for(prim.path())
        .iter()
        .map(|t| ctx.output_sample_time(*t))
        .collect();
    if ctx.is_verbose() {
        info!(location = %location, "expanded");
    }
    visit(LocationRecord {
        location,
        prim_path: prim.path().to_string(),
        bounds,
        sample_times,
    });

    let children = match ctx.stage() {
        Some(stage) => stage.children(prim.path()),
        None => return,
    };
    if parallel {
        children
            .into_par_iter()
            .for_each(|child| expand_prim(ctx.clone(), Prim::new(child), true, visit));
    } else {
        for child in children {
            expand_prim(ctx.clone(), Prim::new(child), false, visit);
        }
    }
}
