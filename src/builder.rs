use std::collections::BTreeSet;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::context::{ContextParts, StringListMap, TraversalContext, TraversalContextRef};
use crate::errors::{ContextError, Result};
use crate::stage::Stage;

/// Mutable staging area for a [`TraversalContext`].
///
/// Initialization code fills the fields as it discovers them and may bail
/// out at any point with [`ContextBuilder::build_with_error`]; every path
/// still yields a context, which callers check with
/// [`TraversalContext::error_message`] before traversing.
#[derive(Default)]
pub struct ContextBuilder {
    pub stage: Option<Arc<dyn Stage>>,
    pub root_location: String,
    pub isolate_path: String,
    /// Session overrides group. `None` (or JSON `null`) means unset.
    pub session_attr: Option<Value>,
    pub ignore_layer_regex: String,
    pub current_time: f64,
    pub shutter_open: f64,
    pub shutter_close: f64,
    pub motion_sample_times: Vec<f64>,
    pub default_motion_paths: BTreeSet<String>,
    pub extra_attributes_or_namespaces: StringListMap,
    pub verbose: bool,
    pub error_message: Option<String>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalize with the staged values. Never fails: validation problems
    /// are recorded on the returned context as its error message.
    pub fn build(self) -> TraversalContextRef {
        let mut error_message = self.error_message;

        let session_attr = match self.session_attr {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(v @ Value::Object(_)) => v,
            Some(_) => {
                error_message.get_or_insert_with(|| "session attribute must be a group".into());
                Value::Object(Map::new())
            }
        };

        let ignore_layer_pattern = if self.ignore_layer_regex.is_empty() {
            None
        } else {
            match Regex::new(&self.ignore_layer_regex) {
                Ok(re) => Some(re),
                Err(err) => {
                    error_message.get_or_insert_with(|| ContextError::from(err).to_string());
                    None
                }
            }
        };

        if error_message.is_none() {
            let times_finite = [self.current_time, self.shutter_open, self.shutter_close]
                .iter()
                .chain(&self.motion_sample_times)
                .all(|t| t.is_finite());
            if !times_finite {
                error_message = Some("time values must be finite".into());
            } else if self.stage.is_none() {
                error_message = Some("no stage".into());
            } else if self.root_location.is_empty() {
                error_message = Some("root location is empty".into());
            }
        }

        debug!(
            root_location = %self.root_location,
            isolate_path = %self.isolate_path,
            time = self.current_time,
            samples = self.motion_sample_times.len(),
            errored = error_message.is_some(),
            "building traversal context"
        );

        TraversalContext::new(ContextParts {
            stage: self.stage,
            root_location: self.root_location,
            isolate_path: self.isolate_path,
            session_attr,
            ignore_layer_regex: self.ignore_layer_regex,
            ignore_layer_pattern,
            current_time: self.current_time,
            shutter_open: self.shutter_open,
            shutter_close: self.shutter_close,
            motion_sample_times: self.motion_sample_times,
            default_motion_paths: self.default_motion_paths,
            extra_attributes_or_namespaces: self.extra_attributes_or_namespaces,
            verbose: self.verbose,
            error_message,
        })
    }

    /// Record `message` and finalize. The message is kept verbatim.
    pub fn build_with_error(mut self, message: impl Into<String>) -> TraversalContextRef {
        self.error_message = Some(message.into());
        self.build()
    }

    /// Finalize and fold the error check into the return type.
    pub fn try_build(self) -> Result<TraversalContextRef> {
        let ctx = self.build();
        match ctx.error_message() {
            Some(msg) => Err(ContextError::Init(msg.to_string())),
            None => Ok(ctx),
        }
    }
}
