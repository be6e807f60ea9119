use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::builder::ContextBuilder;
use crate::context::StringListMap;
use crate::errors::Result;
use crate::stage::Stage;

/// Traversal arguments as they arrive from a host, in camelCase JSON.
/// Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TraversalConfig {
    pub root_location: String,
    pub isolate_path: String,
    pub session_attr: Option<Value>,
    pub ignore_layer_regex: String,
    pub current_time: f64,
    pub shutter_open: f64,
    pub shutter_close: f64,
    pub motion_sample_times: Vec<f64>,
    pub default_motion_paths: BTreeSet<String>,
    pub extra_attributes_or_namespaces: StringListMap,
    pub verbose: bool,
}

impl TraversalConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Stage these arguments for `stage`.
    pub fn into_builder(self, stage: Arc<dyn Stage>) -> ContextBuilder {
        ContextBuilder {
            stage: Some(stage),
            root_location: self.root_location,
            isolate_path: self.isolate_path,
            session_attr: self.session_attr,
            ignore_layer_regex: self.ignore_layer_regex,
            current_time: self.current_time,
            shutter_open: self.shutter_open,
            shutter_close: self.shutter_close,
            motion_sample_times: self.motion_sample_times,
            default_motion_paths: self.default_motion_paths,
            extra_attributes_or_namespaces: self.extra_attributes_or_namespaces,
            verbose: self.verbose,
            error_message: None,
        }
    }
}
