pub mod errors;
pub mod attrpath;
pub mod session;
pub mod bbox;
pub mod stage;
pub mod context;
pub mod builder;
pub mod config;
pub mod traversal;
mod parser;

pub use attrpath::{delimiter_decode, delimiter_encode, AttrPath};
pub use bbox::{BBox3, BBoxCache, Transform};
pub use builder::ContextBuilder;
pub use config::TraversalConfig;
pub use context::{is_motion_backward, StringListMap, TraversalContext, TraversalContextRef};
pub use errors::{ContextError, Result};
pub use session::{Activation, SessionOverrides, VariantSelection};
pub use stage::{Prim, SceneDocument, Stage};
pub use traversal::{collect, expand, LocationRecord};
