//! Read-only view over the session-override attribute.
//!
//! The attribute is a group with two optional children:
//!
//! ```text
//! variants
//!   <encodedLocation>
//!     <variantSetName> -> "<selection>"
//! activations
//!   <encodedLocation> -> 0 | 1
//! ```
//!
//! `<encodedLocation>` is a delimiter-encoded output location (see
//! [`crate::attrpath::delimiter_encode`]). Locations are full output paths so
//! that several traversals can share one attribute and each pick the entries
//! beneath its own root.

use itertools::Itertools;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::attrpath::{delimiter_decode, delimiter_encode};

pub const VARIANTS: &str = "variants";
pub const ACTIVATIONS: &str = "activations";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantSelection {
    pub location: String,
    pub variant_set: String,
    pub selection: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activation {
    pub location: String,
    pub active: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOverrides<'a> {
    group: &'a Map<String, Value>,
}

impl<'a> SessionOverrides<'a> {
    pub fn new(group: &'a Map<String, Value>) -> Self {
        Self { group }
    }

    pub fn is_empty(&self) -> bool {
        self.variant_selections().is_empty() && self.activations().is_empty()
    }

    /// All variant selections, ordered by location then variant set.
    pub fn variant_selections(&self) -> Vec<VariantSelection> {
        let Some(variants) = self.child_group(VARIANTS) else {
            return Vec::new();
        };
        variants
            .iter()
            .filter_map(|(key, sets)| Some((delimiter_decode(key), sets.as_object()?)))
            .flat_map(|(location, sets)| {
                sets.iter().filter_map(move |(set, sel)| {
                    Some(VariantSelection {
                        location: location.clone(),
                        variant_set: set.clone(),
                        selection: sel.as_str()?.to_string(),
                    })
                })
            })
            .sorted_by(|a, b| {
                (&a.location, &a.variant_set).cmp(&(&b.location, &b.variant_set))
            })
            .collect()
    }

    /// All activation entries, ordered by location. Entries whose value is
    /// neither an integer nor a boolean are ignored.
    pub fn activations(&self) -> Vec<Activation> {
        let Some(acts) = self.child_group(ACTIVATIONS) else {
            return Vec::new();
        };
        acts.iter()
            .filter_map(|(key, v)| {
                Some(Activation {
                    location: delimiter_decode(key),
                    active: flag(v)?,
                })
            })
            .sorted_by(|a, b| a.location.cmp(&b.location))
            .collect()
    }

    /// Direct lookup of the encoded location; no decoding of other entries.
    pub fn activation_for(&self, location: &str) -> Option<bool> {
        self.child_group(ACTIVATIONS)?
            .get(&delimiter_encode(location))
            .and_then(flag)
    }

    pub fn variant_selections_for(&self, location: &str) -> Vec<VariantSelection> {
        let Some(sets) = self
            .child_group(VARIANTS)
            .and_then(|v| v.get(&delimiter_encode(location)))
            .and_then(Value::as_object)
        else {
            return Vec::new();
        };
        sets.iter()
            .filter_map(|(set, sel)| {
                Some(VariantSelection {
                    location: location.to_string(),
                    variant_set: set.clone(),
                    selection: sel.as_str()?.to_string(),
                })
            })
            .sorted_by(|a, b| a.variant_set.cmp(&b.variant_set))
            .collect()
    }

    /// Entries at or beneath `session_location`, as (variants, activations).
    pub fn relevant_to(&self, session_location: &str) -> (Vec<VariantSelection>, Vec<Activation>) {
        let variants = self
            .variant_selections()
            .into_iter()
            .filter(|v| is_at_or_beneath(&v.location, session_location))
            .collect();
        let activations = self
            .activations()
            .into_iter()
            .filter(|a| is_at_or_beneath(&a.location, session_location))
            .collect();
        (variants, activations)
    }

    fn child_group(&self, name: &str) -> Option<&'a Map<String, Value>> {
        self.group.get(name).and_then(Value::as_object)
    }
}

fn flag(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

/// Component-wise prefix test: `/root/a` is beneath `/root` but `/rootx` is not.
pub fn is_at_or_beneath(location: &str, ancestor: &str) -> bool {
    let ancestor = ancestor.trim_end_matches('/');
    if ancestor.is_empty() {
        return location.starts_with('/');
    }
    match location.strip_prefix(ancestor) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrpath::delimiter_encode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn attr() -> Value {
        let hero = delimiter_encode("/root/world/hero");
        let crate_ = delimiter_encode("/root/world/prop.crate");
        let other = delimiter_encode("/other/thing");
        json!({
            "variants": {
                hero.clone(): { "modelingVariant": "damaged", "lod": "high" },
                other.clone(): { "lod": "low" }
            },
            "activations": {
                crate_: 0,
                hero: true,
                other: "yes"
            }
        })
    }

    #[test]
    fn decodes_variant_selections() {
        let v = attr();
        let s = SessionOverrides::new(v.as_object().unwrap());
        let sels = s.variant_selections_for("/root/world/hero");
        assert_eq!(
            sels,
            vec![
                VariantSelection {
                    location: "/root/world/hero".into(),
                    variant_set: "lod".into(),
                    selection: "high".into(),
                },
                VariantSelection {
                    location: "/root/world/hero".into(),
                    variant_set: "modelingVariant".into(),
                    selection: "damaged".into(),
                },
            ]
        );
    }

    #[test]
    fn activations_accept_ints_and_bools() {
        let v = attr();
        let s = SessionOverrides::new(v.as_object().unwrap());
        assert_eq!(s.activation_for("/root/world/prop.crate"), Some(false));
        assert_eq!(s.activation_for("/root/world/hero"), Some(true));
        // non-numeric values are skipped
        assert_eq!(s.activation_for("/other/thing"), None);
        assert_eq!(s.activations().len(), 2);
    }

    #[test]
    fn lookups_match_full_scan() {
        let v = attr();
        let s = SessionOverrides::new(v.as_object().unwrap());
        for a in s.activations() {
            assert_eq!(s.activation_for(&a.location), Some(a.active));
        }
        assert_eq!(s.activation_for("/root/world"), None);
        assert_eq!(s.variant_selections_for("/other/thing").len(), 1);
        assert!(s.variant_selections_for("/nowhere").is_empty());
    }

    #[test]
    fn relevance_is_component_wise() {
        let v = attr();
        let s = SessionOverrides::new(v.as_object().unwrap());
        let (variants, activations) = s.relevant_to("/root");
        assert_eq!(variants.len(), 2);
        assert_eq!(activations.len(), 2);
        let (variants, _) = s.relevant_to("/oth");
        assert!(variants.is_empty());
    }

    #[test]
    fn empty_group_has_no_overrides() {
        let empty = Map::new();
        assert!(SessionOverrides::new(&empty).is_empty());
    }

    #[test]
    fn prefix_helper() {
        assert!(is_at_or_beneath("/root/a", "/root"));
        assert!(is_at_or_beneath("/root", "/root/"));
        assert!(!is_at_or_beneath("/rootx", "/root"));
        assert!(is_at_or_beneath("/anything", "/"));
    }
}
