use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use traversal_context as tc;
use tc::{ContextBuilder, SceneDocument, Stage};

fn scene() -> Arc<dyn Stage> {
    Arc::new(SceneDocument::from_json(r#"{ "identifier": "s.json" }"#).unwrap())
}

#[test]
fn test_session_attr_is_exposed_unchanged() {
    let session = json!({
        "variants": {
            "%2Froot%2Fworld%2Fhero": { "modelingVariant": "damaged", "shadingVariant": "wet" }
        },
        "activations": {
            "%2Froot%2Fworld%2Fprop%2Ecrate": 0,
            "%2Froot%2Fworld%2Fhero": 1
        }
    });
    let ctx = ContextBuilder {
        stage: Some(scene()),
        root_location: "/root".into(),
        session_attr: Some(session.clone()),
        ..Default::default()
    }
    .build();
    assert_eq!(ctx.session_attr(), &session);

    let crate_active = tc::attrpath::lookup(ctx.session_attr(), "activations.%2Froot%2Fworld%2Fprop%2Ecrate")
        .unwrap();
    assert_eq!(crate_active, vec![&json!(0)]);
    assert_eq!(
        ctx.session_overrides().activation_for("/root/world/prop.crate"),
        Some(false)
    );
}

#[test]
fn test_unset_session_attr_is_valid_empty_group() {
    let ctx = ContextBuilder {
        stage: Some(scene()),
        root_location: "/root".into(),
        ..Default::default()
    }
    .build();
    assert!(ctx.session_attr().is_object());
    assert_eq!(ctx.session_attr(), &json!({}));
    assert!(ctx.session_overrides().is_empty());
}

proptest! {
    #[test]
    fn delimiter_encoding_round_trips(path in "(/[a-zA-Z0-9_.%]{1,8}){1,5}") {
        let encoded = tc::delimiter_encode(&path);
        prop_assert!(!encoded.contains('/'));
        prop_assert!(!encoded.contains('.'));
        prop_assert_eq!(tc::delimiter_decode(&encoded), path);
    }
}
