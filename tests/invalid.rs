use std::sync::Arc;

use traversal_context as tc;
use tc::{ContextBuilder, ContextError, Prim, SceneDocument, Stage};

fn scene() -> Arc<dyn Stage> {
    Arc::new(
        SceneDocument::from_json(
            r#"{ "identifier": "s.json", "prims": [ { "name": "a", "extent": [[0,0,0],[1,1,1]] } ] }"#,
        )
        .unwrap(),
    )
}

// Finalizing with an error always hands back a context, with the message intact.
#[test]
fn test_build_with_error_returns_context() {
    let ctx = ContextBuilder {
        stage: Some(scene()),
        root_location: "/root".into(),
        ..Default::default()
    }
    .build_with_error("failed to resolve session overrides: bad key");
    assert_eq!(
        ctx.error_message(),
        Some("failed to resolve session overrides: bad key")
    );
    assert!(ctx.is_errored());
}

// An errored context used anyway behaves as an empty traversal root.
#[test]
fn test_errored_context_is_inert() {
    let ctx = ContextBuilder {
        stage: Some(scene()),
        root_location: "/root".into(),
        ..Default::default()
    }
    .build_with_error("boom");
    assert!(ctx.root_prim().is_none());
    assert!(ctx.compute_bounds(&Prim::new("/a")).is_empty());
    assert!(tc::collect(&ctx, 4).is_empty());
    // configuration is still readable
    assert_eq!(ctx.root_location_path(), "/root");
    assert_eq!(ctx.file_name(), "s.json");
}

#[test]
fn test_missing_stage_is_reported() {
    let ctx = ContextBuilder {
        root_location: "/root".into(),
        ..Default::default()
    }
    .build();
    assert_eq!(ctx.error_message(), Some("no stage"));
    assert_eq!(ctx.file_name(), "");
}

#[test]
fn test_try_build_surfaces_init_error() {
    let err = ContextBuilder {
        stage: Some(scene()),
        ..Default::default()
    }
    .try_build()
    .unwrap_err();
    assert!(matches!(err, ContextError::Init(_)));
    assert_eq!(err.to_string(), "initialization failed: root location is empty");
}

#[test]
fn test_invalid_attribute_path() {
    let v = serde_json::json!({ "variants": {} });
    let err = tc::attrpath::lookup(&v, "variants[").unwrap_err();
    assert!(matches!(err, ContextError::Path(_)));
}
