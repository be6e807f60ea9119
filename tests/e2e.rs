use std::sync::Arc;

use serde_json::json;
use traversal_context as tc;
use tc::{BBox3, SceneDocument, Stage, TraversalConfig};

fn scene() -> Arc<dyn Stage> {
    Arc::new(
        SceneDocument::from_json(
            r#"{
                "identifier": "shot.json",
                "sublayers": ["anim.json", "fx_cache.json"],
                "prims": [
                    { "name": "world", "children": [
                        { "name": "car",
                          "extent": [[-1,0,-2],[1,1,2]],
                          "translate": [[-0.2, [0,0,0]], [0.2, [4,0,0]]] },
                        { "name": "tree", "extent": [[0,0,0],[1,5,1]] }
                    ]}
                ]
            }"#,
        )
        .unwrap(),
    )
}

#[test]
fn test_shutter_window_example() {
    let cfg = TraversalConfig::from_json(
        r#"{
            "rootLocation": "/root/world",
            "isolatePath": "/world",
            "shutterOpen": -0.2,
            "shutterClose": 0.2,
            "motionSampleTimes": [-0.2, 0.0, 0.2]
        }"#,
    )
    .unwrap();
    let ctx = cfg.into_builder(scene()).try_build().unwrap();
    assert!(!ctx.is_motion_backward());

    let records = tc::collect(&ctx, 2);
    let world = records.iter().find(|r| r.location == "/root/world").unwrap();
    assert_eq!(world.bounds.len(), 3);
    assert_eq!(world.sample_times, vec![-0.2, 0.0, 0.2]);

    // car moves from x=0 at t=-0.2 to x=4 at t=0.2
    assert_eq!(world.bounds[0], BBox3::new([-1.0, 0.0, -2.0], [1.0, 5.0, 2.0]));
    assert_eq!(world.bounds[2], BBox3::new([0.0, 0.0, -2.0], [5.0, 5.0, 2.0]));
    let mid = world.bounds[1];
    assert!((mid.max[0] - 3.0).abs() < 1e-9);
}

#[test]
fn test_backward_motion_example() {
    let cfg = TraversalConfig::from_json(
        r#"{ "rootLocation": "/root", "motionSampleTimes": [0.2, -0.2] }"#,
    )
    .unwrap();
    let ctx = cfg.into_builder(scene()).build();
    assert!(ctx.is_motion_backward());
    assert!(ctx.error_message().is_none());
}

#[test]
fn test_file_name_and_layers() {
    let ctx = TraversalConfig::from_json(
        r#"{ "rootLocation": "/root", "ignoreLayerRegex": "^fx_" }"#,
    )
    .unwrap()
    .into_builder(scene())
    .build();
    assert_eq!(ctx.file_name(), "shot.json");
    assert_eq!(ctx.active_layers(), vec!["shot.json", "anim.json"]);
}

#[test]
fn test_extra_attributes_are_exposed() {
    let ctx = TraversalConfig::from_json(
        r#"{ "rootLocation": "/root",
             "extraAttributesOrNamespaces": {
                 "geometry": ["primvars:st", "primvars:N"],
                 "prmanStatements": ["ri:"] } }"#,
    )
    .unwrap()
    .into_builder(scene())
    .build();
    let extra = ctx.extra_attributes_or_namespaces();
    assert_eq!(extra.len(), 2);
    assert_eq!(extra["prmanStatements"], vec!["ri:".to_string()]);
}

#[test]
fn test_session_overrides_deactivate_locations() {
    let session = json!({
        "activations": { tc::delimiter_encode("/root/world/tree"): 0 },
        "variants": { tc::delimiter_encode("/root/world/car"): { "paint": "red" } }
    });
    let ctx = tc::ContextBuilder {
        stage: Some(scene()),
        root_location: "/root".into(),
        session_attr: Some(session),
        ..Default::default()
    }
    .build();
    let locations: Vec<String> = tc::collect(&ctx, 1).into_iter().map(|r| r.location).collect();
    assert_eq!(locations, vec!["/root", "/root/world", "/root/world/car"]);

    let sels = ctx.session_overrides().variant_selections_for("/root/world/car");
    assert_eq!(sels.len(), 1);
    assert_eq!(sels[0].selection, "red");
}
