//! Integration tests for the layer filters.

use sources::predicates::{
    background, permalinked, potential_tooltip, queryable, realtime, searchable, selected, selected_and_visible,
    time_enabled,
};
use sources::{has_tooltip, BuildOptions, ClientCapabilities, LayerOrigin, RenderedLayerInstance};
use test_utils::{ids, Harness};

fn build(harness: &Harness, bod_id: &str) -> RenderedLayerInstance {
    harness
        .factory
        .build_layer(bod_id, &BuildOptions::default())
        .expect("layer has a 2D representation")
}

#[tokio::test]
async fn test_catalogue_layer_defaults() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let snapshot = harness.catalog.snapshot().unwrap();
    let layer = build(&harness, ids::GEWAESSER);

    assert!(selected(&layer));
    assert!(selected_and_visible(&layer));
    assert!(permalinked(&layer));
    assert!(potential_tooltip(&layer, &snapshot));
    assert!(searchable(&layer, &snapshot));
    assert!(queryable(&layer, &snapshot));
    assert!(!background(&layer));
    assert!(!realtime(&layer));
    assert!(!time_enabled(&layer));
}

#[tokio::test]
async fn test_hidden_layers_are_not_queried() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let snapshot = harness.catalog.snapshot().unwrap();
    let mut layer = build(&harness, ids::GEWAESSER);
    layer.display.visible = false;

    assert!(selected(&layer));
    assert!(!selected_and_visible(&layer));
    assert!(!potential_tooltip(&layer, &snapshot));
    assert!(!searchable(&layer, &snapshot));
    assert!(!queryable(&layer, &snapshot));
}

#[tokio::test]
async fn test_time_enabled_needs_an_active_layer() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let mut layer = build(&harness, ids::FIXPUNKTE);
    assert!(time_enabled(&layer));

    layer.display.preview = true;
    assert!(!time_enabled(&layer));

    layer.display.preview = false;
    layer.display.background = true;
    assert!(!time_enabled(&layer));
    assert!(background(&layer));
}

#[tokio::test]
async fn test_local_files_are_not_permalinked() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let mut layer = build(&harness, ids::GEWAESSER);

    layer.display.origin = LayerOrigin::LocalKml;
    assert!(!permalinked(&layer));
    layer.display.origin = LayerOrigin::LocalGpx;
    assert!(!permalinked(&layer));

    layer.display.origin = LayerOrigin::External;
    assert!(permalinked(&layer));
    layer.display.id = None;
    assert!(!permalinked(&layer));
}

#[tokio::test]
async fn test_vector_layers_have_no_tooltip() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let snapshot = harness.catalog.snapshot().unwrap();
    let layer = build(&harness, ids::LADESTELLEN);

    assert!(has_tooltip(&snapshot, ids::LADESTELLEN, false));
    assert!(!potential_tooltip(&layer, &snapshot));
    assert!(realtime(&layer));
    assert!(!searchable(&layer, &snapshot));
}

#[tokio::test]
async fn test_tooltip_inherited_by_aggregate_children() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let snapshot = harness.catalog.snapshot().unwrap();
    let child = build(&harness, ids::CADASTRAL_WMTS);

    assert!(potential_tooltip(&child, &snapshot));
    assert!(!queryable(&child, &snapshot));
}

#[tokio::test]
async fn test_tooltip_of_3d_variant() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let snapshot = harness.catalog.snapshot().unwrap();

    // The synthesized tileset disables tooltips in 3D
    assert!(has_tooltip(&snapshot, ids::SWISSNAMES, false));
    assert!(!has_tooltip(&snapshot, ids::SWISSNAMES, true));
}
