//! Integration tests for the 3D source factory.

use tokio_test::assert_ok;

use sources::{BuildOptions, ClientCapabilities, ImageryProvider, RenderedLayerInstance, SceneRef, TimeHandle};
use test_utils::{fixture_fetcher, ids, Harness, MockProxy, KML_BODY, KML_URL};

fn build(harness: &Harness, bod_id: &str) -> RenderedLayerInstance {
    harness
        .factory
        .build_layer(bod_id, &BuildOptions::default())
        .expect("layer has a 2D representation")
}

fn single_provider(instance: &RenderedLayerInstance) -> ImageryProvider {
    let mut providers = instance.imagery_provider_3d().expect("imagery in 3D");
    assert_eq!(providers.len(), 1);
    providers.remove(0)
}

fn scene() -> SceneRef {
    SceneRef {
        camera: "camera-1".to_string(),
        canvas: "canvas-1".to_string(),
    }
}

// ============================================================================
// Imagery
// ============================================================================

#[tokio::test]
async fn test_wmts_imagery_goes_through_config3d() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let provider = single_provider(&build(&harness, ids::PIXELKARTE));

    assert_eq!(provider.bod_id.as_str(), ids::PIXELKARTE_3D);
    assert_eq!(
        provider.url,
        "//wmts{s}.geo.admin.ch/1.0.0/ch.swisstopo.swisstlm3d-karte-farbe/default/{Time}/4326/{z}/{x}/{y}.png"
    );
    assert_eq!(provider.subdomains.len(), 6);
    assert_eq!(provider.tile_width, 256);
    assert_eq!(provider.tile_height, 256);
    assert!(provider.has_alpha_channel);

    // maxResolution 2500 m/px is level 5 of the geographic scheme
    assert_eq!(provider.minimum_level, 5);
    assert_eq!(provider.maximum_retrieving_level, None);
    assert_eq!(provider.maximum_level, Some(18));
    assert_eq!(provider.extent, harness.options.default_extent);
    assert_eq!(provider.available_levels.len(), 19);
}

#[tokio::test]
async fn test_pngjpeg_becomes_jpeg_in_3d() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let provider = single_provider(&build(&harness, ids::ZEITREIHEN));

    assert!(provider.url.ends_with("/4326/{z}/{x}/{y}.jpeg"));
    assert!(!provider.has_alpha_channel);
    // No maxResolution: global default
    assert_eq!(provider.minimum_level, 6);
    // minResolution 2.5 m/px caps retrieval, client zoom disabled
    assert_eq!(provider.maximum_retrieving_level, Some(15));
    assert_eq!(provider.maximum_level, None);
}

#[tokio::test]
async fn test_imagery_follows_instance_time() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let instance = build(&harness, ids::ZEITREIHEN);
    let provider = single_provider(&instance);

    assert!(provider.request_url().contains("/default/19991231/4326/"));
    instance.time.set(Some("18641231".to_string()));
    assert!(provider.request_url().contains("/default/18641231/4326/"));

    let unset = ImageryProvider {
        time: TimeHandle::default(),
        ..provider
    };
    assert!(unset.request_url().contains("/default//4326/"));
}

#[tokio::test]
async fn test_wms_imagery_parameters() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let provider = single_provider(&build(&harness, ids::GEWAESSER));

    assert!(provider.url.starts_with("//wms{s}.geo.admin.ch/?"));
    assert!(provider
        .url
        .contains("layers=ch.bafu.gewaesserschutz-a,ch.bafu.gewaesserschutz-b"));
    assert!(provider.url.contains("format=image%2Fpng"));
    assert!(provider.url.contains("service=WMS&version=1.3.0&request=GetMap&crs=CRS:84"));
    assert!(provider
        .url
        .contains("bbox={westProjected},{southProjected},{eastProjected},{northProjected}"));
    assert!(provider.url.contains("width=512&height=512"));
    assert!(!provider.url.contains("time="));
    assert_eq!(provider.tile_width, 512);
    assert_eq!(provider.subdomains, harness.urls.wms_subdomains().to_vec());
}

#[tokio::test]
async fn test_time_enabled_wms_imagery_has_time_placeholder() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let instance = build(&harness, ids::FIXPUNKTE);
    let provider = single_provider(&instance);

    assert!(provider.url.ends_with("&time={Time}"));
    assert!(provider.request_url().ends_with("&time=2018"));
}

#[tokio::test]
async fn test_aggregate_imagery_is_flattened() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let providers = build(&harness, ids::CADASTRAL).imagery_provider_3d().unwrap();

    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0].bod_id.as_str(), ids::CADASTRAL_WMTS);
    assert_eq!(providers[0].maximum_retrieving_level, Some(15));
    assert_eq!(providers[0].maximum_level, None);
    assert_eq!(providers[1].bod_id.as_str(), ids::CADASTRAL_WMS);
    assert_eq!(providers[1].minimum_level, 15);
}

#[tokio::test]
async fn test_aggregate_with_non_imagery_3d_yields_empty_list() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let instance = build(&harness, ids::BUILDINGS_GROUP);

    assert_eq!(instance.imagery_provider_3d().map(|p| p.len()), Some(0));
    // The 3D side of the group is a tileset
    let tileset = instance.tileset_3d().unwrap();
    assert_eq!(tileset.bod_id.as_str(), ids::BUILDINGS_GROUP);
}

#[tokio::test]
async fn test_no_imagery_for_vector_layers() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let factory = harness.factory.factory3d();

    assert!(factory.imagery_provider(ids::LADESTELLEN, &TimeHandle::default()).is_none());
    assert!(factory.imagery_provider(ids::TERRAIN, &TimeHandle::default()).is_none());
}

// ============================================================================
// Terrain and tilesets
// ============================================================================

#[tokio::test]
async fn test_terrain_provider() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let factory = harness.factory.factory3d();

    let terrain = factory.terrain_provider(ids::TERRAIN).unwrap();
    assert_eq!(terrain.bod_id.as_str(), ids::TERRAIN);
    assert_eq!(
        terrain.url,
        "//3d.geo.admin.ch/1.0.0/ch.swisstopo.terrain.3d/default/20160115/4326"
    );
    assert_eq!(terrain.available_levels, (0..=17).collect::<Vec<u32>>());
    assert!(factory.terrain_provider(ids::PIXELKARTE).is_none());
}

#[tokio::test]
async fn test_tileset_through_configured_link() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let instance = build(&harness, ids::SWISSNAMES);

    let tileset = instance.tileset_3d().unwrap();
    assert_eq!(tileset.bod_id.as_str(), ids::SWISSNAMES);
    assert_eq!(
        tileset.url,
        "//vectortiles100.geo.admin.ch/ch.swisstopo.swissnames3d.3d/20170814/"
    );
    assert_eq!(tileset.maximum_number_of_loaded_tiles, 3);
    assert_eq!(tileset.style.as_ref().unwrap()["show"], true);

    // Without HTTP/2 the subdomains rotate
    let next = instance.tileset_3d().unwrap();
    assert!(next.url.starts_with("//vectortiles101."));

    assert!(instance.imagery_provider_3d().is_none());
    assert!(build(&harness, ids::GEWAESSER).tileset_3d().is_none());
}

#[tokio::test]
async fn test_tileset_over_http2_stays_on_one_host() {
    let caps = ClientCapabilities {
        http2: true,
        ..Default::default()
    };
    let harness = Harness::loaded(caps).await;
    let factory = harness.factory.factory3d();

    for _ in 0..3 {
        let tileset = factory.tileset(ids::BUILDINGS).unwrap();
        assert!(tileset.url.starts_with("//vectortiles100."));
        assert_eq!(tileset.style, None);
    }
}

// ============================================================================
// KML
// ============================================================================

#[tokio::test]
async fn test_kml_data_source_loads_through_proxy() {
    let harness = Harness::loaded(ClientCapabilities::default()).await;
    let factory = harness.factory.factory3d();

    let source = factory.data_source(ids::FLUGHINDERNISSE, &scene()).unwrap();
    assert_eq!(source.bod_id.as_str(), ids::FLUGHINDERNISSE);
    assert_eq!(source.url, KML_URL);
    assert_eq!(source.camera, "camera-1");
    assert_eq!(source.proxy.as_deref(), Some(MockProxy::PREFIX));

    let document = assert_ok!(source.load.clone().await);
    assert_eq!(document.body.as_ref(), KML_BODY.as_bytes());
    assert_eq!(harness.fetcher.call_count(&MockProxy::proxied(KML_URL)), 1);

    assert!(build(&harness, ids::PIXELKARTE).data_source_3d(&scene()).is_none());
}

// ============================================================================
// Without catalogue
// ============================================================================

#[tokio::test]
async fn test_nothing_before_first_load() {
    let harness = Harness::new(fixture_fetcher(), ClientCapabilities::default());
    let factory = harness.factory.factory3d();

    assert!(factory.terrain_provider(ids::TERRAIN).is_none());
    assert!(factory.tileset(ids::BUILDINGS).is_none());
    assert!(factory
        .imagery_provider(ids::PIXELKARTE, &TimeHandle::default())
        .is_none());
    assert!(factory.data_source(ids::FLUGHINDERNISSE, &scene()).is_none());
}

// ============================================================================
// Broken links
// ============================================================================

#[tokio::test]
async fn test_dangling_config3d_link_yields_no_3d_sources() {
    let urls = layers_protocol::UrlTemplates::default();
    let fetcher = test_utils::MockFetcher::new().with_response(
        urls.layers_config_url("de"),
        r#"{"ch.a": {"type": "wms", "config3d": "ch.a_3d_missing"}}"#,
    );
    let harness = Harness::new(fetcher, ClientCapabilities::default());
    let snapshot = assert_ok!(harness.catalog.load("de").await);
    assert_eq!(snapshot.layer("ch.a").config3d, None);

    // The layer falls back to its own descriptor on the globe
    let instance = build(&harness, "ch.a");
    let providers = instance.imagery_provider_3d().expect("wms imagery in 3D");
    assert_eq!(providers[0].bod_id.as_str(), "ch.a");

    let factory = harness.factory.factory3d();
    assert!(factory.terrain_provider("ch.a").is_none());
    assert!(factory.tileset("ch.a").is_none());
    assert!(factory.data_source("ch.a", &scene()).is_none());
}
