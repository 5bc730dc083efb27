//! Tests for timestamp resolution.

use layers_common::{resolve_timestamp, LayerDescriptor, LayerKind};

fn time_enabled(kind: LayerKind, timestamps: &[&str], behaviour: Option<&str>) -> LayerDescriptor {
    let mut layer = LayerDescriptor::new("ch.test.layer", kind);
    layer.time_enabled = true;
    layer.timestamps = timestamps.iter().map(|s| s.to_string()).collect();
    layer.time_behaviour = behaviour.map(str::to_string);
    layer
}

// ============================================================================
// Layers without time dimension
// ============================================================================

#[test]
fn test_wmts_not_time_enabled_returns_first_timestamp() {
    let mut layer = LayerDescriptor::new("ch.swisstopo.pixelkarte-farbe", LayerKind::Wmts);
    layer.timestamps = vec!["20151231".to_string(), "20140101".to_string()];

    assert_eq!(resolve_timestamp(&layer, None), Some("20151231"));
    assert_eq!(resolve_timestamp(&layer, Some("2014")), Some("20151231"));
    assert_eq!(resolve_timestamp(&layer, Some("garbage")), Some("20151231"));
}

#[test]
fn test_terrain_and_tileset_return_first_timestamp() {
    for kind in [LayerKind::Terrain, LayerKind::Tileset3d] {
        let mut layer = LayerDescriptor::new("ch.swisstopo.terrain.3d", kind);
        layer.timestamps = vec!["20160115".to_string()];
        assert_eq!(resolve_timestamp(&layer, Some("1999")), Some("20160115"));
    }
}

#[test]
fn test_wms_not_time_enabled_has_no_timestamp() {
    let mut layer = LayerDescriptor::new("ch.bafu.wms", LayerKind::Wms);
    layer.timestamps = vec!["20151231".to_string()];
    assert_eq!(resolve_timestamp(&layer, None), None);
    assert_eq!(resolve_timestamp(&layer, Some("2015")), None);
}

#[test]
fn test_wmts_without_timestamps_resolves_to_none() {
    let layer = LayerDescriptor::new("ch.empty", LayerKind::Wmts);
    assert_eq!(resolve_timestamp(&layer, None), None);
}

// ============================================================================
// Matching rules
// ============================================================================

#[test]
fn test_first_match_wins_not_nearest() {
    let layer = time_enabled(LayerKind::Wmts, &["20100101", "20120101", "20100601"], None);
    assert_eq!(resolve_timestamp(&layer, Some("2010")), Some("20100101"));
}

#[test]
fn test_catalogue_order_is_the_tie_break() {
    let layer = time_enabled(LayerKind::Wmts, &["20100601", "20100101"], None);
    assert_eq!(resolve_timestamp(&layer, Some("2010")), Some("20100601"));
}

#[test]
fn test_exact_timestamp_match() {
    let layer = time_enabled(LayerKind::Wms, &["20100101", "20100601"], None);
    assert_eq!(resolve_timestamp(&layer, Some("20100601")), Some("20100601"));
}

#[test]
fn test_full_timestamp_does_not_match_numerically_on_year() {
    // 20100715 is compared whole against the 4-digit year part only
    let layer = time_enabled(LayerKind::Wms, &["20100101"], None);
    assert_eq!(resolve_timestamp(&layer, Some("20100715")), None);
}

#[test]
fn test_year_only_timestamps() {
    let layer = time_enabled(LayerKind::Wms, &["2012", "2010"], None);
    assert_eq!(resolve_timestamp(&layer, Some("2010")), Some("2010"));
}

#[test]
fn test_no_match_returns_none() {
    let layer = time_enabled(LayerKind::Wmts, &["20100101", "20120101"], None);
    assert_eq!(resolve_timestamp(&layer, Some("1999")), None);
    assert_eq!(resolve_timestamp(&layer, Some("abc")), None);
}

// ============================================================================
// Defaults from timeBehaviour
// ============================================================================

#[test]
fn test_default_from_literal_year_behaviour() {
    let layer = time_enabled(LayerKind::Wmts, &["20140101", "20120101", "20120601"], Some("2012"));
    assert_eq!(resolve_timestamp(&layer, None), Some("20120101"));
}

#[test]
fn test_default_from_eight_digit_behaviour_uses_year() {
    let layer = time_enabled(LayerKind::Wmts, &["20140101", "20120601", "20120101"], Some("20120101"));
    // only the year part of the behaviour is used, so the first 2012 entry wins
    assert_eq!(resolve_timestamp(&layer, None), Some("20120601"));
}

#[test]
fn test_default_from_six_digit_behaviour() {
    let layer = time_enabled(LayerKind::Wms, &["20140101", "20130101"], Some("201301"));
    assert_eq!(resolve_timestamp(&layer, None), Some("20130101"));
}

#[test]
fn test_default_behaviour_all_resolves_to_none() {
    let layer = time_enabled(LayerKind::Wmts, &["20140101", "20120101"], Some("all"));
    assert_eq!(resolve_timestamp(&layer, None), None);
}

#[test]
fn test_default_behaviour_last_takes_first_timestamp() {
    let layer = time_enabled(LayerKind::Wmts, &["20140101", "20120101"], Some("last"));
    assert_eq!(resolve_timestamp(&layer, None), Some("20140101"));
}

#[test]
fn test_default_without_behaviour_takes_first_timestamp() {
    let layer = time_enabled(LayerKind::Wms, &["20140101", "20120101"], None);
    assert_eq!(resolve_timestamp(&layer, None), Some("20140101"));
}

#[test]
fn test_default_with_no_timestamps() {
    let layer = time_enabled(LayerKind::Wms, &[], None);
    assert_eq!(resolve_timestamp(&layer, None), None);
}

#[test]
fn test_resolution_is_deterministic() {
    let layer = time_enabled(LayerKind::Wmts, &["20100101", "20120101", "20100601"], None);
    let first = resolve_timestamp(&layer, Some("2012"));
    for _ in 0..10 {
        assert_eq!(resolve_timestamp(&layer, Some("2012")), first);
    }
}
