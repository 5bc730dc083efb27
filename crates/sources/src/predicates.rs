//! Filters over the layers on the map.
//!
//! Each predicate looks at one instance and, for the catalogue-backed ones,
//! reads the current snapshot. None of them fetch anything.

use catalog::CatalogSnapshot;

use crate::instance::{LayerOrigin, RenderedLayerInstance};
use crate::linkage::has_tooltip;

/// Layers the user added and that appear in the layer manager.
pub fn selected(layer: &RenderedLayerInstance) -> bool {
    layer.display.display_in_layer_manager
}

pub fn selected_and_visible(layer: &RenderedLayerInstance) -> bool {
    layer.display.display_in_layer_manager && layer.display.visible
}

/// Layers that can be written to a permalink. Local KML and GPX files
/// cannot.
pub fn permalinked(layer: &RenderedLayerInstance) -> bool {
    layer.display.display_in_layer_manager
        && layer.display.id.as_deref().is_some_and(|id| !id.is_empty())
        && !matches!(layer.display.origin, LayerOrigin::LocalKml | LayerOrigin::LocalGpx)
}

pub fn time_enabled(layer: &RenderedLayerInstance) -> bool {
    layer.time_enabled && layer.display.visible && !layer.display.background && !layer.display.preview
}

/// Layers the query tool may ask for a tooltip.
pub fn potential_tooltip(layer: &RenderedLayerInstance, snapshot: &CatalogSnapshot) -> bool {
    selected_and_visible(layer) && has_tooltip(snapshot, layer.bod_id.as_str(), false) && !layer.is_vector()
}

pub fn searchable(layer: &RenderedLayerInstance, snapshot: &CatalogSnapshot) -> bool {
    selected_and_visible(layer)
        && snapshot
            .get(layer.bod_id.as_str())
            .is_some_and(|config| config.searchable)
}

/// Layers with at least one queryable attribute.
pub fn queryable(layer: &RenderedLayerInstance, snapshot: &CatalogSnapshot) -> bool {
    selected_and_visible(layer)
        && snapshot
            .get(layer.bod_id.as_str())
            .is_some_and(|config| !config.queryable_attributes.is_empty())
}

pub fn background(layer: &RenderedLayerInstance) -> bool {
    layer.display.background
}

/// Layers refreshed periodically, geojson only for now.
pub fn realtime(layer: &RenderedLayerInstance) -> bool {
    layer.update_delay.is_some()
}
