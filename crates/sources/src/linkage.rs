//! Navigation between the 2D and 3D variants of a layer.

use catalog::CatalogSnapshot;
use layers_common::LayerDescriptor;

/// The descriptor to inspect for anything 3D specific.
///
/// A link that cannot be followed falls back to `layer` itself.
pub fn resolve_config3d<'a>(snapshot: &'a CatalogSnapshot, layer: &'a LayerDescriptor) -> &'a LayerDescriptor {
    snapshot.config3d(layer)
}

/// Whether the layer answers feature queries.
///
/// With 3D active the 3D variant decides. A variant without a `tooltip`
/// flag inherits it from its parent layer.
pub fn has_tooltip(snapshot: &CatalogSnapshot, bod_id: &str, is_3d_active: bool) -> bool {
    let Some(mut config) = snapshot.get(bod_id) else {
        return false;
    };
    if is_3d_active {
        config = snapshot.try_config3d(config).unwrap_or(config);
    }
    if config.tooltip.is_none() {
        if let Some(parent) = &config.parent_layer_id {
            return snapshot
                .get(parent.as_str())
                .and_then(|p| p.tooltip)
                .unwrap_or(false);
        }
    }
    config.tooltip.unwrap_or(false)
}
