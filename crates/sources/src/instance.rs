//! Materialized layers handed to the 2D engine.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Serialize, Serializer};

use layers_common::{Extent, LayerId};

use crate::collaborators::SceneRef;
use crate::source2d::{ImageWmsSource, Source2d, VectorSource};
use crate::source3d::{ImageryProvider, KmlDataSource, Layer3dFactory, TerrainProvider, Tileset3d};

/// The time currently shown by one layer instance.
///
/// Shared with the 3D imagery providers built for the instance, so a time
/// change reaches the next tile request without rebuilding the provider.
#[derive(Debug, Clone, Default)]
pub struct TimeHandle(Arc<RwLock<Option<String>>>);

impl TimeHandle {
    pub fn new(time: Option<String>) -> Self {
        Self(Arc::new(RwLock::new(time)))
    }

    pub fn get(&self) -> Option<String> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, time: Option<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = time;
    }
}

impl Serialize for TimeHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

/// Where a layer on the map came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerOrigin {
    #[default]
    Catalogue,
    LocalKml,
    LocalGpx,
    External,
}

/// Map-side state of a layer, owned by the layer list.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayState {
    pub display_in_layer_manager: bool,
    pub visible: bool,
    pub background: bool,
    pub preview: bool,
    /// Permalink identifier
    pub id: Option<String>,
    pub origin: LayerOrigin,
}

impl DisplayState {
    pub fn for_catalogue_layer(bod_id: &LayerId) -> Self {
        Self {
            display_in_layer_manager: true,
            visible: true,
            background: false,
            preview: false,
            id: Some(bod_id.to_string()),
            origin: LayerOrigin::Catalogue,
        }
    }
}

/// Resolution window, opacity and extent of a 2D layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerBounds {
    pub min_resolution: Option<f64>,
    pub max_resolution: Option<f64>,
    pub opacity: f64,
    pub extent: Option<Extent>,
}

/// Engine layer wrapping a source.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer2d {
    Tile {
        bounds: LayerBounds,
        source: Source2d,
        preload: u32,
        use_interim_tiles_on_error: bool,
    },
    Image {
        bounds: LayerBounds,
        source: Arc<ImageWmsSource>,
    },
    Group {
        bounds: LayerBounds,
        layers: Vec<RenderedLayerInstance>,
    },
    Vector {
        bounds: LayerBounds,
        source: Arc<VectorSource>,
    },
}

impl Layer2d {
    pub fn bounds(&self) -> &LayerBounds {
        match self {
            Layer2d::Tile { bounds, .. }
            | Layer2d::Image { bounds, .. }
            | Layer2d::Group { bounds, .. }
            | Layer2d::Vector { bounds, .. } => bounds,
        }
    }

    /// Children of a group, empty for every other layer.
    pub fn children(&self) -> &[RenderedLayerInstance] {
        match self {
            Layer2d::Group { layers, .. } => layers,
            _ => &[],
        }
    }
}

/// A catalogue layer materialized for the 2D map.
///
/// Created per "add layer" call and dropped with the map layer. Holds
/// descriptor data, shared sources and a handle on the 3D factory, never
/// the catalogue itself.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedLayerInstance {
    pub bod_id: LayerId,
    pub label: Option<String>,
    pub time: TimeHandle,
    pub time_enabled: bool,
    pub time_behaviour: Option<String>,
    pub timestamps: Vec<String>,
    pub geojson_url: Option<String>,
    pub update_delay: Option<u64>,
    pub external_style_url: Option<String>,
    pub use_third_party_data: bool,
    pub display: DisplayState,
    pub layer: Layer2d,
    #[serde(skip)]
    pub(crate) factory3d: Arc<Layer3dFactory>,
}

impl RenderedLayerInstance {
    /// Timestamps of the layer; vector layers report the declared data
    /// time once their document is loaded.
    pub fn current_timestamps(&self) -> Vec<String> {
        if let Layer2d::Vector { source, .. } = &self.layer {
            if let Some(ts) = source.data_timestamp() {
                return vec![ts];
            }
        }
        self.timestamps.clone()
    }

    pub fn is_vector(&self) -> bool {
        matches!(self.layer, Layer2d::Vector { .. })
            || matches!(self.display.origin, LayerOrigin::LocalKml | LayerOrigin::LocalGpx)
    }

    /// The 2D source, if this layer has a single one.
    pub fn source(&self) -> Option<Source2d> {
        match &self.layer {
            Layer2d::Tile { source, .. } => Some(source.clone()),
            Layer2d::Image { source, .. } => Some(Source2d::ImageWms(source.clone())),
            Layer2d::Vector { source, .. } => Some(Source2d::Vector(source.clone())),
            Layer2d::Group { .. } => None,
        }
    }

    /// 3D imagery for this layer, bound to its time handle.
    pub fn imagery_provider_3d(&self) -> Option<Vec<ImageryProvider>> {
        self.factory3d.imagery_provider(self.bod_id.as_str(), &self.time)
    }

    /// 3D vector data source for KML layers.
    pub fn data_source_3d(&self, scene: &SceneRef) -> Option<KmlDataSource> {
        self.factory3d.data_source(self.bod_id.as_str(), scene)
    }

    pub fn tileset_3d(&self) -> Option<Tileset3d> {
        self.factory3d.tileset(self.bod_id.as_str())
    }

    pub fn terrain_provider_3d(&self) -> Option<TerrainProvider> {
        self.factory3d.terrain_provider(self.bod_id.as_str())
    }
}
