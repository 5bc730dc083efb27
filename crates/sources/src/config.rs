//! Global rendering options and client capabilities.

use serde::{Deserialize, Serialize};

use layers_common::Extent;

/// Deployment-wide options shared by the 2D and 3D factories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalOptions {
    /// Projection of the 2D map, e.g. `EPSG:2056`
    pub default_epsg: String,

    /// Extent used when a layer declares none
    pub default_extent: Extent,

    /// WMS endpoint handed to the URL resolver
    pub wms_url: String,

    /// Scheme prepended to scheme-relative style URLs
    pub page_protocol: String,

    pub terrain_available_levels: Vec<u32>,

    pub imagery_available_levels: Vec<u32>,

    pub imagery_metadata_url: Option<String>,

    /// 3D level used when a layer has no `maxResolution`
    pub minimum_retrieving_level: u32,

    /// Preloaded levels for tiled layers when offline
    pub offline_preload: u32,

    pub wmts_cache_size: usize,

    pub tiled_wms_cache_size: usize,

    /// Streaming budget of 3D tilesets
    pub tileset_max_loaded_tiles: u32,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            default_epsg: "EPSG:2056".to_string(),
            default_extent: Extent::new(2_420_000.0, 1_030_000.0, 2_900_000.0, 1_350_000.0),
            wms_url: "//wms.geo.admin.ch/".to_string(),
            page_protocol: "https:".to_string(),
            terrain_available_levels: (0..=17).collect(),
            imagery_available_levels: (0..=18).collect(),
            imagery_metadata_url: None,
            minimum_retrieving_level: 6,
            offline_preload: 6,
            wmts_cache_size: 2048,
            tiled_wms_cache_size: 2048 * 3,
            tileset_max_loaded_tiles: 3,
        }
    }
}

impl GlobalOptions {
    /// Load options from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(val) = std::env::var("DEFAULT_EPSG") {
            options.default_epsg = val;
        }
        if let Ok(val) = std::env::var("WMS_URL") {
            options.wms_url = val;
        }
        if let Ok(val) = std::env::var("PAGE_PROTOCOL") {
            options.page_protocol = val;
        }
        if let Ok(val) = std::env::var("IMAGERY_METADATA_URL") {
            options.imagery_metadata_url = Some(val);
        }
        if let Some(extent) = std::env::var("DEFAULT_EXTENT")
            .ok()
            .and_then(|v| Extent::from_csv(&v).ok())
        {
            options.default_extent = extent;
        }
        if let Some(level) = std::env::var("MINIMUM_RETRIEVING_LEVEL")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            options.minimum_retrieving_level = level;
        }

        options
    }

    /// Tile matrix set code of the 2D projection (`2056` for `EPSG:2056`).
    pub fn tile_matrix_set(&self) -> Option<&str> {
        self.default_epsg.split(':').nth(1)
    }

    /// Validate the options.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_matrix_set().is_none() {
            return Err(format!(
                "default_epsg must look like 'EPSG:<code>', got '{}'",
                self.default_epsg
            ));
        }

        if self.default_extent.width() <= 0.0 || self.default_extent.height() <= 0.0 {
            return Err("default_extent must have a positive area".to_string());
        }

        if !self.page_protocol.ends_with(':') {
            return Err("page_protocol must end with ':'".to_string());
        }

        Ok(())
    }
}

/// What the hosting client can do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientCapabilities {
    /// Transport multiplexes requests (HTTP/2)
    pub http2: bool,

    /// iOS clients break on cross-origin base64 tiles
    pub ios: bool,

    /// Network is unavailable; tiles come from the local store
    pub offline: bool,
}

impl ClientCapabilities {
    /// `crossOrigin` attribute for image sources.
    pub fn cross_origin(&self) -> Option<String> {
        if self.ios {
            None
        } else {
            Some("anonymous".to_string())
        }
    }
}
