//! Catalogue load configuration.
//!
//! Display-flag allowlists and the terrain and 3D tileset entries that are
//! added to every catalogue payload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Permalink parameter key replacing the list of 3D tileset ids.
pub const TILESET_PARAM: &str = "tileset3d";

/// Permalink parameter key replacing the list of 3D tileset timestamps.
pub const TILESET_TS_PARAM: &str = "tilesetTs";

/// Read access to the current permalink parameters.
pub trait PermalinkParams: Send + Sync {
    fn param(&self, key: &str) -> Option<String>;
}

impl PermalinkParams for HashMap<String, String> {
    fn param(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// No permalink parameters at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPermalink;

impl PermalinkParams for NoPermalink {
    fn param(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Terrain entry added to every catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainConfig {
    pub id: String,
    pub timestamp: String,
    pub attribution: String,
    /// Attribution link, `{Lang}` is replaced by the catalogue language.
    pub attribution_url_template: String,
}

/// One 3D vector tileset added to the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilesetConfig {
    /// Server-side tileset id, e.g. `ch.swisstopo.swissnames3d.3d`
    pub id: String,
    pub timestamp: String,
    /// Named style handed to the style compiler
    #[serde(default)]
    pub style: Option<String>,
}

/// A 2D layer linked to its 3D counterpart when both are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link3d {
    pub layer: String,
    pub config3d: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Layers forced to `opaque = true`
    pub opaque_layers: Vec<String>,

    /// Layers forced to `shopMulti = true`
    pub shop_multi_layers: Vec<String>,

    pub terrain: Option<TerrainConfig>,

    pub tilesets: Vec<TilesetConfig>,

    pub links_3d: Vec<Link3d>,

    /// Attribution of synthesized tilesets
    pub tileset_attribution: String,

    /// Attribution link of synthesized tilesets, `{Lang}` is substituted
    pub tileset_attribution_url_template: Option<String>,

    /// Request timeout for catalogue and metadata fetches (seconds)
    pub request_timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let ids = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut opaque = Vec::new();
        for base in [
            "ch.swisstopo.swissimage-product",
            "ch.swisstopo.pixelkarte-farbe",
            "ch.swisstopo.pixelkarte-grau",
            "ch.swisstopo.swisstlm3d-karte-farbe",
            "ch.swisstopo.swisstlm3d-karte-grau",
        ] {
            opaque.push(base.to_string());
            opaque.push(format!("{}_3d", base));
        }
        for scale in ["25", "50", "100", "200", "500", "1000"] {
            opaque.push(format!("ch.swisstopo.pixelkarte-farbe-pk{}.noscale", scale));
        }

        Self {
            opaque_layers: opaque,
            shop_multi_layers: ids(&[
                "ch.swisstopo.lubis-luftbilder_farbe",
                "ch.swisstopo.lubis-luftbilder_schwarzweiss",
                "ch.swisstopo.lubis-luftbilder_infrarot",
                "ch.swisstopo.lubis-bildstreifen",
            ]),
            terrain: Some(TerrainConfig {
                id: "ch.swisstopo.terrain.3d".to_string(),
                timestamp: "20160115".to_string(),
                attribution: "swisstopo".to_string(),
                attribution_url_template: "https://www.swisstopo.admin.ch/{Lang}/home.html"
                    .to_string(),
            }),
            tilesets: vec![
                TilesetConfig {
                    id: "ch.swisstopo.swisstlm3d.3d".to_string(),
                    timestamp: "20170425".to_string(),
                    style: None,
                },
                TilesetConfig {
                    id: "ch.swisstopo.swissnames3d.3d".to_string(),
                    timestamp: "20170814".to_string(),
                    style: Some("labelEnhanced".to_string()),
                },
                TilesetConfig {
                    id: "ch.swisstopo.vegetation.3d".to_string(),
                    timestamp: "20170630".to_string(),
                    style: None,
                },
            ],
            links_3d: vec![Link3d {
                layer: "ch.swisstopo.swissnames3d".to_string(),
                config3d: "ch.swisstopo.swissnames3d_3d".to_string(),
            }],
            tileset_attribution: "swisstopo".to_string(),
            tileset_attribution_url_template: Some("https://www.swisstopo.admin.ch/{Lang}/home.html".to_string()),
            request_timeout_secs: 30,
        }
    }
}

impl CatalogConfig {
    /// Tilesets after applying the permalink overrides.
    ///
    /// `tileset3d` replaces the id list and `tilesetTs` the timestamp list,
    /// both comma separated. Styles stay attached to their position in the
    /// configured list. Empty ids are skipped.
    pub fn effective_tilesets(&self, permalink: &dyn PermalinkParams) -> Vec<TilesetConfig> {
        let ids: Vec<String> = match permalink.param(TILESET_PARAM) {
            Some(p) if !p.is_empty() => p.split(',').map(str::to_string).collect(),
            _ => self.tilesets.iter().map(|t| t.id.clone()).collect(),
        };
        let timestamps: Vec<String> = match permalink.param(TILESET_TS_PARAM) {
            Some(p) if !p.is_empty() => p.split(',').map(str::to_string).collect(),
            _ => self.tilesets.iter().map(|t| t.timestamp.clone()).collect(),
        };

        ids.into_iter()
            .enumerate()
            .filter(|(_, id)| !id.is_empty())
            .map(|(idx, id)| TilesetConfig {
                id,
                timestamp: timestamps.get(idx).cloned().unwrap_or_default(),
                style: self.tilesets.get(idx).and_then(|t| t.style.clone()),
            })
            .collect()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(terrain) = &self.terrain {
            if terrain.id.is_empty() {
                return Err("terrain id must not be empty".to_string());
            }
        }

        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be > 0".to_string());
        }

        Ok(())
    }
}

/// Catalogue id of a synthesized tileset: the first `.3d` becomes `_3d`.
pub fn tileset_layer_id(tileset_id: &str) -> String {
    tileset_id.replacen(".3d", "_3d", 1)
}

/// Language used in swisstopo attribution links; Romansh pages do not exist.
pub fn attribution_lang(lang: &str) -> &str {
    if lang == "rm" {
        "de"
    } else {
        lang
    }
}
