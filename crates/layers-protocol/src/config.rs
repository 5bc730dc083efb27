//! URL template configuration.

use serde::{Deserialize, Serialize};

/// Templates and subdomain lists for every backend the resolver talks to.
///
/// Placeholders: `{s}` subdomain, `{Layer}`, `{Format}`, `{TileMatrixSet}`,
/// `{Time}`, `{Lang}`. Tile coordinates (`{z}`, `{x}`, `{y}`) are left for
/// the rendering engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlTemplateConfig {
    /// Sharded WMS endpoint (e.g. `//wms{s}.geo.admin.ch/`)
    pub wms_url_template: String,

    /// Subdomains substituted into `wms_url_template`
    pub wms_subdomains: Vec<String>,

    /// Subdomains for the 3D vector tile service
    pub vector_tiles_subdomains: Vec<String>,

    /// WMTS host (e.g. `//wmts{s}.geo.admin.ch`)
    pub wmts_url: String,

    /// Path template for the LV03 (EPSG:21781) tile matrix set
    pub wmts_lv03_path_template: String,

    /// Path template for every other tile matrix set
    pub wmts_path_template: String,

    /// Subdomains substituted into `wmts_url`
    pub wmts_subdomains: Vec<String>,

    pub terrain_tile_url_template: String,

    pub vector_tiles_url_template: String,

    pub layers_config_url_template: String,

    pub legend_url_template: String,
}

impl Default for UrlTemplateConfig {
    fn default() -> Self {
        let subs = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            wms_url_template: "//wms{s}.geo.admin.ch/".to_string(),
            wms_subdomains: subs(&["", "0", "1", "2", "3", "4"]),
            vector_tiles_subdomains: subs(&["100", "101", "102", "103", "104"]),
            wmts_url: "//wmts{s}.geo.admin.ch".to_string(),
            wmts_lv03_path_template: "/1.0.0/{Layer}/default/{Time}/21781/{z}/{y}/{x}.{Format}"
                .to_string(),
            wmts_path_template:
                "/1.0.0/{Layer}/default/{Time}/{TileMatrixSet}/{z}/{x}/{y}.{Format}".to_string(),
            wmts_subdomains: subs(&["5", "6", "7", "8", "9", "100"]),
            terrain_tile_url_template: "//3d.geo.admin.ch/1.0.0/{Layer}/default/{Time}/4326"
                .to_string(),
            vector_tiles_url_template: "//vectortiles{s}.geo.admin.ch/{Layer}/{Time}/".to_string(),
            layers_config_url_template:
                "https://api3.geo.admin.ch/rest/services/all/MapServer/layersConfig?lang={Lang}"
                    .to_string(),
            legend_url_template:
                "https://api3.geo.admin.ch/rest/services/all/MapServer/{Layer}/legend?lang={Lang}"
                    .to_string(),
        }
    }
}

impl UrlTemplateConfig {
    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        let string_vars: [(&str, &mut String); 8] = [
            ("WMS_URL_TEMPLATE", &mut config.wms_url_template),
            ("WMTS_URL", &mut config.wmts_url),
            ("WMTS_LV03_PATH_TEMPLATE", &mut config.wmts_lv03_path_template),
            ("WMTS_PATH_TEMPLATE", &mut config.wmts_path_template),
            ("TERRAIN_TILE_URL_TEMPLATE", &mut config.terrain_tile_url_template),
            ("VECTOR_TILES_URL_TEMPLATE", &mut config.vector_tiles_url_template),
            ("LAYERS_CONFIG_URL_TEMPLATE", &mut config.layers_config_url_template),
            ("LEGEND_URL_TEMPLATE", &mut config.legend_url_template),
        ];
        for (name, slot) in string_vars {
            if let Ok(val) = std::env::var(name) {
                *slot = val;
            }
        }

        let list_vars: [(&str, &mut Vec<String>); 3] = [
            ("WMS_SUBDOMAINS", &mut config.wms_subdomains),
            ("WMTS_SUBDOMAINS", &mut config.wmts_subdomains),
            ("VECTOR_TILES_SUBDOMAINS", &mut config.vector_tiles_subdomains),
        ];
        for (name, slot) in list_vars {
            if let Ok(val) = std::env::var(name) {
                *slot = val.split(',').map(|s| s.trim().to_string()).collect();
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.layers_config_url_template.contains("{Lang}") {
            return Err("layers_config_url_template must contain {Lang}".to_string());
        }

        if !self.wmts_path_template.contains("{Layer}") {
            return Err("wmts_path_template must contain {Layer}".to_string());
        }

        if self.vector_tiles_url_template.contains("{s}") && self.vector_tiles_subdomains.is_empty() {
            return Err("vector_tiles_subdomains must not be empty".to_string());
        }

        Ok(())
    }
}
