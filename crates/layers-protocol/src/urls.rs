//! URL templates for tile, image, vector and configuration services.
//!
//! Substitution is textual and replaces the first occurrence of each
//! placeholder only. Tile coordinates are left in place for the engines.

use std::sync::Arc;

use crate::query::{append_query, remove_query_keys, to_key_value};
use crate::shard::RoundRobin;
use crate::UrlTemplateConfig;

/// Layer served from the production host in the geographic matrix set.
const PROD_HOST_LAYER: &str = "ch.swisstopo.swissimage-product";

/// Production host override for [`PROD_HOST_LAYER`].
const PROD_HOST_URL: &str = "//tod{s}.prod.bgdi.ch";

/// Query keys stripped from foreign WMS endpoints before params are appended.
const WMS_DEFAULT_KEYS: [&str; 3] = ["request", "service", "version"];

fn substitute(template: &str, placeholder: &str, value: &str) -> String {
    template.replacen(placeholder, value, 1)
}

/// URL template resolver.
///
/// Everything is a pure function of the configuration except
/// [`UrlTemplates::vector_tiles_url`], which advances the injected
/// [`RoundRobin`] cursor on every call.
#[derive(Debug, Clone)]
pub struct UrlTemplates {
    config: UrlTemplateConfig,
    cursor: Arc<RoundRobin>,
}

impl UrlTemplates {
    pub fn new(config: UrlTemplateConfig) -> Self {
        Self::with_cursor(config, Arc::new(RoundRobin::new()))
    }

    /// Use a caller-owned cursor, e.g. to share it between resolvers or to
    /// reset it from tests.
    pub fn with_cursor(config: UrlTemplateConfig, cursor: Arc<RoundRobin>) -> Self {
        Self { config, cursor }
    }

    pub fn config(&self) -> &UrlTemplateConfig {
        &self.config
    }

    pub fn cursor(&self) -> &Arc<RoundRobin> {
        &self.cursor
    }

    /// WMS endpoint template with GetMap params appended.
    ///
    /// Any URL naming the canonical service (`wms.geo`) is replaced by the
    /// sharded WMS template. Other endpoints lose their `request`, `service`
    /// and `version` query keys so that callers can supply their own.
    pub fn wms_url<K, V>(&self, url: Option<&str>, params: &[(K, V)]) -> String
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let foreign = url.filter(|u| !u.contains("wms.geo") && !u.is_empty());
        let base = match foreign {
            Some(u) => remove_query_keys(u, &WMS_DEFAULT_KEYS, true),
            None => self.config.wms_url_template.clone(),
        };

        append_query(&base, &to_key_value(params))
    }

    /// WMS template without extra params.
    pub fn wms_base_url(&self, url: Option<&str>) -> String {
        self.wms_url::<&str, &str>(url, &[])
    }

    /// Subdomains for WMS requests when a layer does not declare its own.
    pub fn wms_subdomains(&self) -> &[String] {
        &self.config.wms_subdomains
    }

    pub fn wmts_subdomains(&self) -> &[String] {
        &self.config.wmts_subdomains
    }

    pub fn vector_tiles_subdomains(&self) -> &[String] {
        &self.config.vector_tiles_subdomains
    }

    /// RESTful WMTS GetTile template.
    ///
    /// `21781` always selects the LV03 path. The production host is used
    /// only for the swissimage product layer in `4326`.
    pub fn wmts_tile_template(&self, layer: &str, tile_matrix_set: Option<&str>, format: &str) -> String {
        let template = match tile_matrix_set {
            Some("21781") => format!("{}{}", self.config.wmts_url, self.config.wmts_lv03_path_template),
            Some("4326") if layer == PROD_HOST_LAYER => {
                format!("{}{}", PROD_HOST_URL, self.config.wmts_path_template)
            }
            _ => format!("{}{}", self.config.wmts_url, self.config.wmts_path_template),
        };

        let url = substitute(&template, "{Layer}", layer);
        let url = substitute(&url, "{Format}", format);
        match tile_matrix_set {
            Some(tms) => substitute(&url, "{TileMatrixSet}", tms),
            None => url,
        }
    }

    /// Terrain tile root for a layer and resolved timestamp.
    pub fn terrain_tile_url(&self, layer: &str, time: Option<&str>) -> String {
        let url = substitute(&self.config.terrain_tile_url_template, "{Layer}", layer);
        substitute(&url, "{Time}", time.unwrap_or_default())
    }

    /// 3D vector tile root, picking the next subdomain of `subdomains`.
    pub fn vector_tiles_url(&self, layer: &str, time: Option<&str>, subdomains: &[String]) -> String {
        let subdomain = self
            .cursor
            .next(subdomains.len())
            .map(|i| subdomains[i].as_str())
            .unwrap_or_default();

        let url = substitute(&self.config.vector_tiles_url_template, "{s}", subdomain);
        let url = substitute(&url, "{Layer}", layer);
        substitute(&url, "{Time}", time.unwrap_or_default())
    }

    /// Layers configuration service URL for a language.
    pub fn layers_config_url(&self, lang: &str) -> String {
        substitute(&self.config.layers_config_url_template, "{Lang}", lang)
    }

    /// Legend/metadata document URL.
    pub fn metadata_url(&self, layer: &str, lang: &str) -> String {
        let url = substitute(&self.config.legend_url_template, "{Layer}", layer);
        substitute(&url, "{Lang}", lang)
    }
}

impl Default for UrlTemplates {
    fn default() -> Self {
        Self::new(UrlTemplateConfig::default())
    }
}

/// Expand `{s}` once per subdomain. No subdomains means a single empty one.
pub fn imagery_urls(template: &str, subdomains: Option<&[String]>) -> Vec<String> {
    match subdomains {
        Some(subs) => subs.iter().map(|s| substitute(template, "{s}", s)).collect(),
        None => vec![substitute(template, "{s}", "")],
    }
}

/// Key of a tile in the local blob store.
///
/// Drops the scheme and the shard number of the first host label so that
/// every subdomain of a service maps to the same key:
/// `https://wmts5.geo.admin.ch/a/b.png` becomes `wmts.geo.admin.ch/a/b.png`.
pub fn tile_cache_key(url: &str) -> String {
    let rest = url
        .strip_prefix("https:")
        .or_else(|| url.strip_prefix("http:"))
        .unwrap_or(url);
    let rest = rest.trim_start_matches('/');

    let (label, tail) = match rest.find(|c: char| c == '.' || c == '/') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    format!("{}{}", label.trim_end_matches(|c: char| c.is_ascii_digit()), tail)
}
