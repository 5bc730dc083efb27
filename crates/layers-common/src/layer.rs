//! Layer descriptors as delivered by the layers configuration service.

use serde::{Deserialize, Deserializer, Serialize};

use crate::Extent;

/// Stable catalogue key identifying one layer (a "bodId").
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::borrow::Borrow<str> for LayerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Declared layer type.
///
/// Both source factories match on this exhaustively, so a new kind has to be
/// handled in the 2D and the 3D factory before the workspace compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Wms,
    Wmts,
    Aggregate,
    Geojson,
    Terrain,
    Tileset3d,
    Kml,
    /// Any type string this workspace does not know about.
    #[serde(other)]
    Other,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Wms => "wms",
            LayerKind::Wmts => "wmts",
            LayerKind::Aggregate => "aggregate",
            LayerKind::Geojson => "geojson",
            LayerKind::Terrain => "terrain",
            LayerKind::Tileset3d => "tileset3d",
            LayerKind::Kml => "kml",
            LayerKind::Other => "other",
        }
    }

    /// Kinds that always carry at least one timestamp, even when not time enabled.
    pub fn has_fixed_timestamp(&self) -> bool {
        matches!(self, LayerKind::Wmts | LayerKind::Terrain | LayerKind::Tileset3d)
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalogue entry for one layer identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDescriptor {
    /// Catalogue key; filled in from the payload key when loading.
    #[serde(default, rename = "bodId")]
    pub id: LayerId,

    #[serde(rename = "type")]
    pub kind: LayerKind,

    /// Human-readable label (translated)
    #[serde(default)]
    pub label: Option<String>,

    /// Backend-side layer name
    #[serde(default)]
    pub server_layer_name: Option<String>,

    /// Backend-side WMS layer list
    #[serde(default)]
    pub wms_layers: Option<String>,

    /// Image format token (`png`, `jpeg`, `pngjpeg`)
    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub time_enabled: bool,

    /// Timestamps in catalogue order (`YYYYMMDD` or `YYYY`)
    #[serde(default)]
    pub timestamps: Vec<String>,

    /// `all`, a literal year/timestamp, or unset
    #[serde(default, deserialize_with = "string_or_number")]
    pub time_behaviour: Option<String>,

    #[serde(default)]
    pub min_resolution: Option<f64>,

    #[serde(default)]
    pub max_resolution: Option<f64>,

    #[serde(default)]
    pub resolutions: Option<Vec<f64>>,

    /// Id of the 3D counterpart
    #[serde(default)]
    pub config3d: Option<LayerId>,

    /// Id of the 2D counterpart, derived when loading the catalogue
    #[serde(default)]
    pub config2d: Option<LayerId>,

    /// Child layers, only for aggregates
    #[serde(default)]
    pub sub_layers_ids: Vec<LayerId>,

    #[serde(default)]
    pub parent_layer_id: Option<LayerId>,

    #[serde(default)]
    pub tooltip: Option<bool>,

    #[serde(default)]
    pub searchable: bool,

    #[serde(default)]
    pub queryable_attributes: Vec<String>,

    #[serde(default)]
    pub opaque: bool,

    #[serde(default)]
    pub shop_multi: bool,

    #[serde(default)]
    pub background: bool,

    #[serde(default)]
    pub opacity: Option<f64>,

    #[serde(default)]
    pub extent: Option<Extent>,

    #[serde(default)]
    pub single_tile: bool,

    #[serde(default)]
    pub gutter: Option<u32>,

    #[serde(default)]
    pub geojson_url: Option<String>,

    #[serde(default)]
    pub style_url: Option<String>,

    /// Refresh interval for realtime layers (milliseconds)
    #[serde(default)]
    pub update_delay: Option<u64>,

    /// Named 3D tileset style
    #[serde(default)]
    pub style: Option<String>,

    /// Document URL (KML layers)
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub attribution: Option<String>,

    #[serde(default)]
    pub attribution_url: Option<String>,

    #[serde(default)]
    pub default3d: bool,
}

impl LayerDescriptor {
    /// Minimal descriptor of the given kind; everything else unset.
    pub fn new(id: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: LayerId::new(id),
            kind,
            label: None,
            server_layer_name: None,
            wms_layers: None,
            format: None,
            time_enabled: false,
            timestamps: Vec::new(),
            time_behaviour: None,
            min_resolution: None,
            max_resolution: None,
            resolutions: None,
            config3d: None,
            config2d: None,
            sub_layers_ids: Vec::new(),
            parent_layer_id: None,
            tooltip: None,
            searchable: false,
            queryable_attributes: Vec::new(),
            opaque: false,
            shop_multi: false,
            background: false,
            opacity: None,
            extent: None,
            single_tile: false,
            gutter: None,
            geojson_url: None,
            style_url: None,
            update_delay: None,
            style: None,
            url: None,
            attribution: None,
            attribution_url: None,
            default3d: false,
        }
    }

    /// Backend layer name, falling back to the catalogue id.
    pub fn server_layer(&self) -> &str {
        self.server_layer_name.as_deref().unwrap_or(self.id.as_str())
    }

    /// Backend WMS layer list, falling back to the server layer name.
    pub fn wms_layer_list(&self) -> &str {
        self.wms_layers
            .as_deref()
            .unwrap_or_else(|| self.server_layer())
    }

    /// Format token as declared, `png` when absent.
    pub fn format_or_default(&self) -> &str {
        self.format.as_deref().unwrap_or("png")
    }

    /// Layer opacity; zero and absent both mean fully opaque.
    pub fn opacity_or_default(&self) -> f64 {
        match self.opacity {
            Some(o) if o != 0.0 => o,
            _ => 1.0,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_payload_entry() {
        let json = r#"{
            "type": "wmts",
            "serverLayerName": "ch.swisstopo.zeitreihen",
            "format": "pngjpeg",
            "timeEnabled": true,
            "timestamps": ["20101231", "19991231"],
            "timeBehaviour": 2010,
            "resolutions": [4000, 250, 2.5],
            "queryableAttributes": ["name"]
        }"#;
        let layer: LayerDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(layer.kind, LayerKind::Wmts);
        assert_eq!(layer.time_behaviour.as_deref(), Some("2010"));
        assert_eq!(layer.timestamps.len(), 2);
        assert_eq!(layer.resolutions.as_ref().map(Vec::len), Some(3));
        assert!(layer.id.as_str().is_empty());
    }

    #[test]
    fn test_unknown_type_is_other() {
        let layer: LayerDescriptor = serde_json::from_str(r#"{"type": "vectortile"}"#).unwrap();
        assert_eq!(layer.kind, LayerKind::Other);
    }

    #[test]
    fn test_server_layer_fallbacks() {
        let mut layer = LayerDescriptor::new("ch.bafu.foo", LayerKind::Wms);
        assert_eq!(layer.server_layer(), "ch.bafu.foo");
        assert_eq!(layer.wms_layer_list(), "ch.bafu.foo");

        layer.server_layer_name = Some("foo_srv".to_string());
        assert_eq!(layer.wms_layer_list(), "foo_srv");

        layer.wms_layers = Some("a,b".to_string());
        assert_eq!(layer.wms_layer_list(), "a,b");
    }

    #[test]
    fn test_opacity_default() {
        let mut layer = LayerDescriptor::new("x", LayerKind::Wms);
        assert_eq!(layer.opacity_or_default(), 1.0);
        layer.opacity = Some(0.0);
        assert_eq!(layer.opacity_or_default(), 1.0);
        layer.opacity = Some(0.75);
        assert_eq!(layer.opacity_or_default(), 0.75);
    }
}
