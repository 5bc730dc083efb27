//! Catalogue payloads and documents used across the workspace tests.
//!
//! The catalogue mirrors the shapes served by the layers configuration
//! endpoint: one object per layer id, camelCase keys, a `type` tag.

use serde_json::{json, Value};

/// Layer ids present in [`catalogue_json`].
pub mod ids {
    pub const PIXELKARTE: &str = "ch.swisstopo.pixelkarte-farbe";
    pub const PIXELKARTE_3D: &str = "ch.swisstopo.pixelkarte-farbe_3d";
    pub const ZEITREIHEN: &str = "ch.swisstopo.zeitreihen";
    pub const GEWAESSER: &str = "ch.bafu.gewaesserschutz";
    pub const FIXPUNKTE: &str = "ch.swisstopo.fixpunkte";
    pub const CADASTRAL: &str = "ch.kantone.cadastralwebmap-farbe";
    pub const CADASTRAL_WMTS: &str = "ch.kantone.cadastralwebmap-farbe_wmts";
    pub const CADASTRAL_WMS: &str = "ch.kantone.cadastralwebmap-farbe_wms";
    pub const LADESTELLEN: &str = "ch.bfe.ladestellen-elektromobilitaet";
    pub const SWISSNAMES: &str = "ch.swisstopo.swissnames3d";
    pub const SWISSNAMES_3D: &str = "ch.swisstopo.swissnames3d_3d";
    pub const BUILDINGS: &str = "ch.swisstopo.swisstlm3d_3d";
    pub const BUILDINGS_GROUP: &str = "ch.swisstopo.gebaeude";
    pub const TERRAIN: &str = "ch.swisstopo.terrain.3d";
    pub const FLUGHINDERNISSE: &str = "ch.bazl.luftfahrthindernis";
    pub const BROKEN: &str = "ch.test.broken";
}

pub const GEOJSON_URL: &str = "https://data.geo.admin.ch/ch.bfe.ladestellen-elektromobilitaet/data.json";
pub const STYLE_URL: &str = "//api3.geo.admin.ch/static/vectorStyles/ch.bfe.ladestellen-elektromobilitaet.json";
pub const KML_URL: &str = "https://data.geo.admin.ch/ch.bazl.luftfahrthindernis/data.kml";

/// Catalogue payload for `lang`; labels carry the language so reloads can
/// be told apart.
pub fn catalogue_json(lang: &str) -> Value {
    json!({
        (ids::PIXELKARTE): {
            "type": "wmts",
            "label": format!("Landeskarten ({lang})"),
            "serverLayerName": ids::PIXELKARTE,
            "format": "jpeg",
            "timestamps": ["20151231"],
            "background": true,
            "config3d": ids::PIXELKARTE_3D
        },
        (ids::PIXELKARTE_3D): {
            "type": "wmts",
            "serverLayerName": "ch.swisstopo.swisstlm3d-karte-farbe",
            "format": "png",
            "timestamps": ["20150401"],
            "maxResolution": 2500.0
        },
        (ids::ZEITREIHEN): {
            "type": "wmts",
            "label": format!("Zeitreihen ({lang})"),
            "serverLayerName": ids::ZEITREIHEN,
            "format": "pngjpeg",
            "timeEnabled": true,
            "timeBehaviour": "last",
            "timestamps": ["19991231", "19981231", "18641231"],
            "resolutions": [4000.0, 3750.0, 3500.0, 3250.0, 3000.0, 2750.0, 2500.0],
            "minResolution": 2.5
        },
        (ids::GEWAESSER): {
            "type": "wms",
            "label": format!("Gewässerschutz ({lang})"),
            "wmsLayers": "ch.bafu.gewaesserschutz-a,ch.bafu.gewaesserschutz-b",
            "format": "png",
            "gutter": 30,
            "tooltip": true,
            "searchable": true,
            "queryableAttributes": ["name", "typ"],
            "extent": [2485000.0, 1075000.0, 2834000.0, 1296000.0]
        },
        (ids::FIXPUNKTE): {
            "type": "wms",
            "label": format!("Fixpunkte ({lang})"),
            "serverLayerName": ids::FIXPUNKTE,
            "format": "png",
            "singleTile": true,
            "timeEnabled": true,
            "timestamps": ["2018", "2016"],
            "tooltip": true
        },
        (ids::CADASTRAL): {
            "type": "aggregate",
            "label": format!("Amtliche Vermessung ({lang})"),
            "subLayersIds": [ids::CADASTRAL_WMTS, ids::CADASTRAL_WMS],
            "tooltip": true
        },
        (ids::CADASTRAL_WMTS): {
            "type": "wmts",
            "serverLayerName": ids::CADASTRAL,
            "format": "png",
            "timestamps": ["current"],
            "minResolution": 2.0,
            "parentLayerId": ids::CADASTRAL
        },
        (ids::CADASTRAL_WMS): {
            "type": "wms",
            "wmsLayers": ids::CADASTRAL,
            "format": "png",
            "maxResolution": 2.0,
            "parentLayerId": ids::CADASTRAL
        },
        (ids::LADESTELLEN): {
            "type": "geojson",
            "label": format!("Ladestellen ({lang})"),
            "geojsonUrl": GEOJSON_URL,
            "styleUrl": STYLE_URL,
            "updateDelay": 60000,
            "tooltip": true
        },
        (ids::SWISSNAMES): {
            "type": "wms",
            "label": format!("Namen ({lang})"),
            "format": "png",
            "tooltip": true
        },
        (ids::BUILDINGS_GROUP): {
            "type": "aggregate",
            "label": format!("Gebäude ({lang})"),
            "subLayersIds": [ids::CADASTRAL_WMTS],
            "config3d": ids::BUILDINGS
        },
        (ids::FLUGHINDERNISSE): {
            "type": "kml",
            "label": format!("Luftfahrthindernisse ({lang})"),
            "url": KML_URL
        },
        (ids::BROKEN): {
            "label": "no type"
        }
    })
}

/// [`catalogue_json`] serialized as a response body.
pub fn catalogue_body(lang: &str) -> Vec<u8> {
    catalogue_json(lang).to_string().into_bytes()
}

/// Geojson document with a declared data time.
pub fn geojson_body() -> Vec<u8> {
    json!({
        "type": "FeatureCollection",
        "timestamp": "20240101",
        "features": [
            {
                "type": "Feature",
                "id": 1,
                "geometry": {"type": "Point", "coordinates": [2600000.0, 1200000.0]},
                "properties": {"name": "Bern"}
            },
            {
                "type": "Feature",
                "id": 2,
                "geometry": {"type": "Point", "coordinates": [2683000.0, 1248000.0]},
                "properties": {"name": "Zürich"}
            }
        ]
    })
    .to_string()
    .into_bytes()
}

/// Style literal document understood by the mock style compiler.
pub fn style_body() -> Vec<u8> {
    json!({
        "type": "single",
        "geomType": "point",
        "vectorOptions": {"type": "circle", "radius": 6}
    })
    .to_string()
    .into_bytes()
}
