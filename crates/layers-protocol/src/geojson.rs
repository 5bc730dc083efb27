//! GeoJSON payloads for vector layers.
//!
//! Geojson layers fetch a document that may be a FeatureCollection, a
//! single Feature or a bare geometry. Everything is normalized into a
//! [`FeatureCollection`]; the optional top-level `timestamp` field carries
//! the declared data time of realtime layers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use layers_common::LoadError;

const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Failure while reading vector data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VectorParseError {
    /// No known format recognised the payload.
    #[error("format not supported")]
    FormatNotSupported,

    /// The format matched but the content is invalid.
    #[error("{0}")]
    Invalid(String),
}

impl From<VectorParseError> for LoadError {
    fn from(err: VectorParseError) -> Self {
        match err {
            VectorParseError::FormatNotSupported => LoadError::FormatNotSupported,
            VectorParseError::Invalid(reason) => LoadError::ParseFailed(reason),
        }
    }
}

/// Vector formats recognised by content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    GeoJson,
}

impl VectorFormat {
    /// Guess the format from the first non-blank bytes of a payload.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        let first = data.iter().find(|b| !b.is_ascii_whitespace())?;
        match first {
            b'{' => Some(VectorFormat::GeoJson),
            _ => None,
        }
    }
}

/// A GeoJSON FeatureCollection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCollection {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type")]
    pub type_: String,

    pub features: Vec<Feature>,

    /// Declared data timestamp of the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            features: Vec::new(),
            timestamp: None,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new()
    }
}

/// A GeoJSON Feature. Geometry is kept as raw JSON; the engines parse it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(default)]
    pub geometry: Option<Value>,

    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl Feature {
    /// Feature wrapping a bare geometry.
    pub fn from_geometry(geometry: Value) -> Self {
        Self {
            type_: "Feature".to_string(),
            id: None,
            geometry: Some(geometry),
            properties: None,
        }
    }
}

/// Parse a vector document into a feature collection.
pub fn parse_vector_data(data: &[u8]) -> Result<FeatureCollection, VectorParseError> {
    match VectorFormat::sniff(data) {
        Some(VectorFormat::GeoJson) => parse_geojson(data),
        None => Err(VectorParseError::FormatNotSupported),
    }
}

fn parse_geojson(data: &[u8]) -> Result<FeatureCollection, VectorParseError> {
    let value: Value =
        serde_json::from_slice(data).map_err(|e| VectorParseError::Invalid(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| VectorParseError::Invalid("missing GeoJSON type".to_string()))?;

    let invalid = |e: serde_json::Error| VectorParseError::Invalid(e.to_string());
    match kind {
        "FeatureCollection" => serde_json::from_value(value).map_err(invalid),
        "Feature" => {
            let timestamp = declared_timestamp(&value);
            let feature: Feature = serde_json::from_value(value).map_err(invalid)?;
            Ok(FeatureCollection {
                features: vec![feature],
                timestamp,
                ..FeatureCollection::new()
            })
        }
        geometry if GEOMETRY_TYPES.contains(&geometry) => Ok(FeatureCollection {
            features: vec![Feature::from_geometry(value)],
            ..FeatureCollection::new()
        }),
        other => Err(VectorParseError::Invalid(format!(
            "unknown GeoJSON type: {}",
            other
        ))),
    }
}

fn declared_timestamp(value: &Value) -> Option<String> {
    value
        .get("timestamp")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_collection_with_timestamp() {
        let data = br#"{
            "type": "FeatureCollection",
            "timestamp": "2024-05-01T10:00:00Z",
            "features": [
                {"type": "Feature", "id": 1, "geometry": {"type": "Point", "coordinates": [7.4, 46.9]}, "properties": {"name": "Bern"}}
            ]
        }"#;
        let fc = parse_vector_data(data).unwrap();
        assert_eq!(fc.len(), 1);
        assert_eq!(fc.timestamp.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert_eq!(fc.features[0].id, Some(Value::from(1)));
    }

    #[test]
    fn test_single_feature_is_wrapped() {
        let data = br#"{"type": "Feature", "geometry": null, "properties": {}}"#;
        let fc = parse_vector_data(data).unwrap();
        assert_eq!(fc.type_, "FeatureCollection");
        assert_eq!(fc.len(), 1);
    }

    #[test]
    fn test_bare_geometry_is_wrapped() {
        let data = br#"  {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}"#;
        let fc = parse_vector_data(data).unwrap();
        assert_eq!(fc.features[0].type_, "Feature");
        assert!(fc.features[0].geometry.is_some());
    }

    #[test]
    fn test_unrecognised_format() {
        let err = parse_vector_data(b"<kml></kml>").unwrap_err();
        assert_eq!(err, VectorParseError::FormatNotSupported);
        assert_eq!(LoadError::from(err).reason(), "format_not_supported");
        assert_eq!(parse_vector_data(b"   ").unwrap_err(), VectorParseError::FormatNotSupported);
    }

    #[test]
    fn test_invalid_content_carries_reason() {
        let err = parse_vector_data(br#"{"type": "Feature""#).unwrap_err();
        assert!(matches!(err, VectorParseError::Invalid(_)));

        let err = parse_vector_data(br#"{"type": "Topology"}"#).unwrap_err();
        assert_eq!(err, VectorParseError::Invalid("unknown GeoJSON type: Topology".to_string()));
        assert_eq!(LoadError::from(err).reason(), "unknown GeoJSON type: Topology");
    }
}
