//! URL templating for the geodata tile, image and vector services.
//!
//! Supports:
//! - WMS GetMap URLs (canonical endpoint detection, query manipulation)
//! - WMTS RESTful tile templates (LV95, LV03 and geographic matrix sets)
//! - Terrain, 3D vector tile, layers configuration and legend URLs
//! - Domain sharding and round-robin subdomain selection
//! - GeoJSON payloads for vector layers

pub mod config;
pub mod geojson;
pub mod query;
pub mod shard;
pub mod urls;

pub use config::UrlTemplateConfig;
pub use geojson::{parse_vector_data, Feature, FeatureCollection, VectorFormat, VectorParseError};
pub use query::{append_query, encode_query_component, remove_query_keys, to_key_value};
pub use shard::{domain_shard, RoundRobin};
pub use urls::{imagery_urls, tile_cache_key, UrlTemplates};
