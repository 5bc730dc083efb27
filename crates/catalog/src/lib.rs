//! Layer catalogue: loads the layers configuration per language and
//! publishes immutable snapshots keyed by layer id.

pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod snapshot;

pub use catalog::{CatalogEvent, LayerCatalog};
pub use config::{CatalogConfig, Link3d, NoPermalink, PermalinkParams, TerrainConfig, TilesetConfig};
pub use error::{CatalogError, CatalogResult};
pub use fetch::{HttpFetcher, ReqwestFetcher};
pub use snapshot::CatalogSnapshot;
