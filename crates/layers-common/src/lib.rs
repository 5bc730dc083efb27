//! Common types and utilities shared across the layer resolution crates.

pub mod bbox;
pub mod error;
pub mod layer;
pub mod tile;
pub mod time;

pub use bbox::Extent;
pub use error::{LayerError, LayerResult, LoadError};
pub use layer::{LayerDescriptor, LayerId, LayerKind};
pub use tile::{lod_from_resolution, TileGrid, LV95_RESOLUTIONS};
pub use time::resolve_timestamp;
