//! Source descriptor factories for the 2D map and the 3D globe.
//!
//! Layers are looked up in the current catalogue snapshot and turned into
//! engine-ready descriptors. The 3D side always goes through the
//! `config3d` link of a layer first.

pub mod collaborators;
pub mod config;
pub mod instance;
pub mod linkage;
pub mod predicates;
pub mod source2d;
pub mod source3d;

pub use collaborators::{
    Collaborators, DirectAccess, FixedView, LiteralStyle, LiteralStyles, NoTileStore, SceneRef, StyleCompiler,
    TileBlobStore, UrlProxy, VectorStyle, ViewState,
};
pub use config::{ClientCapabilities, GlobalOptions};
pub use instance::{DisplayState, Layer2d, LayerBounds, LayerOrigin, RenderedLayerInstance, TimeHandle};
pub use linkage::{has_tooltip, resolve_config3d};
pub use source2d::{
    BuildOptions, GeojsonLoad, ImageWmsSource, Layer2dFactory, Source2d, StyleLoad, TileContent, TileLoader,
    TileWmsSource, VectorSource, WmtsSource,
};
pub use source3d::{ImageryProvider, KmlDataSource, KmlDocument, KmlLoad, Layer3dFactory, TerrainProvider, Tileset3d};
