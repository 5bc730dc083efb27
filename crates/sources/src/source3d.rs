//! 3D source factory.
//!
//! Every lookup goes through the `config3d` link first, so a 2D layer is
//! rendered on the globe by whatever its 3D variant declares.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use catalog::CatalogSnapshot;
use layers_common::{lod_from_resolution, resolve_timestamp, Extent, LayerDescriptor, LayerId, LayerKind, LoadError};
use layers_protocol::{domain_shard, UrlTemplates};

use crate::collaborators::{Collaborators, SceneRef};
use crate::config::{ClientCapabilities, GlobalOptions};
use crate::instance::TimeHandle;

/// Level used as the client zoom limit when the layer declares no finer one.
const CLIENT_ZOOM_MAX_LEVEL: u32 = 18;

const WMS_TILE_SIZE: u32 = 512;
const WMTS_TILE_SIZE: u32 = 256;

/// A KML document fetched for the 3D scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmlDocument {
    pub url: String,
    pub body: Bytes,
}

pub type KmlLoad = Shared<BoxFuture<'static, Result<Arc<KmlDocument>, LoadError>>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerrainProvider {
    pub bod_id: LayerId,
    pub url: String,
    pub available_levels: Vec<u32>,
    pub extent: Extent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tileset3d {
    pub bod_id: LayerId,
    pub url: String,
    pub maximum_number_of_loaded_tiles: u32,
    pub style: Option<Value>,
}

/// Template-based imagery provider on a geographic tiling scheme.
#[derive(Debug, Clone, Serialize)]
pub struct ImageryProvider {
    pub bod_id: LayerId,
    /// URL template, `{Time}` is filled per request
    pub url: String,
    pub subdomains: Vec<String>,
    pub minimum_level: u32,
    pub maximum_retrieving_level: Option<u32>,
    /// `None` disables client side zoom past the last level
    pub maximum_level: Option<u32>,
    pub extent: Extent,
    pub tile_width: u32,
    pub tile_height: u32,
    pub has_alpha_channel: bool,
    pub available_levels: Vec<u32>,
    pub metadata_url: Option<String>,
    #[serde(skip)]
    pub time: TimeHandle,
}

impl ImageryProvider {
    /// The URL template with the current time of the owning layer.
    pub fn request_url(&self) -> String {
        self.url.replace("{Time}", &self.time.get().unwrap_or_default())
    }
}

/// KML data source bound to a scene.
#[derive(Clone, Serialize)]
pub struct KmlDataSource {
    pub bod_id: LayerId,
    pub url: String,
    pub camera: String,
    pub canvas: String,
    pub proxy: Option<String>,
    #[serde(skip)]
    pub load: KmlLoad,
}

impl fmt::Debug for KmlDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmlDataSource")
            .field("bod_id", &self.bod_id)
            .field("url", &self.url)
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

/// The 3D variant of `layer`, `None` when its link cannot be followed.
fn linked_3d<'a>(snapshot: &'a CatalogSnapshot, layer: &'a LayerDescriptor) -> Option<&'a LayerDescriptor> {
    match snapshot.try_config3d(layer) {
        Ok(config3d) => Some(config3d),
        Err(e) => {
            warn!(bod_id = %layer.id, error = %e, "No 3D variant");
            None
        }
    }
}

pub struct Layer3dFactory {
    snapshots: watch::Receiver<Option<Arc<CatalogSnapshot>>>,
    urls: Arc<UrlTemplates>,
    options: Arc<GlobalOptions>,
    caps: ClientCapabilities,
    collaborators: Collaborators,
}

impl Layer3dFactory {
    pub fn new(
        snapshots: watch::Receiver<Option<Arc<CatalogSnapshot>>>,
        urls: Arc<UrlTemplates>,
        options: Arc<GlobalOptions>,
        caps: ClientCapabilities,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            snapshots,
            urls,
            options,
            caps,
            collaborators,
        }
    }

    fn current_snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        let snapshot = self.snapshots.borrow().clone();
        if snapshot.is_none() {
            warn!("No catalogue loaded yet");
        }
        snapshot
    }

    fn timestamp(&self, config: &LayerDescriptor) -> Option<String> {
        let requested = self.collaborators.view.time();
        resolve_timestamp(config, requested.as_deref()).map(str::to_string)
    }

    /// # Panics
    /// Panics if `bod_id` is not in the current catalogue.
    #[instrument(skip(self))]
    pub fn terrain_provider(&self, bod_id: &str) -> Option<TerrainProvider> {
        let snapshot = self.current_snapshot()?;
        let config3d = linked_3d(&snapshot, snapshot.layer(bod_id))?;
        if config3d.kind != LayerKind::Terrain {
            return None;
        }

        let timestamp = self.timestamp(config3d);
        let requested = config3d.server_layer_name.as_deref().unwrap_or(bod_id);
        Some(TerrainProvider {
            bod_id: LayerId::from(bod_id),
            url: self.urls.terrain_tile_url(requested, timestamp.as_deref()),
            available_levels: self.options.terrain_available_levels.clone(),
            extent: self.options.default_extent,
        })
    }

    /// # Panics
    /// Panics if `bod_id` is not in the current catalogue.
    #[instrument(skip(self))]
    pub fn tileset(&self, bod_id: &str) -> Option<Tileset3d> {
        let snapshot = self.current_snapshot()?;
        let config3d = linked_3d(&snapshot, snapshot.layer(bod_id))?;
        if config3d.kind != LayerKind::Tileset3d {
            return None;
        }

        let timestamp = self.timestamp(config3d);
        let requested = config3d.server_layer_name.as_deref().unwrap_or(bod_id);
        let subdomains = domain_shard(self.urls.vector_tiles_subdomains(), self.caps.http2);
        let style = config3d.style.as_deref().and_then(|name| {
            let style = self.collaborators.styles.tileset_style(name);
            if style.is_none() {
                warn!(style = name, "Unknown tileset style");
            }
            style
        });

        Some(Tileset3d {
            bod_id: LayerId::from(bod_id),
            url: self.urls.vector_tiles_url(requested, timestamp.as_deref(), &subdomains),
            maximum_number_of_loaded_tiles: self.options.tileset_max_loaded_tiles,
            style,
        })
    }

    /// Imagery providers of a raster layer, flattened for aggregates.
    ///
    /// A 2D aggregate whose 3D variant is not imagery yields an empty list
    /// so that its children are not drawn one by one.
    ///
    /// # Panics
    /// Panics if `bod_id` is not in the current catalogue.
    pub fn imagery_provider(&self, bod_id: &str, time: &TimeHandle) -> Option<Vec<ImageryProvider>> {
        let snapshot = self.current_snapshot()?;
        self.imagery_with(&snapshot, bod_id, time)
    }

    #[instrument(skip(self, snapshot, time))]
    fn imagery_with(&self, snapshot: &CatalogSnapshot, bod_id: &str, time: &TimeHandle) -> Option<Vec<ImageryProvider>> {
        let config = snapshot.layer(bod_id);
        let config3d = linked_3d(snapshot, config)?;

        match config3d.kind {
            LayerKind::Aggregate => {
                let providers = config3d
                    .sub_layers_ids
                    .iter()
                    .filter_map(|child| self.imagery_with(snapshot, child.as_str(), time))
                    .flatten()
                    .collect();
                Some(providers)
            }
            LayerKind::Wms | LayerKind::Wmts => Some(vec![self.single_imagery(config3d, time)]),
            LayerKind::Geojson | LayerKind::Terrain | LayerKind::Tileset3d | LayerKind::Kml | LayerKind::Other => {
                if config.kind == LayerKind::Aggregate {
                    Some(Vec::new())
                } else {
                    debug!(kind = %config3d.kind, "No 3D imagery");
                    None
                }
            }
        }
    }

    fn single_imagery(&self, config3d: &LayerDescriptor, time: &TimeHandle) -> ImageryProvider {
        let requested = config3d.wms_layer_list();
        let format = match config3d.format_or_default() {
            "pngjpeg" => "jpeg",
            other => other,
        };

        let (url, tile_size, subdomains) = if config3d.kind == LayerKind::Wmts {
            (
                self.urls.wmts_tile_template(requested, Some("4326"), format),
                WMTS_TILE_SIZE,
                domain_shard(self.urls.wmts_subdomains(), self.caps.http2),
            )
        } else {
            let size = WMS_TILE_SIZE.to_string();
            let image_format = format!("image/{format}");
            let mut params = vec![
                ("layers", requested),
                ("format", image_format.as_str()),
                ("service", "WMS"),
                ("version", "1.3.0"),
                ("request", "GetMap"),
                ("crs", "CRS:84"),
                ("bbox", "{westProjected},{southProjected},{eastProjected},{northProjected}"),
                ("width", size.as_str()),
                ("height", size.as_str()),
                ("styles", ""),
            ];
            if config3d.time_enabled {
                params.push(("time", "{Time}"));
            }
            (
                self.urls.wms_url(Some(&self.options.wms_url), &params),
                WMS_TILE_SIZE,
                self.urls.wms_subdomains().to_vec(),
            )
        };

        // Level 0 counts as "not derivable", like an absent resolution.
        let minimum_level = lod_from_resolution(config3d.max_resolution)
            .filter(|level| *level > 0)
            .unwrap_or(self.options.minimum_retrieving_level);
        let maximum_retrieving_level = lod_from_resolution(config3d.min_resolution).filter(|level| *level > 0);
        let maximum_level = match (maximum_retrieving_level, config3d.resolutions.as_deref()) {
            (Some(_), _) => None,
            (None, Some(resolutions)) if !resolutions.is_empty() => {
                lod_from_resolution(resolutions.last().copied())
            }
            (None, _) => Some(CLIENT_ZOOM_MAX_LEVEL),
        };

        ImageryProvider {
            bod_id: config3d.id.clone(),
            url,
            subdomains,
            minimum_level,
            maximum_retrieving_level,
            maximum_level,
            extent: config3d.extent.unwrap_or(self.options.default_extent),
            tile_width: tile_size,
            tile_height: tile_size,
            has_alpha_channel: format == "png",
            available_levels: self.options.imagery_available_levels.clone(),
            metadata_url: self.options.imagery_metadata_url.clone(),
            time: time.clone(),
        }
    }

    /// KML data source of a layer, loading in the background.
    ///
    /// # Panics
    /// Panics if `bod_id` is not in the current catalogue.
    #[instrument(skip(self, scene))]
    pub fn data_source(&self, bod_id: &str, scene: &SceneRef) -> Option<KmlDataSource> {
        let snapshot = self.current_snapshot()?;
        let config3d = linked_3d(&snapshot, snapshot.layer(bod_id))?;
        if config3d.kind != LayerKind::Kml {
            return None;
        }

        let url = config3d.url.clone().unwrap_or_default();
        Some(KmlDataSource {
            bod_id: config3d.id.clone(),
            url: url.clone(),
            camera: scene.camera.clone(),
            canvas: scene.canvas.clone(),
            proxy: self.collaborators.proxy.cesium_proxy(),
            load: self.kml_load(config3d.id.clone(), url),
        })
    }

    fn kml_load(&self, bod_id: LayerId, url: String) -> KmlLoad {
        let proxy = self.collaborators.proxy.clone();
        let fetcher = self.collaborators.fetcher.clone();

        async move {
            let result = async {
                if url.is_empty() {
                    return Err(LoadError::fetch(bod_id.as_str(), "layer declares no url"));
                }
                let proxied = proxy.proxify_url(&url).await?;
                let body = fetcher.get(&proxied).await?;
                Ok::<_, LoadError>(Arc::new(KmlDocument { url: url.clone(), body }))
            }
            .await;

            if let Err(e) = &result {
                warn!(bod_id = %bod_id, error = %e, "KML load failed");
            }
            result
        }
        .boxed()
        .shared()
    }
}

impl fmt::Debug for Layer3dFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer3dFactory")
            .field("options", &self.options)
            .field("caps", &self.caps)
            .finish_non_exhaustive()
    }
}
