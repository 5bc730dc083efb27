//! 2D source factory.
//!
//! Turns catalogue descriptors into tile, image, group and vector layers
//! for the 2D engine. Sources of layers that are not time enabled are
//! cached per catalogue generation and shared between instances; time
//! enabled layers always get a fresh source.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use catalog::CatalogSnapshot;
use layers_common::{resolve_timestamp, LayerDescriptor, LayerId, LayerKind, LoadError, TileGrid};
use layers_protocol::{
    domain_shard, imagery_urls, parse_vector_data, tile_cache_key, Feature, FeatureCollection, UrlTemplates,
};

use crate::collaborators::{Collaborators, TileBlobStore, VectorStyle};
use crate::config::{ClientCapabilities, GlobalOptions};
use crate::instance::{DisplayState, Layer2d, LayerBounds, RenderedLayerInstance, TimeHandle};
use crate::source3d::Layer3dFactory;

/// Features of a geojson layer once loaded.
pub type GeojsonLoad = Shared<BoxFuture<'static, Result<Arc<FeatureCollection>, LoadError>>>;

/// Compiled style of a geojson layer once loaded.
pub type StyleLoad = Shared<BoxFuture<'static, Result<Arc<dyn VectorStyle>, LoadError>>>;

// ============================================================================
// Tile loading
// ============================================================================

/// Tile bytes from the local store, or the URL to fetch them from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileContent {
    Cached(Bytes),
    Remote(String),
}

/// Loads tiles from the local blob store before falling back to the network.
#[derive(Clone)]
pub struct TileLoader {
    store: Arc<dyn TileBlobStore>,
}

impl TileLoader {
    pub fn new(store: Arc<dyn TileBlobStore>) -> Self {
        Self { store }
    }

    pub async fn load_tile(&self, url: &str) -> TileContent {
        match self.store.get_tile(&tile_cache_key(url)).await {
            Some(blob) => TileContent::Cached(blob),
            None => TileContent::Remote(url.to_string()),
        }
    }
}

impl fmt::Debug for TileLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileLoader").finish_non_exhaustive()
    }
}

// ============================================================================
// Sources
// ============================================================================

/// RESTful WMTS source.
#[derive(Debug, Serialize)]
pub struct WmtsSource {
    pub layer: String,
    pub format: String,
    pub projection: String,
    pub request_encoding: &'static str,
    /// Value of the `Time` dimension
    pub time: Option<String>,
    pub cache_size: usize,
    pub tile_grid: TileGrid,
    /// One template per subdomain, with `{TileMatrix}`, `{TileCol}`,
    /// `{TileRow}` and `{Time}` left for the engine
    pub urls: Vec<String>,
    pub cross_origin: Option<String>,
    pub transition: u32,
    #[serde(skip)]
    pub loader: TileLoader,
}

impl WmtsSource {
    /// Concrete URL of one tile, spreading tiles over the subdomains.
    pub fn tile_url(&self, z: usize, col: u32, row: u32) -> Option<String> {
        let matrix = self.tile_grid.matrix_ids.get(z)?;
        if self.urls.is_empty() {
            return None;
        }
        let template = &self.urls[(col as usize + row as usize) % self.urls.len()];
        Some(
            template
                .replacen("{TileMatrix}", matrix, 1)
                .replacen("{TileCol}", &col.to_string(), 1)
                .replacen("{TileRow}", &row.to_string(), 1)
                .replacen("{Time}", self.time.as_deref().unwrap_or_default(), 1),
        )
    }

    pub async fn load_tile(&self, url: &str) -> TileContent {
        self.loader.load_tile(url).await
    }
}

/// Single-image WMS source covering the whole view.
#[derive(Debug, Serialize)]
pub struct ImageWmsSource {
    pub url: String,
    pub params: Vec<(String, String)>,
    pub cross_origin: Option<String>,
    pub ratio: f64,
}

/// Tiled WMS source.
#[derive(Debug, Serialize)]
pub struct TileWmsSource {
    pub urls: Vec<String>,
    pub params: Vec<(String, String)>,
    pub gutter: u32,
    pub cache_size: usize,
    pub cross_origin: Option<String>,
    pub tile_grid: TileGrid,
    pub wrap_x: bool,
    pub transition: u32,
    #[serde(skip)]
    pub loader: TileLoader,
}

impl TileWmsSource {
    pub async fn load_tile(&self, url: &str) -> TileContent {
        self.loader.load_tile(url).await
    }
}

#[derive(Debug, Default)]
struct VectorState {
    features: Vec<Feature>,
    data_timestamp: Option<String>,
    style: Option<Arc<dyn VectorStyle>>,
    features_generation: u64,
    style_generation: u64,
}

/// Vector source filled asynchronously by geojson and style loads.
#[derive(Debug, Serialize)]
pub struct VectorSource {
    pub url: Option<String>,
    pub projection: String,
    #[serde(skip)]
    state: RwLock<VectorState>,
}

impl VectorSource {
    pub fn new(url: Option<String>, projection: impl Into<String>) -> Self {
        Self {
            url,
            projection: projection.into(),
            state: RwLock::new(VectorState::default()),
        }
    }

    pub fn features(&self) -> Vec<Feature> {
        self.read().features.clone()
    }

    pub fn len(&self) -> usize {
        self.read().features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().features.is_empty()
    }

    /// Data time declared by the last applied document.
    pub fn data_timestamp(&self) -> Option<String> {
        self.read().data_timestamp.clone()
    }

    pub fn style(&self) -> Option<Arc<dyn VectorStyle>> {
        self.read().style.clone()
    }

    /// Replace all features, unless a newer load already applied its own.
    fn replace_features(&self, generation: u64, collection: &FeatureCollection) -> bool {
        let mut state = self.write();
        if generation < state.features_generation {
            return false;
        }
        state.features_generation = generation;
        state.features.clear();
        state.features.extend(collection.features.iter().cloned());
        if collection.timestamp.is_some() {
            state.data_timestamp = collection.timestamp.clone();
        }
        true
    }

    fn replace_style(&self, generation: u64, style: Arc<dyn VectorStyle>) -> bool {
        let mut state = self.write();
        if generation < state.style_generation {
            return false;
        }
        state.style_generation = generation;
        state.style = Some(style);
        true
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, VectorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, VectorState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Any 2D source. Clones share the underlying source.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source2d {
    Wmts(Arc<WmtsSource>),
    ImageWms(Arc<ImageWmsSource>),
    TileWms(Arc<TileWmsSource>),
    Vector(Arc<VectorSource>),
}

impl Source2d {
    /// Whether both handles point at the same source object.
    pub fn ptr_eq(&self, other: &Source2d) -> bool {
        match (self, other) {
            (Source2d::Wmts(a), Source2d::Wmts(b)) => Arc::ptr_eq(a, b),
            (Source2d::ImageWms(a), Source2d::ImageWms(b)) => Arc::ptr_eq(a, b),
            (Source2d::TileWms(a), Source2d::TileWms(b)) => Arc::ptr_eq(a, b),
            (Source2d::Vector(a), Source2d::Vector(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_wmts(&self) -> Option<Arc<WmtsSource>> {
        match self {
            Source2d::Wmts(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_image_wms(&self) -> Option<Arc<ImageWmsSource>> {
        match self {
            Source2d::ImageWms(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_tile_wms(&self) -> Option<Arc<TileWmsSource>> {
        match self {
            Source2d::TileWms(s) => Some(s.clone()),
            _ => None,
        }
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Per-call options of [`Layer2dFactory::build_layer`].
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Style document replacing the catalogue style of a geojson layer
    pub external_style_url: Option<String>,
}

#[derive(Default)]
struct SourceCache {
    generation: u64,
    sources: HashMap<LayerId, Source2d>,
}

#[derive(Clone)]
struct VectorLoads {
    features: GeojsonLoad,
    style: StyleLoad,
}

pub struct Layer2dFactory {
    snapshots: watch::Receiver<Option<Arc<CatalogSnapshot>>>,
    urls: Arc<UrlTemplates>,
    options: Arc<GlobalOptions>,
    caps: ClientCapabilities,
    collaborators: Collaborators,
    factory3d: Arc<Layer3dFactory>,
    cache: Mutex<SourceCache>,
    loads: Mutex<HashMap<LayerId, VectorLoads>>,
    load_generation: AtomicU64,
}

impl Layer2dFactory {
    pub fn new(
        snapshots: watch::Receiver<Option<Arc<CatalogSnapshot>>>,
        urls: Arc<UrlTemplates>,
        options: Arc<GlobalOptions>,
        caps: ClientCapabilities,
        collaborators: Collaborators,
    ) -> Self {
        let factory3d = Arc::new(Layer3dFactory::new(
            snapshots.clone(),
            urls.clone(),
            options.clone(),
            caps,
            collaborators.clone(),
        ));
        Self {
            snapshots,
            urls,
            options,
            caps,
            collaborators,
            factory3d,
            cache: Mutex::new(SourceCache::default()),
            loads: Mutex::new(HashMap::new()),
            load_generation: AtomicU64::new(0),
        }
    }

    /// The 3D factory the produced instances call into.
    pub fn factory3d(&self) -> &Arc<Layer3dFactory> {
        &self.factory3d
    }

    fn current_snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        let snapshot = self.snapshots.borrow().clone();
        if snapshot.is_none() {
            warn!("No catalogue loaded yet");
        }
        snapshot
    }

    /// Build the 2D layer for `bod_id`.
    ///
    /// Returns `None` before the first catalogue load and for kinds without
    /// a 2D representation.
    ///
    /// # Panics
    /// Panics if `bod_id` is not in the current catalogue.
    pub fn build_layer(&self, bod_id: &str, opts: &BuildOptions) -> Option<RenderedLayerInstance> {
        let snapshot = self.current_snapshot()?;
        self.build_with(&snapshot, bod_id, opts)
    }

    #[instrument(skip(self, snapshot, opts), fields(generation = snapshot.generation()))]
    fn build_with(
        &self,
        snapshot: &CatalogSnapshot,
        bod_id: &str,
        opts: &BuildOptions,
    ) -> Option<RenderedLayerInstance> {
        let config = snapshot.layer(bod_id);
        let requested_time = self.collaborators.view.time();
        let timestamp = resolve_timestamp(config, requested_time.as_deref()).map(str::to_string);

        let offline = self.caps.offline;
        let preload = if offline { self.options.offline_preload } else { 0 };
        let bounds = LayerBounds {
            min_resolution: config.min_resolution,
            max_resolution: config.max_resolution,
            opacity: config.opacity_or_default(),
            extent: Some(config.extent.unwrap_or(self.options.default_extent)),
        };

        let layer = match config.kind {
            LayerKind::Wmts => {
                let source = self.shared_source(snapshot, config, Source2d::as_wmts, Source2d::Wmts, || {
                    self.wmts_source(config, timestamp.clone())
                });
                Layer2d::Tile {
                    bounds: LayerBounds {
                        min_resolution: if offline { None } else { config.min_resolution },
                        ..bounds
                    },
                    source: Source2d::Wmts(source),
                    preload,
                    use_interim_tiles_on_error: offline,
                }
            }
            LayerKind::Wms if config.single_tile => {
                let source = self.shared_source(
                    snapshot,
                    config,
                    Source2d::as_image_wms,
                    Source2d::ImageWms,
                    || self.image_wms_source(config, timestamp.as_deref()),
                );
                Layer2d::Image { bounds, source }
            }
            LayerKind::Wms => {
                let source = self.shared_source(snapshot, config, Source2d::as_tile_wms, Source2d::TileWms, || {
                    self.tile_wms_source(config, timestamp.as_deref())
                });
                Layer2d::Tile {
                    bounds,
                    source: Source2d::TileWms(source),
                    preload,
                    use_interim_tiles_on_error: offline,
                }
            }
            LayerKind::Aggregate => {
                let layers = config
                    .sub_layers_ids
                    .iter()
                    .filter_map(|child| {
                        let built = self.build_with(snapshot, child.as_str(), &BuildOptions::default());
                        if built.is_none() {
                            warn!(child = %child, "Aggregate child has no 2D representation");
                        }
                        built
                    })
                    .collect();
                Layer2d::Group {
                    bounds: LayerBounds { extent: None, ..bounds },
                    layers,
                }
            }
            LayerKind::Geojson => {
                let source = Arc::new(VectorSource::new(
                    config.geojson_url.clone(),
                    self.options.default_epsg.clone(),
                ));
                self.start_vector_loads(config, &source, opts);
                Layer2d::Vector { bounds, source }
            }
            LayerKind::Terrain | LayerKind::Tileset3d | LayerKind::Kml | LayerKind::Other => {
                debug!(kind = %config.kind, "No 2D representation");
                return None;
            }
        };

        Some(RenderedLayerInstance {
            bod_id: config.id.clone(),
            label: config.label.clone(),
            time: TimeHandle::new(timestamp),
            time_enabled: config.time_enabled,
            time_behaviour: config.time_behaviour.clone(),
            timestamps: config.timestamps.clone(),
            geojson_url: config.geojson_url.clone(),
            update_delay: config.update_delay,
            external_style_url: opts.external_style_url.clone(),
            use_third_party_data: opts.external_style_url.as_deref().is_some_and(|u| !u.is_empty()),
            display: DisplayState::for_catalogue_layer(&config.id),
            layer,
            factory3d: self.factory3d.clone(),
        })
    }

    /// Cached source of a layer, built on first use.
    fn shared_source<T>(
        &self,
        snapshot: &CatalogSnapshot,
        config: &LayerDescriptor,
        extract: fn(&Source2d) -> Option<Arc<T>>,
        wrap: fn(Arc<T>) -> Source2d,
        build: impl FnOnce() -> T,
    ) -> Arc<T> {
        if config.time_enabled {
            return Arc::new(build());
        }

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if cache.generation != snapshot.generation() {
            cache.sources.clear();
            cache.generation = snapshot.generation();
        }
        if let Some(existing) = cache.sources.get(&config.id).and_then(extract) {
            debug!(bod_id = %config.id, "Reusing cached source");
            return existing;
        }

        let source = Arc::new(build());
        cache.sources.insert(config.id.clone(), wrap(source.clone()));
        source
    }

    fn wms_params(&self, config: &LayerDescriptor, timestamp: Option<&str>) -> Vec<(String, String)> {
        let mut params = vec![
            ("LAYERS".to_string(), config.wms_layer_list().to_string()),
            ("FORMAT".to_string(), format!("image/{}", config.format_or_default())),
            ("LANG".to_string(), self.collaborators.view.lang()),
        ];
        if config.time_enabled {
            if let Some(ts) = timestamp {
                params.push(("TIME".to_string(), ts.to_string()));
            }
        }
        params
    }

    fn wmts_source(&self, config: &LayerDescriptor, timestamp: Option<String>) -> WmtsSource {
        let format = config.format_or_default();
        let template = self
            .urls
            .wmts_tile_template(config.server_layer(), self.options.tile_matrix_set(), format)
            .replacen("{z}", "{TileMatrix}", 1)
            .replacen("{x}", "{TileCol}", 1)
            .replacen("{y}", "{TileRow}", 1);
        let subdomains = domain_shard(self.urls.wmts_subdomains(), self.caps.http2);

        WmtsSource {
            layer: config.server_layer().to_string(),
            format: format.to_string(),
            projection: self.options.default_epsg.clone(),
            request_encoding: "REST",
            time: timestamp,
            cache_size: if config.time_enabled { 0 } else { self.options.wmts_cache_size },
            tile_grid: TileGrid::for_layer(config.resolutions.as_deref(), config.min_resolution, config.kind),
            urls: imagery_urls(&template, Some(&subdomains)),
            cross_origin: self.caps.cross_origin(),
            transition: 0,
            loader: TileLoader::new(self.collaborators.tiles.clone()),
        }
    }

    fn image_wms_source(&self, config: &LayerDescriptor, timestamp: Option<&str>) -> ImageWmsSource {
        let base = self.urls.wms_base_url(Some(&self.options.wms_url));
        ImageWmsSource {
            url: imagery_urls(&base, None).into_iter().next().unwrap_or_default(),
            params: self.wms_params(config, timestamp),
            cross_origin: self.caps.cross_origin(),
            ratio: 1.0,
        }
    }

    fn tile_wms_source(&self, config: &LayerDescriptor, timestamp: Option<&str>) -> TileWmsSource {
        let base = self.urls.wms_base_url(Some(&self.options.wms_url));
        TileWmsSource {
            urls: imagery_urls(&base, Some(self.urls.wms_subdomains())),
            params: self.wms_params(config, timestamp),
            gutter: config.gutter.unwrap_or(0),
            cache_size: self.options.tiled_wms_cache_size,
            cross_origin: self.caps.cross_origin(),
            tile_grid: TileGrid::for_layer(config.resolutions.as_deref(), config.min_resolution, LayerKind::Wms),
            wrap_x: false,
            transition: 0,
            loader: TileLoader::new(self.collaborators.tiles.clone()),
        }
    }

    // ------------------------------------------------------------------------
    // Vector loads
    // ------------------------------------------------------------------------

    fn next_generation(&self) -> u64 {
        self.load_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn start_vector_loads(&self, config: &LayerDescriptor, source: &Arc<VectorSource>, opts: &BuildOptions) {
        let generation = self.next_generation();
        let features = self.geojson_load(config, source.clone(), generation);

        let external = opts
            .external_style_url
            .as_deref()
            .filter(|url| self.collaborators.proxy.is_valid(url));
        let style_url = match external {
            Some(url) => url.to_string(),
            None => format!(
                "{}{}",
                self.options.page_protocol,
                config.style_url.as_deref().unwrap_or_default()
            ),
        };
        let style = self.style_load(config, style_url, source.clone(), generation);

        spawn_detached(features.clone());
        spawn_detached(style.clone());
        self.loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(config.id.clone(), VectorLoads { features, style });
    }

    /// Fetch the geojson document of a vector layer again, e.g. for
    /// realtime layers. The new features replace the current ones unless a
    /// later refresh got there first.
    pub fn refresh(&self, instance: &RenderedLayerInstance) -> Option<GeojsonLoad> {
        let Layer2d::Vector { source, .. } = &instance.layer else {
            return None;
        };
        let snapshot = self.current_snapshot()?;
        let config = snapshot.get(instance.bod_id.as_str())?;

        let features = self.geojson_load(config, source.clone(), self.next_generation());
        spawn_detached(features.clone());
        if let Some(loads) = self
            .loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&config.id)
        {
            loads.features = features.clone();
        }
        Some(features)
    }

    fn geojson_load(&self, config: &LayerDescriptor, source: Arc<VectorSource>, generation: u64) -> GeojsonLoad {
        let proxy = self.collaborators.proxy.clone();
        let fetcher = self.collaborators.fetcher.clone();
        let bod_id = config.id.clone();
        let url = config.geojson_url.clone();

        async move {
            let result = async {
                let url = url.ok_or_else(|| LoadError::fetch(bod_id.as_str(), "layer declares no geojsonUrl"))?;
                let proxied = proxy.proxify_url(&url).await?;
                let body = fetcher.get(&proxied).await?;
                let collection = parse_vector_data(&body)?;
                if source.replace_features(generation, &collection) {
                    debug!(bod_id = %bod_id, features = collection.len(), generation, "Applied geojson features");
                } else {
                    debug!(bod_id = %bod_id, generation, "Discarded superseded geojson load");
                }
                Ok::<_, LoadError>(Arc::new(collection))
            }
            .await;

            if let Err(e) = &result {
                warn!(bod_id = %bod_id, error = %e, "Geojson load failed");
            }
            result
        }
        .boxed()
        .shared()
    }

    fn style_load(
        &self,
        config: &LayerDescriptor,
        style_url: String,
        source: Arc<VectorSource>,
        generation: u64,
    ) -> StyleLoad {
        let proxy = self.collaborators.proxy.clone();
        let fetcher = self.collaborators.fetcher.clone();
        let styles = self.collaborators.styles.clone();
        let bod_id = config.id.clone();

        async move {
            let result = async {
                let proxied = proxy.proxify_url(&style_url).await?;
                let body = fetcher.get(&proxied).await?;
                let literal: serde_json::Value =
                    serde_json::from_slice(&body).map_err(|e| LoadError::Style(e.to_string()))?;
                let style = styles.compile(&literal)?;
                source.replace_style(generation, style.clone());
                Ok::<_, LoadError>(style)
            }
            .await;

            if let Err(e) = &result {
                warn!(bod_id = %bod_id, url = %style_url, error = %e, "Style load failed");
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Latest geojson load of a layer.
    pub fn layer_promise(&self, bod_id: &str) -> Option<GeojsonLoad> {
        self.loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(bod_id)
            .map(|l| l.features.clone())
    }

    /// Latest style load of a layer.
    pub fn layer_style_promise(&self, bod_id: &str) -> Option<StyleLoad> {
        self.loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(bod_id)
            .map(|l| l.style.clone())
    }
}

impl fmt::Debug for Layer2dFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer2dFactory")
            .field("options", &self.options)
            .field("caps", &self.caps)
            .finish_non_exhaustive()
    }
}

/// Drive a shared load on the current runtime so it completes even if
/// nobody awaits it. Without a runtime the load runs when first awaited.
fn spawn_detached<T>(load: Shared<BoxFuture<'static, T>>)
where
    T: Clone + Send + Sync + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                let _ = load.await;
            });
        }
        Err(_) => debug!("No runtime, load starts when awaited"),
    }
}
