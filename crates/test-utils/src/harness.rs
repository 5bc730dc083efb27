//! A catalogue wired to the source factories over mock collaborators.

use std::sync::Arc;

use catalog::{CatalogConfig, LayerCatalog};
use layers_protocol::UrlTemplates;
use sources::{ClientCapabilities, Collaborators, FixedView, GlobalOptions, Layer2dFactory};

use crate::fixtures::{catalogue_body, geojson_body, style_body, GEOJSON_URL, KML_URL, STYLE_URL};
use crate::mocks::{MockFetcher, MockProxy, MockStyleCompiler, MockTileStore};

/// KML body served for [`KML_URL`].
pub const KML_BODY: &str = "<kml><Document><name>Hindernisse</name></Document></kml>";

/// Fetcher serving the fixture catalogue (`de`, `fr`), the geojson, style
/// and KML documents behind the mock proxy.
pub fn fixture_fetcher() -> MockFetcher {
    let urls = UrlTemplates::default();
    let style_url = format!("{}{}", GlobalOptions::default().page_protocol, STYLE_URL);
    MockFetcher::new()
        .with_response(urls.layers_config_url("de"), catalogue_body("de"))
        .with_response(urls.layers_config_url("fr"), catalogue_body("fr"))
        .with_response(MockProxy::proxied(GEOJSON_URL), geojson_body())
        .with_response(MockProxy::proxied(&style_url), style_body())
        .with_response(MockProxy::proxied(KML_URL), KML_BODY)
}

pub struct Harness {
    pub fetcher: Arc<MockFetcher>,
    pub urls: Arc<UrlTemplates>,
    pub catalog: Arc<LayerCatalog>,
    pub view: Arc<FixedView>,
    pub options: Arc<GlobalOptions>,
    pub factory: Layer2dFactory,
}

impl Harness {
    /// Harness over `fetcher`; nothing loaded yet.
    pub fn new(fetcher: MockFetcher, caps: ClientCapabilities) -> Self {
        Self::with_tiles(fetcher, caps, MockTileStore::default())
    }

    pub fn with_tiles(fetcher: MockFetcher, caps: ClientCapabilities, tiles: MockTileStore) -> Self {
        let fetcher = Arc::new(fetcher);
        let urls = Arc::new(UrlTemplates::default());
        let catalog = LayerCatalog::new(fetcher.clone(), urls.clone(), CatalogConfig::default());
        let view = Arc::new(FixedView::new("de", None));
        let options = Arc::new(GlobalOptions::default());

        let collaborators = Collaborators {
            fetcher: fetcher.clone(),
            proxy: Arc::new(MockProxy::default()),
            styles: Arc::new(MockStyleCompiler),
            tiles: Arc::new(tiles),
            view: view.clone(),
        };
        let factory = Layer2dFactory::new(catalog.watch(), urls.clone(), options.clone(), caps, collaborators);

        Self {
            fetcher,
            urls,
            catalog,
            view,
            options,
            factory,
        }
    }

    /// Harness with the fixture catalogue loaded in German.
    ///
    /// # Panics
    /// Panics if the fixture catalogue fails to load.
    pub async fn loaded(caps: ClientCapabilities) -> Self {
        let harness = Self::new(fixture_fetcher(), caps);
        harness
            .catalog
            .load("de")
            .await
            .expect("fixture catalogue loads");
        harness
    }
}
