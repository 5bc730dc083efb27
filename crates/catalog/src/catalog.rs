//! Catalogue loading and publication.
//!
//! The current snapshot lives in a `watch` channel; every publication is
//! also announced on a `broadcast` channel as [`CatalogEvent::Loaded`] (the
//! first one) or [`CatalogEvent::Reloaded`] (every later one).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, instrument, warn};

use layers_protocol::UrlTemplates;

use crate::config::{CatalogConfig, NoPermalink, PermalinkParams};
use crate::error::{CatalogError, CatalogResult};
use crate::fetch::{HttpFetcher, ReqwestFetcher};
use crate::snapshot::CatalogSnapshot;

const EVENT_CAPACITY: usize = 16;

type SharedLoad = Shared<BoxFuture<'static, CatalogResult<Arc<CatalogSnapshot>>>>;

/// Catalogue publication events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    /// First snapshot of the process.
    Loaded { lang: String, generation: u64 },

    /// A later snapshot replaced the current one (language change).
    Reloaded { lang: String, generation: u64 },
}

impl CatalogEvent {
    pub fn generation(&self) -> u64 {
        match self {
            CatalogEvent::Loaded { generation, .. } | CatalogEvent::Reloaded { generation, .. } => {
                *generation
            }
        }
    }

    pub fn lang(&self) -> &str {
        match self {
            CatalogEvent::Loaded { lang, .. } | CatalogEvent::Reloaded { lang, .. } => lang,
        }
    }
}

#[derive(Default)]
struct LoadState {
    /// Language of the most recent load request, cleared when it fails.
    last_requested: Option<String>,
    /// In-flight load, shared by concurrent callers for the same language.
    pending: Option<(String, SharedLoad)>,
}

/// The layer catalogue.
///
/// Loads are keyed by language: asking again for the last requested
/// language returns the current snapshot (or joins the in-flight load)
/// without network access.
pub struct LayerCatalog {
    fetcher: Arc<dyn HttpFetcher>,
    urls: Arc<UrlTemplates>,
    config: CatalogConfig,
    permalink: Arc<dyn PermalinkParams>,
    snapshot_tx: watch::Sender<Option<Arc<CatalogSnapshot>>>,
    events: broadcast::Sender<CatalogEvent>,
    state: Mutex<LoadState>,
    generation: AtomicU64,
    loaded: AtomicBool,
    language_source: Mutex<Option<watch::Receiver<String>>>,
}

impl LayerCatalog {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, urls: Arc<UrlTemplates>, config: CatalogConfig) -> Arc<Self> {
        Self::with_permalink(fetcher, urls, config, Arc::new(NoPermalink))
    }

    pub fn with_permalink(
        fetcher: Arc<dyn HttpFetcher>,
        urls: Arc<UrlTemplates>,
        config: CatalogConfig,
        permalink: Arc<dyn PermalinkParams>,
    ) -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            fetcher,
            urls,
            config,
            permalink,
            snapshot_tx,
            events,
            state: Mutex::new(LoadState::default()),
            generation: AtomicU64::new(0),
            loaded: AtomicBool::new(false),
            language_source: Mutex::new(None),
        })
    }

    /// Catalogue fetching over HTTP with the configured request timeout.
    pub fn over_http(urls: Arc<UrlTemplates>, config: CatalogConfig) -> CatalogResult<Arc<Self>> {
        config.validate().map_err(CatalogError::InvalidConfig)?;
        let fetcher = ReqwestFetcher::new(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::new(Arc::new(fetcher), urls, config))
    }

    pub fn urls(&self) -> &Arc<UrlTemplates> {
        &self.urls
    }

    /// The current snapshot, `None` before the first successful load.
    pub fn snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        self.snapshot_tx.borrow().clone()
    }

    /// Reactive view of the current snapshot.
    pub fn watch(&self) -> watch::Receiver<Option<Arc<CatalogSnapshot>>> {
        self.snapshot_tx.subscribe()
    }

    /// Publication events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    /// Load the catalogue for `lang`.
    ///
    /// A request for the last requested language does not fetch again. A
    /// response that arrives after a newer language was requested is still
    /// published (with a warning); suppression only compares requests.
    pub async fn load(self: &Arc<Self>, lang: &str) -> CatalogResult<Arc<CatalogSnapshot>> {
        let load = {
            let mut state = self.state.lock().await;
            let same_lang = state.last_requested.as_deref() == Some(lang);
            let joined = match &state.pending {
                Some((pending_lang, fut)) if same_lang && pending_lang == lang => Some(fut.clone()),
                _ => None,
            };
            match joined {
                Some(fut) => fut,
                None => match self.snapshot() {
                    Some(snapshot) if same_lang && snapshot.lang() == lang => {
                        debug!(lang, generation = snapshot.generation(), "Catalogue already loaded");
                        return Ok(snapshot);
                    }
                    _ => self.start_load(&mut state, lang),
                },
            }
        };
        load.await
    }

    fn start_load(self: &Arc<Self>, state: &mut LoadState, lang: &str) -> SharedLoad {
        info!(lang, "Loading layers configuration");
        let fut = self.clone().fetch_and_publish(lang.to_string()).boxed().shared();
        state.last_requested = Some(lang.to_string());
        state.pending = Some((lang.to_string(), fut.clone()));
        fut
    }

    #[instrument(skip(self))]
    async fn fetch_and_publish(self: Arc<Self>, lang: String) -> CatalogResult<Arc<CatalogSnapshot>> {
        let url = self.urls.layers_config_url(&lang);
        let result = async {
            let body = self.fetcher.get(&url).await?;
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let snapshot = CatalogSnapshot::from_payload(
                &body,
                &lang,
                generation,
                &self.config,
                self.permalink.as_ref(),
            )?;
            Ok::<_, CatalogError>(Arc::new(snapshot))
        }
        .await;

        let mut state = self.state.lock().await;
        if matches!(&state.pending, Some((pending_lang, _)) if *pending_lang == lang) {
            state.pending = None;
        }

        match result {
            Ok(snapshot) => {
                if state.last_requested.as_deref() != Some(lang.as_str()) {
                    warn!(
                        lang = %lang,
                        requested = ?state.last_requested,
                        "Publishing catalogue for a language that is no longer requested"
                    );
                }
                drop(state);
                self.publish(snapshot.clone()).await;
                Ok(snapshot)
            }
            Err(e) => {
                if state.last_requested.as_deref() == Some(lang.as_str()) {
                    state.last_requested = None;
                }
                warn!(url = %url, error = %e, "Failed to load layers configuration");
                Err(e)
            }
        }
    }

    async fn publish(self: &Arc<Self>, snapshot: Arc<CatalogSnapshot>) {
        let first = !self.loaded.swap(true, Ordering::SeqCst);
        let lang = snapshot.lang().to_string();
        let generation = snapshot.generation();
        self.snapshot_tx.send_replace(Some(snapshot));

        let event = if first {
            CatalogEvent::Loaded { lang, generation }
        } else {
            CatalogEvent::Reloaded { lang, generation }
        };
        info!(event = ?event, "Published catalogue");
        // No subscribers is not an error.
        let _ = self.events.send(event);

        if first {
            if let Some(rx) = self.language_source.lock().await.take() {
                self.spawn_language_listener(rx);
            }
        }
    }

    /// Follow UI language changes.
    ///
    /// The listener starts with the first successful load; every change of
    /// the language value then triggers [`LayerCatalog::load`].
    pub async fn attach_language_source(self: &Arc<Self>, rx: watch::Receiver<String>) {
        let mut source = self.language_source.lock().await;
        if self.loaded.load(Ordering::SeqCst) {
            drop(source);
            self.spawn_language_listener(rx);
        } else {
            *source = Some(rx);
        }
    }

    fn spawn_language_listener(self: &Arc<Self>, mut rx: watch::Receiver<String>) {
        let catalog = Arc::downgrade(self);
        debug!("Starting language listener");
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let lang = rx.borrow_and_update().clone();
                let Some(catalog) = catalog.upgrade() else {
                    break;
                };
                if let Err(e) = catalog.load(&lang).await {
                    warn!(lang = %lang, error = %e, "Reload after language change failed");
                }
            }
            debug!("Language listener stopped");
        });
    }

    /// Legend/metadata document of a layer, returned unopened.
    #[instrument(skip(self))]
    pub async fn metadata(&self, bod_id: &str, lang: &str) -> CatalogResult<Bytes> {
        let url = self.urls.metadata_url(bod_id, lang);
        Ok(self.fetcher.get(&url).await?)
    }
}

impl std::fmt::Debug for LayerCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerCatalog")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("loaded", &self.loaded.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
