//! In-memory stand-ins for the collaborators of the catalogue and the
//! source factories.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};

use catalog::HttpFetcher;
use layers_common::LoadError;
use layers_protocol::Feature;
use sources::{StyleCompiler, TileBlobStore, UrlProxy, VectorStyle};

/// Fetcher answering from a URL → response table and recording every call.
///
/// Unknown URLs answer with HTTP 404.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, Result<Bytes, LoadError>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
    url_delays: HashMap<String, Duration>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.set_response(url, body);
        self
    }

    pub fn with_error(self, url: impl Into<String>, error: LoadError) -> Self {
        self.set_error(url, error);
        self
    }

    /// Delay every answer, so concurrent callers overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay the answers for `url` only; overrides [`MockFetcher::with_delay`].
    pub fn with_url_delay(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.url_delays.insert(url.into(), delay);
        self
    }

    pub fn set_response(&self, url: impl Into<String>, body: impl Into<Bytes>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), Ok(body.into()));
    }

    pub fn set_error(&self, url: impl Into<String>, error: LoadError) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), Err(error));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of requests made to `url`.
    pub fn call_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.as_str() == url)
            .count()
    }
}

#[async_trait]
impl HttpFetcher for MockFetcher {
    async fn get(&self, url: &str) -> Result<Bytes, LoadError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        if let Some(delay) = self.url_delays.get(url).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }

        let response = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned();
        response.unwrap_or_else(|| {
            Err(LoadError::Status {
                url: url.to_string(),
                status: 404,
            })
        })
    }
}

/// Proxy that prefixes every URL, so tests can see it was applied.
#[derive(Debug, Clone)]
pub struct MockProxy {
    pub prefix: String,
}

impl MockProxy {
    pub const PREFIX: &'static str = "https://proxy.test/";

    /// URL the proxy turns `url` into.
    pub fn proxied(url: &str) -> String {
        format!("{}{}", Self::PREFIX, url)
    }
}

impl Default for MockProxy {
    fn default() -> Self {
        Self {
            prefix: Self::PREFIX.to_string(),
        }
    }
}

#[async_trait]
impl UrlProxy for MockProxy {
    async fn proxify_url(&self, url: &str) -> Result<String, LoadError> {
        Ok(format!("{}{}", self.prefix, url))
    }

    fn is_valid(&self, url: &str) -> bool {
        url.starts_with("https://") || url.starts_with("http://")
    }

    fn cesium_proxy(&self) -> Option<String> {
        Some(self.prefix.clone())
    }
}

/// Style echoing its literal for every feature.
#[derive(Debug, Clone, PartialEq)]
pub struct MockStyle {
    pub literal: Value,
}

impl VectorStyle for MockStyle {
    fn feature_style(&self, _feature: &Feature, _resolution: f64) -> Option<Value> {
        Some(self.literal.clone())
    }
}

/// Compiler accepting any literal with a `type` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockStyleCompiler;

impl StyleCompiler for MockStyleCompiler {
    fn compile(&self, literal: &Value) -> Result<Arc<dyn VectorStyle>, LoadError> {
        if literal.get("type").is_none() {
            return Err(LoadError::Style("style literal has no type".to_string()));
        }
        Ok(Arc::new(MockStyle {
            literal: literal.clone(),
        }))
    }

    fn tileset_style(&self, name: &str) -> Option<Value> {
        (name == "labelEnhanced").then(|| json!({"show": true, "labelStyle": 2}))
    }
}

/// Tile store backed by a map of cache keys.
#[derive(Debug, Default)]
pub struct MockTileStore {
    tiles: Mutex<HashMap<String, Bytes>>,
}

impl MockTileStore {
    pub fn with_tile(self, key: impl Into<String>, blob: impl Into<Bytes>) -> Self {
        self.tiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), blob.into());
        self
    }
}

#[async_trait]
impl TileBlobStore for MockTileStore {
    async fn get_tile(&self, key: &str) -> Option<Bytes> {
        self.tiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}
