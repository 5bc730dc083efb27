//! Interfaces of the services the factories depend on but do not own.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use catalog::HttpFetcher;
use layers_common::LoadError;
use layers_protocol::Feature;

/// Rewrites URLs so that foreign resources are reachable from the client.
#[async_trait]
pub trait UrlProxy: Send + Sync {
    /// URL to request instead of `url`.
    async fn proxify_url(&self, url: &str) -> Result<String, LoadError>;

    /// Whether `url` is a usable absolute URL.
    fn is_valid(&self, url: &str) -> bool;

    /// Proxy prefix handed to the 3D engine's own loaders.
    fn cesium_proxy(&self) -> Option<String>;
}

/// A compiled vector style.
pub trait VectorStyle: Send + Sync + fmt::Debug {
    /// Renderer style for one feature at a resolution.
    fn feature_style(&self, feature: &Feature, resolution: f64) -> Option<Value>;
}

/// Compiles style documents into renderer styles.
pub trait StyleCompiler: Send + Sync {
    /// Compile a vector style literal document.
    fn compile(&self, literal: &Value) -> Result<Arc<dyn VectorStyle>, LoadError>;

    /// Named 3D tileset style, `None` when unknown.
    fn tileset_style(&self, name: &str) -> Option<Value>;
}

/// A style that hands its literal document to the renderer unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralStyle {
    pub literal: Value,
}

impl VectorStyle for LiteralStyle {
    fn feature_style(&self, _feature: &Feature, _resolution: f64) -> Option<Value> {
        Some(self.literal.clone())
    }
}

/// Compiler for clients that evaluate style literals themselves.
///
/// Named tileset styles come from a fixed table.
#[derive(Debug, Clone, Default)]
pub struct LiteralStyles {
    tileset_styles: HashMap<String, Value>,
}

impl LiteralStyles {
    pub fn new(tileset_styles: HashMap<String, Value>) -> Self {
        Self { tileset_styles }
    }
}

impl StyleCompiler for LiteralStyles {
    fn compile(&self, literal: &Value) -> Result<Arc<dyn VectorStyle>, LoadError> {
        if !literal.is_object() {
            return Err(LoadError::Style("style literal must be an object".to_string()));
        }
        Ok(Arc::new(LiteralStyle {
            literal: literal.clone(),
        }))
    }

    fn tileset_style(&self, name: &str) -> Option<Value> {
        self.tileset_styles.get(name).cloned()
    }
}

/// Local tile blob storage, keyed by [`layers_protocol::tile_cache_key`].
#[async_trait]
pub trait TileBlobStore: Send + Sync {
    async fn get_tile(&self, key: &str) -> Option<Bytes>;
}

/// Store without any tiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTileStore;

#[async_trait]
impl TileBlobStore for NoTileStore {
    async fn get_tile(&self, _key: &str) -> Option<Bytes> {
        None
    }
}

/// Current UI state read when layers are built.
pub trait ViewState: Send + Sync {
    /// Year or timestamp selected in the time selector.
    fn time(&self) -> Option<String>;

    fn lang(&self) -> String;
}

/// A [`ViewState`] set explicitly by the host.
#[derive(Debug)]
pub struct FixedView {
    time: RwLock<Option<String>>,
    lang: RwLock<String>,
}

impl FixedView {
    pub fn new(lang: impl Into<String>, time: Option<String>) -> Self {
        Self {
            time: RwLock::new(time),
            lang: RwLock::new(lang.into()),
        }
    }

    pub fn set_time(&self, time: Option<String>) {
        *self.time.write().unwrap_or_else(PoisonError::into_inner) = time;
    }

    pub fn set_lang(&self, lang: impl Into<String>) {
        *self.lang.write().unwrap_or_else(PoisonError::into_inner) = lang.into();
    }
}

impl ViewState for FixedView {
    fn time(&self) -> Option<String> {
        self.time.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn lang(&self) -> String {
        self.lang.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Proxy that leaves every URL untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectAccess;

#[async_trait]
impl UrlProxy for DirectAccess {
    async fn proxify_url(&self, url: &str) -> Result<String, LoadError> {
        Ok(url.to_string())
    }

    fn is_valid(&self, url: &str) -> bool {
        url.starts_with("https://") || url.starts_with("http://")
    }

    fn cesium_proxy(&self) -> Option<String> {
        None
    }
}

/// Opaque handles of the hosting 3D scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneRef {
    pub camera: String,
    pub canvas: String,
}

/// Everything the factories call out to.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn HttpFetcher>,
    pub proxy: Arc<dyn UrlProxy>,
    pub styles: Arc<dyn StyleCompiler>,
    pub tiles: Arc<dyn TileBlobStore>,
    pub view: Arc<dyn ViewState>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_view() {
        let view = FixedView::new("de", None);
        assert_eq!(view.time(), None);
        view.set_time(Some("2010".to_string()));
        view.set_lang("fr");
        assert_eq!(view.time().as_deref(), Some("2010"));
        assert_eq!(view.lang(), "fr");
    }

    #[test]
    fn test_literal_styles() {
        let styles = LiteralStyles::new(HashMap::from([(
            "labelEnhanced".to_string(),
            serde_json::json!({"show": true}),
        )]));
        let literal = serde_json::json!({"type": "single"});
        let style = styles.compile(&literal).unwrap();
        let feature = Feature::from_geometry(serde_json::json!({"type": "Point", "coordinates": [0, 0]}));
        assert_eq!(style.feature_style(&feature, 10.0), Some(literal));

        assert!(styles.compile(&serde_json::json!([1])).is_err());
        assert!(styles.tileset_style("labelEnhanced").is_some());
        assert!(styles.tileset_style("unknown").is_none());
    }

    #[tokio::test]
    async fn test_direct_access() {
        let proxy = DirectAccess;
        assert_eq!(proxy.proxify_url("https://a/b").await.unwrap(), "https://a/b");
        assert!(proxy.is_valid("https://a/b"));
        assert!(!proxy.is_valid("javascript:alert(1)"));
    }
}
