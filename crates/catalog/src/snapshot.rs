//! Immutable catalogue snapshots.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use layers_common::{LayerDescriptor, LayerError, LayerId, LayerKind, LayerResult};

use crate::config::{attribution_lang, tileset_layer_id, CatalogConfig, PermalinkParams};
use crate::error::CatalogResult;

/// One published catalogue for one language.
///
/// Never mutated after publication; a reload produces a new snapshot with
/// a higher generation.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    lang: String,
    generation: u64,
    layers: HashMap<LayerId, LayerDescriptor>,
}

impl CatalogSnapshot {
    /// Build a snapshot from a layers configuration payload.
    ///
    /// Entries that do not deserialize are skipped with a warning. Flag
    /// overrides, synthesized terrain/tileset entries and configured 3D
    /// links are applied before the `config2d` back-references are derived.
    pub fn from_payload(
        payload: &[u8],
        lang: &str,
        generation: u64,
        config: &CatalogConfig,
        permalink: &dyn PermalinkParams,
    ) -> CatalogResult<Self> {
        let raw: Map<String, Value> = serde_json::from_slice(payload)?;
        let mut layers = HashMap::with_capacity(raw.len() + config.tilesets.len() + 1);

        for (id, value) in raw {
            match serde_json::from_value::<LayerDescriptor>(value) {
                Ok(mut layer) => {
                    layer.id = LayerId::new(id.clone());
                    layers.insert(LayerId::new(id), layer);
                }
                Err(e) => {
                    warn!(bod_id = %id, error = %e, "Skipping unreadable catalogue entry");
                }
            }
        }

        let mut snapshot = Self {
            lang: lang.to_string(),
            generation,
            layers,
        };
        snapshot.apply_flag_overrides(config);
        snapshot.add_terrain(config);
        snapshot.add_tilesets(config, permalink);
        snapshot.apply_links(config);
        snapshot.prune_sub_layers();
        snapshot.link_config2d();

        debug!(
            lang = %snapshot.lang,
            generation,
            layers = snapshot.layers.len(),
            "Built catalogue snapshot"
        );
        Ok(snapshot)
    }

    /// Snapshot over already materialized descriptors; derives `config2d`.
    pub fn from_layers(
        lang: impl Into<String>,
        generation: u64,
        layers: impl IntoIterator<Item = LayerDescriptor>,
    ) -> Self {
        let mut snapshot = Self {
            lang: lang.into(),
            generation,
            layers: layers.into_iter().map(|l| (l.id.clone(), l)).collect(),
        };
        snapshot.link_config2d();
        snapshot
    }

    fn apply_flag_overrides(&mut self, config: &CatalogConfig) {
        for id in &config.opaque_layers {
            if let Some(layer) = self.layers.get_mut(id.as_str()) {
                layer.opaque = true;
            }
        }
        for id in &config.shop_multi_layers {
            if let Some(layer) = self.layers.get_mut(id.as_str()) {
                layer.shop_multi = true;
            }
        }
    }

    fn attribution_url(&self, template: &str) -> String {
        template.replacen("{Lang}", attribution_lang(&self.lang), 1)
    }

    fn add_terrain(&mut self, config: &CatalogConfig) {
        let Some(terrain) = &config.terrain else {
            return;
        };
        let mut layer = LayerDescriptor::new(terrain.id.clone(), LayerKind::Terrain);
        layer.server_layer_name = Some(terrain.id.clone());
        layer.timestamps = vec![terrain.timestamp.clone()];
        layer.attribution = Some(terrain.attribution.clone());
        layer.attribution_url = Some(self.attribution_url(&terrain.attribution_url_template));
        self.layers.insert(layer.id.clone(), layer);
    }

    fn add_tilesets(&mut self, config: &CatalogConfig, permalink: &dyn PermalinkParams) {
        let attribution_url = config
            .tileset_attribution_url_template
            .as_deref()
            .map(|t| self.attribution_url(t));

        for tileset in config.effective_tilesets(permalink) {
            let mut layer = LayerDescriptor::new(tileset_layer_id(&tileset.id), LayerKind::Tileset3d);
            layer.server_layer_name = Some(tileset.id);
            layer.timestamps = vec![tileset.timestamp];
            layer.attribution = Some(config.tileset_attribution.clone());
            layer.attribution_url = attribution_url.clone();
            layer.style = tileset.style;
            layer.tooltip = Some(false);
            layer.default3d = true;
            self.layers.insert(layer.id.clone(), layer);
        }
    }

    fn apply_links(&mut self, config: &CatalogConfig) {
        for link in &config.links_3d {
            if !self.layers.contains_key(link.config3d.as_str()) {
                continue;
            }
            if let Some(layer) = self.layers.get_mut(link.layer.as_str()) {
                layer.config3d = Some(LayerId::new(link.config3d.clone()));
            }
        }
    }

    fn prune_sub_layers(&mut self) {
        let known: HashSet<LayerId> = self.layers.keys().cloned().collect();
        for layer in self.layers.values_mut() {
            layer.sub_layers_ids.retain(|child| {
                let present = known.contains(child);
                if !present {
                    warn!(bod_id = %layer.id, child = %child, "Dropping missing aggregate child");
                }
                present
            });
        }
    }

    fn link_config2d(&mut self) {
        let links: Vec<(LayerId, LayerId)> = self
            .layers
            .values()
            .filter_map(|l| l.config3d.clone().map(|target| (target, l.id.clone())))
            .collect();

        for (target, source) in links {
            match self.layers.get_mut(&target) {
                Some(layer) => layer.config2d = Some(source),
                None => {
                    warn!(bod_id = %source, config3d = %target, "config3d points to a missing layer, dropping the link");
                    if let Some(layer) = self.layers.get_mut(&source) {
                        layer.config3d = None;
                    }
                }
            }
        }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Descriptor for `bod_id`, `None` when absent.
    pub fn get(&self, bod_id: &str) -> Option<&LayerDescriptor> {
        self.layers.get(bod_id)
    }

    /// Descriptor for `bod_id`.
    ///
    /// # Panics
    /// Panics if the id is not part of this snapshot. Asking for an unknown
    /// layer is a caller bug; use [`CatalogSnapshot::get`] for ids of
    /// unknown origin.
    pub fn layer(&self, bod_id: &str) -> &LayerDescriptor {
        self.get(bod_id).unwrap_or_else(|| {
            panic!(
                "Layer '{}' is not in the catalogue (lang='{}', generation={})",
                bod_id, self.lang, self.generation
            )
        })
    }

    /// Whether `bod_id` is a catalogue layer.
    pub fn contains(&self, bod_id: &str) -> bool {
        self.layers.contains_key(bod_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &LayerId> {
        self.layers.keys()
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerDescriptor> {
        self.layers.values()
    }

    /// The descriptor to use in 3D: the `config3d` target if linked, the
    /// descriptor itself otherwise.
    pub fn try_config3d<'a>(&'a self, layer: &'a LayerDescriptor) -> LayerResult<&'a LayerDescriptor> {
        match &layer.config3d {
            None => Ok(layer),
            Some(target) => self.get(target.as_str()).ok_or_else(|| LayerError::DanglingConfig3d {
                id: layer.id.to_string(),
                target: target.to_string(),
            }),
        }
    }

    /// Same as [`CatalogSnapshot::try_config3d`], falling back to `layer`
    /// itself when its link cannot be followed.
    ///
    /// Descriptors taken from this snapshot never fall back, since dangling
    /// links are dropped when the snapshot is built.
    pub fn config3d<'a>(&'a self, layer: &'a LayerDescriptor) -> &'a LayerDescriptor {
        self.try_config3d(layer).unwrap_or(layer)
    }

    /// The 2D counterpart of a 3D descriptor, if any.
    pub fn config2d(&self, layer: &LayerDescriptor) -> Option<&LayerDescriptor> {
        layer.config2d.as_ref().and_then(|id| self.get(id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoPermalink;

    fn payload() -> &'static [u8] {
        br#"{
            "ch.swisstopo.swissnames3d": {"type": "wms", "label": "Names"},
            "ch.swisstopo.pixelkarte-farbe": {"type": "wmts", "timestamps": ["20151231"], "config3d": "ch.swisstopo.pixelkarte-farbe_3d"},
            "ch.swisstopo.pixelkarte-farbe_3d": {"type": "wmts", "timestamps": ["20151231"]},
            "ch.swisstopo.lubis-bildstreifen": {"type": "wms"},
            "ch.broken": {"label": "no type"}
        }"#
    }

    fn build(lang: &str) -> CatalogSnapshot {
        CatalogSnapshot::from_payload(payload(), lang, 1, &CatalogConfig::default(), &NoPermalink)
            .unwrap()
    }

    #[test]
    fn test_ids_are_filled_from_keys() {
        let snapshot = build("de");
        assert_eq!(
            snapshot.layer("ch.swisstopo.pixelkarte-farbe").id.as_str(),
            "ch.swisstopo.pixelkarte-farbe"
        );
        assert!(!snapshot.contains("ch.broken"));
    }

    #[test]
    fn test_flag_overrides() {
        let snapshot = build("de");
        assert!(snapshot.layer("ch.swisstopo.pixelkarte-farbe").opaque);
        assert!(snapshot.layer("ch.swisstopo.pixelkarte-farbe_3d").opaque);
        assert!(snapshot.layer("ch.swisstopo.lubis-bildstreifen").shop_multi);
        assert!(!snapshot.layer("ch.swisstopo.swissnames3d").opaque);
    }

    #[test]
    fn test_synthesized_entries() {
        let snapshot = build("rm");
        let terrain = snapshot.layer("ch.swisstopo.terrain.3d");
        assert_eq!(terrain.kind, LayerKind::Terrain);
        assert_eq!(terrain.timestamps, vec!["20160115".to_string()]);
        assert_eq!(
            terrain.attribution_url.as_deref(),
            Some("https://www.swisstopo.admin.ch/de/home.html")
        );

        let names = snapshot.layer("ch.swisstopo.swissnames3d_3d");
        assert_eq!(names.kind, LayerKind::Tileset3d);
        assert_eq!(names.server_layer(), "ch.swisstopo.swissnames3d.3d");
        assert_eq!(names.style.as_deref(), Some("labelEnhanced"));
        assert_eq!(names.tooltip, Some(false));
        assert!(names.default3d);
        assert!(snapshot.contains("ch.swisstopo.swisstlm3d_3d"));
        assert!(snapshot.contains("ch.swisstopo.vegetation_3d"));
    }

    #[test]
    fn test_missing_aggregate_children_are_dropped() {
        let payload = br#"{
            "ch.group": {"type": "aggregate", "subLayersIds": ["ch.child", "ch.gone"]},
            "ch.child": {"type": "wms"}
        }"#;
        let snapshot =
            CatalogSnapshot::from_payload(payload, "de", 1, &CatalogConfig::default(), &NoPermalink).unwrap();

        let children: Vec<&str> = snapshot.layer("ch.group").sub_layers_ids.iter().map(LayerId::as_str).collect();
        assert_eq!(children, vec!["ch.child"]);
    }

    #[test]
    fn test_tileset_attribution_without_terrain() {
        let config = CatalogConfig {
            terrain: None,
            ..CatalogConfig::default()
        };
        let snapshot = CatalogSnapshot::from_payload(payload(), "fr", 1, &config, &NoPermalink).unwrap();

        assert!(!snapshot.contains("ch.swisstopo.terrain.3d"));
        assert_eq!(
            snapshot.layer("ch.swisstopo.vegetation_3d").attribution_url.as_deref(),
            Some("https://www.swisstopo.admin.ch/fr/home.html")
        );
    }

    #[test]
    fn test_config2d_back_references() {
        let snapshot = build("de");
        for layer in snapshot.layers() {
            if let Some(target) = &layer.config3d {
                assert_eq!(snapshot.layer(target.as_str()).config2d.as_ref(), Some(&layer.id));
            }
        }
        let names = snapshot.layer("ch.swisstopo.swissnames3d");
        assert_eq!(
            names.config3d.as_ref().map(LayerId::as_str),
            Some("ch.swisstopo.swissnames3d_3d")
        );
        let names3d = snapshot.config3d(names);
        assert_eq!(snapshot.config2d(names3d).map(|l| l.id.as_str()), Some("ch.swisstopo.swissnames3d"));
    }

    #[test]
    fn test_config3d_without_link_is_identity() {
        let snapshot = build("de");
        let layer = snapshot.layer("ch.swisstopo.lubis-bildstreifen");
        assert_eq!(snapshot.config3d(layer).id, layer.id);
    }

    #[test]
    fn test_dangling_config3d() {
        let mut layer = LayerDescriptor::new("a", LayerKind::Wms);
        layer.config3d = Some(LayerId::from("missing"));
        let snapshot = CatalogSnapshot::from_layers("de", 1, vec![layer.clone()]);
        assert!(matches!(
            snapshot.try_config3d(&layer),
            Err(LayerError::DanglingConfig3d { .. })
        ));
        assert_eq!(snapshot.config3d(&layer).id.as_str(), "a");

        // The published copy no longer carries the link
        let published = snapshot.layer("a");
        assert_eq!(published.config3d, None);
        assert_eq!(snapshot.config3d(published).id.as_str(), "a");
    }

    #[test]
    fn test_dangling_config3d_in_payload_is_dropped() {
        let payload = br#"{"ch.a": {"type": "wms", "config3d": "ch.a_3d_missing"}}"#;
        let snapshot =
            CatalogSnapshot::from_payload(payload, "de", 1, &CatalogConfig::default(), &NoPermalink).unwrap();

        let layer = snapshot.layer("ch.a");
        assert_eq!(layer.config3d, None);
        assert_eq!(snapshot.try_config3d(layer).unwrap().id.as_str(), "ch.a");
    }

    #[test]
    #[should_panic(expected = "not in the catalogue")]
    fn test_unknown_layer_panics() {
        build("de").layer("ch.unknown");
    }

    #[test]
    fn test_invalid_payload() {
        assert!(CatalogSnapshot::from_payload(b"[]", "de", 1, &CatalogConfig::default(), &NoPermalink).is_err());
    }
}
