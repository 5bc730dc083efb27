//! CLI configuration.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use catalog::CatalogConfig;
use layers_protocol::UrlTemplateConfig;
use sources::GlobalOptions;

/// Everything the resolver needs, as one YAML document.
///
/// Each section falls back to its defaults when missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub urls: UrlTemplateConfig,

    pub catalog: CatalogConfig,

    pub options: GlobalOptions,

    /// Named 3D tileset styles
    pub tileset_styles: HashMap<String, Value>,
}

impl CliConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            urls: UrlTemplateConfig::from_env(),
            catalog: CatalogConfig::default(),
            options: GlobalOptions::from_env(),
            tileset_styles: HashMap::new(),
        };
        config.validate()?;
        Ok(config)
    }

    /// The YAML file when given, the environment otherwise.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::from_yaml(p),
            None => Self::from_env(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.urls.validate().map_err(|e| anyhow!("urls: {}", e))?;
        self.catalog.validate().map_err(|e| anyhow!("catalog: {}", e))?;
        self.options.validate().map_err(|e| anyhow!("options: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(CliConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let file = write_config(
            r#"
urls:
  layers_config_url_template: "https://example.test/layersConfig?lang={Lang}"
options:
  default_epsg: "EPSG:21781"
tileset_styles:
  labelEnhanced:
    show: true
"#,
        );

        let config = CliConfig::from_yaml(file.path()).unwrap();
        assert_eq!(
            config.urls.layers_config_url_template,
            "https://example.test/layersConfig?lang={Lang}"
        );
        assert_eq!(config.urls.wmts_url, UrlTemplateConfig::default().wmts_url);
        assert_eq!(config.options.tile_matrix_set(), Some("21781"));
        assert_eq!(config.catalog.tilesets.len(), 3);
        assert!(config.tileset_styles.contains_key("labelEnhanced"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let file = write_config(
            r#"
urls:
  layers_config_url_template: "https://example.test/layersConfig"
"#,
        );

        let err = CliConfig::from_yaml(file.path()).unwrap_err();
        assert!(err.to_string().contains("{Lang}"));
    }

    #[test]
    fn test_missing_file() {
        assert!(CliConfig::load(Some("/nonexistent/layers.yaml")).is_err());
    }
}
