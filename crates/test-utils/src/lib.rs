//! Shared test utilities for the geo-layers workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Catalogue and document fixtures
//! - Mock collaborators (fetcher, proxy, style compiler, tile store)
//! - A harness wiring a catalogue to the source factories
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Only use it from `tests/` integration files: the crates it wraps would
//! otherwise be linked twice.

pub mod fixtures;
pub mod harness;
pub mod mocks;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use harness::*;
pub use mocks::*;

#[cfg(test)]
mod tests {
    use super::*;
    use layers_protocol::UrlTemplates;

    #[test]
    fn test_fixture_catalogue_labels_carry_language() {
        let de = catalogue_json("de");
        assert_eq!(de[ids::PIXELKARTE]["label"], "Landeskarten (de)");
        assert!(de[ids::BROKEN].get("type").is_none());
    }

    #[tokio::test]
    async fn test_fixture_fetcher_serves_catalogue() {
        use catalog::HttpFetcher;

        let fetcher = fixture_fetcher();
        let url = UrlTemplates::default().layers_config_url("fr");
        let body = fetcher.get(&url).await.unwrap();
        assert_eq!(body.as_ref(), catalogue_body("fr").as_slice());
        assert_eq!(fetcher.call_count(&url), 1);
        assert!(fetcher.get("https://unknown.test/").await.is_err());
    }
}
