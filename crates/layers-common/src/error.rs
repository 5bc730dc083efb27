//! Error types for layer resolution.

use thiserror::Error;

/// Result type alias using LayerError.
pub type LayerResult<T> = Result<T, LayerError>;

/// Errors raised while navigating descriptors.
#[derive(Debug, Error)]
pub enum LayerError {
    // === Catalogue Errors ===
    #[error("Layer {id} links to missing 3D configuration {target}")]
    DanglingConfig3d { id: String, target: String },

    // === Descriptor Errors ===
    #[error("Invalid timestamp token: {0}")]
    InvalidTimestamp(String),
}

/// Failure of an asynchronous load (geojson, style, KML, metadata).
///
/// Cloneable so that one outcome can be observed by every holder of a
/// shared load future.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Request to {url} failed: {message}")]
    Fetch { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Proxy rewrite failed for {url}: {message}")]
    Proxy { url: String, message: String },

    /// No parser recognised the payload.
    #[error("Unparseable content: format not supported")]
    FormatNotSupported,

    /// A parser matched but the content was invalid.
    #[error("Vector data parsing failed: {0}")]
    ParseFailed(String),

    #[error("Style compilation failed: {0}")]
    Style(String),
}

impl LoadError {
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Human-readable reason, as reported to the user interface.
    pub fn reason(&self) -> String {
        match self {
            LoadError::FormatNotSupported => "format_not_supported".to_string(),
            LoadError::ParseFailed(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}
