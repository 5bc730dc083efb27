//! Catalogue error types.

use layers_common::LoadError;
use thiserror::Error;

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised while loading or querying the catalogue.
///
/// Cloneable: concurrent callers waiting on the same in-flight load all
/// observe the same outcome.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    // === Transport ===
    #[error(transparent)]
    Load(#[from] LoadError),

    // === Payload ===
    #[error("Invalid catalogue payload: {0}")]
    InvalidPayload(String),

    // === Configuration ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::InvalidPayload(format!("JSON error: {}", err))
    }
}
