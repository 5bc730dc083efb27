//! HTTP access for catalogue and metadata documents.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, instrument};

use layers_common::LoadError;

use crate::error::{CatalogError, CatalogResult};

/// Minimal GET abstraction over the transport.
///
/// Retry and caching are the implementation's business; callers see one
/// attempt and its outcome.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Fetch `url` and return the response body.
    async fn get(&self, url: &str) -> Result<Bytes, LoadError>;
}

/// [`HttpFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> CatalogResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Resolve scheme-relative URLs (`//host/path`) against https.
    fn absolute(url: &str) -> String {
        if url.starts_with("//") {
            format!("https:{}", url)
        } else {
            url.to_string()
        }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    #[instrument(skip(self))]
    async fn get(&self, url: &str) -> Result<Bytes, LoadError> {
        let target = Self::absolute(url);
        let response = self
            .client
            .get(&target)
            .send()
            .await
            .map_err(|e| LoadError::fetch(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LoadError::fetch(url, e.to_string()))?;
        debug!(bytes = body.len(), "Fetched document");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url() {
        assert_eq!(
            ReqwestFetcher::absolute("//api3.geo.admin.ch/x"),
            "https://api3.geo.admin.ch/x"
        );
        assert_eq!(ReqwestFetcher::absolute("http://a/b"), "http://a/b");
    }
}
