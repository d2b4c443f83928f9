//! Media fetch seam.
//!
//! The cache gateway and the artwork path both reduce to "fetch this URL
//! fully into memory". [`MediaFetcher`] abstracts that; a `reqwest`-backed
//! implementation ships behind the default `reqwest-client` feature for
//! hosts without their own HTTP stack.

#[cfg(feature = "reqwest-client")]
use crate::error::BridgeError;
use crate::error::Result;
use bytes::Bytes;
#[cfg(feature = "reqwest-client")]
use std::time::Duration;

/// Async URL-to-bytes fetcher.
#[async_trait::async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch the full contents of `url`.
    ///
    /// # Errors
    ///
    /// Fails on connection errors, non-2xx statuses, or timeout.
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// [`MediaFetcher`] backed by a shared [`reqwest::Client`].
#[cfg(feature = "reqwest-client")]
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest-client")]
impl HttpMediaFetcher {
    /// Build a fetcher with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Fails if the underlying TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "reqwest-client")]
#[async_trait::async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BridgeError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BridgeError::Network(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| BridgeError::Network(e.to_string()))
    }
}
