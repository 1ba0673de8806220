//! Read-only block access through an IPFS HTTP gateway
//!
//! A gateway serves `GET /ipfs/<cid>` and nothing else, so writes are refused
//! and removals are no-ops. Trees published elsewhere can still be loaded and
//! queried through it.

use crate::cid_utils::{cid_to_path, create_cid, verify_cid};
use crate::{BlockStore, BlockStoreError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};

/// Configuration for a gateway reader
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Gateway root URL (e.g., "http://localhost:8080")
    pub gateway_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Check fetched bytes against the requested CID
    pub verify_hashes: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(30),
            verify_hashes: true,
        }
    }
}

impl GatewayConfig {
    /// Create with a custom gateway URL
    pub fn with_url(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            ..Default::default()
        }
    }

    fn block_url(&self, cid: &Cid) -> String {
        format!("{}{}", self.gateway_url.trim_end_matches('/'), cid_to_path(cid))
    }
}

/// Read-only gateway block store
#[derive(Clone)]
pub struct GatewayBlockStore {
    client: Client,
    config: GatewayConfig,
}

impl GatewayBlockStore {
    /// Create a new gateway reader
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BlockStoreError::Configuration(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from URL string
    pub fn from_url(url: &str) -> Result<Self> {
        Self::new(GatewayConfig::with_url(url))
    }

    /// Get the configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[async_trait]
impl BlockStore for GatewayBlockStore {
    async fn put_block(&self, data: &[u8]) -> Result<Cid> {
        Err(BlockStoreError::ReadOnly(format!(
            "gateway {} cannot store block {}",
            self.config.gateway_url,
            create_cid(data)
        )))
    }

    #[instrument(skip(self))]
    async fn get_block(&self, cid: &Cid) -> Result<Bytes> {
        let url = self.config.block_url(cid);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(BlockStoreError::NotFound(*cid)),
            status => {
                let error = response.text().await.unwrap_or_default();
                return Err(BlockStoreError::Http(format!(
                    "gateway answered {}: {}",
                    status, error
                )));
            }
        }

        let bytes = response.bytes().await?;

        if self.config.verify_hashes && !verify_cid(&bytes, cid) {
            return Err(BlockStoreError::HashMismatch {
                expected: cid.to_string(),
                actual: create_cid(&bytes).to_string(),
            });
        }

        debug!(bytes_len = bytes.len(), "fetched block from gateway");
        Ok(bytes)
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool> {
        match self.get_block(cid).await {
            Ok(_) => Ok(true),
            Err(BlockStoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete_block(&self, _cid: &Cid) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_block_url() {
        let config = GatewayConfig::with_url("http://gateway.local/");
        let cid = create_cid(b"x");
        assert_eq!(
            config.block_url(&cid),
            format!("http://gateway.local/ipfs/{}", cid)
        );
    }

    #[tokio::test]
    async fn test_gateway_get() {
        let server = MockServer::start().await;
        let data = b"published node";
        let cid = create_cid(data);

        Mock::given(method("GET"))
            .and(path(format!("/ipfs/{}", cid)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(data.to_vec()))
            .mount(&server)
            .await;

        let store = GatewayBlockStore::from_url(&server.uri()).unwrap();
        assert_eq!(store.get_block(&cid).await.unwrap().as_ref(), data);
        assert!(store.has_block(&cid).await.unwrap());
    }

    #[tokio::test]
    async fn test_gateway_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("\"not found\""))
            .mount(&server)
            .await;

        let store = GatewayBlockStore::from_url(&server.uri()).unwrap();
        let cid = create_cid(b"absent");
        assert!(matches!(
            store.get_block(&cid).await,
            Err(BlockStoreError::NotFound(_))
        ));
        assert!(!store.has_block(&cid).await.unwrap());
    }

    #[tokio::test]
    async fn test_gateway_is_read_only() {
        let store = GatewayBlockStore::from_url("http://127.0.0.1:1").unwrap();

        assert!(matches!(
            store.put_block(b"data").await,
            Err(BlockStoreError::ReadOnly(_))
        ));
        store.delete_block(&create_cid(b"data")).await.unwrap();
        store.clear().await.unwrap();
    }
}
