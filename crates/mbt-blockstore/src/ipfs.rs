//! IPFS HTTP API client for block operations

use crate::cid_utils::{create_cid, verify_cid};
use crate::{BlockStore, BlockStoreError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Configuration for IPFS connection
#[derive(Clone, Debug)]
pub struct IpfsConfig {
    /// IPFS API URL (e.g., "http://localhost:5001")
    pub api_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Check fetched bytes against the requested CID
    pub verify_hashes: bool,
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5001".to_string(),
            timeout: Duration::from_secs(30),
            verify_hashes: true,
        }
    }
}

impl IpfsConfig {
    /// Create with a custom API URL
    pub fn with_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v0/{}", self.api_url.trim_end_matches('/'), path)
    }
}

/// IPFS block store client
///
/// Blocks are written with `cid-codec=raw&mhtype=blake3`, so the node hands
/// back the same CID [`create_cid`] computes locally.
#[derive(Clone)]
pub struct IpfsBlockStore {
    client: Client,
    config: IpfsConfig,
}

impl IpfsBlockStore {
    /// Create a new IPFS block store
    pub async fn new(config: IpfsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BlockStoreError::Configuration(e.to_string()))?;

        let store = Self { client, config };

        store.verify_connection().await?;

        Ok(store)
    }

    /// Create from URL string
    pub async fn from_url(url: &str) -> Result<Self> {
        Self::new(IpfsConfig::with_url(url)).await
    }

    /// Get the configuration
    pub fn config(&self) -> &IpfsConfig {
        &self.config
    }

    /// Verify connection to IPFS
    pub async fn verify_connection(&self) -> Result<()> {
        let response = self
            .client
            .post(self.config.endpoint("id"))
            .send()
            .await
            .map_err(|e| BlockStoreError::Connection(format!("failed to connect to IPFS: {}", e)))?;

        if !response.status().is_success() {
            return Err(BlockStoreError::Connection(format!(
                "IPFS node answered {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Get block stat (size)
    pub async fn block_stat(&self, cid: &Cid) -> Result<BlockStat> {
        let url = format!("{}?arg={}", self.config.endpoint("block/stat"), cid);
        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            if is_missing_block(status, &error) {
                return Err(BlockStoreError::NotFound(*cid));
            }
            return Err(BlockStoreError::IpfsApi(format!(
                "failed to get block stat: {}",
                error
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl BlockStore for IpfsBlockStore {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn put_block(&self, data: &[u8]) -> Result<Cid> {
        let url = format!(
            "{}?cid-codec=raw&mhtype=blake3",
            self.config.endpoint("block/put")
        );

        let part = multipart::Part::bytes(data.to_vec())
            .file_name("data")
            .mime_str("application/octet-stream")
            .map_err(|e| BlockStoreError::IpfsApi(e.to_string()))?;

        let form = multipart::Form::new().part("data", part);

        let response = self.client.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(BlockStoreError::IpfsApi(format!(
                "failed to put block: {}",
                error
            )));
        }

        let body = response.text().await?;
        let result: BlockPutResponse = serde_json::from_str(&body)?;
        let cid: Cid = result
            .key
            .parse()
            .map_err(|e: cid::Error| BlockStoreError::InvalidCid(e.to_string()))?;

        if self.config.verify_hashes {
            let expected = create_cid(data);
            if expected != cid {
                return Err(BlockStoreError::HashMismatch {
                    expected: expected.to_string(),
                    actual: cid.to_string(),
                });
            }
        }

        debug!(cid = %cid, "stored block");
        Ok(cid)
    }

    #[instrument(skip(self))]
    async fn get_block(&self, cid: &Cid) -> Result<Bytes> {
        let url = format!("{}?arg={}", self.config.endpoint("block/get"), cid);
        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            if is_missing_block(status, &error) {
                return Err(BlockStoreError::NotFound(*cid));
            }
            return Err(BlockStoreError::IpfsApi(format!(
                "failed to get block: {}",
                error
            )));
        }

        let bytes = response.bytes().await?;

        if self.config.verify_hashes && !verify_cid(&bytes, cid) {
            return Err(BlockStoreError::HashMismatch {
                expected: cid.to_string(),
                actual: create_cid(&bytes).to_string(),
            });
        }

        debug!(bytes_len = bytes.len(), "fetched block");
        Ok(bytes)
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool> {
        match self.block_stat(cid).await {
            Ok(_) => Ok(true),
            Err(BlockStoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn delete_block(&self, cid: &Cid) -> Result<()> {
        let url = format!("{}?arg={}", self.config.endpoint("block/rm"), cid);
        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(BlockStoreError::IpfsApi(format!(
                "failed to remove block: {}",
                error
            )));
        }

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        // Unpinned blocks are reclaimed by the node's own garbage collector.
        Ok(())
    }
}

/// Kubo reports a missing block as a 500 whose message says it was not found
fn is_missing_block(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::NOT_FOUND {
        return true;
    }
    let body = body.to_ascii_lowercase();
    body.contains("not found") || body.contains("could not find")
}

/// Response from /api/v0/block/put
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockPutResponse {
    pub key: String,
    pub size: u64,
}

/// Block statistics
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockStat {
    pub key: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_node() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/id"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_config_default() {
        let config = IpfsConfig::default();
        assert_eq!(config.api_url, "http://localhost:5001");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.verify_hashes);
    }

    #[test]
    fn test_config_endpoint() {
        let config = IpfsConfig::with_url("http://custom:5001/");
        assert_eq!(config.endpoint("block/get"), "http://custom:5001/api/v0/block/get");
    }

    #[tokio::test]
    async fn test_put_block() {
        let server = mock_node().await;
        let data = b"node bytes";
        let cid = create_cid(data);

        Mock::given(method("POST"))
            .and(path("/api/v0/block/put"))
            .and(query_param("mhtype", "blake3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!(r#"{{"Key":"{}","Size":{}}}"#, cid, data.len())),
            )
            .mount(&server)
            .await;

        let store = IpfsBlockStore::from_url(&server.uri()).await.unwrap();
        assert_eq!(store.put_block(data).await.unwrap(), cid);
    }

    #[tokio::test]
    async fn test_put_block_rejects_foreign_cid() {
        let server = mock_node().await;
        let other = create_cid(b"something else");

        Mock::given(method("POST"))
            .and(path("/api/v0/block/put"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!(r#"{{"Key":"{}","Size":1}}"#, other)),
            )
            .mount(&server)
            .await;

        let store = IpfsBlockStore::from_url(&server.uri()).await.unwrap();
        let result = store.put_block(b"node bytes").await;
        assert!(matches!(result, Err(BlockStoreError::HashMismatch { .. })));
    }

    #[tokio::test]
    async fn test_get_block_and_missing() {
        let server = mock_node().await;
        let data = b"stored block";
        let cid = create_cid(data);
        let missing = create_cid(b"missing");

        Mock::given(method("POST"))
            .and(path("/api/v0/block/get"))
            .and(query_param("arg", cid.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(data.to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v0/block/stat"))
            .and(query_param("arg", missing.to_string()))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = IpfsBlockStore::from_url(&server.uri()).await.unwrap();
        assert_eq!(store.get_block(&cid).await.unwrap().as_ref(), data);
        assert!(!store.has_block(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn test_kubo_missing_block_is_not_found() {
        let server = mock_node().await;
        let missing = create_cid(b"never added");
        let kubo_error = format!(
            r#"{{"Message":"block was not found locally (offline): ipld: could not find {}","Code":0,"Type":"error"}}"#,
            missing
        );

        Mock::given(method("POST"))
            .and(path("/api/v0/block/get"))
            .respond_with(ResponseTemplate::new(500).set_body_string(kubo_error.clone()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v0/block/stat"))
            .respond_with(ResponseTemplate::new(500).set_body_string(kubo_error))
            .mount(&server)
            .await;

        let store = IpfsBlockStore::from_url(&server.uri()).await.unwrap();
        let result = store.get_block(&missing).await;
        assert!(matches!(result, Err(BlockStoreError::NotFound(cid)) if cid == missing));
        assert!(!store.has_block(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn test_other_server_errors_stay_api_errors() {
        let server = mock_node().await;
        let cid = create_cid(b"some block");

        Mock::given(method("POST"))
            .and(path("/api/v0/block/get"))
            .respond_with(ResponseTemplate::new(500).set_body_string("repo lock held by another process"))
            .mount(&server)
            .await;

        let store = IpfsBlockStore::from_url(&server.uri()).await.unwrap();
        let result = store.get_block(&cid).await;
        assert!(matches!(result, Err(BlockStoreError::IpfsApi(_))));
    }

    #[tokio::test]
    async fn test_get_block_detects_tampering() {
        let server = mock_node().await;
        let cid = create_cid(b"original");

        Mock::given(method("POST"))
            .and(path("/api/v0/block/get"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tampered".to_vec()))
            .mount(&server)
            .await;

        let store = IpfsBlockStore::from_url(&server.uri()).await.unwrap();
        let result = store.get_block(&cid).await;
        assert!(matches!(result, Err(BlockStoreError::HashMismatch { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_node() {
        let config = IpfsConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_millis(500),
            verify_hashes: true,
        };
        assert!(IpfsBlockStore::new(config).await.is_err());
    }
}
