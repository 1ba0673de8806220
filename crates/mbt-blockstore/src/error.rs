//! Error types for the mbt-blockstore crate

use cid::Cid;
use thiserror::Error;

/// Result type alias using `BlockStoreError`
pub type Result<T> = std::result::Result<T, BlockStoreError>;

/// Errors that can occur during block storage operations
#[derive(Error, Debug)]
pub enum BlockStoreError {
    /// Block not found
    #[error("block not found: {0}")]
    NotFound(Cid),

    /// Invalid CID
    #[error("invalid CID: {0}")]
    InvalidCid(String),

    /// IPFS API error
    #[error("IPFS API error: {0}")]
    IpfsApi(String),

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Timeout error
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Hash mismatch
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    /// Write attempted on a read-only backend
    #[error("store is read-only: {0}")]
    ReadOnly(String),

    /// HTTP error
    #[error("http error: {0}")]
    Http(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for BlockStoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BlockStoreError::Timeout(err.to_string())
        } else if err.is_connect() {
            BlockStoreError::Connection(err.to_string())
        } else {
            BlockStoreError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BlockStoreError {
    fn from(err: serde_json::Error) -> Self {
        BlockStoreError::IpfsApi(format!("malformed response: {}", err))
    }
}
