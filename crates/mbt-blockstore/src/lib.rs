//! # MBT Blockstore
//!
//! Content-addressed block storage for the Merkle B-tree.
//!
//! This crate provides:
//! - **Storage contract**: the [`BlockStore`] trait every backend implements
//! - **CID generation**: CIDv1 handles over BLAKE3-256, identical across backends
//! - **Memory store**: a map-backed store for tests and embedded use
//! - **IPFS store**: read/write access through the IPFS HTTP API
//! - **Gateway store**: read-only access through an IPFS HTTP gateway
//! - **Caching**: an LRU read cache wrapping any store
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Merkle B-tree (mbt-core)       │
//! ├─────────────────────────────────────────┤
//! │           BlockStore Trait              │
//! ├─────────────┬─────────────┬─────────────┤
//! │ MemoryStore │  IpfsStore  │GatewayStore │
//! ├─────────────┴─────────────┴─────────────┤
//! │           IPFS node / gateway           │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use mbt_blockstore::{BlockStore, MemoryBlockStore};
//!
//! let store = MemoryBlockStore::new();
//! let cid = store.put_block(b"hello").await?;
//! let data = store.get_block(&cid).await?;
//! ```

pub mod cid_utils;
pub mod error;
pub mod gateway;
pub mod ipfs;
pub mod memory;

pub use cid_utils::{create_cid, parse_cid, verify_cid};
pub use error::{BlockStoreError, Result};
pub use gateway::{GatewayBlockStore, GatewayConfig};
pub use ipfs::{IpfsBlockStore, IpfsConfig};
pub use memory::{CachedBlockStore, MemoryBlockStore};

use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use std::sync::Arc;

/// Trait for content-addressed block storage backends
///
/// `put_block` must be deterministic: the same bytes always map to the same
/// CID, so storing identical content twice never creates a second copy.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Store a block and return its CID
    async fn put_block(&self, data: &[u8]) -> Result<Cid>;

    /// Retrieve a block by CID
    ///
    /// Fails with [`BlockStoreError::NotFound`] when the block is absent.
    async fn get_block(&self, cid: &Cid) -> Result<Bytes>;

    /// Check if a block exists
    async fn has_block(&self, cid: &Cid) -> Result<bool>;

    /// Delete a block (best-effort; append-only backends may ignore it)
    async fn delete_block(&self, cid: &Cid) -> Result<()>;

    /// Drop every stored block where the backend supports it
    async fn clear(&self) -> Result<()>;
}

#[async_trait]
impl<S: BlockStore + ?Sized> BlockStore for Arc<S> {
    async fn put_block(&self, data: &[u8]) -> Result<Cid> {
        (**self).put_block(data).await
    }

    async fn get_block(&self, cid: &Cid) -> Result<Bytes> {
        (**self).get_block(cid).await
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool> {
        (**self).has_block(cid).await
    }

    async fn delete_block(&self, cid: &Cid) -> Result<()> {
        (**self).delete_block(cid).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }
}
