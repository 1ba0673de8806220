//! # Merkle B-tree
//!
//! A persistent, content-addressed B-tree. Every node is stored under the hash
//! of its own bytes, so a single root CID names a complete, immutable version
//! of the map and unchanged subtrees are shared between versions.
//!
//! ```rust,ignore
//! use merkle_btree::{MemoryBlockStore, MerkleBTree, TreeConfig};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryBlockStore::new());
//! let mut tree = MerkleBTree::with_config(store, TreeConfig::new(10));
//! let root = tree.put("Satoshi", "Nakamoto".to_string()).await?;
//! assert_eq!(tree.get("Satoshi").await?, Some("Nakamoto".to_string()));
//! ```

pub use mbt_blockstore as blockstore;
pub use mbt_core as tree;

pub use mbt_blockstore::{
    BlockStore, BlockStoreError, CachedBlockStore, GatewayBlockStore, GatewayConfig,
    IpfsBlockStore, IpfsConfig, MemoryBlockStore,
};
pub use mbt_core::{
    KeyEntry, MerkleBTree, Node, PutResult, RangeQuery, TreeConfig, TreeError, Value,
    DEFAULT_MAX_CHILDREN, MIN_CHILDREN,
};
