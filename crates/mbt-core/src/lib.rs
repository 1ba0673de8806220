//! # MBT Core
//!
//! A persistent, content-addressed B-tree ("Merkle B-tree").
//!
//! Nodes are immutable. Each one is serialized and stored under the hash of its
//! own bytes, so every mutation yields a new root hash while untouched subtrees
//! are shared between versions.
//!
//! This crate provides:
//! - **Nodes**: ordered entries, lookup, range/prefix search, insert with
//!   splitting, delete
//! - **Tree**: the public key/value API and root commit
//! - **Bulk loading**: bottom-up construction from a sorted list
//! - **Codec**: the DAG-CBOR node encoding that is hashed into each node's CID
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              MerkleBTree                │
//! ├──────────────────────┬──────────────────┤
//! │   Node algorithms    │   Bulk loader    │
//! ├──────────────────────┴──────────────────┤
//! │              Node codec                 │
//! ├─────────────────────────────────────────┤
//! │        BlockStore (mbt-blockstore)      │
//! └─────────────────────────────────────────┘
//! ```

pub mod btree;
pub mod error;

pub use btree::{
    KeyEntry, MerkleBTree, Node, PutResult, RangeQuery, TreeConfig, Value,
    DEFAULT_MAX_CHILDREN, MIN_CHILDREN,
};
pub use error::{Result, TreeError};
