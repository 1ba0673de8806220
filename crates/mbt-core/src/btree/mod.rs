//! Merkle B-tree implementation
//!
//! A Merkle B-tree combines properties of B-Trees and Merkle Trees:
//! - Ordered keys with a bounded number of entries per node
//! - Children referenced by the CID of their serialized bytes
//! - Copy-on-write: every mutation rewrites the path to the root
//! - Unchanged subtrees are shared between versions

mod bulk;
mod codec;
mod node;
mod tree;

pub use bulk::from_sorted_list;
pub use codec::{decode_node, encode_node};
pub use node::{KeyEntry, Node, PutResult, RangeQuery};
pub use tree::{MerkleBTree, TreeConfig};

use serde::{de::DeserializeOwned, Serialize};

/// Default maximum entries per node before a split
pub const DEFAULT_MAX_CHILDREN: usize = 10;

/// Smallest accepted branching factor; lower values are clamped to it
pub const MIN_CHILDREN: usize = 2;

/// Values storable in a tree
///
/// A value must not serialize to null (e.g. `()` or `None`): stored entries
/// tell leaf values from separators by which field is present.
pub trait Value: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}
