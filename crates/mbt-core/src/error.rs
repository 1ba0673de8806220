//! Error types for the mbt-core crate

use cid::Cid;
use thiserror::Error;

/// Result type alias using `TreeError`
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors that can occur in tree operations
///
/// A key that is not in the tree is not an error; lookups return `Ok(None)`.
#[derive(Error, Debug)]
pub enum TreeError {
    /// Storage backend failure, propagated unchanged
    #[error("storage error: {0}")]
    Storage(#[from] mbt_blockstore::BlockStoreError),

    /// Stored bytes do not decode into a well-formed node
    #[error("corrupt node {cid}: {reason}")]
    CorruptNode { cid: Cid, reason: String },

    /// Node could not be encoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Bulk load input out of order
    #[error("input not strictly ascending: {key:?} follows {previous:?}")]
    Unsorted { previous: String, key: String },

    /// Bulk load input entry is not a leaf entry
    #[error("invalid entry {0:?}: expected a key with a value and no child")]
    InvalidEntry(String),

    /// Handle string could not be parsed
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
}

impl TreeError {
    /// Build a corrupt-node error
    pub fn corrupt(cid: Cid, reason: impl Into<String>) -> Self {
        TreeError::CorruptNode {
            cid,
            reason: reason.into(),
        }
    }

    /// Whether this error is a missing block in storage
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TreeError::Storage(mbt_blockstore::BlockStoreError::NotFound(_))
        )
    }
}
