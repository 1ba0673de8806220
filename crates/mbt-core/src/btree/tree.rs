//! Merkle B-tree orchestrator

use super::bulk;
use super::node::{KeyEntry, Node, PutResult, RangeQuery};
use super::{Value, DEFAULT_MAX_CHILDREN, MIN_CHILDREN};
use crate::{Result, TreeError};
use cid::Cid;
use mbt_blockstore::{parse_cid, BlockStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Configuration for tree shape
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeConfig {
    max_children: usize,
    /// Delete the nodes a `delete` superseded once the new root is in place
    release_superseded: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_children: DEFAULT_MAX_CHILDREN,
            release_superseded: true,
        }
    }
}

impl TreeConfig {
    /// Create a configuration; values below [`MIN_CHILDREN`] are clamped
    pub fn new(max_children: usize) -> Self {
        Self {
            max_children: max_children.max(MIN_CHILDREN),
            ..Self::default()
        }
    }

    /// Keep or release superseded nodes after a delete
    ///
    /// Turn this off when older roots, snapshots, or other trees share the
    /// store and must stay readable.
    pub fn with_release_superseded(mut self, release: bool) -> Self {
        self.release_superseded = release;
        self
    }

    /// Entry count at which a node splits
    pub fn max_children(&self) -> usize {
        self.max_children.max(MIN_CHILDREN)
    }

    /// Whether deletes release the nodes they superseded
    pub fn release_superseded(&self) -> bool {
        self.release_superseded
    }
}

/// A persistent key/value map over a content-addressed block store
///
/// Mutations take `&mut self` and replace the root; reads take `&self`.
/// Committed nodes never change and puts never remove blocks, so a
/// [`snapshot`](Self::snapshot) stays readable after later puts. Deletes
/// release the nodes they superseded unless
/// [`TreeConfig::with_release_superseded`] turns that off; older roots and
/// trees sharing the store only survive deletes with release turned off.
pub struct MerkleBTree<V, S: BlockStore> {
    /// The root node (always committed once any write happened)
    root: Arc<Node<V>>,
    /// Block store for persistence
    store: Arc<S>,
    /// Configuration
    config: TreeConfig,
}

impl<V, S> MerkleBTree<V, S>
where
    V: Value,
    S: BlockStore,
{
    /// Create a new empty tree
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, TreeConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(store: Arc<S>, config: TreeConfig) -> Self {
        Self::with_root(store, config, Node::new_leaf())
    }

    /// Wrap an existing root node
    pub fn with_root(store: Arc<S>, config: TreeConfig, root: Node<V>) -> Self {
        Self {
            root: Arc::new(root),
            store,
            config,
        }
    }

    /// Load a tree from an existing root CID
    ///
    /// Only the root is fetched; children load as traversals reach them.
    #[instrument(skip(store, config))]
    pub async fn load(store: Arc<S>, root_cid: Cid, config: TreeConfig) -> Result<Self> {
        let root = Node::load(store.as_ref(), &root_cid).await?;
        Ok(Self::with_root(store, config, root))
    }

    /// Load a tree from a handle string, plain or in `/ipfs/<cid>` form
    pub async fn load_path(store: Arc<S>, path: &str, config: TreeConfig) -> Result<Self> {
        let root_cid = parse_cid(path).map_err(|e| TreeError::InvalidHandle(e.to_string()))?;
        Self::load(store, root_cid, config).await
    }

    /// Build a tree from leaf entries in strictly ascending key order
    #[instrument(skip(list, store, config), fields(entries = list.len()))]
    pub async fn from_sorted_list(
        list: Vec<KeyEntry<V>>,
        store: Arc<S>,
        config: TreeConfig,
    ) -> Result<Self> {
        let root = bulk::from_sorted_list(list, config.max_children(), store.as_ref()).await?;
        Ok(Self::with_root(store, config, root))
    }

    /// Get the root node
    pub fn root(&self) -> &Node<V> {
        &self.root
    }

    /// Get a shared handle to the current root
    ///
    /// The handle reads through the same store, so it loses any node a later
    /// delete releases.
    pub fn snapshot(&self) -> Arc<Node<V>> {
        Arc::clone(&self.root)
    }

    /// Get the root CID, if committed
    pub fn root_hash(&self) -> Option<Cid> {
        self.root.hash().copied()
    }

    /// Get the block store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get the configuration
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Get a value by key
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<V>> {
        self.root.get(key, self.store.as_ref()).await
    }

    /// Insert or update a key, returning the new root CID
    #[instrument(skip(self, value))]
    pub async fn put(&mut self, key: &str, value: V) -> Result<Cid> {
        let store = self.store.as_ref();
        let root = Node::clone(&self.root);

        let mut new_root = match root
            .put(key.to_string(), value, store, self.config.max_children())
            .await?
        {
            PutResult::Updated(node) => node,
            PutResult::Split { left, separator } => {
                debug!(separator = %separator.key, "root split, growing tree");
                Node::new(Some(left), vec![separator])
            }
        };

        let root_cid = new_root.ensure_committed(store).await?;
        self.root = Arc::new(new_root);
        debug!(root = %root_cid, "root replaced");
        Ok(root_cid)
    }

    /// Remove a key, returning the new root CID
    ///
    /// Removing an absent key is not an error and leaves the root unchanged.
    /// Superseded nodes are only released after the new root is committed
    /// and in place, so a failed delete leaves the old root fully readable.
    #[instrument(skip(self))]
    pub async fn delete(&mut self, key: &str) -> Result<Cid> {
        let store = self.store.as_ref();
        let root = Node::clone(&self.root);

        let (mut new_root, superseded) = root.delete(key, store).await?;
        let root_cid = new_root.ensure_committed(store).await?;
        self.root = Arc::new(new_root);
        debug!(root = %root_cid, "root replaced");

        if self.config.release_superseded() {
            for cid in &superseded {
                if let Err(e) = store.delete_block(cid).await {
                    warn!(cid = %cid, error = %e, "failed to release superseded node");
                }
            }
        }
        Ok(root_cid)
    }

    /// Run a range query against the current root
    #[instrument(skip(self))]
    pub async fn query(&self, query: &RangeQuery) -> Result<Vec<(String, V)>> {
        self.root.search_range(query, self.store.as_ref()).await
    }

    /// Find keys starting with `prefix`, ascending
    pub async fn search(&self, prefix: &str, limit: Option<usize>) -> Result<Vec<(String, V)>> {
        let mut query = RangeQuery::new().with_prefix(prefix);
        query.limit = limit;
        self.query(&query).await
    }

    /// Paginated prefix search
    ///
    /// Pass the last key of the previous page as `cursor` to fetch the next.
    pub async fn search_text(
        &self,
        query: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
        reverse: bool,
    ) -> Result<Vec<(String, V)>> {
        self.query(&RangeQuery::text(query, limit, cursor, reverse))
            .await
    }

    /// Find keys between two optional bounds
    pub async fn search_range(
        &self,
        lower: Option<&str>,
        upper: Option<&str>,
        limit: Option<usize>,
        include_lower: bool,
        include_upper: bool,
        reverse: bool,
    ) -> Result<Vec<(String, V)>> {
        let query = RangeQuery {
            lower: lower.map(str::to_string),
            upper: upper.map(str::to_string),
            prefix: None,
            limit,
            include_lower,
            include_upper,
            reverse,
        };
        self.query(&query).await
    }

    /// Count entries over every node, separators included
    #[instrument(skip(self))]
    pub async fn size(&self) -> Result<usize> {
        self.root.size(self.store.as_ref()).await
    }

    /// Flatten all leaf entries in key order
    pub async fn to_sorted_list(&self) -> Result<Vec<KeyEntry<V>>> {
        self.root.to_sorted_list(self.store.as_ref()).await
    }

    /// Make sure the root is stored and return its CID
    pub async fn save(&mut self) -> Result<Cid> {
        if let Some(cid) = self.root.hash() {
            return Ok(*cid);
        }
        let mut root = Node::clone(&self.root);
        let cid = root.commit(self.store.as_ref()).await?;
        self.root = Arc::new(root);
        Ok(cid)
    }

    /// Render the whole tree as indented text
    pub async fn print(&self) -> Result<String>
    where
        V: fmt::Debug,
    {
        self.root.print(self.store.as_ref()).await
    }
}

impl<V, S: BlockStore> fmt::Debug for MerkleBTree<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerkleBTree")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish()
    }
}
