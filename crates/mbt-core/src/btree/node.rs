//! Merkle B-tree node types and algorithms
//!
//! A node is an immutable, sorted run of entries. Leaf nodes hold values;
//! branch nodes hold separators pointing at child CIDs, led by a zero entry
//! (key `""`) for the leftmost child. Every mutation consumes a node and
//! returns a freshly committed one.

use super::codec::{decode_node, encode_node};
use super::Value;
use crate::Result;
use cid::Cid;
use futures::future::BoxFuture;
use mbt_blockstore::BlockStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::ControlFlow;
use tracing::debug;

/// An entry in a node: a leaf value or a separator linking to a child
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "V: Deserialize<'de>"))]
pub struct KeyEntry<V> {
    /// The key (for separators: the smallest key reachable through `child`)
    pub key: String,
    /// The value, set on leaf entries only
    #[serde(default)]
    pub value: Option<V>,
    /// The child node, set on separator entries only
    #[serde(
        rename = "childHandle",
        default,
        with = "crate::btree::codec::cid_serde::option"
    )]
    pub child: Option<Cid>,
}

impl<V> KeyEntry<V> {
    /// Create a leaf entry
    pub fn leaf(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
            child: None,
        }
    }

    /// Create a separator entry
    pub fn separator(key: impl Into<String>, child: Cid) -> Self {
        Self {
            key: key.into(),
            value: None,
            child: Some(child),
        }
    }

    /// Check if this is a separator
    pub fn is_separator(&self) -> bool {
        self.child.is_some()
    }
}

/// Outcome of inserting into a node
///
/// A split is returned uncommitted at the parent level: the parent (or the
/// tree, at the root) must absorb it.
#[derive(Clone, Debug)]
pub enum PutResult<V> {
    /// The node absorbed the write and was committed
    Updated(Node<V>),
    /// The node overflowed and was split into two committed siblings
    Split {
        /// CID of the left sibling
        left: Cid,
        /// Separator for the right sibling, keyed by the promoted median
        separator: KeyEntry<V>,
    },
}

/// Bounds, prefix and direction for a range scan
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeQuery {
    /// Lower bound (absent: unbounded)
    pub lower: Option<String>,
    /// Upper bound (absent: unbounded)
    pub upper: Option<String>,
    /// Keys must start with this prefix
    pub prefix: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
    /// Whether the lower bound itself matches
    pub include_lower: bool,
    /// Whether the upper bound itself matches
    pub include_upper: bool,
    /// Scan in descending key order
    pub reverse: bool,
}

impl Default for RangeQuery {
    fn default() -> Self {
        Self {
            lower: None,
            upper: None,
            prefix: None,
            limit: None,
            include_lower: true,
            include_upper: true,
            reverse: false,
        }
    }
}

impl RangeQuery {
    /// An unbounded ascending scan
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix search with cursor pagination
    ///
    /// Without a cursor the scan covers `[query, +inf)`, or `(-inf, query]`
    /// when reversed. A cursor (the last key of the previous page) becomes the
    /// exclusive bound the scan resumes from.
    pub fn text(query: &str, limit: Option<usize>, cursor: Option<&str>, reverse: bool) -> Self {
        let query_default = Self::new().with_prefix(query).with_reverse(reverse);
        let query_default = match limit {
            Some(limit) => query_default.with_limit(limit),
            None => query_default,
        };
        match (cursor, reverse) {
            (None, false) => query_default.with_lower(query, true),
            (None, true) => query_default.with_upper(query, true),
            (Some(cursor), false) => query_default.with_lower(cursor, false),
            (Some(cursor), true) => query_default.with_upper(cursor, false),
        }
    }

    /// Set the lower bound
    pub fn with_lower(mut self, lower: impl Into<String>, inclusive: bool) -> Self {
        self.lower = Some(lower.into());
        self.include_lower = inclusive;
        self
    }

    /// Set the upper bound
    pub fn with_upper(mut self, upper: impl Into<String>, inclusive: bool) -> Self {
        self.upper = Some(upper.into());
        self.include_upper = inclusive;
        self
    }

    /// Restrict results to keys starting with `prefix`
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Cap the number of results
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the scan direction
    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    fn within_lower(&self, key: &str) -> bool {
        match &self.lower {
            Some(lower) if self.include_lower => key >= lower.as_str(),
            Some(lower) => key > lower.as_str(),
            None => true,
        }
    }

    fn within_upper(&self, key: &str) -> bool {
        match &self.upper {
            Some(upper) if self.include_upper => key <= upper.as_str(),
            Some(upper) => key < upper.as_str(),
            None => true,
        }
    }

    /// Whether `key` satisfies every predicate
    pub fn matches(&self, key: &str) -> bool {
        self.within_lower(key)
            && self.within_upper(key)
            && self.prefix.as_deref().map_or(true, |p| key.starts_with(p))
    }

    /// `key` and every greater key fail the query
    fn above_range(&self, key: &str) -> bool {
        !self.within_upper(key)
            || self
                .prefix
                .as_deref()
                .is_some_and(|p| key > p && !key.starts_with(p))
    }

    /// `key` and every smaller key fail the query
    fn below_range(&self, key: &str) -> bool {
        !self.within_lower(key) || self.prefix.as_deref().is_some_and(|p| key < p)
    }

    /// Every key strictly less than `bound` fails the query
    fn below_bound(&self, bound: &str) -> bool {
        self.lower.as_deref().is_some_and(|l| bound <= l)
            || self.prefix.as_deref().is_some_and(|p| bound <= p)
    }

    fn is_full(&self, collected: usize) -> bool {
        self.limit.is_some_and(|limit| collected >= limit)
    }
}

/// Where a lookup goes next from one node
enum Lookup<'a, V> {
    Done(Option<&'a V>),
    Descend(Cid),
}

/// A node in the Merkle B-tree
#[derive(Clone)]
pub struct Node<V> {
    /// CID of the stored bytes; `None` until committed
    pub(crate) hash: Option<Cid>,
    /// Leftmost child of a branch node
    pub(crate) left_child: Option<Cid>,
    /// Sorted entries
    pub(crate) entries: Vec<KeyEntry<V>>,
}

impl<V: Value> Node<V> {
    /// Create a new empty leaf node
    pub fn new_leaf() -> Self {
        Self {
            hash: None,
            left_child: None,
            entries: Vec::new(),
        }
    }

    /// Create an uncommitted node
    ///
    /// Entries are sorted by key; callers must not pass duplicate keys. With a
    /// `left_child`, the zero entry is prepended unless already present.
    pub fn new(left_child: Option<Cid>, mut entries: Vec<KeyEntry<V>>) -> Self {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        if let Some(cid) = left_child {
            if entries.first().map_or(true, |e| !e.key.is_empty()) {
                entries.insert(0, KeyEntry::separator(String::new(), cid));
            }
        }
        Self {
            hash: None,
            left_child,
            entries,
        }
    }

    /// Get the CID, if committed
    pub fn hash(&self) -> Option<&Cid> {
        self.hash.as_ref()
    }

    /// Get the leftmost child of a branch node
    pub fn left_child(&self) -> Option<&Cid> {
        self.left_child.as_ref()
    }

    /// Get the entries
    pub fn entries(&self) -> &[KeyEntry<V>] {
        &self.entries
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the node has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if this is a branch node
    pub fn is_branch(&self) -> bool {
        self.entries.first().is_some_and(KeyEntry::is_separator)
    }

    /// Check if this is a leaf node
    pub fn is_leaf(&self) -> bool {
        !self.is_branch()
    }

    /// Fetch and decode a node
    pub async fn load<S>(store: &S, cid: &Cid) -> Result<Self>
    where
        S: BlockStore + ?Sized,
    {
        let bytes = store.get_block(cid).await?;
        decode_node(&bytes, *cid)
    }

    /// Serialize and store this node, recording its CID
    pub async fn commit<S>(&mut self, store: &S) -> Result<Cid>
    where
        S: BlockStore + ?Sized,
    {
        let bytes = encode_node(self)?;
        let cid = store.put_block(&bytes).await?;
        debug!(cid = %cid, entries = self.entries.len(), bytes = bytes.len(), "committed node");
        self.hash = Some(cid);
        Ok(cid)
    }

    /// Commit unless already committed
    pub async fn ensure_committed<S>(&mut self, store: &S) -> Result<Cid>
    where
        S: BlockStore + ?Sized,
    {
        match self.hash {
            Some(cid) => Ok(cid),
            None => self.commit(store).await,
        }
    }

    /// Index of the last entry whose key is `<= key`
    fn floor_index(&self, key: &str) -> Option<usize> {
        self.entries
            .partition_point(|e| e.key.as_str() <= key)
            .checked_sub(1)
    }

    /// Floor entry index and child, when the floor entry is a separator
    fn floor_child(&self, key: &str) -> Option<(usize, Cid)> {
        self.floor_index(key)
            .and_then(|index| self.entries[index].child.map(|cid| (index, cid)))
    }

    fn set_child(&mut self, index: usize, child: Option<Cid>) {
        self.entries[index].child = child;
        if index == 0 {
            self.left_child = child;
        }
    }

    fn lookup(&self, key: &str) -> Lookup<'_, V> {
        match self.floor_index(key).map(|index| &self.entries[index]) {
            Some(KeyEntry {
                child: Some(cid), ..
            }) => Lookup::Descend(*cid),
            Some(entry) if entry.key == key => Lookup::Done(entry.value.as_ref()),
            _ => Lookup::Done(None),
        }
    }

    /// Look up a key, descending through children as needed
    pub async fn get<S>(&self, key: &str, store: &S) -> Result<Option<V>>
    where
        S: BlockStore + ?Sized,
    {
        let mut next = match self.lookup(key) {
            Lookup::Done(value) => return Ok(value.cloned()),
            Lookup::Descend(cid) => cid,
        };
        loop {
            let node = Self::load(store, &next).await?;
            match node.lookup(key) {
                Lookup::Done(value) => return Ok(value.cloned()),
                Lookup::Descend(cid) => next = cid,
            }
        }
    }

    /// Insert or replace a key, returning the committed node or a split
    pub fn put<'a, S>(
        self,
        key: String,
        value: V,
        store: &'a S,
        max_children: usize,
    ) -> BoxFuture<'a, Result<PutResult<V>>>
    where
        S: BlockStore + ?Sized,
    {
        Box::pin(async move {
            let mut node = self;
            node.hash = None;

            if let Some((index, child_cid)) = node.floor_child(&key) {
                let child = Self::load(store, &child_cid).await?;
                match child.put(key, value, store, max_children).await? {
                    PutResult::Updated(child) => {
                        debug_assert!(child.hash.is_some());
                        node.set_child(index, child.hash);
                        node.commit(store).await?;
                        return Ok(PutResult::Updated(node));
                    }
                    PutResult::Split { left, separator } => {
                        node.set_child(index, Some(left));
                        let at = node
                            .entries
                            .partition_point(|e| e.key.as_str() < separator.key.as_str());
                        node.entries.insert(at, separator);
                    }
                }
            } else {
                match node
                    .entries
                    .binary_search_by(|e| e.key.as_str().cmp(key.as_str()))
                {
                    Ok(index) => {
                        node.entries[index].value = Some(value);
                        node.commit(store).await?;
                        return Ok(PutResult::Updated(node));
                    }
                    Err(index) => node.entries.insert(index, KeyEntry::leaf(key, value)),
                }
            }

            if node.entries.len() >= max_children {
                node.split(store).await
            } else {
                node.commit(store).await?;
                Ok(PutResult::Updated(node))
            }
        })
    }

    /// Split an overflowing node around its median entry
    ///
    /// Both halves are committed. For a branch node the median's child becomes
    /// the right sibling's leftmost child, so the median separator itself is
    /// only kept as the promoted key.
    async fn split<S>(self, store: &S) -> Result<PutResult<V>>
    where
        S: BlockStore + ?Sized,
    {
        let is_branch = self.is_branch();
        let Node {
            left_child,
            entries: mut left_entries,
            ..
        } = self;

        let median_index = left_entries.len() / 2;
        let mut right_entries = left_entries.split_off(median_index);

        let (separator_key, mut right) = if is_branch {
            let median = right_entries.remove(0);
            (median.key, Node::new(median.child, right_entries))
        } else {
            let key = right_entries
                .first()
                .map(|e| e.key.clone())
                .unwrap_or_default();
            (key, Node::new(None, right_entries))
        };

        let mut left = Node {
            hash: None,
            left_child: if is_branch { left_child } else { None },
            entries: left_entries,
        };

        let left_hash = left.commit(store).await?;
        let right_hash = right.commit(store).await?;
        debug!(
            median = %separator_key,
            left = %left_hash,
            right = %right_hash,
            "split node"
        );

        Ok(PutResult::Split {
            left: left_hash,
            separator: KeyEntry::separator(separator_key, right_hash),
        })
    }

    /// Remove a key, returning the recommitted node and the CIDs it superseded
    ///
    /// Nothing is deleted from the store here; the caller decides whether the
    /// superseded children can be released once the new root is in place.
    /// Underfull nodes are left as they are.
    pub fn delete<'a, S>(
        self,
        key: &'a str,
        store: &'a S,
    ) -> BoxFuture<'a, Result<(Node<V>, Vec<Cid>)>>
    where
        S: BlockStore + ?Sized,
    {
        Box::pin(async move {
            let mut node = self;
            let mut changed = false;
            let mut superseded = Vec::new();

            if let Some((index, child_cid)) = node.floor_child(key) {
                let (child, below) = Self::load(store, &child_cid).await?.delete(key, store).await?;
                if child.hash != Some(child_cid) {
                    node.set_child(index, child.hash);
                    superseded = below;
                    superseded.push(child_cid);
                    changed = true;
                }
            } else if let Some(index) = node.floor_index(key) {
                if node.entries[index].key == key {
                    node.entries.remove(index);
                    changed = true;
                }
            }

            if changed {
                node.hash = None;
            }
            node.ensure_committed(store).await?;
            Ok((node, superseded))
        })
    }

    /// Collect entries within `query`, in scan order
    pub async fn search_range<S>(&self, query: &RangeQuery, store: &S) -> Result<Vec<(String, V)>>
    where
        S: BlockStore + ?Sized,
    {
        let mut results = Vec::new();
        if query.limit != Some(0) {
            self.collect_range(query, store, &mut results).await?;
        }
        Ok(results)
    }

    fn collect_range<'a, S>(
        &'a self,
        query: &'a RangeQuery,
        store: &'a S,
        out: &'a mut Vec<(String, V)>,
    ) -> BoxFuture<'a, Result<ControlFlow<()>>>
    where
        S: BlockStore + ?Sized,
    {
        Box::pin(async move {
            let count = self.entries.len();
            for step in 0..count {
                let index = if query.reverse { count - 1 - step } else { step };
                let entry = &self.entries[index];

                match entry.child {
                    Some(child_cid) => {
                        // The child covers [entry.key, next.key)
                        let next_key = self.entries.get(index + 1).map(|e| e.key.as_str());
                        let entirely_below = next_key.is_some_and(|k| query.below_bound(k));
                        if query.reverse {
                            if entirely_below {
                                return Ok(ControlFlow::Break(()));
                            }
                            if query.above_range(&entry.key) {
                                continue;
                            }
                        } else {
                            if query.above_range(&entry.key) {
                                return Ok(ControlFlow::Break(()));
                            }
                            if entirely_below {
                                continue;
                            }
                        }

                        let child = Self::load(store, &child_cid).await?;
                        if child.collect_range(query, store, out).await?.is_break() {
                            return Ok(ControlFlow::Break(()));
                        }
                    }
                    None => {
                        let passed = if query.reverse {
                            query.below_range(&entry.key)
                        } else {
                            query.above_range(&entry.key)
                        };
                        if passed {
                            return Ok(ControlFlow::Break(()));
                        }

                        if query.matches(&entry.key) {
                            if let Some(value) = &entry.value {
                                out.push((entry.key.clone(), value.clone()));
                            }
                            if query.is_full(out.len()) {
                                return Ok(ControlFlow::Break(()));
                            }
                        }
                    }
                }
            }
            Ok(ControlFlow::Continue(()))
        })
    }

    /// Count entries in every reachable node
    ///
    /// This is a structural count: separators (including zero entries) are
    /// counted alongside leaf keys, so it is at least the number of keys.
    pub fn size<'a, S>(&'a self, store: &'a S) -> BoxFuture<'a, Result<usize>>
    where
        S: BlockStore + ?Sized,
    {
        Box::pin(async move {
            let mut total = self.entries.len();
            for child_cid in self.entries.iter().filter_map(|e| e.child) {
                let child = Self::load(store, &child_cid).await?;
                total += child.size(store).await?;
            }
            Ok(total)
        })
    }

    /// Flatten every leaf entry in key order
    pub async fn to_sorted_list<S>(&self, store: &S) -> Result<Vec<KeyEntry<V>>>
    where
        S: BlockStore + ?Sized,
    {
        let mut result = Vec::new();
        self.collect_entries(store, &mut result).await?;
        Ok(result)
    }

    fn collect_entries<'a, S>(
        &'a self,
        store: &'a S,
        out: &'a mut Vec<KeyEntry<V>>,
    ) -> BoxFuture<'a, Result<()>>
    where
        S: BlockStore + ?Sized,
    {
        Box::pin(async move {
            for entry in &self.entries {
                match entry.child {
                    Some(child_cid) => {
                        let child = Self::load(store, &child_cid).await?;
                        child.collect_entries(store, out).await?;
                    }
                    None => out.push(entry.clone()),
                }
            }
            Ok(())
        })
    }

    /// Render this node and its subtree as indented text
    pub async fn print<S>(&self, store: &S) -> Result<String>
    where
        S: BlockStore + ?Sized,
        V: fmt::Debug,
    {
        let mut out = String::new();
        self.render(store, 0, &mut out).await?;
        Ok(out)
    }

    fn render<'a, S>(
        &'a self,
        store: &'a S,
        depth: usize,
        out: &'a mut String,
    ) -> BoxFuture<'a, Result<()>>
    where
        S: BlockStore + ?Sized,
        V: fmt::Debug,
    {
        Box::pin(async move {
            let indent = "- ".repeat(depth + 1);
            match &self.hash {
                Some(cid) => out.push_str(&format!("node: {}\n", cid)),
                None => out.push_str("node: (uncommitted)\n"),
            }
            for entry in &self.entries {
                out.push_str(&format!("{}key: {}", indent, entry.key));
                if let Some(child) = &entry.child {
                    out.push_str(&format!(" link: {}", child));
                }
                if let Some(value) = &entry.value {
                    out.push_str(&format!("\n{}   value: {:?}", indent, value));
                }
                out.push('\n');
            }
            for child_cid in self.entries.iter().filter_map(|e| e.child) {
                let child = Self::load(store, &child_cid).await?;
                out.push('\n');
                out.push_str(&indent);
                child.render(store, depth + 1, out).await?;
            }
            Ok(())
        })
    }
}

impl<V> fmt::Debug for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("hash", &self.hash)
            .field("is_branch", &self.entries.first().is_some_and(|e| e.child.is_some()))
            .field("entries_count", &self.entries.len())
            .finish()
    }
}

impl<V: Value> Default for Node<V> {
    fn default() -> Self {
        Self::new_leaf()
    }
}
