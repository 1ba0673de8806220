//! Bottom-up tree construction from a sorted list
//!
//! Each level is cut into chunks of at most `max_children` entries, every
//! chunk is committed once in key order, and one separator per chunk forms
//! the next level. The first failed write stops the build.
//! Building `n` entries costs O(n) block writes instead of `n` root-to-leaf
//! rewrites.

use super::node::{KeyEntry, Node};
use super::{Value, MIN_CHILDREN};
use crate::{Result, TreeError};
use mbt_blockstore::BlockStore;
use tracing::debug;

/// Build a committed tree from leaf entries in strictly ascending key order
///
/// Returns the root node. An empty list yields a committed empty leaf.
pub async fn from_sorted_list<V, S>(
    list: Vec<KeyEntry<V>>,
    max_children: usize,
    store: &S,
) -> Result<Node<V>>
where
    V: Value,
    S: BlockStore + ?Sized,
{
    let max_children = max_children.max(MIN_CHILDREN);
    check_input(&list)?;

    let mut level = list;
    let mut is_leaf_level = true;
    let mut depth = 0;

    while level.len() > max_children {
        let mut parents = Vec::with_capacity(level.len().div_ceil(max_children));
        let mut entries = level.into_iter().peekable();
        while entries.peek().is_some() {
            let chunk: Vec<_> = entries.by_ref().take(max_children).collect();
            let lower_key = chunk.first().map(|e| e.key.clone()).unwrap_or_default();
            let mut node = assemble(chunk, is_leaf_level);
            let hash = node.commit(store).await?;
            parents.push(KeyEntry::separator(lower_key, hash));
        }
        level = parents;

        depth += 1;
        debug!(depth, nodes = level.len(), "bulk load level committed");
        is_leaf_level = false;
    }

    let mut root = assemble(level, is_leaf_level);
    root.commit(store).await?;
    Ok(root)
}

/// Turn one chunk into a node; a branch chunk's first separator becomes its
/// zero entry
fn assemble<V: Value>(mut chunk: Vec<KeyEntry<V>>, is_leaf: bool) -> Node<V> {
    if is_leaf {
        return Node::new(None, chunk);
    }
    let left_child = chunk.first_mut().and_then(|first| {
        first.key.clear();
        first.child
    });
    Node::new(left_child, chunk)
}

fn check_input<V>(list: &[KeyEntry<V>]) -> Result<()> {
    if let Some(entry) = list
        .iter()
        .find(|e| e.value.is_none() || e.child.is_some())
    {
        return Err(TreeError::InvalidEntry(entry.key.clone()));
    }
    if let Some(pair) = list.windows(2).find(|w| w[0].key >= w[1].key) {
        return Err(TreeError::Unsorted {
            previous: pair[0].key.clone(),
            key: pair[1].key.clone(),
        });
    }
    Ok(())
}
