//! DAG-CBOR node encoding
//!
//! The encoded bytes are what gets hashed into a node's CID, so encoding must
//! be deterministic: equal nodes always produce equal bytes.

use super::node::{KeyEntry, Node};
use crate::{Result, TreeError};
use cid::Cid;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Wire form of a node, borrowed for encoding
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeRecordRef<'a, V: Serialize> {
    #[serde(with = "cid_serde::option")]
    left_child_handle: Option<Cid>,
    entries: &'a [KeyEntry<V>],
}

/// Wire form of a node, owned for decoding
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRecord<V> {
    #[serde(default, with = "cid_serde::option")]
    left_child_handle: Option<Cid>,
    entries: Vec<KeyEntry<V>>,
}

/// Encode a node to DAG-CBOR
pub fn encode_node<V: Serialize>(node: &Node<V>) -> Result<Vec<u8>> {
    let record = NodeRecordRef {
        left_child_handle: node.left_child,
        entries: &node.entries,
    };
    serde_ipld_dagcbor::to_vec(&record).map_err(|e| TreeError::Serialization(e.to_string()))
}

/// Decode a node fetched under `cid`, rejecting malformed structure
pub fn decode_node<V: DeserializeOwned>(bytes: &[u8], cid: Cid) -> Result<Node<V>> {
    let record: NodeRecord<V> = serde_ipld_dagcbor::from_slice(bytes)
        .map_err(|e| TreeError::corrupt(cid, e.to_string()))?;

    validate(record.left_child_handle, &record.entries)
        .map_err(|reason| TreeError::corrupt(cid, reason))?;

    Ok(Node {
        hash: Some(cid),
        left_child: record.left_child_handle,
        entries: record.entries,
    })
}

fn validate<V>(
    left_child: Option<Cid>,
    entries: &[KeyEntry<V>],
) -> std::result::Result<(), String> {
    if let Some(pair) = entries.windows(2).find(|w| w[0].key >= w[1].key) {
        return Err(format!(
            "keys out of order: {:?} before {:?}",
            pair[0].key, pair[1].key
        ));
    }

    if let Some(entry) = entries
        .iter()
        .find(|e| e.value.is_some() == e.child.is_some())
    {
        return Err(format!(
            "entry {:?} must carry exactly one of value or child",
            entry.key
        ));
    }

    let is_branch = entries.first().is_some_and(|e| e.child.is_some());
    if entries.iter().any(|e| e.child.is_some() != is_branch) {
        return Err("mixed leaf and separator entries".to_string());
    }

    match (is_branch, left_child) {
        (true, Some(left)) => {
            let zero = &entries[0];
            if !zero.key.is_empty() || zero.child != Some(left) {
                return Err("branch does not start with its zero entry".to_string());
            }
        }
        (true, None) => return Err("branch without a left child".to_string()),
        (false, Some(_)) => return Err("left child on a leaf".to_string()),
        (false, None) => {}
    }

    Ok(())
}

/// CIDs travel as their string form, matching the handle format
pub(crate) mod cid_serde {
    pub mod option {
        use cid::Cid;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S: Serializer>(cid: &Option<Cid>, s: S) -> Result<S::Ok, S::Error> {
            match cid {
                Some(c) => c.to_string().serialize(s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Cid>, D::Error> {
            let opt: Option<String> = Option::deserialize(d)?;
            match opt {
                Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
