//! MST node wire format
//!
//! These mirror the DAG-CBOR encoding of MST nodes. Keys are prefix
//! compressed: each entry stores how many bytes it shares with the previous
//! key in the same node, followed by the rest of its key.

use bytes::Bytes;
use cid::Cid as IpldCid;

/// Wire format entry (prefix-compressed leaf with optional subtree pointer)
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TreeEntry {
    /// Key suffix after prefix
    ///
    /// Encoded as a CBOR byte string, not an array of integers.
    #[serde(rename = "k", with = "crate::commit::serde_bytes_helper")]
    pub key_suffix: Bytes,

    /// Count of key bytes shared with the previous entry in this node
    #[serde(rename = "p")]
    pub prefix_len: usize,

    /// Subtree holding keys between this entry and the next one
    #[serde(rename = "t")]
    pub tree: Option<IpldCid>,

    /// CID of the record value
    #[serde(rename = "v")]
    pub value: IpldCid,
}

/// Wire format node data
///
/// Entries are stored in ascending full-key order. `left` holds every key
/// that sorts before the first entry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeData {
    /// Left-most subtree pointer
    #[serde(rename = "l")]
    pub left: Option<IpldCid>,

    /// Entries in this node (sorted by full key, prefix-compressed)
    #[serde(rename = "e")]
    pub entries: Vec<TreeEntry>,
}

impl NodeData {
    /// Build a node from full keys, compressing each against the previous one
    ///
    /// Useful for assembling fixture repositories. `entries` must already be
    /// sorted.
    pub fn from_sorted(
        left: Option<IpldCid>,
        entries: impl IntoIterator<Item = (String, IpldCid, Option<IpldCid>)>,
    ) -> Self {
        let mut last_key = String::new();
        let entries = entries
            .into_iter()
            .map(|(key, value, tree)| {
                let prefix_len = last_key
                    .bytes()
                    .zip(key.bytes())
                    .take_while(|(a, b)| a == b)
                    .count();
                let entry = TreeEntry {
                    key_suffix: Bytes::copy_from_slice(&key.as_bytes()[prefix_len..]),
                    prefix_len,
                    tree,
                    value,
                };
                last_key = key;
                entry
            })
            .collect();

        Self { left, entries }
    }
}
