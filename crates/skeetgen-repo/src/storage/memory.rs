//! In-memory block storage implementation

use crate::error::Result;
use crate::storage::{BlockStore, VerifyPolicy};
use bytes::Bytes;
use cid::Cid as IpldCid;
use std::collections::BTreeMap;

/// In-memory block storage using BTreeMap
///
/// Populated once from a CAR and read-only for the rest of a walk. With
/// [`VerifyPolicy::Trust`] (the default) no integrity check is made; with
/// [`VerifyPolicy::Verify`] every read recomputes the block's hash.
///
/// Uses `Bytes` for efficient reference-counted storage with cheap cloning.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlockStore {
    blocks: BTreeMap<IpldCid, Bytes>,
    verify: VerifyPolicy,
}

impl MemoryBlockStore {
    /// Create new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create new memory store from a map of blocks
    pub fn new_from_blocks(blocks: BTreeMap<IpldCid, Bytes>) -> Self {
        Self {
            blocks,
            verify: VerifyPolicy::default(),
        }
    }

    /// Set the verification policy used on reads
    pub fn with_verify(mut self, verify: VerifyPolicy) -> Self {
        self.verify = verify;
        self
    }

    /// Current verification policy
    pub fn verify_policy(&self) -> VerifyPolicy {
        self.verify
    }

    /// Store a block under the CID it was given
    pub fn insert(&mut self, cid: IpldCid, data: impl Into<Bytes>) {
        self.blocks.insert(cid, data.into());
    }

    /// Get number of blocks stored
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockStore for MemoryBlockStore {
    async fn get(&self, cid: &IpldCid) -> Result<Option<Bytes>> {
        let Some(data) = self.blocks.get(cid) else {
            return Ok(None);
        };

        if self.verify == VerifyPolicy::Verify {
            crate::mst::util::verify_cid(cid, data)?;
        }

        Ok(Some(data.clone()))
    }

    async fn has(&self, cid: &IpldCid) -> Result<bool> {
        Ok(self.blocks.contains_key(cid))
    }
}
