//! Block storage for decoded CAR contents

use crate::error::{RepoError, Result};
use bytes::Bytes;
use cid::Cid as IpldCid;
use serde::de::DeserializeOwned;

/// Async block storage trait
///
/// Provides CID-keyed read access to MST nodes, commits and record data.
/// The in-memory [`MemoryBlockStore`] is the only implementation the export
/// pipeline needs, since MST traversal wants random access to any block.
///
/// # Example
///
/// ```rust,ignore
/// use skeetgen_repo::storage::{BlockStore, MemoryBlockStore, read_block};
///
/// # async fn example(cid: cid::Cid, bytes: bytes::Bytes) -> skeetgen_repo::Result<()> {
/// let mut storage = MemoryBlockStore::new();
/// storage.insert(cid, bytes);
///
/// let node: skeetgen_repo::mst::NodeData = read_block(&storage, &cid).await?;
/// # Ok(())
/// # }
/// ```
#[trait_variant::make(Send)]
pub trait BlockStore {
    /// Get a block by CID
    ///
    /// Returns `None` if the block is not found.
    async fn get(&self, cid: &IpldCid) -> Result<Option<Bytes>>;

    /// Check if a block exists without retrieving it
    async fn has(&self, cid: &IpldCid) -> Result<bool>;
}

/// Whether block bytes are checked against their CID when read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerifyPolicy {
    /// Trust the CAR: bytes are returned as stored
    #[default]
    Trust,
    /// Recompute the block hash on every read and reject mismatches
    Verify,
}

/// Fetch a block, failing with `NotFound` if it is absent
pub async fn get_required<S: BlockStore + Sync>(store: &S, cid: &IpldCid) -> Result<Bytes> {
    store
        .get(cid)
        .await?
        .ok_or_else(|| RepoError::cid_not_found(cid))
}

/// Fetch a block and decode it as DAG-CBOR
pub async fn read_block<T, S>(store: &S, cid: &IpldCid) -> Result<T>
where
    T: DeserializeOwned,
    S: BlockStore + Sync,
{
    let bytes = get_required(store, cid).await?;
    serde_ipld_dagcbor::from_slice(&bytes)
        .map_err(|e| RepoError::serialization(e).with_context(format!("decoding block {}", cid)))
}

pub mod memory;

pub use memory::MemoryBlockStore;
