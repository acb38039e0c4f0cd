//! CAR reading utilities

use crate::error::{RepoError, Result};
use crate::storage::{MemoryBlockStore, VerifyPolicy};
use bytes::Bytes;
use cid::Cid as IpldCid;
use iroh_car::CarReader;
use n0_future::stream::StreamExt;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Parsed CAR file data
#[derive(Debug, Clone)]
pub struct ParsedCar {
    /// The single root CID from the CAR header
    pub root: IpldCid,
    /// All blocks in the CAR file
    pub blocks: BTreeMap<IpldCid, Bytes>,
}

impl ParsedCar {
    /// Move the blocks into a block store with the given read policy
    pub fn into_store(self, verify: VerifyPolicy) -> (IpldCid, MemoryBlockStore) {
        let store = MemoryBlockStore::new_from_blocks(self.blocks).with_verify(verify);
        (self.root, store)
    }
}

/// Parse in-memory CAR bytes into their root and block map
///
/// The header must name exactly one root. Cancellation is checked once per
/// block.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(len = data.len())))]
pub async fn parse_car_bytes(data: &[u8], cancel: &CancellationToken) -> Result<ParsedCar> {
    let reader = CarReader::new(data)
        .await
        .map_err(|e| RepoError::car_parse(e))?;

    let root = match reader.header().roots() {
        [root] => *root,
        roots => return Err(RepoError::unexpected_root_count(roots.len())),
    };

    let mut blocks = BTreeMap::new();
    let stream = reader.stream();
    n0_future::pin!(stream);

    while let Some(result) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(RepoError::cancelled());
        }

        let (cid, data) = result.map_err(|e| RepoError::car_parse(e))?;
        blocks.insert(cid, Bytes::from(data));
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(blocks = blocks.len(), %root, "CAR loaded");

    Ok(ParsedCar { root, blocks })
}
