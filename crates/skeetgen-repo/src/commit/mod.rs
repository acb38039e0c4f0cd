//! Repository commit objects
//!
//! The commit is the single root of a repository snapshot: it names the
//! account, the MST root and the revision. Signatures are carried but not
//! checked here.

pub(crate) mod serde_bytes_helper;

use crate::error::{RepoError, Result};
use bytes::Bytes;
use cid::Cid as IpldCid;
use smol_str::SmolStr;

/// Repository commit object
///
/// **Version compatibility**: v2 and v3 commits differ only in how `prev` is
/// serialized; both decode into this struct.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Commit {
    /// Repository DID
    pub did: SmolStr,

    /// Commit version (2 or 3)
    pub version: i64,

    /// MST root CID
    pub data: IpldCid,

    /// Revision TID
    pub rev: SmolStr,

    /// Previous commit CID (None for initial commit)
    pub prev: Option<IpldCid>,

    /// Signature bytes
    #[serde(with = "serde_bytes_helper")]
    pub sig: Bytes,
}

impl Commit {
    /// Deserialize from DAG-CBOR, rejecting unknown versions
    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        let commit: Commit = serde_ipld_dagcbor::from_slice(data)
            .map_err(|e| RepoError::serialization(e).with_context("decoding commit"))?;

        if !matches!(commit.version, 2 | 3) {
            return Err(RepoError::invalid_commit(format!(
                "unsupported version {}",
                commit.version
            )));
        }

        Ok(commit)
    }

    /// Serialize to DAG-CBOR
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        serde_ipld_dagcbor::to_vec(self).map_err(RepoError::serialization)
    }

    /// Get the MST root CID
    pub fn data(&self) -> &IpldCid {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepoErrorKind;
    use crate::mst::util::compute_cid;

    fn commit(version: i64) -> Commit {
        Commit {
            did: "did:web:example.com".into(),
            version,
            data: compute_cid(b"mst").unwrap(),
            rev: "3k2aaaaaaaaaa".into(),
            prev: None,
            sig: Bytes::from_static(&[1, 2, 3]),
        }
    }

    #[test]
    fn test_decode_v3() {
        let original = commit(3);
        let bytes = original.to_cbor().unwrap();
        let decoded = Commit::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.data(), &compute_cid(b"mst").unwrap());
    }

    #[test]
    fn test_reject_unknown_version() {
        let bytes = commit(7).to_cbor().unwrap();
        let err = Commit::from_cbor(&bytes).unwrap_err();
        assert_eq!(err.kind(), &RepoErrorKind::InvalidCommit);
    }

    #[test]
    fn test_reject_non_commit() {
        let bytes = serde_ipld_dagcbor::to_vec(&vec![1u8, 2, 3]).unwrap();
        let err = Commit::from_cbor(&bytes).unwrap_err();
        assert_eq!(err.kind(), &RepoErrorKind::Serialization);
    }
}
