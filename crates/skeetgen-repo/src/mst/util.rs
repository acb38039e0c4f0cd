//! MST utility functions

use crate::error::{MstError, RepoError, Result};
use crate::{DAG_CBOR_CID_CODEC, SHA2_256};
use cid::Cid as IpldCid;
use sha2::{Digest, Sha256};

/// Compute CID from raw bytes
///
/// Uses SHA-256 hash and DAG-CBOR codec. Assumes data is already DAG-CBOR encoded.
pub fn compute_cid(data: &[u8]) -> Result<IpldCid> {
    let hash = Sha256::digest(data);
    let mh = multihash::Multihash::<64>::wrap(SHA2_256, hash.as_slice())
        .map_err(|e| MstError::InvalidNode(e.to_string()))?;

    Ok(IpldCid::new_v1(DAG_CBOR_CID_CODEC, mh))
}

/// Check that `data` hashes to the digest carried by `cid`
///
/// Only SHA-256 multihashes are understood; anything else is rejected.
pub fn verify_cid(cid: &IpldCid, data: &[u8]) -> Result<()> {
    let hash = cid.hash();

    if hash.code() != SHA2_256 {
        return Err(RepoError::invalid_cid(format!(
            "unsupported multihash 0x{:x} for {}",
            hash.code(),
            cid
        )));
    }

    let digest = Sha256::digest(data);
    if hash.digest() != digest.as_slice() {
        return Err(RepoError::invalid_cid(format!(
            "block bytes do not match {}",
            cid
        )));
    }

    Ok(())
}

/// Split an MST key into `(collection, rkey)` on the first `/`
pub fn split_key(key: &str) -> Result<(&str, &str)> {
    match key.split_once('/') {
        Some((collection, rkey)) if !collection.is_empty() && !rkey.is_empty() => {
            Ok((collection, rkey))
        }
        _ => Err(RepoError::invalid_key(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_cid_is_stable() {
        let a = compute_cid(b"hello").unwrap();
        let b = compute_cid(b"hello").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.codec(), DAG_CBOR_CID_CODEC);
        assert!(a.to_string().starts_with("bafyrei"));
    }

    #[test]
    fn test_verify_cid() {
        let cid = compute_cid(b"hello").unwrap();
        assert!(verify_cid(&cid, b"hello").is_ok());
        assert!(verify_cid(&cid, b"goodbye").is_err());
    }

    #[test]
    fn test_split_key() {
        assert_eq!(
            split_key("app.bsky.feed.post/3k2abc").unwrap(),
            ("app.bsky.feed.post", "3k2abc")
        );
        // only the first slash separates
        assert_eq!(split_key("a.b/c/d").unwrap(), ("a.b", "c/d"));
        assert!(split_key("noslash").is_err());
        assert!(split_key("/rkey").is_err());
        assert!(split_key("coll/").is_err());
    }
}
