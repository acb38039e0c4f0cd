//! Output path bucketing
//!
//! Archives can hold tens of thousands of posts and blobs; both are spread
//! over subdirectories so no single directory gets too large.

use sha2::{Digest, Sha256};

/// Trailing characters of a TID kept as the file name
const TID_TAIL: usize = 10;

/// Leading characters of a CID used as the bucket
const CID_BUCKET: usize = 8;

/// `<bucket>/<tail>` for a record key, bucketed by all but its last 10 chars
///
/// Keys of 10 characters or fewer (e.g. `self`) are returned unchanged.
pub fn tid_segment(rkey: &str) -> String {
    match rkey.len().checked_sub(TID_TAIL) {
        Some(split) if split > 0 && rkey.is_char_boundary(split) => {
            format!("{}/{}", &rkey[..split], &rkey[split..])
        }
        _ => rkey.to_string(),
    }
}

/// Longest record key written under its own name
const PLAIN_RKEY_MAX: usize = 90;

/// Bucket holding record keys that can't be used as file names
const HASHED_BUCKET: &str = "_";

/// Output path segment for any record key
///
/// Short keys made of record-key characters go through [`tid_segment`].
/// Anything longer, or containing characters such as `/`, is replaced by
/// `_/<sha256 of the key>` so the resulting path always fits a ustar
/// header and never escapes its directory.
pub fn rkey_segment(rkey: &str) -> String {
    let plain = !rkey.is_empty()
        && rkey.len() <= PLAIN_RKEY_MAX
        && rkey != "."
        && rkey != ".."
        && rkey
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_' | b':' | b'~'));

    if plain {
        return tid_segment(rkey);
    }

    let digest = Sha256::digest(rkey.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}/{}", HASHED_BUCKET, hex)
}

/// `<bucket>/<rest>` for a CID string, bucketed by its first 8 chars
///
/// CIDs of raw blobs all start with `bafkrei`, so the eighth character is the
/// first one that varies.
pub fn cid_segment(cid: &str) -> String {
    if cid.len() > CID_BUCKET && cid.is_char_boundary(CID_BUCKET) {
        format!("{}/{}", &cid[..CID_BUCKET], &cid[CID_BUCKET..])
    } else {
        cid.to_string()
    }
}
