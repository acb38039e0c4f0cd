//! `#[serde(with)]` adapter storing `Bytes` as a CBOR byte string
//!
//! Without it, `Bytes` would go through the sequence path and come out as an
//! array of integers (major type 4) instead of a byte string (major type 2).

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serializer};
use serde_bytes::ByteBuf;

pub fn serialize<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_bytes(bytes)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
where
    D: Deserializer<'de>,
{
    ByteBuf::deserialize(deserializer).map(|buf| Bytes::from(buf.into_vec()))
}
