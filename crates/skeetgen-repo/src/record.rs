//! Typed repository records
//!
//! Records are dispatched on their collection NSID. The five collections an
//! archive cares about decode into typed structs; everything else is
//! [`Record::Unrecognized`] and its block is never decoded.
//!
//! Open-ended parts of a record (embeds, facets, labels) are kept as raw
//! [`Ipld`] so that nothing is lost when a record is re-serialized.
//!
//! Only the CBOR structure is enforced. Any field may be missing and decodes
//! to its default, so a sparse record is still routed; a field of the wrong
//! type, or bytes that aren't CBOR, fail with `Serialization`.

use crate::error::{RepoError, Result};
use cid::Cid as IpldCid;
use ipld_core::ipld::Ipld;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// `app.bsky.feed.post`
pub const POST_NSID: &str = "app.bsky.feed.post";
/// `app.bsky.actor.profile`
pub const PROFILE_NSID: &str = "app.bsky.actor.profile";
/// `app.bsky.feed.generator`
pub const FEED_GENERATOR_NSID: &str = "app.bsky.feed.generator";
/// `app.bsky.graph.list`
pub const LIST_NSID: &str = "app.bsky.graph.list";
/// `app.bsky.feed.threadgate`
pub const THREADGATE_NSID: &str = "app.bsky.feed.threadgate";

const EMBED_IMAGES: &str = "app.bsky.embed.images";
const EMBED_RECORD_WITH_MEDIA: &str = "app.bsky.embed.recordWithMedia";

/// Record kind, derived from a collection NSID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Posts
    Post,
    /// The actor profile singleton
    Profile,
    /// Feed generators
    FeedGenerator,
    /// Lists
    List,
    /// Threadgates
    Threadgate,
    /// Any other collection
    Unrecognized,
}

impl RecordKind {
    /// Classify a collection NSID
    pub fn from_collection(collection: &str) -> Self {
        match collection {
            POST_NSID => Self::Post,
            PROFILE_NSID => Self::Profile,
            FEED_GENERATOR_NSID => Self::FeedGenerator,
            LIST_NSID => Self::List,
            THREADGATE_NSID => Self::Threadgate,
            _ => Self::Unrecognized,
        }
    }

    /// The NSID for this kind, `None` for unrecognized collections
    pub fn nsid(&self) -> Option<&'static str> {
        match self {
            Self::Post => Some(POST_NSID),
            Self::Profile => Some(PROFILE_NSID),
            Self::FeedGenerator => Some(FEED_GENERATOR_NSID),
            Self::List => Some(LIST_NSID),
            Self::Threadgate => Some(THREADGATE_NSID),
            Self::Unrecognized => None,
        }
    }
}

/// Reference to a specific version of a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrongRef {
    /// `at://` URI of the record
    pub uri: String,
    /// CID of the record, as a string
    pub cid: String,
}

/// Reply pointers of a post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyRef {
    /// Root of the thread
    pub root: StrongRef,
    /// Post being replied to
    pub parent: StrongRef,
}

/// Reference to an uploaded blob
///
/// Current records carry a `ref` CID link; old records carry a `cid` string
/// instead. Both forms decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    /// CID link of the blob
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<IpldCid>,
    /// Legacy string CID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    /// MIME type
    #[serde(default)]
    pub mime_type: SmolStr,
    /// Size in bytes, absent in legacy blobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Blob {
    /// The blob CID as a string, whichever form the record used
    pub fn cid_string(&self) -> Option<String> {
        match (&self.reference, &self.cid) {
            (Some(link), _) => Some(link.to_string()),
            (None, Some(cid)) => Some(cid.clone()),
            (None, None) => None,
        }
    }
}

/// `app.bsky.feed.post`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Post text
    #[serde(default)]
    pub text: String,
    /// Client-declared creation timestamp, empty when the record has none
    #[serde(default)]
    pub created_at: String,
    /// Reply pointers, if this post is a reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyRef>,
    /// Embedded media or record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<Ipld>,
    /// Rich text annotations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<Ipld>,
    /// Language tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub langs: Vec<SmolStr>,
    /// Hashtags outside the text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<SmolStr>,
    /// Self-labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Ipld>,
}

impl Post {
    /// Whether this post replies to another post
    pub fn is_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Whether this post embeds images, directly or next to a quoted record
    pub fn has_images(&self) -> bool {
        let Some(embed) = &self.embed else {
            return false;
        };

        match type_of(embed) {
            Some(EMBED_IMAGES) => true,
            Some(EMBED_RECORD_WITH_MEDIA) => lookup(embed, "media")
                .and_then(type_of)
                .is_some_and(|ty| ty == EMBED_IMAGES),
            _ => false,
        }
    }

    /// URI of the parent post, if any
    pub fn parent_uri(&self) -> Option<&str> {
        self.reply.as_ref().map(|reply| reply.parent.uri.as_str())
    }
}

fn lookup<'a>(value: &'a Ipld, key: &str) -> Option<&'a Ipld> {
    match value {
        Ipld::Map(map) => map.get(key),
        _ => None,
    }
}

fn type_of(value: &Ipld) -> Option<&str> {
    match lookup(value, "$type") {
        Some(Ipld::String(ty)) => Some(ty.as_str()),
        _ => None,
    }
}

/// `app.bsky.actor.profile`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Avatar image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Blob>,
    /// Banner image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<Blob>,
    /// Pinned post
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_post: Option<StrongRef>,
    /// Self-labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Ipld>,
    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// `app.bsky.feed.generator`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedGenerator {
    /// DID of the feed service
    #[serde(default)]
    pub did: String,
    /// Display name
    #[serde(default)]
    pub display_name: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Rich text annotations of the description
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub description_facets: Vec<Ipld>,
    /// Avatar image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Blob>,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: String,
}

/// `app.bsky.graph.list`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    /// List name
    #[serde(default)]
    pub name: String,
    /// Purpose token, e.g. `app.bsky.graph.defs#curatelist`
    #[serde(default)]
    pub purpose: SmolStr,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Rich text annotations of the description
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub description_facets: Vec<Ipld>,
    /// Avatar image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Blob>,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: String,
}

/// `app.bsky.feed.threadgate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Threadgate {
    /// URI of the gated post
    #[serde(default)]
    pub post: String,
    /// Allow rules; absent means nobody may reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Vec<Ipld>>,
    /// Replies hidden by the author
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden_replies: Vec<String>,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: String,
}

/// A decoded record
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// `app.bsky.feed.post`
    Post(Post),
    /// `app.bsky.actor.profile`
    Profile(Profile),
    /// `app.bsky.feed.generator`
    FeedGenerator(FeedGenerator),
    /// `app.bsky.graph.list`
    List(List),
    /// `app.bsky.feed.threadgate`
    Threadgate(Threadgate),
    /// A collection this crate doesn't model
    Unrecognized,
}

impl Record {
    /// Decode a DAG-CBOR record block of the given kind
    ///
    /// Unrecognized kinds return [`Record::Unrecognized`] without touching
    /// `bytes`.
    pub fn decode(kind: RecordKind, bytes: &[u8]) -> Result<Self> {
        Ok(match kind {
            RecordKind::Post => Record::Post(decode_cbor(bytes, POST_NSID)?),
            RecordKind::Profile => Record::Profile(decode_cbor(bytes, PROFILE_NSID)?),
            RecordKind::FeedGenerator => {
                Record::FeedGenerator(decode_cbor(bytes, FEED_GENERATOR_NSID)?)
            }
            RecordKind::List => Record::List(decode_cbor(bytes, LIST_NSID)?),
            RecordKind::Threadgate => Record::Threadgate(decode_cbor(bytes, THREADGATE_NSID)?),
            RecordKind::Unrecognized => Record::Unrecognized,
        })
    }

    /// Kind of this record
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Post(_) => RecordKind::Post,
            Record::Profile(_) => RecordKind::Profile,
            Record::FeedGenerator(_) => RecordKind::FeedGenerator,
            Record::List(_) => RecordKind::List,
            Record::Threadgate(_) => RecordKind::Threadgate,
            Record::Unrecognized => RecordKind::Unrecognized,
        }
    }
}

fn decode_cbor<T: serde::de::DeserializeOwned>(bytes: &[u8], nsid: &str) -> Result<T> {
    serde_ipld_dagcbor::from_slice(bytes)
        .map_err(|e| RepoError::serialization(e).with_context(format!("decoding {} record", nsid)))
}
