//! DID document representation
//!
//! Only the fields the archive pipeline reads are modeled. Everything else is
//! captured in `extra_data`, so a document can be re-serialized without loss.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use url::Url;

/// Handle used when the document names none
pub const INVALID_HANDLE: &str = "handle.invalid";

/// DID document
///
/// ```ignore
/// let doc = DidDocument::from_slice(br#"{
///   "id": "did:web:example.com",
///   "alsoKnownAs": ["at://example.com"],
///   "service": [{"id":"#atproto_pds","type":"AtprotoPersonalDataServer","serviceEndpoint":"https://pds.example"}]
/// }"#)?;
/// assert_eq!(doc.handle(), "example.com");
/// assert!(doc.pds_endpoint().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    /// Document identifier (e.g., `did:plc:...` or `did:web:...`)
    pub id: String,

    /// Alternate identifiers for the subject, such as at://<handle>
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub also_known_as: Option<Vec<String>>,

    /// Services associated with this DID (e.g., AtprotoPersonalDataServer)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<Service>>,

    /// Forward-compatible capture of unmodeled fields
    #[serde(flatten)]
    pub extra_data: BTreeMap<SmolStr, Value>,
}

impl DidDocument {
    /// Parse a JSON document
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Whether `id` looks like a DID
    pub fn has_did_id(&self) -> bool {
        self.id.starts_with("did:")
    }

    /// Handles from `alsoKnownAs` entries like `at://<handle>`, in document order
    pub fn handles(&self) -> impl Iterator<Item = &str> {
        self.also_known_as
            .iter()
            .flatten()
            .filter_map(|aka| aka.strip_prefix("at://"))
    }

    /// First handle, or `handle.invalid`
    pub fn handle(&self) -> &str {
        self.handles().next().unwrap_or(INVALID_HANDLE)
    }

    /// The AtprotoPersonalDataServer service endpoint as a `Url`
    ///
    /// Accepts the endpoint as a string or as an object with a `url` field.
    pub fn pds_endpoint(&self) -> Option<Url> {
        self.service.iter().flatten().find_map(|s| {
            if s.r#type != "AtprotoPersonalDataServer" {
                return None;
            }
            match &s.service_endpoint {
                Some(Value::String(url)) => Url::parse(url).ok(),
                Some(Value::Object(obj)) => match obj.get("url") {
                    Some(Value::String(url)) => Url::parse(url).ok(),
                    _ => None,
                },
                _ => None,
            }
        })
    }
}

/// Service entry in a DID document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Service identifier
    pub id: String,
    /// Service type (e.g., `AtprotoPersonalDataServer`)
    #[serde(rename = "type")]
    pub r#type: String,
    /// String or object
    #[serde(default)]
    pub service_endpoint: Option<Value>,

    /// Forward-compatible capture of unmodeled fields
    #[serde(flatten)]
    pub extra_data: BTreeMap<SmolStr, Value>,
}
