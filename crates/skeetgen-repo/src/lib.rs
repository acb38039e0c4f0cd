//! AT Protocol repository decoding
//!
//! This crate turns a repository export (a CAR file) back into records:
//!
//! - **CAR I/O**: read a single-root CAR into an in-memory block store
//! - **Storage**: CID-keyed block access with optional integrity checking
//! - **MST**: lazy in-order walk of a Merkle Search Tree
//! - **Records**: typed decoding dispatched on collection NSID
//! - **Repository**: records of one commit grouped by collection, plus the
//!   reply graph and output path helpers consumers need
//!
//! Writing MSTs and signing commits is out of scope; nothing here verifies
//! signatures.
//!
//! # Example
//!
//! ```rust,ignore
//! use skeetgen_repo::{Repository, VerifyPolicy};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(car: &[u8]) -> skeetgen_repo::Result<()> {
//! let cancel = CancellationToken::new();
//! let repo = Repository::from_car(car, VerifyPolicy::Verify, &cancel).await?;
//! println!("{}", repo);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

/// CAR (Content Addressable aRchive) utilities
pub mod car;
/// Commit structures
pub mod commit;
/// DID documents
pub mod did_doc;
pub mod error;
/// Reply graph
pub mod graph;
/// Merkle Search Tree decoding
pub mod mst;
/// Output path bucketing
pub mod paths;
/// Typed records
pub mod record;
/// Repository reconstruction
pub mod repo;
/// Block storage abstraction
pub mod storage;

pub use car::{ParsedCar, parse_car_bytes, write_car_bytes};
pub use commit::Commit;
pub use did_doc::DidDocument;
pub use error::{RepoError, RepoErrorKind, Result};
pub use graph::{PostGraph, PostGraphEntry};
pub use mst::MstWalker;
pub use record::{Record, RecordKind};
pub use repo::{ProfileSummary, Repository};
pub use storage::{BlockStore, MemoryBlockStore, VerifyPolicy};

/// DAG-CBOR codec identifier for CIDs (0x71)
pub const DAG_CBOR_CID_CODEC: u64 = 0x71;

/// SHA2-256 multihash code (0x12)
pub const SHA2_256: u64 = 0x12;
