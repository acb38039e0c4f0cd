//! Streaming ustar archive codec
//!
//! This crate provides the archive half of skeetgen's container handling:
//!
//! - **Byte source**: adapts a chunk stream into an exact-length reader with
//!   forward-only discard, pulling chunks only on demand
//! - **Decoding**: a lazy, forward-only sequence of entries with per-entry
//!   payload reads that never cross into the next entry
//! - **Encoding**: self-contained header + payload + padding buffers, and an
//!   [`ArchiveWriter`] that either finishes with a terminator or aborts
//!
//! Sparse files, GNU long names and pax extended headers are not supported.
//!
//! # Example
//!
//! ```rust,ignore
//! use skeetgen_tar::{Archive, ArchiveWriter, ByteSource};
//!
//! # async fn example() -> skeetgen_tar::Result<()> {
//! let mut writer = ArchiveWriter::new(Vec::new());
//! writer.append("did.json", br#"{"id":"did:web:example.com"}"#).await?;
//! let bytes = writer.finish().await?;
//!
//! let mut archive = Archive::new(ByteSource::from_reader(std::io::Cursor::new(bytes)));
//! while let Some(mut entry) = archive.next_entry().await? {
//!     let data = entry.read_to_end().await?;
//!     println!("{} ({} bytes)", entry.name, data.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

/// Entry decoding
pub mod archive;
/// Entry encoding and archive writing
pub mod builder;
pub mod error;
/// Header layout and field codecs
pub mod header;
pub mod source;

pub use archive::{Archive, Entry};
pub use builder::{ArchiveWriter, encode_entry};
pub use error::{ArchiveError, Result};
pub use header::{BLOCK_SIZE, EntryAttributes, EntryHeader, EntryType};
pub use source::ByteSource;
