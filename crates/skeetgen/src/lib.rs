//! Portable archives of AT Protocol repositories
//!
//! Two pipelines sit on top of [`skeetgen_tar`] and [`skeetgen_repo`]:
//!
//! - [`export_archive`] packs a repository export (`did.json`, `repo.car`
//!   and optionally blobs) into a tar bundle
//! - [`generate_archive`] reads such a bundle back, reconstructs the
//!   repository and writes an archive of per-record JSON documents, timeline
//!   indexes and the reply graph, optionally carrying the blobs along
//!
//! Every pipeline takes a [`CancellationToken`] and checks it once per entry
//! or record. A failed or cancelled run aborts its output archive, so the
//! caller never mistakes a partial archive for a complete one.
//!
//! # Example
//!
//! ```rust,ignore
//! use skeetgen::{FileInput, GenerateOptions, generate_archive};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> skeetgen::Result<()> {
//! let input = FileInput::new("export.tar");
//! let output = tokio::fs::File::create("archive.tar").await?;
//! let (_, summary) = generate_archive(
//!     &input,
//!     output,
//!     &GenerateOptions::default(),
//!     &CancellationToken::new(),
//! )
//! .await?;
//! println!("wrote {} posts", summary.posts);
//! # Ok(())
//! # }
//! ```
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod export;
pub mod generate;
pub mod input;
pub mod list;

pub use config::{Config, ExportOptions, GenerateOptions};
pub use error::{Error, Result};
pub use export::{DirectorySource, ExportSummary, RepoSource, export_archive};
pub use generate::{ExportContents, GenerateSummary, generate_archive, read_repository};
pub use input::{ArchiveInput, FileInput, MemoryInput};
pub use list::list_entries;
pub use skeetgen_repo::VerifyPolicy;
