//! Re-openable archive inputs
//!
//! Generating an archive with media reads the input twice: once for the
//! repository and once for the blobs. Inputs therefore hand out a fresh chunk
//! stream on every `open`.

use crate::error::Result;
use bytes::Bytes;
use n0_future::stream::{self, Stream};
use skeetgen_tar::{Archive, ByteSource};
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use tokio_util::io::ReaderStream;

/// Boxed stream of archive bytes
pub type ChunkStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Source of a tar archive that can be read from the start more than once
#[trait_variant::make(Send)]
pub trait ArchiveInput {
    /// Open a new stream positioned at the start of the archive
    async fn open(&self) -> Result<ChunkStream>;
}

/// Open `input` and wrap it in a decoder
pub async fn open_archive<I: ArchiveInput + Sync>(input: &I) -> Result<Archive<ChunkStream>> {
    let stream = input.open().await?;
    Ok(Archive::new(ByteSource::new(stream)))
}

/// Archive stored in a local file
#[derive(Debug, Clone)]
pub struct FileInput {
    path: PathBuf,
}

impl FileInput {
    /// Read the archive at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ArchiveInput for FileInput {
    async fn open(&self) -> Result<ChunkStream> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::pin(ReaderStream::new(file)))
    }
}

/// Archive held in memory, handed out in fixed-size chunks
#[derive(Debug, Clone)]
pub struct MemoryInput {
    data: Bytes,
    chunk_size: usize,
}

impl MemoryInput {
    /// Default chunk size, matching `ReaderStream`'s
    pub const DEFAULT_CHUNK_SIZE: usize = 4096;

    /// Serve `data` in default-sized chunks
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::with_chunk_size(data, Self::DEFAULT_CHUNK_SIZE)
    }

    /// Serve `data` in chunks of `chunk_size` bytes (at least one)
    pub fn with_chunk_size(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        Self {
            data: data.into(),
            chunk_size: chunk_size.max(1),
        }
    }
}

impl ArchiveInput for MemoryInput {
    async fn open(&self) -> Result<ChunkStream> {
        let data = self.data.clone();
        let chunks: Vec<io::Result<Bytes>> = (0..data.len())
            .step_by(self.chunk_size)
            .map(|start| Ok(data.slice(start..(start + self.chunk_size).min(data.len()))))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}
