//! Forward-only archive decoding

use crate::error::{ArchiveError, Result};
use crate::header::{BLOCK_SIZE, EntryHeader};
use crate::source::ByteSource;
use bytes::{Bytes, BytesMut};
use n0_future::stream::Stream;
use std::io;
use std::ops::Deref;

/// Upper bound on a single `read_to_end` read, and on its initial allocation
const READ_CHUNK: u64 = 64 * 1024;

/// Lazy decoder yielding archive entries in order
///
/// Entries borrow the archive mutably, so the borrow checker enforces that
/// an entry is gone before the next one is requested. Whatever the caller
/// left unread of the previous entry, padding included, is discarded when
/// advancing.
#[derive(Debug)]
pub struct Archive<S> {
    source: ByteSource<S>,
    /// unread payload bytes of the current entry
    remaining: u64,
    /// unread payload and padding bytes of the current entry
    pending: u64,
    done: bool,
}

impl<S> Archive<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    /// Decode entries from a byte source
    pub fn new(source: ByteSource<S>) -> Self {
        Self {
            source,
            remaining: 0,
            pending: 0,
            done: false,
        }
    }

    /// Advance to the next entry.
    ///
    /// Returns `Ok(None)` at the terminator record or a clean end of stream.
    /// Checksum and magic failures are fatal and end decoding.
    pub async fn next_entry(&mut self) -> Result<Option<Entry<'_, S>>> {
        if self.done {
            return Ok(None);
        }

        if self.pending > 0 {
            #[cfg(feature = "tracing")]
            tracing::trace!(bytes = self.pending, "discarding unread entry data");

            self.source.seek(self.pending).await?;
            self.pending = 0;
            self.remaining = 0;
        }

        let mut block = [0u8; BLOCK_SIZE];
        let header = match self.source.read(&mut block).await {
            Ok(None) => {
                self.done = true;
                return Ok(None);
            }
            Ok(Some(n)) if n < BLOCK_SIZE => {
                self.done = true;
                return Err(ArchiveError::TruncatedHeader { len: n });
            }
            Ok(Some(_)) => EntryHeader::decode(&block),
            Err(e) => Err(e),
        };

        let header = match header {
            Ok(Some(header)) => header,
            Ok(None) => {
                self.done = true;
                return Ok(None);
            }
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(name = %header.name, size = header.size, "archive entry decoded");

        self.remaining = header.size;
        self.pending = header.entry_size();

        Ok(Some(Entry {
            header,
            archive: self,
        }))
    }
}

/// One decoded archive entry with access to its payload
///
/// Dereferences to its [`EntryHeader`].
#[derive(Debug)]
pub struct Entry<'a, S> {
    header: EntryHeader,
    archive: &'a mut Archive<S>,
}

impl<S> Deref for Entry<'_, S> {
    type Target = EntryHeader;

    fn deref(&self) -> &Self::Target {
        &self.header
    }
}

impl<S> Entry<'_, S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    /// Entry metadata
    pub fn header(&self) -> &EntryHeader {
        &self.header
    }

    /// Payload bytes not yet read
    pub fn remaining(&self) -> u64 {
        self.archive.remaining
    }

    /// Read payload bytes into `buf`.
    ///
    /// Requests are capped at the entry's remaining size, so a large buffer
    /// never reads into the next entry. Returns `None` once the payload has
    /// been fully read.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let remaining = self.archive.remaining;
        if remaining == 0 {
            return Ok(None);
        }

        let cap = (buf.len() as u64).min(remaining) as usize;
        let n = self
            .archive
            .source
            .read(&mut buf[..cap])
            .await?
            .ok_or(ArchiveError::UnexpectedEof)?;

        self.archive.remaining -= n as u64;
        self.archive.pending -= n as u64;

        Ok(Some(n))
    }

    /// Read the rest of the payload into memory
    ///
    /// The buffer grows as data arrives; the declared size is never trusted
    /// for allocation, so a header claiming more than the stream holds ends
    /// in `UnexpectedEof`.
    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        let first = self.archive.remaining.min(READ_CHUNK) as usize;
        let mut out = BytesMut::with_capacity(first);
        let mut chunk = vec![0u8; first];

        while let Some(n) = self.read(&mut chunk).await? {
            if n == 0 {
                return Err(ArchiveError::UnexpectedEof);
            }
            out.extend_from_slice(&chunk[..n]);
        }

        Ok(out.freeze())
    }
}
