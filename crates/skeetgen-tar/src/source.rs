//! Pull-style reader over a push-style chunk stream
//!
//! Chunks are only pulled from the underlying stream when the buffered byte
//! count can't satisfy a request, so memory stays bounded by the largest
//! single request plus one chunk regardless of how large the stream is.

use crate::error::Result;
use bytes::{Buf, Bytes};
use n0_future::stream::{Stream, StreamExt};
use std::collections::VecDeque;
use std::io;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// Exact-length reader with forward-only discard over a stream of byte chunks
///
/// Invariant: `buffered` always equals the sum of the lengths of the queued
/// chunks. The front chunk is advanced in place as it is consumed, so it acts
/// as the cursor into the oldest chunk.
#[derive(Debug)]
pub struct ByteSource<S> {
    stream: S,
    pages: VecDeque<Bytes>,
    buffered: usize,
    consumed: u64,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin> ByteSource<ReaderStream<R>> {
    /// Wrap an async reader, pulling it in chunks of the default size
    pub fn from_reader(reader: R) -> Self {
        Self::new(ReaderStream::new(reader))
    }
}

impl<S> ByteSource<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    /// Create a source over a chunk stream
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            pages: VecDeque::new(),
            buffered: 0,
            consumed: 0,
            exhausted: false,
        }
    }

    /// Total bytes consumed so far, whether read or discarded
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Bytes currently held in the queue
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    /// Pull chunks until at least `want` bytes are buffered or the stream ends
    async fn fill(&mut self, want: usize) -> Result<()> {
        while self.buffered < want && !self.exhausted {
            match self.stream.next().await {
                Some(chunk) => {
                    let chunk = chunk?;
                    if chunk.is_empty() {
                        continue;
                    }
                    self.buffered += chunk.len();
                    self.pages.push_back(chunk);
                }
                None => self.exhausted = true,
            }
        }
        Ok(())
    }

    /// Fill `buf` from the stream.
    ///
    /// Returns `Some(buf.len())` unless the stream ran out, in which case the
    /// count of bytes actually copied is returned. Returns `None` when the
    /// stream is exhausted and nothing is left to copy.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        if buf.is_empty() {
            return Ok(Some(0));
        }

        self.fill(buf.len()).await?;

        if self.buffered == 0 {
            self.pages.clear();
            return Ok(None);
        }

        let mut written = 0;
        while written < buf.len() {
            let Some(page) = self.pages.front_mut() else {
                break;
            };

            let n = page.len().min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&page[..n]);
            page.advance(n);
            written += n;

            if page.is_empty() {
                self.pages.pop_front();
            }
        }

        self.buffered -= written;
        self.consumed += written as u64;

        Ok(Some(written))
    }

    /// Discard up to `n` bytes, returning the cumulative consumed count.
    ///
    /// Skipping past the end of the stream is not an error; the skip simply
    /// stops there. Chunks are dropped as they are pulled rather than
    /// buffered first.
    pub async fn seek(&mut self, n: u64) -> Result<u64> {
        let mut remaining = n;

        while remaining > 0 {
            if self.pages.is_empty() {
                self.fill(1).await?;
                if self.pages.is_empty() {
                    break;
                }
            }

            let Some(page) = self.pages.front_mut() else {
                break;
            };

            let step = (page.len() as u64).min(remaining) as usize;
            page.advance(step);

            if page.is_empty() {
                self.pages.pop_front();
            }

            self.buffered -= step;
            self.consumed += step as u64;
            remaining -= step as u64;
        }

        Ok(self.consumed)
    }
}
