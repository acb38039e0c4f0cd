//! Encoding entries and writing whole archives

use crate::error::Result;
use crate::header::{BLOCK_SIZE, EntryAttributes, encode_header, padded_len};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Encode one entry as header + payload + zero padding.
///
/// The returned buffer is self-contained and always a multiple of 512 bytes.
/// Name errors are reported before anything is allocated for the payload.
pub fn encode_entry(filename: &str, data: &[u8], attrs: &EntryAttributes) -> Result<Vec<u8>> {
    let header = encode_header(filename, data.len() as u64, attrs)?;

    let total = BLOCK_SIZE + padded_len(data.len() as u64) as usize;
    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&header);
    buf.extend_from_slice(data);
    buf.resize(total, 0);

    Ok(buf)
}

/// Sequential archive writer over an async sink
///
/// Every entry is encoded completely before any of its bytes reach the sink,
/// so a failed `append` never leaves half an entry behind. Call [`finish`]
/// to write the end-of-archive marker, or [`abort`] to hand the sink back
/// without one.
///
/// [`finish`]: ArchiveWriter::finish
/// [`abort`]: ArchiveWriter::abort
#[derive(Debug)]
pub struct ArchiveWriter<W> {
    inner: W,
    attrs: EntryAttributes,
    entries: usize,
    written: u64,
}

impl<W: AsyncWrite + Unpin> ArchiveWriter<W> {
    /// Create a writer using default attributes for every entry
    pub fn new(inner: W) -> Self {
        Self::with_attributes(inner, EntryAttributes::default())
    }

    /// Create a writer using the given attributes for every entry
    pub fn with_attributes(inner: W, attrs: EntryAttributes) -> Self {
        Self {
            inner,
            attrs,
            entries: 0,
            written: 0,
        }
    }

    /// Number of entries appended so far
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Bytes written to the sink so far
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Append a regular file entry
    pub async fn append(&mut self, filename: &str, data: &[u8]) -> Result<()> {
        let encoded = encode_entry(filename, data, &self.attrs)?;
        self.inner.write_all(&encoded).await?;

        self.entries += 1;
        self.written += encoded.len() as u64;

        #[cfg(feature = "tracing")]
        tracing::trace!(filename, size = data.len(), "archive entry written");

        Ok(())
    }

    /// Write the two zero records that end an archive and flush the sink
    pub async fn finish(mut self) -> Result<W> {
        self.inner.write_all(&[0u8; BLOCK_SIZE * 2]).await?;
        self.inner.flush().await?;
        Ok(self.inner)
    }

    /// Give up on the archive, returning the sink without a terminator.
    ///
    /// The caller is responsible for discarding whatever already reached it.
    pub fn abort(self) -> W {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            entries = self.entries,
            bytes = self.written,
            "archive aborted"
        );

        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArchiveError;

    fn attrs() -> EntryAttributes {
        EntryAttributes {
            mtime: 1_700_000_000,
            ..Default::default()
        }
    }

    #[test]
    fn encoded_length_is_block_aligned() {
        for n in 0..=1025usize {
            let data = vec![0xabu8; n];
            let encoded = encode_entry("f", &data, &attrs()).unwrap();

            let pad = encoded.len() - BLOCK_SIZE - n;
            assert!(pad < BLOCK_SIZE, "pad {} for size {}", pad, n);
            assert_eq!((n + pad) % BLOCK_SIZE, 0, "size {}", n);
        }
    }

    #[test]
    fn payload_follows_header() {
        let encoded = encode_entry("did.json", b"{}", &attrs()).unwrap();
        assert_eq!(&encoded[BLOCK_SIZE..BLOCK_SIZE + 2], b"{}");
        assert!(encoded[BLOCK_SIZE + 2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn name_too_long_is_reported_first() {
        let name = "n".repeat(200);
        let err = encode_entry(&name, b"data", &attrs()).unwrap_err();
        assert!(matches!(err, ArchiveError::NameTooLong { len: 200 }));
    }

    #[tokio::test]
    async fn finish_appends_terminator() {
        let mut writer = ArchiveWriter::with_attributes(Vec::new(), attrs());
        writer.append("a.txt", b"hello").await.unwrap();
        assert_eq!(writer.entries(), 1);

        let out = writer.finish().await.unwrap();
        assert_eq!(out.len(), BLOCK_SIZE * 4);
        assert!(out[BLOCK_SIZE * 2..].iter().all(|b| *b == 0));
    }

    #[tokio::test]
    async fn abort_skips_terminator() {
        let mut writer = ArchiveWriter::with_attributes(Vec::new(), attrs());
        writer.append("a.txt", b"hello").await.unwrap();

        let out = writer.abort();
        assert_eq!(out.len(), BLOCK_SIZE * 2);
    }

    #[tokio::test]
    async fn failed_append_writes_nothing() {
        let mut writer = ArchiveWriter::with_attributes(Vec::new(), attrs());
        writer.append("ok", b"1").await.unwrap();
        assert!(writer.append(&"x".repeat(300), b"2").await.is_err());

        assert_eq!(writer.entries(), 1);
        assert_eq!(writer.bytes_written(), (BLOCK_SIZE * 2) as u64);
        assert_eq!(writer.abort().len(), BLOCK_SIZE * 2);
    }
}
