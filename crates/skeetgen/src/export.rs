//! Packing a repository export into a tar bundle
//!
//! The bundle holds `did.json`, `repo.car` and, when media is requested,
//! every blob under `blobs/<cid-bucket>/<cid-rest>`. Where the pieces come
//! from is up to the [`RepoSource`]; fetching them over the network (and
//! retrying) is the source's business.

use crate::config::ExportOptions;
use crate::error::{Error, Result};
use crate::generate::{DID_ENTRY, REPO_ENTRY, parse_did_document};
use bytes::Bytes;
use skeetgen_repo::paths::cid_segment;
use skeetgen_tar::ArchiveWriter;
use smol_str::SmolStr;
use std::path::PathBuf;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

/// Provider of the pieces of a repository export
#[trait_variant::make(Send)]
pub trait RepoSource {
    /// DID document as raw JSON
    async fn did_document(&self) -> Result<Bytes>;

    /// Repository snapshot as a CAR v1 byte stream
    async fn repository(&self) -> Result<Bytes>;

    /// CIDs of every blob in the repository
    async fn list_blobs(&self) -> Result<Vec<SmolStr>>;

    /// Contents of one blob
    async fn blob(&self, cid: &str) -> Result<Bytes>;
}

/// Counts of what an export wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Bytes of the repository CAR
    pub repo_bytes: usize,
    /// Blobs written
    pub blobs: usize,
}

/// Write an export bundle for `source` to `output`
///
/// Like [`generate_archive`](crate::generate_archive), any failure aborts the
/// writer and leaves an unterminated archive for the caller to discard.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip_all))]
pub async fn export_archive<R, W>(
    source: &R,
    output: W,
    options: &ExportOptions,
    cancel: &CancellationToken,
) -> Result<(W, ExportSummary)>
where
    R: RepoSource + Sync,
    W: AsyncWrite + Unpin + Send,
{
    let mut writer = ArchiveWriter::new(output);

    match write_export(&mut writer, source, options, cancel).await {
        Ok(summary) => {
            let sink = writer.finish().await?;

            #[cfg(feature = "tracing")]
            tracing::info!(
                repo_bytes = summary.repo_bytes,
                blobs = summary.blobs,
                "export finished"
            );

            Ok((sink, summary))
        }
        Err(e) => {
            writer.abort();
            Err(e)
        }
    }
}

async fn write_export<R, W>(
    writer: &mut ArchiveWriter<W>,
    source: &R,
    options: &ExportOptions,
    cancel: &CancellationToken,
) -> Result<ExportSummary>
where
    R: RepoSource + Sync,
    W: AsyncWrite + Unpin + Send,
{
    let mut summary = ExportSummary::default();

    let did_json = source.did_document().await?;
    let _did_doc = parse_did_document(&did_json)?;

    #[cfg(feature = "tracing")]
    tracing::info!(did = %_did_doc.id, handle = _did_doc.handle(), "exporting repository");

    ensure_live(cancel)?;
    writer.append(DID_ENTRY, &did_json).await?;

    let car = source.repository().await?;
    ensure_live(cancel)?;
    writer.append(REPO_ENTRY, &car).await?;
    summary.repo_bytes = car.len();

    if !options.with_media {
        return Ok(summary);
    }

    let cids = source.list_blobs().await?;

    #[cfg(feature = "tracing")]
    tracing::info!(count = cids.len(), "downloading blobs");

    for cid in &cids {
        ensure_live(cancel)?;
        let data = source.blob(cid).await?;
        ensure_live(cancel)?;
        writer
            .append(&format!("blobs/{}", cid_segment(cid)), &data)
            .await?;
        summary.blobs += 1;

        #[cfg(feature = "tracing")]
        tracing::debug!(%cid, done = summary.blobs, total = cids.len(), "blob written");
    }

    Ok(summary)
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// Export laid out in a local directory
///
/// Expects `did.json` and `repo.car` at the top level, and blobs as files
/// under `blobs/` named by their CID, either flat or already bucketed
/// (`blobs/<bucket>/<rest>`).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Use the export at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn required(&self, name: &'static str) -> Result<Bytes> {
        match tokio::fs::read(self.root.join(name)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::MissingRequiredEntry { name })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn blob_path(&self, cid: &str) -> PathBuf {
        let blobs = self.root.join("blobs");
        let flat = blobs.join(cid);
        match tokio::fs::metadata(&flat).await {
            Ok(meta) if meta.is_file() => flat,
            _ => blobs.join(cid_segment(cid)),
        }
    }
}

impl RepoSource for DirectorySource {
    async fn did_document(&self) -> Result<Bytes> {
        self.required(DID_ENTRY).await
    }

    async fn repository(&self) -> Result<Bytes> {
        self.required(REPO_ENTRY).await
    }

    async fn list_blobs(&self) -> Result<Vec<SmolStr>> {
        let blobs = self.root.join("blobs");
        let mut cids = Vec::new();

        let mut dir = match tokio::fs::read_dir(&blobs).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(cids),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type().await?;

            if file_type.is_file() {
                cids.push(SmolStr::new(name));
            } else if file_type.is_dir() {
                let mut bucket = tokio::fs::read_dir(entry.path()).await?;
                while let Some(inner) = bucket.next_entry().await? {
                    if inner.file_type().await?.is_file() {
                        let rest = inner.file_name().to_string_lossy().into_owned();
                        cids.push(SmolStr::new(format!("{}{}", name, rest)));
                    }
                }
            }
        }

        cids.sort();
        Ok(cids)
    }

    async fn blob(&self, cid: &str) -> Result<Bytes> {
        Ok(Bytes::from(tokio::fs::read(self.blob_path(cid).await).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CID: &str = "bafkreiabcdefghijklmnop";

    async fn export_dir(with_blob: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("did.json"), br#"{"id":"did:web:example.com"}"#)
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("repo.car"), b"car bytes")
            .await
            .unwrap();
        if with_blob {
            tokio::fs::create_dir(dir.path().join("blobs")).await.unwrap();
            tokio::fs::write(dir.path().join("blobs").join(CID), b"image")
                .await
                .unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn lists_flat_and_bucketed_blobs() {
        let dir = export_dir(true).await;
        let bucket = dir.path().join("blobs").join("bafkreiz");
        tokio::fs::create_dir(&bucket).await.unwrap();
        tokio::fs::write(bucket.join("zzz"), b"other").await.unwrap();

        let source = DirectorySource::new(dir.path());
        let cids = source.list_blobs().await.unwrap();
        assert_eq!(cids, vec![CID, "bafkreizzzz"]);
        assert_eq!(&source.blob("bafkreizzzz").await.unwrap()[..], b"other");
    }

    #[tokio::test]
    async fn missing_did_json() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        assert!(matches!(
            source.did_document().await,
            Err(Error::MissingRequiredEntry { name: "did.json" })
        ));
    }

    #[tokio::test]
    async fn exports_bucketed_blobs() {
        let dir = export_dir(true).await;
        let source = DirectorySource::new(dir.path());

        let options = ExportOptions { with_media: true };
        let (bytes, summary) = export_archive(&source, Vec::new(), &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.blobs, 1);
        assert_eq!(summary.repo_bytes, 9);
        // did.json + repo.car + one blob, each one header and one data record
        assert_eq!(bytes.len(), 3 * 1024 + 1024);
        let needle = b"blobs/bafkreia/bcdefghijklmnop";
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }

    #[tokio::test]
    async fn cancelled_export_is_aborted() {
        let dir = export_dir(false).await;
        let source = DirectorySource::new(dir.path());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut out = Vec::new();
        let err = export_archive(&source, &mut out, &ExportOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(out.is_empty());
    }
}
