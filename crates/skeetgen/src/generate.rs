//! Export to archive generation
//!
//! Reads `did.json` and `repo.car` out of an export, reconstructs the
//! repository, and writes a new archive holding one JSON document per record
//! plus the timeline indexes and reply graph a viewer needs.

use crate::config::GenerateOptions;
use crate::error::{Error, Result};
use crate::input::{ArchiveInput, open_archive};
use bytes::Bytes;
use serde::Serialize;
use skeetgen_repo::graph::{PostGraph, PostGraphEntry, post_uri};
use skeetgen_repo::paths::rkey_segment;
use skeetgen_repo::record::{Post, Profile};
use skeetgen_repo::{DidDocument, ProfileSummary, Repository};
use skeetgen_tar::{ArchiveWriter, EntryType};
use smol_str::SmolStr;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

/// Entry holding the DID document
pub const DID_ENTRY: &str = "did.json";
/// Entry holding the repository CAR
pub const REPO_ENTRY: &str = "repo.car";
/// Prefix of blob entries
pub const BLOB_PREFIX: &str = "blobs/";

/// Repository read out of an export archive
#[derive(Debug, Clone)]
pub struct ExportContents {
    /// `did.json` exactly as stored
    pub did_json: Bytes,
    /// Parsed DID document
    pub did_doc: DidDocument,
    /// Reconstructed records
    pub repo: Repository,
}

impl ExportContents {
    /// Profile view built from the DID document and profile record
    pub fn profile(&self) -> ProfileSummary {
        self.repo.profile_summary(&self.did_doc)
    }
}

/// Counts of what a generation run wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateSummary {
    /// Post documents written
    pub posts: usize,
    /// Timeline pages written, across all timelines
    pub timeline_pages: usize,
    /// Blob entries copied
    pub blobs: usize,
    /// Total archive entries
    pub entries: usize,
    /// Total bytes written, terminator included
    pub bytes: u64,
}

/// Pull `did.json` and `repo.car` from an export and decode the repository
///
/// Traversal stops as soon as both entries are found. A missing entry is
/// reported before any CAR decoding happens.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
pub async fn read_repository<I: ArchiveInput + Sync>(
    input: &I,
    options: &GenerateOptions,
    cancel: &CancellationToken,
) -> Result<ExportContents> {
    let mut archive = open_archive(input).await?;

    let mut car: Option<Bytes> = None;
    let mut did_json: Option<Bytes> = None;

    while let Some(mut entry) = archive.next_entry().await? {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if entry.name == REPO_ENTRY {
            car = Some(entry.read_to_end().await?);
        } else if entry.name == DID_ENTRY {
            did_json = Some(entry.read_to_end().await?);
        }

        if car.is_some() && did_json.is_some() {
            break;
        }
    }

    let did_json = did_json.ok_or(Error::MissingRequiredEntry { name: DID_ENTRY })?;
    let car = car.ok_or(Error::MissingRequiredEntry { name: REPO_ENTRY })?;

    let did_doc = parse_did_document(&did_json)?;

    #[cfg(feature = "tracing")]
    tracing::info!(did = %did_doc.id, car_bytes = car.len(), "reading repository");

    let repo = Repository::from_car(&car, options.verify, cancel).await?;

    Ok(ExportContents {
        did_json,
        did_doc,
        repo,
    })
}

pub(crate) fn parse_did_document(bytes: &[u8]) -> Result<DidDocument> {
    let doc = DidDocument::from_slice(bytes).map_err(|e| Error::InvalidDidDocument(Some(e)))?;
    if !doc.has_did_id() {
        return Err(Error::InvalidDidDocument(None));
    }
    Ok(doc)
}

/// Generate an archive from an export
///
/// On success the archive is finished and the sink returned. On any error,
/// cancellation included, the writer is aborted: whatever reached `output`
/// has no terminator and must be discarded by the caller.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip_all))]
pub async fn generate_archive<I, W>(
    input: &I,
    output: W,
    options: &GenerateOptions,
    cancel: &CancellationToken,
) -> Result<(W, GenerateSummary)>
where
    I: ArchiveInput + Sync,
    W: AsyncWrite + Unpin + Send,
{
    let contents = read_repository(input, options, cancel).await?;

    let mut out = Output {
        writer: ArchiveWriter::new(output),
        cancel,
    };

    match write_archive(&mut out, input, &contents, options).await {
        Ok(mut summary) => {
            let writer = out.writer;
            summary.entries = writer.entries();
            let bytes_before = writer.bytes_written();
            let sink = writer.finish().await?;
            summary.bytes = bytes_before + 2 * skeetgen_tar::BLOCK_SIZE as u64;

            #[cfg(feature = "tracing")]
            tracing::info!(
                posts = summary.posts,
                pages = summary.timeline_pages,
                blobs = summary.blobs,
                entries = summary.entries,
                "archive generation finished"
            );

            Ok((sink, summary))
        }
        Err(e) => {
            out.writer.abort();
            Err(e)
        }
    }
}

/// Archive writer that checks for cancellation before every entry
struct Output<'c, W> {
    writer: ArchiveWriter<W>,
    cancel: &'c CancellationToken,
}

impl<W: AsyncWrite + Unpin + Send> Output<'_, W> {
    async fn raw(&mut self, path: &str, data: &[u8]) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.writer.append(path, data).await?;
        Ok(())
    }

    /// Write a record-bearing document as DAG-JSON, so CID links survive
    async fn dag_json<T: Serialize>(&mut self, path: &str, value: &T) -> Result<()> {
        let data = serde_ipld_dagjson::to_vec(value).map_err(|e| Error::encode(path, e))?;
        self.raw(path, &data).await
    }

    async fn json<T: Serialize>(&mut self, path: &str, value: &T) -> Result<()> {
        let data = serde_json::to_vec(value).map_err(|e| Error::encode(path, e))?;
        self.raw(path, &data).await
    }
}

#[derive(Serialize)]
struct ProfileDocument<'a> {
    profile: &'a ProfileSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<&'a Profile>,
}

#[derive(Serialize)]
struct PostDocument<'a> {
    uri: String,
    rkey: &'a str,
    post: &'a Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread: Option<&'a PostGraphEntry>,
    /// Top-most ancestor within the repository, for replies
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_root: Option<&'a str>,
}

#[derive(Serialize)]
struct TimelineItem<'a> {
    uri: String,
    rkey: &'a str,
    path: String,
}

#[derive(Serialize)]
struct TimelinePage<'a> {
    kind: &'a str,
    page: usize,
    total_pages: usize,
    posts: Vec<TimelineItem<'a>>,
}

/// Which posts a timeline shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineKind {
    /// Every post, replies included
    WithReplies,
    /// Top-level posts only
    Posts,
    /// Posts with image embeds
    Media,
}

impl TimelineKind {
    /// All timelines, in the order they are written
    pub const ALL: [TimelineKind; 3] = [Self::WithReplies, Self::Posts, Self::Media];

    /// Directory name under `timeline/`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WithReplies => "with_replies",
            Self::Posts => "posts",
            Self::Media => "media",
        }
    }

    /// Whether `post` belongs on this timeline
    pub fn includes(&self, post: &Post) -> bool {
        match self {
            Self::WithReplies => true,
            Self::Posts => !post.is_reply(),
            Self::Media => post.has_images(),
        }
    }
}

/// Split posts into pages of `per_page`, always yielding at least one page
pub fn paginate<T>(items: &[T], per_page: usize) -> Vec<&[T]> {
    if items.is_empty() {
        return vec![items];
    }
    items.chunks(per_page.max(1)).collect()
}

async fn write_archive<I, W>(
    out: &mut Output<'_, W>,
    input: &I,
    contents: &ExportContents,
    options: &GenerateOptions,
) -> Result<GenerateSummary>
where
    I: ArchiveInput + Sync,
    W: AsyncWrite + Unpin + Send,
{
    let mut summary = GenerateSummary::default();
    let repo = &contents.repo;
    let did = contents.did_doc.id.as_str();

    out.raw(DID_ENTRY, &contents.did_json).await?;

    let profile = contents.profile();
    out.dag_json(
        "profile.json",
        &ProfileDocument {
            profile: &profile,
            record: repo.profile.as_ref(),
        },
    )
    .await?;

    let graph = PostGraph::build(did, &repo.posts);

    for (rkey, post) in &repo.posts {
        let path = format!("posts/{}.json", rkey_segment(rkey));
        out.dag_json(
            &path,
            &PostDocument {
                uri: post_uri(did, rkey),
                rkey,
                post,
                thread: graph.get(rkey),
                thread_root: post.is_reply().then(|| graph.root_of(rkey)),
            },
        )
        .await?;
        summary.posts += 1;
    }

    for (rkey, feed) in &repo.feeds {
        out.dag_json(&format!("feeds/{}.json", rkey_segment(rkey)), feed).await?;
    }
    for (rkey, list) in &repo.lists {
        out.dag_json(&format!("lists/{}.json", rkey_segment(rkey)), list).await?;
    }
    for (rkey, gate) in &repo.threadgates {
        out.dag_json(&format!("threadgates/{}.json", rkey_segment(rkey)), gate)
            .await?;
    }

    out.json("threads.json", &graph).await?;

    #[cfg(feature = "tracing")]
    tracing::debug!(posts = summary.posts, "records written");

    let newest_first = repo.posts_newest_first();
    for kind in TimelineKind::ALL {
        let posts: Vec<(&SmolStr, &Post)> = newest_first
            .iter()
            .copied()
            .filter(|(_, post)| kind.includes(post))
            .collect();
        summary.timeline_pages += write_timeline(out, did, kind, &posts, options.posts_per_page).await?;
    }

    if options.with_media {
        summary.blobs = copy_blobs(out, input).await?;
    }

    Ok(summary)
}

async fn write_timeline<W: AsyncWrite + Unpin + Send>(
    out: &mut Output<'_, W>,
    did: &str,
    kind: TimelineKind,
    posts: &[(&SmolStr, &Post)],
    per_page: usize,
) -> Result<usize> {
    let pages = paginate(posts, per_page);
    let total_pages = pages.len();

    for (i, page) in pages.into_iter().enumerate() {
        let document = TimelinePage {
            kind: kind.as_str(),
            page: i + 1,
            total_pages,
            posts: page
                .iter()
                .map(|(rkey, _)| TimelineItem {
                    uri: post_uri(did, rkey),
                    rkey,
                    path: format!("posts/{}.json", rkey_segment(rkey)),
                })
                .collect(),
        };
        out.json(&format!("timeline/{}/{}.json", kind.as_str(), i + 1), &document)
            .await?;
    }

    Ok(total_pages)
}

/// Second pass over the input, copying every regular `blobs/` entry verbatim
async fn copy_blobs<I, W>(out: &mut Output<'_, W>, input: &I) -> Result<usize>
where
    I: ArchiveInput + Sync,
    W: AsyncWrite + Unpin + Send,
{
    let mut archive = open_archive(input).await?;
    let mut copied = 0;

    while let Some(mut entry) = archive.next_entry().await? {
        if out.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if entry.entry_type != EntryType::File || !entry.name.starts_with(BLOB_PREFIX) {
            continue;
        }

        let name = entry.name.clone();
        let data = entry.read_to_end().await?;
        out.raw(&name, &data).await?;
        copied += 1;

        #[cfg(feature = "tracing")]
        tracing::debug!(name = %name, size = data.len(), copied, "blob copied");
    }

    #[cfg(feature = "tracing")]
    tracing::info!(copied, "media files copied");

    Ok(copied)
}
