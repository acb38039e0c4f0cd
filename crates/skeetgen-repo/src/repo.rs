//! Repository reconstruction
//!
//! Walks the MST of a single commit and routes each record into a typed,
//! rkey-indexed collection.

use crate::car::parse_car_bytes;
use crate::commit::Commit;
use crate::did_doc::DidDocument;
use crate::error::{RepoError, Result};
use crate::mst::MstWalker;
use crate::mst::util::split_key;
use crate::record::{FeedGenerator, List, Post, Profile, Record, RecordKind, Threadgate};
use crate::storage::{BlockStore, VerifyPolicy, get_required};
use cid::Cid as IpldCid;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use tokio_util::sync::CancellationToken;

/// Records of one repository snapshot, grouped by collection
///
/// Maps are keyed by rkey. Records from collections that aren't modeled are
/// not decoded; they are only counted in `skipped`. A record in a modeled
/// collection whose block doesn't decode fails the whole reconstruction.
///
/// # Example
///
/// ```rust,ignore
/// use skeetgen_repo::{Repository, VerifyPolicy};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(car: &[u8]) -> skeetgen_repo::Result<()> {
/// let repo = Repository::from_car(car, VerifyPolicy::Trust, &CancellationToken::new()).await?;
/// for (rkey, post) in repo.posts_newest_first() {
///     println!("{}: {}", rkey, post.text);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Repository {
    /// Root commit
    pub commit: Option<Commit>,
    /// `app.bsky.actor.profile`, last one wins
    pub profile: Option<Profile>,
    /// `app.bsky.feed.post`
    pub posts: BTreeMap<SmolStr, Post>,
    /// `app.bsky.feed.generator`
    pub feeds: BTreeMap<SmolStr, FeedGenerator>,
    /// `app.bsky.graph.list`
    pub lists: BTreeMap<SmolStr, List>,
    /// `app.bsky.feed.threadgate`
    pub threadgates: BTreeMap<SmolStr, Threadgate>,
    /// Count of records per unrecognized collection
    pub skipped: BTreeMap<SmolStr, usize>,
}

impl Repository {
    /// Parse a CAR and reconstruct the repository its root commit describes
    pub async fn from_car(
        car: &[u8],
        verify: VerifyPolicy,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let (root, store) = parse_car_bytes(car, cancel).await?.into_store(verify);
        Self::reconstruct(&store, &root, cancel).await
    }

    /// Reconstruct from a block store and the CID of the root commit
    ///
    /// Cancellation is checked before every record; a cancelled walk returns
    /// `Cancelled` without visiting the rest of the tree.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(root = %commit_cid)))]
    pub async fn reconstruct<S: BlockStore + Sync>(
        store: &S,
        commit_cid: &IpldCid,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let commit_bytes = store
            .get(commit_cid)
            .await?
            .ok_or_else(|| RepoError::missing_root(commit_cid))?;
        let commit = Commit::from_cbor(&commit_bytes)?;

        let mut repo = Repository::default();
        let mut walker = MstWalker::new(store, *commit.data());

        loop {
            if cancel.is_cancelled() {
                return Err(RepoError::cancelled());
            }

            let Some((key, cid)) = walker.next().await? else {
                break;
            };

            let Ok((collection, rkey)) = split_key(&key) else {
                #[cfg(feature = "tracing")]
                tracing::trace!(%key, "skipping malformed key");
                continue;
            };

            let kind = RecordKind::from_collection(collection);
            if kind == RecordKind::Unrecognized {
                *repo.skipped.entry(SmolStr::new(collection)).or_default() += 1;
                continue;
            }

            let bytes = get_required(store, &cid).await?;
            let record = Record::decode(kind, &bytes)
                .map_err(|e| e.with_context(format!("record {} ({})", key, cid)))?;
            repo.insert(SmolStr::new(rkey), record);
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            did = %commit.did,
            posts = repo.posts.len(),
            feeds = repo.feeds.len(),
            lists = repo.lists.len(),
            threadgates = repo.threadgates.len(),
            profile = repo.profile.is_some(),
            skipped = repo.skipped.values().sum::<usize>(),
            "repository reconstructed"
        );

        repo.commit = Some(commit);
        Ok(repo)
    }

    fn insert(&mut self, rkey: SmolStr, record: Record) {
        match record {
            Record::Post(post) => {
                self.posts.insert(rkey, post);
            }
            Record::Profile(profile) => self.profile = Some(profile),
            Record::FeedGenerator(feed) => {
                self.feeds.insert(rkey, feed);
            }
            Record::List(list) => {
                self.lists.insert(rkey, list);
            }
            Record::Threadgate(gate) => {
                self.threadgates.insert(rkey, gate);
            }
            Record::Unrecognized => {}
        }
    }

    /// DID named by the root commit
    pub fn did(&self) -> Option<&str> {
        self.commit.as_ref().map(|c| c.did.as_str())
    }

    /// Posts sorted newest first
    ///
    /// TID rkeys sort by creation time, so this is descending rkey order.
    pub fn posts_newest_first(&self) -> Vec<(&SmolStr, &Post)> {
        self.posts.iter().rev().collect()
    }

    /// Basic profile view for the account
    pub fn profile_summary(&self, did_doc: &DidDocument) -> ProfileSummary {
        let profile = self.profile.as_ref();
        ProfileSummary {
            did: did_doc.id.clone(),
            handle: did_doc.handle().to_string(),
            display_name: profile
                .and_then(|p| p.display_name.as_deref())
                .map(|name| name.trim().to_string()),
            avatar: profile
                .and_then(|p| p.avatar.as_ref())
                .and_then(|blob| blob.cid_string()),
            pds: did_doc.pds_endpoint().map(|url| url.to_string()),
        }
    }
}

impl Display for Repository {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Repository {{")?;
        if let Some(commit) = &self.commit {
            writeln!(f, "  DID: {}", commit.did)?;
            writeln!(f, "  Rev: {}", commit.rev)?;
            writeln!(f, "  Data: {}", commit.data())?;
        }
        writeln!(f, "  Profile: {}", self.profile.is_some())?;
        writeln!(f, "  Posts: {}", self.posts.len())?;
        writeln!(f, "  Feeds: {}", self.feeds.len())?;
        writeln!(f, "  Lists: {}", self.lists.len())?;
        writeln!(f, "  Threadgates: {}", self.threadgates.len())?;
        for (collection, count) in &self.skipped {
            writeln!(f, "  Skipped {}: {}", collection, count)?;
        }
        write!(f, "}}")
    }
}

/// Profile fields shown alongside the archive
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    /// Account DID, from the DID document
    pub did: String,
    /// First `at://` handle, or `handle.invalid`
    pub handle: String,
    /// Trimmed display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Avatar blob CID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// PDS the account was hosted on, from the DID document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pds: Option<String>,
}
