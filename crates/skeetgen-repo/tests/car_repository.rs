//! Repository reconstruction from synthetic CAR files

use bytes::Bytes;
use cid::Cid;
use ipld_core::ipld::Ipld;
use skeetgen_repo::mst::NodeData;
use skeetgen_repo::mst::util::compute_cid;
use skeetgen_repo::{
    Commit, PostGraph, RepoErrorKind, Repository, VerifyPolicy, write_car_bytes,
};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

const DID: &str = "did:web:example.com";

struct CarBuilder {
    blocks: BTreeMap<Cid, Bytes>,
}

impl CarBuilder {
    fn new() -> Self {
        Self {
            blocks: BTreeMap::new(),
        }
    }

    fn put<T: serde::Serialize>(&mut self, value: &T) -> Cid {
        let bytes = serde_ipld_dagcbor::to_vec(value).unwrap();
        let cid = compute_cid(&bytes).unwrap();
        self.blocks.insert(cid, Bytes::from(bytes));
        cid
    }

    /// Single-node MST holding `records`, under a v3 commit
    async fn build(mut self, mut records: Vec<(String, Ipld)>) -> Vec<u8> {
        records.sort_by(|a, b| a.0.cmp(&b.0));
        let entries: Vec<_> = records
            .into_iter()
            .map(|(key, value)| {
                let cid = self.put(&value);
                (key, cid, None)
            })
            .collect();

        let data = self.put(&NodeData::from_sorted(None, entries));
        let commit = self.put(&Commit {
            did: DID.into(),
            version: 3,
            data,
            rev: "3k2aaaaaaaaaa".into(),
            prev: None,
            sig: Bytes::from_static(&[0; 64]),
        });

        write_car_bytes(commit, self.blocks).await.unwrap()
    }
}

fn map(fields: Vec<(&str, Ipld)>) -> Ipld {
    Ipld::Map(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

fn post(text: &str, parent: Option<&str>) -> Ipld {
    let mut fields = vec![
        ("$type", Ipld::String("app.bsky.feed.post".into())),
        ("text", Ipld::String(text.into())),
        ("createdAt", Ipld::String("2024-01-01T00:00:00Z".into())),
    ];
    if let Some(uri) = parent {
        let strong = map(vec![
            ("uri", Ipld::String(uri.into())),
            ("cid", Ipld::String("bafyreiparent".into())),
        ]);
        fields.push((
            "reply",
            map(vec![("root", strong.clone()), ("parent", strong)]),
        ));
    }
    map(fields)
}

#[tokio::test]
async fn single_post_and_unknown_namespace() {
    let car = CarBuilder::new()
        .build(vec![
            ("app.bsky.feed.post/x".into(), post("hello", None)),
            (
                "app.bsky.unknown.thing/y".into(),
                map(vec![("whatever", Ipld::Integer(1))]),
            ),
        ])
        .await;

    let repo = Repository::from_car(&car, VerifyPolicy::Trust, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(repo.posts.len(), 1);
    assert_eq!(repo.posts["x"].text, "hello");
    assert_eq!(repo.skipped.get("app.bsky.unknown.thing"), Some(&1));
}

#[tokio::test]
async fn verified_load_accepts_honest_car() {
    let car = CarBuilder::new()
        .build(vec![("app.bsky.feed.post/3k2xaaaaaaaaa".into(), post("hi", None))])
        .await;

    let repo = Repository::from_car(&car, VerifyPolicy::Verify, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(repo.did(), Some(DID));
}

#[tokio::test]
async fn thread_links_within_repository() {
    let parent_uri = format!("at://{}/app.bsky.feed.post/3k2aaaaaaaaa1", DID);
    let car = CarBuilder::new()
        .build(vec![
            ("app.bsky.feed.post/3k2aaaaaaaaa1".into(), post("root", None)),
            (
                "app.bsky.feed.post/3k2aaaaaaaaa2".into(),
                post("reply", Some(&parent_uri)),
            ),
        ])
        .await;

    let repo = Repository::from_car(&car, VerifyPolicy::Trust, &CancellationToken::new())
        .await
        .unwrap();
    let graph = PostGraph::build(DID, &repo.posts);

    let root = graph.get("3k2aaaaaaaaa1").unwrap();
    assert_eq!(root.descendants, vec!["3k2aaaaaaaaa2"]);
    assert_eq!(graph.root_of("3k2aaaaaaaaa2"), "3k2aaaaaaaaa1");
}

#[tokio::test]
async fn car_without_commit_block() {
    let mut builder = CarBuilder::new();
    let stray = builder.put(&map(vec![("a", Ipld::Integer(1))]));
    let missing = compute_cid(b"not in the car").unwrap();
    let car = write_car_bytes(missing, builder.blocks).await.unwrap();
    assert_ne!(stray, missing);

    let err = Repository::from_car(&car, VerifyPolicy::Trust, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), &RepoErrorKind::MissingRoot);
}
