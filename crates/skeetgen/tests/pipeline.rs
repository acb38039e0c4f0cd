//! End-to-end runs of the export and generation pipelines

use bytes::Bytes;
use ipld_core::ipld::Ipld;
use skeetgen::input::open_archive;
use skeetgen::{
    DirectorySource, Error, ExportOptions, GenerateOptions, MemoryInput, export_archive,
    generate_archive, read_repository,
};
use skeetgen_repo::mst::NodeData;
use skeetgen_repo::mst::util::compute_cid;
use skeetgen_repo::paths::rkey_segment;
use skeetgen_repo::{Commit, write_car_bytes};
use skeetgen_tar::ArchiveWriter;
use std::collections::BTreeMap;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

const DID: &str = "did:web:example.com";
const DID_JSON: &[u8] = br#"{"id":"did:web:example.com","alsoKnownAs":["at://example.com"]}"#;
const POST_RKEY: &str = "3k2xaaaaaaaaa";

fn map(fields: Vec<(&str, Ipld)>) -> Ipld {
    Ipld::Map(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

fn text(s: &str) -> Ipld {
    Ipld::String(s.to_string())
}

/// CAR holding one commit whose MST has the given records
async fn repo_car(records: Vec<(&str, Ipld)>) -> Vec<u8> {
    let mut blocks = BTreeMap::new();
    let mut put = |bytes: Vec<u8>| {
        let cid = compute_cid(&bytes).unwrap();
        blocks.insert(cid, Bytes::from(bytes));
        cid
    };

    let mut entries = Vec::new();
    for (key, value) in records {
        let cid = put(serde_ipld_dagcbor::to_vec(&value).unwrap());
        entries.push((key.to_string(), cid, None));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let data = put(serde_ipld_dagcbor::to_vec(&NodeData::from_sorted(None, entries)).unwrap());
    let commit = Commit {
        did: DID.into(),
        version: 3,
        data,
        rev: "3k2aaaaaaaaaa".into(),
        prev: None,
        sig: Bytes::from_static(&[0; 64]),
    };
    let root = put(commit.to_cbor().unwrap());

    write_car_bytes(root, blocks).await.unwrap()
}

fn single_post() -> Vec<(&'static str, Ipld)> {
    vec![(
        "app.bsky.feed.post/3k2xaaaaaaaaa",
        map(vec![
            ("$type", text("app.bsky.feed.post")),
            ("text", text("hello from the archive")),
            ("createdAt", text("2024-01-01T00:00:00Z")),
        ]),
    )]
}

async fn tar(entries: Vec<(&str, Vec<u8>)>) -> Vec<u8> {
    let mut writer = ArchiveWriter::new(Vec::new());
    for (name, data) in entries {
        writer.append(name, &data).await.unwrap();
    }
    writer.finish().await.unwrap()
}

async fn untar(bytes: Vec<u8>) -> BTreeMap<String, Bytes> {
    let input = MemoryInput::with_chunk_size(bytes, 777);
    let mut archive = open_archive(&input).await.unwrap();
    let mut out = BTreeMap::new();
    while let Some(mut entry) = archive.next_entry().await.unwrap() {
        let name = entry.name.to_string();
        out.insert(name, entry.read_to_end().await.unwrap());
    }
    out
}

fn json(bytes: &Bytes) -> serde_json::Value {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn decodes_single_post_export() {
    let input = MemoryInput::new(
        tar(vec![
            ("did.json", DID_JSON.to_vec()),
            ("repo.car", repo_car(single_post()).await),
        ])
        .await,
    );

    let contents = read_repository(&input, &GenerateOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(contents.repo.posts.len(), 1);
    assert_eq!(contents.did_doc.id, DID);
    assert_eq!(&contents.did_json[..], DID_JSON);
    assert_eq!(contents.profile().handle, "example.com");
}

#[tokio::test]
async fn generates_documents_and_timelines() {
    let mut records = single_post();
    records.push((
        "app.bsky.actor.profile/self",
        map(vec![("displayName", text(" Example "))]),
    ));
    records.push(("app.bsky.unknown.thing/y", map(vec![("x", Ipld::Integer(1))])));

    let input = MemoryInput::new(
        tar(vec![
            ("repo.car", repo_car(records).await),
            ("did.json", DID_JSON.to_vec()),
            ("blobs/bafkreia/bcdef", b"image bytes".to_vec()),
        ])
        .await,
    );

    let options = GenerateOptions {
        with_media: true,
        ..Default::default()
    };
    let (bytes, summary) = generate_archive(&input, Vec::new(), &options, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.posts, 1);
    assert_eq!(summary.timeline_pages, 3);
    assert_eq!(summary.blobs, 1);
    assert_eq!(summary.bytes, bytes.len() as u64);
    assert!(bytes[bytes.len() - 1024..].iter().all(|b| *b == 0));

    let files = untar(bytes).await;
    assert_eq!(&files["did.json"][..], DID_JSON);
    assert_eq!(&files["blobs/bafkreia/bcdef"][..], b"image bytes");

    let post = json(&files["posts/3k2/xaaaaaaaaa.json"]);
    assert_eq!(post["rkey"], POST_RKEY);
    assert_eq!(post["post"]["text"], "hello from the archive");
    assert_eq!(
        post["uri"],
        format!("at://{}/app.bsky.feed.post/{}", DID, POST_RKEY)
    );

    let profile = json(&files["profile.json"]);
    assert_eq!(profile["profile"]["displayName"], "Example");

    let timeline = json(&files["timeline/with_replies/1.json"]);
    assert_eq!(timeline["total_pages"], 1);
    assert_eq!(timeline["posts"][0]["rkey"], POST_RKEY);

    let media = json(&files["timeline/media/1.json"]);
    assert_eq!(media["posts"].as_array().unwrap().len(), 0);

    assert!(files.contains_key("threads.json"));
    assert!(!files.keys().any(|name| name.contains("unknown")));
}

#[tokio::test]
async fn long_record_keys_fit_in_archive_paths() {
    let rkey = "l".repeat(200);
    let list_key = format!("app.bsky.graph.list/{}", rkey);
    let post_key = format!("app.bsky.feed.post/{}", rkey);

    let records = vec![
        (list_key.as_str(), map(vec![("name", text("long"))])),
        (post_key.as_str(), map(vec![("text", text("long key"))])),
    ];
    let input = MemoryInput::new(
        tar(vec![
            ("did.json", DID_JSON.to_vec()),
            ("repo.car", repo_car(records).await),
        ])
        .await,
    );

    let (bytes, summary) = generate_archive(
        &input,
        Vec::new(),
        &GenerateOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(summary.posts, 1);

    let files = untar(bytes).await;
    let segment = rkey_segment(&rkey);
    assert_eq!(json(&files[&format!("lists/{}.json", segment)])["name"], "long");
    let post = json(&files[&format!("posts/{}.json", segment)]);
    assert_eq!(post["rkey"], rkey);
}

#[tokio::test]
async fn missing_did_json_is_reported_before_car_decoding() {
    let input = MemoryInput::new(tar(vec![("repo.car", b"not a car".to_vec())]).await);

    let err = read_repository(&input, &GenerateOptions::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingRequiredEntry { name: "did.json" }));
}

#[tokio::test]
async fn missing_repo_car() {
    let input = MemoryInput::new(tar(vec![("did.json", DID_JSON.to_vec())]).await);

    let err = read_repository(&input, &GenerateOptions::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingRequiredEntry { name: "repo.car" }));
}

/// Sink that signals cancellation as soon as anything is written to it
#[derive(Debug)]
struct CancelOnWrite {
    inner: Vec<u8>,
    cancel: CancellationToken,
}

impl AsyncWrite for CancelOnWrite {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.cancel.cancel();
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[tokio::test]
async fn cancellation_aborts_without_terminator() {
    let input = MemoryInput::new(
        tar(vec![
            ("did.json", DID_JSON.to_vec()),
            ("repo.car", repo_car(single_post()).await),
        ])
        .await,
    );

    let cancel = CancellationToken::new();
    let mut sink = CancelOnWrite {
        inner: Vec::new(),
        cancel: cancel.clone(),
    };

    let err = generate_archive(&input, &mut sink, &GenerateOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());

    // only did.json made it out, and no end-of-archive records followed it
    assert_eq!(sink.inner.len(), 1024);
    assert!(sink.inner.starts_with(b"did.json"));
    assert!(sink.inner[512..].starts_with(DID_JSON));
}

#[tokio::test]
async fn pack_then_generate() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("did.json"), DID_JSON)
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("repo.car"), repo_car(single_post()).await)
        .await
        .unwrap();
    tokio::fs::create_dir(dir.path().join("blobs")).await.unwrap();
    tokio::fs::write(dir.path().join("blobs").join("bafkreiqwertyuiop"), b"png")
        .await
        .unwrap();

    let source = DirectorySource::new(dir.path());
    let (bundle, summary) = export_archive(
        &source,
        Vec::new(),
        &ExportOptions { with_media: true },
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(summary.blobs, 1);

    let options = GenerateOptions {
        with_media: true,
        ..Default::default()
    };
    let (archive, summary) = generate_archive(
        &MemoryInput::new(bundle),
        Vec::new(),
        &options,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(summary.posts, 1);

    let files = untar(archive).await;
    assert_eq!(&files["blobs/bafkreiq/wertyuiop"][..], b"png");
}
