//! Encode/decode behaviour across whole archives

use skeetgen_tar::{
    Archive, ArchiveError, ArchiveWriter, BLOCK_SIZE, ByteSource, EntryAttributes, encode_entry,
};

fn attrs() -> EntryAttributes {
    EntryAttributes {
        mtime: 1_700_000_000,
        ..Default::default()
    }
}

async fn decode_all(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
    let mut archive = Archive::new(ByteSource::from_reader(std::io::Cursor::new(bytes)));
    let mut out = Vec::new();

    while let Some(mut entry) = archive.next_entry().await.unwrap() {
        let data = entry.read_to_end().await.unwrap();
        out.push((entry.name.to_string(), data.to_vec()));
    }

    out
}

#[tokio::test]
async fn names_survive_at_length_boundaries() {
    let names = [
        "a".to_string(),
        "b".repeat(100),
        format!("blobs/{}", "c".repeat(95)),
    ];
    assert_eq!(names[2].len(), 101);

    let mut writer = ArchiveWriter::with_attributes(Vec::new(), attrs());
    for (i, name) in names.iter().enumerate() {
        writer.append(name, &vec![i as u8; i * 300]).await.unwrap();
    }
    let bytes = writer.finish().await.unwrap();

    let decoded = decode_all(bytes).await;
    assert_eq!(decoded.len(), 3);
    for (i, (name, data)) in decoded.iter().enumerate() {
        assert_eq!(name, &names[i]);
        assert_eq!(data, &vec![i as u8; i * 300]);
    }
}

#[test]
fn long_name_without_slash_is_rejected() {
    let err = encode_entry(&"d".repeat(101), b"", &attrs()).unwrap_err();
    assert!(matches!(err, ArchiveError::NameTooLong { len: 101 }));
}

#[tokio::test]
async fn skipping_entries_keeps_alignment() {
    let mut writer = ArchiveWriter::with_attributes(Vec::new(), attrs());
    for i in 0..10u8 {
        let name = format!("blobs/bafkreia{}/rest{}", i, i);
        writer
            .append(&name, &vec![i; 100 + i as usize * 97])
            .await
            .unwrap();
    }
    writer.append("did.json", b"{}").await.unwrap();
    let bytes = writer.finish().await.unwrap();

    let mut archive = Archive::new(ByteSource::from_reader(std::io::Cursor::new(bytes)));
    let mut seen = 0;
    let mut last = None;
    while let Some(mut entry) = archive.next_entry().await.unwrap() {
        seen += 1;
        if entry.name == "did.json" {
            last = Some(entry.read_to_end().await.unwrap());
        }
    }

    assert_eq!(seen, 11);
    assert_eq!(last.as_deref(), Some(&b"{}"[..]));
}

#[tokio::test]
async fn archive_written_to_file_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.tar");

    let file = tokio::fs::File::create(&path).await.unwrap();
    let mut writer = ArchiveWriter::with_attributes(file, attrs());
    writer.append("repo.car", &[1u8; 5000]).await.unwrap();
    writer.finish().await.unwrap();

    let len = tokio::fs::metadata(&path).await.unwrap().len();
    assert_eq!(len, (BLOCK_SIZE + 5120 + BLOCK_SIZE * 2) as u64);

    let file = tokio::fs::File::open(&path).await.unwrap();
    let mut archive = Archive::new(ByteSource::from_reader(file));
    let mut entry = archive.next_entry().await.unwrap().unwrap();
    assert_eq!(entry.name, "repo.car");
    assert_eq!(entry.read_to_end().await.unwrap().len(), 5000);
}
