//! Behaviour every backend must share.
//!
//! Run with: `cargo test -p sanzaru-storage --test contract_test`

mod helpers;

use bytes::Bytes;
use helpers::{TestDatabricks, TestLocal, DIRS};
use sanzaru_storage::{PathType, Storage, StorageError, StorageResult, UserContext};
use std::collections::HashSet;

fn abc_stream() -> sanzaru_storage::ByteStream {
    let chunks: Vec<StorageResult<Bytes>> = vec![
        Ok(Bytes::from_static(b"a")),
        Ok(Bytes::from_static(b"b")),
        Ok(Bytes::from_static(b"c")),
    ];
    Box::pin(futures::stream::iter(chunks))
}

const PAYLOAD: &str = "frame\u{0}\u{1F3AC}\r\nend";

async fn assert_round_trip(storage: &dyn Storage, filename: &str, data: &[u8]) {
    storage
        .write(None, PathType::Reference, filename, data.to_vec())
        .await
        .unwrap();
    let read = storage
        .read(None, PathType::Reference, filename)
        .await
        .unwrap();
    assert_eq!(read, data);
}

async fn assert_traversal_rejected(storage: &dyn Storage) {
    for filename in ["../../etc/passwd", "..", ""] {
        let result = storage.read(None, PathType::Video, filename).await;
        assert!(
            matches!(result, Err(StorageError::InvalidArgument(_))),
            "{:?} was not rejected",
            filename
        );
        assert!(!storage.exists(None, PathType::Video, filename).await);
        assert!(storage
            .resolve_display_path(None, PathType::Video, filename)
            .is_err());
    }
}

#[tokio::test]
async fn test_local_round_trip() {
    let local = TestLocal::new().await;
    assert_round_trip(local.storage.as_ref(), "bytes.bin", &[0, 159, 146, 150, 255]).await;
    assert_round_trip(local.storage.as_ref(), "text.bin", PAYLOAD.as_bytes()).await;
}

#[tokio::test]
async fn test_databricks_round_trip() {
    let mut remote = TestDatabricks::new().await;
    let (put, _get) = remote.mock_object("images/text.bin", PAYLOAD).await;
    assert_round_trip(remote.storage.as_ref(), "text.bin", PAYLOAD.as_bytes()).await;
    put.assert_async().await;
}

#[tokio::test]
async fn test_local_write_stream_concatenates() {
    let local = TestLocal::new().await;
    local
        .storage
        .write_stream(None, PathType::Audio, "abc.mp3", abc_stream())
        .await
        .unwrap();
    let read = local
        .storage
        .read(None, PathType::Audio, "abc.mp3")
        .await
        .unwrap();
    assert_eq!(read, b"abc");
}

#[tokio::test]
async fn test_databricks_write_stream_concatenates() {
    let mut remote = TestDatabricks::new().await;
    let (put, _get) = remote.mock_object("audio/abc.mp3", "abc").await;
    remote
        .storage
        .write_stream(None, PathType::Audio, "abc.mp3", abc_stream())
        .await
        .unwrap();
    put.assert_async().await;
}

#[tokio::test]
async fn test_local_extension_filter() {
    let local = TestLocal::new().await;
    for name in ["a.png", "b.jpg", "c.png"] {
        local
            .storage
            .write(None, PathType::Reference, name, b"x".to_vec())
            .await
            .unwrap();
    }

    let pngs = HashSet::from([".png".to_string()]);
    let files = local
        .storage
        .list_files(None, PathType::Reference, "*", Some(&pngs))
        .await
        .unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a.png", "c.png"]);
}

#[tokio::test]
async fn test_databricks_extension_filter() {
    let mut remote = TestDatabricks::new().await;
    remote
        .server
        .mock("GET", format!("{}/images", DIRS).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!({
                "contents": [
                    { "name": "a.png", "file_size": 1, "last_modified": 0 },
                    { "name": "b.jpg", "file_size": 1, "last_modified": 0 },
                    { "name": "c.png", "file_size": 1, "last_modified": 0 }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let pngs = HashSet::from([".png".to_string()]);
    let files = remote
        .storage
        .list_files(None, PathType::Reference, "*", Some(&pngs))
        .await
        .unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a.png", "c.png"]);
}

#[tokio::test]
async fn test_traversal_rejected_by_every_backend() {
    let local = TestLocal::new().await;
    assert_traversal_rejected(local.storage.as_ref()).await;

    let remote = TestDatabricks::new().await;
    assert_traversal_rejected(remote.storage.as_ref()).await;
}

#[tokio::test]
async fn test_local_tempfile_commit_is_readable() {
    let local = TestLocal::new().await;
    let guard = local
        .storage
        .local_tempfile(None, PathType::Video, "render.mp4")
        .unwrap();
    std::fs::write(guard.path(), b"frames").unwrap();
    let display = guard.commit().await.unwrap();

    assert!(display.ends_with("videos/render.mp4"));
    let read = local
        .storage
        .read(None, PathType::Video, "render.mp4")
        .await
        .unwrap();
    assert_eq!(read, b"frames");
}

#[tokio::test]
async fn test_tenants_are_isolated_remotely() {
    let mut remote = TestDatabricks::new().await;
    let (put, _get) = remote.mock_object("alice/images/portrait.png", "alice").await;

    let alice = UserContext::new("alice@example.com").unwrap();
    let bob = UserContext::new("bob@example.com").unwrap();

    let location = remote
        .storage
        .write(Some(&alice), PathType::Reference, "portrait.png", b"alice".to_vec())
        .await
        .unwrap();
    assert_eq!(location, "/Volumes/catalog/schema/vol/alice/images/portrait.png");
    assert_eq!(
        remote
            .storage
            .resolve_display_path(Some(&bob), PathType::Reference, "portrait.png")
            .unwrap(),
        "/Volumes/catalog/schema/vol/bob/images/portrait.png"
    );
    put.assert_async().await;
}
