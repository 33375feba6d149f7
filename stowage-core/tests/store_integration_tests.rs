//! Integration tests for the file store.
//!
//! These exercise the public API end to end: staging, persistence,
//! conflict handling and deletion against a real temporary directory.

use std::io::Read;
use std::sync::Arc;

use stowage_core::storage::{ReadSource, StoreKey};
use stowage_core::{FileStore, PutOptions, ReadMode, Storage, StoreConfig, StoreError};
use tokio::io::AsyncReadExt;

/// Test fixture owning a temporary base directory.
struct StoreFixture {
    _temp_dir: tempfile::TempDir,
    store: FileStore,
}

impl StoreFixture {
    fn new() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(StoreConfig::for_testing(temp_dir.path()));

        Self {
            _temp_dir: temp_dir,
            store,
        }
    }

    fn disk_contents(&self, path: &str, name: &str) -> Option<Vec<u8>> {
        let file_path = StoreKey::new(path, name)
            .unwrap()
            .file_under(self.store.base_dir());
        std::fs::read(file_path).ok()
    }

    async fn read_async(&self, path: &str, name: &str) -> Vec<u8> {
        let mut reader = self.store.get_async(path, name).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        out
    }
}

#[tokio::test]
async fn test_hello_scenario() {
    let fixture = StoreFixture::new();

    fixture
        .store
        .put("docs", "a.txt", &b"hello"[..], PutOptions::default())
        .await
        .unwrap();

    let handle = fixture.store.get("docs", "a.txt", ReadMode::Blocking).unwrap();
    let mut out = Vec::new();
    handle.into_blocking().unwrap().read_to_end(&mut out).unwrap();

    assert_eq!(out, b"hello");
    assert_eq!(fixture.disk_contents("docs", "a.txt").unwrap(), b"hello");
}

#[tokio::test]
async fn test_second_put_without_force_conflicts() {
    let fixture = StoreFixture::new();

    fixture
        .store
        .put("docs", "a.txt", &b"v1"[..], PutOptions::default())
        .await
        .unwrap();
    let second = fixture
        .store
        .put("docs", "a.txt", &b"v2"[..], PutOptions::default())
        .await;

    assert!(matches!(second, Err(StoreError::AlreadyExists { .. })));
    assert_eq!(fixture.disk_contents("docs", "a.txt").unwrap(), b"v1");
}

#[tokio::test]
async fn test_delete_missing_scenario() {
    let fixture = StoreFixture::new();

    assert!(!fixture.store.delete("docs", "missing.txt").await.unwrap());
}

#[tokio::test]
async fn test_read_interface_independent_of_source() {
    let fixture = StoreFixture::new();

    fixture
        .store
        .put("docs", "a.txt", &b"persisted"[..], PutOptions::default())
        .await
        .unwrap();
    let _ = fixture
        .store
        .put("docs", "a.txt", &b"staged"[..], PutOptions::default())
        .await;

    // Staged copy wins over the persisted one while it exists
    let staged = fixture.store.get_async("docs", "a.txt").unwrap();
    assert_eq!(staged.source(), ReadSource::Cache);
    assert_eq!(fixture.read_async("docs", "a.txt").await, b"staged");

    fixture
        .store
        .put("docs", "b.txt", &b"persisted"[..], PutOptions::default())
        .await
        .unwrap();
    let persisted = fixture.store.get_async("docs", "b.txt").unwrap();
    assert_eq!(persisted.source(), ReadSource::Disk);
    assert_eq!(fixture.read_async("docs", "b.txt").await, b"persisted");
}

#[tokio::test]
async fn test_stage_survives_outstanding_readers() {
    let fixture = StoreFixture::new();

    fixture
        .store
        .put("docs", "a.txt", &b"v1"[..], PutOptions::default())
        .await
        .unwrap();
    let _ = fixture
        .store
        .put("docs", "a.txt", &b"v2"[..], PutOptions::default())
        .await;

    // Releasing one reader leaves the stage intact for the next
    for _ in 0..3 {
        let reader = fixture.store.get_blocking("docs", "a.txt").unwrap();
        drop(reader);
    }
    assert_eq!(fixture.store.opened_times("docs", "a.txt"), Some(3));
    assert_eq!(fixture.read_async("docs", "a.txt").await, b"v2");
}

#[tokio::test]
async fn test_many_concurrent_keys() {
    let fixture = StoreFixture::new();
    let store = fixture.store.clone();

    let mut tasks = Vec::new();
    for i in 0..32 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let path = format!("bucket_{}", i % 4);
            let name = format!("file_{i}.bin");
            let data = format!("payload {i}").into_bytes();
            store
                .put(&path, &name, data, PutOptions::default())
                .await
                .unwrap()
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_persisted());
    }

    assert_eq!(store.stats().staged_entries, 0);
    assert_eq!(store.stats().persisted_writes, 32);
    for i in 0..32 {
        let path = format!("bucket_{}", i % 4);
        let name = format!("file_{i}.bin");
        assert_eq!(
            fixture.disk_contents(&path, &name).unwrap(),
            format!("payload {i}").into_bytes()
        );
    }
}

#[tokio::test]
async fn test_underscore_keys_do_not_collide() {
    let fixture = StoreFixture::new();

    fixture
        .store
        .put("a_b", "c", &b"first"[..], PutOptions::default())
        .await
        .unwrap();
    fixture
        .store
        .put("a", "b_c", &b"second"[..], PutOptions::default())
        .await
        .unwrap();

    assert_eq!(fixture.read_async("a_b", "c").await, b"first");
    assert_eq!(fixture.read_async("a", "b_c").await, b"second");
}

#[tokio::test]
async fn test_shared_through_trait_object() {
    let fixture = StoreFixture::new();
    let storage: Arc<dyn Storage> = Arc::new(fixture.store.clone());

    let writer = {
        let storage = Arc::clone(&storage);
        tokio::spawn(async move {
            storage
                .put(
                    "shared",
                    "doc.txt",
                    bytes_of("from task"),
                    PutOptions::default(),
                )
                .await
        })
    };
    writer.await.unwrap().unwrap();

    assert_eq!(fixture.read_async("shared", "doc.txt").await, b"from task");
    assert!(storage.delete("shared", "doc.txt").await.unwrap());
    assert!(matches!(
        storage.get("shared", "doc.txt", ReadMode::Blocking),
        Err(StoreError::NotFound { .. })
    ));
}

fn bytes_of(text: &'static str) -> bytes::Bytes {
    bytes::Bytes::from_static(text.as_bytes())
}
