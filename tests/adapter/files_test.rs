use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use metacache::adapter::{Adapter, AdapterOptions, FilesAdapter};
use metacache::cache::{CacheKey, MetadataStore};
use metacache::metadata::{ColumnType, MetadataRecord};

fn small() -> MetadataRecord {
    MetadataRecord::builder()
        .primary("id", ColumnType::Integer)
        .build()
        .unwrap()
}

fn large() -> MetadataRecord {
    let mut builder = MetadataRecord::builder().primary("id", ColumnType::Integer);
    for i in 0..500 {
        builder = builder.nullable(format!("column_{:04}", i), ColumnType::Varchar);
    }
    builder.build().unwrap()
}

#[test]
fn test_readers_never_see_partial_files() {
    let tmp = tempfile::tempdir().unwrap();
    let adapter =
        Arc::new(FilesAdapter::new(&AdapterOptions::new().with_meta_data_dir(tmp.path())).unwrap());
    let key = CacheKey::table("robots").unwrap();
    let small_bytes = serde_json::to_vec(&small()).unwrap();
    let large_bytes = serde_json::to_vec(&large()).unwrap();
    adapter.write(&key, &small_bytes).unwrap();

    let done = AtomicBool::new(false);
    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200 {
                let bytes = if i % 2 == 0 { &large_bytes } else { &small_bytes };
                adapter.write(&key, bytes).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });
        s.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                let seen = adapter.read(&key).unwrap().unwrap();
                assert!(seen == small_bytes || seen == large_bytes, "torn read");
            }
        });
    });
}

#[test]
fn test_entries_survive_a_new_adapter() {
    let tmp = tempfile::tempdir().unwrap();
    let options = AdapterOptions::new()
        .with_suffix("app-")
        .with_meta_data_dir(tmp.path());

    MetadataStore::new(FilesAdapter::new(&options).unwrap())
        .get_metadata("robots", || Ok::<_, std::io::Error>(small()))
        .unwrap();

    let restarted = MetadataStore::new(FilesAdapter::new(&options).unwrap());
    assert!(!restarted.is_empty().unwrap());
    let record = restarted
        .get_metadata("robots", || -> Result<MetadataRecord, std::io::Error> {
            panic!("should be read from disk")
        })
        .unwrap();
    assert_eq!(record, small());
}

fn files_store(dir: &std::path::Path, suffix: &str) -> MetadataStore<FilesAdapter> {
    let options = AdapterOptions::new()
        .with_suffix(suffix)
        .with_meta_data_dir(dir);
    MetadataStore::new(FilesAdapter::new(&options).unwrap())
}

#[test]
fn test_reset_scoped_to_suffix() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    // One suffix is a prefix of the other.
    let app = files_store(dir, "app");
    let app2 = files_store(dir, "app2");

    app2.get_metadata("robots", || Ok::<_, std::io::Error>(small()))
        .unwrap();
    assert!(app.is_empty().unwrap());

    app.get_metadata("robots", || Ok::<_, std::io::Error>(small()))
        .unwrap();
    app.reset().unwrap();

    assert!(app.is_empty().unwrap());
    assert!(!app2.is_empty().unwrap());
    assert!(dir.join("app2@robots.json").is_file());
    assert!(!dir.join("app@robots.json").exists());
}

#[test]
fn test_empty_suffix_leaves_foreign_json_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("package.json"), "{\"name\":\"site\"}").unwrap();
    fs::write(dir.join("robots.json"), "[]").unwrap();

    let store = files_store(dir, "");
    assert!(store.is_empty().unwrap());

    store
        .get_metadata("robots", || Ok::<_, std::io::Error>(small()))
        .unwrap();
    store.reset().unwrap();

    assert!(store.is_empty().unwrap());
    assert!(dir.join("package.json").is_file());
    assert_eq!(fs::read(dir.join("robots.json")).unwrap(), b"[]");
}

#[test]
fn test_file_holds_canonical_bytes() {
    let tmp = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(
        FilesAdapter::new(&AdapterOptions::new().with_meta_data_dir(tmp.path())).unwrap(),
    );
    store
        .get_metadata("robots", || Ok::<_, std::io::Error>(small()))
        .unwrap();

    let on_disk = fs::read(tmp.path().join("@robots.json")).unwrap();
    assert_eq!(on_disk, serde_json::to_vec(&small()).unwrap());
    // No temporary files left behind.
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
}
