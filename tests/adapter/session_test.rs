use std::sync::Arc;

use metacache::adapter::{Adapter, AdapterOptions, MemorySession, SessionAdapter, SessionMedium};
use metacache::cache::{CacheError, CacheKey, MetadataStore};
use metacache::metadata::{ColumnType, MetadataRecord};
use serde_json::json;

fn parts() -> MetadataRecord {
    MetadataRecord::builder()
        .primary("id", ColumnType::Integer)
        .nullable("label", ColumnType::Text)
        .build()
        .unwrap()
}

fn store(session: &Arc<MemorySession>, suffix: &str) -> MetadataStore<SessionAdapter> {
    let options = AdapterOptions::new().with_suffix(suffix);
    MetadataStore::new(SessionAdapter::new(session.clone(), &options))
}

#[test]
fn test_suffixes_share_a_session_without_mixing() {
    let session = Arc::new(MemorySession::started());
    let first = store(&session, "first");
    let second = store(&session, "second");

    first
        .get_metadata("parts", || Ok::<_, std::io::Error>(parts()))
        .unwrap();

    assert!(!first.is_empty().unwrap());
    assert!(second.is_empty().unwrap());
    assert!(session.get("$PMM$first").is_some());
    assert!(session.get("$PMM$second").is_none());
}

#[test]
fn test_reset_only_drops_own_compound_key() {
    let session = Arc::new(MemorySession::started());
    session.set("user_id", json!(42));
    let first = store(&session, "first");
    let second = store(&session, "second");

    for s in [&first, &second] {
        s.get_metadata("parts", || Ok::<_, std::io::Error>(parts()))
            .unwrap();
    }
    first.reset().unwrap();

    assert!(first.is_empty().unwrap());
    assert!(!second.is_empty().unwrap());
    assert_eq!(session.get("user_id"), Some(json!(42)));
}

#[test]
fn test_second_adapter_sees_entries() {
    let session = Arc::new(MemorySession::started());
    store(&session, "app")
        .get_metadata("parts", || Ok::<_, std::io::Error>(parts()))
        .unwrap();

    // A new request in the same session gets a fresh adapter.
    let later = store(&session, "app");
    let record = later
        .get_metadata("parts", || -> Result<MetadataRecord, std::io::Error> {
            panic!("should be served from the session")
        })
        .unwrap();
    assert_eq!(record, parts());
    assert_eq!(later.stats().hits, 1);
}

#[test]
fn test_session_started_late() {
    let session = Arc::new(MemorySession::new());
    let adapter = SessionAdapter::new(session.clone(), &AdapterOptions::new());
    let key = CacheKey::table("parts").unwrap();

    assert!(matches!(
        adapter.read(&key),
        Err(CacheError::MediumUnavailable { medium: "session", .. })
    ));

    session.start();
    assert!(adapter.read(&key).unwrap().is_none());
    assert!(adapter.is_empty().unwrap());
}
