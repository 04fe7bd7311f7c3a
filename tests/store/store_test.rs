use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use metacache::adapter::{Adapter, MemoryAdapter, MemorySession, SessionAdapter, AdapterOptions};
use metacache::cache::{CacheError, CacheKey, CacheResult, MetadataStore};
use metacache::metadata::{ColumnMap, ColumnType, IntrospectionError, MetadataRecord, ModelSource};

fn robots() -> MetadataRecord {
    MetadataRecord::builder()
        .primary("id", ColumnType::Integer)
        .column("name", ColumnType::Varchar)
        .column("type", ColumnType::Varchar)
        .column("year", ColumnType::Integer)
        .identity("id")
        .build()
        .unwrap()
}

#[derive(Debug)]
struct SchemaGone;

impl fmt::Display for SchemaGone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("table does not exist")
    }
}

impl std::error::Error for SchemaGone {}

/// Adapter whose writes always fail.
struct ReadOnlyAdapter(MemoryAdapter);

impl Adapter for ReadOnlyAdapter {
    fn name(&self) -> &'static str {
        "read-only"
    }

    fn read(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        self.0.read(key)
    }

    fn write(&self, _key: &CacheKey, _bytes: &[u8]) -> CacheResult<()> {
        Err(CacheError::MediumUnavailable {
            medium: "read-only",
            reason: "disk full".to_string(),
        })
    }

    fn flush_all(&self) -> CacheResult<()> {
        self.0.flush_all()
    }

    fn is_empty(&self) -> CacheResult<bool> {
        self.0.is_empty()
    }
}

struct Robots {
    introspections: Cell<u32>,
}

impl ModelSource for Robots {
    fn table(&self) -> &str {
        "robots"
    }

    fn class_name(&self) -> &str {
        "Robots"
    }

    fn introspect(&self) -> Result<MetadataRecord, IntrospectionError> {
        self.introspections.set(self.introspections.get() + 1);
        Ok(robots())
    }
}

#[test]
fn test_get_metadata_idempotent() {
    let store = MetadataStore::new(MemoryAdapter::new());
    let calls = Cell::new(0);
    let introspect = || {
        calls.set(calls.get() + 1);
        Ok::<_, SchemaGone>(robots())
    };

    let first = store.get_metadata("robots", introspect).unwrap();
    let second = store.get_metadata("robots", introspect).unwrap();
    assert_eq!(first, second);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_table_name_case_insensitive() {
    let store = MetadataStore::new(MemoryAdapter::new());
    store
        .get_metadata("Robots", || Ok::<_, SchemaGone>(robots()))
        .unwrap();
    let hit = store
        .get_metadata("ROBOTS", || Err::<MetadataRecord, _>(SchemaGone))
        .unwrap();
    assert_eq!(hit, robots());
}

#[test]
fn test_introspection_error_propagates_unchanged() {
    let store = MetadataStore::new(MemoryAdapter::new());
    let err = store
        .get_metadata("robots", || Err::<MetadataRecord, _>(SchemaGone))
        .unwrap_err();

    match err {
        CacheError::Introspection(source) => {
            assert!(source.downcast_ref::<SchemaGone>().is_some());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_write_failure_fails_lookup() {
    let store = MetadataStore::new(ReadOnlyAdapter(MemoryAdapter::new()));
    let result = store.get_metadata("robots", || Ok::<_, SchemaGone>(robots()));
    assert!(matches!(
        result,
        Err(CacheError::MediumUnavailable { medium: "read-only", .. })
    ));
}

#[test]
fn test_unavailable_medium_not_masked_as_miss() {
    let session = Arc::new(MemorySession::new());
    let store = MetadataStore::new(SessionAdapter::new(session, &AdapterOptions::default()));
    let calls = Cell::new(0);

    let result = store.get_metadata("robots", || {
        calls.set(calls.get() + 1);
        Ok::<_, SchemaGone>(robots())
    });
    assert!(matches!(result, Err(CacheError::MediumUnavailable { .. })));
    assert_eq!(calls.get(), 0);
}

#[test]
fn test_corrupt_entry_reintrospected_and_overwritten() {
    let store = MetadataStore::new(MemoryAdapter::new());
    let key = CacheKey::table("robots").unwrap();
    store.adapter().write(&key, b"{\"0\": [\"id\"").unwrap();

    let record = store
        .get_metadata("robots", || Ok::<_, SchemaGone>(robots()))
        .unwrap();
    assert_eq!(record, robots());
    assert_eq!(store.stats().corrupt_entries, 1);

    let stored = store.adapter().read(&key).unwrap().unwrap();
    let decoded: MetadataRecord = serde_json::from_slice(&stored).unwrap();
    assert_eq!(decoded, robots());
}

#[test]
fn test_reset_clears_all_entities() {
    let store = MetadataStore::new(MemoryAdapter::new());
    store.reset().unwrap();
    assert!(store.is_empty().unwrap());

    store
        .get_metadata("robots", || Ok::<_, SchemaGone>(robots()))
        .unwrap();
    store
        .get_column_map("Robots", || Ok::<_, SchemaGone>(ColumnMap::default()))
        .unwrap();
    assert!(!store.is_empty().unwrap());

    store.reset().unwrap();
    assert!(store.is_empty().unwrap());
    store.reset().unwrap();
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_flushed_entity_not_resurrected() {
    let store = MetadataStore::new(MemoryAdapter::new());
    store
        .get_metadata("robots", || Ok::<_, SchemaGone>(robots()))
        .unwrap();
    store.reset().unwrap();

    store
        .get_column_map("Parts", || Ok::<_, SchemaGone>(ColumnMap::default()))
        .unwrap();
    let key = CacheKey::table("robots").unwrap();
    assert!(!store.adapter().exists(&key).unwrap());
}

#[test]
fn test_initialize_fills_both_slots() {
    let store = MetadataStore::new(MemoryAdapter::new());
    let model = Robots {
        introspections: Cell::new(0),
    };

    let (record, column_map) = store.initialize(&model).unwrap();
    assert_eq!(record, robots());
    assert!(column_map.is_unresolved());

    store.initialize(&model).unwrap();
    assert_eq!(model.introspections.get(), 1);
    assert_eq!(store.adapter().len(), 2);
}

#[test]
fn test_invalid_entity_names() {
    let store = MetadataStore::new(MemoryAdapter::new());
    let result = store.get_metadata("../robots", || Ok::<_, SchemaGone>(robots()));
    assert!(matches!(result, Err(CacheError::InvalidEntity(_))));

    let result = store.get_column_map("robots", || Ok::<_, SchemaGone>(ColumnMap::default()));
    assert!(matches!(result, Err(CacheError::InvalidEntity(_))));
}
