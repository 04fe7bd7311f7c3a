//! Compute-or-fetch orchestration over an adapter.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::{CacheError, CacheKey, CacheResult};
use crate::adapter::Adapter;
use crate::metadata::{ColumnMap, IntrospectionError, MetadataRecord, ModelSource, RecordError};

/// A value that can occupy a cache slot.
trait Slot: Serialize + DeserializeOwned {
    fn check(&self) -> Result<(), RecordError>;
}

impl Slot for MetadataRecord {
    fn check(&self) -> Result<(), RecordError> {
        self.validate()
    }
}

impl Slot for ColumnMap {
    fn check(&self) -> Result<(), RecordError> {
        Ok(())
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the adapter.
    pub hits: u64,
    /// Lookups that had to compute the record.
    pub misses: u64,
    /// Stored entries that failed to decode and were recomputed.
    pub corrupt_entries: u64,
    /// Introspection callbacks invoked.
    pub introspections: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    corrupt_entries: AtomicU64,
    introspections: AtomicU64,
}

/// Metadata store backed by an [`Adapter`].
///
/// # Example
///
/// ```ignore
/// use metacache::adapter::MemoryAdapter;
/// use metacache::cache::MetadataStore;
///
/// let store = MetadataStore::new(MemoryAdapter::new());
/// let record = store.get_metadata("robots", || introspect_robots())?;
/// assert!(!store.is_empty()?);
/// ```
#[derive(Debug)]
pub struct MetadataStore<A> {
    adapter: A,
    counters: Counters,
}

impl<A: Adapter> MetadataStore<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            counters: Counters::default(),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// True when the adapter holds no entry for any entity of this store.
    pub fn is_empty(&self) -> CacheResult<bool> {
        self.adapter.is_empty()
    }

    /// Discard every cached entry of this store's namespace.
    ///
    /// Safe to call on an empty store.
    pub fn reset(&self) -> CacheResult<()> {
        self.adapter.flush_all()?;
        info!(adapter = self.adapter.name(), "metadata cache reset");
        Ok(())
    }

    /// Schema record for `table`, introspecting only on a miss.
    ///
    /// A cached record is returned as-is even if the underlying schema has
    /// changed since it was written. On a miss `introspect` runs exactly
    /// once; its error is returned unchanged and nothing is stored.
    pub fn get_metadata<F, E>(&self, table: &str, introspect: F) -> CacheResult<MetadataRecord>
    where
        F: FnOnce() -> Result<MetadataRecord, E>,
        E: Into<IntrospectionError>,
    {
        let key = CacheKey::table(table)?;
        self.fetch_or_compute(&key, introspect)
    }

    /// Alias record for `class_name`, resolving only on a miss.
    pub fn get_column_map<F, E>(&self, class_name: &str, resolve: F) -> CacheResult<ColumnMap>
    where
        F: FnOnce() -> Result<ColumnMap, E>,
        E: Into<IntrospectionError>,
    {
        let key = CacheKey::class(class_name)?;
        self.fetch_or_compute(&key, resolve)
    }

    /// Load both slots of a model: the table schema and the class alias map.
    pub fn initialize<M>(&self, model: &M) -> CacheResult<(MetadataRecord, ColumnMap)>
    where
        M: ModelSource + ?Sized,
    {
        let record = self.get_metadata(model.table(), || model.introspect())?;
        let column_map = self.get_column_map(model.class_name(), || model.column_map())?;
        Ok((record, column_map))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            corrupt_entries: self.counters.corrupt_entries.load(Ordering::Relaxed),
            introspections: self.counters.introspections.load(Ordering::Relaxed),
        }
    }

    fn fetch_or_compute<T, F, E>(&self, key: &CacheKey, compute: F) -> CacheResult<T>
    where
        T: Slot,
        F: FnOnce() -> Result<T, E>,
        E: Into<IntrospectionError>,
    {
        if let Some(value) = self.lookup::<T>(key)? {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(adapter = self.adapter.name(), %key, "metadata cache hit");
            return Ok(value);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        self.counters.introspections.fetch_add(1, Ordering::Relaxed);
        debug!(adapter = self.adapter.name(), %key, "metadata cache miss");

        let value = compute().map_err(|e| CacheError::Introspection(e.into()))?;
        value.check()?;

        let bytes = serde_json::to_vec(&value)?;
        self.adapter.write(key, &bytes)?;
        Ok(value)
    }

    /// Read and decode a slot. Undecodable entries count as absent.
    fn lookup<T: Slot>(&self, key: &CacheKey) -> CacheResult<Option<T>> {
        let bytes = match self.adapter.read(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(CacheError::Deserialization(err)) => {
                self.note_corrupt(key, &err);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => match value.check() {
                Ok(()) => Ok(Some(value)),
                Err(err) => {
                    self.note_corrupt(key, &err);
                    Ok(None)
                }
            },
            Err(err) => {
                self.note_corrupt(key, &err);
                Ok(None)
            }
        }
    }

    fn note_corrupt(&self, key: &CacheKey, err: &dyn std::fmt::Display) {
        self.counters.corrupt_entries.fetch_add(1, Ordering::Relaxed);
        warn!(
            adapter = self.adapter.name(),
            %key,
            error = %err,
            "discarding undecodable metadata entry"
        );
    }
}
