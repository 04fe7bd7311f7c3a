//! Process-local adapter.

use dashmap::DashMap;

use super::Adapter;
use crate::cache::{CacheKey, CacheResult};

/// Keeps entries in a concurrent map for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    entries: DashMap<CacheKey, Vec<u8>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Adapter for MemoryAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn read(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        self.entries.insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.entries.contains_key(key))
    }

    fn flush_all(&self) -> CacheResult<()> {
        self.entries.clear();
        Ok(())
    }

    fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.entries.is_empty())
    }
}
