//! Session-scoped adapter.
//!
//! All slots of one suffix live under a single session key:
//!
//! ```text
//! $PMM$my-local-app -> { "robots": {...record...}, "Robots": {"0": null, "1": null} }
//! ```
//!
//! Slots are kept as structured JSON values, not raw bytes, so `write` only
//! accepts JSON. Reads re-encode the value compactly, which reproduces the
//! store's canonical bytes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::{Map, Value};

use super::{Adapter, AdapterOptions};
use crate::cache::{CacheError, CacheKey, CacheResult, KeyNamespace};

/// A request-scoped key/value mapping owned by the caller.
pub trait SessionMedium: Send + Sync {
    /// Whether the session has been started and may be read or written.
    fn is_active(&self) -> bool;

    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value);

    fn remove(&self, key: &str);
}

/// In-process session store.
#[derive(Debug, Default)]
pub struct MemorySession {
    started: AtomicBool,
    data: RwLock<Map<String, Value>>,
}

impl MemorySession {
    /// A session that has not been started yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that is already started.
    pub fn started() -> Self {
        let session = Self::new();
        session.start();
        session
    }

    pub fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    /// Copy of the whole session as one JSON object.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.data.read().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

impl SessionMedium for MemorySession {
    fn is_active(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(key);
    }
}

/// Stores every slot of a suffix in one compound session value.
pub struct SessionAdapter {
    session: Arc<dyn SessionMedium>,
    namespace: KeyNamespace,
    /// Serializes read-modify-write cycles on the compound value.
    write_lock: Mutex<()>,
}

impl SessionAdapter {
    pub fn new(session: Arc<dyn SessionMedium>, options: &AdapterOptions) -> Self {
        Self {
            session,
            namespace: options.namespace(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    fn active(&self) -> CacheResult<()> {
        if self.session.is_active() {
            Ok(())
        } else {
            Err(CacheError::unavailable("session", "session has not been started"))
        }
    }

    /// The compound value, `None` when absent. A non-object value is corrupt.
    fn compound(&self) -> CacheResult<Option<Map<String, Value>>> {
        match self.session.get(&self.namespace.root()) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => match serde_json::from_value(other) {
                Ok(map) => Ok(Some(map)),
                Err(err) => Err(CacheError::Deserialization(err)),
            },
        }
    }
}

impl Adapter for SessionAdapter {
    fn name(&self) -> &'static str {
        "session"
    }

    fn read(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        self.active()?;
        let Some(map) = self.compound()? else {
            return Ok(None);
        };
        match map.get(key.discriminator()) {
            Some(value) => Ok(Some(serde_json::to_vec(value)?)),
            None => Ok(None),
        }
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        self.active()?;
        let value: Value = serde_json::from_slice(bytes).map_err(CacheError::Deserialization)?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // A corrupt compound value is replaced rather than merged into.
        let mut map = self.compound().ok().flatten().unwrap_or_default();
        map.insert(key.discriminator().to_string(), value);
        self.session.set(&self.namespace.root(), Value::Object(map));
        Ok(())
    }

    fn flush_all(&self) -> CacheResult<()> {
        self.active()?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.session.remove(&self.namespace.root());
        Ok(())
    }

    fn is_empty(&self) -> CacheResult<bool> {
        self.active()?;
        Ok(self.compound().ok().flatten().map_or(true, |map| map.is_empty()))
    }
}
