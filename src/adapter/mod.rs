//! Storage adapters for cached metadata.
//!
//! Every adapter stores the same canonical bytes per slot; they differ only in
//! where the bytes live and how long they survive.
//!
//! | adapter          | medium                         | layout                         | expiry    |
//! |------------------|--------------------------------|--------------------------------|-----------|
//! | [`MemoryAdapter`]   | process memory              | one entry per slot             | none      |
//! | [`SessionAdapter`]  | caller's session            | one compound key per suffix    | session   |
//! | [`SharedKvAdapter`] | shared key-value store      | one key per slot + key index   | lifetime  |
//! | [`FilesAdapter`]    | directory of JSON files     | one file per slot              | none      |

mod files;
mod memory;
mod options;
mod session;
mod shared_kv;

pub use files::FilesAdapter;
pub use memory::MemoryAdapter;
pub use options::{AdapterOptions, DEFAULT_LIFETIME};
pub use session::{MemorySession, SessionAdapter, SessionMedium};
pub use shared_kv::{KvMedium, LocalKv, SharedKvAdapter, SqliteKv, UpdateFn};

use std::sync::Arc;

use crate::cache::{CacheKey, CacheResult};

/// Persistence contract shared by all adapters.
///
/// Implementations apply their own key namespacing; callers only pass the
/// slot discriminator.
pub trait Adapter: Send + Sync {
    /// Short adapter name for logs.
    fn name(&self) -> &'static str;

    /// The bytes last written under `key`, or `None` if never written,
    /// flushed, or expired.
    fn read(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>>;

    /// Store `bytes` under `key`, replacing any previous value.
    ///
    /// Memory, shared key-value and files adapters store any bytes. The
    /// session adapter keeps structured values and rejects bytes that are not
    /// JSON with `Deserialization`; the store only ever writes JSON.
    fn write(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()>;

    fn exists(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.read(key)?.is_some())
    }

    /// Remove every entry this adapter is responsible for.
    fn flush_all(&self) -> CacheResult<()>;

    /// True when no entry of this adapter's namespace is present.
    fn is_empty(&self) -> CacheResult<bool>;
}

impl<T: Adapter + ?Sized> Adapter for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn read(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        (**self).read(key)
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        (**self).write(key, bytes)
    }

    fn exists(&self, key: &CacheKey) -> CacheResult<bool> {
        (**self).exists(key)
    }

    fn flush_all(&self) -> CacheResult<()> {
        (**self).flush_all()
    }

    fn is_empty(&self) -> CacheResult<bool> {
        (**self).is_empty()
    }
}

impl<T: Adapter + ?Sized> Adapter for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn read(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        (**self).read(key)
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        (**self).write(key, bytes)
    }

    fn exists(&self, key: &CacheKey) -> CacheResult<bool> {
        (**self).exists(key)
    }

    fn flush_all(&self) -> CacheResult<()> {
        (**self).flush_all()
    }

    fn is_empty(&self) -> CacheResult<bool> {
        (**self).is_empty()
    }
}
