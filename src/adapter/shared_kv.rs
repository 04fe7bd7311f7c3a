//! Shared key-value adapter with expiry.
//!
//! One medium key per slot, plus an index of the keys this namespace created:
//!
//! ```text
//! $PMM${suffix}robots   -> record bytes        (ttl = lifetime)
//! $PMM${suffix}Robots   -> alias bytes         (ttl = lifetime)
//! $PMM${suffix}$index   -> ["$PMM$...robots", "$PMM$...Robots"]   (no ttl)
//! ```
//!
//! `flush_all` deletes exactly the indexed keys, never the whole medium.
//! Index changes go through [`KvMedium::update`], which is atomic on the
//! medium, so adapters in different threads or processes sharing one suffix
//! never lose each other's keys. A write stores the entry before indexing it
//! and a flush takes the whole index before deleting, so an entry written
//! during a flush is either deleted or still indexed afterwards.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};

use super::{Adapter, AdapterOptions};
use crate::cache::{CacheError, CacheKey, CacheResult, KeyNamespace};

const MEDIUM: &str = "shared kv";

/// Callback for [`KvMedium::update`]: current live value in, new value out.
pub type UpdateFn<'a> = dyn FnMut(Option<Vec<u8>>) -> CacheResult<Option<Vec<u8>>> + 'a;

/// Primitives of an external key-value store visible to other processes.
///
/// A `ttl` too large for the medium to represent means no expiry.
pub trait KvMedium: Send + Sync {
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store `value`; `ttl` of `None` never expires.
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()>;

    /// Returns true if a key was deleted.
    fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Atomically replace the value under `key` with `apply(current)`.
    ///
    /// `apply` receives the live value (expired values read as `None`).
    /// Returning `None` deletes the key; a new value never expires. When
    /// `apply` fails the stored value is left unchanged.
    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> CacheResult<()>;
}

/// In-process medium with per-key expiry.
#[derive(Debug, Default)]
pub struct LocalKv {
    entries: DashMap<String, (Vec<u8>, Option<Instant>)>,
}

fn is_live(expires_at: Option<Instant>, now: Instant) -> bool {
    expires_at.map_or(true, |at| at > now)
}

impl LocalKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys, including keys owned by other namespaces.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| is_live(entry.value().1, now))
            .count()
    }

    /// Drop `key` if it had expired at `now`. A value stored since is kept.
    fn purge_expired(&self, key: &str, now: Instant) {
        self.entries
            .remove_if(key, |_, (_, expires_at)| !is_live(*expires_at, now));
    }
}

impl KvMedium for LocalKv {
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if is_live(entry.1, now) => return Ok(Some(entry.0.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        self.purge_expired(key, now);
        Ok(None)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.entries
            .insert(key.to_string(), (value.to_vec(), expires_at));
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> CacheResult<()> {
        let now = Instant::now();
        // The entry guard holds the shard lock until the new value is in place.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let (value, expires_at) = occupied.get();
                let current = is_live(*expires_at, now).then(|| value.clone());
                match apply(current)? {
                    Some(next) => {
                        occupied.insert((next, None));
                    }
                    None => {
                        occupied.remove();
                    }
                }
            }
            Entry::Vacant(vacant) => {
                if let Some(next) = apply(None)? {
                    vacant.insert((next, None));
                }
            }
        }
        Ok(())
    }
}

/// SQLite-backed medium that several processes can share through one file.
pub struct SqliteKv {
    conn: Mutex<Connection>,
}

impl SqliteKv {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::unavailable(MEDIUM, e))?;
        }
        let conn = Connection::open(path).map_err(sqlite_err)?;
        Self::init(conn)
    }

    /// Open a private in-memory database (for testing).
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory().map_err(sqlite_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> CacheResult<Self> {
        // Fail fast instead of waiting on a writer in another process forever.
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(sqlite_err)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                expires_at INTEGER
            );
            ",
        )
        .map_err(sqlite_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn sqlite_err(err: rusqlite::Error) -> CacheError {
    CacheError::unavailable(MEDIUM, err)
}

fn now_millis() -> i64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    i64::try_from(elapsed).unwrap_or(i64::MAX)
}

/// Absolute expiry in unix milliseconds, `None` when the entry never expires.
fn expiry_millis(ttl: Option<Duration>) -> Option<i64> {
    ttl.and_then(|ttl| i64::try_from(ttl.as_millis()).ok())
        .and_then(|ms| now_millis().checked_add(ms))
}

impl KvMedium for SqliteKv {
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let conn = self.conn();
        let row: Option<(Vec<u8>, Option<i64>)> = conn
            .query_row(
                "SELECT value, expires_at FROM kv WHERE key = ?",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(sqlite_err)?;

        match row {
            Some((_, Some(expires_at))) if expires_at <= now_millis() => {
                conn.execute(
                    "DELETE FROM kv WHERE key = ? AND expires_at = ?",
                    params![key, expires_at],
                )
                .map_err(sqlite_err)?;
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO kv (key, value, expires_at) VALUES (?, ?, ?)",
                params![key, value, expiry_millis(ttl)],
            )
            .map_err(sqlite_err)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM kv WHERE key = ?", params![key])
            .map_err(sqlite_err)?;
        Ok(rows > 0)
    }

    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> CacheResult<()> {
        let mut conn = self.conn();
        // IMMEDIATE takes the write lock up front, so no other connection
        // can change the row between our read and our write.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sqlite_err)?;
        let row: Option<(Vec<u8>, Option<i64>)> = tx
            .query_row(
                "SELECT value, expires_at FROM kv WHERE key = ?",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(sqlite_err)?;

        let now = now_millis();
        let current = row.and_then(|(value, expires_at)| {
            expires_at.map_or(true, |at| at > now).then_some(value)
        });
        let written = match apply(current)? {
            Some(next) => tx.execute(
                "INSERT OR REPLACE INTO kv (key, value, expires_at) VALUES (?, ?, NULL)",
                params![key, next],
            ),
            None => tx.execute("DELETE FROM kv WHERE key = ?", params![key]),
        };
        written.map_err(sqlite_err)?;
        tx.commit().map_err(sqlite_err)
    }
}

fn decode_index(bytes: Option<Vec<u8>>) -> CacheResult<Vec<String>> {
    match bytes {
        None => Ok(Vec::new()),
        Some(bytes) => serde_json::from_slice(&bytes).map_err(CacheError::Deserialization),
    }
}

/// One medium key per slot with a configurable lifetime.
pub struct SharedKvAdapter {
    medium: Arc<dyn KvMedium>,
    namespace: KeyNamespace,
    ttl: Option<Duration>,
}

impl SharedKvAdapter {
    pub fn new(medium: Arc<dyn KvMedium>, options: &AdapterOptions) -> Self {
        Self {
            medium,
            namespace: options.namespace(),
            ttl: options.ttl(),
        }
    }

    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    /// Keys recorded in the namespace index.
    ///
    /// # Errors
    /// `Deserialization` when the index is unreadable.
    fn index(&self) -> CacheResult<Vec<String>> {
        decode_index(self.medium.get(&self.namespace.index_key())?)
    }

    /// Add `new_keys` to the index. An unreadable index is replaced.
    fn add_to_index(&self, new_keys: &[String]) -> CacheResult<()> {
        let index_key = self.namespace.index_key();
        self.medium.update(
            &index_key,
            &mut |current: Option<Vec<u8>>| -> CacheResult<Option<Vec<u8>>> {
                let mut keys = decode_index(current).unwrap_or_else(|err| {
                    warn!(key = %index_key, error = %err, "replacing unreadable key index");
                    Vec::new()
                });
                for key in new_keys {
                    if !keys.contains(key) {
                        keys.push(key.clone());
                    }
                }
                Ok(Some(serde_json::to_vec(&keys)?))
            },
        )
    }

    /// Remove the index and return the keys it listed.
    fn take_index(&self) -> CacheResult<Vec<String>> {
        let mut taken = Ok(Vec::new());
        self.medium.update(
            &self.namespace.index_key(),
            &mut |current: Option<Vec<u8>>| -> CacheResult<Option<Vec<u8>>> {
                taken = decode_index(current);
                Ok(None)
            },
        )?;
        taken
    }
}

impl Adapter for SharedKvAdapter {
    fn name(&self) -> &'static str {
        "shared_kv"
    }

    fn read(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        self.medium.get(&self.namespace.key(key))
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        let medium_key = self.namespace.key(key);
        self.medium.set(&medium_key, bytes, self.ttl)?;
        self.add_to_index(std::slice::from_ref(&medium_key))?;
        debug!(key = %medium_key, ttl = ?self.ttl, "stored shared kv entry");
        Ok(())
    }

    /// Deletes every indexed key.
    ///
    /// # Errors
    /// `Deserialization` when the index was unreadable. The index is removed
    /// anyway; entries it listed are left to expire.
    fn flush_all(&self) -> CacheResult<()> {
        let keys = match self.take_index() {
            Ok(keys) => keys,
            Err(CacheError::Deserialization(err)) => {
                warn!(
                    key = %self.namespace.index_key(),
                    error = %err,
                    "dropped unreadable key index; its entries were not deleted"
                );
                return Err(CacheError::Deserialization(err));
            }
            Err(err) => return Err(err),
        };

        for (i, key) in keys.iter().enumerate() {
            if let Err(err) = self.medium.delete(key) {
                // Keep what is left reachable for the next flush.
                self.add_to_index(&keys[i..])?;
                return Err(err);
            }
        }
        Ok(())
    }

    fn is_empty(&self) -> CacheResult<bool> {
        for key in self.index()? {
            if self.medium.get(&key)?.is_some() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
