//! Options shared by the adapters.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::KeyNamespace;

/// Default time-to-live for media with expiry: two days.
pub const DEFAULT_LIFETIME: u64 = 172_800;

/// Options recognized by the adapters. Each adapter ignores the ones that do
/// not apply to its medium.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdapterOptions {
    /// Namespace discriminator so several logical caches can share a medium.
    pub suffix: String,

    /// Entry lifetime in seconds. `0` disables expiry.
    pub lifetime: u64,

    /// Directory for generated metadata files. Required by the files adapter.
    pub meta_data_dir: Option<PathBuf>,

    /// Database file for the shared key-value medium.
    pub kv_path: Option<PathBuf>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            suffix: String::new(),
            lifetime: DEFAULT_LIFETIME,
            meta_data_dir: None,
            kv_path: None,
        }
    }
}

impl AdapterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_lifetime(mut self, seconds: u64) -> Self {
        self.lifetime = seconds;
        self
    }

    pub fn with_meta_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.meta_data_dir = Some(dir.into());
        self
    }

    pub fn with_kv_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.kv_path = Some(path.into());
        self
    }

    pub fn namespace(&self) -> KeyNamespace {
        KeyNamespace::new(self.suffix.clone())
    }

    /// Lifetime as a TTL, `None` when expiry is disabled.
    pub fn ttl(&self) -> Option<Duration> {
        (self.lifetime > 0).then(|| Duration::from_secs(self.lifetime))
    }
}
