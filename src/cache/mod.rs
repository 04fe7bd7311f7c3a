//! Model-metadata cache.
//!
//! Schema records are computed once by the record-mapping layer and kept
//! behind an [`Adapter`](crate::adapter::Adapter) so later lookups skip
//! introspection.
//!
//! # Design
//!
//! - Values are the canonical JSON encoding of a record
//! - No freshness checks - entries persist until `reset()` (or TTL expiry
//!   on media that support it)
//! - Corrupt entries are treated as misses and overwritten
//!
//! # Key Format
//!
//! ```text
//! $PMM${suffix}{table}     -> MetadataRecord   (table lowercased)
//! $PMM${suffix}{Class}     -> ColumnMap        (class name verbatim)
//! ```

mod hash;
mod key;
mod store;

pub use hash::fingerprint;
pub use key::{CacheKey, KeyNamespace, KEY_PREFIX};
pub use store::{CacheStats, MetadataStore};

use crate::metadata::{IntrospectionError, RecordError};

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{medium} medium unavailable: {reason}")]
    MediumUnavailable { medium: &'static str, reason: String },

    #[error("Stored entry could not be decoded: {0}")]
    Deserialization(#[source] serde_json::Error),

    #[error("Introspection failed: {0}")]
    Introspection(#[source] IntrospectionError),

    #[error("Introspected record is invalid: {0}")]
    InvalidRecord(#[from] RecordError),

    #[error("Invalid entity name '{0}'")]
    InvalidEntity(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub(crate) fn unavailable(medium: &'static str, reason: impl std::fmt::Display) -> Self {
        CacheError::MediumUnavailable {
            medium,
            reason: reason.to_string(),
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
