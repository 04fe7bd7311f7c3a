//! # metacache
//!
//! Model-metadata cache: schema facts for each entity are introspected once
//! and kept behind a pluggable storage adapter.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Record-mapping layer                     │
//! │        (ModelSource: table, class, introspect)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [get_metadata / get_column_map]
//! ┌─────────────────────────────────────────────────────────┐
//! │                    MetadataStore                         │
//! │    hit → decode        miss → introspect, validate,      │
//! │                               encode, write              │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [CacheKey + KeyNamespace]
//! ┌──────────┬──────────────┬─────────────────┬─────────────┐
//! │  Memory  │   Session    │    SharedKv     │    Files    │
//! │ DashMap  │ compound key │ key per slot +  │ JSON file   │
//! │          │ per suffix   │ index, TTL      │ per slot    │
//! └──────────┴──────────────┴─────────────────┴─────────────┘
//! ```

pub mod adapter;
pub mod cache;
pub mod config;
pub mod metadata;

pub use adapter::Adapter;
pub use cache::{CacheError, CacheKey, CacheResult, MetadataStore};
pub use metadata::{ColumnMap, MetadataRecord, ModelSource};
