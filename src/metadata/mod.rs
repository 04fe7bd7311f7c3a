//! Schema metadata records and the model-side introspection seam.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       ModelSource                        │
//! │   table()  class_name()  introspect()  column_map()      │
//! └──────────────────────────────────────────────────────────┘
//!                           │  (only on a cache miss)
//!                           ▼
//! ┌────────────────────────────┐  ┌──────────────────────────┐
//! │ MetadataRecord (table key) │  │ ColumnMap (class key)    │
//! └────────────────────────────┘  └──────────────────────────┘
//! ```

mod builder;
mod record;

pub use builder::{ColumnSpec, MetadataRecordBuilder};
pub use record::{BindType, ColumnMap, ColumnType, MetadataRecord, RecordError, UnknownCode};

/// Boxed error produced by an introspection callback.
pub type IntrospectionError = Box<dyn std::error::Error + Send + Sync>;

/// A model whose schema can be introspected.
///
/// Implemented by the record-mapping layer. The cache calls `introspect`
/// and `column_map` only when the corresponding slot is not cached.
pub trait ModelSource {
    /// Source table name. Lowercased when used as a cache key.
    fn table(&self) -> &str;

    /// Type name of the model, used verbatim as the alias slot key.
    fn class_name(&self) -> &str;

    /// Compute the schema record from the database.
    fn introspect(&self) -> Result<MetadataRecord, IntrospectionError>;

    /// Resolve attribute aliases. Models without aliases keep the default.
    fn column_map(&self) -> Result<ColumnMap, IntrospectionError> {
        Ok(ColumnMap::default())
    }
}
