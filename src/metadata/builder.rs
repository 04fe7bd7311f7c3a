//! Assemble a [`MetadataRecord`] from introspected columns.

use super::record::{BindType, ColumnType, MetadataRecord, RecordError};

/// Incremental builder that keeps every slot of the record consistent.
///
/// Columns are recorded in the order they are pushed, which becomes the
/// `attributes` order of the record.
#[derive(Debug, Default, Clone)]
pub struct MetadataRecordBuilder {
    record: MetadataRecord,
}

/// One introspected column.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub primary: bool,
    pub not_null: bool,
    pub bind_type: Option<BindType>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary: false,
            not_null: false,
            bind_type: None,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.not_null = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn bind(mut self, bind_type: BindType) -> Self {
        self.bind_type = Some(bind_type);
        self
    }
}

impl MetadataRecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fully described column.
    pub fn push(mut self, spec: ColumnSpec) -> Self {
        let record = &mut self.record;
        record.attributes.push(spec.name.clone());
        if spec.primary {
            record.primary_key.push(spec.name.clone());
        } else {
            record.non_primary_key.push(spec.name.clone());
        }
        if spec.not_null {
            record.not_null.push(spec.name.clone());
        }
        if spec.column_type.is_numeric() {
            record.data_types_numeric.insert(spec.name.clone(), true);
        }
        record.bind_types.insert(
            spec.name.clone(),
            spec.bind_type
                .unwrap_or_else(|| spec.column_type.default_bind_type()),
        );
        record.data_types.insert(spec.name, spec.column_type);
        self
    }

    /// Add a primary key column (implies `NOT NULL`).
    pub fn primary(self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.push(ColumnSpec::new(name, column_type).primary())
    }

    /// Add a `NOT NULL` non-key column.
    pub fn column(self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.push(ColumnSpec::new(name, column_type).not_null())
    }

    /// Add a nullable non-key column.
    pub fn nullable(self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.push(ColumnSpec::new(name, column_type))
    }

    /// Mark the auto-increment column.
    pub fn identity(mut self, name: impl Into<String>) -> Self {
        self.record.identity_field = Some(name.into());
        self
    }

    /// Finish the record, checking its invariants.
    pub fn build(self) -> Result<MetadataRecord, RecordError> {
        self.record.validate()?;
        Ok(self.record)
    }
}
