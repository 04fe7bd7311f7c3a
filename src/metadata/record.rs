//! Cached schema records.
//!
//! A [`MetadataRecord`] keeps the legacy indexed layout when serialized: every
//! field is stored under its slot number, so a persisted record looks like
//!
//! ```text
//! {"0": ["id","name"], "1": ["id"], "2": ["name"], "3": ["id","name"],
//!  "4": {"id":0,"name":2}, "5": {"id":true}, "8": "id",
//!  "9": {"id":1,"name":2}, "10": [], "11": []}
//! ```
//!
//! Slots 6 and 7 were never assigned.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::builder::MetadataRecordBuilder;

/// Column data type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ColumnType {
    Integer,
    Date,
    Varchar,
    Decimal,
    DateTime,
    Char,
    Text,
    Float,
    Boolean,
}

impl ColumnType {
    /// Numeric columns are flagged in the `data_types_numeric` slot.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ColumnType::Integer | ColumnType::Decimal | ColumnType::Float
        )
    }

    /// Default bind type used when the introspection layer does not supply one.
    pub fn default_bind_type(self) -> BindType {
        match self {
            ColumnType::Integer => BindType::Int,
            ColumnType::Decimal | ColumnType::Float => BindType::Decimal,
            ColumnType::Boolean => BindType::Bool,
            _ => BindType::Str,
        }
    }
}

impl From<ColumnType> for u8 {
    fn from(value: ColumnType) -> Self {
        match value {
            ColumnType::Integer => 0,
            ColumnType::Date => 1,
            ColumnType::Varchar => 2,
            ColumnType::Decimal => 3,
            ColumnType::DateTime => 4,
            ColumnType::Char => 5,
            ColumnType::Text => 6,
            ColumnType::Float => 7,
            ColumnType::Boolean => 8,
        }
    }
}

impl TryFrom<u8> for ColumnType {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => ColumnType::Integer,
            1 => ColumnType::Date,
            2 => ColumnType::Varchar,
            3 => ColumnType::Decimal,
            4 => ColumnType::DateTime,
            5 => ColumnType::Char,
            6 => ColumnType::Text,
            7 => ColumnType::Float,
            8 => ColumnType::Boolean,
            other => return Err(UnknownCode("column type", other)),
        })
    }
}

/// Bind type codes used when binding column values to statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum BindType {
    Null,
    Int,
    Str,
    Bool,
    Decimal,
}

impl From<BindType> for u8 {
    fn from(value: BindType) -> Self {
        match value {
            BindType::Null => 0,
            BindType::Int => 1,
            BindType::Str => 2,
            BindType::Bool => 5,
            BindType::Decimal => 32,
        }
    }
}

impl TryFrom<u8> for BindType {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => BindType::Null,
            1 => BindType::Int,
            2 => BindType::Str,
            5 => BindType::Bool,
            32 => BindType::Decimal,
            other => return Err(UnknownCode("bind type", other)),
        })
    }
}

/// A type code that does not map to any known variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownCode(&'static str, u8);

impl fmt::Display for UnknownCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} code {}", self.0, self.1)
    }
}

/// Invariant violations detected by [`MetadataRecord::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("attribute '{0}' is listed more than once")]
    DuplicateAttribute(String),

    #[error("column '{0}' is both a primary key and a non-key column")]
    OverlappingKey(String),

    #[error("attribute '{0}' is neither a primary key nor a non-key column")]
    UnpartitionedAttribute(String),

    #[error("{slot} references unknown column '{column}'")]
    UnknownColumn { slot: &'static str, column: String },
}

fn empty_slot() -> Value {
    Value::Array(Vec::new())
}

/// Schema facts for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// All columns, in introspection order.
    #[serde(rename = "0")]
    pub attributes: Vec<String>,

    #[serde(rename = "1")]
    pub primary_key: Vec<String>,

    #[serde(rename = "2")]
    pub non_primary_key: Vec<String>,

    /// Columns declared `NOT NULL`.
    #[serde(rename = "3")]
    pub not_null: Vec<String>,

    #[serde(rename = "4")]
    pub data_types: BTreeMap<String, ColumnType>,

    /// Only numeric columns appear here, always mapped to `true`.
    #[serde(rename = "5")]
    pub data_types_numeric: BTreeMap<String, bool>,

    /// Auto-increment column, if any.
    #[serde(rename = "8")]
    pub identity_field: Option<String>,

    #[serde(rename = "9")]
    pub bind_types: BTreeMap<String, BindType>,

    /// Legacy slot 10. Not interpreted; carried verbatim.
    #[serde(rename = "10", default = "empty_slot")]
    pub reserved_create: Value,

    /// Legacy slot 11. Not interpreted; carried verbatim.
    #[serde(rename = "11", default = "empty_slot")]
    pub reserved_update: Value,
}

impl Default for MetadataRecord {
    fn default() -> Self {
        Self {
            attributes: Vec::new(),
            primary_key: Vec::new(),
            non_primary_key: Vec::new(),
            not_null: Vec::new(),
            data_types: BTreeMap::new(),
            data_types_numeric: BTreeMap::new(),
            identity_field: None,
            bind_types: BTreeMap::new(),
            reserved_create: empty_slot(),
            reserved_update: empty_slot(),
        }
    }
}

impl MetadataRecord {
    /// Start building a record column by column.
    pub fn builder() -> MetadataRecordBuilder {
        MetadataRecordBuilder::new()
    }

    /// Check the structural invariants of the record.
    ///
    /// `attributes` must be partitioned exactly by `primary_key` and
    /// `non_primary_key`, and every other slot may only mention known
    /// attributes.
    pub fn validate(&self) -> Result<(), RecordError> {
        let mut seen = HashSet::with_capacity(self.attributes.len());
        for attr in &self.attributes {
            if !seen.insert(attr.as_str()) {
                return Err(RecordError::DuplicateAttribute(attr.clone()));
            }
        }

        let primary: HashSet<&str> = self.primary_key.iter().map(String::as_str).collect();
        let mut partitioned = HashSet::with_capacity(self.attributes.len());
        for column in &self.primary_key {
            if !seen.contains(column.as_str()) {
                return Err(RecordError::UnknownColumn {
                    slot: "primary key",
                    column: column.clone(),
                });
            }
            if !partitioned.insert(column.as_str()) {
                return Err(RecordError::DuplicateAttribute(column.clone()));
            }
        }
        for column in &self.non_primary_key {
            if primary.contains(column.as_str()) {
                return Err(RecordError::OverlappingKey(column.clone()));
            }
            if !seen.contains(column.as_str()) {
                return Err(RecordError::UnknownColumn {
                    slot: "non-key columns",
                    column: column.clone(),
                });
            }
            if !partitioned.insert(column.as_str()) {
                return Err(RecordError::DuplicateAttribute(column.clone()));
            }
        }
        if let Some(missing) = self
            .attributes
            .iter()
            .find(|a| !partitioned.contains(a.as_str()))
        {
            return Err(RecordError::UnpartitionedAttribute(missing.clone()));
        }

        let check = |slot: &'static str, column: &String| {
            if seen.contains(column.as_str()) {
                Ok(())
            } else {
                Err(RecordError::UnknownColumn {
                    slot,
                    column: column.clone(),
                })
            }
        };
        self.not_null.iter().try_for_each(|c| check("not null", c))?;
        self.data_types.keys().try_for_each(|c| check("data types", c))?;
        self.data_types_numeric
            .keys()
            .try_for_each(|c| check("numeric types", c))?;
        self.bind_types.keys().try_for_each(|c| check("bind types", c))?;
        if let Some(identity) = &self.identity_field {
            check("identity field", identity)?;
        }

        Ok(())
    }

    /// Whether `column` is flagged numeric.
    pub fn is_numeric(&self, column: &str) -> bool {
        self.data_types_numeric.get(column).copied().unwrap_or(false)
    }

    pub fn has_attribute(&self, column: &str) -> bool {
        self.attributes.iter().any(|a| a == column)
    }
}

/// Attribute alias maps, cached under the class name.
///
/// Both maps stay `None` until alias resolution has run for the class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    /// Column name → attribute name.
    #[serde(rename = "0")]
    pub column_map: Option<BTreeMap<String, String>>,

    /// Attribute name → column name.
    #[serde(rename = "1")]
    pub reverse_column_map: Option<BTreeMap<String, String>>,
}

impl ColumnMap {
    /// Build both directions from column → attribute pairs.
    pub fn from_pairs<I, C, A>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, A)>,
        C: Into<String>,
        A: Into<String>,
    {
        let column_map: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(c, a)| (c.into(), a.into()))
            .collect();
        let reverse_column_map = column_map
            .iter()
            .map(|(c, a)| (a.clone(), c.clone()))
            .collect();
        Self {
            column_map: Some(column_map),
            reverse_column_map: Some(reverse_column_map),
        }
    }

    /// True while alias resolution has not produced anything.
    pub fn is_unresolved(&self) -> bool {
        self.column_map.is_none() && self.reverse_column_map.is_none()
    }

    /// Attribute name for a column, falling back to the column itself.
    pub fn attribute_for<'a>(&'a self, column: &'a str) -> &'a str {
        self.column_map
            .as_ref()
            .and_then(|m| m.get(column))
            .map_or(column, String::as_str)
    }
}
