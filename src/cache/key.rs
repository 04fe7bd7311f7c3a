//! Cache key naming.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::{CacheError, CacheResult};

/// Prefix shared by every key written to an external medium.
pub const KEY_PREFIX: &str = "$PMM$";

static ENTITY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").unwrap());

/// Discriminator of one cache slot.
///
/// Table keys are always lowercase and class keys always start with an
/// uppercase letter, so the two kinds never share a discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Schema record, keyed by the lowercased table name.
    Table(String),
    /// Alias record, keyed by the exact class name.
    Class(String),
}

impl CacheKey {
    /// Key for the schema record of `table`.
    pub fn table(table: &str) -> CacheResult<Self> {
        check_name(table)?;
        Ok(CacheKey::Table(table.to_lowercase()))
    }

    /// Key for the alias record of `class_name`.
    pub fn class(class_name: &str) -> CacheResult<Self> {
        check_name(class_name)?;
        if !class_name.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Err(CacheError::InvalidEntity(format!(
                "{class_name} (class names must start with an uppercase letter)"
            )));
        }
        Ok(CacheKey::Class(class_name.to_string()))
    }

    /// The part of the key that identifies the entity.
    pub fn discriminator(&self) -> &str {
        match self {
            CacheKey::Table(name) | CacheKey::Class(name) => name,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.discriminator())
    }
}

fn check_name(name: &str) -> CacheResult<()> {
    if ENTITY_NAME.is_match(name) {
        Ok(())
    } else {
        Err(CacheError::InvalidEntity(name.to_string()))
    }
}

/// Suffix-scoped key namespace for external media.
///
/// Keys are a pure function of the configured suffix and the discriminator,
/// so a second process with the same configuration sees the same keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyNamespace {
    suffix: String,
}

impl KeyNamespace {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// `$PMM$<suffix>`: the single top-level key of compound media.
    pub fn root(&self) -> String {
        format!("{}{}", KEY_PREFIX, self.suffix)
    }

    /// `$PMM$<suffix><discriminator>`: one key per entity.
    pub fn key(&self, key: &CacheKey) -> String {
        format!("{}{}{}", KEY_PREFIX, self.suffix, key.discriminator())
    }

    /// Key under which per-entity media track the keys they created.
    ///
    /// `$` never appears in a discriminator, so this cannot collide with an
    /// entity key of the same namespace.
    pub fn index_key(&self) -> String {
        format!("{}{}$index", KEY_PREFIX, self.suffix)
    }
}
