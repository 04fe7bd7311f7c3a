//! TOML-based configuration for the metadata cache.
//!
//! Supports a config file (metacache.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [metadata]
//! adapter = "shared_kv"        # memory | session | shared_kv | files
//! suffix = "my-local-app"
//! lifetime = 60
//! kv_path = "${HOME}/.metacache/shared.db"
//! meta_data_dir = "./cache/metadata"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapter::{Adapter, AdapterOptions, FilesAdapter, MemoryAdapter, SharedKvAdapter, SqliteKv};
use crate::cache::CacheError;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to open adapter: {0}")]
    Adapter(#[from] CacheError),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Metadata cache configuration.
    pub metadata: MetadataSettings,
}

/// Which adapter backs the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    #[default]
    Memory,
    Session,
    SharedKv,
    Files,
}

/// Metadata cache configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MetadataSettings {
    pub adapter: AdapterKind,

    #[serde(flatten)]
    pub options: AdapterOptions,
}

impl MetadataSettings {
    /// Adapter options with environment variables expanded in every path.
    pub fn resolved_options(&self) -> Result<AdapterOptions, SettingsError> {
        let mut options = self.options.clone();
        options.meta_data_dir = options
            .meta_data_dir
            .map(|p| expand_path(&p))
            .transpose()?;
        options.kv_path = options.kv_path.map(|p| expand_path(&p)).transpose()?;
        Ok(options)
    }

    /// Open the configured adapter.
    ///
    /// The session adapter needs a live session handle and cannot be opened
    /// from configuration alone; construct [`crate::adapter::SessionAdapter`]
    /// directly instead.
    pub fn open_adapter(&self) -> Result<Box<dyn Adapter>, SettingsError> {
        let options = self.resolved_options()?;
        let adapter: Box<dyn Adapter> = match self.adapter {
            AdapterKind::Memory => Box::new(MemoryAdapter::new()),
            AdapterKind::Files => Box::new(FilesAdapter::new(&options)?),
            AdapterKind::SharedKv => {
                let path = match &options.kv_path {
                    Some(path) => path.clone(),
                    None => default_kv_path()?,
                };
                let medium = Arc::new(SqliteKv::open(path)?);
                Box::new(SharedKvAdapter::new(medium, &options))
            }
            AdapterKind::Session => {
                return Err(SettingsError::InvalidConfig(
                    "the session adapter requires a session handle".to_string(),
                ))
            }
        };
        Ok(adapter)
    }
}

/// Default shared database: `~/.metacache/shared.db`.
pub fn default_kv_path() -> Result<PathBuf, SettingsError> {
    let base = dirs::home_dir().ok_or_else(|| {
        SettingsError::InvalidConfig("cannot determine home directory for kv_path".to_string())
    })?;
    Ok(base.join(".metacache").join("shared.db"))
}

fn expand_path(path: &Path) -> Result<PathBuf, SettingsError> {
    let raw = path.to_str().ok_or_else(|| {
        SettingsError::InvalidConfig(format!("path is not valid UTF-8: {}", path.display()))
    })?;
    Ok(PathBuf::from(expand_env_vars(raw)?))
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `METACACHE_CONFIG`
    /// 2. `./metacache.toml`
    /// 3. `~/.config/metacache/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("METACACHE_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("metacache.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("metacache").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
