//! Configuration module for the metadata cache.
//!
//! Handles the config file, environment variable expansion, and opening the
//! configured adapter.

mod settings;

pub use settings::{
    default_kv_path, expand_env_vars, AdapterKind, MetadataSettings, Settings, SettingsError,
};
