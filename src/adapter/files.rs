//! Generated-file adapter.
//!
//! Each slot is one JSON file under `meta_data_dir`:
//!
//! ```text
//! <suffix>@<table>.json        schema record
//! <suffix>@<Class>.map.json    alias record
//! ```
//!
//! `@` never appears in an entity name, so the last `@` of a file name
//! separates the suffix from the entity and each file has exactly one owner.
//! `flush_all` only touches files whose suffix equals this adapter's and
//! whose entity part is a valid table or class key. The distinct extensions
//! keep `@robots.json` and `@Robots.map.json` apart on case-insensitive
//! filesystems.
//!
//! Writes go to a temporary file in the same directory and are renamed into
//! place, so readers see either the previous file or the new one, never a
//! partial write.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::{Adapter, AdapterOptions};
use crate::cache::{CacheError, CacheKey, CacheResult};

const MEDIUM: &str = "files";
const SEPARATOR: char = '@';
const TABLE_EXTENSION: &str = ".json";
const CLASS_EXTENSION: &str = ".map.json";

/// Stores each slot as a file under a configured directory.
#[derive(Debug)]
pub struct FilesAdapter {
    dir: PathBuf,
    suffix: String,
}

impl FilesAdapter {
    /// Create the adapter, creating `meta_data_dir` if it does not exist.
    ///
    /// # Errors
    /// `Configuration` when `meta_data_dir` is not set or the suffix contains
    /// a path separator, `MediumUnavailable` when the directory cannot be
    /// created.
    pub fn new(options: &AdapterOptions) -> CacheResult<Self> {
        let dir = options.meta_data_dir.clone().ok_or_else(|| {
            CacheError::Configuration("the files adapter requires 'meta_data_dir'".to_string())
        })?;
        if options.suffix.contains(['/', '\\', '\0']) {
            return Err(CacheError::Configuration(format!(
                "suffix {:?} cannot be part of a file name",
                options.suffix
            )));
        }
        fs::create_dir_all(&dir).map_err(|e| {
            CacheError::unavailable(MEDIUM, format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            dir,
            suffix: options.suffix.clone(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        let extension = match key {
            CacheKey::Table(_) => TABLE_EXTENSION,
            CacheKey::Class(_) => CLASS_EXTENSION,
        };
        self.dir.join(format!(
            "{}{}{}{}",
            self.suffix,
            SEPARATOR,
            key.discriminator(),
            extension
        ))
    }

    /// Whether `file_name` is a slot file of this adapter's namespace.
    fn owns(&self, file_name: &str) -> bool {
        let Some((suffix, entity)) = file_name.rsplit_once(SEPARATOR) else {
            return false;
        };
        if suffix != self.suffix {
            return false;
        }
        let is_class = entity
            .strip_suffix(CLASS_EXTENSION)
            .is_some_and(|class| CacheKey::class(class).is_ok());
        let is_table = entity.strip_suffix(TABLE_EXTENSION).is_some_and(|table| {
            CacheKey::table(table).is_ok_and(|key| key.discriminator() == table)
        });
        is_class || is_table
    }

    /// Slot files of this namespace currently in the directory.
    fn owned_files(&self) -> CacheResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_err(&self.dir, e))?.path();
            let owned = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| self.owns(name))
                && path.is_file();
            if owned {
                files.push(path);
            }
        }
        Ok(files)
    }
}

fn io_err(path: &Path, err: std::io::Error) -> CacheError {
    CacheError::unavailable(MEDIUM, format!("{}: {}", path.display(), err))
}

impl Adapter for FilesAdapter {
    fn name(&self) -> &'static str {
        "files"
    }

    fn read(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        let path = self.path_for(key);
        let mut temp = NamedTempFile::new_in(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        temp.write_all(bytes).map_err(|e| io_err(temp.path(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| io_err(temp.path(), e))?;
        temp.persist(&path).map_err(|e| io_err(&path, e.error))?;
        debug!(path = %path.display(), "wrote metadata file");
        Ok(())
    }

    fn exists(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.path_for(key).is_file())
    }

    fn flush_all(&self) -> CacheResult<()> {
        for path in self.owned_files()? {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_err(&path, e)),
            }
        }
        Ok(())
    }

    fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.owned_files()?.is_empty())
    }
}
