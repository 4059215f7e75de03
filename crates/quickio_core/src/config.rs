//! Database configuration.

use crate::error::{CoreError, CoreResult};
use std::path::PathBuf;

/// Default base directory for databases.
pub const DEFAULT_PATH: &str = "data/db";

/// Name of the index store directory inside a database directory.
pub const INDEX_DIR: &str = "index";

/// Configuration for opening a database.
///
/// ```rust
/// use quickio_core::Config;
///
/// let config = Config::new("library")
///     .path("/tmp/quickio")
///     .cache_size(32 * 1024 * 1024);
/// assert_eq!(config.primary_dir(), std::path::Path::new("/tmp/quickio/library"));
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Database name, used as the directory name.
    pub name: String,

    /// Base directory holding every database.
    pub path: PathBuf,

    /// Page cache of the primary store, in bytes.
    pub cache_size: u64,

    /// Page cache of the index store, in bytes.
    pub index_cache_size: u64,

    /// Datacenter discriminator for generated ids (0..32).
    pub datacenter_id: u8,

    /// Worker discriminator for generated ids (0..32).
    pub worker_id: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: String::new(),
            path: PathBuf::from(DEFAULT_PATH),
            cache_size: 10 * 1024 * 1024, // 10 MiB
            index_cache_size: 1024 * 1024, // 1 MiB
            datacenter_id: 0,
            worker_id: 0,
        }
    }
}

impl Config {
    /// Creates a configuration for the database `name` with default values.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the base directory.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the primary store cache size.
    #[must_use]
    pub const fn cache_size(mut self, bytes: u64) -> Self {
        self.cache_size = bytes;
        self
    }

    /// Sets the index store cache size.
    #[must_use]
    pub const fn index_cache_size(mut self, bytes: u64) -> Self {
        self.index_cache_size = bytes;
        self
    }

    /// Sets the datacenter id embedded in generated ids.
    #[must_use]
    pub const fn datacenter_id(mut self, id: u8) -> Self {
        self.datacenter_id = id;
        self
    }

    /// Sets the worker id embedded in generated ids.
    #[must_use]
    pub const fn worker_id(mut self, id: u8) -> Self {
        self.worker_id = id;
        self
    }

    /// Checks that the name is usable as a single directory component.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidName`] for an empty name, `.`, `..`, or
    /// a name containing a path separator.
    pub fn validate(&self) -> CoreResult<()> {
        validate_name(&self.name)
    }

    /// Directory of the primary store, `<path>/<name>`.
    #[must_use]
    pub fn primary_dir(&self) -> PathBuf {
        self.path.join(&self.name)
    }

    /// Directory of the index store, `<path>/<name>/index`.
    #[must_use]
    pub fn index_dir(&self) -> PathBuf {
        self.primary_dir().join(INDEX_DIR)
    }
}

pub(crate) fn validate_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::invalid_name(name, "name is empty"));
    }
    if name.contains(['/', '\\']) {
        return Err(CoreError::invalid_name(name, "name contains a path separator"));
    }
    if name == "." || name == ".." {
        return Err(CoreError::invalid_name(name, "name refers to a relative directory"));
    }
    Ok(())
}
