//! Owned store handle.

use crate::backend::{KvEngine, KvIter};
use crate::batch::WriteBatch;
use crate::error::{StorageError, StorageResult};
use crate::file::SledEngine;
use crate::memory::MemoryEngine;
use std::fmt;
use std::path::{Path, PathBuf};

/// An open key-value store.
///
/// `Store` owns its engine: dropping the handle releases it, and
/// [`Store::close`] / [`Store::destroy`] release it explicitly. There is
/// no process-exit hook.
pub struct Store {
    engine: Box<dyn KvEngine>,
    path: Option<PathBuf>,
}

impl Store {
    /// Opens (or creates) a persistent store in `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be opened.
    pub fn open(path: &Path, cache_size: u64) -> StorageResult<Self> {
        let engine = SledEngine::open(path, cache_size)?;
        Ok(Self {
            engine: Box::new(engine),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an ephemeral in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            engine: Box::new(MemoryEngine::new()),
            path: None,
        }
    }

    /// Wraps an arbitrary engine.
    ///
    /// `path` is the directory removed by [`Store::destroy`], if any.
    #[must_use]
    pub fn with_engine(engine: Box<dyn KvEngine>, path: Option<PathBuf>) -> Self {
        Self { engine, path }
    }

    /// Returns the on-disk directory, or `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.engine.get(key)
    }

    /// Inserts or overwrites `key`.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.engine.put(key, value)
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.engine.delete(key)
    }

    /// Commits a prepared batch atomically. Empty batches are skipped.
    ///
    /// # Errors
    ///
    /// Propagates engine errors; nothing is applied on failure.
    pub fn write(&self, batch: WriteBatch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        tracing::trace!(ops = batch.len(), "committing write batch");
        self.engine.write(batch)
    }

    /// Builds a batch with `f` and commits it if `f` returns `Ok`.
    ///
    /// If `f` fails, nothing is written and its error is returned.
    ///
    /// # Errors
    ///
    /// Returns the closure's error or the commit error.
    pub fn batch<E, F>(&self, f: F) -> Result<(), E>
    where
        F: FnOnce(&mut WriteBatch) -> Result<(), E>,
        E: From<StorageError>,
    {
        let mut batch = WriteBatch::new();
        f(&mut batch)?;
        self.write(batch)?;
        Ok(())
    }

    /// Returns a forward iterator from the smallest key.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn iter(&self) -> StorageResult<KvIter<'_>> {
        self.engine.iter()
    }

    /// Flushes buffered writes.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn flush(&self) -> StorageResult<()> {
        self.engine.flush()
    }

    /// Flushes and releases the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails; the engine is released
    /// regardless.
    pub fn close(self) -> StorageResult<()> {
        let result = self.engine.flush();
        tracing::debug!(path = ?self.path, "closed store");
        drop(self.engine);
        result
    }

    /// Releases the engine and removes all of its on-disk state.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn destroy(self) -> StorageResult<()> {
        let Store { engine, path } = self;
        drop(engine);
        if let Some(path) = path {
            if path.exists() {
                std::fs::remove_dir_all(&path)?;
            }
            tracing::debug!(path = %path.display(), "destroyed store");
        }
        Ok(())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("path", &self.path).finish()
    }
}
