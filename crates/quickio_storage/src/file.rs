//! Persistent engine backed by sled.

use crate::backend::{KvEngine, KvIter};
use crate::batch::{BatchOp, WriteBatch};
use crate::error::{StorageError, StorageResult};
use std::path::{Path, PathBuf};

/// A persistent ordered engine on top of a sled database.
///
/// Data survives process restarts. sled keeps its keys in a B+Tree, so
/// iteration is lexicographic by key bytes.
///
/// # Durability
///
/// - `write` commits through `apply_batch`, which is atomic
/// - `flush()` forces dirty pages to disk
///
/// # Example
///
/// ```no_run
/// use quickio_storage::{KvEngine, SledEngine};
/// use std::path::Path;
///
/// let engine = SledEngine::open(Path::new("data/db/books"), 10 * 1024 * 1024).unwrap();
/// engine.put(b"key", b"value").unwrap();
/// engine.flush().unwrap();
/// ```
#[derive(Debug)]
pub struct SledEngine {
    path: PathBuf,
    db: sled::Db,
}

impl SledEngine {
    /// Opens or creates an engine in `path` with a page cache of
    /// `cache_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or sled
    /// refuses to open it (for example because another handle holds it).
    pub fn open(path: &Path, cache_size: u64) -> StorageResult<Self> {
        std::fs::create_dir_all(path)?;
        let db = sled::Config::new()
            .path(path)
            .cache_capacity(cache_size)
            .open()?;
        tracing::debug!(path = %path.display(), cache_size, "opened sled engine");
        Ok(Self {
            path: path.to_path_buf(),
            db,
        })
    }

    /// Returns the directory holding the engine files.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvEngine for SledEngine {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|ivec| ivec.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.db.remove(key)?;
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut sled_batch = sled::Batch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => sled_batch.insert(key, value),
                BatchOp::Delete { key } => sled_batch.remove(key),
            }
        }
        self.db.apply_batch(sled_batch)?;
        Ok(())
    }

    fn iter(&self) -> StorageResult<KvIter<'_>> {
        Ok(Box::new(self.db.iter().map(|item| {
            item.map(|(k, v)| (k.to_vec(), v.to_vec()))
                .map_err(StorageError::from)
        })))
    }

    fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CACHE: u64 = 1024 * 1024;

    #[test]
    fn sled_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");

        let engine = SledEngine::open(&path, CACHE).unwrap();
        assert_eq!(engine.path(), path);
        assert!(path.exists());
        assert_eq!(engine.iter().unwrap().count(), 0);
    }

    #[test]
    fn sled_put_get_delete() {
        let dir = tempdir().unwrap();
        let engine = SledEngine::open(dir.path(), CACHE).unwrap();

        engine.put(b"hello", b"world").unwrap();
        assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));

        engine.delete(b"hello").unwrap();
        assert_eq!(engine.get(b"hello").unwrap(), None);
    }

    #[test]
    fn sled_batch_is_applied() {
        let dir = tempdir().unwrap();
        let engine = SledEngine::open(dir.path(), CACHE).unwrap();
        engine.put(b"old", b"x").unwrap();

        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        batch.delete(b"old".to_vec());
        engine.write(batch).unwrap();

        assert_eq!(engine.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(engine.get(b"old").unwrap(), None);
    }

    #[test]
    fn sled_iter_is_big_endian_ordered() {
        let dir = tempdir().unwrap();
        let engine = SledEngine::open(dir.path(), CACHE).unwrap();

        for n in [300u64, 2, 70_000, 1] {
            engine.put(&n.to_be_bytes(), b"v").unwrap();
        }

        let keys: Vec<u64> = engine
            .iter()
            .unwrap()
            .map(|r| {
                let (k, _) = r.unwrap();
                u64::from_be_bytes(k.try_into().unwrap())
            })
            .collect();
        assert_eq!(keys, vec![1, 2, 300, 70_000]);
    }

    #[test]
    fn sled_persistence() {
        let dir = tempdir().unwrap();

        {
            let engine = SledEngine::open(dir.path(), CACHE).unwrap();
            engine.put(b"persistent", b"data").unwrap();
            engine.flush().unwrap();
        }

        {
            let engine = SledEngine::open(dir.path(), CACHE).unwrap();
            assert_eq!(engine.get(b"persistent").unwrap(), Some(b"data".to_vec()));
        }
    }
}
