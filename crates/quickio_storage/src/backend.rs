//! Ordered key-value engine trait definition.

use crate::batch::WriteBatch;
use crate::error::StorageResult;

/// Forward iterator over `(key, value)` pairs in ascending key order.
pub type KvIter<'a> = Box<dyn Iterator<Item = StorageResult<(Vec<u8>, Vec<u8>)>> + 'a>;

/// An ordered, persistent key-value engine.
///
/// Engines are **opaque byte stores**. They know nothing about QuickIO
/// envelopes, ids or index triples; all interpretation happens in
/// `quickio_core`.
///
/// # Invariants
///
/// - Keys are ordered lexicographically by their bytes
/// - `write` applies every operation of a batch or none of them
/// - `iter` starts at the smallest key and moves forward
/// - Engines must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryEngine`] - For testing
/// - [`super::SledEngine`] - For persistent storage
pub trait KvEngine: Send + Sync {
    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be read.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Inserts or overwrites `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Applies every operation of `batch` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be committed; in that case
    /// none of its operations are visible.
    fn write(&self, batch: WriteBatch) -> StorageResult<()>;

    /// Returns a forward iterator starting at the smallest key.
    ///
    /// Whether writes made after this call are visible to the iterator
    /// depends on the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the iterator cannot be created.
    fn iter(&self) -> StorageResult<KvIter<'_>>;

    /// Flushes buffered writes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&self) -> StorageResult<()>;
}
