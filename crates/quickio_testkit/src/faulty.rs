//! Fault injection for storage engines.
//!
//! [`FaultyEngine`] wraps another engine and fails selected operations
//! while a switch is on. The switches live in a shared [`Faults`] handle,
//! so a test can keep flipping them after the engine has been moved into
//! a [`Store`].
//!
//! ```rust
//! use quickio_core::Database;
//! use quickio_testkit::{Book, FaultyEngine};
//!
//! let (primary, faults) = FaultyEngine::memory_store();
//! let db = Database::open_with_stores("faulty", primary, quickio_core::Store::in_memory()).unwrap();
//! let books = db.collection::<Book>();
//!
//! faults.fail_puts(true);
//! let mut book = Book::new("1", "Emma", 3.0);
//! assert!(books.save(&mut book).is_err());
//! assert_eq!(book.object_id, 0);
//! ```

use quickio_storage::{KvEngine, KvIter, MemoryEngine, StorageError, StorageResult, Store, WriteBatch};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Switches controlling which operations of a [`FaultyEngine`] fail.
#[derive(Debug)]
pub struct Faults {
    puts: AtomicBool,
    writes: AtomicBool,
    deletes: AtomicBool,
    write_budget: AtomicUsize,
    injected: AtomicUsize,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            puts: AtomicBool::new(false),
            writes: AtomicBool::new(false),
            deletes: AtomicBool::new(false),
            write_budget: AtomicUsize::new(usize::MAX),
            injected: AtomicUsize::new(0),
        }
    }
}

impl Faults {
    /// Fails single-key puts while `on`.
    pub fn fail_puts(&self, on: bool) {
        self.puts.store(on, Ordering::SeqCst);
    }

    /// Fails batch commits while `on`.
    pub fn fail_writes(&self, on: bool) {
        self.writes.store(on, Ordering::SeqCst);
    }

    /// Fails single-key deletes while `on`.
    pub fn fail_deletes(&self, on: bool) {
        self.deletes.store(on, Ordering::SeqCst);
    }

    /// Lets `n` more batch commits through, then fails every later one.
    pub fn fail_writes_after(&self, n: usize) {
        self.write_budget.store(n, Ordering::SeqCst);
    }

    /// Turns every switch off.
    pub fn reset(&self) {
        self.fail_puts(false);
        self.fail_writes(false);
        self.fail_deletes(false);
        self.write_budget.store(usize::MAX, Ordering::SeqCst);
    }

    /// Number of operations failed so far.
    pub fn injected(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    fn check(&self, switch: &AtomicBool, operation: &str) -> StorageResult<()> {
        if switch.load(Ordering::SeqCst) {
            return Err(self.inject(operation));
        }
        Ok(())
    }

    fn check_write(&self) -> StorageResult<()> {
        self.check(&self.writes, "batch write")?;
        let spent = self
            .write_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                usize::MAX => Some(left),
                0 => None,
                _ => Some(left - 1),
            });
        if spent.is_err() {
            return Err(self.inject("batch write"));
        }
        Ok(())
    }

    fn inject(&self, operation: &str) -> StorageError {
        self.injected.fetch_add(1, Ordering::SeqCst);
        StorageError::engine(format!("injected {operation} failure"))
    }
}

/// An engine wrapper that can fail on demand.
pub struct FaultyEngine {
    inner: Box<dyn KvEngine>,
    faults: Arc<Faults>,
}

impl FaultyEngine {
    /// Wraps `inner` with every switch off.
    pub fn new(inner: Box<dyn KvEngine>) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Returns the shared switch handle.
    pub fn faults(&self) -> Arc<Faults> {
        Arc::clone(&self.faults)
    }

    /// Builds an in-memory store behind a faulty engine.
    pub fn memory_store() -> (Store, Arc<Faults>) {
        let engine = Self::new(Box::new(MemoryEngine::new()));
        let faults = engine.faults();
        (Store::with_engine(Box::new(engine), None), faults)
    }
}

impl KvEngine for FaultyEngine {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.faults.check(&self.faults.puts, "put")?;
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.faults.check(&self.faults.deletes, "delete")?;
        self.inner.delete(key)
    }

    fn write(&self, batch: WriteBatch) -> StorageResult<()> {
        self.faults.check_write()?;
        self.inner.write(batch)
    }

    fn iter(&self) -> StorageResult<KvIter<'_>> {
        self.inner.iter()
    }

    fn flush(&self) -> StorageResult<()> {
        self.inner.flush()
    }
}
