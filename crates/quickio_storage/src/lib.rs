//! # QuickIO Storage
//!
//! The ordered key-value engine boundary for QuickIO.
//!
//! Engines are **opaque byte stores** - they do not interpret the data
//! they hold. Record envelopes, primary-key layout and index triples
//! all belong to `quickio_core`.
//!
//! ## Capabilities
//!
//! - point `get` / `put` / `delete`
//! - atomic [`WriteBatch`] commits
//! - forward iteration from the smallest key
//! - `open` / `close` / `destroy` through the [`Store`] handle
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - For testing and ephemeral storage
//! - [`SledEngine`] - For persistent storage on disk
//!
//! ## Example
//!
//! ```rust
//! use quickio_storage::{Store, StorageError};
//!
//! let store = Store::in_memory();
//! store
//!     .batch::<StorageError, _>(|b| {
//!         b.put(b"a".to_vec(), b"1".to_vec());
//!         b.delete(b"b".to_vec());
//!         Ok(())
//!     })
//!     .unwrap();
//! assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod batch;
mod error;
mod file;
mod memory;
mod store;

pub use backend::{KvEngine, KvIter};
pub use batch::{BatchOp, WriteBatch};
pub use error::{StorageError, StorageResult};
pub use file::SledEngine;
pub use memory::MemoryEngine;
pub use store::Store;
