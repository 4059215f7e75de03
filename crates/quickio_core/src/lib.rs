//! # QuickIO Core
//!
//! An embedded document store over an ordered key-value engine.
//!
//! This crate provides:
//! - Time-ordered 64-bit record ids ([`IdGenerator`])
//! - Record types declared with the [`entity!`] macro
//! - A unique secondary index kept in step with primary data
//! - Typed collections with closure filters, sorting and paging
//!
//! ```rust
//! use quickio_core::{entity, Database, FindOptions};
//!
//! entity! {
//!     #[derive(Debug, Clone, Default)]
//!     pub struct Student {
//!         #[indexed]
//!         pub number: i64,
//!         pub name: String,
//!         pub grade: Option<f64>,
//!     }
//! }
//!
//! let db = Database::open_in_memory("school")?;
//! let students = db.collection::<Student>();
//!
//! let mut ann = Student { number: 1, name: "Ann".into(), ..Student::default() };
//! students.save(&mut ann)?;
//!
//! let found = students.find_with_index(&FindOptions::new().index("number", 1))?;
//! assert_eq!(found.map(|s| s.name), Some("Ann".to_string()));
//! # Ok::<(), quickio_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod database;
mod error;
pub mod id;
mod index;
mod macros;
mod schema;

pub use collection::{Collection, FindOptions, SortOrder};
pub use config::{Config, DEFAULT_PATH, INDEX_DIR};
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use id::{is_generated, timestamp_of, IdGenerator};
pub use index::Indexer;
pub use schema::{
    is_system_field, Entity, FieldDef, FieldKind, FieldValue, Number, Schema, CREATED_AT,
    OBJECT_ID,
};

#[doc(hidden)]
pub use schema::decode_field;

pub use quickio_codec::{self as codec, CodecError, CodecResult, Tagged, Value};
pub use quickio_storage::{self as storage, KvEngine, MemoryEngine, StorageError, Store};
