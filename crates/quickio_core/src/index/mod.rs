//! Unique secondary index.
//!
//! Fields declared `#[indexed]` are unique per record type: at most one
//! live record may hold a given value. The index lives in its own store
//! next to the primary data and is kept in step with it by the
//! collection operations.
//!
//! # Layout
//!
//! - `encode("[Type,field,value]")` → 8-byte id of the owner
//! - 8-byte id → that record's field → triple map
//!
//! Primary and index writes go to two different stores, so they cannot
//! share one atomic batch. When a primary write fails after its index
//! batch committed, the index entries are compensated; if the
//! compensation fails too, the error is logged and the index is
//! inconsistent until the records are saved again.

mod indexer;
mod map;

pub use indexer::Indexer;
