//! Typed collections and query options.
//!
//! A [`Collection<T>`] gives typed CRUD and query access to the records of
//! one type. Queries are full scans in id order filtered by Rust closures;
//! [`FindOptions`] adds sorting, paging and unique-index lookups on top.

mod options;
mod typed;

pub use options::{FindOptions, SortOrder};
pub use typed::Collection;
