//! # QuickIO Testkit
//!
//! Test utilities for QuickIO.
//!
//! This crate provides:
//! - Sample record types and temporary databases
//! - Property-based test generators using proptest
//! - A storage engine wrapper that fails on demand
//!
//! ## Usage
//!
//! ```rust
//! use quickio_testkit::prelude::*;
//!
//! with_temp_db(|db| {
//!     let books = db.collection::<Book>();
//!     let mut book = Book::new("978-3", "Dune", 12.0);
//!     books.save(&mut book).unwrap();
//!     assert_eq!(books.count().unwrap(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
/// Everything a test usually needs.
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
