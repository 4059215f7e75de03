//! Test fixtures and database helpers.
//!
//! Provides sample record types, temporary databases and common test
//! scenarios.

use quickio_core::{entity, Config, Database};
use tempfile::TempDir;

entity! {
    /// A book with a unique ISBN.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Book {
        #[indexed]
        pub isbn: String,
        pub title: String,
        pub price: f64,
        pub pages: Option<u32>,
    }
}

impl Book {
    /// Creates an unsaved book.
    pub fn new(isbn: &str, title: &str, price: f64) -> Self {
        Self {
            isbn: isbn.into(),
            title: title.into(),
            price,
            ..Self::default()
        }
    }
}

entity! {
    /// A student with a unique optional card number.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Student {
        pub name: String,
        pub age: i32,
        #[indexed]
        pub card: Option<i64>,
        pub scores: Vec<f64>,
    }
}

impl Student {
    /// Creates an unsaved student without a card.
    pub fn new(name: &str, age: i32) -> Self {
        Self {
            name: name.into(),
            age,
            ..Self::default()
        }
    }
}

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    config: Option<Config>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self {
            db: Database::open_in_memory("test").expect("Failed to open in-memory database"),
            config: None,
            _temp_dir: None,
        }
    }

    /// Creates a new on-disk test database in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = Config::new("test").path(temp_dir.path());
        let db = Database::open(config.clone()).expect("Failed to open file database");
        Self {
            db,
            config: Some(config),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Closes and reopens an on-disk database. In-memory databases are
    /// returned unchanged.
    pub fn reopen(self) -> Self {
        let Some(config) = self.config.clone() else {
            return self;
        };
        self.db.close().expect("Failed to close database");
        let db = Database::open(config.clone()).expect("Failed to reopen database");
        Self {
            db,
            config: self.config,
            _temp_dir: self._temp_dir,
        }
    }

    /// Returns the database directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<std::path::PathBuf> {
        self.config.as_ref().map(Config::primary_dir)
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary on-disk database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &std::path::Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db.db, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a database holding `count` books with ISBNs `isbn-0..` and
    /// prices `0.0..`.
    pub fn library(count: usize) -> (TestDatabase, Vec<Book>) {
        let test_db = TestDatabase::memory();
        let mut books: Vec<Book> = (0..count)
            .map(|i| Book::new(&format!("isbn-{i}"), &format!("Volume {i}"), i as f64))
            .collect();
        test_db
            .collection::<Book>()
            .save_all(&mut books)
            .expect("Failed to save books");
        (test_db, books)
    }

    /// Creates a database mixing books and students in one keyspace.
    pub fn mixed(books: usize, students: usize) -> TestDatabase {
        let test_db = TestDatabase::memory();
        for i in 0..books.max(students) {
            if i < books {
                let mut book = Book::new(&format!("isbn-{i}"), "Mixed", 1.0);
                test_db
                    .collection::<Book>()
                    .save(&mut book)
                    .expect("Failed to save book");
            }
            if i < students {
                let mut student = Student::new(&format!("student-{i}"), 20);
                test_db
                    .collection::<Student>()
                    .save(&mut student)
                    .expect("Failed to save student");
            }
        }
        test_db
    }
}
