//! Index compensation when primary writes fail.

use quickio_core::{CoreError, Database, FindOptions, Store};
use quickio_testkit::{Book, FaultyEngine, Faults};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn faulty_db() -> (Database, Arc<Faults>) {
    init_tracing();
    let (primary, faults) = FaultyEngine::memory_store();
    let db = Database::open_with_stores("faulty", primary, Store::in_memory()).unwrap();
    (db, faults)
}

fn indexed(db: &Database, isbn: &str) -> bool {
    db.collection::<Book>()
        .exists(&FindOptions::new().index("isbn", isbn))
        .unwrap()
}

#[test]
fn failed_insert_leaves_no_index_entry() {
    let (db, faults) = faulty_db();
    let books = db.collection::<Book>();

    faults.fail_puts(true);
    let mut book = Book::new("lost", "Lost", 1.0);
    assert!(books.save(&mut book).is_err());

    assert_eq!(book.object_id, 0);
    assert_eq!(book.created_at, 0);
    assert!(!indexed(&db, "lost"));
    assert_eq!(db.indexer().store().iter().unwrap().count(), 0);

    faults.reset();
    books.save(&mut book).unwrap();
    assert!(indexed(&db, "lost"));
}

#[test]
fn failed_resave_restores_previous_entry() {
    let (db, faults) = faulty_db();
    let books = db.collection::<Book>();

    let mut book = Book::new("before", "Kept", 1.0);
    books.save(&mut book).unwrap();
    let id = book.object_id;

    faults.fail_puts(true);
    let mut changed = book.clone();
    changed.isbn = "after".into();
    assert!(books.save(&mut changed).is_err());
    faults.reset();

    assert_eq!(changed.object_id, 0);
    assert!(indexed(&db, "before"));
    assert!(!indexed(&db, "after"));
    assert_eq!(books.find_one(id).unwrap(), Some(book));
}

#[test]
fn failed_batch_save_retracts_all_entries() {
    let (db, faults) = faulty_db();
    let books = db.collection::<Book>();

    let mut existing = Book::new("existing", "Old", 1.0);
    books.save(&mut existing).unwrap();

    faults.fail_writes(true);
    let mut batch = vec![
        Book::new("a", "A", 1.0),
        Book::new("b", "B", 2.0),
        Book {
            title: "Renamed".into(),
            ..existing.clone()
        },
    ];
    assert!(books.save_all(&mut batch).is_err());
    faults.reset();

    assert!(batch.iter().all(|b| b.object_id == 0));
    assert!(!indexed(&db, "a"));
    assert!(!indexed(&db, "b"));
    assert!(indexed(&db, "existing"));
    assert_eq!(books.count().unwrap(), 1);
    assert_eq!(books.find_one(existing.object_id).unwrap(), Some(existing));
}

#[test]
fn failed_update_restores_pre_images() {
    let (db, faults) = faulty_db();
    let books = db.collection::<Book>();

    let mut batch = vec![Book::new("x", "X", 1.0), Book::new("y", "Y", 2.0)];
    books.save_all(&mut batch).unwrap();

    faults.fail_writes(true);
    let template = Book {
        isbn: "x2".into(),
        ..Book::default()
    };
    assert!(books.update(&template, |b| b.isbn == "x").is_err());
    faults.reset();

    assert!(indexed(&db, "x"));
    assert!(!indexed(&db, "x2"));
    assert!(indexed(&db, "y"));
    assert_eq!(books.find_all().unwrap(), batch);
}

#[test]
fn failed_batch_delete_keeps_everything() {
    let (db, faults) = faulty_db();
    let books = db.collection::<Book>();

    let mut batch = vec![Book::new("p", "P", 1.0), Book::new("q", "Q", 2.0)];
    books.save_all(&mut batch).unwrap();

    faults.fail_writes(true);
    assert!(books.delete_all().is_err());
    faults.reset();

    assert_eq!(books.count().unwrap(), 2);
    assert!(indexed(&db, "p"));
    assert!(indexed(&db, "q"));
}

#[test]
fn double_failure_reports_the_original_error() {
    init_tracing();
    let (primary, primary_faults) = FaultyEngine::memory_store();
    let (index, index_faults) = FaultyEngine::memory_store();
    let db = Database::open_with_stores("double", primary, index).unwrap();
    let books = db.collection::<Book>();

    primary_faults.fail_puts(true);
    // The index batch goes through, the compensating one does not.
    index_faults.fail_writes_after(1);
    let mut book = Book::new("stale", "Stale", 1.0);
    let err = books.save(&mut book).unwrap_err();

    assert!(err.to_string().contains("injected put failure"));
    assert_eq!(book.object_id, 0);
    assert_eq!(books.count().unwrap(), 0);
    // The compensation failed, so the entry outlives the record.
    assert!(indexed(&db, "stale"));
    assert_eq!(
        books
            .find_with_index(&FindOptions::new().index("isbn", "stale"))
            .unwrap(),
        None
    );

    primary_faults.reset();
    index_faults.reset();
    let err = books.save(&mut book).unwrap_err();
    assert!(matches!(err, CoreError::UniqueViolation { .. }));
}
