//! Property tests over ids, envelopes and query options.

use proptest::prelude::*;
use quickio_core::codec::{decode, decode_key, encode, encode_key};
use quickio_core::{Config, CoreError, Database, FindOptions, IdGenerator, SortOrder};
use quickio_testkit::{
    book_strategy, distinct_books_strategy, invalid_name_strategy, page_strategy,
    student_strategy, Book, Student, TestDatabase,
};

proptest! {
    #[test]
    fn key_roundtrip(id in any::<u64>()) {
        prop_assert_eq!(decode_key(&encode_key(id)).unwrap(), id);
    }

    #[test]
    fn key_order_matches_id_order(a in any::<u64>(), b in any::<u64>()) {
        prop_assert_eq!(encode_key(a).cmp(&encode_key(b)), a.cmp(&b));
    }

    #[test]
    fn envelope_keeps_records_apart(book in book_strategy(), student in student_strategy()) {
        let book_bytes = encode(&book).unwrap();
        prop_assert_eq!(decode::<Book>(&book_bytes), Some(book));
        prop_assert!(decode::<Student>(&book_bytes).is_none());

        let student_bytes = encode(&student).unwrap();
        prop_assert_eq!(decode::<Student>(&student_bytes), Some(student));
        prop_assert!(decode::<Book>(&student_bytes).is_none());
    }

    #[test]
    fn names_with_separators_are_rejected(name in invalid_name_strategy()) {
        let is_invalid_name = matches!(
            Database::open(Config::new(name).path("/nonexistent")),
            Err(CoreError::InvalidName { .. })
        );
        prop_assert!(is_invalid_name);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sorted_pages_are_subslices(
        books in distinct_books_strategy(24),
        (skip, limit) in page_strategy(),
        descending in any::<bool>(),
    ) {
        let db = TestDatabase::memory();
        let collection = db.collection::<Book>();
        let mut books = books;
        collection.save_all(&mut books).unwrap();

        let order = if descending { SortOrder::Descending } else { SortOrder::Ascending };
        let sorted = collection
            .find_with_options(|b| b.price > 1.0, &FindOptions::new().sort("price", order))
            .unwrap();
        prop_assert!(sorted.iter().all(|b| b.price > 1.0));
        for pair in sorted.windows(2) {
            match order {
                SortOrder::Ascending => {
                    prop_assert!(pair[0].price <= pair[1].price);
                }
                SortOrder::Descending => {
                    prop_assert!(pair[0].price >= pair[1].price);
                }
            }
        }

        let page = collection
            .find_with_options(
                |b| b.price > 1.0,
                &FindOptions::new().sort("price", order).skip(skip).limit(limit),
            )
            .unwrap();
        let expected: Vec<Book> = sorted.into_iter().skip(skip).take(limit).collect();
        prop_assert_eq!(page, expected);
    }

    #[test]
    fn integer_and_system_sorts_are_exact(
        books in distinct_books_strategy(24),
        (skip, limit) in page_strategy(),
        descending in any::<bool>(),
    ) {
        let db = TestDatabase::memory();
        let collection = db.collection::<Book>();
        let mut books = books;
        collection.save_all(&mut books).unwrap();
        let order = if descending { SortOrder::Descending } else { SortOrder::Ascending };

        let mut expected_ids: Vec<u64> = books.iter().map(|b| b.object_id).collect();
        expected_ids.sort_unstable();
        if descending {
            expected_ids.reverse();
        }
        let by_id: Vec<u64> = collection
            .find_with_options(|_| true, &FindOptions::new().sort("object_id", order))
            .unwrap()
            .iter()
            .map(|b| b.object_id)
            .collect();
        prop_assert_eq!(by_id, expected_ids);

        let by_time = collection
            .find_with_options(|_| true, &FindOptions::new().sort("created_at", order))
            .unwrap();
        for pair in by_time.windows(2) {
            match order {
                SortOrder::Ascending => {
                    prop_assert!(pair[0].created_at <= pair[1].created_at);
                }
                SortOrder::Descending => {
                    prop_assert!(pair[0].created_at >= pair[1].created_at);
                }
            }
        }

        let by_pages = collection
            .find_with_options(|_| true, &FindOptions::new().sort("pages", order))
            .unwrap();
        for pair in by_pages.windows(2) {
            match order {
                SortOrder::Ascending => {
                    prop_assert!(pair[0].pages <= pair[1].pages);
                }
                SortOrder::Descending => {
                    prop_assert!(pair[0].pages >= pair[1].pages);
                }
            }
        }

        let page = collection
            .find_with_options(
                |_| true,
                &FindOptions::new().sort("pages", order).skip(skip).limit(limit),
            )
            .unwrap();
        let expected: Vec<Book> = by_pages.into_iter().skip(skip).take(limit).collect();
        prop_assert_eq!(page, expected);
    }

    #[test]
    fn every_saved_book_is_indexed(books in distinct_books_strategy(16)) {
        let db = TestDatabase::memory();
        let collection = db.collection::<Book>();
        let mut books = books;
        collection.save_all(&mut books).unwrap();

        prop_assert_eq!(collection.count().unwrap(), books.len());
        for book in &books {
            let found = collection
                .find_with_index(&FindOptions::new().index("isbn", book.isbn.as_str()))
                .unwrap();
            prop_assert_eq!(found.as_ref(), Some(book));
        }
    }
}

#[test]
fn concurrent_ids_are_unique_and_increasing() {
    let generator = IdGenerator::shared();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let generator = std::sync::Arc::clone(&generator);
            std::thread::spawn(move || {
                (0..2_000)
                    .map(|_| generator.next_id().unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        let ids = handle.join().unwrap();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        all.extend(ids);
    }
    let total = all.len();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), total);
}
