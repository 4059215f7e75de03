//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random records and query inputs.

use crate::fixtures::{Book, Student};
use proptest::prelude::*;

/// Strategy for generating valid database names.
pub fn database_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_.-]{0,31}").expect("Invalid regex")
}

/// Strategy for generating names that do not stay inside the base path.
pub fn invalid_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        ("[a-z]{0,8}", prop::sample::select(vec!['/', '\\']), "[a-z]{0,8}")
            .prop_map(|(head, sep, tail)| format!("{head}{sep}{tail}")),
        prop::sample::select(vec![".".to_string(), "..".to_string()]),
    ]
}

/// Strategy for generating ISBN-like strings.
pub fn isbn_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("978-[0-9]{1,10}").expect("Invalid regex")
}

/// Strategy for generating finite prices.
pub fn price_strategy() -> impl Strategy<Value = f64> {
    (0u32..100_000).prop_map(|cents| f64::from(cents) / 100.0)
}

/// Strategy for generating unsaved books.
pub fn book_strategy() -> impl Strategy<Value = Book> {
    (
        isbn_strategy(),
        "[A-Za-z ]{0,24}",
        price_strategy(),
        prop::option::of(1u32..2_000),
    )
        .prop_map(|(isbn, title, price, pages)| Book {
            pages,
            ..Book::new(&isbn, &title, price)
        })
}

/// Strategy for generating unsaved books with pairwise distinct ISBNs.
pub fn distinct_books_strategy(max: usize) -> impl Strategy<Value = Vec<Book>> {
    prop::collection::vec(book_strategy(), 0..=max).prop_map(|books| {
        books
            .into_iter()
            .enumerate()
            .map(|(i, book)| Book {
                isbn: format!("{}-{i}", book.isbn),
                ..book
            })
            .collect()
    })
}

/// Strategy for generating unsaved students.
pub fn student_strategy() -> impl Strategy<Value = Student> {
    (
        "[A-Z][a-z]{1,12}",
        0i32..120,
        prop::option::of(any::<i64>()),
        prop::collection::vec(-100.0f64..100.0, 0..5),
    )
        .prop_map(|(name, age, card, scores)| Student {
            card,
            scores,
            ..Student::new(&name, age)
        })
}

/// Strategy for generating `(skip, limit)` pairs.
pub fn page_strategy() -> impl Strategy<Value = (usize, usize)> {
    (0usize..20, 0usize..20)
}
