//! Post-scan query options.

use crate::error::{CoreError, CoreResult};
use crate::schema::{Entity, Number};
use quickio_codec::Value;
use std::cmp::Ordering;

/// Direction of a numeric sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Smallest first. Null values come before every number.
    Ascending,
    /// Largest first. Null values come last.
    Descending,
}

impl TryFrom<i32> for SortOrder {
    type Error = CoreError;

    /// Maps `1` to ascending and `-1` to descending.
    fn try_from(value: i32) -> CoreResult<Self> {
        match value {
            1 => Ok(Self::Ascending),
            -1 => Ok(Self::Descending),
            other => Err(CoreError::InvalidSortOrder(other)),
        }
    }
}

/// Sort, skip, limit and index-lookup settings for a query.
///
/// Options are applied to the already filtered result in a fixed order:
/// sort, then skip, then limit.
///
/// ```rust
/// use quickio_core::{FindOptions, SortOrder};
///
/// let page = FindOptions::new()
///     .sort("price", SortOrder::Descending)
///     .skip(20)
///     .limit(10);
/// assert_eq!(page.skip_count(), 20);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    sort: Option<(String, SortOrder)>,
    skip: usize,
    limit: Option<usize>,
    index: Option<(String, Value)>,
}

impl FindOptions {
    /// Options that leave a result untouched.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts by the numeric field `field`. The sort is stable.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((field.into(), order));
        self
    }

    /// Drops the first `n` results.
    #[must_use]
    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    /// Keeps at most `n` results.
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Selects the record owning `value` in the indexed field `field`.
    #[must_use]
    pub fn index(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.index = Some((field.into(), value.into()));
        self
    }

    /// The sort field and order, if any.
    #[must_use]
    pub fn sort_by(&self) -> Option<(&str, SortOrder)> {
        self.sort.as_ref().map(|(field, order)| (field.as_str(), *order))
    }

    /// Number of results skipped.
    #[must_use]
    pub fn skip_count(&self) -> usize {
        self.skip
    }

    /// Maximum number of results, if bounded.
    #[must_use]
    pub fn limit_count(&self) -> Option<usize> {
        self.limit
    }

    /// The index lookup, if any.
    #[must_use]
    pub fn index_lookup(&self) -> Option<(&str, &Value)> {
        self.index.as_ref().map(|(field, value)| (field.as_str(), value))
    }

    /// Sorts, skips and limits `records`.
    ///
    /// # Errors
    ///
    /// Returns a schema error if the sort field is unknown or not numeric,
    /// even when `records` is empty.
    pub fn apply<T: Entity>(&self, mut records: Vec<T>) -> CoreResult<Vec<T>> {
        if let Some((field, order)) = &self.sort {
            let kind = T::schema().numeric(field)?.kind;
            let number = |record: &T| record.field(field).and_then(|v| kind.number(&v));
            records.sort_by(|a, b| {
                let ordering = compare_numeric(number(a), number(b));
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        let records = records.into_iter().skip(self.skip);
        Ok(match self.limit {
            Some(limit) => records.take(limit).collect(),
            None => records.collect(),
        })
    }
}

fn compare_numeric(a: Option<Number>, b: Option<Number>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::entity! {
        #[derive(Debug, Clone, Default)]
        struct Item {
            rank: i32,
            weight: i64,
            score: Option<f64>,
            label: String,
        }
    }

    fn items(ranks: &[i32]) -> Vec<Item> {
        ranks
            .iter()
            .enumerate()
            .map(|(i, &rank)| Item {
                rank,
                label: format!("#{i}"),
                ..Item::default()
            })
            .collect()
    }

    fn ranks(items: &[Item]) -> Vec<i32> {
        items.iter().map(|i| i.rank).collect()
    }

    #[test]
    fn sort_order_from_int() {
        assert_eq!(SortOrder::try_from(1).unwrap(), SortOrder::Ascending);
        assert_eq!(SortOrder::try_from(-1).unwrap(), SortOrder::Descending);
        assert!(matches!(
            SortOrder::try_from(0),
            Err(CoreError::InvalidSortOrder(0))
        ));
        assert!(SortOrder::try_from(2).is_err());
    }

    #[test]
    fn default_leaves_records_alone() {
        let out = FindOptions::new().apply(items(&[3, 1, 2])).unwrap();
        assert_eq!(ranks(&out), vec![3, 1, 2]);
    }

    #[test]
    fn sort_both_ways() {
        let asc = FindOptions::new()
            .sort("rank", SortOrder::Ascending)
            .apply(items(&[3, -1, 2]))
            .unwrap();
        assert_eq!(ranks(&asc), vec![-1, 2, 3]);

        let desc = FindOptions::new()
            .sort("rank", SortOrder::Descending)
            .apply(items(&[3, -1, 2]))
            .unwrap();
        assert_eq!(ranks(&desc), vec![3, 2, -1]);
    }

    #[test]
    fn sort_is_stable() {
        let out = FindOptions::new()
            .sort("rank", SortOrder::Ascending)
            .apply(items(&[2, 1, 2, 1]))
            .unwrap();
        let labels: Vec<_> = out.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["#1", "#3", "#0", "#2"]);
    }

    #[test]
    fn nulls_sort_first_ascending() {
        let mut records = items(&[0, 0, 0]);
        records[0].score = Some(2.5);
        records[2].score = Some(-1.0);

        let out = FindOptions::new()
            .sort("score", SortOrder::Ascending)
            .apply(records.clone())
            .unwrap();
        let scores: Vec<_> = out.iter().map(|i| i.score).collect();
        assert_eq!(scores, vec![None, Some(-1.0), Some(2.5)]);

        let out = FindOptions::new()
            .sort("score", SortOrder::Descending)
            .apply(records)
            .unwrap();
        let scores: Vec<_> = out.iter().map(|i| i.score).collect();
        assert_eq!(scores, vec![Some(2.5), Some(-1.0), None]);
    }

    #[test]
    fn skip_then_limit_after_sort() {
        let out = FindOptions::new()
            .sort("rank", SortOrder::Ascending)
            .skip(1)
            .limit(2)
            .apply(items(&[5, 4, 3, 2, 1]))
            .unwrap();
        assert_eq!(ranks(&out), vec![2, 3]);
    }

    #[test]
    fn short_tail_and_zero_limit() {
        let options = FindOptions::new().skip(2).limit(10);
        assert_eq!(ranks(&options.apply(items(&[1, 2, 3])).unwrap()), vec![3]);

        let options = FindOptions::new().skip(5);
        assert!(options.apply(items(&[1, 2, 3])).unwrap().is_empty());

        let options = FindOptions::new().limit(0);
        assert!(options.apply(items(&[1, 2, 3])).unwrap().is_empty());
    }

    #[test]
    fn sort_field_must_be_numeric() {
        let err = FindOptions::new()
            .sort("label", SortOrder::Ascending)
            .apply(Vec::<Item>::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::FieldNotNumeric { .. }));

        let err = FindOptions::new()
            .sort("nope", SortOrder::Ascending)
            .apply(items(&[1]))
            .unwrap_err();
        assert!(matches!(err, CoreError::FieldNotFound { .. }));
    }

    #[test]
    fn system_fields_are_sortable() {
        let mut records = items(&[0, 0]);
        records[0].assign_identity(20, 0);
        records[1].assign_identity(10, 0);
        let out = FindOptions::new()
            .sort("object_id", SortOrder::Ascending)
            .apply(records)
            .unwrap();
        assert_eq!(out[0].object_id, 10);
    }

    #[test]
    fn close_ids_keep_their_order() {
        let base = 635_192_418_739_683_328_u64;
        let mut records = items(&[0, 0, 0]);
        for (offset, record) in [1, 2, 0].into_iter().zip(records.iter_mut()) {
            record.assign_identity(base + offset, 0);
        }

        let desc = FindOptions::new()
            .sort("object_id", SortOrder::Descending)
            .apply(records.clone())
            .unwrap();
        let ids: Vec<u64> = desc.iter().map(|i| i.object_id).collect();
        assert_eq!(ids, vec![base + 2, base + 1, base]);

        let asc = FindOptions::new()
            .sort("object_id", SortOrder::Ascending)
            .apply(records)
            .unwrap();
        let ids: Vec<u64> = asc.iter().map(|i| i.object_id).collect();
        assert_eq!(ids, vec![base, base + 1, base + 2]);
    }

    #[test]
    fn large_i64_values_sort_exactly() {
        let big = 1_i64 << 60;
        let mut records = items(&[0, 0, 0]);
        records[0].weight = big + 1;
        records[1].weight = big;
        records[2].weight = -big;

        let out = FindOptions::new()
            .sort("weight", SortOrder::Ascending)
            .apply(records)
            .unwrap();
        let weights: Vec<i64> = out.iter().map(|i| i.weight).collect();
        assert_eq!(weights, vec![-big, big, big + 1]);
    }

    #[test]
    fn u64_above_i64_max_sorts_last() {
        let mut records = items(&[0, 0]);
        records[0].assign_identity(u64::MAX - 1, 0);
        records[1].assign_identity(1 << 62, 0);
        let out = FindOptions::new()
            .sort("object_id", SortOrder::Ascending)
            .apply(records)
            .unwrap();
        assert_eq!(out[1].object_id, u64::MAX - 1);
    }

    #[test]
    fn accessors() {
        let options = FindOptions::new().index("isbn", "978").limit(3);
        assert_eq!(options.index_lookup(), Some(("isbn", &Value::from("978"))));
        assert_eq!(options.limit_count(), Some(3));
        assert_eq!(options.sort_by(), None);
    }
}
