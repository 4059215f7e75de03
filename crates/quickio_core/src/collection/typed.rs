//! Typed collection implementation.

use super::options::FindOptions;
use crate::error::{CoreError, CoreResult};
use crate::id::{is_generated, timestamp_of, IdGenerator};
use crate::index::Indexer;
use crate::schema::{Entity, Number};
use quickio_codec::{clone_value, decode, decode_key, encode, encode_key, peek_tag, try_decode};
use quickio_storage::Store;
use std::marker::PhantomData;
use std::sync::Arc;

/// A typed view over the records of type `T`.
///
/// All record types of a database share one flat keyspace ordered by id.
/// A collection scans that keyspace and skips entries whose envelope
/// carries another type's tag, so every query below is a full linear
/// scan in id order unless it goes through the unique index.
///
/// Filtering is done with plain Rust closures:
///
/// ```rust
/// use quickio_core::{entity, Database, FindOptions, SortOrder};
///
/// entity! {
///     #[derive(Debug, Clone, Default)]
///     pub struct Book {
///         #[indexed]
///         pub isbn: String,
///         pub price: f64,
///     }
/// }
///
/// let db = Database::open_in_memory("shop").unwrap();
/// let books = db.collection::<Book>();
///
/// let mut book = Book { isbn: "978-0".into(), price: 9.5, ..Book::default() };
/// books.save(&mut book).unwrap();
/// assert_ne!(book.object_id, 0);
///
/// let cheap = books
///     .find_with_options(|b| b.price < 10.0, &FindOptions::new().sort("price", SortOrder::Ascending))
///     .unwrap();
/// assert_eq!(cheap.len(), 1);
///
/// let found = books.find_with_index(&FindOptions::new().index("isbn", "978-0")).unwrap();
/// assert_eq!(found.map(|b| b.object_id), Some(book.object_id));
/// ```
pub struct Collection<T: Entity> {
    store: Arc<Store>,
    indexer: Arc<Indexer>,
    ids: Arc<IdGenerator>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            indexer: Arc::clone(&self.indexer),
            ids: Arc::clone(&self.ids),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> std::fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("type_name", &self.type_name())
            .field("store", &self.store)
            .finish()
    }
}

impl<T: Entity> Collection<T> {
    pub(crate) fn new(store: Arc<Store>, indexer: Arc<Indexer>, ids: Arc<IdGenerator>) -> Self {
        Self {
            store,
            indexer,
            ids,
            _marker: PhantomData,
        }
    }

    /// The record type name, as written in envelope tags.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        T::schema().type_name()
    }

    // ---- writes ------------------------------------------------------

    /// Inserts or replaces `record`.
    ///
    /// A record whose id was not generated by the database gets a fresh id
    /// and creation time first. Indexed fields are checked and indexed
    /// before the record itself is written.
    ///
    /// If the record write fails, the index entries are rolled back and
    /// the record's id and creation time are reset to zero. If the call
    /// fails earlier, only an identity assigned by this call is reset.
    ///
    /// # Errors
    ///
    /// [`CoreError::UniqueViolation`] if an indexed value belongs to
    /// another record; codec or storage errors otherwise.
    pub fn save(&self, record: &mut T) -> CoreResult<()> {
        let assigned = self.assign_identity(record)?;
        let id = record.object_id();

        let (bytes, pre_image) = match self.stage(record, assigned) {
            Ok(staged) => staged,
            Err(err) => {
                if assigned {
                    record.assign_identity(0, 0);
                }
                return Err(err);
            }
        };

        if let Err(err) = self.store.put(&encode_key(id), &bytes) {
            self.indexer.rollback(&[id], pre_image.as_slice());
            record.assign_identity(0, 0);
            return Err(err.into());
        }
        Ok(())
    }

    /// Inserts or replaces every record of `records` in one batch.
    ///
    /// Either all records are written or none are. Two records of the
    /// slice sharing an indexed value is a uniqueness violation.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::save`]. On a failed batch write every record
    /// of the slice has its identity reset to zero.
    pub fn save_all(&self, records: &mut [T]) -> CoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut assigned = Vec::with_capacity(records.len());
        let mut failure = None;
        for record in records.iter_mut() {
            match self.assign_identity(record) {
                Ok(fresh) => assigned.push(fresh),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if let Some(err) = failure {
            reset_assigned(records, &assigned);
            return Err(err);
        }

        let (encoded, pre_images) = match self.stage_all(records, &assigned) {
            Ok(staged) => staged,
            Err(err) => {
                reset_assigned(records, &assigned);
                return Err(err);
            }
        };

        let written = self.store.batch(|batch| {
            for (id, bytes) in encoded {
                batch.put(encode_key(id).to_vec(), bytes);
            }
            Ok::<_, CoreError>(())
        });
        if let Err(err) = written {
            let ids: Vec<u64> = records.iter().map(Entity::object_id).collect();
            self.indexer.rollback(&ids, &pre_images);
            for record in records.iter_mut() {
                record.assign_identity(0, 0);
            }
            return Err(err);
        }
        tracing::debug!(type_name = self.type_name(), records = records.len(), "saved batch");
        Ok(())
    }

    /// Copies the non-null user fields of `template` onto every record
    /// matching `predicate` and writes them back in one batch.
    ///
    /// Ids and creation times are never overwritten. Returns the number of
    /// updated records.
    ///
    /// # Errors
    ///
    /// Uniqueness, codec or storage errors. On a failed batch write the
    /// previous index entries are restored.
    pub fn update<F>(&self, template: &T, mut predicate: F) -> CoreResult<usize>
    where
        F: FnMut(&T) -> bool,
    {
        let mut pre_images = Vec::new();
        let mut staged = Vec::new();
        for record in self.records()? {
            let mut record = record?;
            if predicate(&record) {
                pre_images.push(clone_value(&record)?);
                merge(template, &mut record)?;
                staged.push(record);
            }
        }
        if staged.is_empty() {
            return Ok(0);
        }

        let encoded = staged
            .iter()
            .map(|record| Ok((record.object_id(), encode(record)?)))
            .collect::<CoreResult<Vec<_>>>()?;
        self.indexer.set_indexes(&staged)?;

        let written = self.store.batch(|batch| {
            for (id, bytes) in encoded {
                batch.put(encode_key(id).to_vec(), bytes);
            }
            Ok::<_, CoreError>(())
        });
        if let Err(err) = written {
            let ids: Vec<u64> = staged.iter().map(Entity::object_id).collect();
            self.indexer.rollback(&ids, &pre_images);
            return Err(err);
        }
        tracing::debug!(type_name = self.type_name(), records = staged.len(), "updated records");
        Ok(staged.len())
    }

    /// Merges `template` into the record selected by the index lookup of
    /// `options` and saves it. Returns false if no record matched.
    ///
    /// # Errors
    ///
    /// See [`Collection::find_with_index`] and [`Collection::save`].
    pub fn update_with_index(&self, template: &T, options: &FindOptions) -> CoreResult<bool> {
        let Some(mut record) = self.find_with_index(options)? else {
            return Ok(false);
        };
        merge(template, &mut record)?;
        self.save(&mut record)?;
        Ok(true)
    }

    /// Removes the record `id` and its index entries.
    ///
    /// Removing a missing id is not an error.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn delete(&self, id: u64) -> CoreResult<()> {
        self.store.delete(&encode_key(id))?;
        self.indexer.remove_indexes(&[id])
    }

    /// Removes the records `ids` in one batch.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn delete_many(&self, ids: &[u64]) -> CoreResult<()> {
        self.store.batch(|batch| {
            for &id in ids {
                batch.delete(encode_key(id).to_vec());
            }
            Ok::<_, CoreError>(())
        })?;
        self.indexer.remove_indexes(ids)
    }

    /// Removes every record matching `predicate`. Returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn delete_where<F>(&self, mut predicate: F) -> CoreResult<usize>
    where
        F: FnMut(&T) -> bool,
    {
        let mut ids = Vec::new();
        self.store.batch(|batch| {
            for record in self.records()? {
                let record = record?;
                if predicate(&record) {
                    batch.delete(encode_key(record.object_id()).to_vec());
                    ids.push(record.object_id());
                }
            }
            Ok::<_, CoreError>(())
        })?;
        self.indexer.remove_indexes(&ids)?;
        Ok(ids.len())
    }

    /// Removes every record of this type.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn delete_all(&self) -> CoreResult<usize> {
        self.delete_where(|_| true)
    }

    /// Removes the record selected by the index lookup of `options`.
    /// Returns false if no record matched.
    ///
    /// # Errors
    ///
    /// See [`Collection::find_with_index`].
    pub fn delete_with_index(&self, options: &FindOptions) -> CoreResult<bool> {
        match self.find_with_index(options)? {
            Some(record) => {
                self.delete(record.object_id())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Retracts the index entries of `field` for every record of this
    /// type. Returns how many entries were removed.
    ///
    /// Records get their entry back the next time they are saved.
    ///
    /// # Errors
    ///
    /// [`CoreError::NonIndexedField`] if `field` is not indexed.
    pub fn drop_index(&self, field: &str) -> CoreResult<usize> {
        T::schema().indexed(field)?;
        let mut ids = Vec::new();
        for entry in self.entries()? {
            let (id, bytes) = entry?;
            if peek_tag(&bytes) == Some(self.type_name()) {
                ids.push(id);
            }
        }
        self.indexer.drop_index(field, &ids)
    }

    // ---- point reads -------------------------------------------------

    /// Looks up `id`. Returns `None` if it is missing or holds another
    /// record type.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn find_one(&self, id: u64) -> CoreResult<Option<T>> {
        Ok(self
            .store
            .get(&encode_key(id))?
            .and_then(|bytes| decode(&bytes)))
    }

    /// Looks up `id`, failing if the stored record is of another type.
    ///
    /// # Errors
    ///
    /// [`CoreError::Codec`] with a type mismatch if `id` holds a record of
    /// another type; storage errors otherwise.
    pub fn get(&self, id: u64) -> CoreResult<Option<T>> {
        match self.store.get(&encode_key(id))? {
            Some(bytes) => Ok(Some(try_decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Looks up each of `ids`, in the given order, skipping misses.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn find_many(&self, ids: &[u64]) -> CoreResult<Vec<T>> {
        let mut found = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(record) = self.find_one(id)? {
                found.push(record);
            }
        }
        Ok(found)
    }

    /// Resolves the index lookup of `options` to a record.
    ///
    /// # Errors
    ///
    /// A schema error if `options` carries no index lookup,
    /// [`CoreError::NonIndexedField`] if its field is not indexed.
    pub fn find_with_index(&self, options: &FindOptions) -> CoreResult<Option<T>> {
        let (field, value) = options
            .index_lookup()
            .ok_or_else(|| CoreError::schema("find options carry no index lookup"))?;
        match self.indexer.get_index_id::<T>(field, value)? {
            0 => Ok(None),
            id => self.find_one(id),
        }
    }

    /// Returns true if the index lookup of `options` resolves to a record.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::find_with_index`].
    pub fn exists(&self, options: &FindOptions) -> CoreResult<bool> {
        let (field, value) = options
            .index_lookup()
            .ok_or_else(|| CoreError::schema("find options carry no index lookup"))?;
        self.indexer.exists::<T>(field, value)
    }

    // ---- ordered reads -----------------------------------------------

    /// The record with the lowest id.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn find_first(&self) -> CoreResult<Option<T>> {
        self.find_first_where(|_| true)
    }

    /// The lowest-id record matching `predicate`.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn find_first_where<F>(&self, mut predicate: F) -> CoreResult<Option<T>>
    where
        F: FnMut(&T) -> bool,
    {
        for record in self.records()? {
            let record = record?;
            if predicate(&record) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// The record with the highest id.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn find_last(&self) -> CoreResult<Option<T>> {
        self.find_last_where(|_| true)
    }

    /// The highest-id record matching `predicate`.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn find_last_where<F>(&self, mut predicate: F) -> CoreResult<Option<T>>
    where
        F: FnMut(&T) -> bool,
    {
        let mut last = None;
        for record in self.records()? {
            let record = record?;
            if predicate(&record) {
                last = Some(record);
            }
        }
        Ok(last)
    }

    /// The first record matching `predicate`.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn find_one_where<F>(&self, predicate: F) -> CoreResult<Option<T>>
    where
        F: FnMut(&T) -> bool,
    {
        self.find_first_where(predicate)
    }

    // ---- scans -------------------------------------------------------

    /// Every record of this type, in id order.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn find_all(&self) -> CoreResult<Vec<T>> {
        self.find(|_| true)
    }

    /// Every record matching `predicate`, in id order.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn find<F>(&self, mut predicate: F) -> CoreResult<Vec<T>>
    where
        F: FnMut(&T) -> bool,
    {
        let mut found = Vec::new();
        for record in self.records()? {
            let record = record?;
            if predicate(&record) {
                found.push(record);
            }
        }
        Ok(found)
    }

    /// Every record matching `predicate`, then sorted, skipped and limited
    /// per `options`.
    ///
    /// # Errors
    ///
    /// A schema error for a bad sort field; storage errors otherwise.
    pub fn find_with_options<F>(&self, predicate: F, options: &FindOptions) -> CoreResult<Vec<T>>
    where
        F: FnMut(&T) -> bool,
    {
        options.apply(self.find(predicate)?)
    }

    /// Records whose id matches `predicate`.
    ///
    /// The id is tested before the record is decoded.
    ///
    /// # Errors
    ///
    /// A schema error for a bad sort field; storage errors otherwise.
    pub fn find_with_id<F>(&self, mut predicate: F, options: &FindOptions) -> CoreResult<Vec<T>>
    where
        F: FnMut(u64) -> bool,
    {
        let mut found = Vec::new();
        for entry in self.entries()? {
            let (id, bytes) = entry?;
            if predicate(id) {
                if let Some(record) = decode(&bytes) {
                    found.push(record);
                }
            }
        }
        options.apply(found)
    }

    /// Records whose creation time, derived from the id, matches
    /// `predicate`.
    ///
    /// # Errors
    ///
    /// A schema error for a bad sort field; storage errors otherwise.
    pub fn find_with_time<F>(&self, mut predicate: F, options: &FindOptions) -> CoreResult<Vec<T>>
    where
        F: FnMut(u64) -> bool,
    {
        self.find_with_id(|object_id| predicate(timestamp_of(object_id)), options)
    }

    // ---- counting and aggregates -------------------------------------

    /// Number of records of this type that decode, which is what
    /// [`Collection::find_all`] would return.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn count(&self) -> CoreResult<usize> {
        self.count_where(|_| true)
    }

    /// Number of records matching `predicate`.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn count_where<F>(&self, mut predicate: F) -> CoreResult<usize>
    where
        F: FnMut(&T) -> bool,
    {
        let mut count = 0;
        for record in self.records()? {
            if predicate(&record?) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Sum of the numeric `field` over all records. Nulls are skipped.
    ///
    /// # Errors
    ///
    /// A schema error if `field` is unknown or not numeric.
    pub fn sum(&self, field: &str) -> CoreResult<f64> {
        self.sum_where(field, |_| true)
    }

    /// Sum of the numeric `field` over the records matching `predicate`.
    ///
    /// # Errors
    ///
    /// A schema error if `field` is unknown or not numeric.
    pub fn sum_where<F>(&self, field: &str, predicate: F) -> CoreResult<f64>
    where
        F: FnMut(&T) -> bool,
    {
        Ok(Number::sum(&self.numbers(field, predicate)?))
    }

    /// Mean of the numeric `field`, or `None` if no record has a value.
    ///
    /// # Errors
    ///
    /// A schema error if `field` is unknown or not numeric.
    pub fn average(&self, field: &str) -> CoreResult<Option<f64>> {
        self.average_where(field, |_| true)
    }

    /// Mean of the numeric `field` over the records matching `predicate`.
    ///
    /// # Errors
    ///
    /// A schema error if `field` is unknown or not numeric.
    pub fn average_where<F>(&self, field: &str, predicate: F) -> CoreResult<Option<f64>>
    where
        F: FnMut(&T) -> bool,
    {
        let numbers = self.numbers(field, predicate)?;
        if numbers.is_empty() {
            return Ok(None);
        }
        #[allow(clippy::cast_precision_loss)]
        let len = numbers.len() as f64;
        Ok(Some(Number::sum(&numbers) / len))
    }

    /// Largest value of the numeric `field`.
    ///
    /// # Errors
    ///
    /// A schema error if `field` is unknown or not numeric.
    pub fn max(&self, field: &str) -> CoreResult<Option<f64>> {
        self.max_where(field, |_| true)
    }

    /// Largest value of `field` among the records matching `predicate`.
    ///
    /// # Errors
    ///
    /// A schema error if `field` is unknown or not numeric.
    pub fn max_where<F>(&self, field: &str, predicate: F) -> CoreResult<Option<f64>>
    where
        F: FnMut(&T) -> bool,
    {
        let numbers = self.numbers(field, predicate)?;
        Ok(numbers
            .into_iter()
            .max_by(Number::total_cmp)
            .map(Number::to_f64))
    }

    /// Smallest value of the numeric `field`.
    ///
    /// # Errors
    ///
    /// A schema error if `field` is unknown or not numeric.
    pub fn min(&self, field: &str) -> CoreResult<Option<f64>> {
        self.min_where(field, |_| true)
    }

    /// Smallest value of `field` among the records matching `predicate`.
    ///
    /// # Errors
    ///
    /// A schema error if `field` is unknown or not numeric.
    pub fn min_where<F>(&self, field: &str, predicate: F) -> CoreResult<Option<f64>>
    where
        F: FnMut(&T) -> bool,
    {
        let numbers = self.numbers(field, predicate)?;
        Ok(numbers
            .into_iter()
            .min_by(Number::total_cmp)
            .map(Number::to_f64))
    }

    // ---- internals ---------------------------------------------------

    /// Gives `record` a generated identity unless it already has one.
    /// Returns true if it did.
    fn assign_identity(&self, record: &mut T) -> CoreResult<bool> {
        if is_generated(record.object_id()) {
            return Ok(false);
        }
        let object_id = self.ids.next_id()?;
        record.assign_identity(object_id, timestamp_of(object_id));
        Ok(true)
    }

    /// Encodes `record` and indexes it. Returns the envelope and the stored
    /// pre-image, if the record existed before.
    fn stage(&self, record: &T, fresh: bool) -> CoreResult<(Vec<u8>, Option<T>)> {
        let bytes = encode(record)?;
        let pre_image = if fresh {
            None
        } else {
            self.find_one(record.object_id())?
        };
        self.indexer.set_indexes(std::slice::from_ref(record))?;
        Ok((bytes, pre_image))
    }

    fn stage_all(&self, records: &[T], fresh: &[bool]) -> CoreResult<(Vec<(u64, Vec<u8>)>, Vec<T>)> {
        let mut encoded = Vec::with_capacity(records.len());
        let mut pre_images = Vec::new();
        for (record, &fresh) in records.iter().zip(fresh) {
            encoded.push((record.object_id(), encode(record)?));
            if !fresh {
                pre_images.extend(self.find_one(record.object_id())?);
            }
        }
        self.indexer.set_indexes(records)?;
        Ok((encoded, pre_images))
    }

    /// Raw `(id, envelope)` pairs in id order.
    fn entries(&self) -> CoreResult<impl Iterator<Item = CoreResult<(u64, Vec<u8>)>> + '_> {
        Ok(self
            .store
            .iter()?
            .map(|entry| -> CoreResult<(u64, Vec<u8>)> {
                let (key, value) = entry?;
                Ok((decode_key(&key)?, value))
            }))
    }

    /// Records of this type in id order; other types are skipped.
    fn records(&self) -> CoreResult<impl Iterator<Item = CoreResult<T>> + '_> {
        Ok(self.entries()?.filter_map(|entry| match entry {
            Ok((_, bytes)) => decode(&bytes).map(Ok),
            Err(err) => Some(Err(err)),
        }))
    }

    fn numbers<F>(&self, field: &str, mut predicate: F) -> CoreResult<Vec<Number>>
    where
        F: FnMut(&T) -> bool,
    {
        let kind = T::schema().numeric(field)?.kind;
        let mut numbers = Vec::new();
        for record in self.records()? {
            let record = record?;
            if predicate(&record) {
                numbers.extend(record.field(field).and_then(|v| kind.number(&v)));
            }
        }
        Ok(numbers)
    }
}

/// Copies the non-null user fields of `template` onto `target`.
fn merge<T: Entity>(template: &T, target: &mut T) -> CoreResult<()> {
    for def in T::schema().user_fields() {
        if let Some(value) = template.field(def.name) {
            if !value.is_null() {
                target.set_field(def.name, &value)?;
            }
        }
    }
    Ok(())
}

fn reset_assigned<T: Entity>(records: &mut [T], assigned: &[bool]) {
    for (record, &fresh) in records.iter_mut().zip(assigned) {
        if fresh {
            record.assign_identity(0, 0);
        }
    }
}
