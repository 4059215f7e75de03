//! Unique index maintenance.

use super::map::{triple_key, IndexMap};
use crate::error::{CoreError, CoreResult};
use crate::schema::Entity;
use quickio_codec::{decode_key, encode, encode_key, try_decode, Value};
use quickio_storage::{Store, WriteBatch};
use std::collections::HashSet;

/// Indexed fields of one record: field name and its triple, `None` when
/// the field is null.
type Entries = Vec<(&'static str, Option<String>)>;

/// Maintains the unique index of one database.
///
/// The index store holds two kinds of keys:
///
/// - an encoded triple string `[Type,field,value]`, whose value is the
///   8-byte id of the record owning that field value
/// - a record's 8-byte id, whose value is that record's [`IndexMap`]
///
/// Every mutation is prepared in full and committed as one batch, after
/// all uniqueness checks have passed.
#[derive(Debug)]
pub struct Indexer {
    store: Store,
}

impl Indexer {
    /// Wraps the index store.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The underlying index store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn into_store(self) -> Store {
        self.store
    }

    /// Indexes `records` in one batch.
    ///
    /// Nothing is written if any indexed value is owned by a different
    /// record, or if two records of the slice share a value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UniqueViolation`] on a collision, or a storage
    /// error if the batch cannot be committed.
    pub fn set_indexes<T: Entity>(&self, records: &[T]) -> CoreResult<()> {
        if records.is_empty() || !T::schema().has_indexes() {
            return Ok(());
        }

        let mut seen = HashSet::new();
        let mut staged = Vec::with_capacity(records.len());
        for record in records {
            let entries = self.entries(record)?;
            for triple in entries.iter().filter_map(|(_, t)| t.as_ref()) {
                if !seen.insert(triple.clone()) {
                    return Err(CoreError::unique_violation(triple.as_str()));
                }
            }
            staged.push((record.object_id(), entries));
        }

        self.store.batch(|batch| {
            for (id, entries) in &staged {
                self.stage(batch, *id, entries)?;
            }
            Ok(())
        })
    }

    /// Removes every triple of the given records along with their maps.
    ///
    /// Ids without a map (or zero) are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a map cannot be read or the batch fails.
    pub fn remove_indexes(&self, ids: &[u64]) -> CoreResult<()> {
        self.store.batch(|batch| {
            for &id in ids.iter().filter(|id| **id != 0) {
                if let Some(map) = self.load_map(id)? {
                    for triple in map.triples() {
                        batch.delete(encode_triple(triple)?);
                    }
                    batch.delete(encode_key(id).to_vec());
                }
            }
            Ok(())
        })
    }

    /// Retracts the triples of `field` for the given records.
    ///
    /// The field binding is removed from each map too, so the next save of
    /// a record indexes the field again. Returns how many triples were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a map cannot be read or the batch fails.
    pub fn drop_index(&self, field: &str, ids: &[u64]) -> CoreResult<usize> {
        let mut dropped = 0;
        self.store.batch(|batch| {
            for &id in ids {
                let Some(mut map) = self.load_map(id)? else {
                    continue;
                };
                if let Some(triple) = map.remove(field) {
                    batch.delete(encode_triple(&triple)?);
                    put_map(batch, id, &map)?;
                    dropped += 1;
                }
            }
            Ok::<_, CoreError>(())
        })?;
        tracing::debug!(field, dropped, "dropped index");
        Ok(dropped)
    }

    /// Returns the id owning `value` in the indexed `field`, or 0.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NonIndexedField`] if `field` is not an indexed
    /// field of `T`.
    pub fn get_index_id<T: Entity>(&self, field: &str, value: &Value) -> CoreResult<u64> {
        let schema = T::schema();
        schema.indexed(field)?;
        let triple = triple_key(schema.type_name(), field, value);
        Ok(self.owner_of(&triple)?.unwrap_or(0))
    }

    /// Returns true if some record owns `value` in `field`.
    ///
    /// # Errors
    ///
    /// Same as [`Indexer::get_index_id`].
    pub fn exists<T: Entity>(&self, field: &str, value: &Value) -> CoreResult<bool> {
        Ok(self.get_index_id::<T>(field, value)? != 0)
    }

    /// Compensates a failed primary write.
    ///
    /// Removes the entries of `ids` and reindexes `pre_images`. A failure
    /// here is logged and swallowed: the caller is already reporting the
    /// original error, and the index may stay inconsistent until the
    /// affected records are saved again.
    pub(crate) fn rollback<T: Entity>(&self, ids: &[u64], pre_images: &[T]) {
        if !T::schema().has_indexes() {
            return;
        }
        tracing::warn!(
            type_name = T::schema().type_name(),
            records = ids.len(),
            restored = pre_images.len(),
            "rolling back index entries"
        );
        if let Err(err) = self.remove_indexes(ids) {
            tracing::error!(%err, "index rollback failed, index entries may be stale");
            return;
        }
        if let Err(err) = self.set_indexes(pre_images) {
            tracing::error!(%err, "restoring previous index entries failed");
        }
    }

    /// Derives the triples of `record`, failing if one is owned elsewhere.
    fn entries<T: Entity>(&self, record: &T) -> CoreResult<Entries> {
        let schema = T::schema();
        let mut entries = Vec::new();
        for def in schema.indexed_fields() {
            let triple = match record.field(def.name) {
                Some(value) if !value.is_null() => {
                    let triple = triple_key(schema.type_name(), def.name, &value);
                    match self.owner_of(&triple)? {
                        Some(owner) if owner != record.object_id() => {
                            return Err(CoreError::unique_violation(triple));
                        }
                        _ => Some(triple),
                    }
                }
                _ => None,
            };
            entries.push((def.name, triple));
        }
        Ok(entries)
    }

    /// Adds the writes that bring one record's index up to date.
    fn stage(&self, batch: &mut WriteBatch, id: u64, entries: &Entries) -> CoreResult<()> {
        let mut map = self.load_map(id)?.unwrap_or_default();
        let mut changed = false;

        for (field, triple) in entries {
            if map.get(field) == triple.as_deref() {
                continue;
            }
            if let Some(stale) = map.remove(field) {
                batch.delete(encode_triple(&stale)?);
            }
            if let Some(triple) = triple {
                batch.put(encode_triple(triple)?, encode_key(id).to_vec());
                map.insert(field, triple.clone());
            }
            changed = true;
        }

        if changed {
            put_map(batch, id, &map)?;
        }
        Ok(())
    }

    fn load_map(&self, id: u64) -> CoreResult<Option<IndexMap>> {
        match self.store.get(&encode_key(id))? {
            Some(bytes) => Ok(Some(try_decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn owner_of(&self, triple: &str) -> CoreResult<Option<u64>> {
        match self.store.get(&encode_triple(triple)?)? {
            Some(bytes) => Ok(Some(decode_key(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn encode_triple(triple: &str) -> CoreResult<Vec<u8>> {
    Ok(encode(&triple.to_owned())?)
}

fn put_map(batch: &mut WriteBatch, id: u64, map: &IndexMap) -> CoreResult<()> {
    if map.is_empty() {
        batch.delete(encode_key(id).to_vec());
    } else {
        batch.put(encode_key(id).to_vec(), encode(map)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::entity! {
        #[derive(Debug, Clone, Default)]
        struct Member {
            #[indexed]
            email: String,
            #[indexed]
            badge: Option<u32>,
            nickname: String,
        }
    }

    fn member(id: u64, email: &str) -> Member {
        let mut m = Member {
            email: email.into(),
            ..Member::default()
        };
        m.assign_identity(id, 0);
        m
    }

    fn indexer() -> Indexer {
        Indexer::new(Store::in_memory())
    }

    fn owner(indexer: &Indexer, email: &str) -> u64 {
        indexer
            .get_index_id::<Member>("email", &Value::from(email))
            .unwrap()
    }

    #[test]
    fn index_and_lookup() {
        let indexer = indexer();
        indexer.set_indexes(&[member(11, "a@x")]).unwrap();

        assert_eq!(owner(&indexer, "a@x"), 11);
        assert_eq!(owner(&indexer, "b@x"), 0);
        assert!(indexer.exists::<Member>("email", &Value::from("a@x")).unwrap());
    }

    #[test]
    fn lookup_on_plain_field_is_rejected() {
        let indexer = indexer();
        assert!(matches!(
            indexer.get_index_id::<Member>("nickname", &Value::from("z")),
            Err(CoreError::NonIndexedField { .. })
        ));
        assert!(matches!(
            indexer.get_index_id::<Member>("missing", &Value::from("z")),
            Err(CoreError::NonIndexedField { .. })
        ));
    }

    #[test]
    fn collision_with_live_owner() {
        let indexer = indexer();
        indexer.set_indexes(&[member(11, "a@x")]).unwrap();

        let err = indexer.set_indexes(&[member(12, "a@x")]).unwrap_err();
        assert!(matches!(err, CoreError::UniqueViolation { ref triple } if triple == "[Member,email,a@x]"));
        assert_eq!(owner(&indexer, "a@x"), 11);
    }

    #[test]
    fn reindexing_the_owner_is_fine() {
        let indexer = indexer();
        indexer.set_indexes(&[member(11, "a@x")]).unwrap();
        indexer.set_indexes(&[member(11, "a@x")]).unwrap();
        assert_eq!(owner(&indexer, "a@x"), 11);
    }

    #[test]
    fn collision_inside_one_batch_writes_nothing() {
        let indexer = indexer();
        let err = indexer
            .set_indexes(&[member(1, "new@x"), member(2, "dup@x"), member(3, "dup@x")])
            .unwrap_err();

        assert!(matches!(err, CoreError::UniqueViolation { .. }));
        assert_eq!(owner(&indexer, "new@x"), 0);
        assert_eq!(indexer.store().iter().unwrap().count(), 0);
    }

    #[test]
    fn changed_value_retracts_stale_triple() {
        let indexer = indexer();
        indexer.set_indexes(&[member(11, "old@x")]).unwrap();
        indexer.set_indexes(&[member(11, "new@x")]).unwrap();

        assert_eq!(owner(&indexer, "old@x"), 0);
        assert_eq!(owner(&indexer, "new@x"), 11);
    }

    #[test]
    fn null_value_retracts_its_triple() {
        let indexer = indexer();
        let mut m = member(11, "a@x");
        m.badge = Some(7);
        indexer.set_indexes(std::slice::from_ref(&m)).unwrap();
        assert_eq!(
            indexer
                .get_index_id::<Member>("badge", &Value::Integer(7))
                .unwrap(),
            11
        );

        m.badge = None;
        indexer.set_indexes(std::slice::from_ref(&m)).unwrap();
        assert_eq!(
            indexer
                .get_index_id::<Member>("badge", &Value::Integer(7))
                .unwrap(),
            0
        );
        assert_eq!(owner(&indexer, "a@x"), 11);
    }

    #[test]
    fn remove_clears_triples_and_map() {
        let indexer = indexer();
        indexer
            .set_indexes(&[member(11, "a@x"), member(12, "b@x")])
            .unwrap();
        indexer.remove_indexes(&[11, 0, 999]).unwrap();

        assert_eq!(owner(&indexer, "a@x"), 0);
        assert_eq!(owner(&indexer, "b@x"), 12);
        assert!(indexer.load_map(11).unwrap().is_none());
    }

    #[test]
    fn dropped_value_can_be_claimed_again() {
        let indexer = indexer();
        indexer.set_indexes(&[member(11, "a@x")]).unwrap();

        assert_eq!(indexer.drop_index("email", &[11, 12]).unwrap(), 1);
        assert_eq!(owner(&indexer, "a@x"), 0);

        indexer.set_indexes(&[member(12, "a@x")]).unwrap();
        assert_eq!(owner(&indexer, "a@x"), 12);

        // The original owner gets its own binding back on its next save.
        indexer.set_indexes(&[member(11, "c@x")]).unwrap();
        assert_eq!(owner(&indexer, "c@x"), 11);
    }

    #[test]
    fn rollback_restores_pre_image() {
        let indexer = indexer();
        let before = member(11, "before@x");
        indexer.set_indexes(std::slice::from_ref(&before)).unwrap();
        indexer.set_indexes(&[member(11, "after@x")]).unwrap();

        indexer.rollback(&[11], std::slice::from_ref(&before));

        assert_eq!(owner(&indexer, "after@x"), 0);
        assert_eq!(owner(&indexer, "before@x"), 11);
    }
}
