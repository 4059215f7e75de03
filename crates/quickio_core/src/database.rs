//! Database handle.

use crate::collection::Collection;
use crate::config::{validate_name, Config};
use crate::error::{CoreError, CoreResult};
use crate::id::IdGenerator;
use crate::index::Indexer;
use crate::schema::Entity;
use quickio_storage::Store;
use std::sync::Arc;

/// An open database: one primary store holding every record type and one
/// index store.
///
/// # Opening a Database
///
/// ```rust,no_run
/// use quickio_core::{Config, Database};
///
/// let db = Database::open(Config::new("library").path("/var/lib/app"))?;
/// // ... work with db.collection::<T>() ...
/// db.close()?;
/// # Ok::<(), quickio_core::CoreError>(())
/// ```
///
/// # Lifetime
///
/// Collections returned by [`Database::collection`] share the stores with
/// the database. The stores are released when the last of these handles
/// is dropped; [`Database::close`] flushes before letting go of the
/// database's share.
pub struct Database {
    name: String,
    store: Arc<Store>,
    indexer: Arc<Indexer>,
    ids: Arc<IdGenerator>,
}

impl Database {
    /// Opens (or creates) the database described by `config`.
    ///
    /// Primary data lives in `<path>/<name>/` and the index in
    /// `<path>/<name>/index/`.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidName`] for a bad name,
    /// [`CoreError::InvalidWorkerId`] for out-of-range generator ids, or a
    /// storage error if a store cannot be opened.
    pub fn open(config: Config) -> CoreResult<Self> {
        config.validate()?;
        let ids = match (config.datacenter_id, config.worker_id) {
            (0, 0) => IdGenerator::shared(),
            (datacenter, worker) => Arc::new(IdGenerator::new(datacenter, worker)?),
        };

        let primary_dir = config.primary_dir();
        let store = Store::open(&primary_dir, config.cache_size)?;
        let index = Store::open(&config.index_dir(), config.index_cache_size)?;
        tracing::debug!(name = %config.name, path = %primary_dir.display(), "opened database");

        Ok(Self {
            name: config.name,
            store: Arc::new(store),
            indexer: Arc::new(Indexer::new(index)),
            ids,
        })
    }

    /// Opens a database that lives only in memory.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidName`] for a bad name.
    pub fn open_in_memory(name: &str) -> CoreResult<Self> {
        Self::open_with_stores(name, Store::in_memory(), Store::in_memory())
    }

    /// Builds a database over caller-supplied stores.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidName`] for a bad name.
    pub fn open_with_stores(name: &str, primary: Store, index: Store) -> CoreResult<Self> {
        validate_name(name)?;
        Ok(Self {
            name: name.to_owned(),
            store: Arc::new(primary),
            indexer: Arc::new(Indexer::new(index)),
            ids: IdGenerator::shared(),
        })
    }

    /// The database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unique index of this database.
    #[must_use]
    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    /// Returns the collection of records of type `T`.
    #[must_use]
    pub fn collection<T: Entity>(&self) -> Collection<T> {
        Collection::new(
            Arc::clone(&self.store),
            Arc::clone(&self.indexer),
            Arc::clone(&self.ids),
        )
    }

    /// Flushes both stores to disk.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn flush(&self) -> CoreResult<()> {
        self.store.flush()?;
        self.indexer.store().flush()?;
        Ok(())
    }

    /// Flushes and closes the database.
    ///
    /// Collections that are still alive keep the stores open until they
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Propagates storage errors from the final flush.
    pub fn close(self) -> CoreResult<()> {
        self.flush()?;
        tracing::debug!(name = %self.name, "closed database");
        Ok(())
    }

    /// Closes the database and deletes all of its on-disk state.
    ///
    /// # Errors
    ///
    /// [`CoreError::InUse`] if collections of this database are still
    /// alive; nothing is deleted then. Storage errors if a directory
    /// cannot be removed.
    pub fn destroy(self) -> CoreResult<()> {
        let Database {
            name,
            store,
            indexer,
            ..
        } = self;
        let (store, indexer) = match (Arc::try_unwrap(store), Arc::try_unwrap(indexer)) {
            (Ok(store), Ok(indexer)) => (store, indexer),
            _ => return Err(CoreError::InUse { name }),
        };
        indexer.into_store().destroy()?;
        store.destroy()?;
        tracing::debug!(name = %name, "destroyed database");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FindOptions;
    use tempfile::tempdir;

    crate::entity! {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Account {
            #[indexed]
            login: String,
            balance: i64,
        }
    }

    fn account(login: &str, balance: i64) -> Account {
        Account {
            login: login.into(),
            balance,
            ..Account::default()
        }
    }

    #[test]
    fn rejects_bad_names() {
        assert!(matches!(
            Database::open_in_memory(""),
            Err(CoreError::InvalidName { .. })
        ));
        assert!(matches!(
            Database::open_in_memory("a/b"),
            Err(CoreError::InvalidName { .. })
        ));

        let dir = tempdir().unwrap();
        let err = Database::open(Config::new("x\\y").path(dir.path())).unwrap_err();
        assert!(matches!(err, CoreError::InvalidName { .. }));
    }

    #[test]
    fn dot_names_cannot_escape_the_base_path() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("base");
        let sibling = dir.path().join("unrelated.txt");
        std::fs::write(&sibling, b"keep").unwrap();

        for name in [".", ".."] {
            let err = Database::open(Config::new(name).path(&base)).unwrap_err();
            assert!(matches!(err, CoreError::InvalidName { .. }));
        }
        assert!(matches!(
            Database::open_in_memory(".."),
            Err(CoreError::InvalidName { .. })
        ));
        assert!(sibling.exists());
        assert!(!base.exists());
    }

    #[test]
    fn rejects_bad_worker_ids() {
        let dir = tempdir().unwrap();
        let err = Database::open(Config::new("db").path(dir.path()).worker_id(32)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidWorkerId { .. }));
    }

    #[test]
    fn layout_on_disk() {
        let dir = tempdir().unwrap();
        let db = Database::open(Config::new("bank").path(dir.path())).unwrap();
        assert_eq!(db.name(), "bank");
        assert!(dir.path().join("bank").is_dir());
        assert!(dir.path().join("bank").join("index").is_dir());
        db.close().unwrap();
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let config = Config::new("bank").path(dir.path());

        let mut alice = account("alice", 10);
        {
            let db = Database::open(config.clone()).unwrap();
            db.collection::<Account>().save(&mut alice).unwrap();
            db.close().unwrap();
        }

        let db = Database::open(config).unwrap();
        let accounts = db.collection::<Account>();
        assert_eq!(accounts.find_one(alice.object_id).unwrap(), Some(alice));
        assert!(accounts
            .exists(&FindOptions::new().index("login", "alice"))
            .unwrap());
    }

    #[test]
    fn destroy_removes_everything() {
        let dir = tempdir().unwrap();
        let db = Database::open(Config::new("tmp").path(dir.path())).unwrap();
        db.collection::<Account>()
            .save(&mut account("a", 1))
            .unwrap();
        db.destroy().unwrap();
        assert!(!dir.path().join("tmp").exists());
    }

    #[test]
    fn destroy_refuses_while_collections_live() {
        let dir = tempdir().unwrap();
        let db = Database::open(Config::new("busy").path(dir.path())).unwrap();
        let accounts = db.collection::<Account>();
        assert!(matches!(db.destroy(), Err(CoreError::InUse { .. })));
        assert_eq!(accounts.count().unwrap(), 0);
    }

    #[test]
    fn databases_are_isolated() {
        let one = Database::open_in_memory("one").unwrap();
        let two = Database::open_in_memory("two").unwrap();
        one.collection::<Account>()
            .save(&mut account("x", 1))
            .unwrap();
        assert_eq!(two.collection::<Account>().count().unwrap(), 0);
        two.collection::<Account>()
            .save(&mut account("x", 1))
            .unwrap();
    }
}
