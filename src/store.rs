//! A persistent key-value store holding a single collection, backed by [`sled`].
//!
//! Every operation runs as its own transaction against sled: writes go through
//! [`sled::Tree::transaction`] and are flushed before returning, reads use sled's atomic reads.
//! Nothing here adds locking on top of what sled already does.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use sled::transaction::{TransactionError, TransactionResult};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Name of the one collection every store uses.
pub const COLLECTION: &str = "default";

/// An open store. Drop it to close the store and keep the data, or call [`Store::cleanup`] to
/// close it and delete everything.
pub struct Store {
    path: PathBuf,
    db: sled::Db,
    tree: sled::Tree,
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.db.flush() {
            warn!(?e, path = ?self.path, "Failed to flush sled");
        }
    }
}

impl Store {
    /// Opens the store at `path`, creating it if needed, and makes sure the default collection
    /// exists. Data from a previous session at the same path is kept.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        debug!(?path, "Opening store");
        let db = match sled::open(&path) {
            Ok(db) => db,
            Err(source) => return Err(Error::Open { path, source }),
        };
        let tree = db.open_tree(COLLECTION).map_err(|source| Error::Bucket {
            name: COLLECTION,
            source,
        })?;
        info!(
            ?path,
            recovered = db.was_recovered(),
            entries = tree.len(),
            "Opened store"
        );

        Ok(Self { path, db, tree })
    }

    /// Closes the store and deletes it from disk.
    pub fn cleanup(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);

        debug!(?path, "Removing store");
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        info!(?path, "Removed store");
        Ok(())
    }

    /// Associates `value` with `key`, replacing any previous value.
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let result: TransactionResult<(), sled::Error> = self.tree.transaction(|tx| {
            tx.insert(key, value)?;
            Ok(())
        });
        result.map_err(|e| {
            warn!(?e, "Failed to insert into sled");
            Error::Write(e)
        })?;
        debug!(key_len = key.len(), value_len = value.len(), "Inserted");

        self.flush()
    }

    /// Removes the value for `key`. Removing a key that isn't there is not an error.
    pub fn remove(&self, key: &[u8]) -> Result<()> {
        let result: TransactionResult<bool, sled::Error> = self.tree.transaction(|tx| {
            let previous = tx.remove(key)?;
            Ok(previous.is_some())
        });
        let existed = result.map_err(|e| {
            warn!(?e, "Failed to remove from sled");
            Error::Write(e)
        })?;
        if existed {
            debug!("Key found, deleted it");
        } else {
            debug!("Key to remove not found");
        }

        self.flush()
    }

    /// Returns a copy of the value for `key`, or [`Error::KeyNotFound`].
    pub fn lookup(&self, key: &[u8]) -> Result<Vec<u8>> {
        let maybe_value = self.tree.get(key).map_err(|e| {
            warn!(?e, "Failed to get from sled");
            Error::Read(e)
        })?;
        match maybe_value {
            Some(ivec) => Ok(ivec.to_vec()),
            None => Err(Error::KeyNotFound),
        }
    }

    /// Iterates every key-value pair in key order. The store can't be cleaned up while the
    /// iterator is alive.
    pub fn dump(&self) -> Dump<'_> {
        Dump {
            inner: self.tree.iter(),
            _store: PhantomData,
        }
    }

    /// Number of entries in the collection.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the collection has no entries.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Where the store lives on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        self.db.flush().map_err(|e| {
            warn!(?e, "Failed to flush sled");
            Error::Write(TransactionError::Storage(e))
        })?;
        Ok(())
    }
}

/// Iterator over the pairs of a [`Store`], in key order. See [`Store::dump`].
///
/// It borrows the store, so the store can't be cleaned up underneath it:
///
/// ```compile_fail
/// let store = geokv::Store::open("geo.db").unwrap();
/// let mut dump = store.dump();
/// store.cleanup().unwrap();
/// dump.next();
/// ```
pub struct Dump<'a> {
    inner: sled::Iter,
    _store: PhantomData<&'a Store>,
}

impl Iterator for Dump<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.inner.next()?;
        Some(
            entry
                .map(|(key, value)| (key.to_vec(), value.to_vec()))
                .map_err(Error::Read),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;

    fn open_temp() -> (TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("store")).unwrap();
        (dir, store)
    }

    fn sample_pairs() -> HashMap<Vec<u8>, Vec<u8>> {
        [("key0", "value0"), ("key1", "value1")]
            .into_iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
            .collect()
    }

    fn insert_all(store: &Store, pairs: &HashMap<Vec<u8>, Vec<u8>>) {
        for (k, v) in pairs {
            store.insert(k, v).unwrap();
        }
    }

    fn dump_all(store: &Store) -> HashMap<Vec<u8>, Vec<u8>> {
        store.dump().collect::<Result<_>>().unwrap()
    }

    #[test]
    fn open_creates_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store");

        let store = Store::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(store.path(), path);
        assert!(store.is_empty());
    }

    #[test]
    fn open_fails_under_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"occupied").unwrap();

        let err = Store::open(file.join("store")).err().unwrap();

        assert!(matches!(err, Error::Open { .. }), "{err:?}");
    }

    #[test]
    fn bucket_error_names_collection() {
        let err = Error::Bucket {
            name: COLLECTION,
            source: sled::Error::Unsupported("no trees".into()),
        };

        assert_eq!(err.to_string(), r#"Failed to open collection "default""#);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn cleanup_after_finished_dump() {
        let (dir, store) = open_temp();
        let path = dir.path().join("store");
        insert_all(&store, &sample_pairs());

        // The dump has to end before `cleanup` can take the store.
        let seen = store.dump().count();
        store.cleanup().unwrap();

        assert_eq!(seen, 2);
        assert!(!path.exists());
    }

    #[test]
    fn cleanup_deletes_store() {
        let (dir, store) = open_temp();
        let path = dir.path().join("store");
        store.insert(b"key", b"value").unwrap();

        store.cleanup().unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn insert_then_lookup() {
        let (_dir, store) = open_temp();
        let pairs = sample_pairs();
        insert_all(&store, &pairs);

        for (k, v) in &pairs {
            assert_eq!(&store.lookup(k).unwrap(), v);
        }
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn insert_overwrites() {
        let (_dir, store) = open_temp();

        store.insert(b"key", b"first").unwrap();
        store.insert(b"key", b"second").unwrap();

        assert_eq!(store.lookup(b"key").unwrap(), b"second");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn lookup_missing_key() {
        let (_dir, store) = open_temp();

        let err = store.lookup(b"missing").unwrap_err();

        assert!(err.is_not_found(), "{err:?}");
    }

    #[test]
    fn remove_then_lookup() {
        let (_dir, store) = open_temp();
        insert_all(&store, &sample_pairs());

        store.remove(b"key0").unwrap();

        assert!(store.lookup(b"key0").unwrap_err().is_not_found());
        assert_eq!(store.lookup(b"key1").unwrap(), b"value1");
    }

    #[test]
    fn remove_missing_key_is_ok() {
        let (_dir, store) = open_temp();

        store.remove(b"missing").unwrap();

        assert!(store.is_empty());
    }

    #[test]
    fn reopen_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store");
        let pairs = sample_pairs();

        let store = Store::open(&path).unwrap();
        insert_all(&store, &pairs);
        drop(store);

        let store = Store::open(&path).unwrap();
        assert_eq!(dump_all(&store), pairs);
    }

    #[test]
    fn dump_visits_every_pair() {
        let (_dir, store) = open_temp();
        let pairs = sample_pairs();
        insert_all(&store, &pairs);

        assert_eq!(dump_all(&store), pairs);
    }

    #[test]
    fn dump_is_in_key_order() {
        let (_dir, store) = open_temp();
        for key in [b"c", b"a", b"b"] {
            store.insert(key, b"v").unwrap();
        }

        let keys = store
            .dump()
            .map(|entry| entry.unwrap().0)
            .collect::<Vec<_>>();

        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn dump_of_empty_store() {
        let (_dir, store) = open_temp();

        assert_eq!(store.dump().count(), 0);
    }

    #[test]
    fn insert_lookup_remove_dump_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store");
        let store = Store::open(&path).unwrap();

        store.insert(b"key0", b"value0").unwrap();
        store.insert(b"key1", b"value1").unwrap();
        assert_eq!(store.lookup(b"key0").unwrap(), b"value0");

        store.remove(b"key0").unwrap();
        assert!(matches!(store.lookup(b"key0"), Err(Error::KeyNotFound)));

        let expected = HashMap::from([(b"key1".to_vec(), b"value1".to_vec())]);
        assert_eq!(dump_all(&store), expected);

        store.cleanup().unwrap();
        assert!(!path.exists());
    }
}
