//! Single-file snapshot store. The whole table is held in memory and the
//! backing file is rewritten wholesale after every mutation, mirroring the
//! original's flat `anydbm` snapshot-on-write behavior.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{Error, KeyValueStore};

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    entries: HashMap<Vec<u8>, Vec<u8>>,
}

pub struct DbmStore {
    path: PathBuf,
    snapshot: RwLock<Snapshot>,
}

impl DbmStore {
    /// Opens (or creates) a snapshot file at `path`.
    ///
    /// # Test
    ///
    /// ```
    /// use bytes::Bytes;
    /// use kvndb_store::{DbmStore, KeyValueStore};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let path = dir.path().join("snapshot.bin");
    ///
    /// {
    ///     let store = DbmStore::open(&path).unwrap();
    ///     store.set(Bytes::from_static(b"k"), Bytes::from_static(b"v")).unwrap();
    /// }
    ///
    /// // reopening the same file picks the snapshot back up
    /// let store = DbmStore::open(&path).unwrap();
    /// assert_eq!(store.get(b"k").unwrap(), Bytes::from_static(b"v"));
    /// ```
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let snapshot = Self::load(&path)?;
        Ok(Self { path, snapshot: RwLock::new(snapshot) })
    }

    fn load(path: &Path) -> Result<Snapshot, Error> {
        match fs::read(path) {
            Ok(bytes) => {
                let (snapshot, _): (Snapshot, usize) =
                    bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
                Ok(snapshot)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Snapshot::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrites the whole backing file from the current in-memory snapshot.
    /// Caller must already hold the write lock.
    fn flush(&self, snapshot: &Snapshot) -> Result<(), Error> {
        let bytes = bincode::serde::encode_to_vec(snapshot, bincode::config::standard())?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}

impl KeyValueStore for DbmStore {
    fn get(&self, key: &[u8]) -> Result<Bytes, Error> {
        self.snapshot
            .read()
            .entries
            .get(key)
            .map(|v| Bytes::from(v.clone()))
            .ok_or(Error::KeyNotFound)
    }

    fn set(&self, key: Bytes, value: Bytes) -> Result<(), Error> {
        let mut snapshot = self.snapshot.write();
        snapshot.entries.insert(key.to_vec(), value.to_vec());
        self.flush(&snapshot)
    }

    fn delete(&self, key: &[u8]) -> Result<(), Error> {
        let mut snapshot = self.snapshot.write();
        if snapshot.entries.remove(key).is_none() {
            return Ok(());
        }
        self.flush(&snapshot)
    }

    fn getkeys(&self) -> Result<Vec<Bytes>, Error> {
        Ok(self.snapshot.read().entries.keys().cloned().map(Bytes::from).collect())
    }

    fn reset(&self) -> Result<(), Error> {
        let mut snapshot = self.snapshot.write();
        snapshot.entries.clear();
        self.flush(&snapshot)
    }

    fn close(&self) -> Result<(), Error> {
        let snapshot = self.snapshot.read();
        self.flush(&snapshot)
    }
}
