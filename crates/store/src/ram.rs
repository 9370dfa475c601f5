//! In-memory backing store. No persistence across restarts — the fastest
//! of the three kinds and the simplest to reset during a sync pull.

use ahash::HashMap;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::{Error, KeyValueStore};

#[derive(Default)]
pub struct RamStore(RwLock<HashMap<Bytes, Bytes>>);

impl RamStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for RamStore {
    /// # Test
    ///
    /// ```
    /// use bytes::Bytes;
    /// use kvndb_store::{KeyValueStore, RamStore};
    ///
    /// let store = RamStore::new();
    /// assert!(store.get(b"k").is_err());
    ///
    /// store.set(Bytes::from_static(b"k"), Bytes::from_static(b"v")).unwrap();
    /// assert_eq!(store.get(b"k").unwrap(), Bytes::from_static(b"v"));
    ///
    /// store.delete(b"k").unwrap();
    /// assert!(store.get(b"k").is_err());
    ///
    /// // deleting an absent key is a no-op, not an error
    /// store.delete(b"k").unwrap();
    /// ```
    fn get(&self, key: &[u8]) -> Result<Bytes, Error> {
        self.0.read().get(key).cloned().ok_or(Error::KeyNotFound)
    }

    fn set(&self, key: Bytes, value: Bytes) -> Result<(), Error> {
        self.0.write().insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), Error> {
        self.0.write().remove(key);
        Ok(())
    }

    fn getkeys(&self) -> Result<Vec<Bytes>, Error> {
        Ok(self.0.read().keys().cloned().collect())
    }

    fn reset(&self) -> Result<(), Error> {
        self.0.write().clear();
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}
