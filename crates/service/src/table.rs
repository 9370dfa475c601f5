use std::ops::{Deref, DerefMut};

use ahash::{HashMap, HashMapExt};

/// The default `HashMap` is created without allocating capacity. Router
/// tables are touched on every fan-out, so pre-allocate a reasonable
/// capacity up front rather than grow it one session at a time.
pub struct Table<K, V>(HashMap<K, V>);

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self(HashMap::with_capacity(64))
    }
}

impl<K, V> Deref for Table<K, V> {
    type Target = HashMap<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K, V> DerefMut for Table<K, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
