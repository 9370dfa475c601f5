use bytes::Bytes;
use kvndb_store::{DbmStore, DirStore, KeyValueStore, RamStore};

fn exercise(store: &dyn KeyValueStore) {
    assert!(store.get(b"missing").is_err());

    store.set(Bytes::from_static(b"a"), Bytes::from_static(b"1")).unwrap();
    store.set(Bytes::from_static(b"b"), Bytes::from_static(b"2")).unwrap();
    assert_eq!(store.get(b"a").unwrap(), Bytes::from_static(b"1"));

    let mut keys = store.getkeys().unwrap();
    keys.sort();
    assert_eq!(keys, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);

    store.delete(b"a").unwrap();
    assert!(store.get(b"a").is_err());
    // deleting again is a no-op
    store.delete(b"a").unwrap();

    store.reset().unwrap();
    assert!(store.getkeys().unwrap().is_empty());

    store.close().unwrap();
}

#[test]
fn ram_store_round_trip() {
    exercise(&RamStore::new());
}

#[test]
fn dir_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirStore::open(dir.path()).unwrap();
    exercise(&store);
}

#[test]
fn dbm_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = DbmStore::open(dir.path().join("snapshot.bin")).unwrap();
    exercise(&store);
}

#[test]
fn dbm_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.bin");

    {
        let store = DbmStore::open(&path).unwrap();
        store.set(Bytes::from_static(b"k"), Bytes::from_static(b"v")).unwrap();
    }

    let store = DbmStore::open(&path).unwrap();
    assert_eq!(store.get(b"k").unwrap(), Bytes::from_static(b"v"));
}

#[test]
fn dir_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = DirStore::open(dir.path()).unwrap();
        store.set(Bytes::from_static(b"k"), Bytes::from_static(b"v")).unwrap();
    }

    let store = DirStore::open(dir.path()).unwrap();
    assert_eq!(store.get(b"k").unwrap(), Bytes::from_static(b"v"));
}
