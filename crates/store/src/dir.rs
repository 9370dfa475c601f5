//! One file per key under a directory. Keys are hex-encoded into the
//! filename so arbitrary byte strings stay filesystem-safe.

use std::{fs, path::PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{Error, KeyValueStore};

pub struct DirStore {
    root: PathBuf,
    // Serializes directory mutations; individual file reads need no lock.
    lock: Mutex<()>,
}

impl DirStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, lock: Mutex::new(()) })
    }

    fn path_for(&self, key: &[u8]) -> PathBuf {
        self.root.join(hex_encode(key))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }

    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

impl KeyValueStore for DirStore {
    fn get(&self, key: &[u8]) -> Result<Bytes, Error> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::KeyNotFound),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: Bytes, value: Bytes) -> Result<(), Error> {
        let _guard = self.lock.lock();
        fs::write(self.path_for(&key), &value)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), Error> {
        let _guard = self.lock.lock();
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn getkeys(&self) -> Result<Vec<Bytes>, Error> {
        let _guard = self.lock.lock();
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str().and_then(hex_decode) {
                keys.push(Bytes::from(name));
            }
        }

        Ok(keys)
    }

    fn reset(&self) -> Result<(), Error> {
        let _guard = self.lock.lock();

        for entry in fs::read_dir(&self.root)? {
            fs::remove_file(entry?.path())?;
        }

        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}
