//! The pluggable local backing store a database peer holds its replica in.
//! Scoped by the routing design as a collaborator interface only (§6.2);
//! the three backends here (`ram`, `dir`, `dbm`) are the concrete store
//! kinds the original system shipped and the CLI selects between.

pub mod dbm;
pub mod dir;
pub mod ram;

use bytes::Bytes;

pub use dbm::DbmStore;
pub use dir::DirStore;
pub use ram::RamStore;

#[derive(Debug)]
pub enum Error {
    KeyNotFound,
    Io(std::io::Error),
    Encode(bincode::error::EncodeError),
    Decode(bincode::error::DecodeError),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyNotFound => write!(f, "key not found"),
            Self::Io(e) => write!(f, "{e}"),
            Self::Encode(e) => write!(f, "{e}"),
            Self::Decode(e) => write!(f, "{e}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<bincode::error::EncodeError> for Error {
    fn from(value: bincode::error::EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<bincode::error::DecodeError> for Error {
    fn from(value: bincode::error::DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Local persistence contract for a database peer's replica.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Bytes, Error>;
    fn set(&self, key: Bytes, value: Bytes) -> Result<(), Error>;
    /// Missing key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), Error>;
    fn getkeys(&self) -> Result<Vec<Bytes>, Error>;
    /// Clears every entry.
    fn reset(&self) -> Result<(), Error>;
    fn close(&self) -> Result<(), Error>;
}
