//! Fixed-shape frames exchanged before a session settles into SERVER or
//! CLIENT operational mode. None of these carry an opcode byte.

use crate::{
    Error,
    opcode::{Marker, Status},
};

/// The role a session declares once past PASSWORD/UNKNOWN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl From<Role> for Marker {
    fn from(value: Role) -> Self {
        match value {
            Role::Server => Marker::Server,
            Role::Client => Marker::Client,
        }
    }
}

impl TryFrom<Marker> for Role {
    type Error = Error;

    fn try_from(value: Marker) -> Result<Self, Self::Error> {
        match value {
            Marker::Server => Ok(Self::Server),
            Marker::Client => Ok(Self::Client),
            _ => Err(Error::InvalidInput),
        }
    }
}

/// A disjoint RID range, assigned by the router in the UNKNOWN step and
/// transmitted as two big-endian u64s even though RID values themselves
/// fit in u32 (matches the wire shape of the original implementation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RidRange {
    pub start: u64,
    pub end: u64,
}

impl RidRange {
    pub fn encode(&self) -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[..8].copy_from_slice(&self.start.to_be_bytes());
        buf[8..].copy_from_slice(&self.end.to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 16 {
            return Err(Error::InvalidInput);
        }

        Ok(Self {
            start: u64::from_be_bytes(bytes[..8].try_into()?),
            end: u64::from_be_bytes(bytes[8..].try_into()?),
        })
    }
}

/// Encodes the 8-byte protocol version frame.
pub fn encode_version(version: u64) -> [u8; 8] {
    version.to_be_bytes()
}

/// Decodes an 8-byte protocol version frame.
///
/// # Test
///
/// ```
/// use kvndb_codec::{PROTOCOL_VERSION, handshake::{encode_version, decode_version}};
///
/// let frame = encode_version(PROTOCOL_VERSION);
/// assert_eq!(decode_version(&frame).unwrap(), PROTOCOL_VERSION);
/// assert!(decode_version(&[0, 1, 2]).is_err());
/// ```
pub fn decode_version(bytes: &[u8]) -> Result<u64, Error> {
    if bytes.len() != 8 {
        return Err(Error::InvalidInput);
    }

    Ok(u64::from_be_bytes(bytes.try_into()?))
}

/// Encodes a single status byte (reply to VERSION or PASSWORD).
pub fn encode_status(status: Status) -> [u8; 1] {
    [status.into()]
}

pub fn decode_status(bytes: &[u8]) -> Result<Status, Error> {
    if bytes.len() != 1 {
        return Err(Error::InvalidInput);
    }

    Status::try_from(bytes[0])
}

/// Encodes a single mode-marker byte (role announce, SWITCH is an opcode
/// not a marker and lives in [`crate::message`]).
pub fn encode_marker(marker: Marker) -> [u8; 1] {
    [marker.into()]
}

pub fn decode_marker(bytes: &[u8]) -> Result<Marker, Error> {
    if bytes.len() != 1 {
        return Err(Error::InvalidInput);
    }

    Marker::try_from(bytes[0])
}

/// Password frames are the raw UTF-8/opaque bytes of the shared secret,
/// with no additional framing beyond the outer length prefix.
///
/// # Test
///
/// ```
/// use kvndb_codec::handshake::RidRange;
///
/// let range = RidRange { start: 0, end: 1 << 20 };
/// let encoded = range.encode();
/// assert_eq!(RidRange::decode(&encoded).unwrap(), range);
/// ```
pub fn encode_password(password: &[u8]) -> &[u8] {
    password
}
