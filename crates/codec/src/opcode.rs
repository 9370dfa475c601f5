//! Single-byte tags used throughout the protocol: opcodes for operational
//! messages, mode markers and status bytes for the handshake.

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Get,
    Set,
    Del,
    GetKeys,
    Answer,
    NotFound,
    AllKeys,
    Switch,
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    /// # Test
    ///
    /// ```
    /// use kvndb_codec::opcode::Opcode;
    ///
    /// assert_eq!(Opcode::try_from(1).unwrap(), Opcode::Get);
    /// assert_eq!(Opcode::try_from(8).unwrap(), Opcode::Switch);
    /// assert!(Opcode::try_from(200).is_err());
    /// ```
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::Get,
            2 => Self::Set,
            3 => Self::Del,
            4 => Self::GetKeys,
            5 => Self::Answer,
            6 => Self::NotFound,
            7 => Self::AllKeys,
            8 => Self::Switch,
            _ => return Err(Error::UnknownTag(value)),
        })
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Get => 1,
            Opcode::Set => 2,
            Opcode::Del => 3,
            Opcode::GetKeys => 4,
            Opcode::Answer => 5,
            Opcode::NotFound => 6,
            Opcode::AllKeys => 7,
            Opcode::Switch => 8,
        }
    }
}

/// Mode marker bytes exchanged only during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Version,
    Password,
    Unknown,
    Server,
    Client,
    Error,
    Connecting,
    Range,
}

impl TryFrom<u8> for Marker {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        Ok(match value {
            1 => Self::Version,
            2 => Self::Password,
            3 => Self::Unknown,
            4 => Self::Server,
            5 => Self::Client,
            6 => Self::Error,
            7 => Self::Connecting,
            8 => Self::Range,
            _ => return Err(Error::UnknownTag(value)),
        })
    }
}

impl From<Marker> for u8 {
    fn from(value: Marker) -> Self {
        match value {
            Marker::Version => 1,
            Marker::Password => 2,
            Marker::Unknown => 3,
            Marker::Server => 4,
            Marker::Client => 5,
            Marker::Error => 6,
            Marker::Connecting => 7,
            Marker::Range => 8,
        }
    }
}

/// Status byte sent in reply to a version or password frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Error,
    PasswordRequired,
}

impl TryFrom<u8> for Status {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        Ok(match value {
            b'O' => Self::Ok,
            b'E' => Self::Error,
            b'P' => Self::PasswordRequired,
            _ => return Err(Error::UnknownTag(value)),
        })
    }
}

impl From<Status> for u8 {
    fn from(value: Status) -> Self {
        match value {
            Status::Ok => b'O',
            Status::Error => b'E',
            Status::PasswordRequired => b'P',
        }
    }
}
