//! Wire format for the router/peer/client protocol.
//!
//! Every frame on every connection is `u64_be length | payload[length]`.
//! During the handshake the payload carries no opcode byte (version,
//! password, status and role are all fixed-shape frames); once a session
//! has settled into an operational mode the payload's first byte is an
//! [`opcode::Opcode`] and the rest is opcode-specific, see [`message`].

pub mod framing;
pub mod handshake;
pub mod keylist;
pub mod message;
pub mod opcode;

use std::array::TryFromSliceError;

pub use framing::{MAX_FRAME_LEN, read_frame, write_frame};

/// Protocol version exchanged as the first handshake frame.
pub const PROTOCOL_VERSION: u64 = 1;

#[derive(Debug)]
pub enum Error {
    /// Payload too short or malformed for the frame it claims to be.
    InvalidInput,
    /// Length prefix exceeds the configured maximum frame size.
    FramingError,
    /// Opcode/marker/status byte not in the known set.
    UnknownTag(u8),
    TryFromSliceError(TryFromSliceError),
    Io(std::io::Error),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<TryFromSliceError> for Error {
    fn from(value: TryFromSliceError) -> Self {
        Self::TryFromSliceError(value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
