//! Operational messages: the opcode-tagged frames exchanged once a session
//! has left the handshake. See the wire table in the crate-level docs of
//! the surrounding workspace for the payload shape of each opcode.

use bytes::Bytes;

use crate::{Error, keylist, opcode::Opcode};

pub type Rid = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Get { rid: Rid, key: Bytes },
    Set { key: Bytes, value: Bytes },
    Del { key: Bytes },
    GetKeys { rid: Rid },
    Answer { rid: Rid, value: Bytes },
    NotFound { rid: Rid },
    AllKeys { rid: Rid, keys: Vec<Bytes> },
    Switch,
}

impl Message {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Get { .. } => Opcode::Get,
            Self::Set { .. } => Opcode::Set,
            Self::Del { .. } => Opcode::Del,
            Self::GetKeys { .. } => Opcode::GetKeys,
            Self::Answer { .. } => Opcode::Answer,
            Self::NotFound { .. } => Opcode::NotFound,
            Self::AllKeys { .. } => Opcode::AllKeys,
            Self::Switch => Opcode::Switch,
        }
    }

    /// Encodes the full frame payload, including the leading opcode byte.
    /// The caller is responsible for the outer length-prefix framing (see
    /// [`crate::framing`]).
    ///
    /// # Test
    ///
    /// ```
    /// use bytes::Bytes;
    /// use kvndb_codec::message::Message;
    ///
    /// let msg = Message::Get { rid: 7, key: Bytes::from_static(b"k") };
    /// let encoded = msg.encode();
    /// assert_eq!(Message::decode(&encoded).unwrap(), msg);
    ///
    /// let answer = Message::Answer { rid: 9, value: Bytes::from_static(b"v") };
    /// assert_eq!(Message::decode(&answer.encode()).unwrap(), answer);
    ///
    /// assert_eq!(Message::decode(&Message::Switch.encode()).unwrap(), Message::Switch);
    /// ```
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.opcode().into()];

        match self {
            Self::Get { rid, key } => {
                out.extend_from_slice(&rid.to_be_bytes());
                out.extend_from_slice(key);
            }
            Self::Set { key, value } => {
                out.extend_from_slice(&(key.len() as u32).to_be_bytes());
                out.extend_from_slice(key);
                out.extend_from_slice(value);
            }
            Self::Del { key } => {
                out.extend_from_slice(key);
            }
            Self::GetKeys { rid } => {
                out.extend_from_slice(&rid.to_be_bytes());
            }
            Self::Answer { rid, value } => {
                out.extend_from_slice(&rid.to_be_bytes());
                out.extend_from_slice(value);
            }
            Self::NotFound { rid } => {
                out.extend_from_slice(&rid.to_be_bytes());
            }
            Self::AllKeys { rid, keys } => {
                out.extend_from_slice(&rid.to_be_bytes());
                out.extend_from_slice(&keylist::encode(keys));
            }
            Self::Switch => {}
        }

        out
    }

    /// Decodes a full frame payload, including the leading opcode byte.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Err(Error::InvalidInput);
        }

        let opcode = Opcode::try_from(bytes[0])?;
        let body = &bytes[1..];

        Ok(match opcode {
            Opcode::Get => {
                let rid = read_rid(body)?;
                Self::Get { rid, key: Bytes::copy_from_slice(&body[4..]) }
            }
            Opcode::Set => {
                if body.len() < 4 {
                    return Err(Error::InvalidInput);
                }

                let key_len = u32::from_be_bytes(body[..4].try_into()?) as usize;
                if body.len() < 4 + key_len {
                    return Err(Error::InvalidInput);
                }

                Self::Set {
                    key: Bytes::copy_from_slice(&body[4..4 + key_len]),
                    value: Bytes::copy_from_slice(&body[4 + key_len..]),
                }
            }
            Opcode::Del => Self::Del { key: Bytes::copy_from_slice(body) },
            Opcode::GetKeys => Self::GetKeys { rid: read_rid(body)? },
            Opcode::Answer => {
                let rid = read_rid(body)?;
                Self::Answer { rid, value: Bytes::copy_from_slice(&body[4..]) }
            }
            Opcode::NotFound => Self::NotFound { rid: read_rid(body)? },
            Opcode::AllKeys => {
                let rid = read_rid(body)?;
                Self::AllKeys { rid, keys: keylist::decode(&body[4..])? }
            }
            Opcode::Switch => {
                if !body.is_empty() {
                    return Err(Error::InvalidInput);
                }

                Self::Switch
            }
        })
    }
}

fn read_rid(body: &[u8]) -> Result<Rid, Error> {
    if body.len() < 4 {
        return Err(Error::InvalidInput);
    }

    Ok(Rid::from_be_bytes(body[..4].try_into()?))
}
