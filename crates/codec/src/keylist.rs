//! Key list encoding: a concatenation of `(u32_be length, key bytes)`
//! tuples. The empty list encodes as zero bytes.

use bytes::Bytes;

use crate::Error;

pub fn encode(keys: &[Bytes]) -> Vec<u8> {
    let mut out = Vec::with_capacity(keys.iter().map(|k| 4 + k.len()).sum());

    for key in keys {
        out.extend_from_slice(&(key.len() as u32).to_be_bytes());
        out.extend_from_slice(key);
    }

    out
}

/// # Test
///
/// ```
/// use bytes::Bytes;
/// use kvndb_codec::keylist;
///
/// let keys = vec![Bytes::from_static(b"alpha"), Bytes::from_static(b"beta")];
/// let encoded = keylist::encode(&keys);
/// assert_eq!(keylist::decode(&encoded).unwrap(), keys);
///
/// assert_eq!(keylist::decode(&[]).unwrap(), Vec::<Bytes>::new());
/// ```
pub fn decode(bytes: &[u8]) -> Result<Vec<Bytes>, Error> {
    let mut keys = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        if offset + 4 > bytes.len() {
            return Err(Error::InvalidInput);
        }

        let len = u32::from_be_bytes(bytes[offset..offset + 4].try_into()?) as usize;
        offset += 4;

        if offset + len > bytes.len() {
            return Err(Error::InvalidInput);
        }

        keys.push(Bytes::copy_from_slice(&bytes[offset..offset + len]));
        offset += len;
    }

    Ok(keys)
}
