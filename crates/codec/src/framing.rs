//! The length-prefix layer shared by every frame, handshake or operational.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::Error;

/// Frames whose declared length exceeds this are rejected as
/// [`Error::FramingError`] rather than read into memory.
pub const MAX_FRAME_LEN: u64 = 16 * 1024 * 1024;

/// Reads one frame: an 8-byte big-endian length prefix followed by exactly
/// that many bytes. Never returns a partial frame.
///
/// # Test
///
/// ```
/// use kvndb_codec::{read_frame, write_frame};
///
/// tokio::runtime::Runtime::new().unwrap().block_on(async {
///     let mut buf = Vec::new();
///     write_frame(&mut buf, b"hello").await.unwrap();
///
///     let mut cursor = std::io::Cursor::new(buf);
///     let frame = read_frame(&mut cursor, 1024).await.unwrap();
///     assert_eq!(&frame[..], b"hello");
/// });
/// ```
pub async fn read_frame<R>(reader: &mut R, max_len: u64) -> Result<Vec<u8>, Error>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 8];
    reader.read_exact(&mut len_bytes).await?;

    let len = u64::from_be_bytes(len_bytes);
    if len > max_len {
        return Err(Error::FramingError);
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;

    Ok(payload)
}

/// Writes one frame: the payload's length as an 8-byte big-endian prefix
/// followed by the payload itself.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&(payload.len() as u64).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
