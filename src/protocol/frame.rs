//! Length-prefixed framing: `u32` big-endian length followed by the body.

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::ProtocolError;
use super::message;

/// Largest body accepted from the controller (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Serializes `message` and prepends the length header, producing a buffer
/// that can be handed to a single `write_all`.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    let body = message::encode(message)?;
    let length = u32::try_from(body.len()).map_err(|_| ProtocolError::FrameTooLarge {
        size: body.len(),
        max: u32::MAX as usize,
    })?;
    let mut frame = Vec::with_capacity(body.len() + 4);
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Writes an already encoded frame and flushes it.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame body.
///
/// End of stream surfaces as an `UnexpectedEof` I/O error, see
/// [`ProtocolError::is_end_of_stream`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let length = u32::from_be_bytes(len_buf) as usize;

    if length == 0 {
        return Err(ProtocolError::EmptyFrame);
    }
    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: length,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    Ok(body)
}
