//! Length-Prefixed Frame Codec
//!
//! Every message on the wire is one frame: a 4-byte big-endian length
//! followed by exactly that many payload bytes, where the payload is a
//! bincode-serialized [`Request`] or [`Response`].
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────┐
//! │ length (u32, BE) │ payload (`length` bytes)     │
//! └──────────────────┴──────────────────────────────┘
//! ```
//!
//! ## Behavior
//!
//! - The length prefix counts payload bytes only, never itself.
//! - Frames larger than [`MAX_FRAME_SIZE`] are rejected before any
//!   payload allocation happens.
//! - A stream that ends inside the prefix or inside the payload is a
//!   truncated frame and surfaces as an I/O error.
//! - Payload bytes that do not decode into the expected record are a
//!   [`ProtocolError::Malformed`] error.
//!
//! The read and write helpers are generic over any async byte stream,
//! so the same code runs against a `TcpStream` in production and an
//! in-memory duplex pipe in tests.

use crate::protocol::message::{Request, Response};
use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Number of bytes in the frame length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload the codec will read or write (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Errors that can occur while reading or writing frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Network failure, including streams that end mid-frame
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The length prefix exceeds the maximum allowed payload size
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The payload did not decode into the expected record
    #[error("malformed payload: {0}")]
    Malformed(#[from] bincode::Error),
}

/// Result type for codec operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Reads one length-prefixed [`Request`] frame.
pub async fn read_request<R>(reader: &mut R) -> ProtocolResult<Request>
where
    R: AsyncRead + Unpin,
{
    read_frame(reader).await
}

/// Writes one length-prefixed [`Request`] frame and flushes the stream.
pub async fn write_request<W>(writer: &mut W, request: &Request) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
{
    write_frame(writer, request).await
}

/// Reads one length-prefixed [`Response`] frame.
pub async fn read_response<R>(reader: &mut R) -> ProtocolResult<Response>
where
    R: AsyncRead + Unpin,
{
    read_frame(reader).await
}

/// Writes one length-prefixed [`Response`] frame and flushes the stream.
pub async fn write_response<W>(writer: &mut W, response: &Response) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
{
    write_frame(writer, response).await
}

/// Reads a frame and deserializes its payload.
async fn read_frame<R, T>(reader: &mut R) -> ProtocolResult<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    let record = bincode::deserialize(&payload)?;
    Ok(record)
}

/// Serializes a record and writes it as a single frame.
async fn write_frame<W, T>(writer: &mut W, record: &T) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(record)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    // Assemble prefix and payload into one buffer so the frame goes out
    // in a single write.
    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.put_u32(payload.len() as u32);
    frame.put_slice(&payload);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
