//! Discovery message codec and stream framing.
//!
//! Discovery messages are MessagePack documents with named fields, so a
//! decoder can skip fields it does not know and map unknown header or command
//! kinds to their `Unknown` variants. On a stream every payload (discovery or
//! RPC) is prefixed with a 4-byte big-endian length header.

use crate::error::WireError;
use auxo_types::DiscoveryMessage;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum single frame size (16 MB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// A payload that is not a valid discovery message.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,
    #[error("malformed discovery message: {0}")]
    Malformed(#[from] rmp_serde::decode::Error),
    #[error("inconsistent discovery message: {0}")]
    HeaderMismatch(String),
}

/// A message that could not be serialized.
#[derive(Debug, Error)]
#[error("failed to encode discovery message: {0}")]
pub struct EncodeError(#[from] rmp_serde::encode::Error);

/// Encode a discovery message.
pub fn encode(msg: &DiscoveryMessage) -> Result<Bytes, EncodeError> {
    Ok(Bytes::from(rmp_serde::to_vec_named(msg)?))
}

/// Decode a discovery message, rejecting header/command disagreement.
pub fn decode(bytes: &[u8]) -> Result<DiscoveryMessage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let msg: DiscoveryMessage = rmp_serde::from_slice(bytes)?;
    if !msg.is_consistent() {
        return Err(DecodeError::HeaderMismatch(msg.mismatch_description()));
    }
    Ok(msg)
}

/// Encode the 4-byte length header.
pub fn encode_length(len: u32) -> [u8; 4] {
    len.to_be_bytes()
}

/// Decode the length prefix from a 4-byte header.
pub fn decode_length(header: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*header)
}

/// Write a framed payload (4-byte length + body).
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let size = u32::try_from(body.len()).unwrap_or(u32::MAX);
    if size > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }
    writer.write_all(&encode_length(size)).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a framed payload. A clean EOF before the header is `ConnectionClosed`.
pub async fn read_frame<R>(reader: &mut R) -> Result<Bytes, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(WireError::ConnectionClosed);
        }
        Err(e) => return Err(WireError::Io(e)),
    }

    let len = decode_length(&header);
    if len > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(Bytes::from(body))
}
