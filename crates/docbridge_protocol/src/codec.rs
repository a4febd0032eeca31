//! CBOR bodies and length-prefixed frames.
//!
//! ```text
//! | length u32 BE (4) | CBOR body (length bytes) |
//! ```

use crate::error::{ProtocolError, ProtocolResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{self, Read, Write};

/// Size of the length prefix.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Largest body accepted by default (64 MiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Encodes a message body.
pub fn encode_body<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let mut body = Vec::new();
    ciborium::into_writer(message, &mut body).map_err(|e| ProtocolError::Encode(e.to_string()))?;
    Ok(body)
}

/// Decodes a message body.
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> ProtocolResult<T> {
    ciborium::from_reader(body).map_err(|e| ProtocolError::Decode(e.to_string()))
}

/// Encodes a message with its length prefix.
pub fn encode_frame<T: Serialize>(message: &T) -> ProtocolResult<Bytes> {
    let body = encode_body(message)?;
    let len = u32::try_from(body.len()).map_err(|_| ProtocolError::FrameTooLarge {
        size: body.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + body.len());
    frame.put_u32(len);
    frame.extend_from_slice(&body);
    Ok(frame.freeze())
}

/// Takes one complete frame off the front of `buf`.
///
/// Returns `Ok(None)` until `buf` holds a whole frame; the bytes stay in
/// the buffer so more can be appended.
pub fn decode_frame<T: DeserializeOwned>(
    buf: &mut BytesMut,
    max_frame_size: usize,
) -> ProtocolResult<Option<T>> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > max_frame_size {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        });
    }
    if buf.len() < FRAME_HEADER_SIZE + len {
        buf.reserve(FRAME_HEADER_SIZE + len - buf.len());
        return Ok(None);
    }

    buf.advance(FRAME_HEADER_SIZE);
    let body = buf.split_to(len);
    decode_body(&body).map(Some)
}

/// Writes one frame to a blocking stream.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> ProtocolResult<()> {
    let frame = encode_frame(message)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame from a blocking stream.
///
/// End of stream before the first byte is reported as
/// [`ProtocolError::ConnectionClosed`].
pub fn read_frame<R: Read, T: DeserializeOwned>(
    reader: &mut R,
    max_frame_size: usize,
) -> ProtocolResult<T> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_frame_size {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    decode_body(&body)
}
