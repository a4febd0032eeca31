//! Protocol error types.

use std::io;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding, decoding or moving frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A message could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// A message could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A frame announced a body larger than allowed.
    #[error("frame of {size} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Announced size.
        size: usize,
        /// Allowed size.
        max: usize,
    },

    /// The peer closed the connection between frames.
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer answered with a response of the wrong shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}
