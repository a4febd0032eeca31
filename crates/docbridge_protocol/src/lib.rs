//! # DocBridge Protocol
//!
//! Request/response types and framing for talking to a remote DocBridge
//! server.
//!
//! This crate provides:
//! - [`Request`] and [`Response`] messages
//! - CBOR message bodies
//! - Length-prefixed frames (u32 big-endian length, then the body)
//!
//! This is a pure protocol crate; the server and client own the sockets.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod messages;

pub use codec::{
    decode_body, decode_frame, encode_body, encode_frame, read_frame, write_frame,
    FRAME_HEADER_SIZE, MAX_FRAME_SIZE,
};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{Request, Response, WireItem, PROTOCOL_VERSION};
