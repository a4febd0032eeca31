//! Error types for the server.

use docbridge_core::{CoreError, ErrorKind};
use docbridge_protocol::{ProtocolError, Response};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The request is not valid in the current session state.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A request other than login or ping arrived before login.
    #[error("not logged in")]
    NotLoggedIn,

    /// The database does not exist and may not be created.
    #[error("unknown database: {0}")]
    UnknownDatabase(String),

    /// The client speaks another protocol version.
    #[error("protocol version mismatch: server {expected}, client {actual}")]
    ProtocolMismatch {
        /// Server version.
        expected: u32,
        /// Client version.
        actual: u32,
    },

    /// Engine error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Framing error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Classification reported to the client.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::Core(e) => e.kind(),
            ServerError::NotLoggedIn
            | ServerError::UnknownDatabase(_)
            | ServerError::ProtocolMismatch { .. } => ErrorKind::Connection,
            ServerError::InvalidRequest(_) | ServerError::Protocol(_) | ServerError::Io(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Converts the error into the response sent back.
    pub fn to_response(&self) -> Response {
        match self {
            ServerError::Core(e) => Response::error(e),
            other => Response::Error {
                kind: other.kind(),
                message: other.to_string(),
            },
        }
    }
}
