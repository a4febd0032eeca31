//! Error types for the remote client.

use docbridge_core::{CoreError, ErrorKind};
use docbridge_protocol::ProtocolError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Local failure: bad DSN, not connected, malformed JSON, SQL that
    /// does not compile.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Transport or framing failure. The connection is dropped.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server reported a failure.
    #[error("server error ({kind}): {message}")]
    Remote {
        /// Classification sent by the server.
        kind: ErrorKind,
        /// Message sent by the server.
        message: String,
    },
}

impl ClientError {
    /// Classification of the failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(e) => e.kind(),
            Self::Protocol(_) => ErrorKind::Connection,
            Self::Remote { kind, .. } => *kind,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Protocol(ProtocolError::Io(err))
    }
}
