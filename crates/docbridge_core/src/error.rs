//! Error types for the DocBridge engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Coarse classification of a failure.
///
/// This is what crosses process and language boundaries: the remote protocol
/// carries it next to the message and the C bridge maps it onto its error
/// codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Connecting, DSN parsing, locking, or not being connected at all.
    Connection,
    /// Namespace or index definition problems.
    Schema,
    /// Malformed JSON or a document that does not fit the namespace.
    Payload,
    /// SQL text that does not compile.
    QueryCompile,
    /// A compiled query that failed while running.
    QueryExecution,
    /// Namespace log or file system failures.
    Storage,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "connection",
            Self::Schema => "schema",
            Self::Payload => "payload",
            Self::QueryCompile => "query compile",
            Self::QueryExecution => "query execution",
            Self::Storage => "storage",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Log backend error.
    #[error("storage error: {0}")]
    Storage(#[from] docbridge_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The DSN could not be understood.
    #[error("invalid DSN {dsn:?}: {message}")]
    InvalidDsn {
        /// The rejected DSN.
        dsn: String,
        /// What is wrong with it.
        message: String,
    },

    /// The engine has not been connected yet.
    #[error("not connected")]
    NotConnected,

    /// `connect` was called on an engine that is already connected.
    #[error("already connected")]
    AlreadyConnected,

    /// Another process holds the storage directory.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// The namespace is not open.
    #[error("namespace not found: {name}")]
    NamespaceNotFound {
        /// Name of the namespace.
        name: String,
    },

    /// The namespace name cannot be used.
    #[error("invalid namespace name {name:?}")]
    InvalidNamespaceName {
        /// The rejected name.
        name: String,
    },

    /// The index definition is malformed.
    #[error("invalid index definition: {message}")]
    InvalidIndex {
        /// Description of the problem.
        message: String,
    },

    /// An index with the same name but a different definition exists.
    #[error("index {name:?} already exists with a different definition")]
    IndexConflict {
        /// Name of the index.
        name: String,
    },

    /// The index does not exist.
    #[error("index not found: {name}")]
    IndexNotFound {
        /// Name of the index.
        name: String,
    },

    /// Items cannot be modified in a namespace without a primary key.
    #[error("namespace {namespace} has no primary key index")]
    NoPrimaryKey {
        /// Name of the namespace.
        namespace: String,
    },

    /// The payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document does not fit the namespace indexes.
    #[error("item rejected: {message}")]
    InvalidItem {
        /// Description of the mismatch.
        message: String,
    },

    /// Insert of a primary key that already exists.
    #[error("duplicate primary key {key} in namespace {namespace}")]
    DuplicateKey {
        /// Name of the namespace.
        namespace: String,
        /// The conflicting key.
        key: String,
    },

    /// Update or delete of a primary key that does not exist.
    #[error("item with primary key {key} not found in namespace {namespace}")]
    ItemNotFound {
        /// Name of the namespace.
        namespace: String,
        /// The missing key.
        key: String,
    },

    /// SQL text failed to parse.
    #[error("SQL parse error at position {position}: {message}")]
    QueryParse {
        /// Byte offset of the offending token.
        position: usize,
        /// Description of the problem.
        message: String,
    },

    /// A query failed while executing.
    #[error("query failed: {message}")]
    QueryExecution {
        /// Description of the failure.
        message: String,
    },

    /// The namespace log is damaged.
    #[error("namespace log corruption: {message}")]
    LogCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch in a namespace log frame.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// CBOR encoding or decoding of a log record failed.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid DSN error.
    pub fn invalid_dsn(dsn: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDsn {
            dsn: dsn.into(),
            message: message.into(),
        }
    }

    /// Creates a namespace not found error.
    pub fn namespace_not_found(name: impl Into<String>) -> Self {
        Self::NamespaceNotFound { name: name.into() }
    }

    /// Creates an invalid index error.
    pub fn invalid_index(message: impl Into<String>) -> Self {
        Self::InvalidIndex {
            message: message.into(),
        }
    }

    /// Creates an invalid item error.
    pub fn invalid_item(message: impl Into<String>) -> Self {
        Self::InvalidItem {
            message: message.into(),
        }
    }

    /// Creates a query parse error.
    pub fn query_parse(position: usize, message: impl Into<String>) -> Self {
        Self::QueryParse {
            position,
            message: message.into(),
        }
    }

    /// Creates a query execution error.
    pub fn query_execution(message: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: message.into(),
        }
    }

    /// Creates a log corruption error.
    pub fn log_corruption(message: impl Into<String>) -> Self {
        Self::LogCorruption {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDsn { .. }
            | Self::NotConnected
            | Self::AlreadyConnected
            | Self::DatabaseLocked => ErrorKind::Connection,
            Self::NamespaceNotFound { .. }
            | Self::InvalidNamespaceName { .. }
            | Self::InvalidIndex { .. }
            | Self::IndexConflict { .. }
            | Self::IndexNotFound { .. }
            | Self::NoPrimaryKey { .. } => ErrorKind::Schema,
            Self::Json(_)
            | Self::InvalidItem { .. }
            | Self::DuplicateKey { .. }
            | Self::ItemNotFound { .. } => ErrorKind::Payload,
            Self::QueryParse { .. } => ErrorKind::QueryCompile,
            Self::QueryExecution { .. } => ErrorKind::QueryExecution,
            Self::Storage(_)
            | Self::Io(_)
            | Self::LogCorruption { .. }
            | Self::ChecksumMismatch { .. }
            | Self::Codec { .. } => ErrorKind::Storage,
            Self::InvalidOperation { .. } => ErrorKind::Internal,
        }
    }
}
