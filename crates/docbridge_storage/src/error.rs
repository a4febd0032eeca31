//! Error types for log storage.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing a namespace log.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to truncate beyond the end of the log.
    #[error("cannot truncate log of {len} bytes to {requested} bytes")]
    TruncatePastEnd {
        /// The requested length.
        requested: u64,
        /// The current log length.
        len: u64,
    },
}
