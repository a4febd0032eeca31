//! # DocBridge Storage
//!
//! Log backends for the embedded DocBridge engine.
//!
//! Every persistent namespace owns one append-only log. Backends are
//! **opaque byte logs**: they append frames, hand the whole log back for
//! replay, and can drop a torn tail or atomically replace the log with a
//! compacted copy. The engine owns the record format.
//!
//! ## Available Backends
//!
//! - [`MemoryLog`] - For tests and in-memory namespaces
//! - [`FileLog`] - For persistent namespaces
//!
//! ## Example
//!
//! ```rust
//! use docbridge_storage::{LogBackend, MemoryLog};
//!
//! let mut log = MemoryLog::new();
//! let offset = log.append(b"frame").unwrap();
//! assert_eq!(offset, 0);
//! assert_eq!(log.read_all().unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::LogBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileLog;
pub use memory::MemoryLog;
