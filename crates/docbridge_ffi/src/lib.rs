//! # DocBridge FFI
//!
//! Stable C ABI over DocBridge databases, in two front ends:
//!
//! - `re_*` drives an embedded database (`builtin://path`)
//! - `re_client_*` drives a remote server (`cproto://host:port/db`)
//!
//! ## Handles
//!
//! Connections, result sets, cursors and index options are opaque 64-bit
//! handles; `0` is null. A handle is valid from the call that returns it
//! until it is destroyed, or until its parent is destroyed:
//!
//! - destroying a result set invalidates its cursors
//! - destroying a connection invalidates the result sets it populated
//! - re-populating a result set invalidates cursors on the old contents
//!
//! Using an invalid handle fails with [`ReErrorCode::InvalidHandle`].
//!
//! ## Errors
//!
//! Every call returns `false`, a null handle, a null pointer or `-1` on
//! failure. The failure is recorded for the calling thread
//! ([`re_last_error_code`], [`re_last_error_message`]) and reported to the
//! connection's diagnostic sink.
//!
//! ## Memory
//!
//! Strings returned by the bridge belong to the caller and are released
//! with [`re_string_free`]. Strings passed in are borrowed for the call.
//!
//! ## Rust callers
//!
//! [`EmbeddedDb`], [`RemoteDb`], [`Results`] and [`Iter`] own their
//! handles and release them on drop.

mod buffer;
mod cursor;
mod embedded;
mod engine;
mod error;
mod index_opts;
mod ops;
mod registry;
mod remote;
mod sink;
mod types;
mod wrapper;

pub use buffer::re_string_free;
pub use cursor::{Cursor, CursorState};
pub use embedded::*;
pub use error::{re_clear_error, re_last_error_code, re_last_error_message, BridgeError, ReErrorCode};
pub use index_opts::{
    index_opts_array, index_opts_collate, index_opts_dense, index_opts_destroy, index_opts_new,
    index_opts_pk, index_opts_sparse,
};
pub use remote::*;
pub use sink::DiagnosticCallback;
pub use types::{ConnectionHandle, CursorHandle, IndexOptsHandle, ResultsHandle};
pub use wrapper::{Db, Embedded, EmbeddedDb, Iter, Remote, RemoteDb, Results};

use std::ffi::c_char;

/// Library version as a static NUL-terminated string.
#[no_mangle]
pub extern "C" fn re_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr().cast()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn version_matches_package() {
        let version = unsafe { CStr::from_ptr(re_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}
