//! Error codes and the thread-local last error.

use docbridge_client::ClientError;
use docbridge_core::{CoreError, ErrorKind};
use std::cell::RefCell;
use std::ffi::{c_char, CString};
use thiserror::Error;

/// Result type inside the bridge.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Error code reported by [`re_last_error_code`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReErrorCode {
    /// No error.
    Ok = 0,
    /// Connecting failed, or the connection is not usable.
    Connection = 1,
    /// Namespace or index definition problem.
    Schema = 2,
    /// Malformed JSON or a document that does not fit the namespace.
    Payload = 3,
    /// SQL that does not compile.
    QueryCompile = 4,
    /// A query that failed while running.
    QueryExecution = 5,
    /// Cursor calls out of order.
    ProtocolMisuse = 6,
    /// Unknown, destroyed or invalidated handle.
    InvalidHandle = 7,
    /// Null pointer, invalid UTF-8 or an unknown option name.
    InvalidArgument = 8,
    /// Storage failure.
    Storage = 9,
    /// Anything else, including caught panics.
    Internal = 10,
}

impl From<ErrorKind> for ReErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Connection => ReErrorCode::Connection,
            ErrorKind::Schema => ReErrorCode::Schema,
            ErrorKind::Payload => ReErrorCode::Payload,
            ErrorKind::QueryCompile => ReErrorCode::QueryCompile,
            ErrorKind::QueryExecution => ReErrorCode::QueryExecution,
            ErrorKind::Storage => ReErrorCode::Storage,
            ErrorKind::Internal => ReErrorCode::Internal,
        }
    }
}

/// Failures inside the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Embedded engine error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Remote client error.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The handle is not live in the table.
    #[error("invalid {kind} handle {handle}")]
    InvalidHandle {
        /// Handle kind.
        kind: &'static str,
        /// Raw handle value.
        handle: u64,
    },

    /// Bad argument from the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Cursor used in a state that does not allow the call.
    #[error("protocol misuse: {0}")]
    ProtocolMisuse(String),

    /// A panic was caught at the boundary.
    #[error("internal panic: {0}")]
    Panic(String),
}

impl BridgeError {
    /// Shorthand for an invalid handle.
    pub fn invalid_handle(kind: &'static str, handle: u64) -> Self {
        BridgeError::InvalidHandle { kind, handle }
    }

    /// Code reported to the caller.
    pub fn code(&self) -> ReErrorCode {
        match self {
            BridgeError::Core(e) => e.kind().into(),
            BridgeError::Client(e) => e.kind().into(),
            BridgeError::InvalidHandle { .. } => ReErrorCode::InvalidHandle,
            BridgeError::InvalidArgument(_) => ReErrorCode::InvalidArgument,
            BridgeError::ProtocolMisuse(_) => ReErrorCode::ProtocolMisuse,
            BridgeError::Panic(_) => ReErrorCode::Internal,
        }
    }
}

struct LastError {
    code: ReErrorCode,
    message: CString,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<LastError>> = const { RefCell::new(None) };
}

/// Records an error for this thread.
pub fn set_last_error(error: &BridgeError) {
    let message = CString::new(error.to_string().replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some(LastError {
            code: error.code(),
            message,
        });
    });
}

/// Clears the last error.
pub fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Returns the code of the last error on this thread, or `Ok`.
#[no_mangle]
pub extern "C" fn re_last_error_code() -> ReErrorCode {
    LAST_ERROR.with(|e| e.borrow().as_ref().map_or(ReErrorCode::Ok, |last| last.code))
}

/// Returns the message of the last error on this thread.
///
/// Returns null if no error is set.
///
/// # Safety
///
/// The returned pointer is valid until the next bridge call on this thread.
#[no_mangle]
pub extern "C" fn re_last_error_message() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(last) => last.message.as_ptr(),
        None => std::ptr::null(),
    })
}

/// Clears the last error message.
#[no_mangle]
pub extern "C" fn re_clear_error() {
    clear_last_error();
}
