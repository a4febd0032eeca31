//! Per-connection diagnostic sinks.

use crate::error::{BridgeError, ReErrorCode};
use std::ffi::{c_char, c_void, CString};

/// Callback receiving bridge failures of one connection.
///
/// Arguments: the `user_data` given at construction, the operation name,
/// the error code and the message. Both strings are borrowed for the
/// duration of the call.
pub type DiagnosticCallback = Option<
    unsafe extern "C" fn(
        user_data: *mut c_void,
        operation: *const c_char,
        code: ReErrorCode,
        message: *const c_char,
    ),
>;

/// Where a connection reports its failures.
#[derive(Debug)]
pub(crate) enum DiagnosticSink {
    /// `tracing::warn!`.
    Tracing,
    /// A caller-supplied callback.
    Callback {
        callback: unsafe extern "C" fn(*mut c_void, *const c_char, ReErrorCode, *const c_char),
        user_data: UserData,
    },
}

/// Opaque caller pointer handed back to the callback.
#[derive(Debug)]
pub(crate) struct UserData(*mut c_void);

// The pointer is only ever passed back to the caller's callback; making it
// usable from any thread is part of the contract of re_new_with_sink.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

impl DiagnosticSink {
    /// Builds a sink from an optional callback; null means tracing.
    pub(crate) fn from_callback(callback: DiagnosticCallback, user_data: *mut c_void) -> Self {
        match callback {
            Some(callback) => DiagnosticSink::Callback {
                callback,
                user_data: UserData(user_data),
            },
            None => DiagnosticSink::Tracing,
        }
    }

    /// Reports a failed operation.
    pub(crate) fn report(&self, operation: &str, error: &BridgeError) {
        match self {
            DiagnosticSink::Tracing => {
                tracing::warn!(operation, code = ?error.code(), error = %error, "bridge call failed");
            }
            DiagnosticSink::Callback {
                callback,
                user_data,
            } => {
                let operation = CString::new(operation).unwrap_or_default();
                let message = CString::new(error.to_string().replace('\0', " ")).unwrap_or_default();
                // Safety: the callback was supplied by the caller for this purpose.
                unsafe { callback(user_data.0, operation.as_ptr(), error.code(), message.as_ptr()) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    unsafe extern "C" fn record(
        user_data: *mut c_void,
        operation: *const c_char,
        code: ReErrorCode,
        message: *const c_char,
    ) {
        let log = &mut *(user_data as *mut Vec<(String, ReErrorCode, String)>);
        log.push((
            CStr::from_ptr(operation).to_string_lossy().into_owned(),
            code,
            CStr::from_ptr(message).to_string_lossy().into_owned(),
        ));
    }

    #[test]
    fn callback_receives_failures() {
        let mut log: Vec<(String, ReErrorCode, String)> = Vec::new();
        let sink = DiagnosticSink::from_callback(
            Some(record),
            &mut log as *mut Vec<(String, ReErrorCode, String)> as *mut c_void,
        );

        sink.report("re_connect", &BridgeError::InvalidArgument("dsn is null".into()));

        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "re_connect");
        assert_eq!(log[0].1, ReErrorCode::InvalidArgument);
        assert!(log[0].2.contains("dsn is null"));
    }

    #[test]
    fn null_callback_means_tracing() {
        let sink = DiagnosticSink::from_callback(None, std::ptr::null_mut());
        assert!(matches!(sink, DiagnosticSink::Tracing));
        sink.report("re_select", &BridgeError::Panic("boom".into()));
    }
}
