//! C string conversions.

use crate::error::{BridgeError, BridgeResult};
use std::ffi::{c_char, CStr, CString};

/// Borrows a caller string argument.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays
/// valid for `'a`.
pub(crate) unsafe fn str_arg<'a>(ptr: *const c_char, name: &str) -> BridgeResult<&'a str> {
    if ptr.is_null() {
        return Err(BridgeError::InvalidArgument(format!("{name} is null")));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| BridgeError::InvalidArgument(format!("{name} is not valid UTF-8")))
}

/// Like [`str_arg`], but null reads as the empty string.
///
/// # Safety
///
/// Same as [`str_arg`].
pub(crate) unsafe fn optional_str_arg<'a>(ptr: *const c_char, name: &str) -> BridgeResult<&'a str> {
    if ptr.is_null() {
        Ok("")
    } else {
        str_arg(ptr, name)
    }
}

/// Moves a string to the caller. Release with [`re_string_free`].
pub(crate) fn into_c_string(text: String) -> BridgeResult<*mut c_char> {
    CString::new(text)
        .map(CString::into_raw)
        .map_err(|_| BridgeError::InvalidArgument("text contains a NUL byte".into()))
}

/// Frees a string returned by the bridge.
///
/// # Safety
///
/// The string must have been returned by a DocBridge FFI function and not
/// freed before. Null is ignored.
#[no_mangle]
pub unsafe extern "C" fn re_string_free(string: *mut c_char) {
    if !string.is_null() {
        drop(CString::from_raw(string));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trip() {
        let ptr = into_c_string(r#"{"id":1}"#.to_owned()).unwrap();
        assert!(!ptr.is_null());

        // Safety: we just created it
        let s = unsafe { str_arg(ptr, "json") }.unwrap();
        assert_eq!(s, r#"{"id":1}"#);

        unsafe { re_string_free(ptr) };
    }

    #[test]
    fn null_and_bad_utf8_rejected() {
        let err = unsafe { str_arg(std::ptr::null(), "dsn") }.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(_)));

        let bad = CString::new(vec![0xff, 0xfe]).unwrap();
        let err = unsafe { str_arg(bad.as_ptr(), "dsn") }.unwrap_err();
        assert!(err.to_string().contains("UTF-8"));

        assert_eq!(unsafe { optional_str_arg(std::ptr::null(), "paths") }.unwrap(), "");
    }

    #[test]
    fn interior_nul_rejected() {
        assert!(into_c_string("a\0b".to_owned()).is_err());
        unsafe { re_string_free(std::ptr::null_mut()) };
    }
}
