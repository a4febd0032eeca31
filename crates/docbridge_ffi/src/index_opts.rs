//! Index option handles.

use crate::buffer::str_arg;
use crate::error::{BridgeError, BridgeResult};
use crate::ops::{guard, guard_bool};
use crate::types::{next_handle, IndexOptsHandle};
use docbridge_core::{CollateMode, IndexOpts};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::c_char;
use std::sync::OnceLock;

fn table() -> &'static Mutex<HashMap<u64, IndexOpts>> {
    static TABLE: OnceLock<Mutex<HashMap<u64, IndexOpts>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Reads the options behind a handle. The null handle means defaults.
pub(crate) fn resolve(handle: IndexOptsHandle) -> BridgeResult<IndexOpts> {
    if handle.is_null() {
        return Ok(IndexOpts::new());
    }
    table()
        .lock()
        .get(&handle.0)
        .copied()
        .ok_or_else(|| BridgeError::invalid_handle(IndexOptsHandle::KIND, handle.0))
}

fn update(handle: IndexOptsHandle, f: impl FnOnce(IndexOpts) -> IndexOpts) -> BridgeResult<()> {
    let mut table = table().lock();
    let opts = table
        .get_mut(&handle.0)
        .ok_or_else(|| BridgeError::invalid_handle(IndexOptsHandle::KIND, handle.0))?;
    *opts = f(*opts);
    Ok(())
}

/// Creates default index options.
#[no_mangle]
pub extern "C" fn index_opts_new() -> IndexOptsHandle {
    guard("index_opts_new", None, IndexOptsHandle::NULL, || {
        let handle = next_handle();
        table().lock().insert(handle, IndexOpts::new());
        Ok(IndexOptsHandle(handle))
    })
}

/// Destroys index options.
#[no_mangle]
pub extern "C" fn index_opts_destroy(opts: IndexOptsHandle) -> bool {
    guard_bool("index_opts_destroy", None, || {
        table()
            .lock()
            .remove(&opts.0)
            .map(|_| ())
            .ok_or_else(|| BridgeError::invalid_handle(IndexOptsHandle::KIND, opts.0))
    })
}

/// Marks the index as the primary key.
#[no_mangle]
pub extern "C" fn index_opts_pk(opts: IndexOptsHandle) -> bool {
    guard_bool("index_opts_pk", None, || update(opts, |o| o.pk(true)))
}

/// Marks the index as an array index.
#[no_mangle]
pub extern "C" fn index_opts_array(opts: IndexOptsHandle) -> bool {
    guard_bool("index_opts_array", None, || update(opts, |o| o.array(true)))
}

/// Marks the index as sparse.
#[no_mangle]
pub extern "C" fn index_opts_sparse(opts: IndexOptsHandle) -> bool {
    guard_bool("index_opts_sparse", None, || update(opts, |o| o.sparse(true)))
}

/// Marks the index as dense.
#[no_mangle]
pub extern "C" fn index_opts_dense(opts: IndexOptsHandle) -> bool {
    guard_bool("index_opts_dense", None, || update(opts, |o| o.dense(true)))
}

/// Sets the collation: `none`, `ascii`, `numeric` or `utf8`.
///
/// # Safety
///
/// `mode` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn index_opts_collate(opts: IndexOptsHandle, mode: *const c_char) -> bool {
    guard_bool("index_opts_collate", None, || {
        let mode = str_arg(mode, "mode")?
            .parse::<CollateMode>()
            .map_err(|e| BridgeError::InvalidArgument(e.to_string()))?;
        update(opts, |o| o.collate(mode))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{re_last_error_code, ReErrorCode};
    use std::ffi::CString;

    #[test]
    fn flags_accumulate() {
        let opts = index_opts_new();
        assert!(!opts.is_null());
        assert!(index_opts_pk(opts));
        assert!(index_opts_dense(opts));
        let ascii = CString::new("ascii").unwrap();
        assert!(unsafe { index_opts_collate(opts, ascii.as_ptr()) });

        let resolved = resolve(opts).unwrap();
        assert!(resolved.is_pk);
        assert!(resolved.is_dense);
        assert_eq!(resolved.collate_mode, CollateMode::Ascii);
        assert!(index_opts_destroy(opts));
    }

    #[test]
    fn unknown_collation_rejected() {
        let opts = index_opts_new();
        let bad = CString::new("klingon").unwrap();
        assert!(!unsafe { index_opts_collate(opts, bad.as_ptr()) });
        assert_eq!(re_last_error_code(), ReErrorCode::InvalidArgument);
        index_opts_destroy(opts);
    }

    #[test]
    fn destroyed_options_are_invalid() {
        let opts = index_opts_new();
        assert!(index_opts_destroy(opts));
        assert!(!index_opts_destroy(opts));
        assert_eq!(re_last_error_code(), ReErrorCode::InvalidHandle);
        assert!(!index_opts_pk(opts));
        assert!(resolve(IndexOptsHandle::NULL).is_ok());
    }
}
