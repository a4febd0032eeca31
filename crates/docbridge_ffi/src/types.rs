//! Handle types for FFI.
//!
//! Every handle is an opaque non-zero 64-bit integer. `0` is the null
//! handle, returned when allocation fails. Values are never reused within
//! a process, so a stale handle can always be told apart from a live one.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Allocates a fresh handle value.
pub(crate) fn next_handle() -> u64 {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u64);

        impl $name {
            /// The null handle.
            pub const NULL: Self = Self(0);

            /// Handle kind used in error messages.
            pub const KIND: &'static str = $kind;

            /// Returns true for the null handle.
            pub fn is_null(self) -> bool {
                self.0 == 0
            }
        }
    };
}

handle_type!(
    /// A connection: an embedded database or a remote client.
    ConnectionHandle,
    "connection"
);

handle_type!(
    /// A result set, populated in place by queries.
    ResultsHandle,
    "result set"
);

handle_type!(
    /// A forward-only cursor over a result set.
    CursorHandle,
    "cursor"
);

handle_type!(
    /// Index options consumed by add-index calls.
    IndexOptsHandle,
    "index options"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_and_non_null() {
        let a = next_handle();
        let b = next_handle();
        assert_ne!(a, 0);
        assert_ne!(a, b);
        assert!(ConnectionHandle::NULL.is_null());
        assert!(!CursorHandle(a).is_null());
    }

    #[test]
    fn handles_are_plain_integers() {
        assert_eq!(std::mem::size_of::<ResultsHandle>(), 8);
        assert_eq!(IndexOptsHandle::KIND, "index options");
    }
}
