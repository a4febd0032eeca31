//! Owning Rust wrappers over the exported C functions.
//!
//! [`EmbeddedDb`] and [`RemoteDb`] own a connection handle, [`Results`] a
//! result set and [`Iter`] a cursor; each destroys its handle on drop.
//! Calls report failure as `false`, like the C functions they wrap, and
//! leave the reason in [`re_last_error_code`](crate::re_last_error_code).
//!
//! ```no_run
//! use docbridge_ffi::EmbeddedDb;
//!
//! let db = EmbeddedDb::new();
//! assert!(db.connect("builtin://"));
//! assert!(db.open_namespace("items"));
//! assert!(db.add_index("items", "id", "id", "hash", "int", true));
//! assert!(db.upsert("items", r#"{"id":1,"value":"v"}"#));
//!
//! let (results, ok) = db.select("SELECT * FROM items");
//! assert!(ok);
//! for json in &results {
//!     println!("{json}");
//! }
//! ```

use crate::buffer::re_string_free;
#[allow(clippy::wildcard_imports)]
use crate::embedded::*;
use crate::error::{set_last_error, BridgeError};
use crate::index_opts::{index_opts_destroy, index_opts_new, index_opts_pk};
#[allow(clippy::wildcard_imports)]
use crate::remote::*;
use crate::types::{ConnectionHandle, CursorHandle, IndexOptsHandle, ResultsHandle};
use std::ffi::{c_char, CStr, CString};
use std::marker::PhantomData;

type NamespaceFn = unsafe extern "C" fn(ConnectionHandle, *const c_char) -> bool;
type ModifyFn = unsafe extern "C" fn(ConnectionHandle, *const c_char, *const c_char) -> bool;
type QueryFn = unsafe extern "C" fn(ConnectionHandle, ResultsHandle, *const c_char) -> bool;
type AddIndexFn = unsafe extern "C" fn(
    ConnectionHandle,
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    IndexOptsHandle,
) -> bool;

/// The exports of one front end.
struct Exports {
    new: extern "C" fn() -> ConnectionHandle,
    destroy: extern "C" fn(ConnectionHandle) -> bool,
    connect: NamespaceFn,
    close_namespace: NamespaceFn,
    drop_namespace: NamespaceFn,
    add_index: AddIndexFn,
    drop_index: ModifyFn,
    insert: ModifyFn,
    update: ModifyFn,
    upsert: ModifyFn,
    delete: ModifyFn,
    select: QueryFn,
    update_sql: QueryFn,
    delete_sql: QueryFn,
    results_new: extern "C" fn() -> ResultsHandle,
    results_destroy: extern "C" fn(ResultsHandle) -> bool,
    results_count: extern "C" fn(ResultsHandle) -> i64,
    results_total_count: extern "C" fn(ResultsHandle) -> i64,
    iter: extern "C" fn(ResultsHandle) -> CursorHandle,
    iter_fetch_json: extern "C" fn(CursorHandle) -> *mut c_char,
    iter_destroy: extern "C" fn(CursorHandle) -> bool,
}

static EMBEDDED: Exports = Exports {
    new: re_new,
    destroy: re_destroy,
    connect: re_connect,
    close_namespace: re_close_namespace,
    drop_namespace: re_drop_namespace,
    add_index: re_add_index,
    drop_index: re_drop_index,
    insert: re_insert,
    update: re_update,
    upsert: re_upsert,
    delete: re_delete,
    select: re_select,
    update_sql: re_update_sql,
    delete_sql: re_delete_sql,
    results_new: re_query_results_new,
    results_destroy: re_query_results_destroy,
    results_count: re_query_results_count,
    results_total_count: re_query_results_total_count,
    iter: re_query_results_iter,
    iter_fetch_json: re_query_results_iter_fetch_json,
    iter_destroy: re_query_results_iter_destroy,
};

static REMOTE: Exports = Exports {
    new: re_client_new,
    destroy: re_client_destroy,
    connect: re_client_connect,
    close_namespace: re_client_close_namespace,
    drop_namespace: re_client_drop_namespace,
    add_index: re_client_add_index,
    drop_index: re_client_drop_index,
    insert: re_client_insert,
    update: re_client_update,
    upsert: re_client_upsert,
    delete: re_client_delete,
    select: re_client_select,
    update_sql: re_client_update_sql,
    delete_sql: re_client_delete_sql,
    results_new: re_client_query_results_new,
    results_destroy: re_client_query_results_destroy,
    results_count: re_client_query_results_count,
    results_total_count: re_client_query_results_total_count,
    iter: re_client_query_results_iter,
    iter_fetch_json: re_client_query_results_iter_fetch_json,
    iter_destroy: re_client_query_results_iter_destroy,
};

/// Marker for the embedded front end (`re_*`).
#[derive(Debug)]
pub enum Embedded {}

/// Marker for the remote front end (`re_client_*`).
#[derive(Debug)]
pub enum Remote {}

/// An embedded database connection.
pub type EmbeddedDb = Db<Embedded>;

/// A remote database connection.
pub type RemoteDb = Db<Remote>;

/// Converts a Rust string for a call, recording interior NULs as an
/// invalid argument.
fn c_arg(value: &str) -> Option<CString> {
    match CString::new(value) {
        Ok(arg) => Some(arg),
        Err(_) => {
            set_last_error(&BridgeError::InvalidArgument(format!(
                "string contains a NUL byte: {value:?}"
            )));
            None
        }
    }
}

/// An owned connection handle of front end `F`.
pub struct Db<F> {
    exports: &'static Exports,
    handle: ConnectionHandle,
    _front: PhantomData<F>,
}

impl Db<Embedded> {
    /// Creates an unconnected embedded database.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exports(&EMBEDDED)
    }

    /// Opens or creates a namespace.
    pub fn open_namespace(&self, namespace: &str) -> bool {
        self.with_str(namespace, |db, ns| unsafe { re_open_namespace(db, ns) })
    }
}

impl Default for Db<Embedded> {
    fn default() -> Self {
        Self::new()
    }
}

impl Db<Remote> {
    /// Creates an unconnected client.
    #[must_use]
    pub fn new() -> Self {
        Self::with_exports(&REMOTE)
    }

    /// Opens or creates a namespace on the server, persisted when
    /// `enable_storage` is set.
    pub fn open_namespace(&self, namespace: &str, enable_storage: bool) -> bool {
        self.with_str(namespace, |client, ns| unsafe {
            re_client_open_namespace(client, ns, enable_storage)
        })
    }
}

impl Default for Db<Remote> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> Db<F> {
    fn with_exports(exports: &'static Exports) -> Self {
        Self {
            exports,
            handle: (exports.new)(),
            _front: PhantomData,
        }
    }

    /// The underlying connection handle.
    #[must_use]
    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    /// Connects to `dsn`.
    pub fn connect(&self, dsn: &str) -> bool {
        self.with_str(dsn, |db, dsn| unsafe { (self.exports.connect)(db, dsn) })
    }

    /// Closes a namespace, keeping its data.
    pub fn close_namespace(&self, namespace: &str) -> bool {
        let close = self.exports.close_namespace;
        self.with_str(namespace, |db, ns| unsafe { close(db, ns) })
    }

    /// Closes a namespace and deletes its data.
    pub fn drop_namespace(&self, namespace: &str) -> bool {
        let drop_namespace = self.exports.drop_namespace;
        self.with_str(namespace, |db, ns| unsafe { drop_namespace(db, ns) })
    }

    /// Adds an index. `json_paths` is a comma-separated list; empty means
    /// the field named like the index.
    pub fn add_index(
        &self,
        namespace: &str,
        name: &str,
        json_paths: &str,
        index_type: &str,
        field_type: &str,
        pk: bool,
    ) -> bool {
        let (Some(ns), Some(name), Some(paths), Some(index_type), Some(field_type)) = (
            c_arg(namespace),
            c_arg(name),
            c_arg(json_paths),
            c_arg(index_type),
            c_arg(field_type),
        ) else {
            return false;
        };
        let opts = index_opts_new();
        if pk && !index_opts_pk(opts) {
            index_opts_destroy(opts);
            return false;
        }
        let added = unsafe {
            (self.exports.add_index)(
                self.handle,
                ns.as_ptr(),
                name.as_ptr(),
                paths.as_ptr(),
                index_type.as_ptr(),
                field_type.as_ptr(),
                opts,
            )
        };
        index_opts_destroy(opts);
        added
    }

    /// Drops an index.
    pub fn drop_index(&self, namespace: &str, name: &str) -> bool {
        self.with_pair(self.exports.drop_index, namespace, name)
    }

    /// Inserts a document that must not exist yet.
    pub fn insert(&self, namespace: &str, json: &str) -> bool {
        self.with_pair(self.exports.insert, namespace, json)
    }

    /// Replaces a document that must exist.
    pub fn update(&self, namespace: &str, json: &str) -> bool {
        self.with_pair(self.exports.update, namespace, json)
    }

    /// Inserts or replaces a document.
    pub fn upsert(&self, namespace: &str, json: &str) -> bool {
        self.with_pair(self.exports.upsert, namespace, json)
    }

    /// Deletes the document with the same primary key.
    pub fn delete(&self, namespace: &str, json: &str) -> bool {
        self.with_pair(self.exports.delete, namespace, json)
    }

    /// Runs a statement into a fresh result set.
    pub fn select(&self, sql: &str) -> (Results, bool) {
        self.query(self.exports.select, sql)
    }

    /// Runs an `UPDATE`; the results hold the updated documents.
    pub fn update_sql(&self, sql: &str) -> (Results, bool) {
        self.query(self.exports.update_sql, sql)
    }

    /// Runs a `DELETE`; the results hold the deleted documents.
    pub fn delete_sql(&self, sql: &str) -> (Results, bool) {
        self.query(self.exports.delete_sql, sql)
    }

    fn with_str(
        &self,
        arg: &str,
        call: impl FnOnce(ConnectionHandle, *const c_char) -> bool,
    ) -> bool {
        c_arg(arg).is_some_and(|arg| call(self.handle, arg.as_ptr()))
    }

    fn with_pair(&self, call: ModifyFn, first: &str, second: &str) -> bool {
        match (c_arg(first), c_arg(second)) {
            (Some(first), Some(second)) => unsafe {
                call(self.handle, first.as_ptr(), second.as_ptr())
            },
            _ => false,
        }
    }

    fn query(&self, call: QueryFn, sql: &str) -> (Results, bool) {
        let results = Results {
            exports: self.exports,
            handle: (self.exports.results_new)(),
        };
        let ok = c_arg(sql)
            .is_some_and(|sql| unsafe { call(self.handle, results.handle, sql.as_ptr()) });
        (results, ok)
    }
}

impl<F> Drop for Db<F> {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            (self.exports.destroy)(self.handle);
        }
    }
}

impl<F> std::fmt::Debug for Db<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").field("handle", &self.handle).finish()
    }
}

/// An owned result set.
///
/// Destroying the connection that filled it leaves the set empty: its
/// calls then fail with an invalid handle.
pub struct Results {
    exports: &'static Exports,
    handle: ResultsHandle,
}

impl Results {
    /// The underlying result set handle.
    #[must_use]
    pub fn handle(&self) -> ResultsHandle {
        self.handle
    }

    /// Number of documents held.
    #[must_use]
    pub fn count(&self) -> usize {
        usize::try_from((self.exports.results_count)(self.handle)).unwrap_or(0)
    }

    /// Matches before `LIMIT`/`OFFSET` were applied.
    #[must_use]
    pub fn total_count(&self) -> usize {
        usize::try_from((self.exports.results_total_count)(self.handle)).unwrap_or(0)
    }

    /// Iterates the documents as JSON text.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            exports: self.exports,
            cursor: (self.exports.iter)(self.handle),
            _results: PhantomData,
        }
    }
}

impl Drop for Results {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            (self.exports.results_destroy)(self.handle);
        }
    }
}

impl std::fmt::Debug for Results {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Results").field("handle", &self.handle).finish()
    }
}

impl<'a> IntoIterator for &'a Results {
    type Item = String;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// A cursor over a [`Results`], yielding each document's JSON text.
pub struct Iter<'a> {
    exports: &'static Exports,
    cursor: CursorHandle,
    _results: PhantomData<&'a Results>,
}

impl Iterator for Iter<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.cursor.is_null() {
            return None;
        }
        let json = (self.exports.iter_fetch_json)(self.cursor);
        if json.is_null() {
            return None;
        }
        let text = unsafe { CStr::from_ptr(json) }.to_string_lossy().into_owned();
        unsafe { re_string_free(json) };
        Some(text)
    }
}

impl Drop for Iter<'_> {
    fn drop(&mut self) {
        if !self.cursor.is_null() {
            (self.exports.iter_destroy)(self.cursor);
        }
    }
}

impl std::fmt::Debug for Iter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Iter").field("cursor", &self.cursor).finish()
    }
}
