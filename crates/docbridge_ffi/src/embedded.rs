//! Embedded front end: `re_*` exports over an in-process database.
//!
//! A connection must be connected to a `builtin://path` DSN before
//! namespaces can be opened. Without a path the database lives in memory.

use crate::ops::{self, QueryKind};
use crate::registry::embedded;
use crate::sink::{DiagnosticCallback, DiagnosticSink};
use crate::types::{ConnectionHandle, CursorHandle, IndexOptsHandle, ResultsHandle};
use docbridge_core::{ItemModifyMode, StorageOpts};
use std::ffi::{c_char, c_void};

/// Creates a disconnected embedded database.
///
/// Failures are reported through `tracing`.
///
/// # Returns
///
/// A connection handle, or the null handle on failure.
#[no_mangle]
pub extern "C" fn re_new() -> ConnectionHandle {
    ops::new_connection(embedded(), "re_new", DiagnosticSink::Tracing)
}

/// Creates a disconnected embedded database that reports failures to
/// `callback`.
///
/// # Arguments
///
/// * `callback` - Receives every failure on this connection; null means
///   `tracing`
/// * `user_data` - Passed back to `callback` unchanged
///
/// # Safety
///
/// `callback` may be invoked from any thread that uses the connection, for
/// as long as the connection lives. `user_data` must stay valid as long.
#[no_mangle]
pub unsafe extern "C" fn re_new_with_sink(
    callback: DiagnosticCallback,
    user_data: *mut c_void,
) -> ConnectionHandle {
    let sink = DiagnosticSink::from_callback(callback, user_data);
    ops::new_connection(embedded(), "re_new_with_sink", sink)
}

/// Destroys a connection and every result set it populated.
#[no_mangle]
pub extern "C" fn re_destroy(db: ConnectionHandle) -> bool {
    ops::destroy_connection(embedded(), "re_destroy", db)
}

/// Connects to `builtin://path`.
///
/// # Safety
///
/// `dsn` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_connect(db: ConnectionHandle, dsn: *const c_char) -> bool {
    ops::connect(embedded(), "re_connect", db, dsn)
}

/// Opens a namespace with persistent storage, creating it if missing.
///
/// # Safety
///
/// `namespace` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_open_namespace(db: ConnectionHandle, namespace: *const c_char) -> bool {
    ops::open_namespace(embedded(), "re_open_namespace", db, namespace, StorageOpts::default())
}

/// Closes a namespace. Its data stays on disk.
///
/// # Safety
///
/// `namespace` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_close_namespace(db: ConnectionHandle, namespace: *const c_char) -> bool {
    ops::close_namespace(embedded(), "re_close_namespace", db, namespace)
}

/// Closes a namespace and deletes its data.
///
/// # Safety
///
/// `namespace` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_drop_namespace(db: ConnectionHandle, namespace: *const c_char) -> bool {
    ops::drop_namespace(embedded(), "re_drop_namespace", db, namespace)
}

/// Adds an index.
///
/// # Arguments
///
/// * `json_paths` - Comma-separated document paths. Several paths build a
///   composite index; empty or null indexes the field called `name`
/// * `index_type` - `hash`, `tree` or `-`
/// * `field_type` - `int`, `int64`, `double`, `string`, `bool` or `composite`
/// * `opts` - Options from [`crate::index_opts_new`]; null means defaults
///
/// # Safety
///
/// Every string except `json_paths` must be a valid NUL-terminated string;
/// `json_paths` may also be null.
#[no_mangle]
pub unsafe extern "C" fn re_add_index(
    db: ConnectionHandle,
    namespace: *const c_char,
    name: *const c_char,
    json_paths: *const c_char,
    index_type: *const c_char,
    field_type: *const c_char,
    opts: IndexOptsHandle,
) -> bool {
    ops::add_index(
        embedded(),
        "re_add_index",
        db,
        namespace,
        name,
        json_paths,
        index_type,
        field_type,
        opts,
    )
}

/// Adds an index described as JSON.
///
/// # Safety
///
/// `namespace` and `json` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn re_add_index_from_json(
    db: ConnectionHandle,
    namespace: *const c_char,
    json: *const c_char,
) -> bool {
    ops::add_index_from_json(embedded(), "re_add_index_from_json", db, namespace, json)
}

/// Drops an index.
///
/// # Safety
///
/// `namespace` and `name` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn re_drop_index(
    db: ConnectionHandle,
    namespace: *const c_char,
    name: *const c_char,
) -> bool {
    ops::drop_index(embedded(), "re_drop_index", db, namespace, name)
}

/// Inserts a document. Fails if its primary key exists.
///
/// # Safety
///
/// `namespace` and `json` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn re_insert(
    db: ConnectionHandle,
    namespace: *const c_char,
    json: *const c_char,
) -> bool {
    ops::modify(embedded(), "re_insert", db, namespace, json, ItemModifyMode::Insert)
}

/// Replaces a document. Fails if its primary key is missing.
///
/// # Safety
///
/// `namespace` and `json` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn re_update(
    db: ConnectionHandle,
    namespace: *const c_char,
    json: *const c_char,
) -> bool {
    ops::modify(embedded(), "re_update", db, namespace, json, ItemModifyMode::Update)
}

/// Inserts or replaces a document.
///
/// # Safety
///
/// `namespace` and `json` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn re_upsert(
    db: ConnectionHandle,
    namespace: *const c_char,
    json: *const c_char,
) -> bool {
    ops::modify(embedded(), "re_upsert", db, namespace, json, ItemModifyMode::Upsert)
}

/// Deletes the document with the primary key of `json`.
///
/// # Safety
///
/// `namespace` and `json` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn re_delete(
    db: ConnectionHandle,
    namespace: *const c_char,
    json: *const c_char,
) -> bool {
    ops::modify(embedded(), "re_delete", db, namespace, json, ItemModifyMode::Delete)
}

/// Runs a `SELECT` into `results`, replacing its contents.
///
/// On failure `results` keeps what it held before.
///
/// # Safety
///
/// `sql` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_select(
    db: ConnectionHandle,
    results: ResultsHandle,
    sql: *const c_char,
) -> bool {
    ops::query(embedded(), "re_select", db, results, sql, QueryKind::Select)
}

/// Runs an `UPDATE`; `results` receives the updated documents.
///
/// # Safety
///
/// `sql` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_update_sql(
    db: ConnectionHandle,
    results: ResultsHandle,
    sql: *const c_char,
) -> bool {
    ops::query(embedded(), "re_update_sql", db, results, sql, QueryKind::Update)
}

/// Runs a `DELETE`; `results` receives the deleted documents.
///
/// # Safety
///
/// `sql` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_delete_sql(
    db: ConnectionHandle,
    results: ResultsHandle,
    sql: *const c_char,
) -> bool {
    ops::query(embedded(), "re_delete_sql", db, results, sql, QueryKind::Delete)
}

/// Creates an empty result set.
#[no_mangle]
pub extern "C" fn re_query_results_new() -> ResultsHandle {
    ops::results_new(embedded(), "re_query_results_new")
}

/// Destroys a result set and its cursors.
#[no_mangle]
pub extern "C" fn re_query_results_destroy(results: ResultsHandle) -> bool {
    ops::results_destroy(embedded(), "re_query_results_destroy", results)
}

/// Number of documents in the result set, or -1 on error.
#[no_mangle]
pub extern "C" fn re_query_results_count(results: ResultsHandle) -> i64 {
    ops::results_count(embedded(), "re_query_results_count", results)
}

/// Number of matches ignoring `LIMIT`/`OFFSET`, or -1 on error.
#[no_mangle]
pub extern "C" fn re_query_results_total_count(results: ResultsHandle) -> i64 {
    ops::results_total_count(embedded(), "re_query_results_total_count", results)
}

/// Opens a cursor on the current contents of a result set.
#[no_mangle]
pub extern "C" fn re_query_results_iter(results: ResultsHandle) -> CursorHandle {
    ops::iter_new(embedded(), "re_query_results_iter", results)
}

/// Advances a cursor.
///
/// The first call positions the cursor on the first document without
/// skipping it.
///
/// # Returns
///
/// `true` if the cursor is on a usable document, `false` once exhausted
/// or when the current document failed to decode.
#[no_mangle]
pub extern "C" fn re_query_results_iter_next(cursor: CursorHandle) -> bool {
    ops::iter_next(embedded(), "re_query_results_iter_next", cursor)
}

/// JSON of the current document. Release with [`crate::re_string_free`].
///
/// Returns null before the first `next`, after exhaustion or on error.
#[no_mangle]
pub extern "C" fn re_query_results_iter_get_json(cursor: CursorHandle) -> *mut c_char {
    ops::iter_get_json(embedded(), "re_query_results_iter_get_json", cursor)
}

/// Advances and returns the JSON of the new document.
///
/// Returns null without setting an error once the cursor is exhausted.
#[no_mangle]
pub extern "C" fn re_query_results_iter_fetch_json(cursor: CursorHandle) -> *mut c_char {
    ops::iter_fetch_json(embedded(), "re_query_results_iter_fetch_json", cursor)
}

/// Destroys a cursor.
#[no_mangle]
pub extern "C" fn re_query_results_iter_destroy(cursor: CursorHandle) -> bool {
    ops::iter_destroy(embedded(), "re_query_results_iter_destroy", cursor)
}
