//! Remote front end: `re_client_*` exports over a network client.
//!
//! Handles of this front end live in their own table; passing an embedded
//! handle here is reported as an invalid handle.

use crate::ops::{self, QueryKind};
use crate::registry::remote;
use crate::sink::{DiagnosticCallback, DiagnosticSink};
use crate::types::{ConnectionHandle, CursorHandle, IndexOptsHandle, ResultsHandle};
use docbridge_core::{ItemModifyMode, StorageOpts};
use std::ffi::{c_char, c_void};

/// Creates a disconnected remote client.
#[no_mangle]
pub extern "C" fn re_client_new() -> ConnectionHandle {
    ops::new_connection(remote(), "re_client_new", DiagnosticSink::Tracing)
}

/// Creates a disconnected remote client that reports failures to
/// `callback`. A null callback means `tracing`.
///
/// # Safety
///
/// `callback` may be invoked from any thread that uses the client, for as
/// long as the client lives. `user_data` must stay valid as long.
#[no_mangle]
pub unsafe extern "C" fn re_client_new_with_sink(
    callback: DiagnosticCallback,
    user_data: *mut c_void,
) -> ConnectionHandle {
    let sink = DiagnosticSink::from_callback(callback, user_data);
    ops::new_connection(remote(), "re_client_new_with_sink", sink)
}

/// Closes the session and destroys the client.
#[no_mangle]
pub extern "C" fn re_client_destroy(client: ConnectionHandle) -> bool {
    ops::destroy_connection(remote(), "re_client_destroy", client)
}

/// Connects to `cproto://host:port/database` and logs in.
///
/// # Safety
///
/// `dsn` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_client_connect(client: ConnectionHandle, dsn: *const c_char) -> bool {
    ops::connect(remote(), "re_client_connect", client, dsn)
}

/// Opens a namespace on the server, creating it if missing.
///
/// # Arguments
///
/// * `enable_storage` - Persist the namespace on the server's disk
///
/// # Safety
///
/// `namespace` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_client_open_namespace(
    client: ConnectionHandle,
    namespace: *const c_char,
    enable_storage: bool,
) -> bool {
    let storage = StorageOpts::new().enabled(enable_storage);
    ops::open_namespace(remote(), "re_client_open_namespace", client, namespace, storage)
}

/// Closes a namespace on the server.
///
/// # Safety
///
/// `namespace` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_client_close_namespace(
    client: ConnectionHandle,
    namespace: *const c_char,
) -> bool {
    ops::close_namespace(remote(), "re_client_close_namespace", client, namespace)
}

/// Drops a namespace on the server.
///
/// # Safety
///
/// `namespace` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_client_drop_namespace(
    client: ConnectionHandle,
    namespace: *const c_char,
) -> bool {
    ops::drop_namespace(remote(), "re_client_drop_namespace", client, namespace)
}

/// Adds an index on the server. Arguments as for [`crate::re_add_index`].
///
/// # Safety
///
/// Every string except `json_paths` must be a valid NUL-terminated string;
/// `json_paths` may also be null.
#[no_mangle]
pub unsafe extern "C" fn re_client_add_index(
    client: ConnectionHandle,
    namespace: *const c_char,
    name: *const c_char,
    json_paths: *const c_char,
    index_type: *const c_char,
    field_type: *const c_char,
    opts: IndexOptsHandle,
) -> bool {
    ops::add_index(
        remote(),
        "re_client_add_index",
        client,
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
pub unsafe extern "C" fn re_client_add_index_from_json(
    client: ConnectionHandle,
    namespace: *const c_char,
    json: *const c_char,
) -> bool {
    ops::add_index_from_json(remote(), "re_client_add_index_from_json", client, namespace, json)
}

/// Drops an index on the server.
///
/// # Safety
///
/// `namespace` and `name` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn re_client_drop_index(
    client: ConnectionHandle,
    namespace: *const c_char,
    name: *const c_char,
) -> bool {
    ops::drop_index(remote(), "re_client_drop_index", client, namespace, name)
}

/// Inserts a document.
///
/// # Safety
///
/// `namespace` and `json` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn re_client_insert(
    client: ConnectionHandle,
    namespace: *const c_char,
    json: *const c_char,
) -> bool {
    ops::modify(remote(), "re_client_insert", client, namespace, json, ItemModifyMode::Insert)
}

/// Replaces a document.
///
/// # Safety
///
/// `namespace` and `json` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn re_client_update(
    client: ConnectionHandle,
    namespace: *const c_char,
    json: *const c_char,
) -> bool {
    ops::modify(remote(), "re_client_update", client, namespace, json, ItemModifyMode::Update)
}

/// Inserts or replaces a document.
///
/// # Safety
///
/// `namespace` and `json` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn re_client_upsert(
    client: ConnectionHandle,
    namespace: *const c_char,
    json: *const c_char,
) -> bool {
    ops::modify(remote(), "re_client_upsert", client, namespace, json, ItemModifyMode::Upsert)
}

/// Deletes a document by primary key.
///
/// # Safety
///
/// `namespace` and `json` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn re_client_delete(
    client: ConnectionHandle,
    namespace: *const c_char,
    json: *const c_char,
) -> bool {
    ops::modify(remote(), "re_client_delete", client, namespace, json, ItemModifyMode::Delete)
}

/// Executes any statement on the server into `results`.
///
/// # Safety
///
/// `sql` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_client_select(
    client: ConnectionHandle,
    results: ResultsHandle,
    sql: *const c_char,
) -> bool {
    ops::query(remote(), "re_client_select", client, results, sql, QueryKind::Select)
}

/// Runs an `UPDATE` on the server. Other statements are refused before
/// anything is sent.
///
/// # Safety
///
/// `sql` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_client_update_sql(
    client: ConnectionHandle,
    results: ResultsHandle,
    sql: *const c_char,
) -> bool {
    ops::query(remote(), "re_client_update_sql", client, results, sql, QueryKind::Update)
}

/// Runs a `DELETE` on the server. Other statements are refused before
/// anything is sent.
///
/// # Safety
///
/// `sql` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn re_client_delete_sql(
    client: ConnectionHandle,
    results: ResultsHandle,
    sql: *const c_char,
) -> bool {
    ops::query(remote(), "re_client_delete_sql", client, results, sql, QueryKind::Delete)
}

/// Creates an empty result set for remote queries.
#[no_mangle]
pub extern "C" fn re_client_query_results_new() -> ResultsHandle {
    ops::results_new(remote(), "re_client_query_results_new")
}

/// Destroys a result set and its cursors.
#[no_mangle]
pub extern "C" fn re_client_query_results_destroy(results: ResultsHandle) -> bool {
    ops::results_destroy(remote(), "re_client_query_results_destroy", results)
}

/// Number of documents, or -1 on error.
#[no_mangle]
pub extern "C" fn re_client_query_results_count(results: ResultsHandle) -> i64 {
    ops::results_count(remote(), "re_client_query_results_count", results)
}

/// Number of matches ignoring `LIMIT`/`OFFSET`, or -1 on error.
#[no_mangle]
pub extern "C" fn re_client_query_results_total_count(results: ResultsHandle) -> i64 {
    ops::results_total_count(remote(), "re_client_query_results_total_count", results)
}

/// Opens a cursor on the current contents of a result set.
#[no_mangle]
pub extern "C" fn re_client_query_results_iter(results: ResultsHandle) -> CursorHandle {
    ops::iter_new(remote(), "re_client_query_results_iter", results)
}

/// Same protocol as [`crate::re_query_results_iter_next`].
#[no_mangle]
pub extern "C" fn re_client_query_results_iter_next(cursor: CursorHandle) -> bool {
    ops::iter_next(remote(), "re_client_query_results_iter_next", cursor)
}

/// JSON of the current document, or null.
#[no_mangle]
pub extern "C" fn re_client_query_results_iter_get_json(cursor: CursorHandle) -> *mut c_char {
    ops::iter_get_json(remote(), "re_client_query_results_iter_get_json", cursor)
}

/// Advances and returns the JSON of the new document; null once exhausted.
#[no_mangle]
pub extern "C" fn re_client_query_results_iter_fetch_json(cursor: CursorHandle) -> *mut c_char {
    ops::iter_fetch_json(remote(), "re_client_query_results_iter_fetch_json", cursor)
}

/// Destroys a cursor.
#[no_mangle]
pub extern "C" fn re_client_query_results_iter_destroy(cursor: CursorHandle) -> bool {
    ops::iter_destroy(remote(), "re_client_query_results_iter_destroy", cursor)
}
