//! Operations shared by both front ends.
//!
//! Each export is a thin wrapper that picks its handle table and calls one
//! of these. Every call runs under [`guard`]: the last error is cleared on
//! entry, panics are caught, and failures are recorded for the thread and
//! reported to the connection's diagnostic sink.
//!
//! The table lock is never held while the engine works, so a slow remote
//! round trip does not block handle operations on other threads.

use crate::buffer::{into_c_string, optional_str_arg, str_arg};
use crate::cursor::Cursor;
use crate::engine::Engine;
use crate::error::{clear_last_error, set_last_error, BridgeError, BridgeResult};
use crate::index_opts;
use crate::registry::Registry;
use crate::sink::DiagnosticSink;
use crate::types::{ConnectionHandle, CursorHandle, IndexOptsHandle, ResultsHandle};
use docbridge_core::{FieldType, IndexDef, IndexType, ItemModifyMode, QueryResults, StorageOpts};
use parking_lot::Mutex;
use std::any::Any;
use std::ffi::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

type Table<E> = &'static Mutex<Registry<E>>;

static DEFAULT_SINK: DiagnosticSink = DiagnosticSink::Tracing;

/// Runs `f` at the boundary, returning `default` on failure.
pub(crate) fn guard<T>(
    operation: &str,
    sink: Option<&DiagnosticSink>,
    default: T,
    f: impl FnOnce() -> BridgeResult<T>,
) -> T {
    clear_last_error();
    let outcome = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome,
        Err(payload) => Err(BridgeError::Panic(panic_message(payload.as_ref()))),
    };
    match outcome {
        Ok(value) => value,
        Err(error) => {
            set_last_error(&error);
            sink.unwrap_or(&DEFAULT_SINK).report(operation, &error);
            default
        }
    }
}

/// [`guard`] for calls that only report success.
pub(crate) fn guard_bool(
    operation: &str,
    sink: Option<&DiagnosticSink>,
    f: impl FnOnce() -> BridgeResult<()>,
) -> bool {
    guard(operation, sink, false, || f().map(|()| true))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Runs `f` against a connection's engine under its sink.
fn with_engine<E: Engine>(
    table: Table<E>,
    operation: &str,
    handle: ConnectionHandle,
    f: impl FnOnce(&E) -> BridgeResult<()>,
) -> bool {
    let entry = table.lock().connection(handle);
    match entry {
        Ok(entry) => guard_bool(operation, Some(&*entry.sink), || f(&*entry.engine)),
        Err(e) => guard_bool(operation, None, || Err(e)),
    }
}

pub(crate) fn new_connection<E: Engine>(
    table: Table<E>,
    operation: &str,
    sink: DiagnosticSink,
) -> ConnectionHandle {
    guard(operation, None, ConnectionHandle::NULL, || {
        let handle = table.lock().insert_connection(E::create(), sink);
        tracing::debug!(handle = handle.0, "connection created");
        Ok(handle)
    })
}

pub(crate) fn destroy_connection<E: Engine>(
    table: Table<E>,
    operation: &str,
    handle: ConnectionHandle,
) -> bool {
    guard_bool(operation, None, || table.lock().remove_connection(handle))
}

/// # Safety
///
/// `dsn` must be null or a valid NUL-terminated string.
pub(crate) unsafe fn connect<E: Engine>(
    table: Table<E>,
    operation: &str,
    handle: ConnectionHandle,
    dsn: *const c_char,
) -> bool {
    with_engine(table, operation, handle, |engine| {
        engine.connect(str_arg(dsn, "dsn")?)
    })
}

/// # Safety
///
/// `namespace` must be null or a valid NUL-terminated string.
pub(crate) unsafe fn open_namespace<E: Engine>(
    table: Table<E>,
    operation: &str,
    handle: ConnectionHandle,
    namespace: *const c_char,
    storage: StorageOpts,
) -> bool {
    with_engine(table, operation, handle, |engine| {
        engine.open_namespace(str_arg(namespace, "namespace")?, storage)
    })
}

/// # Safety
///
/// `namespace` must be null or a valid NUL-terminated string.
pub(crate) unsafe fn close_namespace<E: Engine>(
    table: Table<E>,
    operation: &str,
    handle: ConnectionHandle,
    namespace: *const c_char,
) -> bool {
    with_engine(table, operation, handle, |engine| {
        engine.close_namespace(str_arg(namespace, "namespace")?)
    })
}

/// # Safety
///
/// `namespace` must be null or a valid NUL-terminated string.
pub(crate) unsafe fn drop_namespace<E: Engine>(
    table: Table<E>,
    operation: &str,
    handle: ConnectionHandle,
    namespace: *const c_char,
) -> bool {
    with_engine(table, operation, handle, |engine| {
        engine.drop_namespace(str_arg(namespace, "namespace")?)
    })
}

/// Builds the definition for an add-index call.
///
/// A non-empty comma-separated path list gives a multi-path definition;
/// an empty one indexes the field named like the index.
pub(crate) fn index_def(
    name: &str,
    json_paths: &str,
    index_type: &str,
    field_type: &str,
    opts: IndexOptsHandle,
) -> BridgeResult<IndexDef> {
    let paths: Vec<String> = json_paths
        .split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(str::to_owned)
        .collect();
    let index_type: IndexType = index_type.parse()?;
    let field_type: FieldType = field_type.parse()?;
    let opts = index_opts::resolve(opts)?;

    Ok(if paths.is_empty() {
        IndexDef::new(name, index_type, field_type, opts)
    } else {
        IndexDef::with_json_paths(name, paths, index_type, field_type, opts)
    })
}

/// # Safety
///
/// Every string must be null or a valid NUL-terminated string. A null
/// `json_paths` reads as empty.
#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn add_index<E: Engine>(
    table: Table<E>,
    operation: &str,
    handle: ConnectionHandle,
    namespace: *const c_char,
    name: *const c_char,
    json_paths: *const c_char,
    index_type: *const c_char,
    field_type: *const c_char,
    opts: IndexOptsHandle,
) -> bool {
    with_engine(table, operation, handle, |engine| {
        let def = index_def(
            str_arg(name, "name")?,
            optional_str_arg(json_paths, "json_paths")?,
            str_arg(index_type, "index_type")?,
            str_arg(field_type, "field_type")?,
            opts,
        )?;
        engine.add_index(str_arg(namespace, "namespace")?, def)
    })
}

/// # Safety
///
/// `namespace` and `json` must be null or valid NUL-terminated strings.
pub(crate) unsafe fn add_index_from_json<E: Engine>(
    table: Table<E>,
    operation: &str,
    handle: ConnectionHandle,
    namespace: *const c_char,
    json: *const c_char,
) -> bool {
    with_engine(table, operation, handle, |engine| {
        let namespace = str_arg(namespace, "namespace")?;
        let def = IndexDef::from_json(str_arg(json, "json")?)?;
        engine.add_index(namespace, def)
    })
}

/// # Safety
///
/// `namespace` and `name` must be null or valid NUL-terminated strings.
pub(crate) unsafe fn drop_index<E: Engine>(
    table: Table<E>,
    operation: &str,
    handle: ConnectionHandle,
    namespace: *const c_char,
    name: *const c_char,
) -> bool {
    with_engine(table, operation, handle, |engine| {
        engine.drop_index(str_arg(namespace, "namespace")?, str_arg(name, "name")?)
    })
}

/// # Safety
///
/// `namespace` and `json` must be null or valid NUL-terminated strings.
pub(crate) unsafe fn modify<E: Engine>(
    table: Table<E>,
    operation: &str,
    handle: ConnectionHandle,
    namespace: *const c_char,
    json: *const c_char,
    mode: ItemModifyMode,
) -> bool {
    with_engine(table, operation, handle, |engine| {
        engine.modify(str_arg(namespace, "namespace")?, str_arg(json, "json")?, mode)
    })
}

/// Statement kinds a query export accepts.
#[derive(Debug, Clone, Copy)]
pub(crate) enum QueryKind {
    Select,
    Update,
    Delete,
}

/// Runs a statement into a result set.
///
/// The result set keeps its old contents when the statement fails.
///
/// # Safety
///
/// `sql` must be null or a valid NUL-terminated string.
pub(crate) unsafe fn query<E: Engine>(
    table: Table<E>,
    operation: &str,
    handle: ConnectionHandle,
    results: ResultsHandle,
    sql: *const c_char,
    kind: QueryKind,
) -> bool {
    let lookup = {
        let registry = table.lock();
        registry
            .connection(handle)
            .and_then(|entry| registry.results(results).map(|_| entry))
    };
    let entry = match lookup {
        Ok(entry) => entry,
        Err(e) => return guard_bool(operation, None, || Err(e)),
    };

    guard_bool(operation, Some(&*entry.sink), || {
        let sql = str_arg(sql, "sql")?;
        let produced = match kind {
            QueryKind::Select => entry.engine.select(sql)?,
            QueryKind::Update => entry.engine.update_sql(sql)?,
            QueryKind::Delete => entry.engine.delete_sql(sql)?,
        };
        table.lock().populate(results, handle, produced)
    })
}

pub(crate) fn results_new<E: Engine>(table: Table<E>, operation: &str) -> ResultsHandle {
    guard(operation, None, ResultsHandle::NULL, || {
        Ok(table.lock().insert_results())
    })
}

pub(crate) fn results_destroy<E: Engine>(
    table: Table<E>,
    operation: &str,
    results: ResultsHandle,
) -> bool {
    let sink = table.lock().results_sink(results);
    guard_bool(operation, sink.as_deref(), || table.lock().remove_results(results))
}

fn results_read<E: Engine>(
    table: Table<E>,
    operation: &str,
    results: ResultsHandle,
    f: impl FnOnce(&QueryResults) -> usize,
) -> i64 {
    let (lookup, sink) = {
        let registry = table.lock();
        (registry.results(results), registry.results_sink(results))
    };
    guard(operation, sink.as_deref(), -1, || {
        let results: Arc<QueryResults> = lookup?;
        Ok(i64::try_from(f(&*results)).unwrap_or(i64::MAX))
    })
}

pub(crate) fn results_count<E: Engine>(
    table: Table<E>,
    operation: &str,
    results: ResultsHandle,
) -> i64 {
    results_read(table, operation, results, QueryResults::count)
}

pub(crate) fn results_total_count<E: Engine>(
    table: Table<E>,
    operation: &str,
    results: ResultsHandle,
) -> i64 {
    results_read(table, operation, results, QueryResults::total_count)
}

pub(crate) fn iter_new<E: Engine>(
    table: Table<E>,
    operation: &str,
    results: ResultsHandle,
) -> CursorHandle {
    let sink = table.lock().results_sink(results);
    guard(operation, sink.as_deref(), CursorHandle::NULL, || {
        table.lock().insert_cursor(results)
    })
}

fn with_cursor<E: Engine, T>(
    table: Table<E>,
    operation: &str,
    cursor: CursorHandle,
    default: T,
    f: impl FnOnce(&mut Cursor) -> BridgeResult<T>,
) -> T {
    let sink = table.lock().cursor_sink(cursor);
    guard(operation, sink.as_deref(), default, || {
        let mut registry = table.lock();
        f(registry.cursor_mut(cursor)?)
    })
}

pub(crate) fn iter_next<E: Engine>(table: Table<E>, operation: &str, cursor: CursorHandle) -> bool {
    with_cursor(table, operation, cursor, false, |cursor| Ok(cursor.next()))
}

pub(crate) fn iter_get_json<E: Engine>(
    table: Table<E>,
    operation: &str,
    cursor: CursorHandle,
) -> *mut c_char {
    with_cursor(table, operation, cursor, std::ptr::null_mut(), |cursor| {
        into_c_string(cursor.get_json()?)
    })
}

pub(crate) fn iter_fetch_json<E: Engine>(
    table: Table<E>,
    operation: &str,
    cursor: CursorHandle,
) -> *mut c_char {
    with_cursor(table, operation, cursor, std::ptr::null_mut(), |cursor| {
        match cursor.fetch_json()? {
            Some(json) => into_c_string(json),
            None => Ok(std::ptr::null_mut()),
        }
    })
}

pub(crate) fn iter_destroy<E: Engine>(
    table: Table<E>,
    operation: &str,
    cursor: CursorHandle,
) -> bool {
    let sink = table.lock().cursor_sink(cursor);
    guard_bool(operation, sink.as_deref(), || table.lock().remove_cursor(cursor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{re_last_error_code, ReErrorCode};

    #[test]
    fn panics_are_caught() {
        let value = guard("test_panic", None, 7, || -> BridgeResult<i32> {
            panic!("boom");
        });
        assert_eq!(value, 7);
        assert_eq!(re_last_error_code(), ReErrorCode::Internal);
    }

    #[test]
    fn success_clears_previous_error() {
        guard_bool("fails", None, || Err(BridgeError::InvalidArgument("x".into())));
        assert_eq!(re_last_error_code(), ReErrorCode::InvalidArgument);
        assert!(guard_bool("succeeds", None, || Ok(())));
        assert_eq!(re_last_error_code(), ReErrorCode::Ok);
    }

    #[test]
    fn index_def_from_paths() {
        let composite = index_def("a+b", "a, b", "tree", "composite", IndexOptsHandle::NULL).unwrap();
        assert_eq!(composite.json_paths, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(composite.field_type, FieldType::Composite);

        let single = index_def("name", "", "hash", "string", IndexOptsHandle::NULL).unwrap();
        assert_eq!(single.json_paths, vec!["name".to_string()]);

        let err = index_def("x", "", "btree", "int", IndexOptsHandle::NULL).unwrap_err();
        assert_eq!(err.code(), ReErrorCode::Schema);
    }
}
