//! Embedded front end driven through the exported C functions.

use docbridge_ffi::*;
use proptest::prelude::*;
use serde_json::Value;
use std::ffi::{c_char, c_void, CStr, CString};
use std::sync::Mutex;

fn c(s: &str) -> CString {
    CString::new(s).unwrap()
}

fn take_json(ptr: *mut c_char) -> Option<Value> {
    if ptr.is_null() {
        return None;
    }
    let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_owned();
    unsafe { re_string_free(ptr) };
    Some(serde_json::from_str(&text).unwrap())
}

/// A connected in-memory database with namespace `items` keyed by `id`.
fn items_db() -> ConnectionHandle {
    let db = re_new();
    assert!(!db.is_null());
    unsafe {
        assert!(re_connect(db, c("builtin://").as_ptr()));
        assert!(re_open_namespace(db, c("items").as_ptr()));
        let opts = index_opts_new();
        assert!(index_opts_pk(opts));
        assert!(re_add_index(
            db,
            c("items").as_ptr(),
            c("id").as_ptr(),
            c("").as_ptr(),
            c("hash").as_ptr(),
            c("int").as_ptr(),
            opts,
        ));
        assert!(index_opts_destroy(opts));
    }
    db
}

fn insert(db: ConnectionHandle, json: &str) -> bool {
    unsafe { re_insert(db, c("items").as_ptr(), c(json).as_ptr()) }
}

fn select(db: ConnectionHandle, results: ResultsHandle, sql: &str) -> bool {
    unsafe { re_select(db, results, c(sql).as_ptr()) }
}

fn collect(results: ResultsHandle) -> Vec<Value> {
    let cursor = re_query_results_iter(results);
    assert!(!cursor.is_null());
    let mut docs = Vec::new();
    while re_query_results_iter_next(cursor) {
        docs.push(take_json(re_query_results_iter_get_json(cursor)).unwrap());
    }
    assert!(re_query_results_iter_destroy(cursor));
    docs
}

#[test]
fn insert_upsert_select_scenario() {
    let db = items_db();
    assert!(insert(db, r#"{"id":1,"name":"a"}"#));
    assert!(unsafe { re_upsert(db, c("items").as_ptr(), c(r#"{"id":1,"name":"b"}"#).as_ptr()) });

    let results = re_query_results_new();
    assert!(select(db, results, "select * from items"));
    assert_eq!(re_query_results_count(results), 1);

    let docs = collect(results);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["name"], "b");

    assert!(re_query_results_destroy(results));
    assert!(re_destroy(db));
}

#[test]
fn malformed_json_fails_every_verb_without_effect() {
    let db = items_db();
    assert!(insert(db, r#"{"id":1,"name":"a"}"#));

    type Verb = unsafe extern "C" fn(ConnectionHandle, *const c_char, *const c_char) -> bool;
    let verbs: [Verb; 4] = [re_insert, re_update, re_upsert, re_delete];
    for verb in verbs {
        let ok = unsafe { verb(db, c("items").as_ptr(), c(r#"{"id":1,"name":"#).as_ptr()) };
        assert!(!ok);
        assert_eq!(re_last_error_code(), ReErrorCode::Payload);
        assert!(!re_last_error_message().is_null());
    }

    let results = re_query_results_new();
    assert!(select(db, results, "SELECT * FROM items"));
    let docs = collect(results);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["name"], "a");
    re_destroy(db);
}

#[test]
fn mutation_verbs_follow_primary_key_rules() {
    let db = items_db();
    assert!(insert(db, r#"{"id":1}"#));
    assert!(!insert(db, r#"{"id":1}"#));
    assert_eq!(re_last_error_code(), ReErrorCode::Payload);

    assert!(!unsafe { re_update(db, c("items").as_ptr(), c(r#"{"id":2}"#).as_ptr()) });
    assert!(unsafe { re_update(db, c("items").as_ptr(), c(r#"{"id":1,"v":2}"#).as_ptr()) });
    assert!(unsafe { re_delete(db, c("items").as_ptr(), c(r#"{"id":1}"#).as_ptr()) });

    let results = re_query_results_new();
    assert!(select(db, results, "SELECT * FROM items"));
    assert_eq!(re_query_results_count(results), 0);
    re_destroy(db);
}

#[test]
fn cursor_protocol_misuse_is_reported() {
    let db = items_db();
    insert(db, r#"{"id":1}"#);
    let results = re_query_results_new();
    assert!(select(db, results, "SELECT * FROM items"));

    let cursor = re_query_results_iter(results);
    assert!(re_query_results_iter_get_json(cursor).is_null());
    assert_eq!(re_last_error_code(), ReErrorCode::ProtocolMisuse);

    assert!(re_query_results_iter_next(cursor));
    assert!(take_json(re_query_results_iter_get_json(cursor)).is_some());
    assert_eq!(re_last_error_code(), ReErrorCode::Ok);

    assert!(!re_query_results_iter_next(cursor));
    assert!(!re_query_results_iter_next(cursor));
    assert!(re_query_results_iter_get_json(cursor).is_null());
    assert_eq!(re_last_error_code(), ReErrorCode::ProtocolMisuse);
    re_destroy(db);
}

#[test]
fn fetch_json_walks_results_in_order() {
    let db = items_db();
    for id in 0..4 {
        assert!(insert(db, &format!(r#"{{"id":{id}}}"#)));
    }
    let results = re_query_results_new();
    assert!(select(db, results, "SELECT * FROM items ORDER BY id"));

    let cursor = re_query_results_iter(results);
    let mut ids = Vec::new();
    while let Some(doc) = take_json(re_query_results_iter_fetch_json(cursor)) {
        ids.push(doc["id"].as_i64().unwrap());
    }
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert_eq!(re_last_error_code(), ReErrorCode::Ok);
    re_destroy(db);
}

#[test]
fn parent_destruction_invalidates_children() {
    let db = items_db();
    insert(db, r#"{"id":1}"#);

    let results = re_query_results_new();
    assert!(select(db, results, "SELECT * FROM items"));
    let cursor = re_query_results_iter(results);
    assert!(re_query_results_destroy(results));
    assert!(!re_query_results_iter_next(cursor));
    assert_eq!(re_last_error_code(), ReErrorCode::InvalidHandle);
    assert!(!re_query_results_destroy(results));
    assert_eq!(re_last_error_code(), ReErrorCode::InvalidHandle);

    let populated = re_query_results_new();
    let untouched = re_query_results_new();
    assert!(select(db, populated, "SELECT * FROM items"));
    let cursor = re_query_results_iter(populated);
    assert!(re_destroy(db));

    assert_eq!(re_query_results_count(populated), -1);
    assert_eq!(re_last_error_code(), ReErrorCode::InvalidHandle);
    assert!(!re_query_results_iter_next(cursor));
    assert_eq!(re_query_results_count(untouched), 0);
    assert!(!insert(db, r#"{"id":2}"#));
    assert_eq!(re_last_error_code(), ReErrorCode::InvalidHandle);
    re_query_results_destroy(untouched);
}

#[test]
fn repopulating_invalidates_old_cursors() {
    let db = items_db();
    insert(db, r#"{"id":1}"#);
    let results = re_query_results_new();
    assert!(select(db, results, "SELECT * FROM items"));
    let stale = re_query_results_iter(results);

    assert!(select(db, results, "SELECT * FROM items"));
    assert!(!re_query_results_iter_next(stale));
    assert_eq!(re_last_error_code(), ReErrorCode::InvalidHandle);
    assert_eq!(collect(results).len(), 1);
    re_destroy(db);
}

#[test]
fn failed_query_keeps_previous_contents() {
    let db = items_db();
    insert(db, r#"{"id":1}"#);
    let results = re_query_results_new();
    assert!(select(db, results, "SELECT * FROM items"));

    assert!(!select(db, results, "SELECT FROM WHERE"));
    assert_eq!(re_last_error_code(), ReErrorCode::QueryCompile);
    assert!(!select(db, results, "SELECT * FROM missing"));
    assert_ne!(re_last_error_code(), ReErrorCode::Ok);
    assert_eq!(re_query_results_count(results), 1);
    re_destroy(db);
}

#[test]
fn deeply_nested_filters_are_rejected() {
    let db = items_db();
    insert(db, r#"{"id":1}"#);
    let results = re_query_results_new();

    let depth = 100_000;
    let parens = format!(
        "SELECT * FROM items WHERE {}id = 1{}",
        "(".repeat(depth),
        ")".repeat(depth)
    );
    let nots = format!("SELECT * FROM items WHERE {}id = 1", "NOT ".repeat(depth));
    for sql in [parens, nots] {
        assert!(!select(db, results, &sql));
        assert_eq!(re_last_error_code(), ReErrorCode::QueryCompile);
    }
    let update = format!("UPDATE items SET a = {}1{}", "(".repeat(depth), ")".repeat(depth));
    assert!(!unsafe { re_update_sql(db, results, c(&update).as_ptr()) });
    assert_eq!(re_last_error_code(), ReErrorCode::QueryCompile);

    let chain: Vec<String> = (2..100_002).map(|id| format!("id = {id}")).collect();
    let sql = format!("SELECT * FROM items WHERE {} OR id = 1", chain.join(" OR "));
    assert!(select(db, results, &sql));
    assert_eq!(re_query_results_count(results), 1);
    re_destroy(db);
}

#[test]
fn bulk_statements_return_affected_documents() {
    let db = items_db();
    for id in 0..5 {
        insert(db, &format!(r#"{{"id":{id},"grp":"{}"}}"#, if id < 3 { "x" } else { "y" }));
    }
    let results = re_query_results_new();

    assert!(unsafe { re_update_sql(db, results, c("UPDATE items SET flag = true WHERE grp = 'x'").as_ptr()) });
    assert_eq!(re_query_results_count(results), 3);
    assert!(collect(results).iter().all(|doc| doc["flag"] == true));

    assert!(unsafe { re_delete_sql(db, results, c("DELETE FROM items WHERE grp = 'y'").as_ptr()) });
    assert_eq!(re_query_results_count(results), 2);

    assert!(select(db, results, "SELECT COUNT(*) FROM items"));
    assert_eq!(re_query_results_total_count(results), 3);
    assert_eq!(re_query_results_count(results), 0);

    assert!(!unsafe { re_update_sql(db, results, c("DELETE FROM items").as_ptr()) });
    assert_eq!(re_query_results_total_count(results), 3);
    re_destroy(db);
}

#[test]
fn add_index_paths() {
    let db = items_db();
    unsafe {
        assert!(re_add_index(
            db,
            c("items").as_ptr(),
            c("a+b").as_ptr(),
            c("a,b").as_ptr(),
            c("tree").as_ptr(),
            c("composite").as_ptr(),
            IndexOptsHandle::NULL,
        ));
        assert!(re_add_index(
            db,
            c("items").as_ptr(),
            c("name").as_ptr(),
            std::ptr::null(),
            c("hash").as_ptr(),
            c("string").as_ptr(),
            IndexOptsHandle::NULL,
        ));
        assert!(!re_add_index(
            db,
            c("items").as_ptr(),
            c("bad").as_ptr(),
            c("").as_ptr(),
            c("btree").as_ptr(),
            c("int").as_ptr(),
            IndexOptsHandle::NULL,
        ));
        assert_eq!(re_last_error_code(), ReErrorCode::Schema);
        assert!(!re_add_index_from_json(db, c("items").as_ptr(), c("{not json").as_ptr()));
        assert_eq!(re_last_error_code(), ReErrorCode::Schema);
        assert!(re_add_index_from_json(
            db,
            c("items").as_ptr(),
            c(r#"{"name":"rank","json_paths":["rank"],"index_type":"tree","field_type":"int"}"#).as_ptr(),
        ));
    }

    assert!(insert(db, r#"{"id":1,"a":1,"b":"x","name":"n1","rank":3}"#));
    assert!(insert(db, r#"{"id":2,"a":2,"b":"y","name":"n2","rank":1}"#));
    let results = re_query_results_new();
    assert!(select(db, results, "SELECT * FROM items WHERE name = 'n2'"));
    let docs = collect(results);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["id"], 2);

    unsafe {
        assert!(re_drop_index(db, c("items").as_ptr(), c("rank").as_ptr()));
        assert!(!re_drop_index(db, c("items").as_ptr(), c("rank").as_ptr()));
    }
    re_destroy(db);
}

#[test]
fn null_and_invalid_arguments_are_rejected() {
    let db = re_new();
    assert!(!unsafe { re_connect(db, std::ptr::null()) });
    assert_eq!(re_last_error_code(), ReErrorCode::InvalidArgument);

    let invalid_utf8 = [0xff_u8, 0xfe, 0];
    assert!(!unsafe { re_connect(db, invalid_utf8.as_ptr().cast()) });
    assert_eq!(re_last_error_code(), ReErrorCode::InvalidArgument);

    assert!(!unsafe { re_open_namespace(db, c("items").as_ptr()) });
    assert_eq!(re_last_error_code(), ReErrorCode::Connection);

    assert!(!unsafe { re_connect(db, c("cproto://localhost/db").as_ptr()) });
    assert_eq!(re_last_error_code(), ReErrorCode::Connection);

    re_clear_error();
    assert_eq!(re_last_error_code(), ReErrorCode::Ok);
    re_destroy(db);
}

#[test]
fn remote_handles_are_foreign_here() {
    let client = re_client_new();
    assert!(!unsafe { re_connect(client, c("builtin://").as_ptr()) });
    assert_eq!(re_last_error_code(), ReErrorCode::InvalidHandle);
    assert!(!re_destroy(client));
    assert!(re_client_destroy(client));
}

#[test]
fn data_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let dsn = format!("builtin://{}", dir.path().display());

    let db = re_new();
    unsafe {
        assert!(re_connect(db, c(&dsn).as_ptr()));
        assert!(re_open_namespace(db, c("items").as_ptr()));
        assert!(re_add_index_from_json(
            db,
            c("items").as_ptr(),
            c(r#"{"name":"id","index_type":"hash","field_type":"int","is_pk":true}"#).as_ptr(),
        ));
    }
    assert!(insert(db, r#"{"id":7,"name":"kept"}"#));
    assert!(re_destroy(db));

    let db = re_new();
    unsafe {
        assert!(re_connect(db, c(&dsn).as_ptr()));
        assert!(re_open_namespace(db, c("items").as_ptr()));
    }
    let results = re_query_results_new();
    assert!(select(db, results, "SELECT * FROM items WHERE id = 7"));
    assert_eq!(collect(results)[0]["name"], "kept");

    assert!(unsafe { re_drop_namespace(db, c("items").as_ptr()) });
    assert!(!select(db, results, "SELECT * FROM items"));
    re_destroy(db);
}

type Log = Mutex<Vec<(String, ReErrorCode)>>;

unsafe extern "C" fn record(
    user_data: *mut c_void,
    operation: *const c_char,
    code: ReErrorCode,
    _message: *const c_char,
) {
    let log = &*(user_data as *const Log);
    let operation = CStr::from_ptr(operation).to_string_lossy().into_owned();
    log.lock().unwrap().push((operation, code));
}

#[test]
fn sink_receives_connection_failures() {
    let log: Log = Mutex::new(Vec::new());
    let db = unsafe { re_new_with_sink(Some(record), &log as *const Log as *mut c_void) };
    unsafe {
        assert!(re_connect(db, c("builtin://").as_ptr()));
        assert!(!re_insert(db, c("nowhere").as_ptr(), c("{}").as_ptr()));
    }
    let results = re_query_results_new();
    assert!(!select(db, results, "SELEKT"));
    assert!(unsafe { re_open_namespace(db, c("items").as_ptr()) });
    assert!(select(db, results, "SELECT * FROM items"));
    let cursor = re_query_results_iter(results);
    assert!(re_query_results_iter_get_json(cursor).is_null());

    {
        let log = log.lock().unwrap();
        let ops: Vec<&str> = log.iter().map(|(op, _)| op.as_str()).collect();
        assert_eq!(ops, ["re_insert", "re_select", "re_query_results_iter_get_json"]);
        assert_eq!(log[1].1, ReErrorCode::QueryCompile);
        assert_eq!(log[2].1, ReErrorCode::ProtocolMisuse);
    }
    re_destroy(db);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn count_matches_traversal(n in 0usize..24) {
        let db = items_db();
        for id in 0..n {
            let doc = format!(r#"{{"id":{id}}}"#);
            prop_assert!(insert(db, &doc));
        }
        let results = re_query_results_new();
        prop_assert!(select(db, results, "SELECT * FROM items ORDER BY id"));

        let docs = collect(results);
        prop_assert_eq!(re_query_results_count(results), n as i64);
        prop_assert_eq!(docs.len(), n);
        for (i, doc) in docs.iter().enumerate() {
            prop_assert_eq!(doc["id"].as_u64(), Some(i as u64));
        }
        re_query_results_destroy(results);
        re_destroy(db);
    }
}
