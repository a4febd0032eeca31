//! Tests of the server over real TCP connections.

use docbridge_core::{ErrorKind, FieldType, IndexDef, IndexOpts, IndexType, ItemModifyMode, StorageOpts};
use docbridge_protocol::{
    read_frame, write_frame, Request, Response, MAX_FRAME_SIZE, PROTOCOL_VERSION,
};
use docbridge_server::{BackgroundServer, ServerConfig};
use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;
use tempfile::tempdir;

fn call(stream: &mut TcpStream, request: Request) -> Response {
    write_frame(stream, &request).unwrap();
    read_frame(stream, MAX_FRAME_SIZE).unwrap()
}

fn login(server: &BackgroundServer, database: &str) -> TcpStream {
    let mut stream = TcpStream::connect(server.addr()).unwrap();
    let response = call(
        &mut stream,
        Request::Login {
            database: database.into(),
            create_if_missing: true,
            protocol_version: PROTOCOL_VERSION,
        },
    );
    assert_eq!(response, Response::Ok);
    stream
}

fn setup_items(stream: &mut TcpStream) {
    let response = call(
        stream,
        Request::OpenNamespace {
            namespace: "items".into(),
            storage: StorageOpts::default(),
        },
    );
    assert_eq!(response, Response::Ok);
    let response = call(
        stream,
        Request::AddIndex {
            namespace: "items".into(),
            definition: IndexDef::new("id", IndexType::Hash, FieldType::Int, IndexOpts::new().pk(true)),
        },
    );
    assert_eq!(response, Response::Ok);
}

fn insert(stream: &mut TcpStream, json: &str) -> Response {
    call(
        stream,
        Request::ModifyItem {
            namespace: "items".into(),
            mode: ItemModifyMode::Insert,
            json: json.into(),
        },
    )
}

#[test]
fn insert_and_select_over_tcp() {
    let server = BackgroundServer::start(ServerConfig::default()).unwrap();
    let mut stream = login(&server, "main");
    setup_items(&mut stream);

    for id in 0..5 {
        assert_eq!(insert(&mut stream, &format!(r#"{{"id":{id}}}"#)), Response::Ok);
    }

    let response = call(
        &mut stream,
        Request::ExecSql {
            sql: "SELECT * FROM items WHERE id >= 2 ORDER BY id LIMIT 2".into(),
        },
    );
    let results = response.into_results().unwrap();
    assert_eq!(results.count(), 2);
    assert_eq!(results.total_count(), 3);
    assert_eq!(results.get(0).unwrap().document().unwrap()["id"], 2);
}

#[test]
fn errors_keep_connection_usable() {
    let server = BackgroundServer::start(ServerConfig::default()).unwrap();
    let mut stream = login(&server, "main");
    setup_items(&mut stream);

    assert_eq!(insert(&mut stream, r#"{"id":1}"#), Response::Ok);
    match insert(&mut stream, r#"{"id":1}"#) {
        Response::Error { kind, .. } => assert_eq!(kind, ErrorKind::Payload),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(call(&mut stream, Request::Ping), Response::Ok);
}

#[test]
fn requests_past_their_timeout_still_answer_with_the_outcome() {
    let config = ServerConfig::default().with_request_timeout(Duration::from_nanos(1));
    let server = BackgroundServer::start(config).unwrap();
    let mut stream = login(&server, "main");
    setup_items(&mut stream);

    for id in 0..20 {
        assert_eq!(insert(&mut stream, &format!(r#"{{"id":{id}}}"#)), Response::Ok);
    }
    match insert(&mut stream, r#"{"id":3}"#) {
        Response::Error { kind, .. } => assert_eq!(kind, ErrorKind::Payload),
        other => panic!("unexpected {other:?}"),
    }

    let response = call(
        &mut stream,
        Request::ExecSql {
            sql: "SELECT COUNT(*) FROM items".into(),
        },
    );
    assert_eq!(response.into_results().unwrap().total_count(), 20);
}

#[test]
fn oversized_frame_closes_connection() {
    let server = BackgroundServer::start(ServerConfig::default().with_max_frame_size(64)).unwrap();
    let mut stream = TcpStream::connect(server.addr()).unwrap();

    stream.write_all(&1024u32.to_be_bytes()).unwrap();
    let response: Response = read_frame(&mut stream, MAX_FRAME_SIZE).unwrap();
    assert!(response.is_error());
    assert!(read_frame::<_, Response>(&mut stream, MAX_FRAME_SIZE).is_err());
}

#[test]
fn data_survives_server_restart() {
    let temp = tempdir().unwrap();
    let config = ServerConfig::default().with_data_dir(temp.path());

    let server = BackgroundServer::start(config.clone()).unwrap();
    {
        let mut stream = login(&server, "persisted");
        setup_items(&mut stream);
        assert_eq!(insert(&mut stream, r#"{"id":7,"name":"kept"}"#), Response::Ok);
    }
    server.stop();

    let server = BackgroundServer::start(config).unwrap();
    let mut stream = login(&server, "persisted");
    let response = call(
        &mut stream,
        Request::ExecSql {
            sql: "SELECT * FROM items".into(),
        },
    );
    let results = response.into_results().unwrap();
    assert_eq!(results.count(), 1);
    assert_eq!(results.get(0).unwrap().document().unwrap()["name"], "kept");
}
