//! The remote client facade.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::{TcpTransport, Transport};
use docbridge_core::query::parse;
use docbridge_core::{
    CoreError, Dsn, IndexDef, ItemModifyMode, Query, QueryResults, StorageOpts,
};
use docbridge_protocol::{ProtocolError, Request, Response, PROTOCOL_VERSION};
use parking_lot::Mutex;
use serde_json::Value;

struct Session {
    transport: Box<dyn Transport>,
    database: String,
}

/// A document to send to the server.
///
/// Only the JSON shape is checked locally; index type checks run on the
/// server when the mutation is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteItem {
    namespace: String,
    document: Option<Value>,
}

impl RemoteItem {
    /// Parses the document. On failure the item keeps its previous
    /// contents.
    pub fn from_json(&mut self, json: &str) -> ClientResult<()> {
        let document: Value = serde_json::from_str(json).map_err(CoreError::from)?;
        if !document.is_object() {
            return Err(CoreError::invalid_item("document must be a JSON object").into());
        }
        self.document = Some(document);
        Ok(())
    }

    /// Namespace the item was created for.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The parsed document, if any.
    pub fn document(&self) -> Option<&Value> {
        self.document.as_ref()
    }
}

/// A blocking client of a remote DocBridge server.
///
/// Created disconnected; [`Client::connect`] opens the socket and logs
/// into the database named by the DSN. Requests on one client are
/// serialized.
///
/// ```no_run
/// use docbridge_client::{Client, ClientConfig};
/// use docbridge_core::StorageOpts;
///
/// let client = Client::new(ClientConfig::default());
/// client.connect("cproto://127.0.0.1:6534/main").unwrap();
/// client.open_namespace("items", StorageOpts::default()).unwrap();
/// let results = client.exec_sql("SELECT * FROM items").unwrap();
/// println!("{} documents", results.count());
/// ```
pub struct Client {
    config: ClientConfig,
    session: Mutex<Option<Session>>,
}

impl Client {
    /// Creates a disconnected client. Performs no I/O.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connects to a `cproto://host:port/database` DSN and logs in.
    pub fn connect(&self, dsn: &str) -> ClientResult<()> {
        let (host, port, database) = match Dsn::parse(dsn)? {
            Dsn::Remote {
                host,
                port,
                database,
            } => (host, port, database),
            Dsn::Builtin { .. } => {
                return Err(CoreError::invalid_dsn(
                    dsn,
                    "builtin DSNs are served by the embedded engine, not the client",
                )
                .into())
            }
        };
        if self.is_connected() {
            return Err(CoreError::AlreadyConnected.into());
        }

        let transport = TcpTransport::connect(&host, port, &self.config)?;
        self.connect_with(Box::new(transport), &database)
    }

    /// Logs into `database` over an already established transport.
    pub fn connect_with(&self, mut transport: Box<dyn Transport>, database: &str) -> ClientResult<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Err(CoreError::AlreadyConnected.into());
        }

        let login = Request::Login {
            database: database.to_owned(),
            create_if_missing: self.config.create_db_if_missing,
            protocol_version: PROTOCOL_VERSION,
        };
        expect_ok(transport.round_trip(&login)?)?;

        tracing::debug!(database = %database, "client connected");
        *session = Some(Session {
            transport,
            database: database.to_owned(),
        });
        Ok(())
    }

    /// Returns true once logged in.
    pub fn is_connected(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Name of the database this client is logged into.
    pub fn database(&self) -> Option<String> {
        self.session.lock().as_ref().map(|s| s.database.clone())
    }

    /// Drops the connection.
    pub fn close(&self) {
        if self.session.lock().take().is_some() {
            tracing::debug!("client closed");
        }
    }

    fn call(&self, request: Request) -> ClientResult<Response> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(CoreError::NotConnected)?;
        match session.transport.round_trip(&request) {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::warn!(request = request.name(), error = %e, "connection lost");
                *guard = None;
                Err(e)
            }
        }
    }

    /// Checks the server is alive.
    pub fn ping(&self) -> ClientResult<()> {
        expect_ok(self.call(Request::Ping)?)
    }

    /// Opens or creates a namespace on the server.
    pub fn open_namespace(&self, namespace: &str, storage: StorageOpts) -> ClientResult<()> {
        expect_ok(self.call(Request::OpenNamespace {
            namespace: namespace.to_owned(),
            storage,
        })?)
    }

    /// Closes a namespace, keeping its data.
    pub fn close_namespace(&self, namespace: &str) -> ClientResult<()> {
        expect_ok(self.call(Request::CloseNamespace {
            namespace: namespace.to_owned(),
        })?)
    }

    /// Drops a namespace and its data.
    pub fn drop_namespace(&self, namespace: &str) -> ClientResult<()> {
        expect_ok(self.call(Request::DropNamespace {
            namespace: namespace.to_owned(),
        })?)
    }

    /// Lists open namespaces.
    pub fn enum_namespaces(&self) -> ClientResult<Vec<String>> {
        match self.call(Request::EnumNamespaces)? {
            Response::Namespaces(names) => Ok(names),
            other => Err(unexpected(other)),
        }
    }

    /// Adds an index.
    pub fn add_index(&self, namespace: &str, definition: IndexDef) -> ClientResult<()> {
        expect_ok(self.call(Request::AddIndex {
            namespace: namespace.to_owned(),
            definition,
        })?)
    }

    /// Drops an index.
    pub fn drop_index(&self, namespace: &str, name: &str) -> ClientResult<()> {
        expect_ok(self.call(Request::DropIndex {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        })?)
    }

    /// Creates an empty item for a namespace. Performs no I/O.
    pub fn new_item(&self, namespace: &str) -> RemoteItem {
        RemoteItem {
            namespace: namespace.to_owned(),
            document: None,
        }
    }

    /// Applies a mutation.
    pub fn modify_item(
        &self,
        namespace: &str,
        item: RemoteItem,
        mode: ItemModifyMode,
    ) -> ClientResult<()> {
        if item.namespace != namespace {
            return Err(CoreError::invalid_operation(format!(
                "item belongs to namespace {:?}, not {namespace:?}",
                item.namespace
            ))
            .into());
        }
        let document = item
            .document
            .ok_or_else(|| CoreError::invalid_item("item has no document"))?;
        let json = serde_json::to_string(&document).map_err(CoreError::from)?;
        expect_ok(self.call(Request::ModifyItem {
            namespace: namespace.to_owned(),
            mode,
            json,
        })?)
    }

    /// Inserts an item; fails if its primary key exists.
    pub fn insert(&self, namespace: &str, item: RemoteItem) -> ClientResult<()> {
        self.modify_item(namespace, item, ItemModifyMode::Insert)
    }

    /// Replaces an item; fails if its primary key is missing.
    pub fn update(&self, namespace: &str, item: RemoteItem) -> ClientResult<()> {
        self.modify_item(namespace, item, ItemModifyMode::Update)
    }

    /// Inserts or replaces an item.
    pub fn upsert(&self, namespace: &str, item: RemoteItem) -> ClientResult<()> {
        self.modify_item(namespace, item, ItemModifyMode::Upsert)
    }

    /// Deletes the item with the same primary key.
    pub fn delete(&self, namespace: &str, item: RemoteItem) -> ClientResult<()> {
        self.modify_item(namespace, item, ItemModifyMode::Delete)
    }

    /// Runs a structured select on the server.
    pub fn select(&self, query: &Query) -> ClientResult<QueryResults> {
        expect_results(self.call(Request::Select {
            query: query.clone(),
        })?)
    }

    /// Runs any statement on the server.
    pub fn exec_sql(&self, sql: &str) -> ClientResult<QueryResults> {
        expect_results(self.call(Request::ExecSql {
            sql: sql.to_owned(),
        })?)
    }

    /// Runs an `UPDATE` statement; other statements are refused locally.
    pub fn update_sql(&self, sql: &str) -> ClientResult<QueryResults> {
        self.exec_verb(sql, "UPDATE")
    }

    /// Runs a `DELETE` statement; other statements are refused locally.
    pub fn delete_sql(&self, sql: &str) -> ClientResult<QueryResults> {
        self.exec_verb(sql, "DELETE")
    }

    fn exec_verb(&self, sql: &str, verb: &str) -> ClientResult<QueryResults> {
        let statement = parse(sql)?;
        if statement.verb() != verb {
            return Err(CoreError::query_parse(
                0,
                format!("expected {verb} statement, got {}", statement.verb()),
            )
            .into());
        }
        self.exec_sql(sql)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("database", &self.database())
            .finish()
    }
}

fn expect_ok(response: Response) -> ClientResult<()> {
    match response {
        Response::Ok => Ok(()),
        other => Err(unexpected(other)),
    }
}

fn expect_results(response: Response) -> ClientResult<QueryResults> {
    match response {
        Response::Results { .. } => response
            .into_results()
            .ok_or_else(|| ProtocolError::UnexpectedResponse("results".into()).into()),
        other => Err(unexpected(other)),
    }
}

fn unexpected(response: Response) -> ClientError {
    match response {
        Response::Error { kind, message } => ClientError::Remote { kind, message },
        other => ClientError::Protocol(ProtocolError::UnexpectedResponse(format!("{other:?}"))),
    }
}
