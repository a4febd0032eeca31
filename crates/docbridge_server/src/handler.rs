//! Request dispatch.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use docbridge_core::{validate_name, Database};
use docbridge_protocol::{Request, Response, PROTOCOL_VERSION};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// State of one client connection.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    database: Option<(String, Arc<Database>)>,
}

impl Session {
    /// Creates a session that has not logged in yet.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            database: None,
        }
    }

    /// Session identifier used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Name of the database this session logged into.
    pub fn database_name(&self) -> Option<&str> {
        self.database.as_ref().map(|(name, _)| name.as_str())
    }

    fn database(&self) -> ServerResult<&Database> {
        self.database
            .as_ref()
            .map(|(_, db)| db.as_ref())
            .ok_or(ServerError::NotLoggedIn)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Executes requests against the databases hosted by the server.
///
/// Each database name maps to one embedded [`Database`], opened on first
/// login and shared by every session that logs into it.
pub struct RpcServer {
    config: ServerConfig,
    databases: RwLock<HashMap<String, Arc<Database>>>,
}

impl RpcServer {
    /// Creates a dispatcher with no databases open.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            databases: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of databases currently open.
    pub fn database_count(&self) -> usize {
        self.databases.read().len()
    }

    /// Handles one request. Failures become [`Response::Error`].
    pub fn handle(&self, session: &mut Session, request: Request) -> Response {
        let name = request.name();
        match self.dispatch(session, request) {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(session = %session.id, request = name, error = %e, "request failed");
                e.to_response()
            }
        }
    }

    fn dispatch(&self, session: &mut Session, request: Request) -> ServerResult<Response> {
        match request {
            Request::Ping => Ok(Response::Ok),
            Request::Login {
                database,
                create_if_missing,
                protocol_version,
            } => {
                if protocol_version != PROTOCOL_VERSION {
                    return Err(ServerError::ProtocolMismatch {
                        expected: PROTOCOL_VERSION,
                        actual: protocol_version,
                    });
                }
                if session.database.is_some() {
                    return Err(ServerError::InvalidRequest(
                        "session is already logged in".into(),
                    ));
                }
                let db = self.database(&database, create_if_missing)?;
                tracing::info!(session = %session.id, database = %database, "login");
                session.database = Some((database, db));
                Ok(Response::Ok)
            }
            Request::OpenNamespace { namespace, storage } => {
                session.database()?.open_namespace(&namespace, storage)?;
                Ok(Response::Ok)
            }
            Request::CloseNamespace { namespace } => {
                session.database()?.close_namespace(&namespace)?;
                Ok(Response::Ok)
            }
            Request::DropNamespace { namespace } => {
                session.database()?.drop_namespace(&namespace)?;
                Ok(Response::Ok)
            }
            Request::EnumNamespaces => Ok(Response::Namespaces(
                session.database()?.enum_namespaces()?,
            )),
            Request::AddIndex {
                namespace,
                definition,
            } => {
                session.database()?.add_index(&namespace, definition)?;
                Ok(Response::Ok)
            }
            Request::DropIndex { namespace, name } => {
                session.database()?.drop_index(&namespace, &name)?;
                Ok(Response::Ok)
            }
            Request::ModifyItem {
                namespace,
                mode,
                json,
            } => {
                let db = session.database()?;
                let mut item = db.new_item(&namespace)?;
                item.from_json(&json)?;
                db.modify_item(&namespace, item, mode)?;
                Ok(Response::Ok)
            }
            Request::ExecSql { sql } => {
                let results = session.database()?.exec_sql(&sql)?;
                Ok(Response::results(&results))
            }
            Request::Select { query } => {
                let results = session.database()?.select(&query)?;
                Ok(Response::results(&results))
            }
        }
    }

    fn database(&self, name: &str, create_if_missing: bool) -> ServerResult<Arc<Database>> {
        validate_name(name)?;
        if let Some(db) = self.databases.read().get(name) {
            return Ok(Arc::clone(db));
        }

        let mut databases = self.databases.write();
        if let Some(db) = databases.get(name) {
            return Ok(Arc::clone(db));
        }

        let path = self.config.data_dir.as_ref().map(|dir| dir.join(name));
        let exists = path.as_ref().is_some_and(|p| p.is_dir());
        if !exists && !(create_if_missing && self.config.allow_create_database) {
            return Err(ServerError::UnknownDatabase(name.to_owned()));
        }

        let db = Database::new();
        db.connect_path(path.as_deref())?;
        tracing::info!(database = %name, persistent = path.is_some(), "database opened");
        let db = Arc::new(db);
        databases.insert(name.to_owned(), Arc::clone(&db));
        Ok(db)
    }

    /// Closes every open database.
    pub fn shutdown(&self) {
        for (name, db) in self.databases.write().drain() {
            db.close();
            tracing::debug!(database = %name, "database closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_core::{
        ErrorKind, FieldType, IndexDef, IndexOpts, IndexType, ItemModifyMode, StorageOpts,
    };
    use tempfile::tempdir;

    fn login(server: &RpcServer, session: &mut Session, database: &str) -> Response {
        server.handle(
            session,
            Request::Login {
                database: database.into(),
                create_if_missing: true,
                protocol_version: PROTOCOL_VERSION,
            },
        )
    }

    fn error_kind(response: Response) -> ErrorKind {
        match response {
            Response::Error { kind, .. } => kind,
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn requests_need_login() {
        let server = RpcServer::new(ServerConfig::default());
        let mut session = Session::new();

        assert_eq!(server.handle(&mut session, Request::Ping), Response::Ok);
        assert_eq!(
            error_kind(server.handle(&mut session, Request::EnumNamespaces)),
            ErrorKind::Connection
        );
        assert_eq!(login(&server, &mut session, "main"), Response::Ok);
        assert_eq!(session.database_name(), Some("main"));
        assert_eq!(
            server.handle(&mut session, Request::EnumNamespaces),
            Response::Namespaces(vec![])
        );
    }

    #[test]
    fn protocol_version_checked() {
        let server = RpcServer::new(ServerConfig::default());
        let mut session = Session::new();
        let response = server.handle(
            &mut session,
            Request::Login {
                database: "main".into(),
                create_if_missing: true,
                protocol_version: PROTOCOL_VERSION + 1,
            },
        );
        assert_eq!(error_kind(response), ErrorKind::Connection);
        assert!(session.database_name().is_none());
    }

    #[test]
    fn sessions_share_a_database() {
        let server = RpcServer::new(ServerConfig::default());
        let mut first = Session::new();
        let mut second = Session::new();
        login(&server, &mut first, "main");
        login(&server, &mut second, "main");
        assert_eq!(server.database_count(), 1);

        server.handle(
            &mut first,
            Request::OpenNamespace {
                namespace: "items".into(),
                storage: StorageOpts::new().enabled(false),
            },
        );
        server.handle(
            &mut first,
            Request::AddIndex {
                namespace: "items".into(),
                definition: IndexDef::new(
                    "id",
                    IndexType::Hash,
                    FieldType::Int,
                    IndexOpts::new().pk(true),
                ),
            },
        );
        let response = server.handle(
            &mut first,
            Request::ModifyItem {
                namespace: "items".into(),
                mode: ItemModifyMode::Insert,
                json: r#"{"id":1}"#.into(),
            },
        );
        assert_eq!(response, Response::Ok);

        let response = server.handle(
            &mut second,
            Request::ExecSql {
                sql: "SELECT * FROM items".into(),
            },
        );
        let results = response.into_results().unwrap();
        assert_eq!(results.count(), 1);
    }

    #[test]
    fn unknown_database_without_create() {
        let temp = tempdir().unwrap();
        let server = RpcServer::new(
            ServerConfig::default()
                .with_data_dir(temp.path())
                .with_allow_create_database(false),
        );
        let mut session = Session::new();
        assert_eq!(
            error_kind(login(&server, &mut session, "missing")),
            ErrorKind::Connection
        );

        std::fs::create_dir(temp.path().join("present")).unwrap();
        assert_eq!(login(&server, &mut session, "present"), Response::Ok);
    }

    #[test]
    fn engine_errors_keep_their_kind() {
        let server = RpcServer::new(ServerConfig::default());
        let mut session = Session::new();
        login(&server, &mut session, "main");

        let response = server.handle(
            &mut session,
            Request::ExecSql {
                sql: "SELEKT".into(),
            },
        );
        assert_eq!(error_kind(response), ErrorKind::QueryCompile);

        let response = server.handle(
            &mut session,
            Request::DropNamespace {
                namespace: "ghost".into(),
            },
        );
        assert_eq!(error_kind(response), ErrorKind::Schema);
    }
}
