//! The embedded database facade.

use crate::config::{ConnectOpts, StorageOpts, StorageType};
use crate::dir::StorageDir;
use crate::dsn::Dsn;
use crate::error::{CoreError, CoreResult};
use crate::index::IndexDef;
use crate::item::{Item, ItemModifyMode};
use crate::log::NamespaceLog;
use crate::namespace::{validate_name, Namespace};
use crate::query::{parse, Query, Statement, UpdateQuery};
use crate::results::QueryResults;
use docbridge_storage::FileLog;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;

struct Connected {
    dir: Option<StorageDir>,
    namespaces: BTreeMap<String, Namespace>,
}

/// An embedded document database.
///
/// Created disconnected; [`Database::connect`] binds it to a storage
/// directory (or to memory). All methods take `&self` and serialize access
/// internally, so a `Database` can be shared between threads.
///
/// # Example
///
/// ```rust
/// use docbridge_core::{Database, FieldType, IndexDef, IndexOpts, IndexType, StorageOpts};
///
/// let db = Database::new();
/// db.connect("builtin://").unwrap();
/// db.open_namespace("items", StorageOpts::default()).unwrap();
/// db.add_index(
///     "items",
///     IndexDef::new("id", IndexType::Hash, FieldType::Int, IndexOpts::new().pk(true)),
/// )
/// .unwrap();
///
/// let mut item = db.new_item("items").unwrap();
/// item.from_json(r#"{"id":1,"name":"a"}"#).unwrap();
/// db.insert("items", item).unwrap();
///
/// let results = db.select_sql("SELECT * FROM items").unwrap();
/// assert_eq!(results.count(), 1);
/// ```
pub struct Database {
    opts: ConnectOpts,
    state: RwLock<Option<Connected>>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// Creates a disconnected database with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_opts(ConnectOpts::default())
    }

    /// Creates a disconnected database.
    #[must_use]
    pub fn with_opts(opts: ConnectOpts) -> Self {
        Self {
            opts,
            state: RwLock::new(None),
        }
    }

    /// Returns the connect options.
    #[must_use]
    pub fn opts(&self) -> &ConnectOpts {
        &self.opts
    }

    /// Connects using a `builtin://` DSN.
    pub fn connect(&self, dsn: &str) -> CoreResult<()> {
        match Dsn::parse(dsn)? {
            Dsn::Builtin { path } => self.connect_path(path.as_deref()),
            Dsn::Remote { .. } => Err(CoreError::invalid_dsn(
                dsn,
                "remote DSNs are served by the client, not the embedded engine",
            )),
        }
    }

    /// Connects to a storage directory, or to memory when `path` is `None`.
    pub fn connect_path(&self, path: Option<&Path>) -> CoreResult<()> {
        let mut state = self.state.write();
        if state.is_some() {
            return Err(CoreError::AlreadyConnected);
        }

        let dir = match (path, self.opts.storage_type) {
            (Some(path), StorageType::FileLog) => Some(StorageDir::open(path, true)?),
            _ => None,
        };

        let mut namespaces = BTreeMap::new();
        if let (Some(dir), true) = (dir.as_ref(), self.opts.open_namespaces) {
            for name in dir.list_namespaces()? {
                match self.load_namespace(dir, &name) {
                    Ok(namespace) => {
                        namespaces.insert(name, namespace);
                    }
                    Err(e) if self.opts.allow_namespace_errors => {
                        tracing::warn!(namespace = %name, error = %e, "skipping namespace that failed to load");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        tracing::debug!(
            path = ?path,
            namespaces = namespaces.len(),
            "database connected"
        );
        *state = Some(Connected { dir, namespaces });
        Ok(())
    }

    /// Returns true once connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.read().is_some()
    }

    /// Unloads every namespace and releases the storage directory.
    pub fn close(&self) {
        if self.state.write().take().is_some() {
            tracing::debug!("database closed");
        }
    }

    fn load_namespace(&self, dir: &StorageDir, name: &str) -> CoreResult<Namespace> {
        let file = FileLog::open(&dir.namespace_log_path(name))?;
        let log = NamespaceLog::new(Box::new(file), self.opts.sync_on_write);
        let mut namespace = Namespace::open(name, log)?;
        namespace.compact_if_needed(self.opts.compaction_slack)?;
        Ok(namespace)
    }

    fn read<T>(&self, f: impl FnOnce(&Connected) -> CoreResult<T>) -> CoreResult<T> {
        let state = self.state.read();
        let connected = state.as_ref().ok_or(CoreError::NotConnected)?;
        f(connected)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Connected) -> CoreResult<T>) -> CoreResult<T> {
        let mut state = self.state.write();
        let connected = state.as_mut().ok_or(CoreError::NotConnected)?;
        f(connected)
    }

    fn with_namespace<T>(
        &self,
        name: &str,
        f: impl FnOnce(&Namespace) -> CoreResult<T>,
    ) -> CoreResult<T> {
        self.read(|connected| {
            let namespace = connected
                .namespaces
                .get(name)
                .ok_or_else(|| CoreError::namespace_not_found(name))?;
            f(namespace)
        })
    }

    fn with_namespace_mut<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Namespace) -> CoreResult<T>,
    ) -> CoreResult<T> {
        self.write(|connected| {
            let namespace = connected
                .namespaces
                .get_mut(name)
                .ok_or_else(|| CoreError::namespace_not_found(name))?;
            f(namespace)
        })
    }

    /// Opens a namespace, loading or creating it. Opening an open namespace
    /// is a no-op.
    pub fn open_namespace(&self, name: &str, opts: StorageOpts) -> CoreResult<()> {
        validate_name(name)?;
        self.write(|connected| {
            if connected.namespaces.contains_key(name) {
                return Ok(());
            }

            let namespace = match connected.dir.as_ref().filter(|_| opts.enabled) {
                Some(dir) => {
                    if !opts.create_if_missing && !dir.has_namespace(name) {
                        return Err(CoreError::namespace_not_found(name));
                    }
                    self.load_namespace(dir, name)?
                }
                None => {
                    if !opts.create_if_missing {
                        return Err(CoreError::namespace_not_found(name));
                    }
                    Namespace::new(name)?
                }
            };

            tracing::debug!(
                namespace = %name,
                persistent = namespace.is_persistent(),
                "namespace opened"
            );
            connected.namespaces.insert(name.to_owned(), namespace);
            Ok(())
        })
    }

    /// Unloads a namespace, keeping its log.
    pub fn close_namespace(&self, name: &str) -> CoreResult<()> {
        self.write(|connected| {
            connected
                .namespaces
                .remove(name)
                .map(|_| tracing::debug!(namespace = %name, "namespace closed"))
                .ok_or_else(|| CoreError::namespace_not_found(name))
        })
    }

    /// Unloads a namespace and deletes its log.
    pub fn drop_namespace(&self, name: &str) -> CoreResult<()> {
        validate_name(name)?;
        self.write(|connected| {
            let loaded = connected.namespaces.remove(name).is_some();
            let stored = connected
                .dir
                .as_ref()
                .is_some_and(|dir| dir.has_namespace(name));
            if !loaded && !stored {
                return Err(CoreError::namespace_not_found(name));
            }
            if let Some(dir) = connected.dir.as_ref() {
                dir.remove_namespace(name)?;
            }
            tracing::debug!(namespace = %name, "namespace dropped");
            Ok(())
        })
    }

    /// Names of the open namespaces, sorted.
    pub fn enum_namespaces(&self) -> CoreResult<Vec<String>> {
        self.read(|connected| Ok(connected.namespaces.keys().cloned().collect()))
    }

    /// Adds an index to a namespace.
    pub fn add_index(&self, namespace: &str, def: IndexDef) -> CoreResult<()> {
        self.with_namespace_mut(namespace, |ns| ns.add_index(def))
    }

    /// Drops an index from a namespace.
    pub fn drop_index(&self, namespace: &str, name: &str) -> CoreResult<()> {
        self.with_namespace_mut(namespace, |ns| ns.drop_index(name))
    }

    /// Creates an empty item bound to the namespace schema.
    pub fn new_item(&self, namespace: &str) -> CoreResult<Item> {
        self.with_namespace(namespace, |ns| Ok(ns.new_item()))
    }

    /// Applies a mutation.
    pub fn modify_item(&self, namespace: &str, item: Item, mode: ItemModifyMode) -> CoreResult<()> {
        if item.namespace() != namespace {
            return Err(CoreError::invalid_operation(format!(
                "item belongs to namespace {:?}, not {namespace:?}",
                item.namespace()
            )));
        }
        self.with_namespace_mut(namespace, |ns| ns.modify(item, mode))
    }

    /// Inserts an item; fails if its primary key exists.
    pub fn insert(&self, namespace: &str, item: Item) -> CoreResult<()> {
        self.modify_item(namespace, item, ItemModifyMode::Insert)
    }

    /// Replaces an item; fails if its primary key is missing.
    pub fn update(&self, namespace: &str, item: Item) -> CoreResult<()> {
        self.modify_item(namespace, item, ItemModifyMode::Update)
    }

    /// Inserts or replaces an item.
    pub fn upsert(&self, namespace: &str, item: Item) -> CoreResult<()> {
        self.modify_item(namespace, item, ItemModifyMode::Upsert)
    }

    /// Deletes the item with the same primary key.
    pub fn delete(&self, namespace: &str, item: Item) -> CoreResult<()> {
        self.modify_item(namespace, item, ItemModifyMode::Delete)
    }

    /// Runs a structured select.
    pub fn select(&self, query: &Query) -> CoreResult<QueryResults> {
        self.with_namespace(&query.namespace, |ns| ns.select(query))
    }

    /// Compiles and runs a `SELECT` statement.
    pub fn select_sql(&self, sql: &str) -> CoreResult<QueryResults> {
        self.select(&Query::from_sql(sql)?)
    }

    /// Runs a bulk update; the results hold the updated documents.
    pub fn update_query(&self, update: &UpdateQuery) -> CoreResult<QueryResults> {
        self.with_namespace_mut(&update.namespace, |ns| ns.update_by_query(update))
    }

    /// Compiles and runs an `UPDATE` statement.
    pub fn update_sql(&self, sql: &str) -> CoreResult<QueryResults> {
        self.update_query(&UpdateQuery::from_sql(sql)?)
    }

    /// Deletes the documents matching the query filter and returns them.
    pub fn delete_query(&self, query: &Query) -> CoreResult<QueryResults> {
        self.with_namespace_mut(&query.namespace, |ns| ns.delete_by_query(query))
    }

    /// Compiles and runs a `DELETE` statement.
    pub fn delete_sql(&self, sql: &str) -> CoreResult<QueryResults> {
        match parse(sql)? {
            Statement::Delete(query) => self.delete_query(&query),
            other => Err(CoreError::query_parse(
                0,
                format!("expected DELETE statement, got {}", other.verb()),
            )),
        }
    }

    /// Compiles and runs any supported statement.
    pub fn exec_sql(&self, sql: &str) -> CoreResult<QueryResults> {
        match parse(sql)? {
            Statement::Select(query) => self.select(&query),
            Statement::Update(update) => self.update_query(&update),
            Statement::Delete(query) => self.delete_query(&query),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("opts", &self.opts)
            .field("connected", &self.is_connected())
            .finish()
    }
}
