//! The operations both front ends need from their engine.

use crate::error::BridgeResult;
use docbridge_client::{Client, ClientConfig};
use docbridge_core::{
    ConnectOpts, Database, IndexDef, ItemModifyMode, QueryResults, StorageOpts,
};

/// An engine reachable through the bridge.
pub(crate) trait Engine: Send + Sync + 'static {
    /// Creates a disconnected engine. Performs no I/O.
    fn create() -> Self;

    fn connect(&self, dsn: &str) -> BridgeResult<()>;
    fn open_namespace(&self, namespace: &str, storage: StorageOpts) -> BridgeResult<()>;
    fn close_namespace(&self, namespace: &str) -> BridgeResult<()>;
    fn drop_namespace(&self, namespace: &str) -> BridgeResult<()>;
    fn add_index(&self, namespace: &str, def: IndexDef) -> BridgeResult<()>;
    fn drop_index(&self, namespace: &str, name: &str) -> BridgeResult<()>;

    /// Builds an item from JSON and applies the mutation.
    fn modify(&self, namespace: &str, json: &str, mode: ItemModifyMode) -> BridgeResult<()>;

    fn select(&self, sql: &str) -> BridgeResult<QueryResults>;
    fn update_sql(&self, sql: &str) -> BridgeResult<QueryResults>;
    fn delete_sql(&self, sql: &str) -> BridgeResult<QueryResults>;
}

impl Engine for Database {
    fn create() -> Self {
        Database::with_opts(ConnectOpts::new().allow_namespace_errors(true))
    }

    fn connect(&self, dsn: &str) -> BridgeResult<()> {
        Ok(Database::connect(self, dsn)?)
    }

    fn open_namespace(&self, namespace: &str, storage: StorageOpts) -> BridgeResult<()> {
        Ok(Database::open_namespace(self, namespace, storage)?)
    }

    fn close_namespace(&self, namespace: &str) -> BridgeResult<()> {
        Ok(Database::close_namespace(self, namespace)?)
    }

    fn drop_namespace(&self, namespace: &str) -> BridgeResult<()> {
        Ok(Database::drop_namespace(self, namespace)?)
    }

    fn add_index(&self, namespace: &str, def: IndexDef) -> BridgeResult<()> {
        Ok(Database::add_index(self, namespace, def)?)
    }

    fn drop_index(&self, namespace: &str, name: &str) -> BridgeResult<()> {
        Ok(Database::drop_index(self, namespace, name)?)
    }

    fn modify(&self, namespace: &str, json: &str, mode: ItemModifyMode) -> BridgeResult<()> {
        let mut item = self.new_item(namespace)?;
        item.from_json(json)?;
        Ok(self.modify_item(namespace, item, mode)?)
    }

    fn select(&self, sql: &str) -> BridgeResult<QueryResults> {
        Ok(self.select_sql(sql)?)
    }

    fn update_sql(&self, sql: &str) -> BridgeResult<QueryResults> {
        Ok(Database::update_sql(self, sql)?)
    }

    fn delete_sql(&self, sql: &str) -> BridgeResult<QueryResults> {
        Ok(Database::delete_sql(self, sql)?)
    }
}

impl Engine for Client {
    fn create() -> Self {
        Client::new(ClientConfig::default())
    }

    fn connect(&self, dsn: &str) -> BridgeResult<()> {
        Ok(Client::connect(self, dsn)?)
    }

    fn open_namespace(&self, namespace: &str, storage: StorageOpts) -> BridgeResult<()> {
        Ok(Client::open_namespace(self, namespace, storage)?)
    }

    fn close_namespace(&self, namespace: &str) -> BridgeResult<()> {
        Ok(Client::close_namespace(self, namespace)?)
    }

    fn drop_namespace(&self, namespace: &str) -> BridgeResult<()> {
        Ok(Client::drop_namespace(self, namespace)?)
    }

    fn add_index(&self, namespace: &str, def: IndexDef) -> BridgeResult<()> {
        Ok(Client::add_index(self, namespace, def)?)
    }

    fn drop_index(&self, namespace: &str, name: &str) -> BridgeResult<()> {
        Ok(Client::drop_index(self, namespace, name)?)
    }

    fn modify(&self, namespace: &str, json: &str, mode: ItemModifyMode) -> BridgeResult<()> {
        let mut item = self.new_item(namespace);
        item.from_json(json)?;
        Ok(self.modify_item(namespace, item, mode)?)
    }

    fn select(&self, sql: &str) -> BridgeResult<QueryResults> {
        Ok(self.exec_sql(sql)?)
    }

    fn update_sql(&self, sql: &str) -> BridgeResult<QueryResults> {
        Ok(Client::update_sql(self, sql)?)
    }

    fn delete_sql(&self, sql: &str) -> BridgeResult<QueryResults> {
        Ok(Client::delete_sql(self, sql)?)
    }
}
