//! The handle table.
//!
//! Owns every connection, result set and cursor created through one front
//! end and records which handle depends on which:
//!
//! - a cursor belongs to the result set it was opened on
//! - a result set belongs to the connection that last populated it
//!
//! Removing a parent removes its children, so a stale child handle is
//! reported as invalid instead of reaching freed memory.

use crate::cursor::Cursor;
use crate::engine::Engine;
use crate::error::{BridgeError, BridgeResult};
use crate::sink::DiagnosticSink;
use crate::types::{next_handle, ConnectionHandle, CursorHandle, ResultsHandle};
use docbridge_client::Client;
use docbridge_core::{Database, QueryResults};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

pub(crate) struct ConnectionEntry<E> {
    pub(crate) engine: Arc<E>,
    pub(crate) sink: Arc<DiagnosticSink>,
}

// Manual impl: `E` itself need not be Clone.
impl<E> Clone for ConnectionEntry<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            sink: Arc::clone(&self.sink),
        }
    }
}

struct ResultsEntry {
    results: Arc<QueryResults>,
    owner: Option<ConnectionHandle>,
    sink: Option<Arc<DiagnosticSink>>,
}

struct CursorEntry {
    parent: ResultsHandle,
    cursor: Cursor,
    sink: Option<Arc<DiagnosticSink>>,
}

/// Handle table of one front end.
pub(crate) struct Registry<E> {
    connections: HashMap<u64, ConnectionEntry<E>>,
    results: HashMap<u64, ResultsEntry>,
    cursors: HashMap<u64, CursorEntry>,
}

impl<E: Engine> Registry<E> {
    pub(crate) fn new() -> Self {
        Self {
            connections: HashMap::new(),
            results: HashMap::new(),
            cursors: HashMap::new(),
        }
    }

    pub(crate) fn insert_connection(&mut self, engine: E, sink: DiagnosticSink) -> ConnectionHandle {
        let handle = next_handle();
        self.connections.insert(
            handle,
            ConnectionEntry {
                engine: Arc::new(engine),
                sink: Arc::new(sink),
            },
        );
        ConnectionHandle(handle)
    }

    pub(crate) fn connection(&self, handle: ConnectionHandle) -> BridgeResult<ConnectionEntry<E>> {
        self.connections
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| BridgeError::invalid_handle(ConnectionHandle::KIND, handle.0))
    }

    /// Removes a connection with the result sets it populated and their
    /// cursors.
    pub(crate) fn remove_connection(&mut self, handle: ConnectionHandle) -> BridgeResult<()> {
        self.connections
            .remove(&handle.0)
            .ok_or_else(|| BridgeError::invalid_handle(ConnectionHandle::KIND, handle.0))?;

        let owned: Vec<u64> = self
            .results
            .iter()
            .filter(|(_, entry)| entry.owner == Some(handle))
            .map(|(&id, _)| id)
            .collect();
        for id in owned {
            self.results.remove(&id);
            self.remove_cursors_of(ResultsHandle(id));
        }
        Ok(())
    }

    pub(crate) fn insert_results(&mut self) -> ResultsHandle {
        let handle = next_handle();
        self.results.insert(
            handle,
            ResultsEntry {
                results: Arc::new(QueryResults::new()),
                owner: None,
                sink: None,
            },
        );
        ResultsHandle(handle)
    }

    fn results_entry(&self, handle: ResultsHandle) -> BridgeResult<&ResultsEntry> {
        self.results
            .get(&handle.0)
            .ok_or_else(|| BridgeError::invalid_handle(ResultsHandle::KIND, handle.0))
    }

    pub(crate) fn results(&self, handle: ResultsHandle) -> BridgeResult<Arc<QueryResults>> {
        self.results_entry(handle).map(|entry| Arc::clone(&entry.results))
    }

    /// Sink of the connection that populated the result set.
    pub(crate) fn results_sink(&self, handle: ResultsHandle) -> Option<Arc<DiagnosticSink>> {
        self.results.get(&handle.0).and_then(|entry| entry.sink.clone())
    }

    /// Replaces the contents of a result set. Cursors opened on the old
    /// contents are invalidated.
    pub(crate) fn populate(
        &mut self,
        handle: ResultsHandle,
        owner: ConnectionHandle,
        results: QueryResults,
    ) -> BridgeResult<()> {
        let sink = self.connection(owner)?.sink;
        let entry = self
            .results
            .get_mut(&handle.0)
            .ok_or_else(|| BridgeError::invalid_handle(ResultsHandle::KIND, handle.0))?;
        entry.results = Arc::new(results);
        entry.owner = Some(owner);
        entry.sink = Some(sink);
        self.remove_cursors_of(handle);
        Ok(())
    }

    /// Removes a result set and its cursors.
    pub(crate) fn remove_results(&mut self, handle: ResultsHandle) -> BridgeResult<()> {
        self.results
            .remove(&handle.0)
            .ok_or_else(|| BridgeError::invalid_handle(ResultsHandle::KIND, handle.0))?;
        self.remove_cursors_of(handle);
        Ok(())
    }

    fn remove_cursors_of(&mut self, parent: ResultsHandle) {
        self.cursors.retain(|_, entry| entry.parent != parent);
    }

    pub(crate) fn insert_cursor(&mut self, parent: ResultsHandle) -> BridgeResult<CursorHandle> {
        let entry = self.results_entry(parent)?;
        let cursor = CursorEntry {
            parent,
            cursor: Cursor::new(Arc::clone(&entry.results)),
            sink: entry.sink.clone(),
        };
        let handle = next_handle();
        self.cursors.insert(handle, cursor);
        Ok(CursorHandle(handle))
    }

    pub(crate) fn cursor_mut(&mut self, handle: CursorHandle) -> BridgeResult<&mut Cursor> {
        self.cursors
            .get_mut(&handle.0)
            .map(|entry| &mut entry.cursor)
            .ok_or_else(|| BridgeError::invalid_handle(CursorHandle::KIND, handle.0))
    }

    pub(crate) fn cursor_sink(&self, handle: CursorHandle) -> Option<Arc<DiagnosticSink>> {
        self.cursors.get(&handle.0).and_then(|entry| entry.sink.clone())
    }

    pub(crate) fn remove_cursor(&mut self, handle: CursorHandle) -> BridgeResult<()> {
        self.cursors
            .remove(&handle.0)
            .map(|_| ())
            .ok_or_else(|| BridgeError::invalid_handle(CursorHandle::KIND, handle.0))
    }

    #[cfg(test)]
    pub(crate) fn live_counts(&self) -> (usize, usize, usize) {
        (self.connections.len(), self.results.len(), self.cursors.len())
    }
}

/// Handle table of the embedded front end.
pub(crate) fn embedded() -> &'static Mutex<Registry<Database>> {
    static REGISTRY: OnceLock<Mutex<Registry<Database>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Registry::new()))
}

/// Handle table of the remote front end.
pub(crate) fn remote() -> &'static Mutex<Registry<Client>> {
    static REGISTRY: OnceLock<Mutex<Registry<Client>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Registry::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_core::ResultItem;

    fn two_items() -> QueryResults {
        QueryResults::from_items(
            vec![
                ResultItem::from_json_text("items", r#"{"id":1}"#),
                ResultItem::from_json_text("items", r#"{"id":2}"#),
            ],
            2,
        )
    }

    #[test]
    fn double_destroy_is_detected() {
        let mut registry: Registry<Database> = Registry::new();
        let results = registry.insert_results();
        registry.remove_results(results).unwrap();
        assert!(matches!(
            registry.remove_results(results),
            Err(BridgeError::InvalidHandle { .. })
        ));
    }

    #[test]
    fn destroying_results_kills_cursors() {
        let mut registry: Registry<Database> = Registry::new();
        let results = registry.insert_results();
        let cursor = registry.insert_cursor(results).unwrap();
        assert!(registry.cursor_mut(cursor).is_ok());

        registry.remove_results(results).unwrap();
        assert!(registry.cursor_mut(cursor).is_err());
        assert!(registry.remove_cursor(cursor).is_err());
    }

    #[test]
    fn repopulating_kills_old_cursors() {
        let mut registry: Registry<Database> = Registry::new();
        let conn = registry.insert_connection(Database::create(), DiagnosticSink::Tracing);
        let results = registry.insert_results();
        let stale = registry.insert_cursor(results).unwrap();

        registry.populate(results, conn, two_items()).unwrap();
        assert!(registry.cursor_mut(stale).is_err());

        let fresh = registry.insert_cursor(results).unwrap();
        assert!(registry.cursor_mut(fresh).unwrap().next());
    }

    #[test]
    fn destroying_connection_kills_what_it_populated() {
        let mut registry: Registry<Database> = Registry::new();
        let conn = registry.insert_connection(Database::create(), DiagnosticSink::Tracing);
        let populated = registry.insert_results();
        let untouched = registry.insert_results();
        registry.populate(populated, conn, two_items()).unwrap();
        let cursor = registry.insert_cursor(populated).unwrap();

        registry.remove_connection(conn).unwrap();
        assert!(registry.results(populated).is_err());
        assert!(registry.cursor_mut(cursor).is_err());
        assert!(registry.results(untouched).is_ok());
        assert_eq!(registry.live_counts(), (0, 1, 0));
    }
}
