//! Request and response messages.

use docbridge_core::{
    CoreError, ErrorKind, IndexDef, ItemModifyMode, Query, QueryResults, ResultItem, StorageOpts,
};
use serde::{Deserialize, Serialize};

/// Protocol version announced in [`Request::Login`].
pub const PROTOCOL_VERSION: u32 = 1;

/// A request from client to server.
///
/// Every request is answered by exactly one [`Response`]. A connection must
/// log in before anything but `Ping` is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Selects the database this connection works on.
    Login {
        /// Database name from the DSN path.
        database: String,
        /// Create the database when the server does not know it yet.
        create_if_missing: bool,
        /// Client protocol version.
        protocol_version: u32,
    },
    /// Liveness check.
    Ping,
    /// Opens or creates a namespace.
    OpenNamespace {
        /// Namespace name.
        namespace: String,
        /// Storage options.
        storage: StorageOpts,
    },
    /// Closes a namespace, keeping its data.
    CloseNamespace {
        /// Namespace name.
        namespace: String,
    },
    /// Drops a namespace and its data.
    DropNamespace {
        /// Namespace name.
        namespace: String,
    },
    /// Lists namespaces.
    EnumNamespaces,
    /// Adds an index.
    AddIndex {
        /// Namespace name.
        namespace: String,
        /// Index definition.
        definition: IndexDef,
    },
    /// Drops an index.
    DropIndex {
        /// Namespace name.
        namespace: String,
        /// Index name.
        name: String,
    },
    /// Inserts, updates, upserts or deletes one document.
    ModifyItem {
        /// Namespace name.
        namespace: String,
        /// Mutation mode.
        mode: ItemModifyMode,
        /// Document JSON text.
        json: String,
    },
    /// Runs any SQL statement.
    ExecSql {
        /// Statement text.
        sql: String,
    },
    /// Runs a structured query.
    Select {
        /// Query to run.
        query: Query,
    },
}

impl Request {
    /// Short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Ping => "ping",
            Self::OpenNamespace { .. } => "open_namespace",
            Self::CloseNamespace { .. } => "close_namespace",
            Self::DropNamespace { .. } => "drop_namespace",
            Self::EnumNamespaces => "enum_namespaces",
            Self::AddIndex { .. } => "add_index",
            Self::DropIndex { .. } => "drop_index",
            Self::ModifyItem { .. } => "modify_item",
            Self::ExecSql { .. } => "exec_sql",
            Self::Select { .. } => "select",
        }
    }
}

/// One document on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireItem {
    /// Namespace the document came from.
    pub namespace: String,
    /// Document JSON text.
    pub json: String,
}

/// A response from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// The request succeeded with nothing to return.
    Ok,
    /// Namespace listing.
    Namespaces(Vec<String>),
    /// Documents produced by a query or statement.
    Results {
        /// Documents in result order.
        items: Vec<WireItem>,
        /// Number of matches before limit and offset.
        total_count: u64,
    },
    /// The request failed.
    Error {
        /// Failure classification.
        kind: ErrorKind,
        /// Human-readable message.
        message: String,
    },
}

impl Response {
    /// Builds an error response from an engine error.
    #[must_use]
    pub fn error(err: &CoreError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Builds a results response. Items that failed to materialize are
    /// sent as empty text and fail to decode on the other side.
    #[must_use]
    pub fn results(results: &QueryResults) -> Self {
        let items = results
            .iter()
            .map(|item| WireItem {
                namespace: item.namespace().to_owned(),
                json: item.json().map(str::to_owned).unwrap_or_default(),
            })
            .collect();
        Self::Results {
            items,
            total_count: results.total_count() as u64,
        }
    }

    /// Converts a results response back into a result set.
    ///
    /// Each document is checked as it arrives; one that is not a JSON
    /// object keeps its position with an error status.
    pub fn into_results(self) -> Option<QueryResults> {
        match self {
            Self::Results { items, total_count } => {
                let items = items
                    .into_iter()
                    .map(|wire| ResultItem::from_json_text(wire.namespace, wire.json))
                    .collect();
                Some(QueryResults::from_items(items, total_count as usize))
            }
            _ => None,
        }
    }

    /// Returns true for [`Response::Error`].
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_body, encode_body};
    use docbridge_core::{Condition, FieldType, IndexOpts, IndexType};
    use serde_json::json;

    #[test]
    fn select_query_survives_the_wire() {
        let query = Query::new("items")
            .filter(Condition::eq("id", json!(5)).or(Condition::in_list("tag", vec![json!("a")])))
            .sort("id", true)
            .limit(10);
        let request = Request::Select { query };

        let decoded: Request = decode_body(&encode_body(&request).unwrap()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn index_definition_survives_the_wire() {
        let definition = IndexDef::with_json_paths(
            "a+b",
            vec!["a".into(), "b".into()],
            IndexType::Tree,
            FieldType::Composite,
            IndexOpts::new().dense(true),
        );
        let request = Request::AddIndex {
            namespace: "items".into(),
            definition,
        };

        let decoded: Request = decode_body(&encode_body(&request).unwrap()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn error_response_carries_kind() {
        let response = Response::error(&CoreError::namespace_not_found("ghost"));
        match response {
            Response::Error { kind, message } => {
                assert_eq!(kind, ErrorKind::Schema);
                assert!(message.contains("ghost"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn undecodable_item_keeps_position() {
        let response = Response::Results {
            items: vec![
                WireItem {
                    namespace: "items".into(),
                    json: r#"{"id":1}"#.into(),
                },
                WireItem {
                    namespace: "items".into(),
                    json: "{broken".into(),
                },
            ],
            total_count: 7,
        };

        let results = response.into_results().unwrap();
        assert_eq!(results.count(), 2);
        assert_eq!(results.total_count(), 7);
        assert!(results.get(0).unwrap().is_ok());
        assert!(!results.get(1).unwrap().is_ok());
    }

    #[test]
    fn non_results_do_not_convert() {
        assert!(Response::Ok.into_results().is_none());
        assert!(!Response::Ok.is_error());
    }
}
