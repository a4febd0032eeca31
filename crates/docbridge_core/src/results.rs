//! Query results.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One document of a result set.
///
/// A remote client may receive an item it cannot decode; such items stay in
/// the result set so positions are preserved, but carry an error status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    namespace: String,
    json: String,
    error: Option<String>,
}

impl ResultItem {
    /// Creates an item from a document.
    pub fn from_document(namespace: impl Into<String>, document: &Value) -> CoreResult<Self> {
        Ok(Self {
            namespace: namespace.into(),
            json: serde_json::to_string(document)?,
            error: None,
        })
    }

    /// Creates an item from JSON text received from elsewhere, checking it
    /// is a JSON object.
    pub fn from_json_text(namespace: impl Into<String>, json: impl Into<String>) -> Self {
        let json = json.into();
        let error = match serde_json::from_str::<Value>(&json) {
            Ok(Value::Object(_)) => None,
            Ok(_) => Some("document is not a JSON object".to_owned()),
            Err(e) => Some(format!("cannot decode document: {e}")),
        };
        Self {
            namespace: namespace.into(),
            json,
            error,
        }
    }

    /// Creates an item that failed to materialize.
    pub fn failed(namespace: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            json: String::new(),
            error: Some(message.into()),
        }
    }

    /// Namespace the document came from.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns true if the item decoded successfully.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The failure recorded for this item, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// JSON text of the document.
    pub fn json(&self) -> CoreResult<&str> {
        match &self.error {
            None => Ok(&self.json),
            Some(message) => Err(CoreError::query_execution(message.clone())),
        }
    }

    /// Parses the document.
    pub fn document(&self) -> CoreResult<Value> {
        Ok(serde_json::from_str(self.json()?)?)
    }
}

/// Documents produced by a query, in result order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    items: Vec<ResultItem>,
    total_count: usize,
}

impl QueryResults {
    /// Creates an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a result set from items and a total match count.
    #[must_use]
    pub fn from_items(items: Vec<ResultItem>, total_count: usize) -> Self {
        Self { items, total_count }
    }

    /// Number of items held.
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the result set holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of matching documents before `LIMIT`/`OFFSET`.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Returns the item at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ResultItem> {
        self.items.get(index)
    }

    /// Iterates over the items in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ResultItem> {
        self.items.iter()
    }

    /// Appends an item.
    pub fn push(&mut self, item: ResultItem) {
        self.items.push(item);
    }

    /// Sets the total match count.
    pub fn set_total_count(&mut self, total_count: usize) {
        self.total_count = total_count;
    }

    /// Drops every item.
    pub fn clear(&mut self) {
        self.items.clear();
        self.total_count = 0;
    }

    /// Consumes the result set, returning its items.
    #[must_use]
    pub fn into_items(self) -> Vec<ResultItem> {
        self.items
    }
}

impl<'a> IntoIterator for &'a QueryResults {
    type Item = &'a ResultItem;
    type IntoIter = std::slice::Iter<'a, ResultItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
