//! Items: documents validated against a namespace schema.

use crate::error::{CoreError, CoreResult};
use crate::index::IndexDef;
use crate::key::KeyValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a mutation does with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemModifyMode {
    /// Add a new item; fails if the primary key exists.
    Insert,
    /// Replace an existing item; fails if the primary key is missing.
    Update,
    /// Insert or replace.
    Upsert,
    /// Remove the item with the same primary key.
    Delete,
}

impl ItemModifyMode {
    /// Lowercase verb, for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }
}

/// Snapshot of the index definitions of a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Namespace the schema belongs to.
    pub namespace: String,
    /// Index definitions in creation order.
    pub indexes: Vec<IndexDef>,
}

impl Schema {
    /// Returns the primary key definition, if any.
    #[must_use]
    pub fn pk(&self) -> Option<&IndexDef> {
        self.indexes.iter().find(|def| def.is_pk())
    }

    /// Looks up a definition by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|def| def.name == name)
    }
}

/// Keys an item contributes to each index of its schema, in schema order.
pub type IndexKeys = Vec<Vec<KeyValue>>;

/// A document bound to a namespace schema.
///
/// Created empty by [`crate::Database::new_item`] and filled with
/// [`Item::from_json`], which checks every indexed field against its
/// declared type.
#[derive(Debug, Clone)]
pub struct Item {
    schema: Schema,
    document: Option<Value>,
    keys: IndexKeys,
}

impl Item {
    /// Creates an empty item for `schema`.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            document: None,
            keys: Vec::new(),
        }
    }

    /// Parses and validates a JSON document.
    ///
    /// On failure the item keeps its previous contents.
    pub fn from_json(&mut self, json: &str) -> CoreResult<()> {
        let document: Value = serde_json::from_str(json)?;
        self.set_document(document)
    }

    /// Validates and stores an already parsed document.
    pub fn set_document(&mut self, document: Value) -> CoreResult<()> {
        let keys = extract_all(&self.schema, &document)?;
        self.document = Some(document);
        self.keys = keys;
        Ok(())
    }

    /// Name of the namespace this item belongs to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.schema.namespace
    }

    /// The schema the item was validated against.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The document, once one has been set.
    #[must_use]
    pub fn document(&self) -> Option<&Value> {
        self.document.as_ref()
    }

    /// Keys per index, in schema order.
    #[must_use]
    pub fn keys(&self) -> &IndexKeys {
        &self.keys
    }

    /// Serializes the document.
    pub fn to_json(&self) -> CoreResult<String> {
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| CoreError::invalid_item("item is empty"))?;
        Ok(serde_json::to_string(document)?)
    }

    /// Returns the primary key of the document.
    pub fn pk_key(&self) -> CoreResult<KeyValue> {
        if self.document.is_none() {
            return Err(CoreError::invalid_item("item is empty"));
        }
        let position = self
            .schema
            .indexes
            .iter()
            .position(IndexDef::is_pk)
            .ok_or_else(|| CoreError::NoPrimaryKey {
                namespace: self.schema.namespace.clone(),
            })?;
        self.keys
            .get(position)
            .and_then(|keys| keys.first())
            .cloned()
            .ok_or_else(|| CoreError::invalid_item("primary key value is missing"))
    }

    /// Consumes the item, returning its document and keys.
    pub fn into_parts(self) -> CoreResult<(Value, IndexKeys)> {
        let document = self
            .document
            .ok_or_else(|| CoreError::invalid_item("item is empty"))?;
        Ok((document, self.keys))
    }
}

/// Checks a document against every index of `schema`.
pub fn extract_all(schema: &Schema, document: &Value) -> CoreResult<IndexKeys> {
    if !document.is_object() {
        return Err(CoreError::invalid_item("document must be a JSON object"));
    }

    let mut keys = Vec::with_capacity(schema.indexes.len());
    for def in &schema.indexes {
        let index_keys = def.extract_keys(document)?;
        if def.is_pk() && index_keys.len() != 1 {
            return Err(CoreError::invalid_item(format!(
                "primary key {:?} must hold exactly one value",
                def.name
            )));
        }
        keys.push(index_keys);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{FieldType, IndexOpts, IndexType};

    fn schema() -> Schema {
        Schema {
            namespace: "items".into(),
            indexes: vec![
                IndexDef::new("id", IndexType::Hash, FieldType::Int, IndexOpts::new().pk(true)),
                IndexDef::new("name", IndexType::Tree, FieldType::String, IndexOpts::new()),
            ],
        }
    }

    #[test]
    fn valid_document() {
        let mut item = Item::new(schema());
        item.from_json(r#"{"id":1,"name":"a","extra":[1,2]}"#).unwrap();
        assert_eq!(item.pk_key().unwrap(), KeyValue::Int(1));
        assert_eq!(item.keys()[1], vec![KeyValue::String("a".into())]);
        assert_eq!(item.namespace(), "items");
    }

    #[test]
    fn malformed_json_keeps_previous_contents() {
        let mut item = Item::new(schema());
        item.from_json(r#"{"id":1}"#).unwrap();
        assert!(matches!(item.from_json("{oops"), Err(CoreError::Json(_))));
        assert_eq!(item.to_json().unwrap(), r#"{"id":1}"#);
    }

    #[test]
    fn type_mismatch_rejected() {
        let mut item = Item::new(schema());
        assert!(matches!(
            item.from_json(r#"{"id":"1"}"#),
            Err(CoreError::InvalidItem { .. })
        ));
        assert!(item.from_json(r#"{"id":1,"name":5}"#).is_err());
        assert!(item.from_json("[1,2]").is_err());
    }

    #[test]
    fn missing_pk_detected() {
        let mut item = Item::new(schema());
        assert!(item.from_json(r#"{"name":"a"}"#).is_err());
    }

    #[test]
    fn schema_without_pk() {
        let mut item = Item::new(Schema {
            namespace: "loose".into(),
            indexes: Vec::new(),
        });
        item.from_json(r#"{"anything":true}"#).unwrap();
        assert!(matches!(item.pk_key(), Err(CoreError::NoPrimaryKey { .. })));
    }
}
