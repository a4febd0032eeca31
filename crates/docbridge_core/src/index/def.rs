//! Index definitions.

use crate::document::get_path;
use crate::error::{CoreError, CoreResult};
use crate::key::KeyValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Lookup structure behind an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    /// Equality lookups.
    #[serde(rename = "hash")]
    Hash,
    /// Ordered lookups: equality and ranges.
    #[serde(rename = "tree")]
    Tree,
    /// Type-checked but not indexed.
    #[serde(rename = "-")]
    Store,
}

impl IndexType {
    /// Returns the textual name used in definitions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Tree => "tree",
            Self::Store => "-",
        }
    }
}

impl FromStr for IndexType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hash" => Ok(Self::Hash),
            "tree" => Ok(Self::Tree),
            "-" | "" => Ok(Self::Store),
            other => Err(CoreError::invalid_index(format!("unknown index type {other:?}"))),
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value type of an indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// 32-bit style integer (stored as `i64`).
    Int,
    /// 64-bit integer.
    Int64,
    /// Floating point number.
    Double,
    /// UTF-8 string.
    String,
    /// Boolean.
    Bool,
    /// Tuple of the values at several JSON paths.
    Composite,
}

impl FieldType {
    /// Returns the textual name used in definitions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Int64 => "int64",
            Self::Double => "double",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Composite => "composite",
        }
    }
}

impl FromStr for FieldType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int" => Ok(Self::Int),
            "int64" => Ok(Self::Int64),
            "double" => Ok(Self::Double),
            "string" => Ok(Self::String),
            "bool" => Ok(Self::Bool),
            "composite" => Ok(Self::Composite),
            other => Err(CoreError::invalid_index(format!("unknown field type {other:?}"))),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String comparison mode of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollateMode {
    /// Byte-wise comparison.
    #[default]
    None,
    /// ASCII case-insensitive.
    Ascii,
    /// Strings holding numbers compare as numbers.
    Numeric,
    /// Unicode case-insensitive.
    Utf8,
}

impl FromStr for CollateMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "ascii" => Ok(Self::Ascii),
            "numeric" => Ok(Self::Numeric),
            "utf8" => Ok(Self::Utf8),
            other => Err(CoreError::invalid_index(format!("unknown collate mode {other:?}"))),
        }
    }
}

/// Flags of an index definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOpts {
    /// Primary key.
    pub is_pk: bool,
    /// Field holds an array; each element is a key.
    pub is_array: bool,
    /// Compact index without per-key row caches.
    pub is_dense: bool,
    /// Missing values are allowed and not indexed.
    pub is_sparse: bool,
    /// String comparison mode.
    pub collate_mode: CollateMode,
}

impl IndexOpts {
    /// Creates options with every flag cleared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the index as primary key.
    #[must_use]
    pub const fn pk(mut self, value: bool) -> Self {
        self.is_pk = value;
        self
    }

    /// Marks the index as array.
    #[must_use]
    pub const fn array(mut self, value: bool) -> Self {
        self.is_array = value;
        self
    }

    /// Marks the index as dense.
    #[must_use]
    pub const fn dense(mut self, value: bool) -> Self {
        self.is_dense = value;
        self
    }

    /// Marks the index as sparse.
    #[must_use]
    pub const fn sparse(mut self, value: bool) -> Self {
        self.is_sparse = value;
        self
    }

    /// Sets the collate mode.
    #[must_use]
    pub const fn collate(mut self, mode: CollateMode) -> Self {
        self.collate_mode = mode;
        self
    }
}

/// A complete index definition.
///
/// The JSON form is flat:
///
/// ```json
/// {"name":"id","json_paths":["id"],"index_type":"hash","field_type":"int","is_pk":true}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name, used in queries.
    pub name: String,
    /// Document paths the index reads.
    #[serde(default)]
    pub json_paths: Vec<String>,
    /// Lookup structure.
    pub index_type: IndexType,
    /// Value type.
    pub field_type: FieldType,
    /// Flags.
    #[serde(flatten)]
    pub opts: IndexOpts,
}

impl IndexDef {
    /// Creates a single-field definition whose only path is the index name.
    pub fn new(
        name: impl Into<String>,
        index_type: IndexType,
        field_type: FieldType,
        opts: IndexOpts,
    ) -> Self {
        let name = name.into();
        Self {
            json_paths: vec![name.clone()],
            name,
            index_type,
            field_type,
            opts,
        }
    }

    /// Creates a definition over explicit JSON paths.
    pub fn with_json_paths(
        name: impl Into<String>,
        json_paths: Vec<String>,
        index_type: IndexType,
        field_type: FieldType,
        opts: IndexOpts,
    ) -> Self {
        Self {
            name: name.into(),
            json_paths,
            index_type,
            field_type,
            opts,
        }
    }

    /// Parses a serialized definition.
    ///
    /// A definition without `json_paths` is indexed on its name.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let mut def: Self = serde_json::from_str(json)
            .map_err(|e| CoreError::invalid_index(format!("malformed definition: {e}")))?;
        if def.json_paths.is_empty() {
            def.json_paths.push(def.name.clone());
        }
        Ok(def)
    }

    /// Serializes the definition.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns true for primary key definitions.
    #[must_use]
    pub fn is_pk(&self) -> bool {
        self.opts.is_pk
    }

    /// Checks the definition is internally consistent.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::invalid_index("index name is empty"));
        }
        if self.json_paths.is_empty() || self.json_paths.iter().any(|p| p.trim().is_empty()) {
            return Err(CoreError::invalid_index(format!(
                "index {:?} has an empty JSON path",
                self.name
            )));
        }
        if self.field_type == FieldType::Composite && self.json_paths.len() < 2 {
            return Err(CoreError::invalid_index(format!(
                "composite index {:?} needs at least two JSON paths",
                self.name
            )));
        }
        if self.field_type == FieldType::Composite && self.opts.is_array {
            return Err(CoreError::invalid_index("composite index cannot be array"));
        }
        if self.opts.is_pk {
            if self.index_type == IndexType::Store {
                return Err(CoreError::invalid_index("primary key must be hash or tree"));
            }
            if self.opts.is_sparse || self.opts.is_array {
                return Err(CoreError::invalid_index(
                    "primary key cannot be sparse or array",
                ));
            }
        }
        Ok(())
    }

    /// Extracts the keys a document contributes to this index.
    ///
    /// Fails when a value does not have the declared type, or when an array
    /// is found on a non-array index. Missing and null values contribute no
    /// key.
    pub fn extract_keys(&self, doc: &Value) -> CoreResult<Vec<KeyValue>> {
        let collate = self.opts.collate_mode;

        if self.field_type == FieldType::Composite {
            let mut parts = Vec::with_capacity(self.json_paths.len());
            for path in &self.json_paths {
                match get_path(doc, path) {
                    None | Some(Value::Null) => return Ok(Vec::new()),
                    Some(value @ (Value::Array(_) | Value::Object(_))) => {
                        return Err(self.type_error(path, value));
                    }
                    Some(value) => parts.push(
                        KeyValue::from_literal(value, collate)
                            .ok_or_else(|| self.type_error(path, value))?,
                    ),
                }
            }
            return Ok(vec![KeyValue::Tuple(parts)]);
        }

        let mut keys = Vec::new();
        for path in &self.json_paths {
            match get_path(doc, path) {
                None | Some(Value::Null) => {}
                Some(Value::Array(items)) => {
                    if !self.opts.is_array {
                        return Err(CoreError::invalid_item(format!(
                            "field {path:?} of index {:?} holds an array",
                            self.name
                        )));
                    }
                    for item in items {
                        keys.push(self.scalar_key(path, item)?);
                    }
                }
                Some(value) => keys.push(self.scalar_key(path, value)?),
            }
        }
        Ok(keys)
    }

    fn scalar_key(&self, path: &str, value: &Value) -> CoreResult<KeyValue> {
        KeyValue::from_json(value, self.field_type, self.opts.collate_mode)
            .ok_or_else(|| self.type_error(path, value))
    }

    fn type_error(&self, path: &str, value: &Value) -> CoreError {
        CoreError::invalid_item(format!(
            "field {path:?} of index {:?} expects {}, got {value}",
            self.name, self.field_type
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_field_uses_name_as_path() {
        let def = IndexDef::new("id", IndexType::Hash, FieldType::Int, IndexOpts::new().pk(true));
        assert_eq!(def.json_paths, vec!["id".to_string()]);
        def.validate().unwrap();
    }

    #[test]
    fn json_round_trip_is_flat() {
        let def = IndexDef::new(
            "name",
            IndexType::Tree,
            FieldType::String,
            IndexOpts::new().collate(CollateMode::Ascii),
        );
        let json = def.to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["index_type"], "tree");
        assert_eq!(value["collate_mode"], "ascii");
        assert_eq!(value["is_pk"], false);
        assert_eq!(IndexDef::from_json(&json).unwrap(), def);
    }

    #[test]
    fn from_json_defaults() {
        let def =
            IndexDef::from_json(r#"{"name":"age","index_type":"-","field_type":"int"}"#).unwrap();
        assert_eq!(def.json_paths, vec!["age".to_string()]);
        assert_eq!(def.index_type, IndexType::Store);
        assert_eq!(def.opts, IndexOpts::default());

        assert!(IndexDef::from_json("{not json").is_err());
        assert!(IndexDef::from_json(r#"{"name":"x","index_type":"btree","field_type":"int"}"#)
            .is_err());
    }

    #[test]
    fn validation_rules() {
        let sparse_pk = IndexDef::new(
            "id",
            IndexType::Hash,
            FieldType::Int,
            IndexOpts::new().pk(true).sparse(true),
        );
        assert!(sparse_pk.validate().is_err());

        let store_pk =
            IndexDef::new("id", IndexType::Store, FieldType::Int, IndexOpts::new().pk(true));
        assert!(store_pk.validate().is_err());

        let lonely_composite = IndexDef::new(
            "a",
            IndexType::Hash,
            FieldType::Composite,
            IndexOpts::new(),
        );
        assert!(lonely_composite.validate().is_err());
    }

    #[test]
    fn extract_scalar_and_array_keys() {
        let def = IndexDef::new("tags", IndexType::Hash, FieldType::String, IndexOpts::new());
        assert!(def.extract_keys(&json!({"tags": ["a", "b"]})).is_err());

        let arr = IndexDef::new(
            "tags",
            IndexType::Hash,
            FieldType::String,
            IndexOpts::new().array(true),
        );
        assert_eq!(arr.extract_keys(&json!({"tags": ["a", "b"]})).unwrap().len(), 2);
        assert!(arr.extract_keys(&json!({})).unwrap().is_empty());
        assert!(arr.extract_keys(&json!({"tags": [1]})).is_err());
    }

    #[test]
    fn extract_composite_key() {
        let def = IndexDef::with_json_paths(
            "id+fk",
            vec!["id".into(), "fk".into()],
            IndexType::Hash,
            FieldType::Composite,
            IndexOpts::new(),
        );
        let keys = def.extract_keys(&json!({"id": 1, "fk": "x"})).unwrap();
        assert_eq!(
            keys,
            vec![KeyValue::Tuple(vec![KeyValue::Int(1), KeyValue::String("x".into())])]
        );
        assert!(def.extract_keys(&json!({"id": 1})).unwrap().is_empty());
    }
}
