//! Namespaces: named collections of documents with their indexes.

use crate::document::get_path;
use crate::error::{CoreError, CoreResult};
use crate::index::{Index, IndexDef, RowId};
use crate::item::{extract_all, IndexKeys, Item, ItemModifyMode, Schema};
use crate::key::KeyValue;
use crate::log::{LogRecord, NamespaceLog};
use crate::query::exec;
use crate::query::{Query, UpdateAction, UpdateQuery};
use crate::results::{QueryResults, ResultItem};
use serde_json::Value;
use std::collections::BTreeMap;

/// Checks a namespace name: non-empty, ASCII letters, digits, `_` and `-`.
pub fn validate_name(name: &str) -> CoreResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidNamespaceName {
            name: name.to_owned(),
        })
    }
}

#[derive(Debug, Clone)]
struct Row {
    doc: Value,
    keys: IndexKeys,
}

/// An index built over the current rows, not yet installed.
struct BuiltIndex {
    index: Index,
    row_keys: Vec<(RowId, Vec<KeyValue>)>,
}

/// A collection of documents.
///
/// Documents are kept in insertion order; replacing a document keeps its
/// position. Every change is appended to the namespace log when the
/// namespace has one, before it becomes visible: a failed append leaves
/// the namespace unchanged.
#[derive(Debug)]
pub struct Namespace {
    name: String,
    indexes: Vec<Index>,
    rows: BTreeMap<RowId, Row>,
    next_row: RowId,
    log: Option<NamespaceLog>,
}

impl Namespace {
    /// Creates an empty namespace without persistence.
    pub fn new(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            indexes: Vec::new(),
            rows: BTreeMap::new(),
            next_row: 0,
            log: None,
        })
    }

    /// Loads a namespace from its log; later changes are appended to it.
    pub fn open(name: impl Into<String>, mut log: NamespaceLog) -> CoreResult<Self> {
        let mut namespace = Self::new(name)?;
        for record in log.load()? {
            namespace.replay(record)?;
        }
        namespace.log = Some(log);
        tracing::debug!(
            namespace = %namespace.name,
            items = namespace.rows.len(),
            indexes = namespace.indexes.len(),
            "namespace loaded"
        );
        Ok(namespace)
    }

    /// Rewrites the log from the live state once it has grown beyond
    /// `2 * (items + indexes) + slack` records.
    pub fn compact_if_needed(&mut self, slack: usize) -> CoreResult<bool> {
        let live = self.rows.len() + self.indexes.len();
        let Some(log) = self.log.as_ref() else {
            return Ok(false);
        };
        if log.record_count() <= 2 * live + slack {
            return Ok(false);
        }

        let mut records: Vec<LogRecord> = self
            .indexes
            .iter()
            .map(|index| LogRecord::AddIndex(index.def().clone()))
            .collect();
        for row in self.rows.values() {
            records.push(LogRecord::Put {
                json: serde_json::to_string(&row.doc)?,
            });
        }

        if let Some(log) = self.log.as_mut() {
            let before = log.record_count();
            log.rewrite(&records)?;
            tracing::debug!(
                namespace = %self.name,
                before,
                after = records.len(),
                "namespace log compacted"
            );
        }
        Ok(true)
    }

    /// Namespace name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the namespace holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns true if changes are persisted.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.log.is_some()
    }

    /// Snapshot of the index definitions.
    #[must_use]
    pub fn schema(&self) -> Schema {
        Schema {
            namespace: self.name.clone(),
            indexes: self.indexes.iter().map(|index| index.def().clone()).collect(),
        }
    }

    /// Indexes in creation order.
    #[must_use]
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|index| index.def().name == name)
    }

    pub(crate) fn row(&self, row: RowId) -> Option<&Value> {
        self.rows.get(&row).map(|r| &r.doc)
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = (RowId, &Value)> {
        self.rows.iter().map(|(id, row)| (*id, &row.doc))
    }

    fn pk_position(&self) -> Option<usize> {
        self.indexes.iter().position(|index| index.def().is_pk())
    }

    /// Adds an index and builds it from the existing documents.
    ///
    /// Adding a definition identical to an existing one is a no-op.
    pub fn add_index(&mut self, def: IndexDef) -> CoreResult<()> {
        let Some(built) = self.build_index(def.clone())? else {
            return Ok(());
        };
        self.append(&LogRecord::AddIndex(def))?;
        tracing::debug!(namespace = %self.name, index = %built.index.def().name, "index added");
        self.install_index(built);
        Ok(())
    }

    /// Drops an index. The primary key cannot be dropped.
    pub fn drop_index(&mut self, name: &str) -> CoreResult<()> {
        let position = self.droppable_index(name)?;
        self.append(&LogRecord::DropIndex {
            name: name.to_owned(),
        })?;
        tracing::debug!(namespace = %self.name, index = %name, "index dropped");
        self.remove_index(position);
        Ok(())
    }

    /// Builds `def` over the current rows; `None` if it already exists.
    fn build_index(&self, def: IndexDef) -> CoreResult<Option<BuiltIndex>> {
        def.validate()?;

        if let Some(existing) = self.index(&def.name) {
            if existing.def() == &def {
                return Ok(None);
            }
            return Err(CoreError::IndexConflict { name: def.name });
        }
        if def.is_pk() && self.pk_position().is_some() {
            return Err(CoreError::invalid_index(format!(
                "namespace {} already has a primary key",
                self.name
            )));
        }

        let mut row_keys = Vec::with_capacity(self.rows.len());
        for (row, data) in &self.rows {
            let keys = def.extract_keys(&data.doc)?;
            if def.is_pk() && keys.len() != 1 {
                return Err(CoreError::invalid_item(format!(
                    "existing item has no single value for primary key {:?}",
                    def.name
                )));
            }
            row_keys.push((*row, keys));
        }

        let mut index = Index::new(def);
        for (row, keys) in &row_keys {
            if index.def().is_pk() {
                if let (Some(lookup), Some(key)) = (index.keys(), keys.first()) {
                    if lookup.contains(key) {
                        return Err(self.duplicate(key));
                    }
                }
            }
            index.insert_row(keys, *row);
        }
        Ok(Some(BuiltIndex { index, row_keys }))
    }

    fn install_index(&mut self, built: BuiltIndex) {
        for (row, keys) in built.row_keys {
            if let Some(data) = self.rows.get_mut(&row) {
                data.keys.push(keys);
            }
        }
        self.indexes.push(built.index);
    }

    fn droppable_index(&self, name: &str) -> CoreResult<usize> {
        let position = self
            .indexes
            .iter()
            .position(|index| index.def().name == name)
            .ok_or_else(|| CoreError::IndexNotFound {
                name: name.to_owned(),
            })?;
        if self.indexes[position].def().is_pk() {
            return Err(CoreError::invalid_operation(format!(
                "cannot drop primary key index {name:?}"
            )));
        }
        Ok(position)
    }

    fn remove_index(&mut self, position: usize) {
        self.indexes.remove(position);
        for row in self.rows.values_mut() {
            if position < row.keys.len() {
                row.keys.remove(position);
            }
        }
    }

    /// Creates an empty item bound to the current schema.
    #[must_use]
    pub fn new_item(&self) -> Item {
        Item::new(self.schema())
    }

    /// Applies a mutation.
    pub fn modify(&mut self, item: Item, mode: ItemModifyMode) -> CoreResult<()> {
        let stale = item.schema().indexes.len() != self.indexes.len()
            || item
                .schema()
                .indexes
                .iter()
                .zip(&self.indexes)
                .any(|(def, index)| def != index.def());
        let (doc, keys) = item.into_parts()?;
        let keys = if stale {
            extract_all(&self.schema(), &doc)?
        } else {
            keys
        };

        let target = self.target_row(&keys, mode)?;
        let json = serde_json::to_string(&doc)?;
        if mode == ItemModifyMode::Delete {
            self.append(&LogRecord::Delete { json })?;
            if let Some(row) = target {
                self.remove_row(row);
            }
        } else {
            self.append(&LogRecord::Put { json })?;
            self.put_row(target, doc, keys);
        }
        Ok(())
    }

    fn pk_of(&self, keys: &IndexKeys) -> CoreResult<(usize, KeyValue)> {
        let position = self.pk_position().ok_or_else(|| CoreError::NoPrimaryKey {
            namespace: self.name.clone(),
        })?;
        let key = keys
            .get(position)
            .and_then(|k| k.first())
            .cloned()
            .ok_or_else(|| CoreError::invalid_item("primary key value is missing"))?;
        Ok((position, key))
    }

    fn find_pk(&self, position: usize, key: &KeyValue) -> Option<RowId> {
        self.indexes[position]
            .keys()
            .and_then(|lookup| lookup.lookup(key).into_iter().next())
    }

    /// Row holding the item's primary key, checked against the mode.
    fn target_row(&self, keys: &IndexKeys, mode: ItemModifyMode) -> CoreResult<Option<RowId>> {
        let (position, pk) = self.pk_of(keys)?;
        let existing = self.find_pk(position, &pk);
        match (mode, existing) {
            (ItemModifyMode::Insert, Some(_)) => Err(self.duplicate(&pk)),
            (ItemModifyMode::Update | ItemModifyMode::Delete, None) => Err(self.not_found(&pk)),
            _ => Ok(existing),
        }
    }

    fn put_row(&mut self, existing: Option<RowId>, doc: Value, keys: IndexKeys) {
        match existing {
            Some(row) => self.replace_row(row, doc, keys),
            None => {
                let row = self.next_row;
                self.next_row += 1;
                for (index, index_keys) in self.indexes.iter_mut().zip(&keys) {
                    index.insert_row(index_keys, row);
                }
                self.rows.insert(row, Row { doc, keys });
            }
        }
    }

    fn replace_row(&mut self, row: RowId, doc: Value, keys: IndexKeys) {
        if let Some(old) = self.rows.get(&row) {
            for (index, old_keys) in self.indexes.iter_mut().zip(&old.keys) {
                index.remove_row(old_keys, row);
            }
        }
        for (index, new_keys) in self.indexes.iter_mut().zip(&keys) {
            index.insert_row(new_keys, row);
        }
        self.rows.insert(row, Row { doc, keys });
    }

    fn remove_row(&mut self, row: RowId) -> Option<Value> {
        let old = self.rows.remove(&row)?;
        for (index, old_keys) in self.indexes.iter_mut().zip(&old.keys) {
            index.remove_row(old_keys, row);
        }
        Some(old.doc)
    }

    /// Runs a select.
    pub fn select(&self, query: &Query) -> CoreResult<QueryResults> {
        exec::select(self, query)
    }

    /// Runs a bulk update and returns the updated documents.
    ///
    /// Every updated document is validated, and the whole batch logged,
    /// before any is written.
    pub fn update_by_query(&mut self, update: &UpdateQuery) -> CoreResult<QueryResults> {
        let rows = exec::matching_rows(self, update.filter.as_ref())?;
        let schema = self.schema();
        let pk_paths: Vec<&str> = schema
            .pk()
            .map(|def| def.json_paths.iter().map(String::as_str).collect())
            .unwrap_or_default();

        let mut staged = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(current) = self.row(row) else {
                continue;
            };
            let mut doc = current.clone();
            apply_action(&mut doc, &update.action)?;

            if let Some(path) = pk_paths
                .iter()
                .find(|path| get_path(current, path) != get_path(&doc, path))
            {
                return Err(CoreError::query_execution(format!(
                    "UPDATE cannot change primary key field {path:?}"
                )));
            }
            let keys = extract_all(&schema, &doc)?;
            staged.push((row, doc, keys));
        }

        let mut results = QueryResults::new();
        let mut records = Vec::with_capacity(staged.len());
        for (_, doc, _) in &staged {
            results.push(ResultItem::from_document(&self.name, doc)?);
            records.push(LogRecord::Put {
                json: serde_json::to_string(doc)?,
            });
        }
        self.append_batch(&records)?;

        for (row, doc, keys) in staged {
            self.replace_row(row, doc, keys);
        }
        results.set_total_count(results.count());
        Ok(results)
    }

    /// Deletes every matching document and returns them.
    ///
    /// The deletions are logged as one batch before any is applied.
    pub fn delete_by_query(&mut self, query: &Query) -> CoreResult<QueryResults> {
        let rows = exec::matching_rows(self, query.filter.as_ref())?;
        let mut results = QueryResults::new();
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(doc) = self.row(*row) {
                results.push(ResultItem::from_document(&self.name, doc)?);
                records.push(LogRecord::Delete {
                    json: serde_json::to_string(doc)?,
                });
            }
        }
        self.append_batch(&records)?;

        for row in rows {
            self.remove_row(row);
        }
        results.set_total_count(results.count());
        Ok(results)
    }

    fn replay(&mut self, record: LogRecord) -> CoreResult<()> {
        match record {
            LogRecord::AddIndex(def) => {
                if let Some(built) = self.build_index(def)? {
                    self.install_index(built);
                }
            }
            LogRecord::DropIndex { name } => {
                let position = self.droppable_index(&name)?;
                self.remove_index(position);
            }
            LogRecord::Put { json } => {
                let doc: Value = serde_json::from_str(&json)?;
                let keys = extract_all(&self.schema(), &doc)?;
                let target = self.target_row(&keys, ItemModifyMode::Upsert)?;
                self.put_row(target, doc, keys);
            }
            LogRecord::Delete { json } => {
                let doc: Value = serde_json::from_str(&json)?;
                let keys = extract_all(&self.schema(), &doc)?;
                let (position, pk) = self.pk_of(&keys)?;
                if let Some(row) = self.find_pk(position, &pk) {
                    self.remove_row(row);
                }
            }
        }
        Ok(())
    }

    fn append(&mut self, record: &LogRecord) -> CoreResult<()> {
        match self.log.as_mut() {
            Some(log) => log.append(record),
            None => Ok(()),
        }
    }

    fn append_batch(&mut self, records: &[LogRecord]) -> CoreResult<()> {
        match self.log.as_mut() {
            Some(log) if !records.is_empty() => log.append_batch(records),
            _ => Ok(()),
        }
    }

    fn duplicate(&self, key: &KeyValue) -> CoreError {
        CoreError::DuplicateKey {
            namespace: self.name.clone(),
            key: key.to_string(),
        }
    }

    fn not_found(&self, key: &KeyValue) -> CoreError {
        CoreError::ItemNotFound {
            namespace: self.name.clone(),
            key: key.to_string(),
        }
    }
}

fn apply_action(doc: &mut Value, action: &UpdateAction) -> CoreResult<()> {
    match action {
        UpdateAction::Set(assignments) => {
            for (path, value) in assignments {
                if !crate::document::set_path(doc, path, value.clone()) {
                    return Err(CoreError::query_execution(format!(
                        "cannot set {path:?}: parent is not an object"
                    )));
                }
            }
        }
        UpdateAction::Drop(paths) => {
            for path in paths {
                crate::document::remove_path(doc, path);
            }
        }
    }
    Ok(())
}
