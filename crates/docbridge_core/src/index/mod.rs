//! Secondary and primary key indexes.
//!
//! An [`Index`] couples an [`IndexDef`] with the lookup structure its type
//! calls for:
//!
//! - `hash`: [`HashKeyIndex`], equality only
//! - `tree`: [`TreeKeyIndex`], equality and ranges
//! - `-`: no lookup structure, values are only type-checked

mod def;
mod hash;
mod tree;

pub use def::{CollateMode, FieldType, IndexDef, IndexOpts, IndexType};
pub use hash::HashKeyIndex;
pub use tree::TreeKeyIndex;

use crate::key::KeyValue;
use std::collections::BTreeSet;
use std::ops::Bound;

/// Position of a document inside its namespace.
///
/// Row ids grow monotonically, so ordering by row id is insertion order.
pub type RowId = u64;

/// Lookup structure from key to rows.
pub trait KeyIndex: Send + Sync {
    /// Adds a key-row mapping.
    fn insert(&mut self, key: KeyValue, row: RowId);

    /// Removes a key-row mapping. Returns true if it existed.
    fn remove(&mut self, key: &KeyValue, row: RowId) -> bool;

    /// Rows holding exactly `key`.
    fn lookup(&self, key: &KeyValue) -> BTreeSet<RowId>;

    /// Rows whose key lies in the range, or `None` when the structure is
    /// unordered.
    fn range(&self, lower: Bound<&KeyValue>, upper: Bound<&KeyValue>) -> Option<BTreeSet<RowId>>;

    /// Returns true if any row holds `key`.
    fn contains(&self, key: &KeyValue) -> bool;

    /// Number of key-row mappings.
    fn len(&self) -> usize;

    /// Returns true if the index holds no mappings.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every mapping.
    fn clear(&mut self);
}

/// An index of a namespace.
pub struct Index {
    def: IndexDef,
    keys: Option<Box<dyn KeyIndex>>,
}

impl Index {
    /// Creates an empty index for `def`.
    #[must_use]
    pub fn new(def: IndexDef) -> Self {
        let keys: Option<Box<dyn KeyIndex>> = match def.index_type {
            IndexType::Hash => Some(Box::new(HashKeyIndex::new())),
            IndexType::Tree => Some(Box::new(TreeKeyIndex::new())),
            IndexType::Store => None,
        };
        Self { def, keys }
    }

    /// Returns the definition.
    #[must_use]
    pub fn def(&self) -> &IndexDef {
        &self.def
    }

    /// Returns the lookup structure, if the index has one.
    #[must_use]
    pub fn keys(&self) -> Option<&dyn KeyIndex> {
        self.keys.as_deref()
    }

    /// Adds all keys of a row.
    pub fn insert_row(&mut self, keys: &[KeyValue], row: RowId) {
        if let Some(index) = self.keys.as_mut() {
            for key in keys {
                index.insert(key.clone(), row);
            }
        }
    }

    /// Removes all keys of a row.
    pub fn remove_row(&mut self, keys: &[KeyValue], row: RowId) {
        if let Some(index) = self.keys.as_mut() {
            for key in keys {
                index.remove(key, row);
            }
        }
    }

    /// Drops every mapping.
    pub fn clear(&mut self) {
        if let Some(index) = self.keys.as_mut() {
            index.clear();
        }
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("def", &self.def)
            .field("entries", &self.keys.as_ref().map_or(0, |k| k.len()))
            .finish()
    }
}
