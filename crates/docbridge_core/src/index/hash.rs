//! Hash index implementation.

use super::{KeyIndex, RowId};
use crate::key::KeyValue;
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

/// Hash-based index for equality lookups.
///
/// Maps each key to the set of rows holding it. Uniqueness is enforced by
/// the namespace for primary keys, not here.
#[derive(Debug, Default)]
pub struct HashKeyIndex {
    entries: HashMap<KeyValue, BTreeSet<RowId>>,
    count: usize,
}

impl HashKeyIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyIndex for HashKeyIndex {
    fn insert(&mut self, key: KeyValue, row: RowId) {
        if self.entries.entry(key).or_default().insert(row) {
            self.count += 1;
        }
    }

    fn remove(&mut self, key: &KeyValue, row: RowId) -> bool {
        if let Some(set) = self.entries.get_mut(key) {
            if set.remove(&row) {
                self.count -= 1;
                if set.is_empty() {
                    self.entries.remove(key);
                }
                return true;
            }
        }
        false
    }

    fn lookup(&self, key: &KeyValue) -> BTreeSet<RowId> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    fn range(&self, _lower: Bound<&KeyValue>, _upper: Bound<&KeyValue>) -> Option<BTreeSet<RowId>> {
        None
    }

    fn contains(&self, key: &KeyValue) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.count
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.count = 0;
    }
}
