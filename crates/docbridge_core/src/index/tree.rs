//! Ordered index implementation.

use super::{KeyIndex, RowId};
use crate::key::KeyValue;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// B-tree backed index supporting equality and range lookups.
#[derive(Debug, Default)]
pub struct TreeKeyIndex {
    entries: BTreeMap<KeyValue, BTreeSet<RowId>>,
    count: usize,
}

impl TreeKeyIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest key in the index.
    #[must_use]
    pub fn min_key(&self) -> Option<&KeyValue> {
        self.entries.keys().next()
    }

    /// Largest key in the index.
    #[must_use]
    pub fn max_key(&self) -> Option<&KeyValue> {
        self.entries.keys().next_back()
    }
}

impl KeyIndex for TreeKeyIndex {
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

    fn range(&self, lower: Bound<&KeyValue>, upper: Bound<&KeyValue>) -> Option<BTreeSet<RowId>> {
        // BTreeMap::range panics on inverted bounds.
        if let (
            Bound::Included(lo) | Bound::Excluded(lo),
            Bound::Included(hi) | Bound::Excluded(hi),
        ) = (lower, upper)
        {
            let empty = lo > hi
                || (lo == hi
                    && (matches!(lower, Bound::Excluded(_)) || matches!(upper, Bound::Excluded(_))));
            if empty {
                return Some(BTreeSet::new());
            }
        }

        Some(
            self.entries
                .range::<KeyValue, _>((lower, upper))
                .flat_map(|(_, rows)| rows.iter().copied())
                .collect(),
        )
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

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn populated() -> TreeKeyIndex {
        let mut index = TreeKeyIndex::new();
        for (row, key) in [5, 1, 9, 3, 7].into_iter().enumerate() {
            index.insert(KeyValue::Int(key), row as RowId);
        }
        index
    }

    #[test]
    fn min_and_max() {
        let index = populated();
        assert_eq!(index.min_key(), Some(&KeyValue::Int(1)));
        assert_eq!(index.max_key(), Some(&KeyValue::Int(9)));
    }

    #[test]
    fn open_ranges() {
        let index = populated();
        let above = index
            .range(Bound::Excluded(&KeyValue::Int(5)), Bound::Unbounded)
            .unwrap();
        // keys 7 and 9 live in rows 4 and 2
        assert_eq!(above, BTreeSet::from([2, 4]));
    }

    #[test]
    fn inverted_range_is_empty() {
        let index = populated();
        let rows = index
            .range(Bound::Included(&KeyValue::Int(9)), Bound::Included(&KeyValue::Int(1)))
            .unwrap();
        assert!(rows.is_empty());

        let rows = index
            .range(Bound::Excluded(&KeyValue::Int(5)), Bound::Excluded(&KeyValue::Int(5)))
            .unwrap();
        assert!(rows.is_empty());
    }

    proptest! {
        #[test]
        fn range_matches_filter(keys in proptest::collection::vec(-50i64..50, 0..40), lo in -60i64..60, hi in -60i64..60) {
            let mut index = TreeKeyIndex::new();
            for (row, key) in keys.iter().enumerate() {
                index.insert(KeyValue::Int(*key), row as RowId);
            }
            let got = index
                .range(Bound::Included(&KeyValue::Int(lo)), Bound::Excluded(&KeyValue::Int(hi)))
                .unwrap();
            let expected: BTreeSet<RowId> = keys
                .iter()
                .enumerate()
                .filter(|(_, k)| **k >= lo && **k < hi)
                .map(|(row, _)| row as RowId)
                .collect();
            prop_assert_eq!(got, expected);
        }
    }
}
