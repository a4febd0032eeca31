//! Forward-only cursor over a result set.
//!
//! A cursor starts `Fresh`. The first `next` does not move: it checks the
//! first element and positions the cursor on it. Every later `next` moves
//! one element forward. Once past the end the cursor is `Exhausted` for
//! good.
//!
//! ```text
//! Fresh --next(N=0)--> Exhausted
//! Fresh --next--> Positioned(0) --next--> Positioned(1) ... --next--> Exhausted
//! ```

use crate::error::{BridgeError, BridgeResult};
use docbridge_core::{QueryResults, ResultItem};
use std::sync::Arc;

/// Position of a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Created, `next` not called yet.
    Fresh,
    /// On the element at this index.
    Positioned(usize),
    /// Past the last element.
    Exhausted,
}

/// Cursor over a shared snapshot of a result set.
#[derive(Debug, Clone)]
pub struct Cursor {
    results: Arc<QueryResults>,
    state: CursorState,
}

impl Cursor {
    /// Creates a fresh cursor.
    pub fn new(results: Arc<QueryResults>) -> Self {
        Self {
            results,
            state: CursorState::Fresh,
        }
    }

    /// Current state.
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Moves to the next element.
    ///
    /// Returns true if there is a current element and it decoded
    /// successfully. A false return with the cursor still positioned means
    /// the element is unusable; calling `next` again moves past it.
    pub fn next(&mut self) -> bool {
        let position = match self.state {
            CursorState::Fresh => 0,
            CursorState::Positioned(i) => i + 1,
            CursorState::Exhausted => return false,
        };
        match self.results.get(position) {
            Some(item) => {
                self.state = CursorState::Positioned(position);
                item.is_ok()
            }
            None => {
                self.state = CursorState::Exhausted;
                false
            }
        }
    }

    /// The current element.
    pub fn current(&self) -> BridgeResult<&ResultItem> {
        match self.state {
            CursorState::Positioned(i) => self
                .results
                .get(i)
                .ok_or_else(|| BridgeError::ProtocolMisuse(format!("cursor position {i} out of range"))),
            CursorState::Fresh => Err(BridgeError::ProtocolMisuse(
                "cursor has not been advanced with next".into(),
            )),
            CursorState::Exhausted => Err(BridgeError::ProtocolMisuse(
                "cursor is exhausted".into(),
            )),
        }
    }

    /// JSON of the current element.
    pub fn get_json(&self) -> BridgeResult<String> {
        Ok(self.current()?.json()?.to_owned())
    }

    /// Advances and returns the JSON of the new element; `None` once
    /// exhausted.
    pub fn fetch_json(&mut self) -> BridgeResult<Option<String>> {
        self.next();
        match self.state {
            CursorState::Exhausted => Ok(None),
            _ => self.get_json().map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn results(n: usize) -> Arc<QueryResults> {
        let items = (0..n)
            .map(|i| ResultItem::from_json_text("items", format!(r#"{{"id":{i}}}"#)))
            .collect();
        Arc::new(QueryResults::from_items(items, n))
    }

    #[test]
    fn empty_results() {
        let mut cursor = Cursor::new(results(0));
        assert!(!cursor.next());
        assert_eq!(cursor.state(), CursorState::Exhausted);
        assert!(!cursor.next());
        assert!(matches!(cursor.get_json(), Err(BridgeError::ProtocolMisuse(_))));
    }

    #[test]
    fn get_json_before_next_is_misuse() {
        let cursor = Cursor::new(results(2));
        assert!(matches!(cursor.get_json(), Err(BridgeError::ProtocolMisuse(_))));
    }

    #[test]
    fn first_next_does_not_skip() {
        let mut cursor = Cursor::new(results(2));
        assert!(cursor.next());
        assert_eq!(cursor.state(), CursorState::Positioned(0));
        assert_eq!(cursor.get_json().unwrap(), r#"{"id":0}"#);
    }

    #[test]
    fn failed_element_can_be_skipped() {
        let items = vec![
            ResultItem::from_json_text("items", "{bad"),
            ResultItem::from_json_text("items", r#"{"id":1}"#),
        ];
        let mut cursor = Cursor::new(Arc::new(QueryResults::from_items(items, 2)));

        assert!(!cursor.next());
        assert_eq!(cursor.state(), CursorState::Positioned(0));
        assert!(cursor.get_json().is_err());
        assert!(cursor.next());
        assert_eq!(cursor.get_json().unwrap(), r#"{"id":1}"#);
        assert!(!cursor.next());
        assert_eq!(cursor.state(), CursorState::Exhausted);
    }

    #[test]
    fn fetch_json_combines_next_and_get() {
        let mut cursor = Cursor::new(results(2));
        assert_eq!(cursor.fetch_json().unwrap().as_deref(), Some(r#"{"id":0}"#));
        assert_eq!(cursor.fetch_json().unwrap().as_deref(), Some(r#"{"id":1}"#));
        assert_eq!(cursor.fetch_json().unwrap(), None);
        assert_eq!(cursor.fetch_json().unwrap(), None);
    }

    proptest! {
        #[test]
        fn traversal_yields_every_item_in_order(n in 0usize..64, extra in 1usize..5) {
            let mut cursor = Cursor::new(results(n));
            let mut seen = Vec::new();
            while cursor.next() {
                seen.push(cursor.get_json().unwrap());
            }
            prop_assert_eq!(seen.len(), n);
            for (i, json) in seen.iter().enumerate() {
                prop_assert_eq!(json, &format!(r#"{{"id":{i}}}"#));
            }
            for _ in 0..extra {
                prop_assert!(!cursor.next());
            }
            prop_assert_eq!(cursor.state(), CursorState::Exhausted);
        }
    }
}
