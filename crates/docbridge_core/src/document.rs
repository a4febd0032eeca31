//! Helpers for working with JSON documents.
//!
//! Fields are addressed by dotted paths (`address.city`). A path that runs
//! through a non-object value resolves to nothing.

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Returns the value at `path`, if present.
#[must_use]
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(doc, |current, segment| current.as_object()?.get(segment))
}

/// Sets the value at `path`, creating intermediate objects as needed.
///
/// Returns `false` when an intermediate value exists but is not an object.
pub fn set_path(doc: &mut Value, path: &str, value: Value) -> bool {
    let mut segments = path.split('.').peekable();
    let mut current = doc;
    while let Some(segment) = segments.next() {
        let Some(object) = current.as_object_mut() else {
            return false;
        };
        if segments.peek().is_none() {
            object.insert(segment.to_owned(), value);
            return true;
        }
        current = object
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    false
}

/// Removes the value at `path`, returning it.
pub fn remove_path(doc: &mut Value, path: &str) -> Option<Value> {
    match path.rsplit_once('.') {
        Some((parent, leaf)) => {
            let mut current = doc;
            for segment in parent.split('.') {
                current = current.as_object_mut()?.get_mut(segment)?;
            }
            current.as_object_mut()?.remove(leaf)
        }
        None => doc.as_object_mut()?.remove(path),
    }
}

/// Compares two scalar JSON values.
///
/// Numbers compare numerically, strings lexicographically, booleans with
/// `false < true`. Values of different types are incomparable.
#[must_use]
pub fn compare_scalars(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return Some(x.cmp(&y));
            }
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y) {
                match compare_scalars(left, right)? {
                    Ordering::Equal => {}
                    other => return Some(other),
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => None,
    }
}

/// Total order used for sorting: missing and null first, then booleans,
/// numbers, strings, and everything else.
#[must_use]
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(x), Some(y)) if rank(a) == rank(b) => {
            compare_scalars(x, y).unwrap_or(Ordering::Equal)
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Builds a document holding only the listed fields.
#[must_use]
pub fn project(doc: &Value, fields: &[String]) -> Value {
    let mut out = Value::Object(Map::new());
    for field in fields {
        if let Some(value) = get_path(doc, field) {
            set_path(&mut out, field, value.clone());
        }
    }
    out
}
