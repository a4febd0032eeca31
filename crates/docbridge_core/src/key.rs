//! Index key values.

use crate::index::{CollateMode, FieldType};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A value stored in an index.
///
/// Integers and doubles compare numerically with each other, so a tree
/// index over a `double` field can be probed with an integer literal.
/// Tuples come from composite indexes and compare element by element.
#[derive(Debug, Clone)]
pub enum KeyValue {
    /// Explicit JSON null.
    Null,
    /// Boolean key.
    Bool(bool),
    /// Integer key.
    Int(i64),
    /// Floating point key.
    Double(f64),
    /// String key, already folded according to the index collation.
    String(String),
    /// Composite key.
    Tuple(Vec<KeyValue>),
}

impl KeyValue {
    /// Converts a scalar JSON value into a key for an index of `field_type`.
    ///
    /// Returns `None` when the value does not have the declared type.
    #[must_use]
    pub fn from_json(value: &Value, field_type: FieldType, collate: CollateMode) -> Option<Self> {
        match (field_type, value) {
            (FieldType::Int | FieldType::Int64, Value::Number(n)) => n.as_i64().map(Self::Int),
            (FieldType::Double, Value::Number(n)) => n.as_f64().map(Self::Double),
            (FieldType::String, Value::String(s)) => Some(Self::string(s, collate)),
            (FieldType::Bool, Value::Bool(b)) => Some(Self::Bool(*b)),
            (FieldType::Composite, _) => Self::from_literal(value, collate),
            _ => None,
        }
    }

    /// Converts any scalar JSON value into a key, without a declared type.
    ///
    /// Used for query literals and composite key parts.
    #[must_use]
    pub fn from_literal(value: &Value, collate: CollateMode) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Int(i)),
                None => n.as_f64().map(Self::Double),
            },
            Value::String(s) => Some(Self::string(s, collate)),
            Value::Array(items) => items
                .iter()
                .map(|item| Self::from_literal(item, collate))
                .collect::<Option<Vec<_>>>()
                .map(Self::Tuple),
            Value::Object(_) => None,
        }
    }

    /// Builds a string key, folding it for the given collation.
    #[must_use]
    pub fn string(s: &str, collate: CollateMode) -> Self {
        match collate {
            CollateMode::None => Self::String(s.to_owned()),
            CollateMode::Ascii => Self::String(s.to_ascii_lowercase()),
            CollateMode::Utf8 => Self::String(s.to_lowercase()),
            CollateMode::Numeric => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Self::Double(n),
                _ => Self::String(s.to_owned()),
            },
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Double(_) => 2,
            Self::String(_) => 3,
            Self::Tuple(_) => 4,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Tuple(a), Self::Tuple(b)) => a.cmp(b),
            (a, b) if a.rank() == 2 && b.rank() == 2 => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.total_cmp(&y)
            }
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl Hash for KeyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            // Integral doubles hash like the integer they equal.
            Self::Double(d) => {
                if d.fract() == 0.0 && *d >= i64::MIN as f64 && *d <= i64::MAX as f64 {
                    (*d as i64).hash(state);
                } else {
                    d.to_bits().hash(state);
                }
            }
            Self::String(s) => s.hash(state),
            Self::Tuple(parts) => parts.hash(state),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Tuple(parts) => {
                f.write_str("(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{part}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn typed_conversion() {
        assert_eq!(
            KeyValue::from_json(&json!(5), FieldType::Int, CollateMode::None),
            Some(KeyValue::Int(5))
        );
        assert_eq!(
            KeyValue::from_json(&json!("5"), FieldType::Int, CollateMode::None),
            None
        );
        assert_eq!(
            KeyValue::from_json(&json!(1.5), FieldType::Int, CollateMode::None),
            None
        );
        assert_eq!(
            KeyValue::from_json(&json!(2), FieldType::Double, CollateMode::None),
            Some(KeyValue::Double(2.0))
        );
    }

    #[test]
    fn numbers_compare_across_types() {
        assert_eq!(KeyValue::Int(3), KeyValue::Double(3.0));
        assert!(KeyValue::Int(3) < KeyValue::Double(3.5));

        let mut set = HashSet::new();
        set.insert(KeyValue::Double(7.0));
        assert!(set.contains(&KeyValue::Int(7)));
    }

    #[test]
    fn collation_folds_strings() {
        assert_eq!(
            KeyValue::string("AbC", CollateMode::Ascii),
            KeyValue::String("abc".into())
        );
        assert_eq!(
            KeyValue::string("ÄÖ", CollateMode::Utf8),
            KeyValue::String("äö".into())
        );
        assert!(
            KeyValue::string("10", CollateMode::Numeric) > KeyValue::string("9", CollateMode::Numeric)
        );
        assert!(
            KeyValue::string("10", CollateMode::None) < KeyValue::string("9", CollateMode::None)
        );
    }

    #[test]
    fn tuples_order_lexicographically() {
        let a = KeyValue::Tuple(vec![KeyValue::Int(1), KeyValue::String("b".into())]);
        let b = KeyValue::Tuple(vec![KeyValue::Int(1), KeyValue::String("c".into())]);
        assert!(a < b);
        assert_eq!(a.to_string(), "(1, \"b\")");
    }
}
