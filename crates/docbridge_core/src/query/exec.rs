//! Query execution over a namespace.
//!
//! Execution narrows candidates through indexes where the filter allows it
//! and then checks the full filter on every candidate, so index use never
//! changes which documents match.

use super::{CondOp, Condition, Projection, Query};
use crate::document::{compare_scalars, get_path, project, sort_order};
use crate::error::{CoreError, CoreResult};
use crate::index::{CollateMode, FieldType, Index, RowId};
use crate::key::KeyValue;
use crate::namespace::Namespace;
use crate::results::{QueryResults, ResultItem};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Bound;

/// A field reference resolved against the namespace indexes.
struct Field<'a> {
    paths: Vec<&'a str>,
    composite: bool,
    collate: CollateMode,
    index: Option<&'a Index>,
}

impl<'a> Field<'a> {
    /// An index name resolves to the index paths; a path that is the only
    /// path of an index picks up that index; anything else is a plain path.
    fn resolve(ns: &'a Namespace, name: &'a str) -> Self {
        let index = ns.index(name).or_else(|| {
            ns.indexes()
                .iter()
                .find(|index| index.def().json_paths.len() == 1 && index.def().json_paths[0] == name)
        });
        match index {
            Some(index) => {
                let def = index.def();
                Self {
                    paths: def.json_paths.iter().map(String::as_str).collect(),
                    composite: def.field_type == FieldType::Composite,
                    collate: def.opts.collate_mode,
                    index: Some(index),
                }
            }
            None => Self {
                paths: vec![name],
                composite: false,
                collate: CollateMode::None,
                index: None,
            },
        }
    }

    /// Values of the field in `doc`; arrays contribute their elements.
    /// Empty when the field is missing or null.
    fn values(&self, doc: &Value) -> Vec<Value> {
        if self.composite {
            let mut parts = Vec::with_capacity(self.paths.len());
            for path in &self.paths {
                match get_path(doc, path) {
                    None | Some(Value::Null) => return Vec::new(),
                    Some(value) => parts.push(value.clone()),
                }
            }
            return vec![Value::Array(parts)];
        }

        let mut values = Vec::new();
        for path in &self.paths {
            match get_path(doc, path) {
                None | Some(Value::Null) => {}
                Some(Value::Array(items)) => {
                    values.extend(items.iter().filter(|v| !v.is_null()).cloned());
                }
                Some(value) => values.push(value.clone()),
            }
        }
        values
    }

    fn compare(&self, value: &Value, literal: &Value) -> Option<Ordering> {
        match (value, literal) {
            (Value::String(a), Value::String(b)) if self.collate != CollateMode::None => Some(
                KeyValue::string(a, self.collate).cmp(&KeyValue::string(b, self.collate)),
            ),
            _ => compare_scalars(value, literal),
        }
    }

    fn sort_key(&self, doc: &Value) -> Option<Value> {
        let value = self.values(doc).into_iter().next()?;
        Some(match (&value, self.collate) {
            (Value::String(s), CollateMode::Ascii) => Value::String(s.to_ascii_lowercase()),
            (Value::String(s), CollateMode::Utf8) => Value::String(s.to_lowercase()),
            (Value::String(s), CollateMode::Numeric) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map_or(value.clone(), Value::Number),
            _ => value,
        })
    }

    /// Key to probe the index with, when the literal fits the index type.
    fn literal_key(&self, literal: &Value) -> Option<KeyValue> {
        let def = self.index?.def();
        match literal {
            Value::Null | Value::Object(_) => None,
            Value::Array(_) if self.composite => KeyValue::from_literal(literal, self.collate),
            Value::Array(_) => None,
            _ if self.composite => None,
            _ => KeyValue::from_json(literal, def.field_type, self.collate),
        }
    }
}

fn accepts(op: CondOp, ordering: Ordering) -> bool {
    match op {
        CondOp::Eq => ordering == Ordering::Equal,
        CondOp::Ne => ordering != Ordering::Equal,
        CondOp::Lt => ordering == Ordering::Less,
        CondOp::Le => ordering != Ordering::Greater,
        CondOp::Gt => ordering == Ordering::Greater,
        CondOp::Ge => ordering != Ordering::Less,
    }
}

/// Rejects literals that can never be compared.
fn check_condition(condition: &Condition) -> CoreResult<()> {
    let check_literal = |value: &Value| {
        if value.is_object() {
            Err(CoreError::query_execution("object literals cannot be compared"))
        } else {
            Ok(())
        }
    };
    match condition {
        Condition::Compare { value, .. } => check_literal(value),
        Condition::In { values, .. } => values.iter().try_for_each(check_literal),
        Condition::IsNull { .. } => Ok(()),
        Condition::And(terms) | Condition::Or(terms) => {
            terms.iter().try_for_each(check_condition)
        }
        Condition::Not(inner) => check_condition(inner),
    }
}

fn matches(ns: &Namespace, doc: &Value, condition: &Condition) -> bool {
    match condition {
        Condition::Compare { field, op, value } => {
            compare_matches(&Field::resolve(ns, field), doc, *op, value)
        }
        Condition::In { field, values } => {
            let field = Field::resolve(ns, field);
            values
                .iter()
                .any(|value| compare_matches(&field, doc, CondOp::Eq, value))
        }
        Condition::IsNull { field, negated } => {
            let empty = Field::resolve(ns, field).values(doc).is_empty();
            empty != *negated
        }
        Condition::And(terms) => terms.iter().all(|term| matches(ns, doc, term)),
        Condition::Or(terms) => terms.iter().any(|term| matches(ns, doc, term)),
        Condition::Not(inner) => !matches(ns, doc, inner),
    }
}

/// A missing field is unequal to every literal and matches no ordering.
fn compare_matches(field: &Field<'_>, doc: &Value, op: CondOp, literal: &Value) -> bool {
    let values = field.values(doc);
    if literal.is_null() {
        return match op {
            CondOp::Eq => values.is_empty(),
            CondOp::Ne => !values.is_empty(),
            _ => false,
        };
    }
    if op == CondOp::Ne {
        return !values
            .iter()
            .any(|value| field.compare(value, literal) == Some(Ordering::Equal));
    }
    values.iter().any(|value| {
        field
            .compare(value, literal)
            .is_some_and(|ordering| accepts(op, ordering))
    })
}

/// Candidate rows from indexes, or `None` when the condition needs a scan.
fn plan(ns: &Namespace, condition: &Condition) -> Option<BTreeSet<RowId>> {
    match condition {
        Condition::Compare { field, op, value } => {
            let field = Field::resolve(ns, field);
            let lookup = field.index?.keys()?;
            let key = field.literal_key(value)?;
            match op {
                CondOp::Eq => Some(lookup.lookup(&key)),
                CondOp::Lt => lookup.range(Bound::Unbounded, Bound::Excluded(&key)),
                CondOp::Le => lookup.range(Bound::Unbounded, Bound::Included(&key)),
                CondOp::Gt => lookup.range(Bound::Excluded(&key), Bound::Unbounded),
                CondOp::Ge => lookup.range(Bound::Included(&key), Bound::Unbounded),
                CondOp::Ne => None,
            }
        }
        Condition::In { field, values } => {
            let field = Field::resolve(ns, field);
            let lookup = field.index?.keys()?;
            let mut rows = BTreeSet::new();
            for value in values {
                rows.extend(lookup.lookup(&field.literal_key(value)?));
            }
            Some(rows)
        }
        Condition::And(terms) => terms
            .iter()
            .filter_map(|term| plan(ns, term))
            .reduce(|x, y| x.intersection(&y).copied().collect()),
        Condition::Or(terms) => {
            let mut rows = BTreeSet::new();
            for term in terms {
                rows.extend(plan(ns, term)?);
            }
            Some(rows)
        }
        Condition::IsNull { .. } | Condition::Not(_) => None,
    }
}

/// Rows matching `filter`, in insertion order.
pub(crate) fn matching_rows(ns: &Namespace, filter: Option<&Condition>) -> CoreResult<Vec<RowId>> {
    let Some(condition) = filter else {
        return Ok(ns.rows().map(|(row, _)| row).collect());
    };
    check_condition(condition)?;

    let rows = match plan(ns, condition) {
        Some(candidates) => candidates
            .into_iter()
            .filter(|row| ns.row(*row).is_some_and(|doc| matches(ns, doc, condition)))
            .collect(),
        None => ns
            .rows()
            .filter(|(_, doc)| matches(ns, doc, condition))
            .map(|(row, _)| row)
            .collect(),
    };
    Ok(rows)
}

/// Runs a select.
pub(crate) fn select(ns: &Namespace, query: &Query) -> CoreResult<QueryResults> {
    let rows = matching_rows(ns, query.filter.as_ref())?;
    let total = rows.len();

    if query.projection == Projection::Count {
        return Ok(QueryResults::from_items(Vec::new(), total));
    }

    let mut docs: Vec<&Value> = rows.into_iter().filter_map(|row| ns.row(row)).collect();

    if !query.sort.is_empty() {
        let fields: Vec<(Field<'_>, bool)> = query
            .sort
            .iter()
            .map(|entry| (Field::resolve(ns, &entry.field), entry.desc))
            .collect();
        let mut keyed: Vec<(Vec<Option<Value>>, &Value)> = docs
            .into_iter()
            .map(|doc| (fields.iter().map(|(f, _)| f.sort_key(doc)).collect(), doc))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| {
            for ((x, y), (_, desc)) in a.iter().zip(b).zip(&fields) {
                let ordering = sort_order(x.as_ref(), y.as_ref());
                let ordering = if *desc { ordering.reverse() } else { ordering };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        docs = keyed.into_iter().map(|(_, doc)| doc).collect();
    }

    let limit = query.limit.unwrap_or(usize::MAX);
    let mut items = Vec::new();
    for doc in docs.into_iter().skip(query.offset).take(limit) {
        let item = match &query.projection {
            Projection::Fields(fields) => ResultItem::from_document(ns.name(), &project(doc, fields))?,
            _ => ResultItem::from_document(ns.name(), doc)?,
        };
        items.push(item);
    }

    Ok(QueryResults::from_items(items, total))
}
