//! Structured queries and the SQL subset that compiles into them.
//!
//! ```rust
//! use docbridge_core::query::{Condition, CondOp, Query, Statement, parse};
//! use serde_json::json;
//!
//! let parsed = Query::from_sql("SELECT * FROM items WHERE age >= 18 LIMIT 10").unwrap();
//! let built = Query::new("items")
//!     .filter(Condition::compare("age", CondOp::Ge, json!(18)))
//!     .limit(10);
//! assert_eq!(parsed, built);
//!
//! assert!(matches!(
//!     parse("DELETE FROM items WHERE id = 1").unwrap(),
//!     Statement::Delete(_)
//! ));
//! ```

pub(crate) mod exec;
mod sql;

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use sql::parse;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CondOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// A filter over documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// `field op value`
    Compare {
        /// Field path or index name.
        field: String,
        /// Operator.
        op: CondOp,
        /// Literal; arrays stand for tuples.
        value: Value,
    },
    /// `field IN (values...)`
    In {
        /// Field path or index name.
        field: String,
        /// Accepted literals.
        values: Vec<Value>,
    },
    /// `field IS [NOT] NULL`
    IsNull {
        /// Field path or index name.
        field: String,
        /// True for `IS NOT NULL`.
        negated: bool,
    },
    /// Every condition holds.
    And(Vec<Condition>),
    /// At least one condition holds.
    Or(Vec<Condition>),
    /// The condition does not hold.
    Not(Box<Condition>),
}

impl Condition {
    /// `field op value`
    pub fn compare(field: impl Into<String>, op: CondOp, value: Value) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value,
        }
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::compare(field, CondOp::Eq, value)
    }

    /// `field IN (values...)`
    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::In {
            field: field.into(),
            values,
        }
    }

    /// `field IS NULL`, or `IS NOT NULL` when `negated`.
    pub fn is_null(field: impl Into<String>, negated: bool) -> Self {
        Self::IsNull {
            field: field.into(),
            negated,
        }
    }

    /// Conjunction. Chains of `and` stay flat.
    #[must_use]
    pub fn and(self, other: Condition) -> Self {
        let mut terms = match self {
            Self::And(terms) => terms,
            single => vec![single],
        };
        match other {
            Self::And(more) => terms.extend(more),
            single => terms.push(single),
        }
        Self::And(terms)
    }

    /// Disjunction. Chains of `or` stay flat.
    #[must_use]
    pub fn or(self, other: Condition) -> Self {
        let mut terms = match self {
            Self::Or(terms) => terms,
            single => vec![single],
        };
        match other {
            Self::Or(more) => terms.extend(more),
            single => terms.push(single),
        }
        Self::Or(terms)
    }

    /// Negation.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

/// One `ORDER BY` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    /// Field path or index name.
    pub field: String,
    /// Descending order.
    pub desc: bool,
}

/// What a select returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    /// Whole documents.
    #[default]
    All,
    /// No documents, only the match count.
    Count,
    /// Documents reduced to the listed fields.
    Fields(Vec<String>),
}

/// A select over one namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Namespace to read.
    pub namespace: String,
    /// What to return.
    pub projection: Projection,
    /// Filter; `None` matches everything.
    pub filter: Option<Condition>,
    /// Sort order; empty keeps insertion order.
    pub sort: Vec<SortEntry>,
    /// Maximum number of items.
    pub limit: Option<usize>,
    /// Number of matches to skip.
    pub offset: usize,
}

impl Query {
    /// Selects every document of `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            projection: Projection::All,
            filter: None,
            sort: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// Compiles a `SELECT` statement.
    pub fn from_sql(sql: &str) -> CoreResult<Self> {
        match parse(sql)? {
            Statement::Select(query) => Ok(query),
            other => Err(CoreError::query_parse(
                0,
                format!("expected SELECT statement, got {}", other.verb()),
            )),
        }
    }

    /// Adds a filter, combined with any existing one by `AND`.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Appends a sort entry.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, desc: bool) -> Self {
        self.sort.push(SortEntry {
            field: field.into(),
            desc,
        });
        self
    }

    /// Sets the limit.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the offset.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Returns only the match count.
    #[must_use]
    pub fn count_only(mut self) -> Self {
        self.projection = Projection::Count;
        self
    }

    /// Restricts returned documents to `fields`.
    #[must_use]
    pub fn select_fields(mut self, fields: Vec<String>) -> Self {
        self.projection = Projection::Fields(fields);
        self
    }
}

/// How an `UPDATE` changes documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateAction {
    /// `SET field = value, ...`
    Set(Vec<(String, Value)>),
    /// `DROP field, ...`
    Drop(Vec<String>),
}

/// A bulk update over one namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateQuery {
    /// Namespace to change.
    pub namespace: String,
    /// Change applied to each match.
    pub action: UpdateAction,
    /// Filter; `None` matches everything.
    pub filter: Option<Condition>,
}

impl UpdateQuery {
    /// Compiles an `UPDATE` statement.
    pub fn from_sql(sql: &str) -> CoreResult<Self> {
        match parse(sql)? {
            Statement::Update(update) => Ok(update),
            other => Err(CoreError::query_parse(
                0,
                format!("expected UPDATE statement, got {}", other.verb()),
            )),
        }
    }
}

/// A compiled SQL statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// `SELECT ...`
    Select(Query),
    /// `UPDATE ...`
    Update(UpdateQuery),
    /// `DELETE FROM ...`; only the namespace and filter are used.
    Delete(Query),
}

impl Statement {
    /// Leading keyword of the statement.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Select(_) => "SELECT",
            Self::Update(_) => "UPDATE",
            Self::Delete(_) => "DELETE",
        }
    }

    /// Namespace the statement addresses.
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            Self::Select(query) | Self::Delete(query) => &query.namespace,
            Self::Update(update) => &update.namespace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filters_combine_with_and() {
        let query = Query::new("items")
            .filter(Condition::eq("a", json!(1)))
            .filter(Condition::eq("b", json!(2)));
        assert_eq!(
            query.filter,
            Some(Condition::eq("a", json!(1)).and(Condition::eq("b", json!(2))))
        );
    }

    #[test]
    fn connective_chains_are_flat() {
        let chain = (0..5).fold(Condition::eq("k", json!(0)), |acc, i| {
            acc.and(Condition::eq("k", json!(i)))
        });
        match chain {
            Condition::And(terms) => assert_eq!(terms.len(), 6),
            other => panic!("unexpected {other:?}"),
        }

        let mixed = Condition::eq("a", json!(1))
            .or(Condition::eq("b", json!(2)).and(Condition::eq("c", json!(3))));
        match mixed {
            Condition::Or(terms) => assert!(matches!(terms[1], Condition::And(_))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn from_sql_checks_statement_kind() {
        assert!(Query::from_sql("SELECT * FROM items").is_ok());
        assert!(matches!(
            Query::from_sql("DELETE FROM items"),
            Err(CoreError::QueryParse { .. })
        ));
        assert!(UpdateQuery::from_sql("UPDATE items SET a = 1").is_ok());
        assert!(UpdateQuery::from_sql("SELECT * FROM items").is_err());
    }

    #[test]
    fn query_survives_cbor() {
        let query = Query::new("items")
            .filter(Condition::in_list("id", vec![json!(1), json!([2, "x"])]).not())
            .sort("name", true)
            .limit(3);
        let mut buf = Vec::new();
        ciborium::into_writer(&query, &mut buf).unwrap();
        let back: Query = ciborium::from_reader(buf.as_slice()).unwrap();
        assert_eq!(back, query);
    }
}
