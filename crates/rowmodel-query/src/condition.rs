//! WHERE-condition building.
//!
//! `Conditions` wraps condition construction for one query: it normalizes
//! the NULL sentinels, resolves the column token through the [`Resolver`],
//! and appends the resolved tuple. AND and OR conditions differ only in the
//! connective tag carried downstream.

use rowmodel_core::value::Value;

use crate::dialect::Dialect;
use crate::resolver::{ColumnRef, Resolver};

/// How a condition chains onto the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

/// One resolved WHERE condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub connective: Connective,
    /// Fully resolved column identifier.
    pub column: String,
    pub operator: String,
    pub value: Value,
}

impl Condition {
    /// Create a condition from already-resolved parts.
    pub fn new(
        connective: Connective,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            connective,
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Condition list for one query, with identifier resolution.
#[derive(Debug, Clone)]
pub struct Conditions {
    resolver: Resolver,
    items: Vec<Condition>,
}

impl Conditions {
    /// Create an empty condition list resolving through `resolver`.
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            items: Vec::new(),
        }
    }

    /// Append an AND condition.
    pub fn and_where(
        &mut self,
        column: impl Into<ColumnRef>,
        operator: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push(Connective::And, column.into(), operator, value.into());
        self
    }

    /// Append an OR condition.
    pub fn or_where(
        &mut self,
        column: impl Into<ColumnRef>,
        operator: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push(Connective::Or, column.into(), operator, value.into());
        self
    }

    fn push(&mut self, connective: Connective, column: ColumnRef, operator: &str, value: Value) {
        let mut operator = operator.to_string();
        let mut value = value;

        // Normalize NULL sentinels into IS / IS NOT. The "0" guard keeps
        // genuine zero comparisons away from the sentinel checks.
        if value.plain_string() != "0" {
            if value.is_null() {
                operator = "IS".to_string();
            } else if matches!(&value, Value::Text(s) if s == "NOT NULL") {
                operator = "IS NOT".to_string();
                value = Value::Null;
            }
        }

        let column = self.resolver.resolve(&column, true, Some(&value));
        tracing::trace!(column = %column, operator = %operator, "appended condition");
        self.items.push(Condition {
            connective,
            column,
            operator,
            value,
        });
    }

    /// The resolved conditions, in insertion order.
    pub fn items(&self) -> &[Condition] {
        &self.items
    }

    /// Whether no conditions have been added.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of conditions.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Consume into the underlying condition list.
    pub fn into_items(self) -> Vec<Condition> {
        self.items
    }

    /// Render the conditions as SQL with `offset` parameters already bound.
    pub fn build(&self, dialect: Dialect, offset: usize) -> (String, Vec<Value>) {
        render_conditions(&self.items, dialect, offset)
    }
}

/// Render a condition list to SQL and its bound parameters.
///
/// `IS`/`IS NOT` against NULL render without a placeholder; every other
/// condition binds its value.
pub fn render_conditions(
    items: &[Condition],
    dialect: Dialect,
    offset: usize,
) -> (String, Vec<Value>) {
    let mut sql = String::new();
    let mut params = Vec::new();

    for (i, cond) in items.iter().enumerate() {
        if i > 0 {
            sql.push_str(match cond.connective {
                Connective::And => " AND ",
                Connective::Or => " OR ",
            });
        }

        if cond.value.is_null() && (cond.operator == "IS" || cond.operator == "IS NOT") {
            sql.push_str(&format!("{} {} NULL", cond.column, cond.operator));
        } else {
            params.push(cond.value.clone());
            sql.push_str(&format!(
                "{} {} {}",
                cond.column,
                cond.operator,
                dialect.placeholder(offset + params.len())
            ));
        }
    }

    (sql, params)
}
