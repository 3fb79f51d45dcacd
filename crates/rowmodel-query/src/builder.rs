//! Statement builders for INSERT, UPDATE, DELETE operations.

use rowmodel_core::value::Value;

use crate::condition::{Condition, render_conditions};
use crate::dialect::Dialect;

/// INSERT statement builder.
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
    values: Vec<Value>,
}

impl InsertBuilder {
    /// Create a new INSERT builder for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Set the column list.
    pub fn columns(mut self, columns: impl IntoIterator<Item = String>) -> Self {
        self.columns = columns.into_iter().collect();
        self
    }

    /// Set the value list, parallel to the columns.
    pub fn values(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.values = values.into_iter().collect();
        self
    }

    /// Build the INSERT SQL and parameters with the default dialect.
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the INSERT SQL and parameters with a specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        if self.columns.is_empty() {
            return (format!("INSERT INTO {} DEFAULT VALUES", self.table), Vec::new());
        }

        let placeholders: Vec<_> = (1..=self.values.len())
            .map(|i| dialect.placeholder(i))
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            placeholders.join(", ")
        );

        (sql, self.values.clone())
    }
}

/// UPDATE statement builder.
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: String,
    assignments: Vec<(String, Value)>,
    conditions: Vec<Condition>,
}

impl UpdateBuilder {
    /// Create a new UPDATE builder for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Add a column assignment.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    /// Add all assignments from a column/value list.
    pub fn set_all(mut self, assignments: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.assignments.extend(assignments);
        self
    }

    /// Add a WHERE condition.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Build the UPDATE SQL and parameters with the default dialect.
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the UPDATE SQL and parameters with a specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut set_clauses = Vec::new();

        for (i, (column, value)) in self.assignments.iter().enumerate() {
            set_clauses.push(format!("{} = {}", column, dialect.placeholder(i + 1)));
            params.push(value.clone());
        }

        let mut sql = format!("UPDATE {} SET {}", self.table, set_clauses.join(", "));

        if !self.conditions.is_empty() {
            let (where_sql, where_params) =
                render_conditions(&self.conditions, dialect, params.len());
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params.extend(where_params);
        }

        (sql, params)
    }
}

/// DELETE statement builder.
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    table: String,
    conditions: Vec<Condition>,
}

impl DeleteBuilder {
    /// Create a new DELETE builder for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
        }
    }

    /// Add a WHERE condition.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Build the DELETE SQL and parameters with the default dialect.
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the DELETE SQL and parameters with a specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = format!("DELETE FROM {}", self.table);
        let mut params = Vec::new();

        if !self.conditions.is_empty() {
            let (where_sql, where_params) = render_conditions(&self.conditions, dialect, 0);
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params = where_params;
        }

        (sql, params)
    }
}
