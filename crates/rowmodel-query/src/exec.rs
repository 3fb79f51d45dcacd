//! In-memory statement executor.
//!
//! `MemoryExecutor` renders every call through the statement builders and
//! records the result instead of talking to a database. It backs the test
//! suites and doubles as the reference `StatementExecutor` implementation:
//! anything it renders is exactly what a real executor would be handed.

use rowmodel_core::error::{Result, StorageError, StorageErrorKind};
use rowmodel_core::statement::StatementExecutor;
use rowmodel_core::value::Value;

use crate::builder::{DeleteBuilder, InsertBuilder, UpdateBuilder};
use crate::condition::{Condition, Connective};
use crate::dialect::Dialect;

/// Records rendered statements and returns scripted results.
#[derive(Debug, Clone)]
pub struct MemoryExecutor {
    dialect: Dialect,
    statements: Vec<(String, Vec<Value>)>,
    next_id: i64,
    update_rows: u64,
    delete_rows: u64,
    fail_next: Option<StorageErrorKind>,
}

impl MemoryExecutor {
    /// Create an executor with the default dialect.
    pub fn new() -> Self {
        Self::with_dialect(Dialect::default())
    }

    /// Create an executor rendering for `dialect`.
    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            statements: Vec::new(),
            next_id: 1,
            update_rows: 1,
            delete_rows: 1,
            fail_next: None,
        }
    }

    /// Arm the executor to fail its next statement with `kind`.
    pub fn fail_next(&mut self, kind: StorageErrorKind) {
        self.fail_next = Some(kind);
    }

    /// Set the row count reported by updates.
    pub fn update_rows(&mut self, rows: u64) {
        self.update_rows = rows;
    }

    /// Set the row count reported by deletes.
    pub fn delete_rows(&mut self, rows: u64) {
        self.delete_rows = rows;
    }

    /// Every statement rendered so far, with bound parameters.
    pub fn statements(&self) -> &[(String, Vec<Value>)] {
        &self.statements
    }

    /// The most recent statement, if any.
    pub fn last_statement(&self) -> Option<&(String, Vec<Value>)> {
        self.statements.last()
    }

    fn check_failure(&mut self, statement: &str) -> Result<()> {
        if let Some(kind) = self.fail_next.take() {
            return Err(StorageError::new(kind, "simulated storage failure")
                .with_statement(statement)
                .into());
        }
        Ok(())
    }

    fn key_condition(key_column: &str, key: &Value) -> Condition {
        Condition::new(Connective::And, key_column, "=", key.clone())
    }
}

impl Default for MemoryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementExecutor for MemoryExecutor {
    fn insert(&mut self, table: &str, columns: &[String], values: &[Value]) -> Result<Value> {
        let (sql, params) = InsertBuilder::new(table)
            .columns(columns.to_vec())
            .values(values.to_vec())
            .build_with_dialect(self.dialect);
        self.check_failure(&sql)?;
        self.statements.push((sql, params));

        let id = self.next_id;
        self.next_id += 1;
        Ok(Value::Int(id))
    }

    fn update(
        &mut self,
        table: &str,
        assignments: &[(String, Value)],
        key_column: &str,
        key: &Value,
    ) -> Result<u64> {
        let (sql, params) = UpdateBuilder::new(table)
            .set_all(assignments.to_vec())
            .filter(Self::key_condition(key_column, key))
            .build_with_dialect(self.dialect);
        self.check_failure(&sql)?;
        self.statements.push((sql, params));
        Ok(self.update_rows)
    }

    fn delete(&mut self, table: &str, key_column: &str, key: &Value) -> Result<u64> {
        let (sql, params) = DeleteBuilder::new(table)
            .filter(Self::key_condition(key_column, key))
            .build_with_dialect(self.dialect);
        self.check_failure(&sql)?;
        self.statements.push((sql, params));
        Ok(self.delete_rows)
    }
}
