//! The statement execution boundary.
//!
//! Records never build or run SQL themselves; they hand resolved column and
//! value lists to a [`StatementExecutor`]. The executor is the only
//! suspension point in the core, and it is treated as a synchronous call —
//! retry and cancellation policy belong to the caller.

use crate::error::Result;
use crate::value::Value;

/// Executes row writes on behalf of a record.
///
/// Implementations translate the column/value lists into whatever statement
/// form the underlying database layer expects. Failures must surface as
/// [`crate::Error::Storage`]; the record leaves its in-memory state untouched
/// when a call fails.
pub trait StatementExecutor {
    /// Insert a row and return the generated identifier.
    fn insert(&mut self, table: &str, columns: &[String], values: &[Value]) -> Result<Value>;

    /// Update the row matching `key_column = key`, returning rows affected.
    fn update(
        &mut self,
        table: &str,
        assignments: &[(String, Value)],
        key_column: &str,
        key: &Value,
    ) -> Result<u64>;

    /// Delete the row matching `key_column = key`, returning rows affected.
    fn delete(&mut self, table: &str, key_column: &str, key: &Value) -> Result<u64>;
}
