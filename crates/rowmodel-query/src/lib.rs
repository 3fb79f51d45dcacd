//! Query-side building blocks for RowModel.
//!
//! This crate resolves logical column tokens against a schema and renders
//! parameterized statements:
//!
//! - `Resolver` — logical token → physical `table.column`
//! - `Conditions` — WHERE construction with NULL-sentinel normalization
//! - `InsertBuilder`/`UpdateBuilder`/`DeleteBuilder` — statement rendering
//! - `MemoryExecutor` — recording executor for tests and inspection

pub mod builder;
pub mod condition;
pub mod dialect;
pub mod exec;
pub mod resolver;

pub use builder::{DeleteBuilder, InsertBuilder, UpdateBuilder};
pub use condition::{Condition, Conditions, Connective, render_conditions};
pub use dialect::Dialect;
pub use exec::MemoryExecutor;
pub use resolver::{ColumnRef, Resolver};
