//! Core types for RowModel.
//!
//! This crate provides the data-mapping heart of the ORM:
//!
//! - `Record` — per-instance change tracking and the save/delete lifecycle
//! - `Meta`/`Schema` — injected model metadata and the global alias table
//! - `FieldInfo` — field descriptors with explicit behavior capabilities
//! - `RuleSet` — validation rules gating every save
//! - `StatementExecutor` — the boundary to the statement execution layer

pub mod error;
pub mod field;
pub mod meta;
pub mod record;
pub mod relation;
pub mod statement;
pub mod validate;
pub mod value;

pub use error::{
    Error, FieldValidationError, Result, RuleKind, StorageError, StorageErrorKind, ValidationError,
};
pub use field::{
    Capabilities, FieldInfo, ForeignRef, HasCheck, RelationSave, SaveTransform, ValueTransform,
};
pub use meta::{
    Alias, Meta, MetaBuilder, NAME_KEY_ALIAS, PRIMARY_KEY_ALIAS, Schema, UNIQUE_KEY_ALIAS,
};
pub use record::{Fetched, Hook, Hooks, NoHooks, Record};
pub use relation::{RelationInput, to_ids, value_ids};
pub use statement::StatementExecutor;
pub use validate::{Rule, RuleSet, matches_pattern};
pub use value::Value;
