//! RowModel: a change-tracking record mapper and query aliasing layer.
//!
//! Records track original, changed, and cached values per field, decide
//! between insert and update on save, and defer relation writes; the query
//! side resolves logical field and relationship tokens into physical
//! `table.column` identifiers. Model metadata is plain constructed data,
//! registered in a [`Schema`] and injected everywhere it is needed.
//!
//! ```
//! use std::sync::Arc;
//! use rowmodel::{FieldInfo, MemoryExecutor, Meta, Record, Schema};
//!
//! let mut schema = Schema::new();
//! schema.register(
//!     Meta::build("post")
//!         .table("posts")
//!         .field(FieldInfo::new("id").primary(true))
//!         .field(FieldInfo::new("name"))
//!         .finish(),
//! );
//! let schema = Arc::new(schema);
//!
//! let mut exec = MemoryExecutor::new();
//! let mut post = Record::new(schema.meta("post").unwrap(), schema.clone());
//! post.set("name", "hello");
//! post.save(None, &mut exec).unwrap();
//! assert!(post.loaded());
//! ```

pub use rowmodel_core::{
    Alias, Capabilities, Error, Fetched, FieldInfo, FieldValidationError, ForeignRef, HasCheck,
    Hook, Hooks, Meta, MetaBuilder, NAME_KEY_ALIAS, NoHooks, PRIMARY_KEY_ALIAS, Record,
    RelationInput, RelationSave, Result, Rule, RuleKind, RuleSet, SaveTransform, Schema,
    StatementExecutor, StorageError, StorageErrorKind, UNIQUE_KEY_ALIAS, ValidationError, Value,
    ValueTransform, matches_pattern, to_ids, value_ids,
};
pub use rowmodel_query::{
    ColumnRef, Condition, Conditions, Connective, DeleteBuilder, Dialect, InsertBuilder,
    MemoryExecutor, Resolver, UpdateBuilder, render_conditions,
};
