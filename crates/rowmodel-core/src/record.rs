//! The record state machine.
//!
//! A [`Record`] is the in-memory representation of one entity row. It tracks
//! five value buckets with distinct lifetimes:
//!
//! - `original` — last-known-persisted values (defaults when never persisted)
//! - `changed` — pending values that differ from `original`
//! - `retrieved` — memoized reads, evicted when the field is written
//! - `unmapped` — pass-through data matching no known field
//! - `with` — eager-loaded related rows not yet materialized into records
//!
//! Writes stage into `changed`; `save` diffs against `original`, issues an
//! insert or update through a [`StatementExecutor`], and folds the staged
//! values back into `original`. `changed` never holds a value equal to its
//! `original` counterpart, and `original` always carries an entry for every
//! field of the model.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::field::Capabilities;
use crate::meta::{Meta, Schema};
use crate::relation::{self, RelationInput};
use crate::statement::StatementExecutor;
use crate::value::Value;

/// The result of reading a field from a record: a plain value or a
/// materialized related record.
#[derive(Debug, Clone)]
pub enum Fetched {
    /// A plain field value.
    Value(Value),
    /// A related record materialized from eager-loaded data.
    Related(Box<Record>),
}

impl Fetched {
    /// Borrow the plain value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Fetched::Value(v) => Some(v),
            Fetched::Related(_) => None,
        }
    }

    /// Consume into the plain value, if this is one.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Fetched::Value(v) => Some(v),
            Fetched::Related(_) => None,
        }
    }

    /// Borrow the related record, if this is one.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Fetched::Value(_) => None,
            Fetched::Related(r) => Some(r),
        }
    }
}

/// Outcome of a vetoable lifecycle hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// Continue with the operation.
    Proceed,
    /// Short-circuit the operation. This is an intentional skip, not an
    /// error; the caller sees a `false` return, never an `Err`.
    Abort,
}

/// Lifecycle hooks observed by `save_with` and `delete_with`.
///
/// All methods default to no-ops, so implementations only override the
/// points they care about.
pub trait Hooks {
    /// Called before the working change-set is validated.
    fn before_validate(&mut self, _record: &Record, _data: &HashMap<String, Value>) {}

    /// Called after validation, before any statement is issued. Returning
    /// [`Hook::Abort`] skips the write entirely.
    fn before_save(&mut self, _record: &Record, _key: Option<&Value>) -> Hook {
        Hook::Proceed
    }

    /// Called after a successful save, once state has been folded.
    fn after_save(&mut self, _record: &Record) {}

    /// Called before a delete statement is issued. Returning [`Hook::Abort`]
    /// skips the delete; the record is still cleared.
    fn before_delete(&mut self, _record: &Record, _key: &Value) -> Hook {
        Hook::Proceed
    }

    /// Called after the delete attempt with whether a row was removed.
    fn after_delete(&mut self, _record: &Record, _deleted: bool) {}
}

/// The default hook set: every hook is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl Hooks for NoHooks {}

/// One entity instance, persisted or not.
#[derive(Debug, Clone)]
pub struct Record {
    meta: Arc<Meta>,
    schema: Arc<Schema>,
    original: HashMap<String, Value>,
    changed: HashMap<String, Value>,
    retrieved: HashMap<String, Fetched>,
    unmapped: HashMap<String, Value>,
    with: HashMap<String, Vec<(String, Value)>>,
    loaded: bool,
    saved: bool,
}

impl Record {
    /// Create a fresh, unloaded record with default values.
    pub fn new(meta: Arc<Meta>, schema: Arc<Schema>) -> Self {
        Self {
            original: meta.defaults(),
            meta,
            schema,
            changed: HashMap::new(),
            retrieved: HashMap::new(),
            unmapped: HashMap::new(),
            with: HashMap::new(),
            loaded: false,
            saved: false,
        }
    }

    /// Whether the record reflects a stored row.
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    /// Whether the record has no pending changes relative to storage.
    pub fn saved(&self) -> bool {
        self.saved
    }

    /// The record's model metadata.
    pub fn meta(&self) -> &Arc<Meta> {
        &self.meta
    }

    /// The primary-key value, read through the field's transform.
    pub fn id(&self) -> Option<Value> {
        self.get(self.meta.primary_key())?.into_value()
    }

    /// The name-key value, read through the field's transform.
    pub fn name_value(&self) -> Option<Value> {
        self.get(self.meta.name_key())?.into_value()
    }

    /// The full staged change-set, keyed by canonical field name.
    pub fn changed(&self) -> &HashMap<String, Value> {
        &self.changed
    }

    /// Whether a field (by name or alias) has a staged change.
    pub fn is_changed(&self, name: &str) -> bool {
        self.meta
            .field_name(name)
            .is_some_and(|canonical| self.changed.contains_key(canonical))
    }

    /// Pass-through data that matched no known field.
    pub fn unmapped(&self) -> &HashMap<String, Value> {
        &self.unmapped
    }

    /// Read a field without caching.
    ///
    /// Known fields read from `changed` first, then materialize eager-loaded
    /// relation data, then fall back to `original`; the field's read
    /// transform applies in every case. Unknown names read `unmapped`.
    pub fn get(&self, name: &str) -> Option<Fetched> {
        let Some(field) = self.meta.field(name) else {
            return self.unmapped.get(name).cloned().map(Fetched::Value);
        };

        if let Some(value) = self.changed.get(&field.name) {
            return Some(Fetched::Value(field.read_value(value)));
        }

        if let Some(rows) = self.with.get(&field.name) {
            if let Some(record) = self.materialize(&field.name, rows) {
                return Some(Fetched::Related(Box::new(record)));
            }
        }

        self.original
            .get(&field.name)
            .map(|value| Fetched::Value(field.read_value(value)))
    }

    /// Read a field, memoizing the result until the field is written.
    pub fn retrieve(&mut self, name: &str) -> Option<Fetched> {
        let meta = self.meta.clone();
        let Some(canonical) = meta.field_name(name) else {
            return self.unmapped.get(name).cloned().map(Fetched::Value);
        };

        if !self.retrieved.contains_key(canonical) {
            let fetched = self.get(canonical)?;
            self.retrieved.insert(canonical.to_string(), fetched);
        }
        self.retrieved.get(canonical).cloned()
    }

    fn materialize(&self, name: &str, rows: &[(String, Value)]) -> Option<Record> {
        let foreign = self.meta.field(name)?.foreign.as_ref()?;
        let foreign_meta = self.schema.meta(&foreign.model)?;

        let mut record = Record::new(foreign_meta, self.schema.clone());
        record.load_values(rows.to_vec(), false);

        // Eager data with an empty key is a placeholder, not a loaded row.
        if record.id().is_none_or(|id| id.is_empty()) {
            record.loaded = false;
            record.saved = false;
        }
        Some(record)
    }

    /// Stage a single field value.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.set_one(name, value.into());
        self
    }

    /// Stage a batch of field values.
    pub fn set_many(&mut self, values: impl IntoIterator<Item = (String, Value)>) -> &mut Self {
        for (name, value) in values {
            self.set_one(&name, value);
        }
        self
    }

    fn set_one(&mut self, name: &str, value: Value) {
        let meta = self.meta.clone();
        let Some(field) = meta.field(name) else {
            self.unmapped.insert(name.to_string(), value);
            return;
        };

        let mut value = field.write_value(&value);
        value = meta.rules().apply_filter(&field.name, value);

        // Empty composites collapse to NULL before the equality check, so a
        // staged empty set can never shadow an equal original.
        if value.is_empty_composite() {
            value = Value::Null;
        }

        let current = self
            .changed
            .get(&field.name)
            .or_else(|| self.original.get(&field.name));
        if current == Some(&value) {
            return;
        }

        // Writing the stored value back drops the staged entry instead of
        // shadowing original with an equal value.
        if self.original.get(&field.name) == Some(&value) {
            self.changed.remove(&field.name);
        } else {
            self.changed.insert(field.name.clone(), value);
        }
        self.retrieved.remove(&field.name);
        self.saved = false;
    }

    /// Reset a field as if it were never touched: default back in
    /// `original`, staged and cached entries dropped.
    pub fn unset(&mut self, name: &str) -> &mut Self {
        let meta = self.meta.clone();
        if let Some(field) = meta.field(name) {
            self.original
                .insert(field.name.clone(), field.default.clone());
            self.changed.remove(&field.name);
            self.retrieved.remove(&field.name);
        }
        self.unmapped.remove(name);
        self
    }

    /// Replace the record's state with a row of values.
    ///
    /// Keys prefixed with `:` carry eager-loaded relation data and are routed
    /// into nested `with` buckets; with `aliased` set, plain keys are treated
    /// as physical result columns and mapped through the column→fields table
    /// (one column may feed several fields). The record ends loaded and
    /// saved.
    pub fn load_values(
        &mut self,
        values: impl IntoIterator<Item = (String, Value)>,
        aliased: bool,
    ) -> &mut Self {
        self.clear();
        let meta = self.meta.clone();

        for (key, value) in values {
            if key.starts_with(':') {
                let trimmed = key.trim_start_matches(':');
                let Some((relation, rest)) = trimmed.split_once(':') else {
                    self.unmapped.insert(key, value);
                    continue;
                };
                let relation = meta
                    .field_name(relation)
                    .map_or_else(|| relation.to_string(), str::to_string);

                // A ":" left in the target means another eager level below.
                let target = if rest.contains(':') {
                    format!(":{rest}")
                } else {
                    rest.to_string()
                };
                self.with.entry(relation).or_default().push((target, value));
            } else if aliased {
                if let Some(fields) = meta.column_fields(&key) {
                    for field_name in fields {
                        if let Some(field) = meta.field(field_name) {
                            self.original
                                .insert(field_name.clone(), field.write_value(&value));
                        }
                    }
                } else {
                    self.unmapped.insert(key, value);
                }
            } else if let Some(field) = meta.field(&key) {
                self.original
                    .insert(field.name.clone(), field.write_value(&value));
            } else {
                self.unmapped.insert(key, value);
            }
        }

        self.loaded = true;
        self.saved = true;
        tracing::trace!(
            table = meta.table(),
            fields = self.original.len(),
            eager = self.with.len(),
            "loaded record values"
        );
        self
    }

    /// Reset to the unloaded default state.
    pub fn clear(&mut self) -> &mut Self {
        self.loaded = false;
        self.saved = false;
        self.with.clear();
        self.changed.clear();
        self.retrieved.clear();
        self.unmapped.clear();
        self.original = self.meta.defaults();
        self
    }

    /// Create or update the stored row. See [`Record::save_with`].
    pub fn save(&mut self, key: Option<Value>, executor: &mut dyn StatementExecutor) -> Result<bool> {
        self.save_with(key, executor, &mut NoHooks)
    }

    /// Create or update the stored row.
    ///
    /// With an explicit `key` the row is assumed to exist and an update is
    /// issued even if the record is not loaded. Otherwise a loaded record
    /// updates under its primary key and an unloaded record inserts, with the
    /// generated identifier captured into `original`.
    ///
    /// Validation failure aborts before any statement; a storage failure
    /// propagates with the in-memory state untouched. Returns `false` when a
    /// hook vetoed the write.
    pub fn save_with(
        &mut self,
        key: Option<Value>,
        executor: &mut dyn StatementExecutor,
        hooks: &mut dyn Hooks,
    ) -> Result<bool> {
        let meta = self.meta.clone();

        // Loaded rows and explicit keys update from the staged diff alone;
        // everything else is new data, so the whole record participates.
        let data: HashMap<String, Value> = if self.loaded || key.is_some() {
            self.changed.clone()
        } else {
            let mut merged = self.original.clone();
            merged.extend(self.changed.clone());
            merged
        };

        let mut key = key;
        if self.loaded {
            key = self.original.get(meta.primary_key()).cloned();
        }

        if !data.is_empty() {
            hooks.before_validate(self, &data);
            meta.rules().check(&data).map_err(Error::Validation)?;
        }

        if hooks.before_save(self, key.as_ref()) == Hook::Abort {
            return Ok(false);
        }

        // Walk every field so unchanged fields with save behavior (timestamp
        // updating and the like) still participate.
        let mut values: Vec<(String, Value)> = Vec::new();
        let mut relations: Vec<(String, Value)> = Vec::new();

        for field in meta.fields() {
            let name = &field.name;
            let Some(value) = self.changed.get(name).or_else(|| self.original.get(name)) else {
                continue;
            };

            if field.in_db {
                let value = field.save_value(value, key.as_ref());
                if self.original.get(name) != Some(&value) {
                    values.push((name.clone(), value));
                } else if key.is_none() && !self.is_changed(name) && !field.primary {
                    // Inserts persist defaults even for untouched fields.
                    values.push((name.clone(), field.default.clone()));
                }
            } else if self.is_changed(name)
                && field.capabilities.contains(Capabilities::SAVEABLE)
            {
                relations.push((name.clone(), value.clone()));
            }
        }

        let was_update = key.is_some();
        let key_column = meta
            .field(meta.primary_key())
            .map_or_else(|| meta.primary_key().to_string(), |f| f.column.clone());

        tracing::debug!(
            table = meta.table(),
            staged = values.len(),
            update = was_update,
            "saving record"
        );

        match &key {
            Some(k) => {
                if !values.is_empty() {
                    let assignments: Vec<(String, Value)> = values
                        .iter()
                        .map(|(name, value)| (self.column_of(name), value.clone()))
                        .collect();
                    executor.update(meta.table(), &assignments, &key_column, k)?;
                }
            }
            None => {
                let columns: Vec<String> =
                    values.iter().map(|(name, _)| self.column_of(name)).collect();
                let row: Vec<Value> = values.iter().map(|(_, value)| value.clone()).collect();
                let id = executor.insert(meta.table(), &columns, &row)?;
                self.original.insert(meta.primary_key().to_string(), id);
            }
        }

        // Fold staged data into original; save-transformed values win over
        // the stale staged entries they were derived from.
        let staged = std::mem::take(&mut self.changed);
        self.original.extend(staged);
        for (name, value) in &values {
            self.original.insert(name.clone(), value.clone());
        }

        self.loaded = true;
        self.saved = true;
        self.retrieved.clear();

        for (name, value) in relations {
            if let Some(handler) = meta.field(&name).and_then(|f| f.relation_save.clone()) {
                handler(self, &value, was_update)?;
            }
        }

        hooks.after_save(self);
        Ok(true)
    }

    /// Delete the stored row. See [`Record::delete_with`].
    pub fn delete(
        &mut self,
        key: Option<Value>,
        executor: &mut dyn StatementExecutor,
    ) -> Result<bool> {
        self.delete_with(key, executor, &mut NoHooks)
    }

    /// Delete the stored row, if the record is loaded or a key was supplied.
    ///
    /// The record is cleared to its unloaded default state in every case.
    /// Returns whether a row was actually removed.
    pub fn delete_with(
        &mut self,
        key: Option<Value>,
        executor: &mut dyn StatementExecutor,
        hooks: &mut dyn Hooks,
    ) -> Result<bool> {
        let meta = self.meta.clone();
        let mut deleted = false;

        let key = if self.loaded { self.id() } else { key };
        if let Some(k) = key {
            if hooks.before_delete(self, &k) == Hook::Proceed {
                let key_column = meta
                    .field(meta.primary_key())
                    .map_or_else(|| meta.primary_key().to_string(), |f| f.column.clone());
                deleted = executor.delete(meta.table(), &key_column, &k)? > 0;
                tracing::debug!(table = meta.table(), deleted, "deleted record");
            }
        }

        hooks.after_delete(self, deleted);
        self.clear();
        Ok(deleted)
    }

    /// Add keys or records to a relation's member set.
    pub fn add(&mut self, name: &str, models: impl Into<RelationInput>) -> &mut Self {
        self.alter_relation(name, &models.into(), true)
    }

    /// Remove keys or records from a relation's member set.
    pub fn remove(&mut self, name: &str, models: impl Into<RelationInput>) -> &mut Self {
        self.alter_relation(name, &models.into(), false)
    }

    /// Whether the relation currently contains all of `models`.
    ///
    /// Only fields with the HAVEABLE capability answer; the field's `has`
    /// handler is consulted when present, otherwise membership is checked
    /// against the relation's current key set.
    pub fn has(&mut self, name: &str, models: impl Into<RelationInput>) -> bool {
        let meta = self.meta.clone();
        let Some(field) = meta.field(name) else {
            return false;
        };
        if !field.capabilities.contains(Capabilities::HAVEABLE) {
            return false;
        }

        let ids = relation::to_ids(&models.into());
        if let Some(handler) = &field.has {
            return handler(self, &ids);
        }

        let name = field.name.clone();
        let current = self.relation_ids(&name);
        !ids.is_empty() && ids.iter().all(|id| current.contains(id))
    }

    fn alter_relation(&mut self, name: &str, models: &RelationInput, add: bool) -> &mut Self {
        let meta = self.meta.clone();
        let Some(field) = meta.field(name) else {
            return self;
        };
        if !field.capabilities.contains(Capabilities::CHANGEABLE) {
            return self;
        }
        let name = field.name.clone();

        let current = self.relation_ids(&name);
        let changes = relation::to_ids(models);

        let next: Vec<Value> = if add {
            let mut next = current;
            for id in changes {
                if !next.contains(&id) {
                    next.push(id);
                }
            }
            next
        } else {
            current.into_iter().filter(|id| !changes.contains(id)).collect()
        };

        self.set_one(&name, Value::Array(next));
        self
    }

    /// The relation's current key set: staged value when dirty, otherwise the
    /// cached live relation.
    fn relation_ids(&mut self, name: &str) -> Vec<Value> {
        if let Some(value) = self.changed.get(name) {
            return relation::value_ids(value);
        }
        match self.retrieve(name) {
            Some(Fetched::Value(value)) => relation::value_ids(&value),
            Some(Fetched::Related(record)) => {
                if record.loaded() {
                    record.id().into_iter().collect()
                } else {
                    Vec::new()
                }
            }
            None => Vec::new(),
        }
    }

    fn column_of(&self, name: &str) -> String {
        self.meta
            .field(name)
            .map_or_else(|| name.to_string(), |f| f.column.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StorageError, StorageErrorKind};
    use crate::field::{Capabilities, FieldInfo, ForeignRef};
    use crate::validate::{Rule, RuleSet};

    // Mock executor recording every statement it is handed.
    #[derive(Default)]
    struct MockExecutor {
        inserts: Vec<(String, Vec<String>, Vec<Value>)>,
        updates: Vec<(String, Vec<(String, Value)>, String, Value)>,
        deletes: Vec<(String, String, Value)>,
        next_id: i64,
        fail: bool,
    }

    impl MockExecutor {
        fn new() -> Self {
            Self {
                next_id: 1,
                ..Self::default()
            }
        }
    }

    impl StatementExecutor for MockExecutor {
        fn insert(
            &mut self,
            table: &str,
            columns: &[String],
            values: &[Value],
        ) -> crate::error::Result<Value> {
            if self.fail {
                return Err(StorageError::new(StorageErrorKind::Insert, "forced failure").into());
            }
            self.inserts
                .push((table.to_string(), columns.to_vec(), values.to_vec()));
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
        ) -> crate::error::Result<u64> {
            if self.fail {
                return Err(StorageError::new(StorageErrorKind::Update, "forced failure").into());
            }
            self.updates.push((
                table.to_string(),
                assignments.to_vec(),
                key_column.to_string(),
                key.clone(),
            ));
            Ok(1)
        }

        fn delete(
            &mut self,
            table: &str,
            key_column: &str,
            key: &Value,
        ) -> crate::error::Result<u64> {
            if self.fail {
                return Err(StorageError::new(StorageErrorKind::Delete, "forced failure").into());
            }
            self.deletes
                .push((table.to_string(), key_column.to_string(), key.clone()));
            Ok(1)
        }
    }

    fn schema() -> Arc<Schema> {
        let mut schema = Schema::new();
        schema.register(
            Meta::build("user")
                .table("users")
                .field(FieldInfo::new("id").primary(true))
                .field(FieldInfo::new("name"))
                .finish(),
        );
        schema.register(
            Meta::build("post")
                .table("posts")
                .field(FieldInfo::new("id").primary(true))
                .field(FieldInfo::new("name"))
                .field(FieldInfo::new("status").default_value("draft"))
                .field(FieldInfo::new("slug").column("permalink"))
                .field(
                    FieldInfo::new("author")
                        .in_db(false)
                        .capability(Capabilities::JOINABLE)
                        .foreign(ForeignRef::new("user", "id")),
                )
                .field(
                    FieldInfo::new("tags")
                        .in_db(false)
                        .capability(Capabilities::CHANGEABLE.with(Capabilities::HAVEABLE)),
                )
                .alias("title", "name")
                .finish(),
        );
        Arc::new(schema)
    }

    fn post(schema: &Arc<Schema>) -> Record {
        Record::new(schema.meta("post").unwrap(), schema.clone())
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    // ==================== Fresh Record Tests ====================

    #[test]
    fn test_new_record_has_defaults() {
        let schema = schema();
        let record = post(&schema);

        assert!(!record.loaded());
        assert!(!record.saved());
        assert!(record.changed().is_empty());
        assert_eq!(
            record.get("status").unwrap().into_value(),
            Some(text("draft"))
        );
        assert_eq!(record.get("id").unwrap().into_value(), Some(Value::Null));
    }

    // ==================== Set Tests ====================

    #[test]
    fn test_set_stages_change() {
        let schema = schema();
        let mut record = post(&schema);
        record.set("name", "hello");

        assert!(record.is_changed("name"));
        assert_eq!(record.get("name").unwrap().into_value(), Some(text("hello")));
    }

    #[test]
    fn test_set_matching_default_is_noop() {
        let schema = schema();
        let mut record = post(&schema);
        record.set("status", "draft");

        assert!(record.changed().is_empty());
    }

    #[test]
    fn test_set_twice_same_value_stages_once() {
        let schema = schema();
        let mut record = post(&schema);
        record.set("name", "a");
        record.set("name", "a");

        assert_eq!(record.changed().len(), 1);
    }

    #[test]
    fn test_set_by_alias_stages_canonical() {
        let schema = schema();
        let mut record = post(&schema);
        record.set("title", "aliased");

        assert!(record.is_changed("name"));
        assert!(record.is_changed("title"));
        assert!(record.changed().contains_key("name"));
    }

    #[test]
    fn test_set_unknown_goes_unmapped() {
        let schema = schema();
        let mut record = post(&schema);
        record.set("rank", 4_i64);

        assert!(record.changed().is_empty());
        assert_eq!(record.get("rank").unwrap().into_value(), Some(Value::Int(4)));
    }

    #[test]
    fn test_set_empty_composite_collapses_to_null() {
        let schema = schema();
        let mut record = post(&schema);
        record.set("tags", Value::Array(vec![Value::Int(1)]));
        assert_eq!(record.changed()["tags"], Value::Array(vec![Value::Int(1)]));

        // The empty set collapses to NULL, which matches the stored value,
        // so the staged entry is dropped rather than kept as an equal shadow.
        record.set("tags", Value::Array(vec![]));
        assert!(!record.is_changed("tags"));
    }

    #[test]
    fn test_set_back_to_original_unstages() {
        let schema = schema();
        let mut record = post(&schema);
        record.load_values(
            vec![("id".to_string(), Value::Int(1)), ("name".to_string(), text("a"))],
            false,
        );
        record.set("name", "b");
        record.set("name", "a");

        assert!(record.changed().is_empty());
    }

    #[test]
    fn test_set_evicts_retrieved_cache() {
        let schema = schema();
        let mut record = post(&schema);
        assert_eq!(record.retrieve("name").unwrap().into_value(), Some(Value::Null));

        record.set("name", "fresh");
        assert_eq!(record.retrieve("name").unwrap().into_value(), Some(text("fresh")));
    }

    #[test]
    fn test_unset_restores_default() {
        let schema = schema();
        let mut record = post(&schema);
        record.set("status", "published");
        assert!(record.is_changed("status"));

        record.unset("status");
        assert!(!record.is_changed("status"));
        assert_eq!(record.get("status").unwrap().into_value(), Some(text("draft")));
    }

    // ==================== Load Tests ====================

    #[test]
    fn test_load_values_marks_loaded_and_saved() {
        let schema = schema();
        let mut record = post(&schema);
        record.load_values(
            vec![("id".to_string(), Value::Int(5)), ("name".to_string(), text("a"))],
            false,
        );

        assert!(record.loaded());
        assert!(record.saved());
        assert!(record.changed().is_empty());
        assert_eq!(record.id(), Some(Value::Int(5)));
    }

    #[test]
    fn test_load_values_aliased_maps_columns() {
        let schema = schema();
        let mut record = post(&schema);
        record.load_values(
            vec![
                ("id".to_string(), Value::Int(9)),
                ("permalink".to_string(), text("my-post")),
                ("mystery".to_string(), text("kept")),
            ],
            true,
        );

        assert_eq!(record.get("slug").unwrap().into_value(), Some(text("my-post")));
        assert_eq!(record.get("mystery").unwrap().into_value(), Some(text("kept")));
    }

    #[test]
    fn test_load_values_routes_eager_relations() {
        let schema = schema();
        let mut record = post(&schema);
        record.load_values(
            vec![
                ("id".to_string(), Value::Int(1)),
                (":author:id".to_string(), Value::Int(3)),
                (":author:name".to_string(), text("ann")),
            ],
            false,
        );

        let author = record.get("author").unwrap();
        let author = author.as_record().unwrap();
        assert!(author.loaded());
        assert_eq!(author.id(), Some(Value::Int(3)));
        assert_eq!(author.get("name").unwrap().into_value(), Some(text("ann")));
    }

    #[test]
    fn test_eager_relation_with_empty_key_is_unloaded() {
        let schema = schema();
        let mut record = post(&schema);
        record.load_values(
            vec![
                ("id".to_string(), Value::Int(1)),
                (":author:id".to_string(), Value::Null),
                (":author:name".to_string(), text("ghost")),
            ],
            false,
        );

        let author = record.get("author").unwrap();
        assert!(!author.as_record().unwrap().loaded());
    }

    // ==================== Save Tests ====================

    #[test]
    fn test_save_insert_stages_defaults_and_captures_id() {
        let schema = schema();
        let mut exec = MockExecutor::new();
        let mut record = post(&schema);
        record.set("name", "first");

        assert!(record.save(None, &mut exec).unwrap());

        let (table, columns, values) = &exec.inserts[0];
        assert_eq!(table, "posts");
        assert!(columns.contains(&"name".to_string()));
        // Untouched default-bearing fields are persisted on insert.
        let status_at = columns.iter().position(|c| c == "status").unwrap();
        assert_eq!(values[status_at], text("draft"));
        // Primary key is not part of the insert column list.
        assert!(!columns.contains(&"id".to_string()));

        assert_eq!(record.id(), Some(Value::Int(1)));
        assert!(record.loaded());
        assert!(record.saved());
        assert!(record.changed().is_empty());
    }

    #[test]
    fn test_save_update_restricted_to_key() {
        let schema = schema();
        let mut exec = MockExecutor::new();
        let mut record = post(&schema);
        record.load_values(
            vec![("id".to_string(), Value::Int(5)), ("name".to_string(), text("a"))],
            false,
        );
        record.set("name", "b");

        assert!(record.save(None, &mut exec).unwrap());

        let (table, assignments, key_column, key) = &exec.updates[0];
        assert_eq!(table, "posts");
        assert_eq!(assignments, &vec![("name".to_string(), text("b"))]);
        assert_eq!(key_column, "id");
        assert_eq!(key, &Value::Int(5));

        assert_eq!(record.get("name").unwrap().into_value(), Some(text("b")));
        assert!(record.changed().is_empty());
    }

    #[test]
    fn test_save_loaded_unchanged_issues_nothing() {
        let schema = schema();
        let mut exec = MockExecutor::new();
        let mut record = post(&schema);
        record.load_values(vec![("id".to_string(), Value::Int(5))], false);

        assert!(record.save(None, &mut exec).unwrap());
        assert!(exec.updates.is_empty());
        assert!(exec.inserts.is_empty());
    }

    #[test]
    fn test_save_explicit_key_updates_unloaded_record() {
        let schema = schema();
        let mut exec = MockExecutor::new();
        let mut record = post(&schema);
        record.set("name", "lazy");

        assert!(record.save(Some(Value::Int(12)), &mut exec).unwrap());
        let (_, _, _, key) = &exec.updates[0];
        assert_eq!(key, &Value::Int(12));
    }

    #[test]
    fn test_save_transform_value_written_and_folded() {
        let mut schema = Schema::new();
        schema.register(
            Meta::build("doc")
                .field(FieldInfo::new("id").primary(true))
                .field(FieldInfo::new("body"))
                .field(
                    FieldInfo::new("updated_at").on_save(Arc::new(|_, _| Value::Int(777))),
                )
                .finish(),
        );
        let schema = Arc::new(schema);
        let mut exec = MockExecutor::new();
        let mut record = Record::new(schema.meta("doc").unwrap(), schema.clone());
        record.load_values(vec![("id".to_string(), Value::Int(2))], false);
        record.set("body", "text");

        record.save(None, &mut exec).unwrap();

        let (_, assignments, _, _) = &exec.updates[0];
        assert!(assignments.contains(&("updated_at".to_string(), Value::Int(777))));
        assert_eq!(
            record.get("updated_at").unwrap().into_value(),
            Some(Value::Int(777))
        );
    }

    #[test]
    fn test_save_validation_failure_aborts_without_side_effects() {
        let mut schema = Schema::new();
        schema.register(
            Meta::build("doc")
                .field(FieldInfo::new("id").primary(true))
                .field(FieldInfo::new("body"))
                .rules(RuleSet::new().rule("body", Rule::MinLength(5)))
                .finish(),
        );
        let schema = Arc::new(schema);
        let mut exec = MockExecutor::new();
        let mut record = Record::new(schema.meta("doc").unwrap(), schema.clone());
        record.set("body", "no");

        let err = record.save(None, &mut exec).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(exec.inserts.is_empty());
        assert!(record.is_changed("body"));
        assert!(!record.loaded());
    }

    #[test]
    fn test_save_storage_failure_leaves_state() {
        let schema = schema();
        let mut exec = MockExecutor::new();
        exec.fail = true;
        let mut record = post(&schema);
        record.set("name", "doomed");

        let err = record.save(None, &mut exec).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(record.is_changed("name"));
        assert!(!record.loaded());
        assert!(!record.saved());
    }

    #[test]
    fn test_save_defers_saveable_relations() {
        use std::sync::Mutex;
        static CALLS: Mutex<Vec<bool>> = Mutex::new(Vec::new());

        let mut schema = Schema::new();
        schema.register(
            Meta::build("doc")
                .field(FieldInfo::new("id").primary(true))
                .field(FieldInfo::new("body"))
                .field(
                    FieldInfo::new("tags")
                        .in_db(false)
                        .capability(Capabilities::CHANGEABLE)
                        .on_relation_save(Arc::new(|_, _, was_update| {
                            CALLS.lock().unwrap().push(was_update);
                            Ok(())
                        })),
                )
                .finish(),
        );
        let schema = Arc::new(schema);
        let mut exec = MockExecutor::new();
        let mut record = Record::new(schema.meta("doc").unwrap(), schema.clone());
        record.set("tags", Value::Array(vec![Value::Int(1)]));

        record.save(None, &mut exec).unwrap();

        // Relation fields never appear in the row write.
        assert!(!exec.inserts[0].1.contains(&"tags".to_string()));
        assert_eq!(CALLS.lock().unwrap().as_slice(), &[false]);
    }

    #[test]
    fn test_before_save_veto_short_circuits() {
        struct Veto;
        impl Hooks for Veto {
            fn before_save(&mut self, _: &Record, _: Option<&Value>) -> Hook {
                Hook::Abort
            }
        }

        let schema = schema();
        let mut exec = MockExecutor::new();
        let mut record = post(&schema);
        record.set("name", "blocked");

        let saved = record.save_with(None, &mut exec, &mut Veto).unwrap();
        assert!(!saved);
        assert!(exec.inserts.is_empty());
        assert!(record.is_changed("name"));
    }

    // ==================== Delete Tests ====================

    #[test]
    fn test_delete_loaded_record_clears_state() {
        let schema = schema();
        let mut exec = MockExecutor::new();
        let mut record = post(&schema);
        record.load_values(vec![("id".to_string(), Value::Int(4))], false);

        let deleted = record.delete(None, &mut exec).unwrap();
        assert!(deleted);
        assert_eq!(exec.deletes[0], ("posts".to_string(), "id".to_string(), Value::Int(4)));
        assert!(!record.loaded());
        assert_eq!(record.get("status").unwrap().into_value(), Some(text("draft")));
    }

    #[test]
    fn test_delete_unloaded_without_key_is_noop() {
        let schema = schema();
        let mut exec = MockExecutor::new();
        let mut record = post(&schema);

        let deleted = record.delete(None, &mut exec).unwrap();
        assert!(!deleted);
        assert!(exec.deletes.is_empty());
    }

    #[test]
    fn test_delete_veto_skips_statement_but_clears() {
        struct Veto;
        impl Hooks for Veto {
            fn before_delete(&mut self, _: &Record, _: &Value) -> Hook {
                Hook::Abort
            }
        }

        let schema = schema();
        let mut exec = MockExecutor::new();
        let mut record = post(&schema);
        record.load_values(vec![("id".to_string(), Value::Int(4))], false);

        let deleted = record.delete_with(None, &mut exec, &mut Veto).unwrap();
        assert!(!deleted);
        assert!(exec.deletes.is_empty());
        assert!(!record.loaded());
    }

    // ==================== Relation Tests ====================

    #[test]
    fn test_add_then_remove_leaves_difference() {
        let schema = schema();
        let mut record = post(&schema);
        record.add("tags", vec![1_i64, 2]);
        record.remove("tags", vec![2_i64]);

        assert_eq!(record.changed()["tags"], Value::Array(vec![Value::Int(1)]));
    }

    #[test]
    fn test_add_deduplicates() {
        let schema = schema();
        let mut record = post(&schema);
        record.add("tags", vec![1_i64, 2]);
        record.add("tags", vec![2_i64, 3]);

        assert_eq!(
            record.changed()["tags"],
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_add_ignores_unloaded_records() {
        let schema = schema();
        let mut record = post(&schema);
        let ghost = Record::new(schema.meta("user").unwrap(), schema.clone());
        record.add("tags", ghost);

        assert!(!record.is_changed("tags"));
    }

    #[test]
    fn test_relation_ops_require_changeable() {
        let schema = schema();
        let mut record = post(&schema);
        // "name" is a plain field without the CHANGEABLE capability.
        record.add("name", vec![1_i64]);
        assert!(!record.is_changed("name"));
    }

    #[test]
    fn test_has_checks_membership() {
        let schema = schema();
        let mut record = post(&schema);
        record.add("tags", vec![1_i64, 2]);

        assert!(record.has("tags", vec![1_i64]));
        assert!(record.has("tags", vec![1_i64, 2]));
        assert!(!record.has("tags", vec![3_i64]));
        // Plain fields are not HAVEABLE.
        assert!(!record.has("name", vec![1_i64]));
    }

    // ==================== Clear Tests ====================

    #[test]
    fn test_clear_resets_everything() {
        let schema = schema();
        let mut record = post(&schema);
        record.load_values(
            vec![("id".to_string(), Value::Int(1)), ("extra".to_string(), text("x"))],
            false,
        );
        record.set("name", "y");

        record.clear();

        assert!(!record.loaded());
        assert!(!record.saved());
        assert!(record.changed().is_empty());
        assert!(record.unmapped().is_empty());
        assert_eq!(record.get("id").unwrap().into_value(), Some(Value::Null));
    }
}
