//! Field descriptors and behavior capabilities.
//!
//! Fields carry their physical column mapping, storage eligibility, default
//! value, and an explicit set of behavior capabilities. Capabilities are
//! plain membership flags tested with `Capabilities::contains`; the handlers
//! that back them live on the descriptor itself, so behavior dispatch is an
//! explicit table lookup rather than type inspection.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::record::Record;
use crate::value::Value;

/// Transform applied to a value on read or write.
pub type ValueTransform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Transform applied to a value at save time.
///
/// The second argument is the row key when the save is an update, `None` on
/// insert. Timestamp-style fields use this to stamp the value being written.
pub type SaveTransform = Arc<dyn Fn(&Value, Option<&Value>) -> Value + Send + Sync>;

/// Handler for deferred relation saves (SAVEABLE fields).
///
/// Invoked after the owning row write with the record, the staged relation
/// value, and whether the row write was an update.
pub type RelationSave = Arc<dyn Fn(&Record, &Value, bool) -> Result<()> + Send + Sync>;

/// Membership test for HAVEABLE relation fields.
pub type HasCheck = Arc<dyn Fn(&Record, &[Value]) -> bool + Send + Sync>;

/// Behavior capability flags for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    /// No behavior capabilities.
    pub const NONE: Capabilities = Capabilities(0);
    /// The field is a relationship that can participate in a join.
    pub const JOINABLE: Capabilities = Capabilities(1);
    /// The field defers its persistence to a relation-save handler.
    pub const SAVEABLE: Capabilities = Capabilities(1 << 1);
    /// The relation's member set can be altered with add/remove.
    pub const CHANGEABLE: Capabilities = Capabilities(1 << 2);
    /// The relation supports membership queries.
    pub const HAVEABLE: Capabilities = Capabilities(1 << 3);

    /// Combine two capability sets.
    pub const fn with(self, other: Capabilities) -> Capabilities {
        Capabilities(self.0 | other.0)
    }

    /// Check whether every capability in `other` is present.
    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Reference to the foreign side of a relationship field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignRef {
    /// The foreign model's registered name.
    pub model: String,
    /// The foreign field the relationship targets (usually the primary key).
    pub field: String,
}

impl ForeignRef {
    /// Create a foreign reference to `model.field`.
    pub fn new(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            field: field.into(),
        }
    }
}

/// Metadata about a model field.
#[derive(Clone)]
pub struct FieldInfo {
    /// Canonical field name
    pub name: String,
    /// Physical column name (may differ from the field name)
    pub column: String,
    /// Whether this field maps to a stored column
    pub in_db: bool,
    /// Whether this is the primary key
    pub primary: bool,
    /// Default value, used for fresh records and insert defaults
    pub default: Value,
    /// Behavior capability flags
    pub capabilities: Capabilities,
    /// Foreign model reference for relationship fields
    pub foreign: Option<ForeignRef>,
    /// Read transform applied by `Record::get`
    pub read: Option<ValueTransform>,
    /// Write transform applied by `Record::set` and `load_values`
    pub write: Option<ValueTransform>,
    /// Save-time transform applied during `Record::save`
    pub save: Option<SaveTransform>,
    /// Deferred relation-save handler (SAVEABLE)
    pub relation_save: Option<RelationSave>,
    /// Membership check handler (HAVEABLE)
    pub has: Option<HasCheck>,
}

impl FieldInfo {
    /// Create a stored field with the column defaulting to the field name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            in_db: true,
            primary: false,
            default: Value::Null,
            capabilities: Capabilities::NONE,
            foreign: None,
            read: None,
            write: None,
            save: None,
            relation_save: None,
            has: None,
        }
    }

    /// Set the physical column name.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Set whether the field maps to a stored column.
    pub fn in_db(mut self, value: bool) -> Self {
        self.in_db = value;
        self
    }

    /// Mark the field as the primary key.
    pub fn primary(mut self, value: bool) -> Self {
        self.primary = value;
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    /// Add behavior capabilities.
    pub fn capability(mut self, caps: Capabilities) -> Self {
        self.capabilities = self.capabilities.with(caps);
        self
    }

    /// Set the foreign model reference.
    pub fn foreign(mut self, foreign: ForeignRef) -> Self {
        self.foreign = Some(foreign);
        self
    }

    /// Set the read transform.
    pub fn on_read(mut self, transform: ValueTransform) -> Self {
        self.read = Some(transform);
        self
    }

    /// Set the write transform.
    pub fn on_write(mut self, transform: ValueTransform) -> Self {
        self.write = Some(transform);
        self
    }

    /// Set the save-time transform.
    pub fn on_save(mut self, transform: SaveTransform) -> Self {
        self.save = Some(transform);
        self
    }

    /// Set the deferred relation-save handler and mark the field SAVEABLE.
    pub fn on_relation_save(mut self, handler: RelationSave) -> Self {
        self.relation_save = Some(handler);
        self.capabilities = self.capabilities.with(Capabilities::SAVEABLE);
        self
    }

    /// Set the membership check handler and mark the field HAVEABLE.
    pub fn on_has(mut self, handler: HasCheck) -> Self {
        self.has = Some(handler);
        self.capabilities = self.capabilities.with(Capabilities::HAVEABLE);
        self
    }

    /// Apply the read transform, or pass the value through.
    pub fn read_value(&self, value: &Value) -> Value {
        match &self.read {
            Some(f) => f(value),
            None => value.clone(),
        }
    }

    /// Apply the write transform, or pass the value through.
    pub fn write_value(&self, value: &Value) -> Value {
        match &self.write {
            Some(f) => f(value),
            None => value.clone(),
        }
    }

    /// Apply the save-time transform, or pass the value through.
    pub fn save_value(&self, value: &Value, key: Option<&Value>) -> Value {
        match &self.save {
            Some(f) => f(value, key),
            None => value.clone(),
        }
    }
}

impl fmt::Debug for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInfo")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("in_db", &self.in_db)
            .field("primary", &self.primary)
            .field("default", &self.default)
            .field("capabilities", &self.capabilities)
            .field("foreign", &self.foreign)
            .finish_non_exhaustive()
    }
}
