//! Model metadata registry.
//!
//! A [`Meta`] describes one model: its table, key fields, field descriptors,
//! alias map, and validation rules. A [`Schema`] collects the metas of every
//! model participating in an operation and exposes the global alias table
//! that maps `model.field` pairs to physical `table.column` identifiers.
//!
//! Both are explicit constructed values, injected into records and resolvers
//! at creation time. There is no process-global registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::field::FieldInfo;
use crate::validate::RuleSet;
use crate::value::Value;

/// Meta-alias token for the primary key of a model.
pub const PRIMARY_KEY_ALIAS: &str = ":primary_key";
/// Meta-alias token for the name key of a model.
pub const NAME_KEY_ALIAS: &str = ":name_key";
/// Meta-alias token for the unique key; resolution may consult a comparison
/// value to pick between the primary and name keys.
pub const UNIQUE_KEY_ALIAS: &str = ":unique_key";

/// Metadata for a single model.
#[derive(Debug, Clone)]
pub struct Meta {
    model: String,
    table: String,
    primary_key: String,
    name_key: String,
    fields: Vec<FieldInfo>,
    lookup: HashMap<String, usize>,
    columns: HashMap<String, Vec<String>>,
    rules: RuleSet,
}

impl Meta {
    /// Start building metadata for `model`.
    pub fn build(model: impl Into<String>) -> MetaBuilder {
        MetaBuilder::new(model)
    }

    /// The model's registered name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The model's table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The name of the primary-key field.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// The name of the name-key field.
    pub fn name_key(&self) -> &str {
        &self.name_key
    }

    /// All field descriptors, in declaration order.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Look up a field by canonical name or alias.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.lookup.get(name).map(|&i| &self.fields[i])
    }

    /// Resolve a name or alias to the canonical field name.
    pub fn field_name(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.name.as_str())
    }

    /// The field names sourced from a physical column, if any.
    ///
    /// Several fields may read the same column, so a single result column can
    /// fan out to more than one field on load.
    pub fn column_fields(&self, column: &str) -> Option<&[String]> {
        self.columns.get(column).map(Vec::as_slice)
    }

    /// Default values for every field, keyed by canonical name.
    pub fn defaults(&self) -> HashMap<String, Value> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.default.clone()))
            .collect()
    }

    /// The model's validation rules.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Resolve a meta-alias token to a column name.
    ///
    /// `:unique_key` picks the name key when the comparison value is text and
    /// the primary key otherwise, so lookups by display name and lookups by id
    /// both land on the right column.
    pub fn meta_alias(&self, token: &str, value: Option<&Value>) -> Option<&str> {
        let field_name = match token {
            PRIMARY_KEY_ALIAS => self.primary_key(),
            NAME_KEY_ALIAS => self.name_key(),
            UNIQUE_KEY_ALIAS => match value {
                Some(Value::Text(_)) => self.name_key(),
                _ => self.primary_key(),
            },
            _ => return None,
        };
        Some(self.field(field_name).map_or(field_name, |f| f.column.as_str()))
    }
}

/// Builder for [`Meta`].
#[derive(Debug)]
pub struct MetaBuilder {
    model: String,
    table: Option<String>,
    name_key: String,
    fields: Vec<FieldInfo>,
    aliases: Vec<(String, String)>,
    rules: RuleSet,
}

impl MetaBuilder {
    fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            table: None,
            name_key: "name".to_string(),
            fields: Vec::new(),
            aliases: Vec::new(),
            rules: RuleSet::new(),
        }
    }

    /// Set the table name. Defaults to the model name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set the name-key field. Defaults to `name`.
    pub fn name_key(mut self, field: impl Into<String>) -> Self {
        self.name_key = field.into();
        self
    }

    /// Add a field descriptor.
    pub fn field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    /// Register `alias` as an alternate name for `field`.
    pub fn alias(mut self, alias: impl Into<String>, field: impl Into<String>) -> Self {
        self.aliases.push((alias.into(), field.into()));
        self
    }

    /// Attach validation rules.
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Finish building the metadata.
    pub fn finish(self) -> Meta {
        let mut lookup = HashMap::new();
        let mut columns: HashMap<String, Vec<String>> = HashMap::new();
        let mut primary_key = "id".to_string();

        for (i, field) in self.fields.iter().enumerate() {
            lookup.insert(field.name.clone(), i);
            if field.primary {
                primary_key = field.name.clone();
            }
            if field.in_db {
                columns
                    .entry(field.column.clone())
                    .or_default()
                    .push(field.name.clone());
            }
        }

        for (alias, target) in self.aliases {
            if let Some(&i) = lookup.get(target.as_str()) {
                lookup.insert(alias, i);
            }
        }

        Meta {
            table: self.table.unwrap_or_else(|| self.model.clone()),
            model: self.model,
            primary_key,
            name_key: self.name_key,
            fields: self.fields,
            lookup,
            columns,
            rules: self.rules,
        }
    }
}

/// A fully qualified column: the table (or join alias) and column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub table: String,
    pub column: String,
}

/// The set of models participating in an operation.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    models: HashMap<String, Arc<Meta>>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model's metadata.
    pub fn register(&mut self, meta: Meta) -> Arc<Meta> {
        let meta = Arc::new(meta);
        self.models.insert(meta.model().to_string(), meta.clone());
        meta
    }

    /// Look up a model's metadata by name.
    pub fn meta(&self, model: &str) -> Option<Arc<Meta>> {
        self.models.get(model).cloned()
    }

    /// Resolve a `model.field` pair against the alias table.
    ///
    /// Known models map to their table and the field to its column, with
    /// meta-alias tokens resolved through [`Meta::meta_alias`]. Unknown
    /// models and fields pass through verbatim so raw SQL identifiers and
    /// externally managed tables keep working.
    pub fn alias(&self, model: &str, field: &str, value: Option<&Value>) -> Alias {
        let Some(meta) = self.meta(model) else {
            return Alias {
                table: model.to_string(),
                column: field.to_string(),
            };
        };

        let column = if field.contains(':') {
            meta.meta_alias(field, value)
                .map_or_else(|| field.to_string(), str::to_string)
        } else {
            meta.field(field)
                .map_or_else(|| field.to_string(), |f| f.column.clone())
        };

        Alias {
            table: meta.table().to_string(),
            column,
        }
    }
}
