//! Identifier resolution.
//!
//! Callers hand the query layer logical tokens wherever a column is
//! expected: bare field names, aliases, `model.field` pairs, relationship
//! aliases, quoted function expressions, meta-aliases, or raw SQL snippets.
//! The [`Resolver`] turns each of them into a physical `table.column`
//! identifier against an injected [`Schema`].
//!
//! Resolution is lenient: tokens that match nothing pass through verbatim so
//! raw SQL fragments keep working. That is a deliberate non-failure.

use std::sync::Arc;

use rowmodel_core::field::Capabilities;
use rowmodel_core::meta::Schema;
use rowmodel_core::value::Value;

/// A column argument: a logical name to resolve, or a raw expression that
/// must never be touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// A logical identifier token, subject to resolution.
    Name(String),
    /// An opaque, already-SQL expression; passed through unchanged.
    Expr(String),
}

impl ColumnRef {
    /// A logical identifier token.
    pub fn name(token: impl Into<String>) -> Self {
        ColumnRef::Name(token.into())
    }

    /// A raw SQL expression exempt from resolution.
    pub fn raw(sql: impl Into<String>) -> Self {
        ColumnRef::Expr(sql.into())
    }
}

impl From<&str> for ColumnRef {
    fn from(token: &str) -> Self {
        ColumnRef::Name(token.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(token: String) -> Self {
        ColumnRef::Name(token)
    }
}

/// Resolves logical column tokens to qualified identifiers.
///
/// A resolver is pure given its schema snapshot; it holds no mutable state
/// and is safe to share across concurrent queries.
#[derive(Debug, Clone)]
pub struct Resolver {
    schema: Arc<Schema>,
    model: Option<String>,
}

impl Resolver {
    /// Create a resolver scoped to `model`.
    pub fn new(schema: Arc<Schema>, model: impl Into<String>) -> Self {
        Self {
            schema,
            model: Some(model.into()),
        }
    }

    /// Create a resolver with no current model.
    ///
    /// Bare field tokens cannot be claimed without a model, so they pass
    /// through; qualified tokens still resolve.
    pub fn detached(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            model: None,
        }
    }

    /// The current model, if any.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// The resolver's schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Resolve a column token.
    ///
    /// `join` selects the output shape: `table.column` when true, bare
    /// `column` otherwise. `value` is the comparison value of the enclosing
    /// condition, consulted when a meta-alias must pick a concrete key
    /// column.
    ///
    /// Match order, first match wins:
    ///
    /// 1. raw expressions pass through untouched
    /// 2. a token containing a quote is a function expression; the quoted
    ///    inner identifier is resolved recursively and re-wrapped, and the
    ///    token is never split on `.`
    /// 3. an unqualified token that is a meta-alias or a known field of the
    ///    current model is qualified with the model; anything else passes
    ///    through verbatim
    /// 4. a qualified token whose qualifier is a joinable relationship of the
    ///    current model resolves against the foreign model, with the
    ///    relationship name remembered as the join-table alias
    /// 5. the pair resolves through the schema's alias table, and a join
    ///    alias from step 4 replaces the table component
    pub fn resolve(&self, column: &ColumnRef, join: bool, value: Option<&Value>) -> String {
        let token = match column {
            ColumnRef::Expr(sql) => return sql.clone(),
            ColumnRef::Name(token) => token,
        };

        if token.contains('"') {
            return self.rewrite_function(token);
        }

        let meta = self
            .model
            .as_deref()
            .and_then(|model| self.schema.meta(model));
        let mut join_alias: Option<String> = None;

        let (model, field) = match token.split_once('.') {
            None => {
                let known = meta.as_ref().is_some_and(|m| m.field(token).is_some());
                match &self.model {
                    Some(current) if token.contains(':') || known => {
                        (current.clone(), token.to_string())
                    }
                    // Not a model field or meta-alias: leave it alone.
                    _ => return token.clone(),
                }
            }
            Some((left, rest)) => {
                let mut pair = (left.to_string(), rest.to_string());
                if let Some(m) = &meta {
                    // The qualifier may be a relationship alias rather than a
                    // model name; resolve the field against the foreign model
                    // but reference the table through the join alias.
                    if let Some(f) = m.field(left) {
                        if f.capabilities.contains(Capabilities::JOINABLE) {
                            if let Some(foreign) = &f.foreign {
                                join_alias = Some(f.name.clone());
                                pair = (foreign.model.clone(), rest.to_string());
                            }
                        }
                    }
                }
                pair
            }
        };

        let mut alias = self.schema.alias(&model, &field, value);
        if let Some(table) = join_alias {
            alias.table = table;
        }

        if join {
            format!("{}.{}", alias.table, alias.column)
        } else {
            alias.column
        }
    }

    /// Rewrite a quoted function expression, resolving each quoted inner
    /// identifier in place.
    fn rewrite_function(&self, token: &str) -> String {
        let mut out = String::with_capacity(token.len());
        for (i, part) in token.split('"').enumerate() {
            if i % 2 == 0 {
                out.push_str(part);
            } else {
                out.push('"');
                out.push_str(&self.resolve(&ColumnRef::name(part), true, None));
                out.push('"');
            }
        }
        out
    }
}
