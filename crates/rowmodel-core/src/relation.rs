//! Relation input normalization.
//!
//! Relation operations accept a single key, a single record, or any mix of
//! the two in a sequence. Inputs are collapsed to a flat sequence of primary
//! keys right at the API boundary, so nothing deeper in the call chain ever
//! branches on input shape.

use crate::record::Record;
use crate::value::Value;

/// Heterogeneous input to a relation operation.
#[derive(Debug, Clone)]
pub enum RelationInput {
    /// A bare primary-key value.
    Key(Value),
    /// A record; contributes its primary key only when loaded.
    Record(Box<Record>),
    /// A sequence of inputs.
    Many(Vec<RelationInput>),
}

impl From<Value> for RelationInput {
    fn from(v: Value) -> Self {
        RelationInput::Key(v)
    }
}

impl From<i64> for RelationInput {
    fn from(v: i64) -> Self {
        RelationInput::Key(Value::Int(v))
    }
}

impl From<Record> for RelationInput {
    fn from(r: Record) -> Self {
        RelationInput::Record(Box::new(r))
    }
}

impl From<Vec<Value>> for RelationInput {
    fn from(v: Vec<Value>) -> Self {
        RelationInput::Many(v.into_iter().map(RelationInput::Key).collect())
    }
}

impl From<Vec<i64>> for RelationInput {
    fn from(v: Vec<i64>) -> Self {
        RelationInput::Many(v.into_iter().map(RelationInput::from).collect())
    }
}

impl From<Vec<Record>> for RelationInput {
    fn from(v: Vec<Record>) -> Self {
        RelationInput::Many(v.into_iter().map(RelationInput::from).collect())
    }
}

impl From<Vec<RelationInput>> for RelationInput {
    fn from(v: Vec<RelationInput>) -> Self {
        RelationInput::Many(v)
    }
}

/// Flatten a relation input to an ordered sequence of primary-key values.
///
/// Unloaded records are skipped; bare values pass through. Applying `to_ids`
/// to a sequence built from its own output returns the same values.
pub fn to_ids(input: &RelationInput) -> Vec<Value> {
    let mut ids = Vec::new();
    collect_ids(input, &mut ids);
    ids
}

fn collect_ids(input: &RelationInput, ids: &mut Vec<Value>) {
    match input {
        RelationInput::Key(v) => ids.push(v.clone()),
        RelationInput::Record(r) => {
            if r.loaded() {
                if let Some(id) = r.id() {
                    ids.push(id);
                }
            }
        }
        RelationInput::Many(items) => {
            for item in items {
                collect_ids(item, ids);
            }
        }
    }
}

/// Extract the key members of a staged relation value.
///
/// Staged relation values are arrays of keys; a scalar is treated as a
/// one-element set and NULL as empty.
pub fn value_ids(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}
