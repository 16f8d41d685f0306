//! Module: row
//! Responsibility: row container, field metadata, and field-level comparison.
//! Does not own: group identity or aggregate semantics.
//! Boundary: the minimal slice of the pipeline's row type system this
//! operator needs to read keys and subjects.


use crate::value::{CoercionError, Value, ValueKind, compare_non_null};
use derive_more::{Deref, From, IntoIterator};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

///
/// Row
///
/// Ordered sequence of field values with fixed arity per stream.
///

#[derive(Clone, Debug, Default, Deref, Deserialize, Eq, From, IntoIterator, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(Vec<Value>);

impl Row {
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Row of `arity` nulls.
    #[must_use]
    pub fn nulls(arity: usize) -> Self {
        Self(vec![Value::Null; arity])
    }

    /// Value at `index`, or `Null` when the slot does not exist.
    #[must_use]
    pub fn value(&self, index: usize) -> &Value {
        self.0.get(index).unwrap_or(&Value::Null)
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = Value>) {
        self.0.extend(values);
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl FromIterator<Value> for Row {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

///
/// FieldMeta
///
/// Name, declared kind, and comparison flags for one schema field.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FieldMeta {
    pub name: String,
    pub kind: ValueKind,
    #[serde(default)]
    pub descending: bool,
    #[serde(default)]
    pub case_insensitive: bool,
}

impl FieldMeta {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            descending: false,
            case_insensitive: false,
        }
    }

    #[must_use]
    pub const fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    #[must_use]
    pub const fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Compare two values under this field's ordering.
    ///
    /// Nulls sort lowest and equal each other; a descending field negates
    /// the whole result, nulls included.
    pub fn compare(&self, left: &Value, right: &Value) -> Result<Ordering, CoercionError> {
        let cmp = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => compare_non_null(left, right, self.case_insensitive)?,
        };

        Ok(if self.descending { cmp.reverse() } else { cmp })
    }

    /// Compare under the field's natural (ascending) order regardless of the
    /// descending flag.
    pub fn compare_natural(&self, left: &Value, right: &Value) -> Result<Ordering, CoercionError> {
        let cmp = self.compare(left, right)?;

        Ok(if self.descending { cmp.reverse() } else { cmp })
    }

    /// Field equality; independent of the descending flag.
    pub fn values_equal(&self, left: &Value, right: &Value) -> Result<bool, CoercionError> {
        Ok(self.compare(left, right)? == Ordering::Equal)
    }
}

///
/// RowSchema
///
/// Ordered field metadata for one row stream.
///

#[derive(Clone, Debug, Default, Deref, Deserialize, Eq, From, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RowSchema(Vec<FieldMeta>);

impl RowSchema {
    #[must_use]
    pub const fn new(fields: Vec<FieldMeta>) -> Self {
        Self(fields)
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Position of the field named `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|field| field.name == name)
    }

    #[must_use]
    pub fn field(&self, index: usize) -> Option<&FieldMeta> {
        self.0.get(index)
    }

    pub fn push(&mut self, field: FieldMeta) {
        self.0.push(field);
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|field| field.name.as_str()).collect()
    }
}

impl FromIterator<FieldMeta> for RowSchema {
    fn from_iter<I: IntoIterator<Item = FieldMeta>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
