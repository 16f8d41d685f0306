use crate::{config::GroupLayout, error::InternalError, row::FieldMeta, row::Row, value::Value};

///
/// BoundaryDetector
///
/// Decides whether two consecutive rows belong to the same group by
/// comparing key fields in key order. Forced batch boundaries are handled by
/// the operator before this check.
///

#[derive(Clone, Debug)]
pub struct BoundaryDetector {
    keys: Vec<(usize, FieldMeta)>,
}

impl BoundaryDetector {
    #[must_use]
    pub fn new(layout: &GroupLayout) -> Self {
        Self {
            keys: layout
                .key_fields()
                .map(|(index, field)| (index, field.clone()))
                .collect(),
        }
    }

    /// Project the key values of `row`.
    #[must_use]
    pub fn key_values(&self, row: &Row) -> Vec<Value> {
        self.keys
            .iter()
            .map(|(index, _)| row.value(*index).clone())
            .collect()
    }

    /// True when every key field compares equal; nulls equal nulls.
    ///
    /// Key values with no common ordering are fatal: group identity cannot
    /// be decided for them.
    pub fn same_group(&self, previous: &[Value], current: &[Value]) -> Result<bool, InternalError> {
        for ((_, field), (prev, cur)) in self.keys.iter().zip(previous.iter().zip(current)) {
            let equal = field.values_equal(prev, cur).map_err(|err| {
                InternalError::operator_coercion(format!("key field '{}': {err}", field.name))
            })?;
            if !equal {
                return Ok(false);
            }
        }

        Ok(true)
    }
}
