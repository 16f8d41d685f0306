use crate::{
    error::InternalError,
    types::Decimal,
    value::{Numeric, Value, ValueKind},
};
use std::str::FromStr;
use thiserror::Error as ThisError;

///
/// CoercionError
///
/// A value could not be interpreted under the type an aggregation or a
/// comparison expects. Recoverable by default: the offending observation is
/// skipped and a warning is recorded.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CoercionError {
    #[error("value of kind {kind} has no numeric interpretation")]
    NotNumeric { kind: ValueKind },

    #[error("text '{text}' does not parse as a number")]
    UnparseableText { text: String },

    #[error("values {left:?} and {right:?} have no common ordering")]
    Incomparable { left: Value, right: Value },
}

impl CoercionError {
    pub(crate) fn into_internal_error(self) -> InternalError {
        InternalError::accumulator_coercion(self.to_string())
    }
}

impl Numeric {
    /// Best-effort numeric coercion of one subject value.
    ///
    /// Returns `Ok(None)` for nulls. Booleans map to 0/1, timestamps to their
    /// epoch millis, and text parses as an integer, then a decimal, then a
    /// float.
    pub fn coerce(value: &Value) -> Result<Option<Self>, CoercionError> {
        let numeric = match value {
            Value::Null => return Ok(None),
            Value::Int(v) | Value::Timestamp(v) => Self::Int(*v),
            Value::Decimal(v) => Self::Decimal(*v),
            Value::Float64(v) => Self::Float(v.get()),
            Value::Bool(v) => Self::Int(i64::from(*v)),
            Value::Text(text) => parse_text(text)?,
            Value::Blob(_) => {
                return Err(CoercionError::NotNumeric {
                    kind: ValueKind::Blob,
                });
            }
        };

        Ok(Some(numeric))
    }
}

fn parse_text(text: &str) -> Result<Numeric, CoercionError> {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(Numeric::Int(v));
    }
    if let Ok(v) = Decimal::from_str(trimmed) {
        return Ok(Numeric::Decimal(v));
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        return Ok(Numeric::Float(v));
    }

    Err(CoercionError::UnparseableText {
        text: text.to_string(),
    })
}
