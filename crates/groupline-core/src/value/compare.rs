use crate::value::{CoercionError, Numeric, Value};
use std::cmp::Ordering;

/// Total canonical comparator used by distinct sets and `Ord for Value`.
///
/// Ordering rules:
/// 1. Canonical variant rank
/// 2. Variant-specific comparison for same-ranked values
///
/// Mixed-variant comparisons are rank-only and must remain deterministic.
#[must_use]
pub fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    let rank = canonical_rank(left).cmp(&canonical_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }

    canonical_cmp_same_rank(left, right)
}

/// Field-semantics comparator for two non-null values.
///
/// Numeric variants compare by numeric value across `Int`/`Decimal`/`Float64`;
/// text compares lexicographically, case-folded when requested. Any other
/// mixed pair has no defined order and is reported as a coercion failure.
pub fn compare_non_null(
    left: &Value,
    right: &Value,
    case_insensitive: bool,
) -> Result<Ordering, CoercionError> {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => {
            if case_insensitive {
                Ok(a.to_lowercase().cmp(&b.to_lowercase()))
            } else {
                Ok(a.cmp(b))
            }
        }
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (Value::Blob(a), Value::Blob(b)) => Ok(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),
        (
            Value::Int(_) | Value::Decimal(_) | Value::Float64(_),
            Value::Int(_) | Value::Decimal(_) | Value::Float64(_),
        ) => {
            let (Some(a), Some(b)) = (Numeric::from_numeric(left), Numeric::from_numeric(right))
            else {
                return Err(CoercionError::Incomparable {
                    left: left.clone(),
                    right: right.clone(),
                });
            };
            Ok(a.cmp_numeric(b))
        }
        _ => Err(CoercionError::Incomparable {
            left: left.clone(),
            right: right.clone(),
        }),
    }
}

const fn canonical_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) => 2,
        Value::Decimal(_) => 3,
        Value::Float64(_) => 4,
        Value::Timestamp(_) => 5,
        Value::Text(_) => 6,
        Value::Blob(_) => 7,
    }
}

fn canonical_cmp_same_rank(left: &Value, right: &Value) -> Ordering {
    #[allow(clippy::match_same_arms)]
    match (left, right) {
        (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Decimal(a), Value::Decimal(b)) => a.cmp(b),
        (Value::Float64(a), Value::Float64(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) | (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Null, Value::Null) => Ordering::Equal,
        _ => Ordering::Equal,
    }
}
