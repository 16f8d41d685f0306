use crate::{
    types::{Decimal, Float64},
    value::{Value, ValueKind},
};
use rust_decimal::prelude::ToPrimitive;
use std::cmp::Ordering;

///
/// Numeric
///
/// Arithmetic view of a value after coercion.
/// Sums stay in the narrowest exact representation: integers widen to
/// decimals on overflow, decimals widen to floats on overflow, and any
/// float operand makes the result a float.
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Numeric {
    Int(i64),
    Decimal(Decimal),
    Float(f64),
}

impl Numeric {
    /// Project a numeric variant; `None` for every other variant.
    #[must_use]
    pub const fn from_numeric(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(Self::Int(*v)),
            Value::Decimal(v) => Some(Self::Decimal(*v)),
            Value::Float64(v) => Some(Self::Float(v.get())),
            _ => None,
        }
    }

    #[must_use]
    pub fn add(self, other: Self) -> Self {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.checked_add(b).map_or_else(
                || Self::Decimal(Decimal::from(a) + Decimal::from(b)),
                Self::Int,
            ),
            (Self::Float(_), _) | (_, Self::Float(_)) => {
                Self::Float(self.to_f64() + other.to_f64())
            }
            _ => match (self.to_decimal(), other.to_decimal()) {
                (Some(a), Some(b)) => a
                    .checked_add(b)
                    .map_or_else(|| Self::Float(self.to_f64() + other.to_f64()), Self::Decimal),
                _ => Self::Float(self.to_f64() + other.to_f64()),
            },
        }
    }

    /// Divide a running total by an observation count.
    ///
    /// Integer totals divide as floats; decimal totals stay decimal when the
    /// quotient is representable.
    #[must_use]
    pub fn mean(self, count: u64) -> Option<Self> {
        if count == 0 {
            return None;
        }

        let mean = match self {
            Self::Int(total) => Self::Float(total as f64 / count as f64),
            Self::Decimal(total) => total
                .checked_div(Decimal::from(count))
                .map_or_else(|| Self::Float(self.to_f64() / count as f64), Self::Decimal),
            Self::Float(total) => Self::Float(total / count as f64),
        };

        Some(mean)
    }

    #[must_use]
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Decimal(v) => v.to_f64().unwrap_or(f64::NAN),
            Self::Float(v) => v,
        }
    }

    #[must_use]
    pub fn to_decimal(self) -> Option<Decimal> {
        match self {
            Self::Int(v) => Some(Decimal::from(v)),
            Self::Decimal(v) => Some(v),
            Self::Float(_) => None,
        }
    }

    /// Compare by numeric value across representations.
    #[must_use]
    pub fn cmp_numeric(self, other: Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(&b),
            (Self::Float(_), _) | (_, Self::Float(_)) => self.to_f64().total_cmp(&other.to_f64()),
            _ => match (self.to_decimal(), other.to_decimal()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => self.to_f64().total_cmp(&other.to_f64()),
            },
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Int(v) => Value::Int(v),
            Self::Decimal(v) => Value::Decimal(v),
            Self::Float(v) => Value::Float64(Float64::new(v)),
        }
    }

    /// Convert into a value of the declared output kind where that widens.
    ///
    /// Narrowing never happens: an overflowed integer sum stays decimal and a
    /// float stays float when the target is an integer or decimal.
    #[must_use]
    pub fn into_value_as(self, kind: ValueKind) -> Value {
        match (kind, self) {
            (ValueKind::Float64, _) => Value::Float64(Float64::new(self.to_f64())),
            (ValueKind::Decimal, Self::Int(v)) => Value::Decimal(Decimal::from(v)),
            _ => self.into_value(),
        }
    }
}
