mod coercion;
mod compare;
mod numeric;


use crate::types::{Decimal, Float64};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

// re-exports
pub use coercion::CoercionError;
pub use compare::{canonical_cmp, compare_non_null};
pub use numeric::Numeric;

///
/// Value
///
/// One typed field value inside a row.
///
/// Null      → the field is absent for this row.
/// Timestamp → milliseconds since the Unix epoch.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Value {
    Null,
    Blob(#[serde(with = "serde_bytes")] Vec<u8>),
    Bool(bool),
    Decimal(Decimal),
    Float64(Float64),
    Int(i64),
    Text(String),
    Timestamp(i64),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Return the declared kind of a non-null value.
    #[must_use]
    pub const fn kind(&self) -> Option<ValueKind> {
        let kind = match self {
            Self::Null => return None,
            Self::Blob(_) => ValueKind::Blob,
            Self::Bool(_) => ValueKind::Bool,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::Float64(_) => ValueKind::Float64,
            Self::Int(_) => ValueKind::Int,
            Self::Text(_) => ValueKind::Text,
            Self::Timestamp(_) => ValueKind::Timestamp,
        };

        Some(kind)
    }

    #[must_use]
    pub fn float(v: f64) -> Self {
        Self::Float64(Float64::new(v))
    }

    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Normalize a value for distinct-set membership.
    ///
    /// Decimals drop trailing fractional zeros so `1.50` and `1.5` collapse;
    /// every other variant is already canonical.
    #[must_use]
    pub fn normalized(&self) -> Self {
        match self {
            Self::Decimal(d) => Self::Decimal(d.normalize()),
            other => other.clone(),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        canonical_cmp(self, other)
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// String form used by concatenation aggregates.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Blob(bytes) => {
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Self::Bool(b) => write!(f, "{b}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Float64(x) => write!(f, "{x}"),
            Self::Int(i) | Self::Timestamp(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

///
/// ValueKind
///
/// Declared type of a schema field.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Blob,
    Bool,
    Decimal,
    Float64,
    Int,
    Text,
    Timestamp,
}

impl ValueKind {
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Decimal | Self::Float64 | Self::Int)
    }

    /// Zero of a numeric kind; `None` for kinds without a numeric zero.
    #[must_use]
    pub const fn zero(self) -> Option<Value> {
        match self {
            Self::Decimal => Some(Value::Decimal(Decimal::ZERO)),
            Self::Float64 => Some(Value::Float64(Float64::ZERO)),
            Self::Int => Some(Value::Int(0)),
            Self::Blob | Self::Bool | Self::Text | Self::Timestamp => None,
        }
    }

    /// Kind produced by summing values of this kind.
    ///
    /// Non-numeric subjects are coerced; text may parse into any numeric
    /// variant, so its sums are reported as floats.
    #[must_use]
    pub const fn sum_kind(self) -> Self {
        match self {
            Self::Decimal => Self::Decimal,
            Self::Float64 | Self::Text | Self::Blob => Self::Float64,
            Self::Int | Self::Bool | Self::Timestamp => Self::Int,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Blob => "blob",
            Self::Bool => "bool",
            Self::Decimal => "decimal",
            Self::Float64 => "float64",
            Self::Int => "int",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
        };
        f.write_str(label)
    }
}
