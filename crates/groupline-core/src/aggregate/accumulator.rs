use crate::{
    aggregate::percentile::percentile,
    config::{AggregateFunction, NullPolicy, ResolvedAggregate},
    row::FieldMeta,
    value::{CoercionError, Numeric, Value},
};
use std::{cmp::Ordering, collections::BTreeSet};

const COMMA_SEPARATOR: &str = ", ";
const MEDIAN_PERCENTILE: f64 = 50.0;

///
/// Accumulator
///
/// Per-group state for one non-cumulative aggregate.
///
/// `observe` may reject a value it cannot interpret; the caller decides
/// whether that skips the observation or aborts the stream. `finalize` is
/// pure and returns `Value::Null` where the aggregate has no defined result.
///

#[derive(Clone, Debug)]
pub enum Accumulator {
    Sum {
        total: Option<Numeric>,
    },
    Average {
        total: Option<Numeric>,
        count: u64,
    },
    Percentile {
        percentile: f64,
        values: Vec<f64>,
    },
    StandardDeviation(Welford),
    CountDistinct(BTreeSet<Value>),
    CountAll(u64),
    CountAny(u64),
    Min {
        field: FieldMeta,
        null_is_valid: bool,
        best: Option<Value>,
    },
    Max {
        field: FieldMeta,
        best: Option<Value>,
    },
    First(Option<Value>),
    Last(Option<Value>),
    FirstIncludingNull(Option<Value>),
    LastIncludingNull(Option<Value>),
    Concat {
        separator: String,
        buffer: String,
        started: bool,
    },
}

impl Accumulator {
    /// Fresh accumulator for `aggregate`; `None` for cumulative functions,
    /// which are tracked per emitted row instead.
    #[must_use]
    pub fn new(aggregate: &ResolvedAggregate, policy: NullPolicy) -> Option<Self> {
        let field = || {
            aggregate.subject_field.clone().unwrap_or_else(|| {
                FieldMeta::new(aggregate.output.name.clone(), aggregate.output.kind)
            })
        };

        let acc = match &aggregate.function {
            AggregateFunction::Sum => Self::Sum { total: None },
            AggregateFunction::Average => Self::Average {
                total: None,
                count: 0,
            },
            AggregateFunction::Median => Self::Percentile {
                percentile: MEDIAN_PERCENTILE,
                values: Vec::new(),
            },
            AggregateFunction::Percentile(p) => Self::Percentile {
                percentile: *p,
                values: Vec::new(),
            },
            AggregateFunction::StandardDeviation => Self::StandardDeviation(Welford::default()),
            AggregateFunction::CountDistinct => Self::CountDistinct(BTreeSet::new()),
            AggregateFunction::CountAll => Self::CountAll(0),
            AggregateFunction::CountAny => Self::CountAny(0),
            AggregateFunction::Min => Self::Min {
                field: field(),
                null_is_valid: policy.null_is_valid_min,
                best: None,
            },
            AggregateFunction::Max => Self::Max {
                field: field(),
                best: None,
            },
            AggregateFunction::First => Self::First(None),
            AggregateFunction::Last => Self::Last(None),
            AggregateFunction::FirstIncludingNull => Self::FirstIncludingNull(None),
            AggregateFunction::LastIncludingNull => Self::LastIncludingNull(None),
            AggregateFunction::ConcatWithComma => Self::Concat {
                separator: COMMA_SEPARATOR.to_string(),
                buffer: String::new(),
                started: false,
            },
            AggregateFunction::ConcatWithSeparator(separator) => Self::Concat {
                separator: separator.clone(),
                buffer: String::new(),
                started: false,
            },
            AggregateFunction::CumulativeSum | AggregateFunction::CumulativeAverage => {
                return None;
            }
        };

        Some(acc)
    }

    /// Clear per-group state, keeping configuration.
    pub fn reset(&mut self) {
        match self {
            Self::Sum { total } => *total = None,
            Self::Average { total, count } => {
                *total = None;
                *count = 0;
            }
            Self::Percentile { values, .. } => values.clear(),
            Self::StandardDeviation(w) => *w = Welford::default(),
            Self::CountDistinct(set) => set.clear(),
            Self::CountAll(n) | Self::CountAny(n) => *n = 0,
            Self::Min { best, .. } | Self::Max { best, .. } => *best = None,
            Self::First(slot)
            | Self::Last(slot)
            | Self::FirstIncludingNull(slot)
            | Self::LastIncludingNull(slot) => *slot = None,
            Self::Concat {
                buffer, started, ..
            } => {
                buffer.clear();
                *started = false;
            }
        }
    }

    /// Fold one subject value into the group state.
    pub fn observe(&mut self, value: &Value) -> Result<(), CoercionError> {
        match self {
            Self::Sum { total } => {
                if let Some(n) = Numeric::coerce(value)? {
                    *total = Some(total.map_or(n, |t| t.add(n)));
                }
            }

            Self::Average { total, count } => {
                if let Some(n) = Numeric::coerce(value)? {
                    *total = Some(total.map_or(n, |t| t.add(n)));
                    *count += 1;
                }
            }

            Self::Percentile { values, .. } => {
                if let Some(n) = Numeric::coerce(value)? {
                    values.push(n.to_f64());
                }
            }

            Self::StandardDeviation(w) => {
                if let Some(n) = Numeric::coerce(value)? {
                    w.push(n.to_f64());
                }
            }

            Self::CountDistinct(set) => {
                if !value.is_null() {
                    set.insert(value.normalized());
                }
            }

            Self::CountAll(n) => {
                if !value.is_null() {
                    *n += 1;
                }
            }

            Self::CountAny(n) => *n += 1,

            Self::Min {
                field,
                null_is_valid,
                best,
            } => {
                if value.is_null() {
                    if *null_is_valid {
                        *best = Some(Value::Null);
                    }
                } else {
                    replace_if(best, value, field, Ordering::Less)?;
                }
            }

            Self::Max { field, best } => {
                if !value.is_null() {
                    replace_if(best, value, field, Ordering::Greater)?;
                }
            }

            Self::First(slot) => {
                if slot.is_none() && !value.is_null() {
                    *slot = Some(value.clone());
                }
            }

            Self::Last(slot) => {
                if !value.is_null() {
                    *slot = Some(value.clone());
                }
            }

            Self::FirstIncludingNull(slot) => {
                if slot.is_none() {
                    *slot = Some(value.clone());
                }
            }

            Self::LastIncludingNull(slot) => *slot = Some(value.clone()),

            Self::Concat {
                separator,
                buffer,
                started,
            } => {
                if !value.is_null() {
                    if *started {
                        buffer.push_str(separator);
                    }
                    buffer.push_str(&value.to_string());
                    *started = true;
                }
            }
        }

        Ok(())
    }

    /// Result for the closed group.
    #[must_use]
    pub fn finalize(&self) -> Value {
        match self {
            Self::Sum { total } => total.map_or(Value::Null, Numeric::into_value),
            Self::Average { total, count } => total
                .and_then(|t| t.mean(*count))
                .map_or(Value::Null, Numeric::into_value),
            Self::Percentile { percentile: p, values } => {
                percentile(values, *p).map_or(Value::Null, Value::float)
            }
            Self::StandardDeviation(w) => w.population_std_dev().map_or(Value::Null, Value::float),
            Self::CountDistinct(set) => Value::Int(count_value(set.len() as u64)),
            Self::CountAll(n) | Self::CountAny(n) => Value::Int(count_value(*n)),
            Self::Min { best, .. }
            | Self::Max { best, .. }
            | Self::First(best)
            | Self::Last(best)
            | Self::FirstIncludingNull(best)
            | Self::LastIncludingNull(best) => best.clone().unwrap_or(Value::Null),
            Self::Concat { buffer, .. } => Value::Text(buffer.clone()),
        }
    }
}

// Replace the running extreme when `candidate` orders `wanted` against it
// under the field's natural order.
fn replace_if(
    best: &mut Option<Value>,
    candidate: &Value,
    field: &FieldMeta,
    wanted: Ordering,
) -> Result<(), CoercionError> {
    let replace = match best {
        None => true,
        Some(current) => field.compare_natural(candidate, current)? == wanted,
    };
    if replace {
        *best = Some(candidate.clone());
    }

    Ok(())
}

fn count_value(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

///
/// Welford
///
/// Single-pass population variance.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct Welford {
    count: u64,
    mean: f64,
    sum_squares: f64,
}

impl Welford {
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.sum_squares += delta * (x - self.mean);
    }

    #[must_use]
    pub fn population_std_dev(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }

        Some((self.sum_squares / self.count as f64).sqrt())
    }
}
