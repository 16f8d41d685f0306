//! Module: aggregate
//! Responsibility: per-group accumulators, cumulative running metrics, and
//! the null/zero substitution applied to finalized values.
//! Does not own: group boundaries or row emission.
//! Boundary: the operator feeds whole rows in; accumulators only ever see
//! their own subject value.

mod accumulator;
mod cumulative;
mod percentile;


use crate::{
    config::{GroupLayout, NullPolicy},
    error::InternalError,
    obs::sink::{self, MetricsEvent},
    row::Row,
    value::{CoercionError, Numeric, Value, ValueKind},
};

// re-exports
pub use accumulator::{Accumulator, Welford};
pub use cumulative::RunningMetric;

///
/// AggregateSet
///
/// Every non-cumulative accumulator of one operator, in configuration order.
///

#[derive(Clone, Debug)]
pub struct AggregateSet {
    slots: Vec<Slot>,
    policy: NullPolicy,
    strict: bool,
}

#[derive(Clone, Debug)]
struct Slot {
    accumulator: Accumulator,
    subject: Option<usize>,
    output: String,
    kind: ValueKind,
}

impl AggregateSet {
    #[must_use]
    pub fn new(layout: &GroupLayout) -> Self {
        let policy = layout.null_policy();
        let slots = layout
            .aggregates()
            .iter()
            .filter_map(|agg| {
                Accumulator::new(agg, policy).map(|accumulator| Slot {
                    accumulator,
                    subject: agg.subject,
                    output: agg.output.name.clone(),
                    kind: agg.output.kind,
                })
            })
            .collect();

        Self {
            slots,
            policy,
            strict: layout.strict_coercion(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.accumulator.reset();
        }
    }

    /// Feed one member row; returns the number of skipped observations.
    pub fn observe(&mut self, row: &Row) -> Result<u64, InternalError> {
        let mut skipped = 0;
        for slot in &mut self.slots {
            let value = slot.subject.map_or(&Value::Null, |index| row.value(index));
            skipped += tolerate(slot.accumulator.observe(value), self.strict, &slot.output)?;
        }

        Ok(skipped)
    }

    /// Finalized values with null/zero substitution applied.
    #[must_use]
    pub fn finalize(&self) -> Vec<Value> {
        self.slots
            .iter()
            .map(|slot| finish_value(slot.accumulator.finalize(), slot.kind, self.policy))
            .collect()
    }
}

///
/// CumulativeTracker
///
/// Running sums and averages for the open group, advanced one emitted row
/// at a time.
///

#[derive(Clone, Debug)]
pub struct CumulativeTracker {
    metrics: Vec<RunningMetric>,
    outputs: Vec<String>,
    policy: NullPolicy,
    strict: bool,
}

impl CumulativeTracker {
    #[must_use]
    pub fn new(layout: &GroupLayout) -> Self {
        let (metrics, outputs) = layout
            .aggregates()
            .iter()
            .filter_map(|agg| RunningMetric::new(agg).map(|m| (m, agg.output.name.clone())))
            .unzip();

        Self {
            metrics,
            outputs,
            policy: layout.null_policy(),
            strict: layout.strict_coercion(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn reset(&mut self) {
        for metric in &mut self.metrics {
            metric.reset();
        }
    }

    /// Include `row`; returns the number of skipped observations.
    pub fn advance(&mut self, row: &Row) -> Result<u64, InternalError> {
        let mut skipped = 0;
        for (metric, output) in self.metrics.iter_mut().zip(&self.outputs) {
            let value = metric.subject().map_or(&Value::Null, |index| row.value(index));
            skipped += tolerate(metric.advance(value), self.strict, output)?;
        }

        Ok(skipped)
    }

    /// Current running values with null/zero substitution applied.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.metrics
            .iter()
            .map(|m| finish_value(m.current(), m.output_kind(), self.policy))
            .collect()
    }
}

/// Conform a finalized value to its output kind.
///
/// Nulls become the kind's zero when `nulls_are_zero` is set; numeric values
/// widen to the declared numeric kind.
#[must_use]
pub fn finish_value(value: Value, kind: ValueKind, policy: NullPolicy) -> Value {
    if value.is_null() {
        return if policy.nulls_are_zero {
            kind.zero().unwrap_or(Value::Null)
        } else {
            Value::Null
        };
    }

    match Numeric::from_numeric(&value) {
        Some(n) if kind.is_numeric() => n.into_value_as(kind),
        _ => value,
    }
}

// Skip a failed observation with a warning, or abort under strict coercion.
fn tolerate(
    result: Result<(), CoercionError>,
    strict: bool,
    output: &str,
) -> Result<u64, InternalError> {
    match result {
        Ok(()) => Ok(0),
        Err(err) if strict => Err(err.into_internal_error()),
        Err(err) => {
            tracing::warn!(aggregate = output, error = %err, "skipping observation");
            sink::record(MetricsEvent::ObservationSkipped);

            Ok(1)
        }
    }
}
