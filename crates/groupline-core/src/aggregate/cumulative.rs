use crate::{
    config::{AggregateFunction, ResolvedAggregate},
    value::{CoercionError, Numeric, Value, ValueKind},
};

///
/// RunningMetric
///
/// Running sum or average for one cumulative aggregate within the open
/// group. A null subject carries the previous running value forward.
///

#[derive(Clone, Debug)]
pub struct RunningMetric {
    average: bool,
    subject: Option<usize>,
    output_kind: ValueKind,
    total: Option<Numeric>,
    count: u64,
}

impl RunningMetric {
    /// Running state for `aggregate`; `None` for non-cumulative functions.
    #[must_use]
    pub fn new(aggregate: &ResolvedAggregate) -> Option<Self> {
        let average = match aggregate.function {
            AggregateFunction::CumulativeSum => false,
            AggregateFunction::CumulativeAverage => true,
            _ => return None,
        };

        Some(Self {
            average,
            subject: aggregate.subject,
            output_kind: aggregate.output.kind,
            total: None,
            count: 0,
        })
    }

    #[must_use]
    pub const fn subject(&self) -> Option<usize> {
        self.subject
    }

    #[must_use]
    pub const fn output_kind(&self) -> ValueKind {
        self.output_kind
    }

    pub fn reset(&mut self) {
        self.total = None;
        self.count = 0;
    }

    /// Include one more row's subject value.
    pub fn advance(&mut self, value: &Value) -> Result<(), CoercionError> {
        if let Some(n) = Numeric::coerce(value)? {
            self.total = Some(self.total.map_or(n, |t| t.add(n)));
            self.count += 1;
        }

        Ok(())
    }

    /// Running value after the last `advance`.
    #[must_use]
    pub fn current(&self) -> Value {
        let running = if self.average {
            self.total.and_then(|t| t.mean(self.count))
        } else {
            self.total
        };

        running.map_or(Value::Null, |n| n.into_value_as(self.output_kind))
    }
}
