use crate::{
    aggregate::CumulativeTracker,
    config::GroupLayout,
    error::InternalError,
    pipeline::RowSink,
    row::Row,
    spill::SpillDrain,
    value::Value,
};

///
/// ResultBuilder
///
/// Composes output rows for a closed group.
///
/// Aggregate-only rows are the key values followed by every aggregate in
/// configuration order. Pass-through rows are the original row, the
/// non-cumulative aggregates, the optional line number, then the running
/// cumulative values as of that row.
///

#[derive(Clone, Debug)]
pub struct ResultBuilder {
    pass_through: bool,
    line_number: bool,
    cumulative_order: Vec<bool>,
    input_arity: usize,
    key_count: usize,
}

///
/// Emitted
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Emitted {
    pub rows: u64,
    pub skipped: u64,
}

impl ResultBuilder {
    #[must_use]
    pub fn new(layout: &GroupLayout) -> Self {
        Self {
            pass_through: layout.pass_through(),
            line_number: layout.emits_line_number(),
            cumulative_order: layout
                .aggregates()
                .iter()
                .map(|agg| agg.function.is_cumulative())
                .collect(),
            input_arity: layout.input_schema().arity(),
            key_count: layout.keys().len(),
        }
    }

    /// The single aggregate-only row for a group.
    #[must_use]
    pub fn aggregate_row(
        &self,
        keys: Vec<Value>,
        finalized: Vec<Value>,
        cumulative: Vec<Value>,
    ) -> Row {
        let mut finalized = finalized.into_iter();
        let mut cumulative = cumulative.into_iter();

        let mut row = Row::new(keys);
        for &is_cumulative in &self.cumulative_order {
            let value = if is_cumulative {
                cumulative.next()
            } else {
                finalized.next()
            };
            row.push(value.unwrap_or(Value::Null));
        }

        row
    }

    /// One pass-through row; `line` is 1-based within the group.
    #[must_use]
    pub fn pass_through_row(
        &self,
        mut input: Row,
        finalized: &[Value],
        line: u64,
        cumulative: Vec<Value>,
    ) -> Row {
        input.extend(finalized.iter().cloned());
        if self.line_number {
            input.push(Value::Int(i64::try_from(line).unwrap_or(i64::MAX)));
        }
        input.extend(cumulative);

        input
    }

    /// Replay a drained group through the cumulative tracker and emit one
    /// output row per member, in original order.
    pub fn emit_pass_through<S: RowSink + ?Sized>(
        &self,
        drain: SpillDrain,
        finalized: &[Value],
        tracker: &mut CumulativeTracker,
        sink: &mut S,
    ) -> Result<Emitted, InternalError> {
        let mut emitted = Emitted::default();
        for row in drain {
            let row = row?;
            emitted.skipped += tracker.advance(&row)?;
            emitted.rows += 1;

            let out = self.pass_through_row(row, finalized, emitted.rows, tracker.values());
            sink.put_row(out)?;
        }

        Ok(emitted)
    }

    /// Row for an entirely empty input when "always emit one row" is set.
    #[must_use]
    pub fn empty_input_row(&self, finalized: Vec<Value>, cumulative: Vec<Value>) -> Row {
        if self.pass_through {
            self.pass_through_row(Row::nulls(self.input_arity), &finalized, 1, cumulative)
        } else {
            self.aggregate_row(vec![Value::Null; self.key_count], finalized, cumulative)
        }
    }
}
