//! Module: operator
//! Responsibility: the per-row group-by state machine.
//! Does not own: accumulator math, spill framing, or row composition.
//! Boundary: the only component the pipeline talks to; rows go in through
//! `accept`, results go out through a `RowSink`.

#[cfg(test)]
mod tests;

use crate::{
    aggregate::{AggregateSet, CumulativeTracker},
    config::{GroupByConfig, GroupLayout},
    error::InternalError,
    group::{BoundaryDetector, ResultBuilder},
    obs::sink::{MetricsEvent, record},
    pipeline::{RowSink, RowSource},
    row::{Row, RowSchema},
    serialize::{CborRowCodec, RowCodec},
    spill::RowSpillStore,
    value::Value,
};
use serde::Serialize;
use std::{fmt, sync::Arc};

///
/// GroupState
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GroupState {
    AwaitingFirstRow,
    Collecting,
    Emitting,
    Done,
    Failed,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AwaitingFirstRow => "awaiting_first_row",
            Self::Collecting => "collecting",
            Self::Emitting => "emitting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

///
/// OperatorStats
///
/// Per-operator counters, independent of the thread-local metrics state.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct OperatorStats {
    pub rows_received: u64,
    pub groups_emitted: u64,
    pub rows_emitted: u64,
    pub rows_spilled: u64,
    pub observations_skipped: u64,
}

///
/// OpenGroup
///
/// All per-group state. Reset, never rebuilt, between groups.
///

struct OpenGroup {
    aggregates: AggregateSet,
    cumulative: CumulativeTracker,
    store: RowSpillStore,
    keys: Vec<Value>,
    members: u64,
}

impl OpenGroup {
    fn new(layout: &GroupLayout, codec: Arc<dyn RowCodec>) -> Self {
        Self {
            aggregates: AggregateSet::new(layout),
            cumulative: CumulativeTracker::new(layout),
            store: RowSpillStore::new(layout.spill(), codec),
            keys: Vec::new(),
            members: 0,
        }
    }

    fn reset(&mut self) {
        self.aggregates.reset();
        self.cumulative.reset();
        self.store.clear();
        self.keys.clear();
        self.members = 0;
    }
}

///
/// GroupByOperator
///
/// Streaming group-by over rows pre-sorted by the group key. Each maximal
/// run of equal-key rows (cut additionally by batch boundaries) produces one
/// aggregate row, or in pass-through mode one row per member.
///

pub struct GroupByOperator {
    layout: GroupLayout,
    detector: BoundaryDetector,
    builder: ResultBuilder,
    group: OpenGroup,
    state: GroupState,
    stats: OperatorStats,
}

impl GroupByOperator {
    /// Validate `config` against `schema` and build an operator.
    pub fn new(schema: &RowSchema, config: &GroupByConfig) -> Result<Self, InternalError> {
        let layout = config.resolve(schema)?;

        Ok(Self::from_layout(layout))
    }

    #[must_use]
    pub fn from_layout(layout: GroupLayout) -> Self {
        Self {
            detector: BoundaryDetector::new(&layout),
            builder: ResultBuilder::new(&layout),
            group: OpenGroup::new(&layout, Arc::new(CborRowCodec)),
            state: GroupState::AwaitingFirstRow,
            stats: OperatorStats::default(),
            layout,
        }
    }

    /// Replace the spill codec.
    #[must_use]
    pub fn with_codec(mut self, codec: impl RowCodec + 'static) -> Self {
        self.group.store.set_codec(Arc::new(codec));
        self
    }

    #[must_use]
    pub const fn state(&self) -> GroupState {
        self.state
    }

    #[must_use]
    pub const fn stats(&self) -> OperatorStats {
        self.stats
    }

    #[must_use]
    pub const fn layout(&self) -> &GroupLayout {
        &self.layout
    }

    #[must_use]
    pub const fn output_schema(&self) -> &RowSchema {
        self.layout.output_schema()
    }

    /// Feed one row. Emits the previous group first when `row` opens a new
    /// one.
    ///
    /// A row that cannot be added (spill failure, strict coercion) moves the
    /// operator to `Failed` and discards the open group.
    pub fn accept<S: RowSink + ?Sized>(
        &mut self,
        row: Row,
        sink: &mut S,
    ) -> Result<(), InternalError> {
        self.ensure_accepting()?;

        let arity = self.layout.input_schema().arity();
        if row.len() != arity {
            return Err(InternalError::operator_invariant(format!(
                "row has {} fields; input schema has {arity}",
                row.len()
            )));
        }

        self.stats.rows_received += 1;
        record(MetricsEvent::RowsReceived { rows: 1 });

        let keys = self.detector.key_values(&row);
        if self.state == GroupState::Collecting
            && !self.detector.same_group(&self.group.keys, &keys)?
        {
            self.emit_group(sink)?;
        }

        self.state = GroupState::Collecting;
        if let Err(err) = self.add_member(row, keys) {
            self.fail(&err);
            return Err(err);
        }

        Ok(())
    }

    /// Forced boundary: emit the open group, if any. The next row starts a
    /// new group even when its key matches.
    pub fn flush_batch<S: RowSink + ?Sized>(
        &mut self,
        sink: &mut S,
    ) -> Result<(), InternalError> {
        self.ensure_accepting()?;

        if self.state == GroupState::Collecting {
            self.emit_group(sink)?;
        }
        self.state = GroupState::AwaitingFirstRow;

        Ok(())
    }

    /// End of input: emit the open group, or the single empty-input row when
    /// configured, and stop.
    pub fn finish<S: RowSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), InternalError> {
        match self.state {
            GroupState::Done => return Ok(()),
            GroupState::Emitting => return Err(failed_emission()),
            GroupState::Failed => return Err(failed_member()),
            GroupState::Collecting => self.emit_group(sink)?,
            GroupState::AwaitingFirstRow => {
                if self.stats.rows_received == 0 && self.layout.always_emit_one_row() {
                    self.emit_empty(sink)?;
                }
            }
        }
        self.state = GroupState::Done;

        Ok(())
    }

    /// Early termination: drop the open group without emitting it and remove
    /// any spill file.
    pub fn cancel(&mut self) {
        if self.group.members > 0 {
            tracing::debug!(members = self.group.members, "discarding open group");
        }
        self.group.reset();
        self.state = GroupState::Done;
    }

    /// Drive the operator from `source` into `sink` until end of stream.
    pub fn run<R, S>(&mut self, source: &mut R, sink: &mut S) -> Result<(), InternalError>
    where
        R: RowSource + ?Sized,
        S: RowSink + ?Sized,
    {
        while let Some(row) = source.next_row()? {
            self.accept(row, sink)?;
            if source.is_batch_end() {
                self.flush_batch(sink)?;
            }
        }

        self.finish(sink)
    }

    fn ensure_accepting(&self) -> Result<(), InternalError> {
        match self.state {
            GroupState::Done => Err(InternalError::operator_invariant(
                "operator is done and accepts no further input",
            )),
            GroupState::Emitting => Err(failed_emission()),
            GroupState::Failed => Err(failed_member()),
            GroupState::AwaitingFirstRow | GroupState::Collecting => Ok(()),
        }
    }

    fn add_member(&mut self, row: Row, keys: Vec<Value>) -> Result<(), InternalError> {
        let group = &mut self.group;

        self.stats.observations_skipped += group.aggregates.observe(&row)?;
        if self.layout.pass_through() {
            group.store.append(row)?;
        } else {
            self.stats.observations_skipped += group.cumulative.advance(&row)?;
        }
        group.keys = keys;
        group.members += 1;

        Ok(())
    }

    // On failure the operator stays in `Emitting`.
    fn emit_group<S: RowSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), InternalError> {
        self.state = GroupState::Emitting;

        let group = &mut self.group;
        let input_rows = group.members;
        let finalized = group.aggregates.finalize();

        let output_rows = if self.layout.pass_through() {
            self.stats.rows_spilled += group.store.spilled_len();
            group.cumulative.reset();

            let drain = group.store.drain()?;
            let emitted = self.builder.emit_pass_through(
                drain,
                &finalized,
                &mut group.cumulative,
                sink,
            )?;
            self.stats.observations_skipped += emitted.skipped;

            emitted.rows
        } else {
            let keys = std::mem::take(&mut group.keys);
            let row = self
                .builder
                .aggregate_row(keys, finalized, group.cumulative.values());
            sink.put_row(row)?;

            1
        };

        self.record_group(input_rows, output_rows);
        self.group.reset();

        Ok(())
    }

    fn fail(&mut self, err: &InternalError) {
        tracing::warn!(
            members = self.group.members,
            error = %err.display_with_class(),
            "discarding open group after failure"
        );
        self.group.reset();
        self.state = GroupState::Failed;
    }

    fn emit_empty<S: RowSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), InternalError> {
        self.state = GroupState::Emitting;

        self.group.reset();
        let row = self
            .builder
            .empty_input_row(self.group.aggregates.finalize(), self.group.cumulative.values());
        sink.put_row(row)?;
        self.record_group(0, 1);

        Ok(())
    }

    fn record_group(&mut self, input_rows: u64, output_rows: u64) {
        self.stats.groups_emitted += 1;
        self.stats.rows_emitted += output_rows;

        tracing::debug!(input_rows, output_rows, "emitted group");
        record(MetricsEvent::GroupEmitted {
            input_rows,
            output_rows,
        });
    }
}

fn failed_emission() -> InternalError {
    InternalError::operator_invariant("a previous group emission failed; operator cannot continue")
}

fn failed_member() -> InternalError {
    InternalError::operator_invariant("a previous row could not be added; operator cannot continue")
}
