use crate::{
    config::{AggregateKind, AggregateSpec, GroupByConfig, NullPolicy},
    error::{ErrorClass, ErrorOrigin, InternalError},
    obs::{MetricsEvent, MetricsSink, with_metrics_sink},
    operator::{GroupByOperator, GroupState},
    pipeline::{RowSink, VecSource},
    row::{FieldMeta, Row, RowSchema},
    serialize::{CborRowCodec, RowCodec, SerializeError},
    value::{Value, ValueKind},
};
use std::{cell::RefCell, fs, path::Path, rc::Rc};
use tempfile::TempDir;

// ---- helpers -----------------------------------------------------------

fn schema() -> RowSchema {
    vec![
        FieldMeta::new("dept", ValueKind::Text),
        FieldMeta::new("salary", ValueKind::Int),
    ]
    .into()
}

fn row(dept: &str, salary: i64) -> Row {
    Row::new(vec![Value::text(dept), Value::Int(salary)])
}

fn sum_by_dept() -> GroupByConfig {
    GroupByConfig::default()
        .group_by(["dept"])
        .aggregate(AggregateSpec::new("salary", AggregateKind::Sum, "total"))
}

fn operator(config: &GroupByConfig) -> GroupByOperator {
    GroupByOperator::new(&schema(), config).expect("operator")
}

fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).expect("read dir").count()
}

///
/// FailingSink
///

struct FailingSink;

impl RowSink for FailingSink {
    fn put_row(&mut self, _row: Row) -> Result<(), InternalError> {
        Err(InternalError::pipeline_internal("downstream closed"))
    }
}

///
/// FailingEncodeCodec
///

struct FailingEncodeCodec;

impl RowCodec for FailingEncodeCodec {
    fn encode(&self, _row: &Row) -> Result<Vec<u8>, SerializeError> {
        Err(SerializeError::Serialize("boom".to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Row, SerializeError> {
        CborRowCodec.decode(bytes)
    }
}

// ---- state machine -----------------------------------------------------

#[test]
fn state_moves_through_collecting_to_done() {
    let mut op = operator(&sum_by_dept());
    let mut out: Vec<Row> = Vec::new();
    assert_eq!(op.state(), GroupState::AwaitingFirstRow);

    op.accept(row("A", 1), &mut out).expect("accept");
    assert_eq!(op.state(), GroupState::Collecting);

    op.finish(&mut out).expect("finish");
    assert_eq!(op.state(), GroupState::Done);
    assert_eq!(out, vec![Row::new(vec![Value::text("A"), Value::Int(1)])]);
}

#[test]
fn key_change_emits_previous_group() {
    let mut op = operator(&sum_by_dept());
    let mut out: Vec<Row> = Vec::new();

    op.accept(row("A", 10), &mut out).expect("accept");
    op.accept(row("A", 20), &mut out).expect("accept");
    assert!(out.is_empty(), "nothing is emitted while a group is open");

    op.accept(row("B", 5), &mut out).expect("accept");
    assert_eq!(out, vec![Row::new(vec![Value::text("A"), Value::Int(30)])]);

    op.finish(&mut out).expect("finish");
    assert_eq!(out[1], Row::new(vec![Value::text("B"), Value::Int(5)]));

    let stats = op.stats();
    assert_eq!(stats.rows_received, 3);
    assert_eq!(stats.groups_emitted, 2);
    assert_eq!(stats.rows_emitted, 2);
}

#[test]
fn forced_flush_splits_equal_keys() {
    let mut op = operator(&sum_by_dept());
    let mut out: Vec<Row> = Vec::new();

    op.accept(row("A", 1), &mut out).expect("accept");
    op.flush_batch(&mut out).expect("flush");
    assert_eq!(op.state(), GroupState::AwaitingFirstRow);
    op.accept(row("A", 2), &mut out).expect("accept");
    op.finish(&mut out).expect("finish");

    assert_eq!(
        out,
        vec![
            Row::new(vec![Value::text("A"), Value::Int(1)]),
            Row::new(vec![Value::text("A"), Value::Int(2)]),
        ]
    );
}

#[test]
fn flush_without_open_group_emits_nothing() {
    let mut op = operator(&sum_by_dept());
    let mut out: Vec<Row> = Vec::new();

    op.flush_batch(&mut out).expect("flush");
    op.flush_batch(&mut out).expect("flush");

    assert!(out.is_empty());
}

#[test]
fn reappearing_key_forms_a_new_group() {
    let mut op = operator(&sum_by_dept());
    let mut out: Vec<Row> = Vec::new();

    for r in [row("A", 1), row("B", 2), row("A", 3)] {
        op.accept(r, &mut out).expect("accept");
    }
    op.finish(&mut out).expect("finish");

    assert_eq!(out.len(), 3);
}

// ---- errors ------------------------------------------------------------

#[test]
fn unknown_fields_fail_construction() {
    let config = GroupByConfig::default().group_by(["nope"]);
    let err = GroupByOperator::new(&schema(), &config)
        .err()
        .expect("configuration error");

    assert!(err.is_configuration());
}

#[test]
fn wrong_arity_is_an_invariant_error() {
    let mut op = operator(&sum_by_dept());
    let mut out: Vec<Row> = Vec::new();

    let err = op
        .accept(Row::new(vec![Value::text("A")]), &mut out)
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert_eq!(op.state(), GroupState::AwaitingFirstRow);
}

#[test]
fn input_after_done_is_rejected() {
    let mut op = operator(&sum_by_dept());
    let mut out: Vec<Row> = Vec::new();
    op.finish(&mut out).expect("finish");

    let err = op.accept(row("A", 1), &mut out).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert!(op.finish(&mut out).is_ok(), "finish is idempotent");
}

#[test]
fn failed_emission_leaves_operator_in_emitting() {
    let mut op = operator(&sum_by_dept());

    op.accept(row("A", 1), &mut FailingSink).expect("accept");
    let err = op.accept(row("B", 2), &mut FailingSink).unwrap_err();
    assert_eq!(err.class, ErrorClass::Internal);
    assert_eq!(op.state(), GroupState::Emitting);

    let mut out: Vec<Row> = Vec::new();
    let err = op.accept(row("C", 3), &mut out).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert!(op.finish(&mut out).is_err());
}

#[test]
fn incomparable_key_values_abort_the_stream() {
    let mut op = operator(&sum_by_dept());
    let mut out: Vec<Row> = Vec::new();

    op.accept(row("A", 1), &mut out).expect("accept");
    let err = op
        .accept(Row::new(vec![Value::Int(7), Value::Int(1)]), &mut out)
        .unwrap_err();

    assert!(err.is_coercion());
}

#[test]
fn lenient_coercion_counts_skipped_observations() {
    let config = GroupByConfig::default()
        .group_by(["dept"])
        .aggregate(AggregateSpec::new("dept", AggregateKind::Sum, "weird"));
    let mut op = operator(&config);
    let mut out: Vec<Row> = Vec::new();

    op.accept(row("A", 1), &mut out).expect("accept");
    op.finish(&mut out).expect("finish");

    assert_eq!(op.stats().observations_skipped, 1);
    assert_eq!(out, vec![Row::new(vec![Value::text("A"), Value::Null])]);
}

// ---- empty input -------------------------------------------------------

#[test]
fn empty_input_emits_nothing_by_default() {
    let mut op = operator(&sum_by_dept());
    let mut out: Vec<Row> = Vec::new();
    op.finish(&mut out).expect("finish");

    assert!(out.is_empty());
}

#[test]
fn empty_input_with_always_emit_one_row() {
    let config = sum_by_dept()
        .aggregate(AggregateSpec::new("salary", AggregateKind::CountAll, "n"))
        .always_emit_one_row(true);

    let mut out: Vec<Row> = Vec::new();
    operator(&config).finish(&mut out).expect("finish");
    assert_eq!(
        out,
        vec![Row::new(vec![Value::Null, Value::Null, Value::Int(0)])]
    );

    let zeroed = config.null_policy(NullPolicy {
        nulls_are_zero: true,
        ..NullPolicy::default()
    });
    let mut out: Vec<Row> = Vec::new();
    operator(&zeroed).finish(&mut out).expect("finish");
    assert_eq!(
        out,
        vec![Row::new(vec![Value::Null, Value::Int(0), Value::Int(0)])]
    );
}

#[test]
fn always_emit_one_row_is_only_for_empty_input() {
    let config = sum_by_dept().always_emit_one_row(true);
    let mut op = operator(&config);
    let mut out: Vec<Row> = Vec::new();

    op.accept(row("A", 1), &mut out).expect("accept");
    op.flush_batch(&mut out).expect("flush");
    op.finish(&mut out).expect("finish");

    assert_eq!(out.len(), 1);
}

// ---- aggregate-only cumulative -----------------------------------------

#[test]
fn cumulative_in_aggregate_only_mode_is_running_value_after_last_row() {
    let config = GroupByConfig::default()
        .group_by(["dept"])
        .aggregate(AggregateSpec::new("salary", AggregateKind::CumulativeAverage, "avg"));
    let mut op = operator(&config);
    let mut out: Vec<Row> = Vec::new();

    for r in [row("A", 1), row("A", 2), row("B", 9)] {
        op.accept(r, &mut out).expect("accept");
    }
    op.finish(&mut out).expect("finish");

    assert_eq!(
        out,
        vec![
            Row::new(vec![Value::text("A"), Value::float(1.5)]),
            Row::new(vec![Value::text("B"), Value::float(9.0)]),
        ]
    );
}

// ---- pass-through ------------------------------------------------------

#[test]
fn pass_through_appends_group_aggregates_to_every_row() {
    let dir = TempDir::new().expect("temp dir");
    let config = GroupByConfig::default()
        .group_by(["dept"])
        .pass_through(true)
        .line_number_field("line")
        .buffer_rows(2)
        .spill_directory(dir.path())
        .aggregate(AggregateSpec::new("salary", AggregateKind::Max, "top"))
        .aggregate(AggregateSpec::new("salary", AggregateKind::CumulativeSum, "running"));
    let mut op = operator(&config);
    let mut out: Vec<Row> = Vec::new();

    for i in 1..=5 {
        op.accept(row("A", i), &mut out).expect("accept");
    }
    assert_eq!(file_count(dir.path()), 1, "group of 5 over a buffer of 2 spills");

    op.accept(row("B", 100), &mut out).expect("accept");
    assert_eq!(file_count(dir.path()), 0, "spill file is removed once drained");
    op.finish(&mut out).expect("finish");

    let expected: Vec<Row> = [1, 2, 3, 4, 5]
        .iter()
        .scan(0, |running, &i| {
            *running += i;
            Some(Row::new(vec![
                Value::text("A"),
                Value::Int(i),
                Value::Int(5),
                Value::Int(i),
                Value::Int(*running),
            ]))
        })
        .chain([Row::new(vec![
            Value::text("B"),
            Value::Int(100),
            Value::Int(100),
            Value::Int(1),
            Value::Int(100),
        ])])
        .collect();
    assert_eq!(out, expected);
    assert_eq!(op.stats().rows_spilled, 3);
    assert_eq!(op.stats().rows_emitted, 6);
}

#[test]
fn cancel_discards_open_group_and_spill_file() {
    let dir = TempDir::new().expect("temp dir");
    let config = GroupByConfig::default()
        .group_by(["dept"])
        .pass_through(true)
        .buffer_rows(1)
        .spill_directory(dir.path());
    let mut op = operator(&config);
    let mut out: Vec<Row> = Vec::new();

    for i in 0..3 {
        op.accept(row("A", i), &mut out).expect("accept");
    }
    assert_eq!(file_count(dir.path()), 1);

    op.cancel();
    assert_eq!(op.state(), GroupState::Done);
    assert_eq!(file_count(dir.path()), 0);
    assert!(out.is_empty());
}

#[test]
fn dropping_the_operator_removes_the_spill_file() {
    let dir = TempDir::new().expect("temp dir");
    let config = GroupByConfig::default()
        .pass_through(true)
        .buffer_rows(1)
        .spill_directory(dir.path());
    let mut op = operator(&config);
    let mut out: Vec<Row> = Vec::new();

    op.accept(row("A", 1), &mut out).expect("accept");
    op.accept(row("A", 2), &mut out).expect("accept");
    assert_eq!(file_count(dir.path()), 1);

    drop(op);
    assert_eq!(file_count(dir.path()), 0);
}

#[test]
fn spill_encode_failure_fails_the_operator() {
    let dir = TempDir::new().expect("temp dir");
    let config = GroupByConfig::default()
        .group_by(["dept"])
        .pass_through(true)
        .buffer_rows(1)
        .spill_directory(dir.path())
        .aggregate(AggregateSpec::new("salary", AggregateKind::Sum, "total"));
    let mut op = operator(&config).with_codec(FailingEncodeCodec);
    let mut out: Vec<Row> = Vec::new();

    op.accept(row("A", 1), &mut out).expect("accept");
    let err = op.accept(row("A", 2), &mut out).unwrap_err();
    assert_eq!(err.origin, ErrorOrigin::Serialize);
    assert_eq!(op.state(), GroupState::Failed);

    let err = op.accept(row("A", 3), &mut out).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert!(op.finish(&mut out).is_err());
    assert!(out.is_empty(), "no partial group may be emitted");
    assert_eq!(file_count(dir.path()), 0);
}

#[test]
fn spill_file_creation_failure_fails_the_operator() {
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("missing");
    let config = GroupByConfig::default()
        .group_by(["dept"])
        .pass_through(true)
        .buffer_rows(1)
        .spill_directory(&missing);
    let mut op = operator(&config);
    let mut out: Vec<Row> = Vec::new();

    op.accept(row("A", 1), &mut out).expect("accept");
    let err = op.accept(row("A", 2), &mut out).unwrap_err();
    assert_eq!(err.class, ErrorClass::Io);
    assert_eq!(err.origin, ErrorOrigin::Spill);
    assert_eq!(op.state(), GroupState::Failed);

    let err = op.accept(row("B", 1), &mut out).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert!(op.finish(&mut out).is_err());
    assert!(out.is_empty());
    assert!(!missing.exists());
    assert_eq!(file_count(dir.path()), 0);
}

#[test]
fn oversized_spill_row_fails_the_operator() {
    let dir = TempDir::new().expect("temp dir");
    let schema: RowSchema = vec![
        FieldMeta::new("dept", ValueKind::Text),
        FieldMeta::new("payload", ValueKind::Blob),
    ]
    .into();
    let config = GroupByConfig::default()
        .group_by(["dept"])
        .pass_through(true)
        .buffer_rows(1)
        .spill_directory(dir.path());
    let mut op = GroupByOperator::new(&schema, &config).expect("operator");
    let mut out: Vec<Row> = Vec::new();

    let big = Row::new(vec![Value::text("A"), Value::Blob(vec![0u8; 17 * 1024 * 1024])]);
    op.accept(big, &mut out).expect("accept");
    let err = op
        .accept(Row::new(vec![Value::text("A"), Value::Blob(vec![1])]), &mut out)
        .unwrap_err();

    assert_eq!(err.origin, ErrorOrigin::Spill);
    assert_eq!(op.state(), GroupState::Failed);
    assert!(op.finish(&mut out).is_err());
    assert!(out.is_empty());
    assert_eq!(file_count(dir.path()), 0);
}

#[test]
fn cancel_after_failure_is_done() {
    let config = GroupByConfig::default()
        .pass_through(true)
        .buffer_rows(1)
        .spill_directory(Path::new("/nonexistent/groupline"));
    let mut op = operator(&config);
    let mut out: Vec<Row> = Vec::new();

    op.accept(row("A", 1), &mut out).expect("accept");
    assert!(op.accept(row("A", 2), &mut out).is_err());

    op.cancel();
    assert_eq!(op.state(), GroupState::Done);
    assert!(op.finish(&mut out).is_ok());
}

// ---- run ---------------------------------------------------------------

#[test]
fn run_honours_batch_end_markers() {
    let mut source = VecSource::new([row("A", 1), row("A", 2), row("A", 3)]).batch_end_after(0);
    let mut op = operator(&sum_by_dept());
    let mut out: Vec<Row> = Vec::new();

    op.run(&mut source, &mut out).expect("run");

    assert_eq!(
        out,
        vec![
            Row::new(vec![Value::text("A"), Value::Int(1)]),
            Row::new(vec![Value::text("A"), Value::Int(5)]),
        ]
    );
    assert_eq!(op.state(), GroupState::Done);
}

#[test]
fn operator_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<GroupByOperator>();
}

// ---- metrics -----------------------------------------------------------

#[derive(Default)]
struct CaptureSink {
    events: RefCell<Vec<MetricsEvent>>,
}

impl MetricsSink for CaptureSink {
    fn record(&self, event: MetricsEvent) {
        self.events.borrow_mut().push(event);
    }
}

#[test]
fn emission_reports_metrics_events() {
    let capture = Rc::new(CaptureSink::default());

    with_metrics_sink(capture.clone(), || {
        let mut op = operator(&sum_by_dept());
        let mut out: Vec<Row> = Vec::new();
        op.accept(row("A", 1), &mut out).expect("accept");
        op.accept(row("A", 2), &mut out).expect("accept");
        op.finish(&mut out).expect("finish");
    });

    assert_eq!(
        capture.events.borrow().as_slice(),
        &[
            MetricsEvent::RowsReceived { rows: 1 },
            MetricsEvent::RowsReceived { rows: 1 },
            MetricsEvent::GroupEmitted {
                input_rows: 2,
                output_rows: 1,
            },
        ]
    );
}
