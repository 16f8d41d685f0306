use crate::{
    aggregate::{AggregateSet, CumulativeTracker},
    config::{AggregateKind, AggregateSpec, GroupByConfig, GroupLayout},
    group::{BoundaryDetector, ResultBuilder},
    row::{FieldMeta, Row, RowSchema},
    serialize::CborRowCodec,
    spill::RowSpillStore,
    value::{Value, ValueKind},
};
use std::sync::Arc;
use tempfile::TempDir;

fn schema() -> RowSchema {
    vec![
        FieldMeta::new("dept", ValueKind::Text)
            .case_insensitive()
            .descending(),
        FieldMeta::new("region", ValueKind::Int),
        FieldMeta::new("salary", ValueKind::Int),
    ]
    .into()
}

fn layout(config: GroupByConfig) -> GroupLayout {
    config.resolve(&schema()).expect("layout")
}

fn row(dept: &str, region: Option<i64>, salary: i64) -> Row {
    Row::new(vec![Value::text(dept), Value::from(region), Value::Int(salary)])
}

// ---- boundary ----------------------------------------------------------

#[test]
fn equal_keys_stay_in_one_group() {
    let detector = BoundaryDetector::new(&layout(
        GroupByConfig::default().group_by(["dept", "region"]),
    ));

    let a = detector.key_values(&row("Sales", Some(1), 10));
    let b = detector.key_values(&row("SALES", Some(1), 20));
    let c = detector.key_values(&row("sales", Some(2), 30));

    assert!(detector.same_group(&a, &b).expect("comparable"));
    assert!(!detector.same_group(&b, &c).expect("comparable"));
}

#[test]
fn null_keys_equal_each_other_only() {
    let detector = BoundaryDetector::new(&layout(GroupByConfig::default().group_by(["region"])));

    let null = detector.key_values(&row("x", None, 1));
    let one = detector.key_values(&row("x", Some(1), 1));

    assert!(detector.same_group(&null, &null).expect("comparable"));
    assert!(!detector.same_group(&null, &one).expect("comparable"));
}

#[test]
fn empty_key_list_is_one_group() {
    let detector = BoundaryDetector::new(&layout(GroupByConfig::default()));

    let a = detector.key_values(&row("a", Some(1), 1));
    let b = detector.key_values(&row("b", Some(2), 2));

    assert!(a.is_empty());
    assert!(detector.same_group(&a, &b).expect("comparable"));
}

#[test]
fn incomparable_keys_are_a_coercion_error() {
    let detector = BoundaryDetector::new(&layout(GroupByConfig::default().group_by(["region"])));

    let ints = vec![Value::Int(1)];
    let text = vec![Value::text("1")];

    let err = detector.same_group(&ints, &text).unwrap_err();
    assert!(err.is_coercion());
}

// ---- builder -----------------------------------------------------------

#[test]
fn aggregate_row_interleaves_cumulative_values_in_config_order() {
    let layout = layout(
        GroupByConfig::default()
            .group_by(["dept"])
            .aggregate(AggregateSpec::new("salary", AggregateKind::Sum, "total"))
            .aggregate(AggregateSpec::new("salary", AggregateKind::CumulativeSum, "running"))
            .aggregate(AggregateSpec::count_rows("rows")),
    );
    let builder = ResultBuilder::new(&layout);

    let out = builder.aggregate_row(
        vec![Value::text("A")],
        vec![Value::Int(30), Value::Int(2)],
        vec![Value::Int(30)],
    );

    assert_eq!(
        out,
        Row::new(vec![
            Value::text("A"),
            Value::Int(30),
            Value::Int(30),
            Value::Int(2),
        ])
    );
    assert_eq!(out.len(), layout.output_schema().arity());
}

#[test]
fn empty_input_row_has_null_keys_or_null_inputs() {
    let aggregate_only = layout(
        GroupByConfig::default()
            .group_by(["dept", "region"])
            .aggregate(AggregateSpec::new("salary", AggregateKind::CountAll, "n")),
    );
    let out = ResultBuilder::new(&aggregate_only).empty_input_row(vec![Value::Int(0)], vec![]);
    assert_eq!(out, Row::new(vec![Value::Null, Value::Null, Value::Int(0)]));

    let pass_through = layout(
        GroupByConfig::default()
            .group_by(["dept"])
            .pass_through(true)
            .line_number_field("line")
            .aggregate(AggregateSpec::new("salary", AggregateKind::CountAll, "n"))
            .aggregate(AggregateSpec::new("salary", AggregateKind::CumulativeSum, "rs")),
    );
    let out = ResultBuilder::new(&pass_through)
        .empty_input_row(vec![Value::Int(0)], vec![Value::Null]);
    assert_eq!(
        out,
        Row::new(vec![
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Int(0),
            Value::Int(1),
            Value::Null,
        ])
    );
}

#[test]
fn pass_through_emission_replays_cumulative_values_per_row() {
    let dir = TempDir::new().expect("temp dir");
    let layout = layout(
        GroupByConfig::default()
            .group_by(["dept"])
            .pass_through(true)
            .line_number_field("line")
            .buffer_rows(1)
            .spill_directory(dir.path())
            .aggregate(AggregateSpec::new("salary", AggregateKind::Sum, "total"))
            .aggregate(AggregateSpec::new("salary", AggregateKind::CumulativeSum, "running")),
    );
    let builder = ResultBuilder::new(&layout);
    let mut aggregates = AggregateSet::new(&layout);
    let mut tracker = CumulativeTracker::new(&layout);
    let mut store = RowSpillStore::new(layout.spill(), Arc::new(CborRowCodec));

    let members = [row("A", None, 1), row("A", None, 2), row("A", None, 3)];
    for member in &members {
        aggregates.observe(member).expect("observe");
        store.append(member.clone()).expect("append");
    }
    assert_eq!(store.spilled_len(), 2);

    let finalized = aggregates.finalize();
    let mut out: Vec<Row> = Vec::new();
    let emitted = builder
        .emit_pass_through(store.drain().expect("drain"), &finalized, &mut tracker, &mut out)
        .expect("emit");

    assert_eq!(emitted.rows, 3);
    assert_eq!(emitted.skipped, 0);

    let tails: Vec<Vec<Value>> = out.iter().map(|r| r[3..].to_vec()).collect();
    assert_eq!(
        tails,
        vec![
            vec![Value::Int(6), Value::Int(1), Value::Int(1)],
            vec![Value::Int(6), Value::Int(2), Value::Int(3)],
            vec![Value::Int(6), Value::Int(3), Value::Int(6)],
        ]
    );
    for (emitted, original) in out.iter().zip(&members) {
        assert_eq!(&emitted[..3], &original[..]);
    }
}
