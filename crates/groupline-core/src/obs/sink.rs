//! Metrics sink boundary.
//!
//! Operator logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between execution logic
//! and the thread-local metrics state.
use crate::obs::metrics;
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = RefCell::new(None);
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    RowsReceived { rows: u64 },
    GroupEmitted { input_rows: u64, output_rows: u64 },
    RowsSpilled { rows: u64 },
    SpillFileCreated,
    SpillFileRemoved,
    SpillCleanupFailed,
    ObservationSkipped,
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default sink that writes into the thread-local metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::RowsReceived { rows } => {
                metrics::with_state_mut(|m| {
                    m.ops.rows_received = m.ops.rows_received.saturating_add(rows);
                });
            }

            MetricsEvent::GroupEmitted {
                input_rows,
                output_rows,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.groups_emitted = m.ops.groups_emitted.saturating_add(1);
                    m.ops.rows_emitted = m.ops.rows_emitted.saturating_add(output_rows);
                    if input_rows > m.ops.largest_group_rows {
                        m.ops.largest_group_rows = input_rows;
                    }
                });
            }

            MetricsEvent::RowsSpilled { rows } => {
                metrics::with_state_mut(|m| {
                    m.spill.rows_spilled = m.spill.rows_spilled.saturating_add(rows);
                });
            }

            MetricsEvent::SpillFileCreated => {
                metrics::with_state_mut(|m| {
                    m.spill.files_created = m.spill.files_created.saturating_add(1);
                });
            }

            MetricsEvent::SpillFileRemoved => {
                metrics::with_state_mut(|m| {
                    m.spill.files_removed = m.spill.files_removed.saturating_add(1);
                });
            }

            MetricsEvent::SpillCleanupFailed => {
                metrics::with_state_mut(|m| {
                    m.spill.cleanup_failures = m.spill.cleanup_failures.saturating_add(1);
                });
            }

            MetricsEvent::ObservationSkipped => {
                metrics::with_state_mut(|m| {
                    m.ops.observations_skipped = m.ops.observations_skipped.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let override_sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    if let Some(sink) = override_sink {
        sink.record(event);
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current metrics state.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

///
/// TESTS
///
