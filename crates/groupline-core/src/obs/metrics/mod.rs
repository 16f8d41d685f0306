use serde::{Deserialize, Serialize};
use std::{cell::RefCell, time::SystemTime};

///
/// EventState
/// Ephemeral, in-memory counters for operator activity on this thread.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct EventState {
    pub ops: EventOps,
    pub spill: EventSpill,
    pub since_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            spill: EventSpill::default(),
            since_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Row flow
    pub rows_received: u64,
    pub rows_emitted: u64,

    // Groups
    pub groups_emitted: u64,
    pub largest_group_rows: u64,

    // Recoverable coercion failures
    pub observations_skipped: u64,
}

///
/// EventSpill
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventSpill {
    pub rows_spilled: u64,
    pub files_created: u64,
    pub files_removed: u64,
    pub cleanup_failures: u64,
}

///
/// EventReport
/// Point-in-time snapshot returned to callers.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventReport {
    pub ops: EventOps,
    pub spill: EventSpill,
    pub since_ms: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters (useful in tests).
pub(crate) fn reset() {
    with_state_mut(|m| *m = EventState::default());
}

/// Reset all event state.
pub(crate) fn reset_all() {
    reset();
}

/// Snapshot the current counters.
#[must_use]
pub(crate) fn report() -> EventReport {
    with_state(|m| EventReport {
        ops: m.ops.clone(),
        spill: m.spill.clone(),
        since_ms: m.since_ms,
    })
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
