//! Core runtime for groupline: the streaming group-by operator, its
//! accumulators, spill store, configuration, and the ergonomics exported via
//! the `prelude`.

// public exports are one module level down
pub mod aggregate;
pub mod config;
pub mod error;
pub mod group;
pub mod obs;
pub mod operator;
pub mod pipeline;
pub mod row;
pub mod serialize;
pub mod spill;
pub mod types;
pub mod value;

///
/// CONSTANTS
///

/// Rows a group keeps in memory before older rows spill to disk.
pub const DEFAULT_BUFFER_ROWS: usize = 5000;

/// Default filename prefix for spill files.
pub const DEFAULT_SPILL_PREFIX: &str = "grp";

/// Fixed filename suffix for spill files.
pub const SPILL_FILE_SUFFIX: &str = ".tmp";

/// Upper bound on one encoded row, enforced when reading spill frames.
pub const MAX_ROW_BYTES: usize = 16 * 1024 * 1024;

///
/// Prelude
///
/// Prelude contains only domain vocabulary and the operator entry points.
///

pub mod prelude {
    pub use crate::{
        config::{AggregateKind, AggregateSpec, GroupByConfig, NullPolicy},
        operator::{GroupByOperator, GroupState},
        pipeline::{RowSink, RowSource, VecSource},
        row::{FieldMeta, Row, RowSchema},
        value::{Value, ValueKind},
    };
}
