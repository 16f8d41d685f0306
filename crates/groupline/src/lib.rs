//! ## Crate layout
//! - `core`: the streaming group-by operator, accumulators, spill store,
//!   configuration, and observability.
//! - `error`: the public error type with a stable kind + origin taxonomy.
//!
//! The `prelude` module mirrors what a pipeline stage needs to configure and
//! drive an operator. `run_group_by` wires TOML configuration, a source, and
//! a sink together in one call.

pub use groupline_core as core;

pub mod error;

pub use error::Error;

use crate::core::{
    config::GroupByConfig,
    operator::{GroupByOperator, OperatorStats},
    pipeline::{RowSink, RowSource},
    row::RowSchema,
};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Pipeline Prelude
///

pub mod prelude {
    pub use crate::{
        Error, run_group_by,
        core::prelude::*,
        core::{
            obs::{EventReport, metrics_report},
            operator::OperatorStats,
        },
    };
}

/// Load a TOML operator configuration, apply environment overrides, and
/// drive a fresh operator from `source` into `sink` until end of stream.
///
/// Returns the operator's counters on success.
pub fn run_group_by<R, S>(
    config: &str,
    schema: &RowSchema,
    source: &mut R,
    sink: &mut S,
) -> Result<OperatorStats, Error>
where
    R: RowSource + ?Sized,
    S: RowSink + ?Sized,
{
    let config = GroupByConfig::from_toml_str(config)?.apply_env_overrides();
    let mut operator = GroupByOperator::new(schema, &config)?;

    if let Err(err) = operator.run(source, sink) {
        operator.cancel();
        return Err(err.into());
    }

    Ok(operator.stats())
}
