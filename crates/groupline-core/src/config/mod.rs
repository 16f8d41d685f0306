//! Module: config
//! Responsibility: operator configuration surface, TOML loading, environment
//! overrides, and validation into a resolved `GroupLayout`.
//! Does not own: per-group runtime state.
//! Boundary: every name-based reference is resolved to a field position here;
//! nothing downstream looks fields up by name.

mod layout;


use crate::{DEFAULT_BUFFER_ROWS, DEFAULT_SPILL_PREFIX, error::InternalError};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};
use thiserror::Error as ThisError;

// re-exports
pub use layout::{AggregateFunction, GroupLayout, ResolvedAggregate, SpillSettings};

/// Environment switch that turns null numeric results into zeros.
pub const ENV_ALL_NULLS_ARE_ZERO: &str = "GROUPLINE_AGGREGATION_ALL_NULLS_ARE_ZERO";

/// Environment switch that lets a null win a Min aggregation.
pub const ENV_MIN_NULL_IS_VALUED: &str = "GROUPLINE_AGGREGATION_MIN_NULL_IS_VALUED";

///
/// ConfigError
///
/// Construction-time configuration failures. Always fatal.
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum ConfigError {
    #[error("invalid configuration document: {0}")]
    Parse(String),

    #[error("{role} field '{name}' does not exist in the input schema")]
    UnknownField { role: FieldRole, name: String },

    #[error("aggregate '{output}' ({kind}) requires a subject field")]
    MissingSubject { output: String, kind: AggregateKind },

    #[error("aggregate '{output}' ({kind}) requires a parameter")]
    MissingParameter { output: String, kind: AggregateKind },

    #[error("aggregate '{output}' has percentile '{parameter}'; expected a number in (0, 100]")]
    InvalidPercentile { output: String, parameter: String },

    #[error("aggregate output name must not be empty")]
    EmptyOutputName,

    #[error("output field '{name}' is declared more than once")]
    DuplicateOutputField { name: String },

    #[error("spill buffer must hold at least one row")]
    InvalidBufferRows,
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

///
/// FieldRole
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldRole {
    Key,
    Subject,
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Key => "key",
            Self::Subject => "subject",
        };
        f.write_str(label)
    }
}

///
/// AggregateKind
///
/// Closed set of aggregation kinds as written in configuration.
/// Parameters (percentile, separator) travel separately on the spec and are
/// folded into `AggregateFunction` during resolution.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Sum,
    Average,
    Median,
    Percentile,
    StandardDeviation,
    CountDistinct,
    CountAll,
    CountAny,
    Min,
    Max,
    First,
    Last,
    FirstIncludingNull,
    LastIncludingNull,
    ConcatWithComma,
    ConcatWithSeparator,
    CumulativeSum,
    CumulativeAverage,
}

impl AggregateKind {
    /// Cumulative kinds are computed per emitted row rather than per group.
    #[must_use]
    pub const fn is_cumulative(self) -> bool {
        matches!(self, Self::CumulativeSum | Self::CumulativeAverage)
    }

    /// Every kind except `CountAny` reads a subject field.
    #[must_use]
    pub const fn requires_subject(self) -> bool {
        !matches!(self, Self::CountAny)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Median => "median",
            Self::Percentile => "percentile",
            Self::StandardDeviation => "standard_deviation",
            Self::CountDistinct => "count_distinct",
            Self::CountAll => "count_all",
            Self::CountAny => "count_any",
            Self::Min => "min",
            Self::Max => "max",
            Self::First => "first",
            Self::Last => "last",
            Self::FirstIncludingNull => "first_including_null",
            Self::LastIncludingNull => "last_including_null",
            Self::ConcatWithComma => "concat_with_comma",
            Self::ConcatWithSeparator => "concat_with_separator",
            Self::CumulativeSum => "cumulative_sum",
            Self::CumulativeAverage => "cumulative_average",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

///
/// AggregateSpec
///
/// One `(subject, kind, output, parameter)` entry.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateSpec {
    #[serde(default)]
    pub subject: Option<String>,
    pub kind: AggregateKind,
    pub output: String,
    #[serde(default)]
    pub parameter: Option<String>,
}

impl AggregateSpec {
    #[must_use]
    pub fn new(subject: impl Into<String>, kind: AggregateKind, output: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            kind,
            output: output.into(),
            parameter: None,
        }
    }

    /// Row count aggregate with no subject field.
    #[must_use]
    pub fn count_rows(output: impl Into<String>) -> Self {
        Self {
            subject: None,
            kind: AggregateKind::CountAny,
            output: output.into(),
            parameter: None,
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }
}

///
/// NullPolicy
///
/// Two independent switches consulted by accumulators and the result
/// builder.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NullPolicy {
    /// Null numeric results (including averages over no values) become the
    /// zero of their output kind.
    pub nulls_are_zero: bool,

    /// A null subject can win a Min aggregation.
    pub null_is_valid_min: bool,
}

///
/// SpillConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpillConfig {
    pub buffer_rows: usize,
    pub directory: Option<PathBuf>,
    pub prefix: String,
}

impl Default for SpillConfig {
    fn default() -> Self {
        Self {
            buffer_rows: DEFAULT_BUFFER_ROWS,
            directory: None,
            prefix: DEFAULT_SPILL_PREFIX.to_string(),
        }
    }
}

///
/// GroupByConfig
///
/// Declarative operator configuration; resolved against an input schema by
/// `GroupByConfig::resolve`.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupByConfig {
    pub group_fields: Vec<String>,
    pub aggregates: Vec<AggregateSpec>,
    pub pass_through: bool,
    pub always_emit_one_row: bool,
    pub line_number_field: Option<String>,
    pub strict_coercion: bool,
    pub null_policy: NullPolicy,
    pub spill: SpillConfig,
}

impl GroupByConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    #[must_use]
    pub fn group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn aggregate(mut self, spec: AggregateSpec) -> Self {
        self.aggregates.push(spec);
        self
    }

    #[must_use]
    pub const fn pass_through(mut self, enabled: bool) -> Self {
        self.pass_through = enabled;
        self
    }

    #[must_use]
    pub const fn always_emit_one_row(mut self, enabled: bool) -> Self {
        self.always_emit_one_row = enabled;
        self
    }

    #[must_use]
    pub fn line_number_field(mut self, name: impl Into<String>) -> Self {
        self.line_number_field = Some(name.into());
        self
    }

    #[must_use]
    pub const fn null_policy(mut self, policy: NullPolicy) -> Self {
        self.null_policy = policy;
        self
    }

    #[must_use]
    pub const fn buffer_rows(mut self, rows: usize) -> Self {
        self.spill.buffer_rows = rows;
        self
    }

    #[must_use]
    pub fn spill_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.spill.directory = Some(directory.into());
        self
    }

    /// Apply the process-wide null-policy switches.
    #[must_use]
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply null-policy switches read through `lookup`.
    ///
    /// A switch only ever turns a policy on; unset or falsy values leave the
    /// configured policy untouched.
    #[must_use]
    pub fn apply_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if lookup(ENV_ALL_NULLS_ARE_ZERO).is_some_and(|v| is_truthy(&v)) {
            self.null_policy.nulls_are_zero = true;
        }
        if lookup(ENV_MIN_NULL_IS_VALUED).is_some_and(|v| is_truthy(&v)) {
            self.null_policy.null_is_valid_min = true;
        }

        self
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "true" | "1"
    )
}
