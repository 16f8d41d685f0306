use crate::{
    config::{AggregateKind, AggregateSpec, ConfigError, FieldRole, GroupByConfig, NullPolicy},
    row::{FieldMeta, RowSchema},
    value::ValueKind,
};
use std::{collections::BTreeSet, path::PathBuf};

///
/// AggregateFunction
///
/// Resolved aggregation kind with its parameter folded in.
///

#[derive(Clone, Debug, PartialEq)]
pub enum AggregateFunction {
    Sum,
    Average,
    Median,
    Percentile(f64),
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
    ConcatWithSeparator(String),
    CumulativeSum,
    CumulativeAverage,
}

impl AggregateFunction {
    fn from_spec(spec: &AggregateSpec) -> Result<Self, ConfigError> {
        let function = match spec.kind {
            AggregateKind::Sum => Self::Sum,
            AggregateKind::Average => Self::Average,
            AggregateKind::Median => Self::Median,
            AggregateKind::Percentile => {
                let raw = spec
                    .parameter
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingParameter {
                        output: spec.output.clone(),
                        kind: spec.kind,
                    })?;
                let percentile = raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|p| *p > 0.0 && *p <= 100.0)
                    .ok_or_else(|| ConfigError::InvalidPercentile {
                        output: spec.output.clone(),
                        parameter: raw.to_string(),
                    })?;

                Self::Percentile(percentile)
            }
            AggregateKind::StandardDeviation => Self::StandardDeviation,
            AggregateKind::CountDistinct => Self::CountDistinct,
            AggregateKind::CountAll => Self::CountAll,
            AggregateKind::CountAny => Self::CountAny,
            AggregateKind::Min => Self::Min,
            AggregateKind::Max => Self::Max,
            AggregateKind::First => Self::First,
            AggregateKind::Last => Self::Last,
            AggregateKind::FirstIncludingNull => Self::FirstIncludingNull,
            AggregateKind::LastIncludingNull => Self::LastIncludingNull,
            AggregateKind::ConcatWithComma => Self::ConcatWithComma,
            AggregateKind::ConcatWithSeparator => {
                Self::ConcatWithSeparator(spec.parameter.clone().unwrap_or_default())
            }
            AggregateKind::CumulativeSum => Self::CumulativeSum,
            AggregateKind::CumulativeAverage => Self::CumulativeAverage,
        };

        Ok(function)
    }

    #[must_use]
    pub const fn is_cumulative(&self) -> bool {
        matches!(self, Self::CumulativeSum | Self::CumulativeAverage)
    }

    /// Declared kind of the output field given the subject's kind.
    #[must_use]
    pub const fn output_kind(&self, subject: ValueKind) -> ValueKind {
        match self {
            Self::Sum | Self::CumulativeSum => subject.sum_kind(),
            Self::Average | Self::CumulativeAverage => match subject {
                ValueKind::Decimal => ValueKind::Decimal,
                _ => ValueKind::Float64,
            },
            Self::Median | Self::Percentile(_) | Self::StandardDeviation => ValueKind::Float64,
            Self::CountDistinct | Self::CountAll | Self::CountAny => ValueKind::Int,
            Self::Min
            | Self::Max
            | Self::First
            | Self::Last
            | Self::FirstIncludingNull
            | Self::LastIncludingNull => subject,
            Self::ConcatWithComma | Self::ConcatWithSeparator(_) => ValueKind::Text,
        }
    }
}

///
/// ResolvedAggregate
///
/// One aggregate spec bound to its subject position and output field.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedAggregate {
    pub function: AggregateFunction,
    pub subject: Option<usize>,
    pub subject_field: Option<FieldMeta>,
    pub output: FieldMeta,
}

///
/// SpillSettings
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpillSettings {
    pub buffer_rows: usize,
    pub directory: PathBuf,
    pub prefix: String,
}

///
/// GroupLayout
///
/// Validated, position-resolved view of a `GroupByConfig` over one input
/// schema, including the output schema the operator will produce.
///

#[derive(Clone, Debug)]
pub struct GroupLayout {
    input: RowSchema,
    keys: Vec<usize>,
    aggregates: Vec<ResolvedAggregate>,
    pass_through: bool,
    always_emit_one_row: bool,
    line_number_field: Option<String>,
    strict_coercion: bool,
    null_policy: NullPolicy,
    spill: SpillSettings,
    output: RowSchema,
}

impl GroupLayout {
    #[must_use]
    pub const fn input_schema(&self) -> &RowSchema {
        &self.input
    }

    #[must_use]
    pub const fn output_schema(&self) -> &RowSchema {
        &self.output
    }

    /// Key field positions in key order.
    #[must_use]
    pub fn keys(&self) -> &[usize] {
        &self.keys
    }

    /// Key positions paired with their field metadata.
    pub fn key_fields(&self) -> impl Iterator<Item = (usize, &FieldMeta)> {
        self.keys
            .iter()
            .filter_map(|&index| self.input.field(index).map(|field| (index, field)))
    }

    /// Every aggregate, in configuration order.
    #[must_use]
    pub fn aggregates(&self) -> &[ResolvedAggregate] {
        &self.aggregates
    }

    #[must_use]
    pub const fn pass_through(&self) -> bool {
        self.pass_through
    }

    #[must_use]
    pub const fn always_emit_one_row(&self) -> bool {
        self.always_emit_one_row
    }

    /// Line-number output is only produced in pass-through mode.
    #[must_use]
    pub const fn emits_line_number(&self) -> bool {
        self.line_number_field.is_some()
    }

    #[must_use]
    pub const fn strict_coercion(&self) -> bool {
        self.strict_coercion
    }

    #[must_use]
    pub const fn null_policy(&self) -> NullPolicy {
        self.null_policy
    }

    #[must_use]
    pub const fn spill(&self) -> &SpillSettings {
        &self.spill
    }
}

impl GroupByConfig {
    /// Resolve every name against `input` and compute the output schema.
    pub fn resolve(&self, input: &RowSchema) -> Result<GroupLayout, ConfigError> {
        if self.spill.buffer_rows == 0 {
            return Err(ConfigError::InvalidBufferRows);
        }

        let keys = self
            .group_fields
            .iter()
            .map(|name| {
                input.index_of(name).ok_or_else(|| ConfigError::UnknownField {
                    role: FieldRole::Key,
                    name: name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let aggregates = self
            .aggregates
            .iter()
            .map(|spec| resolve_aggregate(spec, input))
            .collect::<Result<Vec<_>, _>>()?;

        let requested_line_number = self
            .line_number_field
            .as_ref()
            .filter(|name| !name.is_empty())
            .cloned();
        let line_number_field = if self.pass_through {
            requested_line_number
        } else {
            if let Some(name) = requested_line_number {
                tracing::warn!(
                    field = %name,
                    "line number output is only produced in pass-through mode; ignoring"
                );
            }
            None
        };

        let output = output_schema(
            input,
            &keys,
            &aggregates,
            self.pass_through,
            line_number_field.as_deref(),
        );
        check_unique_names(&output)?;

        let spill = SpillSettings {
            buffer_rows: self.spill.buffer_rows,
            directory: self
                .spill
                .directory
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            prefix: self.spill.prefix.clone(),
        };

        Ok(GroupLayout {
            input: input.clone(),
            keys,
            aggregates,
            pass_through: self.pass_through,
            always_emit_one_row: self.always_emit_one_row,
            line_number_field,
            strict_coercion: self.strict_coercion,
            null_policy: self.null_policy,
            spill,
            output,
        })
    }
}

fn resolve_aggregate(
    spec: &AggregateSpec,
    input: &RowSchema,
) -> Result<ResolvedAggregate, ConfigError> {
    if spec.output.is_empty() {
        return Err(ConfigError::EmptyOutputName);
    }

    let function = AggregateFunction::from_spec(spec)?;

    let subject = match spec.subject.as_deref().filter(|name| !name.is_empty()) {
        Some(name) => Some(input.index_of(name).ok_or_else(|| ConfigError::UnknownField {
            role: FieldRole::Subject,
            name: name.to_string(),
        })?),
        None if spec.kind.requires_subject() => {
            return Err(ConfigError::MissingSubject {
                output: spec.output.clone(),
                kind: spec.kind,
            });
        }
        None => None,
    };

    let subject_field = subject.and_then(|index| input.field(index)).cloned();
    let subject_kind = subject_field
        .as_ref()
        .map_or(ValueKind::Int, |field| field.kind);
    let output = FieldMeta::new(spec.output.clone(), function.output_kind(subject_kind));

    Ok(ResolvedAggregate {
        function,
        subject,
        subject_field,
        output,
    })
}

// Aggregate-only: keys then aggregates in configuration order.
// Pass-through: input fields, non-cumulative aggregates, line number, then
// cumulative aggregates.
fn output_schema(
    input: &RowSchema,
    keys: &[usize],
    aggregates: &[ResolvedAggregate],
    pass_through: bool,
    line_number_field: Option<&str>,
) -> RowSchema {
    let mut output = RowSchema::default();

    if pass_through {
        for field in input.iter() {
            output.push(field.clone());
        }
        for agg in aggregates.iter().filter(|agg| !agg.function.is_cumulative()) {
            output.push(agg.output.clone());
        }
        if let Some(name) = line_number_field {
            output.push(FieldMeta::new(name, ValueKind::Int));
        }
        for agg in aggregates.iter().filter(|agg| agg.function.is_cumulative()) {
            output.push(agg.output.clone());
        }
    } else {
        for field in keys.iter().filter_map(|&index| input.field(index)) {
            output.push(field.clone());
        }
        for agg in aggregates {
            output.push(agg.output.clone());
        }
    }

    output
}

fn check_unique_names(schema: &RowSchema) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for name in schema.names() {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateOutputField {
                name: name.to_string(),
            });
        }
    }

    Ok(())
}
