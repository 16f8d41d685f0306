use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Every leaf error in the operator (configuration, coercion, codec, spill)
/// folds into this type at module boundaries.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    /// Construct an InternalError from a class, origin, and message.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a configuration error.
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Configuration, ErrorOrigin::Config, message)
    }

    /// Construct an accumulator-origin coercion error.
    pub(crate) fn accumulator_coercion(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Coercion, ErrorOrigin::Accumulator, message)
    }

    /// Construct an operator-origin coercion error.
    pub(crate) fn operator_coercion(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Coercion, ErrorOrigin::Operator, message)
    }

    /// Construct a spill-origin I/O error.
    pub(crate) fn spill_io(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Io, ErrorOrigin::Spill, message)
    }

    /// Construct a spill-origin corruption error.
    pub(crate) fn spill_corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Corruption, ErrorOrigin::Spill, message)
    }

    /// Construct an operator-origin invariant violation.
    pub(crate) fn operator_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Operator, message)
    }

    /// Construct a pipeline-origin internal error.
    pub fn pipeline_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Pipeline, message)
    }

    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self.class, ErrorClass::Configuration)
    }

    #[must_use]
    pub const fn is_coercion(&self) -> bool {
        matches!(self.class, ErrorClass::Coercion)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///
/// `Configuration` and `Io` are always fatal; `Coercion` is recoverable
/// unless the operator runs with strict coercion.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Configuration,
    Coercion,
    Io,
    Corruption,
    InvariantViolation,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::Coercion => "coercion",
            Self::Io => "io",
            Self::Corruption => "corruption",
            Self::InvariantViolation => "invariant_violation",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Config,
    Accumulator,
    Spill,
    Serialize,
    Operator,
    Pipeline,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "config",
            Self::Accumulator => "accumulator",
            Self::Spill => "spill",
            Self::Serialize => "serialize",
            Self::Operator => "operator",
            Self::Pipeline => "pipeline",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_class_uses_origin_class_prefix() {
        let err = InternalError::spill_io("disk full");

        assert_eq!(err.display_with_class(), "spill:io: disk full");
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn class_predicates_match_constructors() {
        assert!(InternalError::configuration("x").is_configuration());
        assert!(InternalError::accumulator_coercion("x").is_coercion());
        assert!(!InternalError::operator_invariant("x").is_coercion());
    }
}
