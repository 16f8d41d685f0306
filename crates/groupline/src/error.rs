use derive_more::Display;
use groupline_core::{
    config::ConfigError,
    error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Debug, Deserialize, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self.kind, ErrorKind::Config)
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        let kind = match err.class {
            ErrorClass::Configuration => ErrorKind::Config,
            ErrorClass::Coercion => ErrorKind::Coercion,
            ErrorClass::Io => ErrorKind::Spill(SpillErrorKind::Io),
            ErrorClass::Corruption => ErrorKind::Spill(SpillErrorKind::Corrupt),
            ErrorClass::InvariantViolation | ErrorClass::Internal => ErrorKind::Internal,
        };

        Self::new(kind, err.origin.into(), err.message)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::Config, ErrorOrigin::Config, err.to_string())
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    /// Configuration could not be parsed or does not fit the input schema.
    Config,

    /// A value could not be coerced in strict mode, or group keys were not
    /// comparable.
    Coercion,

    Spill(SpillErrorKind),

    /// The caller cannot remediate this.
    Internal,
}

///
/// SpillErrorKind
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SpillErrorKind {
    /// Spill file could not be created, written, or read.
    Io,

    /// A spill frame was truncated or exceeded the size bound.
    Corrupt,
}

///
/// ErrorOrigin
/// Public origin taxonomy for callers.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Config,
    Accumulator,
    Spill,
    Serialize,
    Operator,
    Pipeline,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Config => Self::Config,
            CoreErrorOrigin::Accumulator => Self::Accumulator,
            CoreErrorOrigin::Spill => Self::Spill,
            CoreErrorOrigin::Serialize => Self::Serialize,
            CoreErrorOrigin::Operator => Self::Operator,
            CoreErrorOrigin::Pipeline => Self::Pipeline,
        }
    }
}
