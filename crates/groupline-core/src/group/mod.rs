//! Module: group
//! Responsibility: group boundary detection and result row composition.
//! Does not own: accumulator semantics or the operator state machine.

mod boundary;
mod builder;

#[cfg(test)]
mod tests;

// re-exports
pub use boundary::BoundaryDetector;
pub use builder::{Emitted, ResultBuilder};
