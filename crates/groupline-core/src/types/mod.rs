mod float64;

// re-exports
pub use float64::Float64;
pub use rust_decimal::Decimal;
