//! Pure operator tables: comparators and arithmetic.

pub mod arithmetic;
pub mod comparators;
pub mod values;

pub use comparators::{Comparator, ComparisonType};
