//! # Aggregation
//!
//! Turns model output over several weather years into a representative year
//! and projects that year over the plant lifetime.

pub mod aggregator;
pub mod projection;

pub use aggregator::*;
pub use projection::*;
