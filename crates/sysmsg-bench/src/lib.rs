//! SYSMSG Benchmark Suite
//!
//! Criterion benchmarks for the dispatch path.
//!
//! # Benchmark Categories
//!
//! - **Dispatch**: router lookups, delivery loop, attribute fan-out
//! - **Processing**: queue round trips through the processing thread

pub mod fixtures;

pub use fixtures::{populated_registry, Scale};
