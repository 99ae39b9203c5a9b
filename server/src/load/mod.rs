//! Load simulation core
//!
//! This module provides:
//! - `LoadSimulator` for paced delays and the canned simple/medium sequences
//! - `sum_of_squares` as the deterministic CPU workload behind `/complex`
//! - Formatting helpers for the `processing_time` and `timestamp` fields

mod simulator;
mod types;

pub use simulator::{
    ComplexOutcome, LoadOutcome, LoadSimulator, format_elapsed, medium_message, now_rfc3339,
    sum_of_squares,
};
pub use types::LoadError;
