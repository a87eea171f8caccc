//! Imputation module for handling missing values.
//!
//! Statistical imputation only (median, constant, mode, date mode).

mod statistical;

pub use statistical::{ImputeOutcome, StatisticalImputer};
