//! Data cleaning module for the sales dataset.
//!
//! This module provides functionality for:
//! - Removing rows that repeat an order identifier
//! - Dropping rows with non-positive quantities
//! - Label normalization and region canonicalization
//! - Numeric coercion, loss flagging and revenue recomputation

mod converters;
mod sanitizers;

pub(crate) use converters::{coerce_to_float64, correct_units_and_revenue, flag_negative};
pub use sanitizers::LabelOutcome;
pub(crate) use sanitizers::{canonicalize_labels, normalize_labels};

use crate::error::Result;
use crate::utils::{column_numbers, require_series};
use polars::prelude::*;
use tracing::debug;

/// Row-level cleaning operations.
pub struct DataCleaner;

impl DataCleaner {
    /// Keep only the first row for every distinct value of `key_col`, in input
    /// order. Null keys compare equal to each other.
    ///
    /// Returns the filtered frame and the number of rows removed.
    pub fn deduplicate_by(df: DataFrame, key_col: &str) -> Result<(DataFrame, usize)> {
        require_series(&df, key_col)?;
        let before = df.height();

        let df = df.unique_stable(Some(&[key_col.to_string()]), UniqueKeepStrategy::First, None)?;

        let removed = before - df.height();
        if removed > 0 {
            debug!("Removed {} rows with a duplicate '{}'", removed, key_col);
        } else {
            debug!("No duplicate '{}' values found", key_col);
        }
        Ok((df, removed))
    }

    /// Drop rows whose `col_name` is missing or not strictly positive.
    pub fn drop_non_positive(df: DataFrame, col_name: &str) -> Result<(DataFrame, usize)> {
        let values = column_numbers(&df, col_name)?;
        let before = df.height();

        let mask_values: Vec<bool> = values
            .into_iter()
            .map(|v| v.is_some_and(|x| x > 0.0))
            .collect();

        let mask = BooleanChunked::from_slice("mask".into(), &mask_values);
        let df = df.filter(&mask)?;

        let removed = before - df.height();
        if removed > 0 {
            debug!("Removed {} rows with non-positive '{}'", removed, col_name);
        }
        Ok((df, removed))
    }
}
