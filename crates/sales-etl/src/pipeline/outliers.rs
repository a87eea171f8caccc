//! Outlier handling module.
//!
//! Removes rows whose value in a numeric column falls outside the IQR band.

use crate::error::Result;
use crate::utils::{column_numbers, iqr_bounds, quantile_linear};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Quartiles, bounds and result of one IQR pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
    pub rows_removed: usize,
}

/// Handles outlier detection and treatment.
pub struct OutlierHandler;

impl OutlierHandler {
    /// Compute Q1/Q3 of the non-missing values of `col_name` and drop rows
    /// outside `[Q1 - k*IQR, Q3 + k*IQR]`. Rows with a missing value are kept.
    ///
    /// Returns `None` bounds if the column has no values (no-op).
    pub fn remove_iqr_outliers(
        df: DataFrame,
        col_name: &str,
        k: f64,
    ) -> Result<(DataFrame, Option<OutlierBounds>)> {
        let values = column_numbers(&df, col_name)?;

        let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
        if sorted.is_empty() {
            debug!("No values in '{}', skipping outlier removal", col_name);
            return Ok((df, None));
        }
        sorted.sort_by(f64::total_cmp);

        let (q1, q3) = match (quantile_linear(&sorted, 0.25), quantile_linear(&sorted, 0.75)) {
            (Some(q1), Some(q3)) => (q1, q3),
            _ => return Ok((df, None)),
        };
        let (lower, upper) = iqr_bounds(q1, q3, k);

        let mask_values: Vec<bool> = values
            .iter()
            .map(|v| v.is_none_or(|x| x >= lower && x <= upper))
            .collect();

        let before = df.height();
        let mask = BooleanChunked::from_slice("mask".into(), &mask_values);
        let df = df.filter(&mask)?;
        let rows_removed = before - df.height();

        debug!(
            "IQR bounds for '{}': [{:.2}, {:.2}], removed {} rows",
            col_name, lower, upper, rows_removed
        );

        Ok((
            df,
            Some(OutlierBounds {
                q1,
                q3,
                iqr: q3 - q1,
                lower,
                upper,
                rows_removed,
            }),
        ))
    }
}
