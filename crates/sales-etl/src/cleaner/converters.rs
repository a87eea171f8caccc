//! Numeric conversions and derived numeric columns.

use crate::columns::{DISCOUNT_APPLIED, MRP, REVENUE, UNITS_SOLD};
use crate::error::Result;
use crate::utils::{column_numbers, expected_revenue, numeric_values, require_series};
use polars::prelude::*;
use tracing::debug;

/// Force `col_name` to `Float64`. Values that cannot be coerced become null.
///
/// Returns the number of values that were present before and null after.
pub(crate) fn coerce_to_float64(df: &mut DataFrame, col_name: &str) -> Result<usize> {
    let series = require_series(df, col_name)?;
    let nulls_before = series.null_count();
    let values = numeric_values(series)?;

    let coerced = Series::new(col_name.into(), values);
    let introduced = coerced.null_count().saturating_sub(nulls_before);
    df.replace(col_name, coerced)?;

    if introduced > 0 {
        debug!("Coerced {} values in '{}' to null", introduced, col_name);
    }
    Ok(introduced)
}

/// Add a boolean column that is true iff `source_col` parses to a negative
/// number. Missing or unparsable values yield `false`.
pub(crate) fn flag_negative(df: &mut DataFrame, source_col: &str, flag_col: &str) -> Result<usize> {
    let flags: Vec<bool> = column_numbers(df, source_col)?
        .into_iter()
        .map(|v| v.is_some_and(|x| x < 0.0))
        .collect();

    let flagged = flags.iter().filter(|f| **f).count();
    df.with_column(Series::new(flag_col.into(), flags))?;
    Ok(flagged)
}

/// Replace negative units by their absolute value and recompute revenue as
/// `units * mrp * (1 - discount / 100)`, creating `Revenue` if absent.
///
/// Returns the number of unit values whose sign was corrected.
pub(crate) fn correct_units_and_revenue(df: &mut DataFrame) -> Result<usize> {
    let units = column_numbers(df, UNITS_SOLD)?;
    let mrp = column_numbers(df, MRP)?;
    let discount = column_numbers(df, DISCOUNT_APPLIED)?;

    let corrected = units.iter().flatten().filter(|u| **u < 0.0).count();
    let units: Vec<Option<f64>> = units.into_iter().map(|u| u.map(f64::abs)).collect();

    let revenue: Vec<Option<f64>> = units
        .iter()
        .zip(mrp.iter())
        .zip(discount.iter())
        .map(|((u, m), d)| match (u, m, d) {
            (Some(u), Some(m), Some(d)) => Some(expected_revenue(*u, *m, *d)),
            _ => None,
        })
        .collect();

    df.replace(UNITS_SOLD, Series::new(UNITS_SOLD.into(), units))?;
    df.with_column(Series::new(REVENUE.into(), revenue))?;
    Ok(corrected)
}
