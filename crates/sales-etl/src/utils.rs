//! Shared utilities for the ETL pipeline.
//!
//! Helpers for pulling typed values out of loosely typed CSV columns and for
//! the small statistics (mode, quantiles) the cleaning steps need.

use crate::error::{EtlError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::HashMap;
use std::hash::Hash;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 6] = [',', '$', '%', '€', '₹', ' '];

/// Clean a string for numeric parsing by removing formatting characters.
///
/// # Example
///
/// ```rust,ignore
/// use sales_etl::utils::clean_numeric_string;
///
/// assert_eq!(clean_numeric_string("₹1,234.56"), "1234.56");
/// assert_eq!(clean_numeric_string("  42%  "), "42");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Try to parse a string as a finite numeric value (f64).
///
/// Handles currency symbols, percentages, and thousands separators.
/// `NaN` and infinities are treated as unparsable.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Title-case a string: the first letter of every alphabetic run is
/// upper-cased, the rest lower-cased.
///
/// ```rust,ignore
/// assert_eq!(title_case("running SHOES"), "Running Shoes");
/// assert_eq!(title_case("o'neil"), "O'Neil");
/// ```
pub fn title_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            result.push(c);
            prev_alpha = false;
        }
    }
    result
}

/// Trim then title-case.
#[inline]
pub fn normalize_label(s: &str) -> String {
    title_case(s.trim())
}

// =============================================================================
// Date Utilities
// =============================================================================

/// Days from 0001-01-01 (CE) to the Unix epoch; polars stores dates as days
/// since the epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Parse a date, trying each format in order. Date-time formats are accepted
/// and truncated to the date.
pub fn parse_date(s: &str, formats: &[String]) -> Option<NaiveDate> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    formats.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(trimmed, fmt)
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(trimmed, fmt).ok().map(|dt| dt.date()))
    })
}

/// Convert a date to its polars physical representation.
#[inline]
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

// =============================================================================
// Series Extraction Utilities
// =============================================================================

/// Values of a Series as strings; non-string columns are cast first.
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Values of a Series as `f64`. String values are parsed leniently and
/// become `None` when they cannot be parsed.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    if is_numeric_dtype(series.dtype()) {
        let cast = series.cast(&DataType::Float64)?;
        return Ok(cast
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect());
    }

    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.and_then(parse_numeric_string))
        .collect())
}

/// Values of a Series as days since the epoch. String values are parsed with
/// `formats`; anything unparsable becomes `None`.
pub fn date_values(series: &Series, formats: &[String]) -> PolarsResult<Vec<Option<i32>>> {
    match series.dtype() {
        DataType::Date => Ok(series.cast(&DataType::Int32)?.i32()?.into_iter().collect()),
        DataType::Datetime(_, _) => Ok(series
            .cast(&DataType::Date)?
            .cast(&DataType::Int32)?
            .i32()?
            .into_iter()
            .collect()),
        _ => {
            let cast = series.cast(&DataType::String)?;
            Ok(cast
                .str()?
                .into_iter()
                .map(|v| v.and_then(|raw| parse_date(raw, formats)).map(date_to_days))
                .collect())
        }
    }
}

/// Look up a column, mapping absence to [`EtlError::ColumnNotFound`].
pub fn require_series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| EtlError::ColumnNotFound(name.to_string()))
}

/// String values of a named column.
pub fn column_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    Ok(string_values(require_series(df, name)?)?)
}

/// Numeric values of a named column.
pub fn column_numbers(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(numeric_values(require_series(df, name)?)?)
}

/// Build a `Date` Series from days since the epoch.
pub fn date_series(name: &str, days: Vec<Option<i32>>) -> PolarsResult<Series> {
    Series::new(name.into(), days).cast(&DataType::Date)
}

// =============================================================================
// Statistics Utilities
// =============================================================================

/// Most frequent value; ties go to the value encountered first.
pub fn first_mode<T, I>(values: I) -> Option<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut counts: HashMap<T, (usize, usize)> = HashMap::new();
    for (position, value) in values.into_iter().enumerate() {
        counts
            .entry(value)
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, position));
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(value, _)| value)
}

/// Median of the non-missing values.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let series = Series::new("median".into(), values);
    series.median()
}

/// Quantile of an ascending-sorted slice using linear interpolation between
/// the two closest ranks.
pub fn quantile_linear(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Acceptance band `[q1 - k*iqr, q3 + k*iqr]`.
#[inline]
pub fn iqr_bounds(q1: f64, q3: f64, k: f64) -> (f64, f64) {
    let iqr = q3 - q1;
    (q1 - k * iqr, q3 + k * iqr)
}

/// Expected revenue for one transaction.
#[inline]
pub fn expected_revenue(units: f64, mrp: f64, discount_pct: f64) -> f64 {
    units * mrp * (1.0 - discount_pct / 100.0)
}

// =============================================================================
// Tests
// =============================================================================
