//! Statistical imputation methods.
//!
//! Provides median, constant and mode fills for the sales columns, plus the
//! date repair used for `Order_Date`.

use crate::error::{EtlError, Result};
use crate::utils::{
    date_series, date_values, first_mode, median, numeric_values, require_series, string_values,
};
use polars::prelude::*;
use tracing::debug;

/// Outcome of imputing a single column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImputeOutcome {
    /// Values that were present but could not be parsed and were treated as missing.
    pub unparsable: usize,
    /// Missing values that were filled.
    pub filled: usize,
}

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Coerce `col_name` to `Float64` and fill missing values with the median.
    ///
    /// Fails with [`EtlError::NoValidValues`] if no value in the column parses.
    pub fn apply_numeric_median(df: &mut DataFrame, col_name: &str) -> Result<ImputeOutcome> {
        let (values, unparsable) = Self::coerced_numbers(df, col_name)?;
        let median_val =
            median(&values).ok_or_else(|| EtlError::NoValidValues(col_name.to_string()))?;

        let outcome = Self::fill_numbers(df, col_name, values, median_val, unparsable)?;
        if outcome.filled > 0 {
            debug!(
                "Filled {} values in '{}' with median {:.2}",
                outcome.filled, col_name, median_val
            );
        }
        Ok(outcome)
    }

    /// Coerce `col_name` to `Float64` and fill missing values with `value`.
    pub fn apply_numeric_constant(
        df: &mut DataFrame,
        col_name: &str,
        value: f64,
    ) -> Result<ImputeOutcome> {
        let (values, unparsable) = Self::coerced_numbers(df, col_name)?;
        let outcome = Self::fill_numbers(df, col_name, values, value, unparsable)?;
        if outcome.filled > 0 {
            debug!(
                "Filled {} values in '{}' with constant {}",
                outcome.filled, col_name, value
            );
        }
        Ok(outcome)
    }

    /// Fill missing (or blank) values of a categorical column with its mode.
    ///
    /// Ties are broken in favour of the value seen first.
    pub fn apply_mode_imputation(df: &mut DataFrame, col_name: &str) -> Result<ImputeOutcome> {
        let series = require_series(df, col_name)?;
        let values: Vec<Option<String>> = string_values(series)?
            .into_iter()
            .map(|v| v.filter(|s| !s.trim().is_empty()))
            .collect();

        let mode_val = first_mode(values.iter().flatten().cloned())
            .ok_or_else(|| EtlError::NoValidValues(col_name.to_string()))?;

        let mut filled = 0;
        let result: Vec<Option<String>> = values
            .into_iter()
            .map(|v| {
                v.or_else(|| {
                    filled += 1;
                    Some(mode_val.clone())
                })
            })
            .collect();

        df.replace(col_name, Series::new(col_name.into(), result))?;
        if filled > 0 {
            debug!("Filled {} values in '{}' with mode '{}'", filled, col_name, mode_val);
        }

        Ok(ImputeOutcome {
            unparsable: 0,
            filled,
        })
    }

    /// Parse `col_name` as dates, treat unparsable values as missing and fill
    /// missing dates with the most frequent parsed date.
    ///
    /// The column is replaced with a `Date` column. Fails with
    /// [`EtlError::NoValidValues`] if no value parses.
    pub fn apply_date_mode(
        df: &mut DataFrame,
        col_name: &str,
        formats: &[String],
    ) -> Result<ImputeOutcome> {
        let series = require_series(df, col_name)?;
        let present = series.len() - series.null_count();
        let days = date_values(series, formats)?;

        let parsed = days.iter().flatten().count();
        let unparsable = present - parsed;

        let mode_day = first_mode(days.iter().flatten().copied())
            .ok_or_else(|| EtlError::NoValidValues(col_name.to_string()))?;

        let filled = days.iter().filter(|d| d.is_none()).count();
        let result: Vec<Option<i32>> = days.into_iter().map(|d| d.or(Some(mode_day))).collect();

        df.replace(col_name, date_series(col_name, result)?)?;
        if filled > 0 {
            debug!(
                "Filled {} dates in '{}' ({} unparsable) with the most frequent date",
                filled, col_name, unparsable
            );
        }

        Ok(ImputeOutcome { unparsable, filled })
    }

    /// Parse a column to numbers; returns the values and how many present
    /// values failed to parse.
    fn coerced_numbers(df: &DataFrame, col_name: &str) -> Result<(Vec<Option<f64>>, usize)> {
        let series = require_series(df, col_name)?;
        let present = series.len() - series.null_count();
        let values = numeric_values(series)?;
        let parsed = values.iter().flatten().count();
        Ok((values, present - parsed))
    }

    fn fill_numbers(
        df: &mut DataFrame,
        col_name: &str,
        values: Vec<Option<f64>>,
        fill_value: f64,
        unparsable: usize,
    ) -> Result<ImputeOutcome> {
        let filled = values.iter().filter(|v| v.is_none()).count();
        let result: Vec<Option<f64>> = values
            .into_iter()
            .map(|v| v.or(Some(fill_value)))
            .collect();

        df.replace(col_name, Series::new(col_name.into(), result))?;
        Ok(ImputeOutcome { unparsable, filled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_imputation_coerces_and_fills() {
        let mut df = df!["Units_Sold" => [Some("2"), None, Some("abc"), Some("4"), Some("10")]]
            .unwrap();

        let outcome = StatisticalImputer::apply_numeric_median(&mut df, "Units_Sold").unwrap();
        assert_eq!(outcome, ImputeOutcome { unparsable: 1, filled: 2 });

        let col = df.column("Units_Sold").unwrap();
        assert_eq!(col.dtype(), &DataType::Float64);
        let values: Vec<Option<f64>> = col.f64().unwrap().into_iter().collect();
        assert_eq!(
            values,
            vec![Some(2.0), Some(4.0), Some(4.0), Some(4.0), Some(10.0)]
        );
    }

    #[test]
    fn test_median_with_no_valid_values_fails() {
        let mut df = df!["MRP" => [Some("x"), None]].unwrap();
        let err = StatisticalImputer::apply_numeric_median(&mut df, "MRP").unwrap_err();
        assert!(matches!(err, EtlError::NoValidValues(ref c) if c == "MRP"));
    }

    #[test]
    fn test_constant_imputation() {
        let mut df = df!["Discount_Applied" => [Some(10.0), None]].unwrap();
        let outcome =
            StatisticalImputer::apply_numeric_constant(&mut df, "Discount_Applied", 0.0).unwrap();
        assert_eq!(outcome.filled, 1);
        let values: Vec<Option<f64>> = df
            .column("Discount_Applied")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(values, vec![Some(10.0), Some(0.0)]);
    }

    #[test]
    fn test_constant_imputation_of_fully_missing_column() {
        let mut df = df!["Discount_Applied" => [None::<&str>, None]].unwrap();
        let outcome =
            StatisticalImputer::apply_numeric_constant(&mut df, "Discount_Applied", 0.0).unwrap();
        assert_eq!(outcome.filled, 2);
    }

    #[test]
    fn test_mode_imputation_first_mode_wins_ties() {
        let mut df = df!["Size" => [Some("M"), Some("L"), None, Some("L"), Some("M"), Some(" ")]]
            .unwrap();
        let outcome = StatisticalImputer::apply_mode_imputation(&mut df, "Size").unwrap();
        assert_eq!(outcome.filled, 2);

        let values: Vec<Option<&str>> = df.column("Size").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(
            values,
            vec![Some("M"), Some("L"), Some("M"), Some("L"), Some("M"), Some("M")]
        );
    }

    #[test]
    fn test_mode_imputation_of_empty_column_fails() {
        let mut df = df!["Size" => [None::<&str>, None]].unwrap();
        assert!(StatisticalImputer::apply_mode_imputation(&mut df, "Size").is_err());
    }

    #[test]
    fn test_date_imputation() {
        let formats = crate::config::PipelineConfig::default().date_formats;
        let mut df = df![
            "Order_Date" => [Some("2024-01-05"), Some("junk"), None, Some("2024-01-05"), Some("2024-02-01")]
        ]
        .unwrap();

        let outcome = StatisticalImputer::apply_date_mode(&mut df, "Order_Date", &formats).unwrap();
        assert_eq!(outcome, ImputeOutcome { unparsable: 1, filled: 2 });

        let col = df.column("Order_Date").unwrap();
        assert_eq!(col.dtype(), &DataType::Date);
        assert_eq!(col.null_count(), 0);
        let as_text: Vec<Option<String>> = string_values(col.as_materialized_series()).unwrap();
        assert_eq!(as_text[1].as_deref(), Some("2024-01-05"));
    }

    #[test]
    fn test_date_imputation_of_timestamped_dates() {
        let formats = crate::config::PipelineConfig::default().date_formats;
        let mut df = df![
            "Order_Date" => [Some("2024-01-05 10:30:00"), Some("2024-01-05T18:00:00"), None]
        ]
        .unwrap();

        let outcome = StatisticalImputer::apply_date_mode(&mut df, "Order_Date", &formats).unwrap();
        assert_eq!(outcome, ImputeOutcome { unparsable: 0, filled: 1 });

        let as_text = string_values(df.column("Order_Date").unwrap().as_materialized_series()).unwrap();
        assert_eq!(as_text, vec![Some("2024-01-05".to_string()); 3]);
    }

    #[test]
    fn test_date_imputation_all_unparsable_fails() {
        let formats = crate::config::PipelineConfig::default().date_formats;
        let mut df = df!["Order_Date" => ["junk", "13/45/2024"]].unwrap();
        let err = StatisticalImputer::apply_date_mode(&mut df, "Order_Date", &formats).unwrap_err();
        assert_eq!(err.error_code(), "NO_VALID_VALUES");
    }

    #[test]
    fn test_missing_column() {
        let mut df = df!["Other" => [1.0]].unwrap();
        let err = StatisticalImputer::apply_numeric_median(&mut df, "MRP").unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }
}
