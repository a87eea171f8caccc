//! The ten cleaning steps of the transformer, in execution order.
//!
//! Every step takes ownership of the dataset and returns the new dataset with
//! its statistics. A step may rely on the output of the steps before it; the
//! precondition is noted on each type.

use crate::cleaner::{
    DataCleaner, canonicalize_labels, coerce_to_float64, correct_units_and_revenue,
    flag_negative, normalize_labels,
};
use crate::columns::{
    DISCOUNT_APPLIED, ETL_TIMESTAMP, ETL_VERSION, GENDER_CATEGORY, LOSS_FLAG, MRP, NUMERIC_COLUMNS,
    ORDER_DATE, ORDER_ID, PRODUCT_LINE, PROFIT, REGION, REVENUE, SIZE, UNITS_SOLD,
};
use crate::error::{Result, ResultExt};
use crate::imputers::StatisticalImputer;
use crate::pipeline::outliers::OutlierHandler;
use crate::types::StepStats;
use polars::prelude::*;
use std::collections::BTreeMap;

/// One atomic, whole-dataset cleaning operation.
pub trait TransformStep: Send + Sync {
    /// Stable snake_case name used in logs, reports and error messages.
    fn name(&self) -> &'static str;

    /// Apply the step to the whole dataset.
    fn apply(&self, df: DataFrame) -> Result<(DataFrame, StepStats)>;
}

/// Step 1: fill missing values.
///
/// `Size` gets its mode, `Units_Sold` and `MRP` their medians,
/// `Discount_Applied` a constant 0 and `Order_Date` the most frequent parsed
/// date. The numeric columns are coerced to `Float64` here, so values that do
/// not parse are imputed as well. Runs on the raw dataset.
#[derive(Debug, Clone)]
pub struct ImputeMissing {
    pub date_formats: Vec<String>,
}

impl TransformStep for ImputeMissing {
    fn name(&self) -> &'static str {
        "impute_missing"
    }

    fn apply(&self, mut df: DataFrame) -> Result<(DataFrame, StepStats)> {
        let rows = df.height();

        let size = StatisticalImputer::apply_mode_imputation(&mut df, SIZE)?;
        let units = StatisticalImputer::apply_numeric_median(&mut df, UNITS_SOLD)?;
        let mrp = StatisticalImputer::apply_numeric_median(&mut df, MRP)?;
        let discount = StatisticalImputer::apply_numeric_constant(&mut df, DISCOUNT_APPLIED, 0.0)?;
        let dates = StatisticalImputer::apply_date_mode(&mut df, ORDER_DATE, &self.date_formats)?;

        let unparsable = units.unparsable + mrp.unparsable + discount.unparsable + dates.unparsable;
        let stats = StepStats::new(rows, df.height())
            .with_count(SIZE, size.filled)
            .with_count(UNITS_SOLD, units.filled)
            .with_count(MRP, mrp.filled)
            .with_count(DISCOUNT_APPLIED, discount.filled)
            .with_count(ORDER_DATE, dates.filled);
        let message = format!(
            "Imputed {} missing values ({} of them unparsable)",
            stats.total_count(),
            unparsable
        );

        Ok((df, stats.with_message(message)))
    }
}

/// Step 2: keep the first row of every `Order_ID`.
#[derive(Debug, Clone, Default)]
pub struct Deduplicate;

impl TransformStep for Deduplicate {
    fn name(&self) -> &'static str {
        "deduplicate"
    }

    fn apply(&self, df: DataFrame) -> Result<(DataFrame, StepStats)> {
        let rows = df.height();
        let (df, removed) = DataCleaner::deduplicate_by(df, ORDER_ID)?;
        let stats = StepStats::new(rows, df.height())
            .with_count("duplicates_removed", removed)
            .with_message(format!("Removed {} duplicate orders", removed));
        Ok((df, stats))
    }
}

/// Step 3: trim, title-case and alias-resolve `Region`.
///
/// Unknown regions pass through; the quality gate rejects them.
#[derive(Debug, Clone)]
pub struct CanonicalizeRegions {
    pub aliases: BTreeMap<String, String>,
}

impl TransformStep for CanonicalizeRegions {
    fn name(&self) -> &'static str {
        "canonicalize_regions"
    }

    fn apply(&self, mut df: DataFrame) -> Result<(DataFrame, StepStats)> {
        let rows = df.height();
        let outcome = canonicalize_labels(&mut df, REGION, &self.aliases)?;
        let stats = StepStats::new(rows, rows)
            .with_count("changed", outcome.changed)
            .with_count("aliased", outcome.aliased)
            .with_message(format!(
                "Standardized {} region values ({} via alias)",
                outcome.changed, outcome.aliased
            ));
        Ok((df, stats))
    }
}

/// Step 4: `Loss_Flag = Profit < 0` on the profit as read.
#[derive(Debug, Clone, Default)]
pub struct FlagLosses;

impl TransformStep for FlagLosses {
    fn name(&self) -> &'static str {
        "flag_losses"
    }

    fn apply(&self, mut df: DataFrame) -> Result<(DataFrame, StepStats)> {
        let rows = df.height();
        let flagged = flag_negative(&mut df, PROFIT, LOSS_FLAG)?;
        let stats = StepStats::new(rows, rows)
            .with_count("loss_transactions", flagged)
            .with_message(format!("Flagged {} loss-making transactions", flagged));
        Ok((df, stats))
    }
}

/// Step 5: make units non-negative and recompute `Revenue`.
///
/// Expects `Units_Sold`, `MRP` and `Discount_Applied` to be imputed (step 1).
#[derive(Debug, Clone, Default)]
pub struct CorrectUnitsAndRevenue;

impl TransformStep for CorrectUnitsAndRevenue {
    fn name(&self) -> &'static str {
        "correct_units_and_revenue"
    }

    fn apply(&self, mut df: DataFrame) -> Result<(DataFrame, StepStats)> {
        let rows = df.height();
        let corrected = correct_units_and_revenue(&mut df)?;
        let stats = StepStats::new(rows, rows)
            .with_count("negative_units_corrected", corrected)
            .with_message(format!(
                "Corrected {} negative unit values and recomputed revenue",
                corrected
            ));
        Ok((df, stats))
    }
}

/// Step 6: trim and title-case `Product_Line` and `Gender_Category`.
#[derive(Debug, Clone, Default)]
pub struct NormalizeCategories;

impl TransformStep for NormalizeCategories {
    fn name(&self) -> &'static str {
        "normalize_categories"
    }

    fn apply(&self, mut df: DataFrame) -> Result<(DataFrame, StepStats)> {
        let rows = df.height();
        let mut stats = StepStats::new(rows, rows);
        for col in [PRODUCT_LINE, GENDER_CATEGORY] {
            let outcome = normalize_labels(&mut df, col)?;
            stats = stats.with_count(col, outcome.changed);
        }
        let message = format!("Normalized {} categorical values", stats.total_count());
        Ok((df, stats.with_message(message)))
    }
}

/// Step 7: force the numeric columns to `Float64`.
///
/// Expects `Revenue` to exist (step 5).
#[derive(Debug, Clone, Default)]
pub struct CoerceNumericTypes;

impl TransformStep for CoerceNumericTypes {
    fn name(&self) -> &'static str {
        "coerce_numeric_types"
    }

    fn apply(&self, mut df: DataFrame) -> Result<(DataFrame, StepStats)> {
        let rows = df.height();
        let mut stats = StepStats::new(rows, rows);
        for col in NUMERIC_COLUMNS {
            let introduced = coerce_to_float64(&mut df, col)?;
            stats = stats.with_count(col, introduced);
        }
        let message = format!(
            "Converted numeric columns, {} values failed coercion",
            stats.total_count()
        );
        Ok((df, stats.with_message(message)))
    }
}

/// Step 8: drop rows whose revenue lies outside the IQR band.
///
/// Expects `Revenue` to be recomputed and numeric (steps 5 and 7).
#[derive(Debug, Clone)]
pub struct RemoveRevenueOutliers {
    pub multiplier: f64,
}

impl TransformStep for RemoveRevenueOutliers {
    fn name(&self) -> &'static str {
        "remove_outliers"
    }

    fn apply(&self, df: DataFrame) -> Result<(DataFrame, StepStats)> {
        let rows = df.height();
        let (df, bounds) = OutlierHandler::remove_iqr_outliers(df, REVENUE, self.multiplier)?;
        let stats = StepStats::new(rows, df.height());
        let stats = match bounds {
            Some(b) => stats
                .with_count("outliers_removed", b.rows_removed)
                .with_message(format!(
                    "Removed {} revenue outliers outside [{:.2}, {:.2}]",
                    b.rows_removed, b.lower, b.upper
                )),
            None => stats
                .with_count("outliers_removed", 0)
                .with_message("No revenue values, outlier removal skipped"),
        };
        Ok((df, stats))
    }
}

/// Step 9: drop rows with missing or non-positive `Units_Sold`.
#[derive(Debug, Clone, Default)]
pub struct DropNonPositiveUnits;

impl TransformStep for DropNonPositiveUnits {
    fn name(&self) -> &'static str {
        "drop_non_positive_units"
    }

    fn apply(&self, df: DataFrame) -> Result<(DataFrame, StepStats)> {
        let rows = df.height();
        let (df, removed) = DataCleaner::drop_non_positive(df, UNITS_SOLD)?;
        let stats = StepStats::new(rows, df.height())
            .with_count("rows_removed", removed)
            .with_message(format!("Removed {} rows with zero or missing units", removed));
        Ok((df, stats))
    }
}

/// Step 10: add `etl_timestamp` and `etl_version` to every row.
#[derive(Debug, Clone)]
pub struct StampMetadata {
    pub timestamp: String,
    pub version: String,
}

impl TransformStep for StampMetadata {
    fn name(&self) -> &'static str {
        "stamp_metadata"
    }

    fn apply(&self, mut df: DataFrame) -> Result<(DataFrame, StepStats)> {
        let rows = df.height();
        df.with_column(Series::new(
            ETL_TIMESTAMP.into(),
            vec![self.timestamp.as_str(); rows],
        ))
        .context(format!("Adding column '{}'", ETL_TIMESTAMP))?;
        df.with_column(Series::new(
            ETL_VERSION.into(),
            vec![self.version.as_str(); rows],
        ))
        .context(format!("Adding column '{}'", ETL_VERSION))?;
        let stats = StepStats::new(rows, rows).with_message(format!(
            "Stamped {} rows with version {} at {}",
            rows, self.version, self.timestamp
        ));
        Ok((df, stats))
    }
}
