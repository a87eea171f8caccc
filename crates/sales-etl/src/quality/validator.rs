//! The quality gate run on the cleaned dataset.

use crate::columns::{
    CRITICAL_COLUMNS, DISCOUNT_APPLIED, MRP, ORDER_ID, REGION, REVENUE, UNITS_SOLD,
};
use crate::config::PipelineConfig;
use crate::error::{EtlError, Result};
use crate::utils::{column_numbers, column_strings, expected_revenue};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use tracing::{error, info};

/// Maximum accepted difference between stored and recomputed revenue.
pub const REVENUE_TOLERANCE: f64 = 0.01;

/// The invariants checked by the quality gate, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCheck {
    CriticalNotNull,
    UniqueOrderId,
    PositiveUnits,
    PositiveMrp,
    CanonicalRegion,
    DiscountRange,
    RevenueConsistency,
}

impl QualityCheck {
    pub const ALL: [QualityCheck; 7] = [
        QualityCheck::CriticalNotNull,
        QualityCheck::UniqueOrderId,
        QualityCheck::PositiveUnits,
        QualityCheck::PositiveMrp,
        QualityCheck::CanonicalRegion,
        QualityCheck::DiscountRange,
        QualityCheck::RevenueConsistency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::CriticalNotNull => "critical_not_null",
            Self::UniqueOrderId => "unique_order_id",
            Self::PositiveUnits => "positive_units",
            Self::PositiveMrp => "positive_mrp",
            Self::CanonicalRegion => "canonical_region",
            Self::DiscountRange => "discount_range",
            Self::RevenueConsistency => "revenue_consistency",
        }
    }
}

impl fmt::Display for QualityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: QualityCheck,
    pub passed: bool,
    /// Observed range or summary when passing, the violation when failing.
    pub detail: String,
}

impl CheckResult {
    fn pass(check: QualityCheck, detail: impl Into<String>) -> Self {
        Self {
            check,
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(check: QualityCheck, detail: impl Into<String>) -> Self {
        Self {
            check,
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Result of running every check over one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub rows_checked: usize,
    pub checks: Vec<CheckResult>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn failed_checks(&self) -> Vec<QualityCheck> {
        self.failures().map(|c| c.check).collect()
    }

    pub fn get(&self, check: QualityCheck) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.check == check)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failures: Vec<&CheckResult> = self.failures().collect();
        if failures.is_empty() {
            return write!(f, "all {} checks passed", self.checks.len());
        }
        write!(f, "{} of {} checks failed", failures.len(), self.checks.len())?;
        for failure in failures {
            write!(f, "; {}: {}", failure.check, failure.detail)?;
        }
        Ok(())
    }
}

/// A dataset that passed every quality check.
///
/// Only [`Validator::validate`] creates one; sinks accept nothing else.
#[derive(Debug, Clone)]
pub struct ValidatedFrame {
    df: DataFrame,
    report: ValidationReport,
}

impl ValidatedFrame {
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn into_inner(self) -> DataFrame {
        self.df
    }
}

/// Runs the seven invariant checks. Read-only: rows are never changed.
#[derive(Debug, Clone)]
pub struct Validator {
    config: PipelineConfig,
}

impl Validator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Run every check and wrap the frame if all pass.
    ///
    /// On failure the error carries the full [`ValidationReport`].
    pub fn validate(&self, df: DataFrame) -> Result<ValidatedFrame> {
        info!("Starting data validation on {} records", df.height());
        let report = self.check(&df)?;

        if report.passed() {
            info!("All {} validation checks passed", report.checks.len());
            Ok(ValidatedFrame { df, report })
        } else {
            error!("Data validation failed: {}", report);
            Err(EtlError::Validation(report))
        }
    }

    /// Run every check and return the report without consuming the frame.
    pub fn check(&self, df: &DataFrame) -> Result<ValidationReport> {
        let mut checks = Vec::with_capacity(QualityCheck::ALL.len());
        for check in QualityCheck::ALL {
            let result = self.run_check(check, df)?;
            if result.passed {
                info!("   [PASS] {}: {}", check, result.detail);
            } else {
                error!("   [FAIL] {}: {}", check, result.detail);
            }
            checks.push(result);
        }

        Ok(ValidationReport {
            rows_checked: df.height(),
            checks,
        })
    }

    fn run_check(&self, check: QualityCheck, df: &DataFrame) -> Result<CheckResult> {
        match check {
            QualityCheck::CriticalNotNull => Ok(check_not_null(df)),
            QualityCheck::UniqueOrderId => check_unique(df),
            QualityCheck::PositiveUnits => check_positive(df, check, UNITS_SOLD),
            QualityCheck::PositiveMrp => check_positive(df, check, MRP),
            QualityCheck::CanonicalRegion => self.check_regions(df),
            QualityCheck::DiscountRange => check_discount_range(df),
            QualityCheck::RevenueConsistency => check_revenue(df),
        }
    }

    fn check_regions(&self, df: &DataFrame) -> Result<CheckResult> {
        let check = QualityCheck::CanonicalRegion;
        let Some(regions) = optional_strings(df, REGION)? else {
            return Ok(CheckResult::fail(check, format!("column '{}' is missing", REGION)));
        };

        let mut invalid: BTreeSet<String> = BTreeSet::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        for region in regions {
            match region {
                Some(r) if self.config.is_valid_region(&r) => {
                    seen.insert(r);
                }
                Some(r) => {
                    invalid.insert(r);
                }
                None => {
                    invalid.insert("<null>".to_string());
                }
            }
        }

        if invalid.is_empty() {
            Ok(CheckResult::pass(
                check,
                format!("regions present: {:?}", seen),
            ))
        } else {
            Ok(CheckResult::fail(
                check,
                format!("non-canonical regions: {:?}", invalid),
            ))
        }
    }
}

fn optional_strings(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<String>>>> {
    if df.column(name).is_err() {
        return Ok(None);
    }
    column_strings(df, name).map(Some)
}

fn optional_numbers(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    if df.column(name).is_err() {
        return Ok(None);
    }
    column_numbers(df, name).map(Some)
}

fn check_not_null(df: &DataFrame) -> CheckResult {
    let check = QualityCheck::CriticalNotNull;
    let mut problems = Vec::new();

    for col in CRITICAL_COLUMNS {
        match df.column(col) {
            Ok(c) if c.null_count() > 0 => {
                problems.push(format!("{} has {} nulls", col, c.null_count()));
            }
            Ok(_) => {}
            Err(_) => problems.push(format!("{} is missing", col)),
        }
    }

    if problems.is_empty() {
        CheckResult::pass(check, format!("no nulls in {:?}", CRITICAL_COLUMNS))
    } else {
        CheckResult::fail(check, problems.join(", "))
    }
}

fn check_unique(df: &DataFrame) -> Result<CheckResult> {
    let check = QualityCheck::UniqueOrderId;
    let Some(ids) = optional_strings(df, ORDER_ID)? else {
        return Ok(CheckResult::fail(check, format!("column '{}' is missing", ORDER_ID)));
    };

    let total = ids.len();
    let mut seen: HashSet<Option<String>> = HashSet::with_capacity(total);
    let duplicates = ids.into_iter().filter(|id| !seen.insert(id.clone())).count();

    if duplicates == 0 {
        Ok(CheckResult::pass(check, format!("{} unique order ids", total)))
    } else {
        Ok(CheckResult::fail(
            check,
            format!("{} duplicate order ids", duplicates),
        ))
    }
}

/// Min of the column must be > 0; nulls and empty columns fail.
fn check_positive(df: &DataFrame, check: QualityCheck, col: &str) -> Result<CheckResult> {
    let Some(values) = optional_numbers(df, col)? else {
        return Ok(CheckResult::fail(check, format!("column '{}' is missing", col)));
    };

    let nulls = values.iter().filter(|v| v.is_none()).count();
    if nulls > 0 {
        return Ok(CheckResult::fail(check, format!("{} has {} nulls", col, nulls)));
    }

    let (min, max) = min_max(values.iter().flatten().copied());
    match (min, max) {
        (Some(min), Some(max)) if min > 0.0 => Ok(CheckResult::pass(
            check,
            format!("{} range [{}, {}]", col, min, max),
        )),
        (Some(min), _) => {
            let offending = values.iter().flatten().filter(|v| **v <= 0.0).count();
            Ok(CheckResult::fail(
                check,
                format!("{} has {} non-positive values (min {})", col, offending, min),
            ))
        }
        _ => Ok(CheckResult::fail(check, format!("{} has no values", col))),
    }
}

fn check_discount_range(df: &DataFrame) -> Result<CheckResult> {
    let check = QualityCheck::DiscountRange;
    let Some(values) = optional_numbers(df, DISCOUNT_APPLIED)? else {
        return Ok(CheckResult::fail(
            check,
            format!("column '{}' is missing", DISCOUNT_APPLIED),
        ));
    };

    let out_of_range = values
        .iter()
        .filter(|v| !v.is_some_and(|d| (0.0..=100.0).contains(&d)))
        .count();

    if out_of_range == 0 {
        let (min, max) = min_max(values.iter().flatten().copied());
        Ok(CheckResult::pass(
            check,
            format!(
                "discount range [{}, {}]",
                min.unwrap_or(0.0),
                max.unwrap_or(0.0)
            ),
        ))
    } else {
        Ok(CheckResult::fail(
            check,
            format!("{} discounts missing or outside [0, 100]", out_of_range),
        ))
    }
}

fn check_revenue(df: &DataFrame) -> Result<CheckResult> {
    let check = QualityCheck::RevenueConsistency;
    let columns = (
        optional_numbers(df, REVENUE)?,
        optional_numbers(df, UNITS_SOLD)?,
        optional_numbers(df, MRP)?,
        optional_numbers(df, DISCOUNT_APPLIED)?,
    );
    let (Some(revenue), Some(units), Some(mrp), Some(discount)) = columns else {
        return Ok(CheckResult::fail(
            check,
            "revenue inputs missing from dataset",
        ));
    };

    let mut max_diff: f64 = 0.0;
    let mut inconsistent = 0;
    for i in 0..revenue.len() {
        match (revenue[i], units[i], mrp[i], discount[i]) {
            (Some(r), Some(u), Some(m), Some(d)) => {
                let diff = (r - expected_revenue(u, m, d)).abs();
                max_diff = max_diff.max(diff);
                if diff >= REVENUE_TOLERANCE {
                    inconsistent += 1;
                }
            }
            _ => inconsistent += 1,
        }
    }

    if inconsistent == 0 {
        Ok(CheckResult::pass(
            check,
            format!("max revenue difference {:.6}", max_diff),
        ))
    } else {
        Ok(CheckResult::fail(
            check,
            format!(
                "{} rows off by >= {} or missing inputs (max difference {:.4})",
                inconsistent, REVENUE_TOLERANCE, max_diff
            ),
        ))
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (Option<f64>, Option<f64>) {
    values.fold((None, None), |(min, max), v| {
        (
            Some(min.map_or(v, |m: f64| m.min(v))),
            Some(max.map_or(v, |m: f64| m.max(v))),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::*;

    fn clean_frame() -> DataFrame {
        df![
            ORDER_ID => ["A", "B"],
            ORDER_DATE => ["2024-01-01", "2024-01-02"],
            REGION => ["Mumbai", "Pune"],
            PRODUCT_LINE => ["Running", "Training"],
            UNITS_SOLD => [5.0, 2.0],
            MRP => [100.0, 50.0],
            DISCOUNT_APPLIED => [0.0, 10.0],
            REVENUE => [500.0, 90.0],
            PROFIT => [Some(10.0), None],
        ]
        .unwrap()
    }

    fn validator() -> Validator {
        Validator::new(&PipelineConfig::default())
    }

    fn with(df: DataFrame, series: Series) -> DataFrame {
        let mut df = df;
        df.with_column(series).unwrap();
        df
    }

    fn failed(df: DataFrame) -> Vec<QualityCheck> {
        match validator().validate(df) {
            Err(EtlError::Validation(report)) => report.failed_checks(),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => Vec::new(),
        }
    }

    #[test]
    fn test_clean_frame_passes_all_checks() {
        let validated = validator().validate(clean_frame()).unwrap();
        assert_eq!(validated.report().checks.len(), 7);
        assert!(validated.report().passed());
        assert_eq!(validated.height(), 2);
    }

    #[test]
    fn test_null_profit_is_accepted() {
        let report = validator().check(&clean_frame()).unwrap();
        assert!(report.passed());
    }

    #[test]
    fn test_null_in_critical_column() {
        let df = with(clean_frame(), Series::new(REGION.into(), [Some("Mumbai"), None]));
        let failures = failed(df);
        assert!(failures.contains(&QualityCheck::CriticalNotNull));
        assert!(failures.contains(&QualityCheck::CanonicalRegion));
    }

    #[test]
    fn test_duplicate_order_id() {
        let df = with(clean_frame(), Series::new(ORDER_ID.into(), ["A", "A"]));
        assert_eq!(failed(df), vec![QualityCheck::UniqueOrderId]);
    }

    #[test]
    fn test_zero_units_fail() {
        let df = with(clean_frame(), Series::new(UNITS_SOLD.into(), [0.0, 2.0]));
        let failures = failed(df);
        assert!(failures.contains(&QualityCheck::PositiveUnits));
    }

    #[test]
    fn test_null_units_fail() {
        let df = with(clean_frame(), Series::new(UNITS_SOLD.into(), [None, Some(2.0)]));
        let failures = failed(df);
        assert!(failures.contains(&QualityCheck::PositiveUnits));
        assert!(failures.contains(&QualityCheck::RevenueConsistency));
    }

    #[test]
    fn test_non_positive_mrp_fails() {
        let df = with(clean_frame(), Series::new(MRP.into(), [-1.0, 50.0]));
        assert!(failed(df).contains(&QualityCheck::PositiveMrp));
    }

    #[test]
    fn test_unknown_region_fails() {
        let df = with(clean_frame(), Series::new(REGION.into(), ["Mumbai", "Atlantis"]));
        assert_eq!(failed(df), vec![QualityCheck::CanonicalRegion]);
    }

    #[test]
    fn test_discount_out_of_range() {
        let df = with(
            clean_frame(),
            Series::new(DISCOUNT_APPLIED.into(), [0.0, 150.0]),
        );
        let failures = failed(df);
        assert!(failures.contains(&QualityCheck::DiscountRange));
    }

    #[test]
    fn test_revenue_mismatch() {
        let df = with(clean_frame(), Series::new(REVENUE.into(), [500.0, 90.5]));
        assert_eq!(failed(df), vec![QualityCheck::RevenueConsistency]);
    }

    #[test]
    fn test_revenue_within_tolerance() {
        let df = with(clean_frame(), Series::new(REVENUE.into(), [500.005, 90.0]));
        assert!(failed(df).is_empty());
    }

    #[test]
    fn test_empty_frame_fails_positive_checks() {
        let df = clean_frame().head(Some(0));
        let failures = failed(df);
        assert!(failures.contains(&QualityCheck::PositiveUnits));
        assert!(failures.contains(&QualityCheck::PositiveMrp));
    }

    #[test]
    fn test_missing_column_is_a_violation() {
        let df = clean_frame().drop(PRODUCT_LINE).unwrap();
        assert_eq!(failed(df), vec![QualityCheck::CriticalNotNull]);
    }

    #[test]
    fn test_all_failures_reported_together() {
        let df = with(clean_frame(), Series::new(ORDER_ID.into(), ["A", "A"]));
        let df = with(df, Series::new(REGION.into(), ["Mumbai", "Atlantis"]));
        let err = validator().validate(df).unwrap_err();

        let report = err.validation_report().unwrap();
        assert_eq!(report.failures().count(), 2);
        let message = err.to_string();
        assert!(message.contains("unique_order_id"));
        assert!(message.contains("canonical_region"));
    }

    #[test]
    fn test_report_serialization() {
        let report = validator().check(&clean_frame()).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"check\":\"revenue_consistency\""));
        assert!(json.contains("\"passed\":true"));
    }
}
