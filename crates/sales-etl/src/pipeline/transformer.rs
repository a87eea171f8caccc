//! The transformer: an ordered list of cleaning steps.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::steps::{
    CanonicalizeRegions, CoerceNumericTypes, CorrectUnitsAndRevenue, Deduplicate, DropNonPositiveUnits,
    FlagLosses, ImputeMissing, NormalizeCategories, RemoveRevenueOutliers, StampMetadata,
    TransformStep,
};
use crate::types::{StepLog, StepRecord};
use chrono::{Local, NaiveDateTime};
use polars::prelude::*;
use std::time::Instant;
use tracing::{error, info};

/// Format of the `etl_timestamp` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Runs the cleaning steps in their fixed order.
///
/// Each step sees only the output of the step before it. The run timestamp
/// stamped on every row is taken when the transformer is created.
pub struct Transformer {
    steps: Vec<Box<dyn TransformStep>>,
}

impl Transformer {
    /// Build the standard ten-step transformer, timestamped now.
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_run_timestamp(config, Local::now().naive_local())
    }

    /// Build the standard ten-step transformer with an explicit run timestamp.
    pub fn with_run_timestamp(config: &PipelineConfig, run_started: NaiveDateTime) -> Self {
        let steps: Vec<Box<dyn TransformStep>> = vec![
            Box::new(ImputeMissing {
                date_formats: config.date_formats.clone(),
            }),
            Box::new(Deduplicate),
            Box::new(CanonicalizeRegions {
                aliases: config.region_aliases.clone(),
            }),
            Box::new(FlagLosses),
            Box::new(CorrectUnitsAndRevenue),
            Box::new(NormalizeCategories),
            Box::new(CoerceNumericTypes),
            Box::new(RemoveRevenueOutliers {
                multiplier: config.outlier_multiplier,
            }),
            Box::new(DropNonPositiveUnits),
            Box::new(StampMetadata {
                timestamp: run_started.format(TIMESTAMP_FORMAT).to_string(),
                version: config.pipeline_version.clone(),
            }),
        ];
        Self { steps }
    }

    /// Names of the steps, in execution order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step over `df`.
    pub fn transform(&self, df: DataFrame) -> Result<(DataFrame, StepLog)> {
        self.transform_with(df, |_, _| {})
    }

    /// Run every step over `df`, calling `on_step` with the 0-based index and
    /// record of each completed step.
    ///
    /// A failing step aborts the run; its error is wrapped with the step name.
    pub fn transform_with<F>(&self, df: DataFrame, mut on_step: F) -> Result<(DataFrame, StepLog)>
    where
        F: FnMut(usize, &StepRecord),
    {
        let total = self.steps.len();
        let mut log = StepLog::new();
        let mut df = df;

        info!("Starting data transformation on {} records", df.height());

        for (index, step) in self.steps.iter().enumerate() {
            let started = Instant::now();
            let (next, stats) = step.apply(df).map_err(|e| {
                error!("Step {}/{} '{}' failed: {}", index + 1, total, step.name(), e);
                e.in_step(step.name())
            })?;
            df = next;

            info!("Step {}/{}: {} - {}", index + 1, total, step.name(), stats.message);
            log.push(step.name(), stats, started.elapsed().as_millis() as u64);
            if let Some(record) = log.records.last() {
                on_step(index, record);
            }
        }

        info!(
            "Transformation complete: {} -> {} records ({} removed, {:.2}% retained)",
            log.initial_rows(),
            log.final_rows(),
            log.rows_removed(),
            log.retention_rate()
        );

        Ok((df, log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::*;
    use crate::utils::column_strings;
    use pretty_assertions::assert_eq;

    fn raw_frame() -> DataFrame {
        df![
            ORDER_ID => ["A", "B", "B", "C", "D"],
            ORDER_DATE => [Some("2024-01-05"), Some("garbage"), Some("2024-01-06"), None, Some("2024-01-05")],
            REGION => [" bengaluru ", "Hyd", "Hyd", "mumbai", "pune"],
            PRODUCT_LINE => ["running", "Training", "Training", " lifestyle ", "Running"],
            GENDER_CATEGORY => ["men", "Women", "Women", "Unisex", "MEN"],
            SIZE => [Some("M"), None, Some("L"), Some("M"), Some("S")],
            UNITS_SOLD => [Some("-5"), Some("2"), Some("2"), None, Some("3")],
            MRP => [Some("50"), Some("120"), Some("120"), Some("110"), Some("90")],
            DISCOUNT_APPLIED => [Some("0"), None, Some("10"), Some("5"), Some("20")],
            PROFIT => [Some("50"), Some("-10"), Some("5"), Some("x"), Some("12")],
        ]
        .unwrap()
    }

    fn fixed_time() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-06-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_step_order() {
        let transformer = Transformer::new(&PipelineConfig::default());
        assert_eq!(
            transformer.step_names(),
            vec![
                "impute_missing",
                "deduplicate",
                "canonicalize_regions",
                "flag_losses",
                "correct_units_and_revenue",
                "normalize_categories",
                "coerce_numeric_types",
                "remove_outliers",
                "drop_non_positive_units",
                "stamp_metadata",
            ]
        );
    }

    #[test]
    fn test_full_transform() {
        let transformer = Transformer::with_run_timestamp(&PipelineConfig::default(), fixed_time());
        let (df, log) = transformer.transform(raw_frame()).unwrap();

        assert_eq!(log.len(), 10);
        assert_eq!(log.get("deduplicate").unwrap().rows_removed(), 1);
        assert_eq!(df.height(), 4);

        assert_eq!(
            column_strings(&df, REGION).unwrap(),
            vec![
                Some("Bangalore".to_string()),
                Some("Hyderabad".to_string()),
                Some("Mumbai".to_string()),
                Some("Pune".to_string()),
            ]
        );

        let units: Vec<Option<f64>> = df.column(UNITS_SOLD).unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(units[0], Some(5.0));

        let revenue: Vec<Option<f64>> = df.column(REVENUE).unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(revenue[0], Some(250.0));

        let loss: Vec<Option<bool>> = df.column(LOSS_FLAG).unwrap().bool().unwrap().into_iter().collect();
        assert_eq!(loss, vec![Some(false), Some(true), Some(false), Some(false)]);

        assert_eq!(df.column(ORDER_DATE).unwrap().dtype(), &DataType::Date);
        assert_eq!(
            column_strings(&df, ETL_TIMESTAMP).unwrap()[0].as_deref(),
            Some("2025-06-01 12:00:00.000000")
        );
        assert_eq!(
            column_strings(&df, ETL_VERSION).unwrap()[0].as_deref(),
            Some("2.0")
        );
    }

    #[test]
    fn test_unparsable_dates_fail_with_step_name() {
        let mut df = raw_frame();
        df.replace(
            ORDER_DATE,
            Series::new(ORDER_DATE.into(), vec!["junk"; 5]),
        )
        .unwrap();

        let err = Transformer::new(&PipelineConfig::default())
            .transform(df)
            .unwrap_err();
        assert_eq!(err.error_code(), "NO_VALID_VALUES");
        assert!(err.to_string().contains("impute_missing"));
    }

    #[test]
    fn test_transform_is_idempotent_for_duplicates_and_imputation() {
        let transformer = Transformer::new(&PipelineConfig::default());
        let (once, _) = transformer.transform(raw_frame()).unwrap();
        let (_, log) = transformer.transform(once).unwrap();

        assert_eq!(log.get("deduplicate").unwrap().rows_removed(), 0);
        assert_eq!(log.get("impute_missing").unwrap().total_count(), 0);
    }

    #[test]
    fn test_on_step_called_for_every_step() {
        let transformer = Transformer::new(&PipelineConfig::default());
        let mut seen = Vec::new();
        transformer
            .transform_with(raw_frame(), |index, record| seen.push((index, record.step.clone())))
            .unwrap();
        assert_eq!(seen.len(), 10);
        assert_eq!(seen[9], (9, "stamp_metadata".to_string()));
    }
}
