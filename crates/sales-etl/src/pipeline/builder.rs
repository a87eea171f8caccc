//! The pipeline runner.
//!
//! Wires Source → Transformer → Validator → Sink for one run. Stages run
//! strictly in sequence; the first failure aborts the run and nothing is
//! written.

use crate::config::{ConfigValidationError, PipelineConfig};
use crate::error::Result;
use crate::pipeline::progress::{
    ClosureProgressReporter, EtlStage, ProgressReporter, ProgressUpdate,
};
use crate::pipeline::transformer::Transformer;
use crate::quality::{ValidatedFrame, ValidationReport, Validator};
use crate::reporting::{LoadOutcome, RecordSink, RunSummary};
use crate::source::RecordSource;
use crate::types::StepLog;
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Everything a successful run produced, apart from the written file itself.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub steps: StepLog,
    pub validation: ValidationReport,
    pub load: LoadOutcome,
    pub duration_ms: u64,
}

/// The ETL pipeline.
///
/// Use [`Pipeline::builder()`] to create one.
///
/// # Example
///
/// ```rust,ignore
/// use sales_etl::{CsvSink, CsvSource, Pipeline, PipelineConfig};
///
/// let outcome = Pipeline::builder()
///     .config(PipelineConfig::builder().outlier_multiplier(3.0).build()?)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run(&CsvSource::new("raw.csv"), &CsvSink::new("clean.csv"))?;
///
/// outcome.summary.log();
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline: extract, transform, validate, load, summarize.
    pub fn run(&self, source: &dyn RecordSource, sink: &dyn RecordSink) -> Result<RunOutcome> {
        match self.run_internal(source, sink) {
            Ok(outcome) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(outcome)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Transform and validate an in-memory dataset without loading it.
    ///
    /// A fresh transformer is built per call, so every call gets its own run
    /// timestamp and step log.
    pub fn process(&self, df: DataFrame) -> Result<(ValidatedFrame, StepLog)> {
        let (cleaned, steps) = self.transform(df)?;
        let validated = self.validate(cleaned)?;
        Ok((validated, steps))
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self, source: &dyn RecordSource, sink: &dyn RecordSink) -> Result<RunOutcome> {
        let start_time = Instant::now();

        // Extract
        self.report_progress(ProgressUpdate::new(
            EtlStage::Extracting,
            0.0,
            format!("Reading {}", source.describe()),
        ));
        let raw = source.extract()?;
        let records_extracted = raw.height();
        self.report_progress(ProgressUpdate::new(
            EtlStage::Extracting,
            1.0,
            format!("Extracted {} records", records_extracted),
        ));

        // Transform + validate
        let (validated, steps) = self.process(raw)?;

        // Load
        self.report_progress(ProgressUpdate::new(
            EtlStage::Loading,
            0.0,
            format!("Writing {}", sink.describe()),
        ));
        let load = sink.load(&validated)?;
        self.report_progress(ProgressUpdate::new(
            EtlStage::Loading,
            1.0,
            format!("Wrote {} records", load.rows_written),
        ));

        // Summarize
        self.report_progress(ProgressUpdate::new(
            EtlStage::Reporting,
            0.0,
            "Building run summary",
        ));
        let summary = RunSummary::from_frame(records_extracted, validated.dataframe())?;
        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!("Pipeline finished in {} ms", duration_ms);

        Ok(RunOutcome {
            summary,
            steps,
            validation: validated.report().clone(),
            load,
            duration_ms,
        })
    }

    fn transform(&self, df: DataFrame) -> Result<(DataFrame, StepLog)> {
        let transformer = Transformer::new(&self.config);
        let total = transformer.len();

        self.report_progress(ProgressUpdate::new(
            EtlStage::Transforming,
            0.0,
            format!("Running {} cleaning steps", total),
        ));

        transformer.transform_with(df, |index, record| {
            self.report_progress(ProgressUpdate::with_items(
                EtlStage::Transforming,
                record.step.clone(),
                index + 1,
                total,
                record.stats.message.clone(),
            ));
        })
    }

    fn validate(&self, df: DataFrame) -> Result<ValidatedFrame> {
        self.report_progress(ProgressUpdate::new(
            EtlStage::Validating,
            0.0,
            "Running quality checks",
        ));
        let validated = Validator::new(&self.config).validate(df)?;
        self.report_progress(ProgressUpdate::new(
            EtlStage::Validating,
            1.0,
            "All quality checks passed",
        ));
        Ok(validated)
    }
}

/// Builder for creating a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during a run.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// Convenience over [`progress_reporter`](Self::progress_reporter) for
    /// simple handlers.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::*;
    use crate::error::EtlError;
    use crate::reporting::CsvSink;
    use std::sync::Mutex;

    fn raw_frame() -> DataFrame {
        df![
            ORDER_ID => ["A", "B", "B", "C"],
            ORDER_DATE => [Some("2024-01-05"), Some("2024/01/06"), Some("2024/01/06"), None],
            REGION => ["bengaluru", "Hyd", "Hyd", "Mumbai"],
            PRODUCT_LINE => ["running", "Training", "Training", "Lifestyle"],
            GENDER_CATEGORY => ["men", "women", "women", "unisex"],
            SIZE => [Some("M"), Some("L"), Some("L"), None],
            UNITS_SOLD => ["-2", "3", "3", "1"],
            MRP => ["100", "120", "120", "110"],
            DISCOUNT_APPLIED => ["0", "10", "10", "5"],
            PROFIT => ["20", "-5", "-5", "12"],
        ]
        .unwrap()
    }

    /// Sink that records whether it was called.
    struct RecordingSink {
        calls: Mutex<usize>,
    }

    impl RecordSink for RecordingSink {
        fn load(&self, frame: &ValidatedFrame) -> Result<LoadOutcome> {
            *self.calls.lock().unwrap() += 1;
            Ok(LoadOutcome {
                destination: "memory".to_string(),
                rows_written: frame.height(),
                bytes_written: 0,
            })
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    #[test]
    fn test_pipeline_builder_default() {
        let pipeline = Pipeline::builder().build().unwrap();
        assert_eq!(pipeline.config().outlier_multiplier, 1.5);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = PipelineConfig {
            outlier_multiplier: -1.0,
            ..PipelineConfig::default()
        };
        assert!(Pipeline::builder().config(config).build().is_err());
    }

    #[test]
    fn test_process_in_memory() {
        let pipeline = Pipeline::builder().build().unwrap();
        let (validated, steps) = pipeline.process(raw_frame()).unwrap();

        assert_eq!(validated.height(), 3);
        assert_eq!(steps.len(), 10);
        assert!(validated.report().passed());
    }

    #[test]
    fn test_run_reports_progress_for_every_step() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink_updates = updates.clone();

        let pipeline = Pipeline::builder()
            .on_progress(move |update| sink_updates.lock().unwrap().push(update))
            .build()
            .unwrap();

        let sink = RecordingSink { calls: Mutex::new(0) };
        let outcome = pipeline.run(&raw_frame(), &sink).unwrap();

        assert_eq!(*sink.calls.lock().unwrap(), 1);
        assert_eq!(outcome.summary.records_extracted, 4);
        assert_eq!(outcome.summary.records_loaded, 3);
        assert_eq!(outcome.load.rows_written, 3);

        let updates = updates.lock().unwrap();
        let step_updates = updates
            .iter()
            .filter(|u| u.stage == EtlStage::Transforming && u.sub_stage.is_some())
            .count();
        assert_eq!(step_updates, 10);
        assert_eq!(updates.last().unwrap().stage, EtlStage::Complete);

        let progress: Vec<f32> = updates.iter().map(|u| u.progress).collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_validation_failure_skips_sink() {
        let config = PipelineConfig::builder()
            .valid_regions(vec!["Pune".to_string()])
            .region_aliases(Default::default())
            .build()
            .unwrap();
        let failed = Arc::new(Mutex::new(false));
        let failed_flag = failed.clone();

        let pipeline = Pipeline::builder()
            .config(config)
            .on_progress(move |update| {
                if update.stage == EtlStage::Failed {
                    *failed_flag.lock().unwrap() = true;
                }
            })
            .build()
            .unwrap();

        let sink = RecordingSink { calls: Mutex::new(0) };
        let err = pipeline.run(&raw_frame(), &sink).unwrap_err();

        assert!(matches!(err, EtlError::Validation(_)));
        assert!(err.validation_report().unwrap().failed_checks().len() >= 1);
        assert_eq!(*sink.calls.lock().unwrap(), 0);
        assert!(*failed.lock().unwrap());
    }

    #[test]
    fn test_run_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.csv");

        let outcome = Pipeline::builder()
            .build()
            .unwrap()
            .run(&raw_frame(), &CsvSink::new(&path))
            .unwrap();

        assert!(path.exists());
        assert_eq!(outcome.load.rows_written, 3);
        assert!(outcome.duration_ms < 60_000);
    }
}
