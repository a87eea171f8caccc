//! Sales Transaction ETL Library
//!
//! A batch pipeline that turns a raw, messy sales-transaction CSV into a
//! cleaned, validated dataset, built with Rust and Polars.
//!
//! # Overview
//!
//! A run moves the dataset through four stages, strictly in order:
//!
//! - **Source**: reads the raw CSV (every column as text) and checks that
//!   the input exists, is non-empty and has the required columns
//! - **Transformer**: ten ordered cleaning steps (imputation, duplicate
//!   removal, region canonicalization, loss flagging, unit and revenue
//!   correction, label normalization, numeric coercion, IQR outlier removal,
//!   non-positive unit removal, metadata stamping)
//! - **Validator**: the quality gate; every check must pass before the data
//!   may be persisted
//! - **Sink**: writes the validated dataset as CSV, atomically
//!
//! Any failure aborts the run and no output is written.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sales_etl::{CsvSink, CsvSource, Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .outlier_multiplier(1.5)
//!     .region_alias("bombay", "Mumbai")
//!     .build()?;
//!
//! let outcome = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(&CsvSource::new("sales_raw.csv"), &CsvSink::new("sales_clean.csv"))?;
//!
//! outcome.summary.log();
//! ```
//!
//! # Working in memory
//!
//! [`Pipeline::process`] transforms and validates a `DataFrame` without
//! touching the filesystem. The [`Transformer`] and [`Validator`] can also be
//! used on their own:
//!
//! ```rust,ignore
//! use sales_etl::{PipelineConfig, Transformer, Validator};
//!
//! let config = PipelineConfig::default();
//! let (cleaned, steps) = Transformer::new(&config).transform(raw_df)?;
//! let validated = Validator::new(&config).validate(cleaned)?;
//! ```

pub mod cleaner;
pub mod columns;
pub mod config;
pub mod error;
pub mod imputers;
pub mod pipeline;
pub mod quality;
pub mod reporting;
pub mod source;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::DataCleaner;
pub use config::{ConfigValidationError, PipelineConfig, PipelineConfigBuilder};
pub use error::{ErrorKind, EtlError, Result, ResultExt};
pub use imputers::{ImputeOutcome, StatisticalImputer};
pub use pipeline::{
    ClosureProgressReporter, EtlStage, OutlierBounds, OutlierHandler, Pipeline, PipelineBuilder,
    ProgressReporter, ProgressUpdate, RunOutcome, TIMESTAMP_FORMAT, TransformStep, Transformer,
};
pub use quality::{CheckResult, QualityCheck, ValidatedFrame, ValidationReport, Validator};
pub use reporting::{
    CategoryShare, CsvSink, EtlReport, LoadOutcome, RecordSink, ReportGenerator, ReportParams,
    RunSummary,
};
pub use source::{CsvSource, RecordSource};
pub use types::{StepLog, StepRecord, StepStats};
