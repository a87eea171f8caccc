//! Progress reporting for the ETL pipeline.
//!
//! The pipeline pushes a [`ProgressUpdate`] at the start and end of every
//! stage and after every transformer step.
//!
//! # Example
//!
//! ```rust,ignore
//! use sales_etl::Pipeline;
//!
//! let outcome = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(&source, &sink)?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the ETL pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtlStage {
    /// Reading the raw dataset
    Extracting,
    /// Running the cleaning steps
    Transforming,
    /// Running the quality gate
    Validating,
    /// Persisting the cleaned dataset
    Loading,
    /// Building the run summary
    Reporting,
    /// Pipeline completed successfully
    Complete,
    /// Pipeline failed with an error
    Failed,
}

impl EtlStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Extracting => "Extracting Data",
            Self::Transforming => "Transforming Data",
            Self::Validating => "Validating Data",
            Self::Loading => "Loading Data",
            Self::Reporting => "Generating Summary",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run attributed to this stage (0.0 - 1.0).
    pub fn weight(&self) -> f32 {
        match self {
            Self::Extracting => 0.15,
            Self::Transforming => 0.55,
            Self::Validating => 0.10,
            Self::Loading => 0.15,
            Self::Reporting => 0.05,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    ///
    /// Summed from the earlier stages' weights in stage order, so the last
    /// update of one stage never exceeds the first update of the next.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Complete => 1.0,
            Self::Failed => 0.0,
            stage => Self::ORDERED
                .iter()
                .take_while(|s| *s != stage)
                .fold(0.0, |acc, s| acc + s.weight()),
        }
    }

    /// Working stages in execution order.
    pub const ORDERED: [EtlStage; 5] = [
        Self::Extracting,
        Self::Transforming,
        Self::Validating,
        Self::Loading,
        Self::Reporting,
    ];
}

/// Progress update pushed to a [`ProgressReporter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current pipeline stage
    pub stage: EtlStage,

    /// Optional sub-stage, e.g. the transformer step name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    /// Human-readable message describing current activity
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    /// Creates a new progress update for a stage without sub-stage info.
    pub fn new(stage: EtlStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Creates a progress update with item counts, e.g. step 3 of 10.
    pub fn with_items(
        stage: EtlStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage: Some(sub_stage.into()),
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: Some(current),
            items_total: Some(total),
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: EtlStage::Complete,
            sub_stage: None,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: EtlStage::Failed,
            sub_stage: None,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }
}

/// Trait for receiving progress updates during a run.
///
/// # Example
///
/// ```rust,ignore
/// use sales_etl::{ProgressReporter, ProgressUpdate};
///
/// struct StderrReporter;
///
/// impl ProgressReporter for StderrReporter {
///     fn report(&self, update: ProgressUpdate) {
///         eprintln!("{}: {}", update.stage.display_name(), update.message);
///     }
/// }
/// ```
pub trait ProgressReporter: Send + Sync {
    /// Called when progress is made. Implementations should be cheap and
    /// non-blocking.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(EtlStage::Validating, 0.5, "Validating...");
        assert_eq!(update.stage, EtlStage::Validating);
        assert!(update.sub_stage.is_none());
        assert_eq!(update.stage_progress, 0.5);
        assert!((update.progress - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_progress_update_with_items() {
        let update = ProgressUpdate::with_items(
            EtlStage::Transforming,
            "deduplicate",
            2,
            10,
            "Removed duplicate orders",
        );
        assert_eq!(update.sub_stage, Some("deduplicate".to_string()));
        assert!((update.stage_progress - 0.2).abs() < 1e-6);
        assert_eq!(update.items_processed, Some(2));
        assert_eq!(update.items_total, Some(10));
    }

    #[test]
    fn test_progress_update_complete() {
        let update = ProgressUpdate::complete("Done!");
        assert_eq!(update.stage, EtlStage::Complete);
        assert_eq!(update.progress, 1.0);
    }

    #[test]
    fn test_stage_weights_sum() {
        let stages = [
            EtlStage::Extracting,
            EtlStage::Transforming,
            EtlStage::Validating,
            EtlStage::Loading,
            EtlStage::Reporting,
        ];
        let total_weight: f32 = stages.iter().map(|s| s.weight()).sum();
        assert!((total_weight - 1.0).abs() < 0.01, "Weights should sum to ~1.0");

        for pair in stages.windows(2) {
            let expected = pair[0].base_progress() + pair[0].weight();
            assert!((pair[1].base_progress() - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stage_boundaries_are_monotonic() {
        for pair in EtlStage::ORDERED.windows(2) {
            let (current, next) = (pair[0], pair[1]);
            let last = ProgressUpdate::with_items(current, "step", 10, 10, "done").progress;
            let end = ProgressUpdate::new(current, 1.0, "done").progress;
            let start = ProgressUpdate::new(next, 0.0, "start").progress;
            assert!(last <= start, "{:?} ends at {} after {:?} starts at {}", current, last, next, start);
            assert!(end <= start);
        }
    }

    #[test]
    fn test_closure_progress_reporter() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(ProgressUpdate::new(EtlStage::Extracting, 0.0, "Test"));
        reporter.report(ProgressUpdate::complete("Done"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stage_json_values() {
        let stage_expectations = [
            (EtlStage::Extracting, "\"extracting\""),
            (EtlStage::Transforming, "\"transforming\""),
            (EtlStage::Validating, "\"validating\""),
            (EtlStage::Loading, "\"loading\""),
            (EtlStage::Reporting, "\"reporting\""),
            (EtlStage::Complete, "\"complete\""),
            (EtlStage::Failed, "\"failed\""),
        ];

        for (stage, expected_json) in stage_expectations {
            let json = serde_json::to_string(&stage).expect("Should serialize");
            assert_eq!(json, expected_json);
        }
    }
}
