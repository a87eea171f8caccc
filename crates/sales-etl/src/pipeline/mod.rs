//! Pipeline module.
//!
//! The transformer with its ordered cleaning steps, the outlier handler it
//! uses, progress reporting, and the [`Pipeline`] runner tying the stages
//! together.

mod builder;
pub mod outliers;
pub mod progress;
pub mod steps;
mod transformer;

pub use builder::{Pipeline, PipelineBuilder, RunOutcome};
pub use outliers::{OutlierBounds, OutlierHandler};
pub use progress::{ClosureProgressReporter, EtlStage, ProgressReporter, ProgressUpdate};
pub use steps::TransformStep;
pub use transformer::{TIMESTAMP_FORMAT, Transformer};
