//! Error types for the ETL pipeline.
//!
//! Every failure is fatal for the run. Errors are grouped into the four
//! pipeline stages (plus configuration) so callers can tell a bad input file
//! from a data anomaly inside a step, a quality-gate rejection, or a failed
//! write.

use crate::quality::ValidationReport;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// Pipeline stage an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid pipeline configuration.
    Config,
    /// Missing, unreadable or empty input.
    Source,
    /// A cleaning step could not be applied.
    Transformation,
    /// The quality gate rejected the cleaned batch.
    Validation,
    /// The cleaned batch could not be persisted.
    Sink,
}

/// The main error type for the ETL pipeline.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] crate::config::ConfigValidationError),

    /// Input file does not exist.
    #[error("Input file not found: {0}")]
    SourceNotFound(String),

    /// Input file exists but holds no records.
    #[error("Input file is empty: {0}")]
    EmptySource(String),

    /// Input file lacks columns the pipeline requires.
    #[error("Input is missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    /// Input file could not be parsed as CSV.
    #[error("Failed to read '{path}': {reason}")]
    SourceUnreadable { path: String, reason: String },

    /// A column required by a step was not present.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// A statistic (mode, median) is undefined because no value is usable.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// A cleaning step failed.
    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: &'static str,
        #[source]
        source: Box<EtlError>,
    },

    /// The quality gate rejected the batch.
    #[error("Data quality validation failed: {0}")]
    Validation(ValidationReport),

    /// Writing the cleaned dataset failed.
    #[error("Failed to write '{path}': {reason}")]
    SinkFailed { path: String, reason: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EtlError>,
    },
}

impl EtlError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EtlError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap an error raised inside a transformer step.
    pub fn in_step(self, step: &'static str) -> Self {
        EtlError::StepFailed {
            step,
            source: Box::new(self),
        }
    }

    /// Stage of the pipeline this error belongs to.
    ///
    /// Wrapper errors (`Polars`, `Io`, `Json`) raised outside a step are
    /// attributed to the source boundary; inside a step they are wrapped in
    /// [`EtlError::StepFailed`] and become transformation errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::Config,
            Self::SourceNotFound(_)
            | Self::EmptySource(_)
            | Self::MissingColumns(_)
            | Self::SourceUnreadable { .. } => ErrorKind::Source,
            Self::ColumnNotFound(_) | Self::NoValidValues(_) | Self::StepFailed { .. } => {
                ErrorKind::Transformation
            }
            Self::Validation(_) => ErrorKind::Validation,
            Self::SinkFailed { .. } => ErrorKind::Sink,
            Self::Io(_) | Self::Polars(_) | Self::Json(_) => ErrorKind::Source,
            Self::WithContext { source, .. } => source.kind(),
        }
    }

    /// Get a stable error code for machine consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            Self::EmptySource(_) => "EMPTY_SOURCE",
            Self::MissingColumns(_) => "MISSING_COLUMNS",
            Self::SourceUnreadable { .. } => "SOURCE_UNREADABLE",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::StepFailed { source, .. } => source.error_code(),
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::SinkFailed { .. } => "SINK_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The validation report, if this is a quality-gate rejection.
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Validation(report) => Some(report),
            Self::WithContext { source, .. } => source.validation_report(),
            _ => None,
        }
    }
}

/// Errors are serialized as a struct with `code`, `kind` and `message` fields.
impl Serialize for EtlError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EtlError", 3)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, EtlError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EtlError::Polars(e).with_context(context))
    }
}
