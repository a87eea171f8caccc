//! Record sources.
//!
//! A source produces the raw dataset the transformer works on. The CSV source
//! reads every column as text; typing is the transformer's job, so a stray
//! `"abc"` in a numeric column cannot fail the read.

use crate::columns::REQUIRED_INPUT_COLUMNS;
use crate::error::{EtlError, Result};
use polars::io::csv::read::{CsvParseOptions, CsvReadOptions, NullValues};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Cell values read as missing in addition to empty cells.
pub const MISSING_VALUE_TOKENS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Anything that can produce the raw sales dataset.
pub trait RecordSource {
    /// Read the whole dataset into memory.
    fn extract(&self) -> Result<DataFrame>;

    /// Short description for logs and reports.
    fn describe(&self) -> String;
}

/// Reads the raw dataset from a CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<DataFrame> {
        let path_str = self.path.display().to_string();

        if !self.path.exists() {
            return Err(EtlError::SourceNotFound(path_str));
        }
        if std::fs::metadata(&self.path)?.len() == 0 {
            return Err(EtlError::EmptySource(path_str));
        }

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_parse_options(
                CsvParseOptions::default()
                    .with_quote_char(Some(b'"'))
                    .with_missing_is_null(true)
                    .with_null_values(Some(NullValues::AllColumns(
                        MISSING_VALUE_TOKENS.iter().map(|t| (*t).into()).collect(),
                    ))),
            )
            .try_into_reader_with_file_path(Some(self.path.clone()))
            .and_then(|reader| reader.finish())
            .map_err(|e| EtlError::SourceUnreadable {
                path: path_str.clone(),
                reason: e.to_string(),
            })?;

        if df.height() == 0 {
            return Err(EtlError::EmptySource(path_str));
        }

        check_required_columns(&df)?;
        Ok(df)
    }
}

impl RecordSource for CsvSource {
    fn extract(&self) -> Result<DataFrame> {
        info!("Starting data extraction from: {}", self.path.display());

        match self.read() {
            Ok(df) => {
                log_extracted(&df);
                Ok(df)
            }
            Err(e) => {
                error!("Extraction failed: {}", e);
                Err(e)
            }
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// An in-memory dataset, used when the caller already holds the frame.
impl RecordSource for DataFrame {
    fn extract(&self) -> Result<DataFrame> {
        if self.height() == 0 {
            return Err(EtlError::EmptySource("<in-memory>".to_string()));
        }
        check_required_columns(self)?;
        log_extracted(self);
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        "<in-memory>".to_string()
    }
}

/// Fail with [`EtlError::MissingColumns`] listing every absent column.
pub fn check_required_columns(df: &DataFrame) -> Result<()> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let missing: Vec<String> = REQUIRED_INPUT_COLUMNS
        .iter()
        .filter(|col| !present.iter().any(|p| p == *col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(EtlError::MissingColumns(missing))
    }
}

fn log_extracted(df: &DataFrame) {
    info!("Successfully extracted {} records", df.height());
    info!("   Columns: {:?}", df.get_column_names());
    info!(
        "   Estimated size: {:.2} MB",
        df.estimated_size() as f64 / (1024.0 * 1024.0)
    );
    debug!("Raw schema: {:?}", df.schema());
}
