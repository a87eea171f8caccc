//! Persisting the validated dataset.

use crate::error::{EtlError, Result};
use crate::quality::ValidatedFrame;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// What a sink wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub destination: String,
    pub rows_written: usize,
    pub bytes_written: u64,
}

/// Anything that can persist a validated dataset.
pub trait RecordSink {
    fn load(&self, frame: &ValidatedFrame) -> Result<LoadOutcome>;

    fn describe(&self) -> String;
}

/// Writes the dataset as CSV with a header row.
///
/// Rows go to a hidden temporary file next to the target which is renamed
/// over the target once complete, so a failed write never leaves a partial
/// file behind.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "output.csv".to_string());
        self.path.with_file_name(format!(".{}.tmp", file_name))
    }

    fn sink_error(&self, reason: impl ToString) -> EtlError {
        EtlError::SinkFailed {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    fn write_atomically(&self, frame: &ValidatedFrame) -> Result<u64> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.sink_error(e))?;
        }

        let temp_path = self.temp_path();
        if let Err(e) = write_csv(frame, &temp_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(self.sink_error(e));
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(self.sink_error(e));
        }

        Ok(fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0))
    }
}

fn write_csv(frame: &ValidatedFrame, path: &Path) -> Result<()> {
    // cheap: columns are reference counted
    let mut df = frame.dataframe().clone();
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(&mut df)?;
    file.sync_all()?;
    Ok(())
}

impl RecordSink for CsvSink {
    fn load(&self, frame: &ValidatedFrame) -> Result<LoadOutcome> {
        info!("Loading data to CSV: {}", self.path.display());

        match self.write_atomically(frame) {
            Ok(bytes) => {
                info!(
                    "Saved {} records to CSV ({:.2} KB)",
                    frame.height(),
                    bytes as f64 / 1024.0
                );
                Ok(LoadOutcome {
                    destination: self.path.display().to_string(),
                    rows_written: frame.height(),
                    bytes_written: bytes,
                })
            }
            Err(e) => {
                error!("Load failed: {}", e);
                Err(e)
            }
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::*;
    use crate::config::PipelineConfig;
    use crate::quality::Validator;

    fn validated() -> ValidatedFrame {
        let df = df![
            ORDER_ID => ["A"],
            ORDER_DATE => ["2024-01-01"],
            REGION => ["Pune"],
            PRODUCT_LINE => ["Running"],
            UNITS_SOLD => [2.0],
            MRP => [10.0],
            DISCOUNT_APPLIED => [0.0],
            REVENUE => [20.0],
        ]
        .unwrap();
        Validator::new(&PipelineConfig::default()).validate(df).unwrap()
    }

    #[test]
    fn test_writes_csv_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clean.csv");

        let outcome = CsvSink::new(&path).load(&validated()).unwrap();
        assert_eq!(outcome.rows_written, 1);
        assert!(outcome.bytes_written > 0);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Order_ID,Order_Date,Region"));
        assert!(content.contains("Pune"));
        assert!(!dir.path().join("nested").join(".clean.csv.tmp").exists());
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.csv");
        fs::write(&path, "stale").unwrap();

        CsvSink::new(&path).load(&validated()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("stale"));
    }

    #[test]
    fn test_unwritable_destination_is_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be replaced by the temp file rename
        let path = dir.path().join("taken");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep.txt"), "x").unwrap();

        let err = CsvSink::new(&path).load(&validated()).unwrap_err();
        assert_eq!(err.error_code(), "SINK_FAILED");
        assert!(path.join("keep.txt").exists());
    }
}
