//! Loading and reporting.
//!
//! [`CsvSink`] persists a [`ValidatedFrame`](crate::quality::ValidatedFrame);
//! [`RunSummary`] and [`EtlReport`] describe a finished run for the log, for
//! stdout (`--json`) and for the report file (`--emit-report`).

mod generator;
mod sink;

pub use generator::{CategoryShare, EtlReport, ReportGenerator, ReportParams, RunSummary};
pub use sink::{CsvSink, LoadOutcome, RecordSink};
