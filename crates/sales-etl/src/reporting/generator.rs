use crate::columns::{PRODUCT_LINE, PROFIT, REGION, REVENUE};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::quality::ValidationReport;
use crate::reporting::LoadOutcome;
use crate::types::StepLog;
use crate::utils::{column_numbers, column_strings};
use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

// ============================================================================
// Run Summary
// ============================================================================

/// Count and share of one category value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub value: String,
    pub count: usize,
    /// Percentage of loaded records.
    pub percentage: f64,
}

/// Aggregate statistics of one run, computed on the cleaned dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub records_extracted: usize,
    pub records_loaded: usize,
    pub records_removed: usize,
    /// Percentage of extracted records that were removed.
    pub removal_rate: f64,

    pub total_revenue: f64,
    pub total_profit: f64,
    /// `total_profit / total_revenue * 100`; `None` when revenue is zero.
    pub avg_profit_margin: Option<f64>,
    pub loss_transactions: usize,
    /// Percentage of loaded records with negative profit.
    pub loss_rate: f64,

    /// Sorted by count, descending.
    pub region_distribution: Vec<CategoryShare>,
    /// Sorted by count, descending.
    pub product_line_distribution: Vec<CategoryShare>,
}

impl RunSummary {
    /// Build the summary from the extracted row count and the cleaned dataset.
    pub fn from_frame(records_extracted: usize, cleaned: &DataFrame) -> Result<Self> {
        let records_loaded = cleaned.height();
        let records_removed = records_extracted.saturating_sub(records_loaded);

        let revenue = column_numbers(cleaned, REVENUE)?;
        let profit = column_numbers(cleaned, PROFIT)?;

        let total_revenue: f64 = revenue.iter().flatten().sum();
        let total_profit: f64 = profit.iter().flatten().sum();
        let loss_transactions = profit.iter().flatten().filter(|p| **p < 0.0).count();

        let avg_profit_margin = if total_revenue != 0.0 {
            Some(total_profit / total_revenue * 100.0)
        } else {
            None
        };

        Ok(Self {
            records_extracted,
            records_loaded,
            records_removed,
            removal_rate: percentage(records_removed, records_extracted),
            total_revenue,
            total_profit,
            avg_profit_margin,
            loss_transactions,
            loss_rate: percentage(loss_transactions, records_loaded),
            region_distribution: distribution(cleaned, REGION)?,
            product_line_distribution: distribution(cleaned, PRODUCT_LINE)?,
        })
    }

    /// Write the summary to the log at info level.
    pub fn log(&self) {
        info!("{}", "=".repeat(70));
        info!("ETL PIPELINE SUMMARY REPORT");
        info!("{}", "=".repeat(70));

        info!("Data Processing Metrics:");
        info!("   Records Extracted: {}", self.records_extracted);
        info!("   Records Loaded: {}", self.records_loaded);
        info!(
            "   Records Removed: {} ({:.2}%)",
            self.records_removed, self.removal_rate
        );

        info!("Business Metrics:");
        info!("   Total Revenue: {:.2}", self.total_revenue);
        info!("   Total Profit: {:.2}", self.total_profit);
        match self.avg_profit_margin {
            Some(margin) => info!("   Avg Profit Margin: {:.2}%", margin),
            None => info!("   Avg Profit Margin: n/a (no revenue)"),
        }
        info!(
            "   Loss Transactions: {} ({:.2}%)",
            self.loss_transactions, self.loss_rate
        );

        info!("Regional Distribution:");
        for share in &self.region_distribution {
            info!("   {}: {} ({:.1}%)", share.value, share.count, share.percentage);
        }

        info!("Product Line Distribution:");
        for share in &self.product_line_distribution {
            info!("   {}: {} ({:.1}%)", share.value, share.count, share.percentage);
        }
        info!("{}", "=".repeat(70));
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn distribution(df: &DataFrame, col: &str) -> Result<Vec<CategoryShare>> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in column_strings(df, col)?.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }

    let total = df.height();
    let mut shares: Vec<CategoryShare> = counts
        .into_iter()
        .map(|(value, count)| CategoryShare {
            value,
            count,
            percentage: percentage(count, total),
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    Ok(shares)
}

// ============================================================================
// JSON Report
// ============================================================================

/// Everything known about one successful run, for `--json` and
/// `--emit-report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    pub input_file: String,
    pub output_file: String,
    pub duration_ms: u64,
    pub config: PipelineConfig,
    pub summary: RunSummary,
    pub steps: StepLog,
    pub validation: ValidationReport,
    pub load: LoadOutcome,
}

/// Parts a report is assembled from.
pub struct ReportParams<'a> {
    pub input_file: &'a str,
    pub duration_ms: u64,
    pub config: &'a PipelineConfig,
    pub summary: &'a RunSummary,
    pub steps: &'a StepLog,
    pub validation: &'a ValidationReport,
    pub load: &'a LoadOutcome,
}

/// Builds and writes run reports.
pub struct ReportGenerator;

impl ReportGenerator {
    pub fn build_report(params: ReportParams<'_>) -> EtlReport {
        EtlReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_file: params.input_file.to_string(),
            output_file: params.load.destination.clone(),
            duration_ms: params.duration_ms,
            config: params.config.clone(),
            summary: params.summary.clone(),
            steps: params.steps.clone(),
            validation: params.validation.clone(),
            load: params.load.clone(),
        }
    }

    /// Report path for a given output file: `<dir>/<stem>_report.json`.
    pub fn report_path_for(output_file: &Path) -> PathBuf {
        let stem = output_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        output_file.with_file_name(format!("{}_report.json", stem))
    }

    pub fn write_report_to_file(report: &EtlReport, report_path: &Path) -> Result<PathBuf> {
        if let Some(parent) = report_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(report_path)?;
        file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;

        info!("Report saved: {}", report_path.display());
        Ok(report_path.to_path_buf())
    }
}
