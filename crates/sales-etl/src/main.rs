//! CLI entry point for the sales ETL pipeline.

use anyhow::{Result, anyhow};
use clap::Parser;
use sales_etl::{
    CsvSink, CsvSource, EtlError, Pipeline, PipelineConfig, ReportGenerator, ReportParams,
    RunOutcome,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Sales transaction ETL pipeline",
    long_about = "Cleans a raw sales-transaction CSV, validates it against the quality gate, \
                  and writes the cleaned dataset.\n\n\
                  EXAMPLES:\n  \
                  # Default configuration\n  \
                  sales-etl -i sales_raw.csv -o sales_clean.csv\n\n  \
                  # Custom configuration and a JSON run report\n  \
                  sales-etl -i sales_raw.csv -o out/clean.csv --config etl.json --emit-report\n\n  \
                  # Machine-readable output only\n  \
                  sales-etl -i sales_raw.csv --json | jq .summary"
)]
struct Args {
    /// Path to the raw CSV file
    #[arg(short, long)]
    input: String,

    /// Path of the cleaned CSV file to write
    #[arg(short, long, default_value = "sales_clean.csv")]
    output: String,

    /// JSON configuration file (regions, aliases, outlier multiplier, version)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the IQR outlier multiplier from the configuration
    #[arg(long)]
    outlier_multiplier: Option<f64>,

    /// Append-only log file
    #[arg(long, default_value = "etl_pipeline.log")]
    log_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable logs
    ///
    /// Disables all logging; only the final JSON report (or error) is printed.
    #[arg(long)]
    json: bool,

    /// Write a JSON run report next to the output file
    ///
    /// The report will be saved as <output_name>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,
}

/// Initialize the tracing subscriber: console plus the append-only log file.
///
/// When `json_output` is true, logging is completely disabled so stdout only
/// carries JSON. The returned guard must live until the program exits.
fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    if args.json {
        return Ok(None);
    }

    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let effective_level = if args.quiet { "warn" } else { args.log_level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    let log_path = Path::new(&args.log_file);
    let log_dir = match log_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let log_name = log_path
        .file_name()
        .ok_or_else(|| anyhow!("Invalid log file path: {}", args.log_file))?;
    std::fs::create_dir_all(&log_dir)?;

    // `never` appends to a single file without rotation
    let file_appender = tracing_appender::rolling::never(&log_dir, log_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(false);
    let console_layer = fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(Some(guard))
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };

    if let Some(k) = args.outlier_multiplier {
        config.outlier_multiplier = k;
        config.validate()?;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(&args)?;

    let started = Instant::now();
    info!("{}", "=".repeat(80));
    info!("STARTING ETL PIPELINE");
    info!("{}", "=".repeat(80));
    info!("Input: {}", args.input);
    info!("Output: {}", args.output);

    let result = load_config(&args).and_then(|config| run_pipeline(&args, config));

    match &result {
        Ok(()) => {
            info!("{}", "=".repeat(80));
            info!(
                "ETL PIPELINE COMPLETED SUCCESSFULLY in {:.2}s",
                started.elapsed().as_secs_f64()
            );
            info!("{}", "=".repeat(80));
        }
        Err(e) => {
            error!("{}", "=".repeat(80));
            error!("ETL PIPELINE FAILED: {}", e);
            error!("{}", "=".repeat(80));
        }
    }
    result
}

/// Run the pipeline and handle its output.
///
/// Output behavior:
/// - Default: run summary logged at info level
/// - `--json`: report (or error) printed as JSON to stdout only
/// - `--emit-report`: report also written to `<output_name>_report.json`
fn run_pipeline(args: &Args, config: PipelineConfig) -> Result<()> {
    let mut builder = Pipeline::builder().config(config.clone());
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let pipeline = builder.build()?;

    let source = CsvSource::new(&args.input);
    let sink = CsvSink::new(&args.output);

    match pipeline.run(&source, &sink) {
        Ok(outcome) => handle_pipeline_output(args, &config, &outcome),
        Err(e) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&e)?);
            }
            log_failure(&e);
            Err(anyhow!("Pipeline failed [{}]: {}", e.error_code(), e))
        }
    }
}

fn handle_pipeline_output(args: &Args, config: &PipelineConfig, outcome: &RunOutcome) -> Result<()> {
    let report = ReportGenerator::build_report(ReportParams {
        input_file: &args.input,
        duration_ms: outcome.duration_ms,
        config,
        summary: &outcome.summary,
        steps: &outcome.steps,
        validation: &outcome.validation,
        load: &outcome.load,
    });

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        outcome.summary.log();
    }

    if args.emit_report {
        let report_path = ReportGenerator::report_path_for(Path::new(&args.output));
        ReportGenerator::write_report_to_file(&report, &report_path)?;
    }
    Ok(())
}

fn log_failure(e: &EtlError) {
    error!("Error kind: {:?}, code: {}", e.kind(), e.error_code());
    if let Some(report) = e.validation_report() {
        for failure in report.failures() {
            error!("   {}: {}", failure.check, failure.detail);
        }
    }
}
