use std::path::PathBuf;

use aideon_roomsync::config::EngineConfig;
use aideon_roomsync::metrics::Metrics;
use aideon_roomsync::model::{DetectedStructure, KeyChange, UnmatchedRoom};
use aideon_roomsync::optimize::ClusterStrategy;
use aideon_roomsync::pipeline::{self, AnalysisResult, AnalyzeOptions, Analyzer};
use aideon_roomsync::{Result, ToolError};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_tracing().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|error| ToolError::Logging(error.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze(args) => execute_analyze(args),
    }
}

fn execute_analyze(args: AnalyzeArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let mut options = AnalyzeOptions::from_config(&config);
    options.auto_detect_structure = !args.no_auto_detect;
    options.header_row = args.header_row;
    if args.strict_types {
        options.cluster_strategy = ClusterStrategy::Exact;
    }

    let analyzer = Analyzer::new(&config);
    let result = pipeline::analyze_files(
        &analyzer,
        &args.heating,
        &args.ventilation,
        &args.output,
        &options,
    )?;

    let report = Report::new(Uuid::new_v4(), &args.output, &result);
    let json = serde_json::to_string_pretty(&report)?;
    match &args.report {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Merge heating and ventilation room schedules into one workbook."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge two room schedules and report room-type consolidation metrics.
    Analyze(AnalyzeArgs),
}

#[derive(clap::Args)]
struct AnalyzeArgs {
    /// Heating workbook (.xls, .xlsx, .xlsm, .xlsb).
    #[arg(long)]
    heating: PathBuf,

    /// Ventilation workbook (.xls, .xlsx, .xlsm, .xlsb).
    #[arg(long)]
    ventilation: PathBuf,

    /// Path of the merged workbook to write.
    #[arg(long)]
    output: PathBuf,

    /// Write the JSON report here instead of stdout.
    #[arg(long)]
    report: Option<PathBuf>,

    /// JSON engine configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Zero-based header row used for both workbooks, skipping detection.
    #[arg(long)]
    header_row: Option<usize>,

    /// Never consult assisted structure detection.
    #[arg(long)]
    no_auto_detect: bool,

    /// Only merge room types that are identical after normalisation.
    #[arg(long)]
    strict_types: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    analysis_id: Uuid,
    output: String,
    metrics: &'a Metrics,
    key_changes: &'a [KeyChange],
    unmatched_rooms: &'a [UnmatchedRoom],
    heating_structure: &'a DetectedStructure,
    ventilation_structure: &'a DetectedStructure,
}

impl<'a> Report<'a> {
    fn new(analysis_id: Uuid, output: &std::path::Path, result: &'a AnalysisResult) -> Self {
        Self {
            analysis_id,
            output: output.display().to_string(),
            metrics: &result.metrics,
            key_changes: &result.key_changes,
            unmatched_rooms: &result.unmatched,
            heating_structure: &result.heating_structure,
            ventilation_structure: &result.ventilation_structure,
        }
    }
}
