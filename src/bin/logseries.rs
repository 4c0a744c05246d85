//! logseries CLI - Command-line interface for the event-log series pipeline
//!
//! Commands:
//! - export: Build the behavior series bundle for causality analysis
//! - segment: Per-behavior delta-time summaries (descriptive analysis)
//! - validate: Check an event log against the canonical schema
//! - schema: Print the canonical schema and default rename mapping
//!
//! Set RUST_LOG to control log output, e.g. `RUST_LOG=logseries=debug`.

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use logseries::aggregator::rank_behaviors;
use logseries::behavior::JsonSink;
use logseries::schema::{BEHAVIOR, REQUIRED_COLUMNS};
use logseries::{
    BundleEncoder, CsvSource, EventTable, Granularity, JsonFormat, JsonSource, Normalizer,
    PipelineConfig, PipelineError, SchemaMapping, SeriesProcessor, TimestampPolicy,
    PRODUCER_NAME, VERSION,
};

/// logseries - Event-log to behavior time-series pipeline
#[derive(Parser)]
#[command(name = "logseries")]
#[command(version = VERSION)]
#[command(about = "Turn process event logs into behavior time series", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct InputArgs {
    /// Input file path (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Input format
    #[arg(long, default_value = "csv")]
    input_format: InputFormat,

    /// Pipeline configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drop rows with unparseable timestamps instead of failing
    #[arg(long)]
    lenient: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the behavior series bundle
    Export {
        #[command(flatten)]
        input: InputArgs,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "csv")]
        output_format: OutputFormat,

        /// Number of most frequent behaviors to keep
        #[arg(long)]
        top_k: Option<usize>,

        /// Calendar bucket size
        #[arg(long)]
        granularity: Option<Granularity>,

        /// Series name prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Behavior column name
        #[arg(long)]
        behavior_column: Option<String>,
    },

    /// Summarize per-case delta times of one or more behaviors
    Segment {
        #[command(flatten)]
        input: InputArgs,

        /// Behavior label (repeatable)
        #[arg(short, long, required = true)]
        behavior: Vec<String>,

        /// Calendar bucket size for the summary
        #[arg(long, default_value = "day")]
        time_unit: Granularity,

        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate an event log against the canonical schema
    Validate {
        #[command(flatten)]
        input: InputArgs,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the canonical schema and default rename mapping
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// Delimited text with a header row
    Csv,
    /// JSON array of records
    Json,
    /// Newline-delimited JSON (one record per line)
    Ndjson,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One row per period, one column per behavior
    Csv,
    /// Pretty-printed JSON document
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliFailure> {
    match cli.command {
        Commands::Export {
            input,
            output,
            output_format,
            top_k,
            granularity,
            prefix,
            behavior_column,
        } => {
            let mut config = load_config(&input)?;
            if let Some(top_k) = top_k {
                config.series.top_k = top_k;
            }
            if let Some(granularity) = granularity {
                config.series.granularity = granularity;
            }
            if let Some(prefix) = prefix {
                config.series.prefix = prefix;
            }
            if let Some(column) = behavior_column {
                config.segment.behavior_column = column.clone();
                config.series.behavior_column = column;
            }
            cmd_export(&input, config, &output, output_format)
        }

        Commands::Segment {
            input,
            behavior,
            time_unit,
            output,
        } => {
            let config = load_config(&input)?;
            cmd_segment(&input, config, &behavior, time_unit, output.as_deref())
        }

        Commands::Validate { input, json } => {
            let config = load_config(&input)?;
            cmd_validate(&input, config, json)
        }

        Commands::Schema { json } => cmd_schema(json),
    }
}

fn cmd_export(
    input: &InputArgs,
    config: PipelineConfig,
    output: &Path,
    output_format: OutputFormat,
) -> Result<(), CliFailure> {
    let raw = read_input(input)?;
    let processor = SeriesProcessor::new(config);
    let normalized = processor.normalize(&raw)?;
    let bundle = processor.build_series(&normalized)?;

    if bundle.is_empty() {
        warn!("event log is empty, writing an empty bundle");
    }

    let encoder = BundleEncoder::new();
    let data = match output_format {
        OutputFormat::Csv => encoder.encode_csv(&bundle)?,
        OutputFormat::Json => encoder.encode_to_json(&bundle)? + "\n",
    };
    write_output(Some(output), &data)?;

    info!(
        periods = bundle.index.len(),
        series = bundle.series.len(),
        "exported behavior series"
    );
    Ok(())
}

fn cmd_segment(
    input: &InputArgs,
    config: PipelineConfig,
    behaviors: &[String],
    time_unit: Granularity,
    output: Option<&Path>,
) -> Result<(), CliFailure> {
    let raw = read_input(input)?;
    let processor = SeriesProcessor::new(config);
    let normalized = processor.normalize(&raw)?;

    let mut sink = JsonSink::new(Vec::new());
    for behavior in behaviors {
        let analysis = processor.describe_behavior(&normalized, behavior, time_unit, &mut sink)?;
        if analysis.table.is_empty() {
            warn!(behavior = %behavior, "no events for behavior");
        }
        if !analysis.report.ordering_violations.is_empty() {
            warn!(
                behavior = %behavior,
                violations = analysis.report.ordering_violations.len(),
                "events were out of order within cases and have been sorted"
            );
        }
    }

    let data = String::from_utf8(sink.into_inner())
        .map_err(|e| CliFailure::Usage(format!("summary is not UTF-8: {e}")))?;
    write_output(output, &data)
}

fn cmd_validate(input: &InputArgs, config: PipelineConfig, json: bool) -> Result<(), CliFailure> {
    let raw = read_input(input)?;

    let mut options = config.normalize.clone();
    options.timestamp_policy = TimestampPolicy::Lenient;
    let normalizer = Normalizer::new(options);

    let mut report = ValidationReport {
        total_rows: raw.num_rows(),
        columns: raw.column_names().iter().map(|c| c.to_string()).collect(),
        valid_rows: 0,
        invalid_timestamp_rows: Vec::new(),
        behaviors: Vec::new(),
        error: None,
    };

    match normalizer.normalize_with_report(&raw) {
        Ok(normalized) => {
            report.valid_rows = normalized.report.rows_out;
            report.invalid_timestamp_rows = normalized.report.dropped_rows;
            if let Some(labels) = normalized.table.column(&config.series.behavior_column) {
                report.behaviors = rank_behaviors(labels.iter().map(|v| v.key()));
            }
        }
        Err(e) => report.error = Some(e.to_string()),
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total rows:   {}", report.total_rows);
        println!("Valid rows:   {}", report.valid_rows);
        println!("Columns:      {}", report.columns.join(", "));

        if let Some(err) = &report.error {
            println!("\nSchema error: {}", err);
        }
        if !report.invalid_timestamp_rows.is_empty() {
            println!("\nUnparseable timestamps at rows:");
            for row in &report.invalid_timestamp_rows {
                println!("  - {}", row);
            }
        }
        if !report.behaviors.is_empty() {
            println!("\nBehaviors (by event count):");
            for (label, count) in &report.behaviors {
                println!("  {:<24} {}", label, count);
            }
        }
    }

    if report.error.is_some() || !report.invalid_timestamp_rows.is_empty() {
        Err(CliFailure::ValidationFailed(
            report.total_rows - report.valid_rows,
        ))
    } else {
        Ok(())
    }
}

fn cmd_schema(json: bool) -> Result<(), CliFailure> {
    let mapping = SchemaMapping::default();

    if json {
        let doc = serde_json::json!({
            "producer": PRODUCER_NAME,
            "version": VERSION,
            "required_columns": REQUIRED_COLUMNS,
            "behavior_column": BEHAVIOR,
            "default_mapping": mapping,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!("Canonical Schema");
        println!("================");
        println!();
        println!("Required columns:");
        for column in REQUIRED_COLUMNS {
            println!("  - {}", column);
        }
        println!();
        println!("Behavior column (segment/export): {}", BEHAVIOR);
        println!();
        println!("Default rename mapping:");
        for rename in &mapping.renames {
            println!("  {:<16} -> {}", rename.source, rename.canonical);
        }
    }

    Ok(())
}

// Helper functions

fn load_config(input: &InputArgs) -> Result<PipelineConfig, CliFailure> {
    let mut config = match &input.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if input.lenient {
        config.normalize.timestamp_policy = TimestampPolicy::Lenient;
    }
    Ok(config)
}

fn read_input(input: &InputArgs) -> Result<EventTable, CliFailure> {
    let is_stdin = input.input.to_string_lossy() == "-";
    if is_stdin && atty::is(atty::Stream::Stdin) {
        warn!("reading event log from an interactive terminal; end input with Ctrl-D");
    }

    let table = match (input.input_format, is_stdin) {
        (InputFormat::Csv, true) => CsvSource::read_from(io::stdin().lock(), b',')?,
        (InputFormat::Csv, false) => {
            let file = File::open(&input.input)?;
            CsvSource::read_from(file, b',')?
        }
        (format, _) => {
            let data = if is_stdin {
                let mut buffer = String::new();
                io::stdin().read_to_string(&mut buffer)?;
                buffer
            } else {
                fs::read_to_string(&input.input)?
            };
            let layout = match format {
                InputFormat::Json => JsonFormat::Array,
                _ => JsonFormat::Ndjson,
            };
            JsonSource::parse(&data, layout)?
        }
    };

    info!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        "read event log"
    );
    Ok(table)
}

fn write_output(output: Option<&Path>, data: &str) -> Result<(), CliFailure> {
    match output {
        Some(path) if path.to_string_lossy() != "-" => {
            let mut writer = BufWriter::new(File::create(path)?);
            writer.write_all(data.as_bytes())?;
            writer.flush()?;
        }
        _ => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(data.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum CliFailure {
    Io(io::Error),
    Pipeline(PipelineError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    Usage(String),
}

impl From<io::Error> for CliFailure {
    fn from(e: io::Error) -> Self {
        CliFailure::Io(e)
    }
}

impl From<PipelineError> for CliFailure {
    fn from(e: PipelineError) -> Self {
        CliFailure::Pipeline(e)
    }
}

impl From<serde_json::Error> for CliFailure {
    fn from(e: serde_json::Error) -> Self {
        CliFailure::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    stage: Option<String>,
    message: String,
    hint: Option<String>,
}

impl From<CliFailure> for CliError {
    fn from(e: CliFailure) -> Self {
        match e {
            CliFailure::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                stage: None,
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CliFailure::Pipeline(e) => {
                let hint = match e.code() {
                    "SCHEMA_ERROR" => "Run 'logseries schema' and check the rename mapping",
                    "TIMESTAMP_PARSE_ERROR" => "Fix the timestamp or rerun with --lenient",
                    "ORDERING_VIOLATION" => "Check for duplicate or corrupted timestamps",
                    _ => "Check input format",
                };
                CliError {
                    code: e.code().to_string(),
                    stage: e.stage().map(|s| s.to_string()),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CliFailure::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                stage: None,
                message: e.to_string(),
                hint: None,
            },
            CliFailure::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                stage: Some("normalize".to_string()),
                message: format!("{} rows failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            CliFailure::Usage(msg) => CliError {
                code: "USAGE_ERROR".to_string(),
                stage: None,
                message: msg,
                hint: None,
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_rows: usize,
    valid_rows: usize,
    columns: Vec<String>,
    invalid_timestamp_rows: Vec<usize>,
    behaviors: Vec<(String, u64)>,
    error: Option<String>,
}
