//! Pulse CLI - Command-line interface for Pulse Flux
//!
//! Commands:
//! - replay: Replay recorded device events into vitals snapshots (batch mode)
//! - run: Process streaming device events from stdin (streaming mode)
//! - reward: Compute a practice reward receipt
//! - validate: Validate device events
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use pulse_flux::ingest::{self, DeviceEvent};
use pulse_flux::{
    ComputeError, PipelineConfig, PracticeMetrics, Replayer, RewardEncoder, VitalsProcessor,
    VitalsSnapshot, FLUX_VERSION, PRODUCER_NAME,
};

/// Pulse - On-device heart-rate signal processing
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version = FLUX_VERSION)]
#[command(about = "Turn heart-rate streams into live vitals and practice rewards", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded device events into vitals snapshots (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Abort on the first rejected event instead of skipping it
        #[arg(long)]
        strict: bool,
    },

    /// Process streaming device events from stdin (streaming mode)
    Run {
        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Abort on the first rejected event instead of skipping it
        #[arg(long)]
        strict: bool,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Compute a practice reward receipt
    Reward {
        /// Seconds actually practiced
        #[arg(long)]
        actual: f64,

        /// Nominal session length in seconds
        #[arg(long)]
        expected: f64,

        /// Full reward for a perfect session
        #[arg(long, default_value = "50")]
        base: f64,

        #[arg(long)]
        stress_before: Option<f64>,

        #[arg(long)]
        stress_after: Option<f64>,

        #[arg(long)]
        energy_before: Option<f64>,

        #[arg(long)]
        energy_after: Option<f64>,

        /// Treat before/after values as not coming from a sensor
        #[arg(long)]
        no_metrics: bool,
    },

    /// Validate device events
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one snapshot per line)
    Ndjson,
    /// JSON array of snapshots
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays machine-readable
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

fn run(cli: Cli) -> Result<(), PulseCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
            strict,
        } => cmd_replay(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            strict,
        ),

        Commands::Run {
            output_format,
            config,
            strict,
            flush,
        } => cmd_run(output_format, config.as_deref(), strict, flush),

        Commands::Reward {
            actual,
            expected,
            base,
            stress_before,
            stress_after,
            energy_before,
            energy_after,
            no_metrics,
        } => {
            let metrics = PracticeMetrics {
                actual_duration_seconds: actual,
                expected_duration_seconds: expected,
                stress_before,
                stress_after,
                energy_before,
                energy_after,
                base_ond_reward: base,
                has_real_metrics: !no_metrics,
            };
            println!("{}", RewardEncoder::new().encode_to_json(&metrics)?);
            Ok(())
        }

        Commands::Validate {
            input,
            input_format,
            config,
            json,
        } => cmd_validate(&input, input_format, config.as_deref(), json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    strict: bool,
) -> Result<(), PulseCliError> {
    let events = read_events(input, &input_format)?;
    if events.is_empty() {
        return Err(PulseCliError::NoEvents);
    }

    let mut replayer = Replayer::new(VitalsProcessor::with_config(load_config(config)?)?);
    let mut snapshots: Vec<VitalsSnapshot> = Vec::new();
    let mut rejected = 0usize;

    for event in &events {
        let (emitted, result) = replayer.feed(event);
        snapshots.extend(emitted);
        if let Err(e) = result {
            if strict {
                return Err(e.into());
            }
            rejected += 1;
        }
    }
    snapshots.extend(replayer.finish());

    if rejected > 0 {
        tracing::warn!(rejected, total = events.len(), "skipped rejected events");
    }
    if snapshots.is_empty() {
        return Err(PulseCliError::NoSnapshots);
    }

    let output_data = format_output(&snapshots, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(
    output_format: OutputFormat,
    config: Option<&Path>,
    strict: bool,
    flush: bool,
) -> Result<(), PulseCliError> {
    let mut replayer = Replayer::new(VitalsProcessor::with_config(load_config(config)?)?);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let event: DeviceEvent = serde_json::from_str(trimmed).map_err(|e| {
            PulseCliError::ParseError(format!("Failed to parse event: {}", e))
        })?;

        let (emitted, result) = replayer.feed(&event);
        if !emitted.is_empty() {
            write!(stdout, "{}", format_output(&emitted, &output_format)?)?;
            if flush {
                stdout.flush()?;
            }
        }
        if let Err(e) = result {
            if strict {
                return Err(e.into());
            }
        }
    }

    let remaining = replayer.finish();
    if !remaining.is_empty() {
        write!(stdout, "{}", format_output(&remaining, &output_format)?)?;
        stdout.flush()?;
    }

    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    json: bool,
) -> Result<(), PulseCliError> {
    let events = read_events(input, &input_format)?;
    let failures = ingest::validate_events(&events, &load_config(config)?);

    let report = ValidationReport {
        total_events: events.len(),
        valid_events: events.len() - failures.len(),
        invalid_events: failures.len(),
        errors: failures
            .iter()
            .map(|f| ValidationErrorDetail {
                index: f.index,
                error: f.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Event at index {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_events > 0 {
        Err(PulseCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "flux_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulse Flux version {}", FLUX_VERSION),
    });

    match config {
        Some(path) if path.exists() => match fs::read_to_string(path) {
            Ok(content) => match PipelineConfig::from_json(&content) {
                Ok(c) => checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Config valid ({}s window, {}s retention, tick every {}s)",
                        c.analysis_window_secs, c.retention_secs, c.tick_interval_secs
                    ),
                }),
                Err(e) => checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid config: {}", e),
                }),
            },
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read config file: {}", e),
            }),
        },
        Some(_) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Config file does not exist, defaults will be used".to_string(),
        }),
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        }),
    }

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, PulseCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_events(input: &Path, format: &InputFormat) -> Result<Vec<DeviceEvent>, PulseCliError> {
    let data = read_input(input)?;
    let events = match format {
        InputFormat::Ndjson => ingest::parse_ndjson(&data)?,
        InputFormat::Json => ingest::parse_array(&data)?,
    };
    Ok(events)
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, PulseCliError> {
    match path {
        Some(path) => Ok(PipelineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn format_output(
    snapshots: &[VitalsSnapshot],
    format: &OutputFormat,
) -> Result<String, PulseCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for snapshot in snapshots {
                lines.push(serde_json::to_string(snapshot)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(snapshots)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(snapshots)?),
    }
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoEvents,
    NoSnapshots,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<ComputeError> for PulseCliError {
    fn from(e: ComputeError) -> Self {
        PulseCliError::Compute(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'pulse validate' on the input for details".to_string()),
            },
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PulseCliError::NoSnapshots => CliError {
                code: "NO_SNAPSHOTS".to_string(),
                message: "Not enough heart-rate samples to compute vitals".to_string(),
                hint: Some("Provide at least ~20 seconds of heart-rate events".to_string()),
            },
            PulseCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            PulseCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
