//! engagehf CLI - decode captured Bluetooth measurement notifications
//!
//! Commands:
//! - decode: Decode a single characteristic payload given as hex
//! - transform: Decode a file of notifications (batch mode)
//! - run: Decode notifications streamed on stdin (streaming mode)
//! - uuids: Print supported service/characteristic identities
//! - doctor: Diagnose the installation

use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use engagehf_measurements::characteristic::BleServiceType;
use engagehf_measurements::display::{FormatConfig, MeasurementFormatter};
use engagehf_measurements::pipeline::{Notification, NotificationProcessor, ProcessedMeasurement};
use engagehf_measurements::{CharacteristicId, DecoderRegistry, PRODUCER_NAME, VERSION};
use uuid::Uuid;

/// engagehf - decode Bluetooth weight and blood pressure measurements
#[derive(Parser)]
#[command(name = "engagehf")]
#[command(author = "ENGAGE-HF contributors")]
#[command(version = VERSION)]
#[command(about = "Decode BLE weight and blood pressure notifications", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a single characteristic payload
    Decode {
        /// Measurement kind; sets both service and characteristic UUIDs
        #[arg(long, value_enum, conflicts_with_all = ["service", "characteristic"])]
        kind: Option<MeasurementKind>,

        /// Service UUID
        #[arg(long, requires = "characteristic")]
        service: Option<Uuid>,

        /// Characteristic UUID
        #[arg(long, requires = "service")]
        characteristic: Option<Uuid>,

        /// Payload as hex (e.g. "013075" or "01 30 75")
        #[arg(short, long)]
        payload: String,

        /// Print a human-readable summary for this region (e.g. "US")
        #[arg(long)]
        region: Option<String>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Decode a file of notifications (batch mode)
    Transform {
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
    },

    /// Decode notifications streamed on stdin (streaming mode)
    Run {
        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Flush output after each record (--flush false to buffer)
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        flush: bool,
    },

    /// Print supported service/characteristic identities
    Uuids {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose the installation
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MeasurementKind {
    Weight,
    BloodPressure,
}

impl From<MeasurementKind> for BleServiceType {
    fn from(kind: MeasurementKind) -> Self {
        match kind {
            MeasurementKind::Weight => BleServiceType::Weight,
            MeasurementKind::BloodPressure => BleServiceType::BloodPressure,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one notification per line)
    Ndjson,
    /// JSON array of notifications
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

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

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn run(cli: Cli) -> Result<(), EngageCliError> {
    match cli.command {
        Commands::Decode {
            kind,
            service,
            characteristic,
            payload,
            region,
            output_format,
        } => {
            let id = match (kind, service, characteristic) {
                (Some(kind), _, _) => BleServiceType::from(kind).id(),
                (None, Some(service), Some(characteristic)) => {
                    CharacteristicId::new(service, characteristic)
                }
                _ => return Err(EngageCliError::MissingCharacteristic),
            };
            cmd_decode(id, &payload, region.as_deref(), output_format)
        }

        Commands::Transform {
            input,
            output,
            input_format,
            output_format,
        } => cmd_transform(&input, &output, input_format, output_format),

        Commands::Run {
            output_format,
            flush,
        } => cmd_run(output_format, flush),

        Commands::Uuids { json } => cmd_uuids(json),

        Commands::Doctor { json } => cmd_doctor(json),
    }
}

fn cmd_decode(
    id: CharacteristicId,
    payload: &str,
    region: Option<&str>,
    output_format: OutputFormat,
) -> Result<(), EngageCliError> {
    let bytes = parse_hex(payload)?;
    debug!("Decoding {} bytes for {}/{}", bytes.len(), id.service, id.characteristic);

    let notification = Notification::new(id.service, id.characteristic, bytes);
    let mut processor = NotificationProcessor::new();
    let processed = processor
        .process(&notification)
        .ok_or(EngageCliError::NotDecoded)?;

    if let Some(region) = region {
        let formatter = MeasurementFormatter::new(FormatConfig::for_region(region));
        println!("{}", formatter.summary(&processed.measurement));
    }

    print!("{}", format_output(std::slice::from_ref(&processed), &output_format)?);
    Ok(())
}

fn cmd_transform(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
) -> Result<(), EngageCliError> {
    // Read input
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let notifications = match input_format {
        InputFormat::Ndjson => Notification::parse_ndjson(&input_data)?,
        InputFormat::Json => Notification::parse_array(&input_data)?,
    };

    if notifications.is_empty() {
        return Err(EngageCliError::NoNotifications);
    }

    let mut processor = NotificationProcessor::new();
    let processed = processor.process_all(&notifications);

    let stats = processor.stats();
    info!("Decoded {} notifications, skipped {}", stats.decoded, stats.skipped);

    let output_data = format_output(&processed, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(output_format: OutputFormat, flush: bool) -> Result<(), EngageCliError> {
    let mut processor = NotificationProcessor::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let notification: Notification = serde_json::from_str(trimmed).map_err(|e| {
            EngageCliError::ParseError(format!("Failed to parse notification: {}", e))
        })?;

        if let Some(processed) = processor.process(&notification) {
            write!(stdout, "{}", format_output(&[processed], &output_format)?)?;
            if flush {
                stdout.flush()?;
            }
        }
    }

    stdout.flush()?;
    let stats = processor.stats();
    info!("Decoded {} notifications, skipped {}", stats.decoded, stats.skipped);

    Ok(())
}

fn cmd_uuids(json: bool) -> Result<(), EngageCliError> {
    let entries: Vec<UuidEntry> = BleServiceType::ALL
        .iter()
        .map(|ty| UuidEntry {
            kind: ty.as_str().to_string(),
            service: ty.service(),
            characteristic: ty.characteristic(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!(
                "{:<16} service {}  characteristic {}",
                entry.kind, entry.service, entry.characteristic
            );
        }
    }

    Ok(())
}

fn cmd_doctor(json: bool) -> Result<(), EngageCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} version {}", PRODUCER_NAME, VERSION),
    });

    let registry = DecoderRegistry::new();
    let missing: Vec<&str> = BleServiceType::ALL
        .iter()
        .filter(|ty| !registry.recognizes(&ty.id()))
        .map(|ty| ty.as_str())
        .collect();
    checks.push(if missing.is_empty() {
        DoctorCheck {
            name: "decoders".to_string(),
            status: CheckStatus::Ok,
            message: format!("{} decoders registered", registry.len()),
        }
    } else {
        DoctorCheck {
            name: "decoders".to_string(),
            status: CheckStatus::Error,
            message: format!("No decoder for: {}", missing.join(", ")),
        }
    });

    checks.push(stdin_check(atty::is(atty::Stream::Stdin)));

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("engagehf Doctor Report");
        println!("======================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(EngageCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

/// `run` reads notifications from a pipe
fn stdin_check(is_tty: bool) -> DoctorCheck {
    if is_tty {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Warning,
            message: "stdin is a TTY; pipe NDJSON notifications into `engagehf run`".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    }
}

fn format_output(
    records: &[ProcessedMeasurement],
    format: &OutputFormat,
) -> Result<String, EngageCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)? + "\n"),
    }
}

/// Accepts "013075", "01 30 75", "01:30:75" and an optional "0x" prefix
fn parse_hex(input: &str) -> Result<Vec<u8>, EngageCliError> {
    let trimmed = input.trim();
    let digits: String = trimmed
        .strip_prefix("0x")
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();

    if digits.len() % 2 != 0 {
        return Err(EngageCliError::InvalidPayload(format!(
            "odd number of hex digits in '{}'",
            input
        )));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| {
                    EngageCliError::InvalidPayload(format!("invalid hex in '{}'", input))
                })
        })
        .collect()
}

#[derive(Debug)]
enum EngageCliError {
    Io(io::Error),
    Observation(engagehf_measurements::ObservationError),
    Json(serde_json::Error),
    InvalidPayload(String),
    MissingCharacteristic,
    NotDecoded,
    NoNotifications,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for EngageCliError {
    fn from(e: io::Error) -> Self {
        EngageCliError::Io(e)
    }
}

impl From<engagehf_measurements::ObservationError> for EngageCliError {
    fn from(e: engagehf_measurements::ObservationError) -> Self {
        EngageCliError::Observation(e)
    }
}

impl From<serde_json::Error> for EngageCliError {
    fn from(e: serde_json::Error) -> Self {
        EngageCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EngageCliError> for CliError {
    fn from(e: EngageCliError) -> Self {
        match e {
            EngageCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EngageCliError::Observation(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(
                    "Each notification needs service, characteristic and payload".to_string(),
                ),
            },
            EngageCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EngageCliError::InvalidPayload(msg) => CliError {
                code: "INVALID_PAYLOAD".to_string(),
                message: msg,
                hint: Some("Pass the payload as hex bytes, e.g. 013075".to_string()),
            },
            EngageCliError::MissingCharacteristic => CliError {
                code: "MISSING_CHARACTERISTIC".to_string(),
                message: "No characteristic given".to_string(),
                hint: Some("Use --kind, or both --service and --characteristic".to_string()),
            },
            EngageCliError::NotDecoded => CliError {
                code: "NOT_DECODED".to_string(),
                message: "Payload is not a supported measurement or is malformed".to_string(),
                hint: Some("Run with -v to see why the payload was dropped".to_string()),
            },
            EngageCliError::NoNotifications => CliError {
                code: "NO_NOTIFICATIONS".to_string(),
                message: "No notifications found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            EngageCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            EngageCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct UuidEntry {
    kind: String,
    service: Uuid,
    characteristic: Uuid,
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
